//! Pluggable entity taggers.
//!
//! A [`Tagger`] turns a scene's text into labelled spans. The recognizer runs
//! every available tagger that supports the document language and
//! concatenates their output; reconciliation happens later, so taggers never
//! need to agree with each other.
//!
//! Taggers are registered in a [`TaggerRegistry`] when the
//! [`crate::Extractor`] is built. A slot may be [`TaggerSlot::Lazy`]: its
//! loader runs once, on first use, and a loader failure leaves the slot
//! permanently unavailable. The extraction then continues with the
//! remaining taggers and records an
//! [`ExtractWarning::TaggerUnavailable`].

pub mod lexicon;
pub mod screenplay;

pub use lexicon::LexiconTagger;
pub use screenplay::ScreenplayTagger;

use crate::error::{ExtractWarning, TaggerError};
use crate::output::{EntityKind, ObjectCategory};
use once_cell::sync::OnceCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// One labelled span returned by a tagger.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedSpan {
    /// Text exactly as it appears in the scene.
    pub surface: String,
    pub kind: EntityKind,
    /// Expected in `[0, 1]`; out-of-range values are clamped by the caller.
    pub confidence: f32,
    pub category: Option<ObjectCategory>,
}

impl TaggedSpan {
    pub fn new(surface: impl Into<String>, kind: EntityKind, confidence: f32) -> Self {
        Self {
            surface: surface.into(),
            kind,
            confidence,
            category: None,
        }
    }

    pub fn with_category(mut self, category: ObjectCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// A capability that labels characters, locations and objects in text.
///
/// Implementations must be thread-safe: scenes are tagged concurrently on
/// the blocking pool and the same tagger instance is shared by all of them.
pub trait Tagger: Send + Sync {
    /// Stable identifier used in warnings and stats (`screenplay`, `lexicon-en`).
    fn id(&self) -> &str;

    /// ISO 639-1 codes this tagger handles. `None` means any language.
    fn languages(&self) -> Option<&[&str]> {
        None
    }

    /// Label spans in one scene's text.
    fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>, TaggerError>;

    fn supports(&self, language: &str) -> bool {
        self.languages()
            .map_or(true, |langs| langs.iter().any(|l| l.eq_ignore_ascii_case(language)))
    }
}

/// Loader for a [`TaggerSlot::Lazy`].
pub type TaggerLoader = Box<dyn Fn() -> Result<Arc<dyn Tagger>, TaggerError> + Send + Sync>;

/// A registered tagger, present or absent.
pub enum TaggerSlot {
    /// Constructed up front.
    Ready(Arc<dyn Tagger>),
    /// Constructed on first use. The outcome, success or failure, is cached.
    Lazy {
        id: String,
        loader: TaggerLoader,
        cell: OnceCell<Result<Arc<dyn Tagger>, String>>,
    },
    /// Known to be missing (model not installed, feature not compiled in).
    Unavailable { id: String, reason: String },
}

impl TaggerSlot {
    pub fn ready<T: Tagger + 'static>(tagger: T) -> Self {
        TaggerSlot::Ready(Arc::new(tagger))
    }

    pub fn lazy<F>(id: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Tagger>, TaggerError> + Send + Sync + 'static,
    {
        TaggerSlot::Lazy {
            id: id.into(),
            loader: Box::new(loader),
            cell: OnceCell::new(),
        }
    }

    pub fn unavailable(id: impl Into<String>, reason: impl Into<String>) -> Self {
        TaggerSlot::Unavailable {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TaggerSlot::Ready(t) => t.id(),
            TaggerSlot::Lazy { id, .. } | TaggerSlot::Unavailable { id, .. } => id,
        }
    }

    /// The tagger, loading it on first call.
    pub fn resolve(&self) -> Result<Arc<dyn Tagger>, String> {
        match self {
            TaggerSlot::Ready(t) => Ok(Arc::clone(t)),
            TaggerSlot::Unavailable { reason, .. } => Err(reason.clone()),
            TaggerSlot::Lazy { id, loader, cell } => cell
                .get_or_init(|| {
                    debug!("Loading tagger '{}'", id);
                    match catch_unwind(AssertUnwindSafe(loader)) {
                        Ok(Ok(tagger)) => Ok(tagger),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err("loader panicked".to_string()),
                    }
                })
                .clone(),
        }
    }
}

impl fmt::Debug for TaggerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            TaggerSlot::Ready(_) => "ready",
            TaggerSlot::Lazy { cell, .. } => match cell.get() {
                None => "lazy",
                Some(Ok(_)) => "loaded",
                Some(Err(_)) => "failed",
            },
            TaggerSlot::Unavailable { .. } => "unavailable",
        };
        write!(f, "{}({})", self.id(), state)
    }
}

/// The ordered set of taggers an [`crate::Extractor`] runs.
#[derive(Debug, Default)]
pub struct TaggerRegistry {
    slots: Vec<TaggerSlot>,
}

impl TaggerRegistry {
    /// An empty registry. Extraction still segments scenes and registers
    /// slugline locations, but finds no characters or objects.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in taggers: `screenplay`, `lexicon-en`, `lexicon-ru`.
    pub fn builtin() -> Self {
        Self::empty()
            .with(TaggerSlot::ready(ScreenplayTagger::new()))
            .with(TaggerSlot::lazy("lexicon-en", || {
                Ok(Arc::new(LexiconTagger::english()?) as Arc<dyn Tagger>)
            }))
            .with(TaggerSlot::lazy("lexicon-ru", || {
                Ok(Arc::new(LexiconTagger::russian()?) as Arc<dyn Tagger>)
            }))
    }

    pub fn with(mut self, slot: TaggerSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn with_tagger<T: Tagger + 'static>(self, tagger: T) -> Self {
        self.with(TaggerSlot::ready(tagger))
    }

    pub fn push(&mut self, slot: TaggerSlot) {
        self.slots.push(slot);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.id())
    }

    /// Resolve every slot and keep the taggers supporting `language`.
    ///
    /// Slots that fail to load produce a warning instead of an error.
    pub(crate) fn resolve_for(&self, language: &str) -> (Vec<Arc<dyn Tagger>>, Vec<ExtractWarning>) {
        let mut taggers = Vec::new();
        let mut warnings = Vec::new();
        for slot in &self.slots {
            match slot.resolve() {
                Ok(tagger) if tagger.supports(language) => taggers.push(tagger),
                Ok(tagger) => debug!("Tagger '{}' skipped for language '{}'", tagger.id(), language),
                Err(reason) => {
                    warn!("Tagger '{}' unavailable: {}", slot.id(), reason);
                    warnings.push(ExtractWarning::TaggerUnavailable {
                        tagger: slot.id().to_string(),
                        reason,
                    });
                }
            }
        }
        (taggers, warnings)
    }
}
