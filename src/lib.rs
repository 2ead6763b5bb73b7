//! # screenplay-breakdown
//!
//! Turn screenplay text into a structured pre-production breakdown: scenes
//! with location, time of day, characters present and notable objects.
//!
//! ## Why this crate?
//!
//! Script breakdowns are still done by hand with coloured highlighters. The
//! text that PDF/DOCX extractors hand over is noisy (running headers, page
//! numbers, `(MORE)`/`(CONTINUED)` markers, split words), and the same
//! character turns up as `JOHN`, `John` and `JOHN SMITH`. This crate
//! normalises the text, splits it on sluglines, runs pluggable taggers over
//! every scene and merges what they found into one registry of canonical
//! entities with stable identifiers.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text / bytes
//!  │
//!  ├─ 1. Input      decode legacy encodings, reject binary payloads
//!  ├─ 2. Normalize  strip headers, page numbers, pagination markers
//!  ├─ 3. Segment    split on INT./EXT. sluglines (never fails), note extras
//!  ├─ 4. Recognize  per-scene taggers on the blocking pool (bounded)
//!  ├─ 5. Reconcile  merge aliases, assign CHR-/LOC-/OBJ- identifiers
//!  └─ 6. Assemble   record + integrity check + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use screenplay_breakdown::{extract, TablePreset};
//!
//! let text = "INT. KITCHEN - DAY\nJOHN enters holding a KNIFE.\n\n\
//!             EXT. STREET - NIGHT\nJOHN runs. MARY watches.\n";
//! let record = extract(text, None)?;
//!
//! for scene in &record.scenes {
//!     println!("{} {:?}: {:?}", scene.index, scene.location, record.character_names(scene));
//! }
//! print!("{}", record.to_table(&TablePreset::Basic).to_markdown());
//! let csv = record.to_table(&TablePreset::Extended).to_csv()?;
//! # let _ = csv;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom taggers
//!
//! Implement [`Tagger`] and register it next to (or instead of) the
//! built-in ones:
//!
//! ```rust,no_run
//! use screenplay_breakdown::{
//!     EntityKind, ExtractionConfig, Extractor, TaggedSpan, Tagger, TaggerError, TaggerRegistry,
//! };
//!
//! struct Weapons;
//!
//! impl Tagger for Weapons {
//!     fn id(&self) -> &str { "weapons" }
//!     fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>, TaggerError> {
//!         Ok(text
//!             .match_indices("REVOLVER")
//!             .map(|(_, s)| TaggedSpan::new(s, EntityKind::Object, 0.9))
//!             .collect())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = Extractor::new(
//!     ExtractionConfig::default(),
//!     TaggerRegistry::builtin().with_tagger(Weapons),
//! );
//! let record = extractor.extract(&std::fs::read_to_string("script.txt")?, Some("en"))?;
//! println!("{} objects", record.registry.objects.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `breakdown` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! screenplay-breakdown = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod table;
pub mod tagger;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, MergePolicy, ObjectFilter};
pub use error::{ExtractError, ExtractWarning, TaggerError};
pub use extract::{extract, Extractor};
pub use output::{
    BreakdownRecord, CanonicalEntity, CrowdNote, DocumentMetadata, EntityId, EntityKind,
    EntityRegistry, ExtractionStats, ObjectCategory, Scene, Setting, TimeOfDay,
};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use table::{BreakdownTable, Column, TablePreset};
pub use tagger::{LexiconTagger, ScreenplayTagger, TaggedSpan, Tagger, TaggerRegistry, TaggerSlot};
