//! Extraction entry points.
//!
//! [`extract`] is the one-call API: default configuration, built-in taggers,
//! a private runtime. Use an [`Extractor`] to inject taggers or tuning, to
//! feed raw bytes of unknown encoding, or when already inside a tokio
//! runtime (call [`Extractor::extract_async`] there).

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, ExtractWarning};
use crate::output::{BreakdownRecord, DocumentMetadata, ExtractionStats};
use crate::pipeline::{assemble, crowd, input, normalize, recognize, reconcile, segment};
use crate::tagger::TaggerRegistry;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Produce a breakdown of `document_text` with the default configuration and
/// the built-in taggers.
///
/// `language_hint` (`"en"`, `"ru"`, …) skips script detection when given.
///
/// # Errors
/// Fatal conditions only: binary payloads and integrity violations. Tagger
/// failures are reported in [`BreakdownRecord::warnings`].
///
/// # Panics
/// Creates its own tokio runtime, so it must not be called from inside an
/// async context. Use [`Extractor::extract_async`] there.
///
/// # Example
/// ```rust
/// let record = screenplay_breakdown::extract(
///     "INT. KITCHEN - DAY\nJOHN enters holding a KNIFE.\n",
///     Some("en"),
/// )?;
/// assert_eq!(record.scenes.len(), 1);
/// # Ok::<(), screenplay_breakdown::ExtractError>(())
/// ```
pub fn extract(
    document_text: &str,
    language_hint: Option<&str>,
) -> Result<BreakdownRecord, ExtractError> {
    Extractor::default().extract(document_text, language_hint)
}

/// A configured extraction pipeline.
///
/// Holds no per-document state: one extractor can process any number of
/// documents, concurrently if needed.
#[derive(Debug)]
pub struct Extractor {
    config: ExtractionConfig,
    registry: TaggerRegistry,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default(), TaggerRegistry::builtin())
    }
}

impl Extractor {
    pub fn new(config: ExtractionConfig, registry: TaggerRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaggerRegistry {
        &self.registry
    }

    /// Synchronous wrapper around [`Extractor::extract_async`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn extract(
        &self,
        document_text: &str,
        language_hint: Option<&str>,
    ) -> Result<BreakdownRecord, ExtractError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.extract_async(document_text, language_hint))
    }

    /// Produce a breakdown of already-decoded text.
    pub async fn extract_async(
        &self,
        document_text: &str,
        language_hint: Option<&str>,
    ) -> Result<BreakdownRecord, ExtractError> {
        input::ensure_text(document_text, self.config.max_binary_ratio)?;
        self.run(document_text, language_hint, None).await
    }

    /// Decode a byte payload of unknown encoding, then extract.
    ///
    /// The detected encoding is recorded in
    /// [`DocumentMetadata::encoding`].
    ///
    /// # Errors
    /// [`ExtractError::BinaryInput`] when the bytes are not text in any
    /// supported encoding (a PDF or image passed in unextracted).
    pub async fn extract_bytes(
        &self,
        bytes: &[u8],
        language_hint: Option<&str>,
    ) -> Result<BreakdownRecord, ExtractError> {
        let decoded = input::decode_input(bytes, self.config.max_binary_ratio)?;
        self.run(&decoded.text, language_hint, Some(decoded.encoding))
            .await
    }

    /// Run the pipeline on text that already passed the binary check.
    async fn run(
        &self,
        document_text: &str,
        language_hint: Option<&str>,
        encoding: Option<String>,
    ) -> Result<BreakdownRecord, ExtractError> {
        let total_start = Instant::now();
        let config = &self.config;
        info!("Starting extraction: {} bytes of text", document_text.len());

        // ── Step 1: Normalize ────────────────────────────────────────────
        let normalized = normalize::normalize(document_text, config);
        debug!("Normalized to {} lines", normalized.len());

        // ── Step 2: Resolve language ─────────────────────────────────────
        let language = match language_hint.and_then(primary_subtag) {
            Some(code) => code,
            None => input::detect_language(&normalized.to_text()).to_string(),
        };
        let tagging_language = if language == "und" {
            config.fallback_language.clone()
        } else {
            language.clone()
        };
        debug!("Document language: {} (tagging as {})", language, tagging_language);

        // ── Step 3: Segment into scenes ──────────────────────────────────
        let mut scenes = segment::segment(&normalized);
        for scene in &mut scenes {
            scene.extras = crowd::detect_crowd(scene.content());
        }
        let mut warnings = Vec::new();
        if normalized.lines().iter().all(|l| l.trim().is_empty()) {
            warn!("Document has no usable text after normalisation");
            warnings.push(ExtractWarning::EmptyDocument);
        }
        info!("Segmented {} scenes", scenes.len());

        if let Some(ref cb) = config.progress_callback {
            cb.on_extraction_start(scenes.len());
        }

        // ── Step 4: Resolve taggers ──────────────────────────────────────
        let (taggers, unavailable) = self.registry.resolve_for(&tagging_language);
        warnings.extend(unavailable);
        let taggers_used: Vec<String> = taggers.iter().map(|t| t.id().to_string()).collect();
        if taggers.is_empty() {
            warn!(
                "No tagger available for language '{}'; only slugline locations will be found",
                tagging_language
            );
        }

        // ── Step 5: Recognise entities ───────────────────────────────────
        let recognize_start = Instant::now();
        let recognition = recognize::recognize_all(&scenes, taggers, config).await?;
        let recognize_duration_ms = recognize_start.elapsed().as_millis() as u64;
        let candidate_count = recognition.candidates.len();
        warnings.extend(recognition.warnings);
        info!(
            "Recognised {} candidates in {}ms",
            candidate_count, recognize_duration_ms
        );

        // ── Step 6: Reconcile ────────────────────────────────────────────
        let registry = reconcile::reconcile(&recognition.candidates, &mut scenes, &config.merge);
        debug!(
            "Registry: {} characters, {} locations, {} objects",
            registry.characters.len(),
            registry.locations.len(),
            registry.objects.len()
        );

        // ── Step 7: Assemble ─────────────────────────────────────────────
        let metadata = DocumentMetadata {
            source_name: None,
            language,
            encoding,
            line_count: normalized.len(),
        };
        let entity_count = registry.len();
        let scene_count = scenes.len();
        let stats = ExtractionStats {
            scene_count,
            candidate_count,
            taggers_used,
            recognize_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        let record = assemble::assemble(metadata, scenes, registry, warnings, stats)?;

        if record.is_degraded() {
            warn!("Extraction finished with {} warnings", record.warnings.len());
        }
        info!(
            "Extraction complete: {} scenes, {} entities, {}ms total",
            scene_count, entity_count, record.stats.total_duration_ms
        );

        if let Some(ref cb) = config.progress_callback {
            cb.on_extraction_complete(scene_count, entity_count);
        }

        Ok(record)
    }
}

/// Reduce a language tag (`en-US`, `ru_RU`, ` RU `) to its lower-cased
/// primary subtag. Blank hints give `None`.
fn primary_subtag(hint: &str) -> Option<String> {
    hint.trim()
        .split(['-', '_'])
        .next()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_lowercase)
}
