//! Configuration types for screenplay breakdown extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Heuristic thresholds (alias-merge
//! distance, object stop-list, header/footer ratio) live here rather than in
//! the pipeline stages.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Configuration for one or many extractions.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use screenplay_breakdown::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .concurrency(4)
///     .header_footer_ratio(0.6)
///     .object_min_confidence(0.7)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Maximum number of scenes tagged at the same time. Default: the number
    /// of available CPUs.
    ///
    /// Tagging is CPU-bound, so going above the core count only adds memory
    /// pressure on long scripts.
    pub concurrency: usize,

    /// Language used when the caller gives no hint and detection is
    /// inconclusive. Default: `"en"`.
    pub fallback_language: String,

    /// A page-edge line recurring verbatim on more than this fraction of
    /// pages is a running header/footer. Range 0.0–1.0. Default: 0.5.
    pub header_footer_ratio: f64,

    /// Header/footer detection only runs on documents with at least this
    /// many pages. Default: 2.
    pub min_pages_for_headers: usize,

    /// Drop `(MORE)` / `(CONTINUED)` / `CONTINUED:` pagination lines. Default: true.
    pub strip_continuations: bool,

    /// Reject input whose share of binary characters exceeds this. Default: 0.10.
    pub max_binary_ratio: f64,

    /// Alias-merge distance thresholds.
    pub merge: MergePolicy,

    /// Object/prop filtering applied to tagger output.
    pub objects: ObjectFilter,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fallback_language: "en".to_string(),
            header_footer_ratio: 0.5,
            min_pages_for_headers: 2,
            strip_continuations: true,
            max_binary_ratio: 0.10,
            merge: MergePolicy::default(),
            objects: ObjectFilter::default(),
            progress_callback: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("concurrency", &self.concurrency)
            .field("fallback_language", &self.fallback_language)
            .field("header_footer_ratio", &self.header_footer_ratio)
            .field("min_pages_for_headers", &self.min_pages_for_headers)
            .field("strip_continuations", &self.strip_continuations)
            .field("max_binary_ratio", &self.max_binary_ratio)
            .field("merge", &self.merge)
            .field("objects", &self.objects)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn fallback_language(mut self, lang: impl Into<String>) -> Self {
        self.config.fallback_language = lang.into();
        self
    }

    pub fn header_footer_ratio(mut self, ratio: f64) -> Self {
        self.config.header_footer_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn min_pages_for_headers(mut self, pages: usize) -> Self {
        self.config.min_pages_for_headers = pages.max(2);
        self
    }

    pub fn strip_continuations(mut self, v: bool) -> Self {
        self.config.strip_continuations = v;
        self
    }

    pub fn max_binary_ratio(mut self, ratio: f64) -> Self {
        self.config.max_binary_ratio = ratio;
        self
    }

    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.config.merge = policy;
        self
    }

    pub fn object_min_confidence(mut self, c: f32) -> Self {
        self.config.objects.min_confidence = c.clamp(0.0, 1.0);
        self
    }

    /// Replace the object stop-list. Entries are matched after the same
    /// case/punctuation normalisation used for alias merging.
    pub fn object_stop_list<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.objects.stop_list = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.max_binary_ratio) {
            return Err(ExtractError::InvalidConfig(format!(
                "max_binary_ratio must be 0.0–1.0, got {}",
                c.max_binary_ratio
            )));
        }
        if !(0.0..=1.0).contains(&c.merge.long_name_distance_ratio) {
            return Err(ExtractError::InvalidConfig(format!(
                "long_name_distance_ratio must be 0.0–1.0, got {}",
                c.merge.long_name_distance_ratio
            )));
        }
        if c.fallback_language.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "fallback_language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Tuning structs ───────────────────────────────────────────────────────

/// Edit-distance thresholds used when two names are related by character
/// containment (`john` inside `johns`).
///
/// Token containment (`john` inside `john smith`) merges regardless of
/// distance; these limits only gate the character-level case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Names up to this many characters use `short_name_max_distance`.
    pub short_name_len: usize,
    /// Maximum Levenshtein distance for short names. Default: 1.
    pub short_name_max_distance: usize,
    /// Longer names allow `ceil(len × ratio)` edits. Default: 0.2.
    pub long_name_distance_ratio: f64,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            short_name_len: 5,
            short_name_max_distance: 1,
            long_name_distance_ratio: 0.2,
        }
    }
}

impl MergePolicy {
    /// Maximum edit distance allowed between two names, judged by the
    /// longer of the two.
    pub fn max_distance(&self, longer_len: usize) -> usize {
        if longer_len <= self.short_name_len {
            self.short_name_max_distance
        } else {
            (longer_len as f64 * self.long_name_distance_ratio).ceil() as usize
        }
    }
}

/// Best-effort filter separating physical props from everything else a
/// tagger labels as an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectFilter {
    /// Object candidates below this confidence are dropped. Default: 0.5.
    pub min_confidence: f32,
    /// Normalised nouns that are never props.
    pub stop_list: BTreeSet<String>,
    /// Suffixes marking abstract nouns (`-ness`, `-ость`, …).
    pub abstract_suffixes: Vec<String>,
}

/// Nouns that taggers pick up but that never belong on a props list.
const DEFAULT_STOP_LIST: &[&str] = &[
    "thing", "things", "something", "nothing", "anything", "everything", "idea", "moment",
    "time", "silence", "way", "life", "love", "fear", "hope", "truth", "memory", "dream",
    "voice", "look", "beat", "pause", "end", "вещь", "что-то", "момент", "время", "тишина",
    "жизнь", "любовь", "страх", "голос", "пауза",
];

const DEFAULT_ABSTRACT_SUFFIXES: &[&str] = &["ness", "tion", "ity", "ism", "hood", "ость", "ние"];

impl Default for ObjectFilter {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            stop_list: DEFAULT_STOP_LIST.iter().map(|s| s.to_string()).collect(),
            abstract_suffixes: DEFAULT_ABSTRACT_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ObjectFilter {
    /// Decide whether a normalised object name with the given confidence is
    /// kept as a prop.
    pub fn accepts(&self, normalized: &str, confidence: f32) -> bool {
        if !self.accepts_known(normalized, confidence) {
            return false;
        }
        // Only the head noun (last word) decides concreteness.
        let head = normalized.rsplit(' ').next().unwrap_or(normalized);
        !self
            .abstract_suffixes
            .iter()
            .any(|suffix| {
                head.ends_with(suffix.as_str())
                    && head.chars().count() > suffix.chars().count() + 2
            })
    }

    /// Like [`ObjectFilter::accepts`] without the suffix heuristic, for
    /// objects a tagger already placed in a department category.
    pub fn accepts_known(&self, normalized: &str, confidence: f32) -> bool {
        confidence >= self.min_confidence
            && !normalized.is_empty()
            && !self.stop_list.contains(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_values() {
        let config = ExtractionConfig::builder()
            .concurrency(0)
            .header_footer_ratio(3.0)
            .object_min_confidence(-1.0)
            .build()
            .expect("valid config");
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.header_footer_ratio, 1.0);
        assert_eq!(config.objects.min_confidence, 0.0);
    }

    #[test]
    fn build_rejects_bad_binary_ratio() {
        let err = ExtractionConfig::builder()
            .max_binary_ratio(1.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn merge_policy_scales_with_length() {
        let policy = MergePolicy::default();
        assert_eq!(policy.max_distance(4), 1);
        assert_eq!(policy.max_distance(5), 1);
        assert_eq!(policy.max_distance(10), 2);
        assert_eq!(policy.max_distance(16), 4);
    }

    #[test]
    fn object_filter_keeps_concrete_nouns() {
        let filter = ObjectFilter::default();
        assert!(filter.accepts("knife", 0.9));
        assert!(filter.accepts("door", 0.9));
        assert!(filter.accepts("room", 0.9));
    }

    #[test]
    fn object_filter_rejects_abstract_and_stop_words() {
        let filter = ObjectFilter::default();
        assert!(!filter.accepts("happiness", 0.9));
        assert!(!filter.accepts("silence", 0.9));
        assert!(!filter.accepts("радость", 0.9));
        assert!(!filter.accepts("knife", 0.3));
    }

    #[test]
    fn categorised_objects_skip_suffix_heuristic() {
        let filter = ObjectFilter::default();
        assert!(!filter.accepts("explosion", 0.6));
        assert!(filter.accepts_known("explosion", 0.6));
        assert!(!filter.accepts_known("silence", 0.9));
        assert!(!filter.accepts_known("explosion", 0.2));
    }

    #[test]
    fn custom_stop_list_is_normalised() {
        let config = ExtractionConfig::builder()
            .object_stop_list(["  Chair ", "TABLE"])
            .build()
            .expect("valid config");
        assert!(config.objects.stop_list.contains("chair"));
        assert!(config.objects.stop_list.contains("table"));
        assert!(!config.objects.accepts("chair", 0.9));
    }

    #[test]
    fn debug_hides_callback() {
        let dbg = format!("{:?}", ExtractionConfig::default());
        assert!(dbg.contains("progress_callback: None"));
    }
}
