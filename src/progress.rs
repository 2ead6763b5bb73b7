//! Progress-callback trait for per-scene extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the recognizer tags each scene. Long feature scripts have a few
//! hundred scenes, so a host UI can show progress without polling.
//!
//! # Example
//!
//! ```rust
//! use screenplay_breakdown::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_scene_complete(&self, index: usize, total: usize, candidates: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Scene {}/{}: {} candidates", index + 1, total, candidates);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes each scene.
///
/// Scenes are tagged on a thread pool, so `on_scene_start`,
/// `on_scene_complete` and `on_tagger_error` may be called concurrently and
/// out of scene order. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after segmentation, before any scene is tagged.
    fn on_extraction_start(&self, total_scenes: usize) {
        let _ = total_scenes;
    }

    /// Called just before the taggers run on a scene.
    ///
    /// # Arguments
    /// * `index` — 0-based scene index
    /// * `total` — number of scenes in the document
    fn on_scene_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when every tagger has finished with a scene.
    ///
    /// # Arguments
    /// * `candidates` — entity candidates kept for the scene
    fn on_scene_complete(&self, index: usize, total: usize, candidates: usize) {
        let _ = (index, total, candidates);
    }

    /// Called when one tagger fails on one scene.
    fn on_tagger_error(&self, tagger: &str, index: usize, error: &str) {
        let _ = (tagger, index, error);
    }

    /// Called once after reconciliation and assembly.
    ///
    /// # Arguments
    /// * `total_scenes` — scenes in the record
    /// * `entities`     — canonical entities in the registry
    fn on_extraction_complete(&self, total_scenes: usize, entities: usize) {
        let _ = (total_scenes, entities);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        total: AtomicUsize,
        entities: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_extraction_start(&self, total_scenes: usize) {
            self.total.store(total_scenes, Ordering::SeqCst);
        }

        fn on_scene_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_scene_complete(&self, _index: usize, _total: usize, _candidates: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_tagger_error(&self, _tagger: &str, _index: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_extraction_complete(&self, _total_scenes: usize, entities: usize) {
            self.entities.store(entities, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(5);
        cb.on_scene_start(0, 5);
        cb.on_scene_complete(0, 5, 12);
        cb.on_tagger_error("screenplay", 1, "some error");
        cb.on_extraction_complete(5, 9);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_extraction_start(2);
        tracker.on_scene_start(0, 2);
        tracker.on_scene_complete(0, 2, 3);
        tracker.on_scene_start(1, 2);
        tracker.on_tagger_error("lexicon-en", 1, "model crashed");
        tracker.on_scene_complete(1, 2, 0);
        tracker.on_extraction_complete(2, 4);

        assert_eq!(tracker.total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.entities.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(10);
        cb.on_scene_start(0, 10);
        cb.on_scene_complete(0, 10, 1);
    }
}
