//! Entity recognition: run the taggers over every scene.
//!
//! Tagging is CPU-bound with no suspension points, so each scene runs on
//! tokio's blocking pool. `buffered` bounds the number of scenes in flight
//! and yields results in scene order, which keeps candidate order (and so
//! identifier assignment) deterministic whatever the thread timing.

use crate::config::{ExtractionConfig, ObjectFilter};
use crate::error::{ExtractError, ExtractWarning};
use crate::output::{EntityKind, ObjectCategory, Scene};
use crate::pipeline::reconcile::normalize_surface;
use crate::progress::ProgressCallback;
use crate::tagger::Tagger;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Tagger id recorded on candidates derived from sluglines.
pub(crate) const SLUGLINE_TAGGER: &str = "slugline";

/// One detection by one tagger in one scene.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EntityCandidate {
    pub surface: String,
    pub normalized: String,
    pub kind: EntityKind,
    pub confidence: f32,
    pub tagger: String,
    pub scene: usize,
    pub category: Option<ObjectCategory>,
}

/// Candidates and warnings for a whole document, in scene order.
#[derive(Debug, Default)]
pub(crate) struct Recognition {
    pub candidates: Vec<EntityCandidate>,
    pub warnings: Vec<ExtractWarning>,
}

#[derive(Debug, Default)]
struct SceneRecognition {
    candidates: Vec<EntityCandidate>,
    warnings: Vec<ExtractWarning>,
}

fn clamp_confidence(c: f32) -> f32 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("tagger panicked: {msg}")
}

/// The LOCATION candidate contributed by a scene's slugline, if any.
fn slugline_candidate(scene: &Scene) -> Option<EntityCandidate> {
    let location = scene.location.as_deref()?;
    let normalized = normalize_surface(location);
    if normalized.is_empty() {
        return None;
    }
    Some(EntityCandidate {
        surface: location.to_string(),
        normalized,
        kind: EntityKind::Location,
        confidence: 1.0,
        tagger: SLUGLINE_TAGGER.to_string(),
        scene: scene.index,
        category: None,
    })
}

/// Run every tagger over one scene's content.
///
/// A tagger error or panic costs that tagger's candidates for this scene
/// only; the other taggers' output is kept.
fn recognize_scene(
    index: usize,
    content: &str,
    taggers: &[Arc<dyn Tagger>],
    filter: &ObjectFilter,
    callback: Option<&ProgressCallback>,
) -> SceneRecognition {
    let mut out = SceneRecognition::default();

    for tagger in taggers {
        let result = match catch_unwind(AssertUnwindSafe(|| tagger.tag(content))) {
            Ok(Ok(spans)) => Ok(spans),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_detail(payload)),
        };

        let spans = match result {
            Ok(spans) => spans,
            Err(detail) => {
                warn!("Tagger '{}' failed on scene {}: {}", tagger.id(), index, detail);
                if let Some(cb) = callback {
                    cb.on_tagger_error(tagger.id(), index, &detail);
                }
                out.warnings.push(ExtractWarning::TaggerFailed {
                    tagger: tagger.id().to_string(),
                    scene: index,
                    detail,
                });
                continue;
            }
        };

        for span in spans {
            let normalized = normalize_surface(&span.surface);
            let confidence = clamp_confidence(span.confidence);
            if normalized.is_empty() {
                continue;
            }
            if span.kind == EntityKind::Object {
                let keep = match span.category {
                    Some(_) => filter.accepts_known(&normalized, confidence),
                    None => filter.accepts(&normalized, confidence),
                };
                if !keep {
                    continue;
                }
            }
            out.candidates.push(EntityCandidate {
                surface: span.surface.trim().to_string(),
                normalized,
                kind: span.kind,
                confidence,
                tagger: tagger.id().to_string(),
                scene: index,
                category: span.category,
            });
        }
    }

    out
}

/// Recognise entities in every scene.
///
/// # Errors
/// Returns [`ExtractError::Internal`] only when a blocking worker could not
/// be joined. Tagger failures are warnings.
pub(crate) async fn recognize_all(
    scenes: &[Scene],
    taggers: Vec<Arc<dyn Tagger>>,
    config: &ExtractionConfig,
) -> Result<Recognition, ExtractError> {
    let total = scenes.len();
    let taggers = Arc::new(taggers);
    let filter = Arc::new(config.objects.clone());

    let per_scene: Vec<Result<SceneRecognition, ExtractError>> =
        stream::iter(scenes.iter().map(|scene| {
            let index = scene.index;
            let content = scene.content().to_string();
            let slugline = slugline_candidate(scene);
            let taggers = Arc::clone(&taggers);
            let filter = Arc::clone(&filter);
            let callback = config.progress_callback.clone();
            async move {
                if let Some(ref cb) = callback {
                    cb.on_scene_start(index, total);
                }
                let cb = callback.clone();
                let mut result = tokio::task::spawn_blocking(move || {
                    recognize_scene(index, &content, &taggers, &filter, cb.as_ref())
                })
                .await
                .map_err(|e| ExtractError::Internal(format!("Scene {} worker failed: {}", index, e)))?;

                if let Some(candidate) = slugline {
                    result.candidates.insert(0, candidate);
                }
                if let Some(ref cb) = callback {
                    cb.on_scene_complete(index, total, result.candidates.len());
                }
                debug!("Scene {}: {} candidates", index, result.candidates.len());
                Ok::<_, ExtractError>(result)
            }
        }))
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    let mut recognition = Recognition::default();
    for scene in per_scene {
        let scene = scene?;
        recognition.candidates.extend(scene.candidates);
        recognition.warnings.extend(scene.warnings);
    }
    Ok(recognition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaggerError;
    use crate::output::{Setting, TimeOfDay};
    use crate::tagger::TaggedSpan;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StaticTagger(Vec<TaggedSpan>);

    impl Tagger for StaticTagger {
        fn id(&self) -> &str {
            "static"
        }

        fn tag(&self, _text: &str) -> Result<Vec<TaggedSpan>, TaggerError> {
            Ok(self.0.clone())
        }
    }

    struct FailingTagger;

    impl Tagger for FailingTagger {
        fn id(&self) -> &str {
            "failing"
        }

        fn tag(&self, _text: &str) -> Result<Vec<TaggedSpan>, TaggerError> {
            Err(TaggerError::Failed("model crashed".into()))
        }
    }

    struct PanickingTagger;

    impl Tagger for PanickingTagger {
        fn id(&self) -> &str {
            "panicking"
        }

        fn tag(&self, _text: &str) -> Result<Vec<TaggedSpan>, TaggerError> {
            panic!("index out of bounds")
        }
    }

    /// Records how many scenes are being tagged at the same time.
    #[derive(Default)]
    struct GaugeTagger {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Tagger for Arc<GaugeTagger> {
        fn id(&self) -> &str {
            "gauge"
        }

        fn tag(&self, _text: &str) -> Result<Vec<TaggedSpan>, TaggerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(15));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn scene(index: usize, location: Option<&str>, body: &str) -> Scene {
        Scene {
            index,
            heading: location.map(|l| format!("INT. {l} - DAY")),
            scene_number: None,
            setting: Setting::Interior,
            location: location.map(str::to_string),
            sub_location: None,
            time_of_day: TimeOfDay::Day,
            body: body.to_string(),
            location_id: None,
            characters: vec![],
            objects: vec![],
            extras: vec![],
        }
    }

    #[test]
    fn confidence_is_clamped_and_empty_surfaces_dropped() {
        let tagger: Arc<dyn Tagger> = Arc::new(StaticTagger(vec![
            TaggedSpan::new("JOHN", EntityKind::Character, 1.7),
            TaggedSpan::new("  ", EntityKind::Character, 0.9),
            TaggedSpan::new("MARY", EntityKind::Character, -0.2),
        ]));
        let out = recognize_scene(0, "", &[tagger], &ObjectFilter::default(), None);
        let confidences: Vec<f32> = out.candidates.iter().map(|c| c.confidence).collect();
        assert_eq!(confidences, [1.0, 0.0]);
        assert_eq!(out.candidates[0].normalized, "john");
    }

    #[test]
    fn object_filter_applies_to_objects_only() {
        let tagger: Arc<dyn Tagger> = Arc::new(StaticTagger(vec![
            TaggedSpan::new("silence", EntityKind::Object, 0.9),
            TaggedSpan::new("knife", EntityKind::Object, 0.9),
            TaggedSpan::new("knife", EntityKind::Object, 0.2),
            TaggedSpan::new("Silence", EntityKind::Character, 0.9),
        ]));
        let out = recognize_scene(0, "", &[tagger], &ObjectFilter::default(), None);
        let kept: Vec<(&str, EntityKind)> = out
            .candidates
            .iter()
            .map(|c| (c.surface.as_str(), c.kind))
            .collect();
        assert_eq!(
            kept,
            [("knife", EntityKind::Object), ("Silence", EntityKind::Character)]
        );
    }

    #[test]
    fn failures_become_warnings() {
        let taggers: Vec<Arc<dyn Tagger>> = vec![
            Arc::new(FailingTagger),
            Arc::new(PanickingTagger),
            Arc::new(StaticTagger(vec![TaggedSpan::new(
                "JOHN",
                EntityKind::Character,
                0.9,
            )])),
        ];
        let out = recognize_scene(3, "", &taggers, &ObjectFilter::default(), None);
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.warnings.len(), 2);
        assert!(matches!(
            &out.warnings[1],
            ExtractWarning::TaggerFailed { tagger, scene: 3, detail }
                if tagger == "panicking" && detail.contains("index out of bounds")
        ));
    }

    #[tokio::test]
    async fn recognize_all_keeps_scene_order() {
        let scenes: Vec<Scene> = (0..20)
            .map(|i| scene(i, Some(&format!("ROOM {i}")), "heading\nJOHN waves.\n"))
            .collect();
        let config = ExtractionConfig::builder()
            .concurrency(4)
            .build()
            .expect("valid config");
        let taggers: Vec<Arc<dyn Tagger>> = vec![Arc::new(crate::tagger::ScreenplayTagger::new())];
        let out = recognize_all(&scenes, taggers, &config).await.expect("recognize");

        let scene_order: Vec<usize> = out.candidates.iter().map(|c| c.scene).collect();
        let mut sorted = scene_order.clone();
        sorted.sort();
        assert_eq!(scene_order, sorted);

        let first = &out.candidates[0];
        assert_eq!(first.kind, EntityKind::Location);
        assert_eq!(first.tagger, SLUGLINE_TAGGER);
        assert_eq!(first.surface, "ROOM 0");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn recognize_all_bounds_scenes_in_flight() {
        let scenes: Vec<Scene> = (0..20)
            .map(|i| scene(i, None, "JOHN waves.\n"))
            .collect();
        let config = ExtractionConfig::builder()
            .concurrency(3)
            .build()
            .expect("valid config");
        let gauge = Arc::new(GaugeTagger::default());
        let taggers: Vec<Arc<dyn Tagger>> = vec![Arc::new(Arc::clone(&gauge))];
        recognize_all(&scenes, taggers, &config).await.expect("recognize");

        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak >= 1, "tagger never ran");
        assert!(peak <= 3, "{peak} scenes tagged at once");
        assert_eq!(gauge.in_flight.load(Ordering::SeqCst), 0);
    }
}
