//! End-to-end tests for screenplay-breakdown.
//!
//! Every test runs the full pipeline through the public API; no model files
//! or network access are needed.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use screenplay_breakdown::pipeline::{normalize::normalize, reconcile::normalize_surface, segment::segment};
use screenplay_breakdown::{
    extract, BreakdownRecord, Column, EntityKind, ExtractError, ExtractWarning, ExtractionConfig,
    ExtractionProgressCallback, Extractor, ObjectCategory, Setting, TablePreset, TaggedSpan,
    Tagger, TaggerError, TaggerRegistry, TaggerSlot, TimeOfDay,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

const KITCHEN_STREET: &str =
    "INT. KITCHEN - DAY\nJOHN enters holding a KNIFE.\n\nEXT. STREET - NIGHT\nJOHN runs. MARY watches.";

fn scenes_of(record: &BreakdownRecord, kind: EntityKind, name: &str) -> Vec<usize> {
    record
        .registry
        .find_by_name(kind, name)
        .unwrap_or_else(|| panic!("no {kind} named {name}"))
        .scenes
        .iter()
        .copied()
        .collect()
}

/// Zero the wall-clock fields so two runs can be compared.
fn without_timings(mut record: BreakdownRecord) -> BreakdownRecord {
    record.stats.recognize_duration_ms = 0;
    record.stats.total_duration_ms = 0;
    record
}

struct BrokenTagger;

impl Tagger for BrokenTagger {
    fn id(&self) -> &str {
        "broken"
    }

    fn tag(&self, _text: &str) -> Result<Vec<TaggedSpan>, TaggerError> {
        Err(TaggerError::Failed("weights corrupted".into()))
    }
}

#[derive(Default)]
struct CountingCallback {
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    entities: AtomicUsize,
}

impl ExtractionProgressCallback for CountingCallback {
    fn on_extraction_start(&self, total_scenes: usize) {
        self.started.store(total_scenes, Ordering::SeqCst);
    }

    fn on_scene_complete(&self, _index: usize, _total: usize, _candidates: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_tagger_error(&self, _tagger: &str, _index: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_extraction_complete(&self, _total_scenes: usize, entities: usize) {
        self.entities.store(entities, Ordering::SeqCst);
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn two_scene_script() {
    let record = extract(KITCHEN_STREET, None).expect("extract");

    assert_eq!(record.scenes.len(), 2);
    let (s0, s1) = (&record.scenes[0], &record.scenes[1]);
    assert_eq!(s0.location.as_deref(), Some("KITCHEN"));
    assert_eq!(s0.time_of_day, TimeOfDay::Day);
    assert_eq!(s0.setting, Setting::Interior);
    assert_eq!(s1.location.as_deref(), Some("STREET"));
    assert_eq!(s1.time_of_day, TimeOfDay::Night);
    assert_eq!(s1.setting, Setting::Exterior);

    assert_eq!(scenes_of(&record, EntityKind::Character, "JOHN"), [0, 1]);
    assert_eq!(scenes_of(&record, EntityKind::Character, "MARY"), [1]);
    assert_eq!(scenes_of(&record, EntityKind::Object, "KNIFE"), [0]);
    assert_eq!(record.registry.characters.len(), 2);
    assert_eq!(record.registry.objects.len(), 1);
    assert_eq!(record.registry.objects[0].category, Some(ObjectCategory::Prop));

    assert_eq!(record.character_names(s0), ["JOHN"]);
    assert_eq!(record.character_names(s1), ["JOHN", "MARY"]);
    assert_eq!(record.object_names(s0), ["KNIFE"]);
    assert!(record.object_names(s1).is_empty());

    let kitchen = s0.location_id.as_ref().expect("location id");
    assert_eq!(record.entity(kitchen).map(|e| e.name.as_str()), Some("KITCHEN"));
    assert_eq!(record.metadata.language, "en");
    assert!(record.warnings.is_empty(), "{:?}", record.warnings);
}

#[test]
fn identifiers_follow_first_appearance() {
    let record = extract(KITCHEN_STREET, None).expect("extract");
    let ids: Vec<&str> = record.registry.characters.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["CHR-0001", "CHR-0002"]);
    assert_eq!(record.registry.characters[0].name, "JOHN");
    assert_eq!(record.registry.locations[1].id.as_str(), "LOC-0002");
}

#[test]
fn text_without_sluglines_is_one_preamble() {
    let text = "Notes on the treatment.\nNobody has read it yet.";
    let record = extract(text, Some("en")).expect("extract");

    assert_eq!(record.scenes.len(), 1);
    let scene = &record.scenes[0];
    assert_eq!(scene.index, 0);
    assert!(scene.is_preamble());
    assert_eq!(scene.location, None);
    assert_eq!(scene.location_id, None);
    assert_eq!(scene.time_of_day, TimeOfDay::Unspecified);
    assert_eq!(scene.body, "Notes on the treatment.\nNobody has read it yet.\n");
}

#[test]
fn all_taggers_unavailable_still_segments() {
    let registry = TaggerRegistry::empty()
        .with(TaggerSlot::unavailable("ner", "model not installed"))
        .with(TaggerSlot::lazy("lexicon-xx", || {
            Err(TaggerError::Unavailable("gazetteer missing".into()))
        }));
    let extractor = Extractor::new(ExtractionConfig::default(), registry);
    let record = extractor.extract(KITCHEN_STREET, None).expect("extract");

    assert_eq!(record.scenes.len(), 2);
    assert!(record.registry.characters.is_empty());
    assert!(record.registry.objects.is_empty());
    assert_eq!(record.registry.locations.len(), 2);
    assert!(record.is_degraded());
    let unavailable: Vec<&str> = record
        .warnings
        .iter()
        .filter_map(|w| match w {
            ExtractWarning::TaggerUnavailable { tagger, .. } => Some(tagger.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(unavailable, ["ner", "lexicon-xx"]);
}

#[test]
fn failing_tagger_degrades_without_losing_the_rest() {
    let callback = Arc::new(CountingCallback::default());
    let config = ExtractionConfig::builder()
        .progress_callback(callback.clone() as Arc<dyn ExtractionProgressCallback>)
        .build()
        .expect("config");
    let extractor = Extractor::new(config, TaggerRegistry::builtin().with_tagger(BrokenTagger));
    let record = extractor.extract(KITCHEN_STREET, None).expect("extract");

    assert_eq!(scenes_of(&record, EntityKind::Character, "JOHN"), [0, 1]);
    let failed: Vec<usize> = record
        .warnings
        .iter()
        .filter_map(|w| match w {
            ExtractWarning::TaggerFailed { tagger, scene, .. } if tagger == "broken" => Some(*scene),
            _ => None,
        })
        .collect();
    assert_eq!(failed, [0, 1]);

    assert_eq!(callback.started.load(Ordering::SeqCst), 2);
    assert_eq!(callback.completed.load(Ordering::SeqCst), 2);
    assert_eq!(callback.errors.load(Ordering::SeqCst), 2);
    assert_eq!(callback.entities.load(Ordering::SeqCst), record.registry.len());
}

#[test]
fn binary_payload_is_rejected() {
    let mut text = String::from("%PDF-1.7\n");
    text.push_str(&"\u{0}\u{1}\u{2}".repeat(40));
    assert!(matches!(
        extract(&text, None),
        Err(ExtractError::BinaryInput { ratio }) if ratio > 0.5
    ));
}

#[tokio::test]
async fn binary_bytes_are_rejected() {
    let mut bytes = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    bytes.extend_from_slice(&[0u8; 256]);
    let result = Extractor::default().extract_bytes(&bytes, None).await;
    assert!(matches!(result, Err(ExtractError::BinaryInput { .. })));
}

#[test]
fn cue_and_action_forms_merge() {
    let text = "INT. OFFICE - DAY\nJOHN SMITH\nHello.\n\nJOHN sits down.\n";
    let record = extract(text, Some("en")).expect("extract");

    assert_eq!(record.registry.characters.len(), 1);
    let john = &record.registry.characters[0];
    assert_eq!(john.name, "JOHN SMITH");
    assert_eq!(
        john.aliases,
        BTreeSet::from(["JOHN".to_string(), "JOHN SMITH".to_string()])
    );
    assert_eq!(john.confidence, 0.95);
}

#[tokio::test]
async fn russian_script() {
    let text = "ИНТ. КУХНЯ - ДЕНЬ\nИван говорит по телефону.\n\n\
                НАТ. УЛИЦА - НОЧЬ\nИВАН бежит. МАРИЯ смотрит на машину.\n";
    let record = Extractor::default()
        .extract_async(text, None)
        .await
        .expect("extract");

    assert_eq!(record.metadata.language, "ru");
    assert_eq!(record.scenes.len(), 2);
    assert_eq!(record.scenes[0].location.as_deref(), Some("КУХНЯ"));
    assert_eq!(record.scenes[0].time_of_day, TimeOfDay::Day);
    assert_eq!(record.scenes[1].time_of_day, TimeOfDay::Night);

    assert_eq!(scenes_of(&record, EntityKind::Character, "Иван"), [0, 1]);
    assert_eq!(scenes_of(&record, EntityKind::Character, "МАРИЯ"), [1]);
    assert_eq!(scenes_of(&record, EntityKind::Object, "телефону"), [0]);
    let car = record
        .registry
        .find_by_name(EntityKind::Object, "машину")
        .expect("vehicle");
    assert_eq!(car.category, Some(ObjectCategory::Vehicle));
    assert!(record.stats.taggers_used.contains(&"lexicon-ru".to_string()));
    assert!(!record.stats.taggers_used.contains(&"lexicon-en".to_string()));
}

#[tokio::test]
async fn legacy_encoding_is_detected() {
    let text = "ИНТ. КУХНЯ - ДЕНЬ\n\
                Иван говорит по телефону. Иван смотрит в окно, потом садится за стол.\n\
                Мария входит на кухню с папкой документов и кладёт её на стол.\n\
                НАТ. УЛИЦА - НОЧЬ\nМашина медленно проезжает мимо фонаря.\n";
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(text);
    let record = Extractor::default()
        .extract_bytes(&bytes, None)
        .await
        .expect("extract");
    assert_eq!(record.metadata.encoding.as_deref(), Some("windows-1251"));
    assert_eq!(record.scenes[0].location.as_deref(), Some("КУХНЯ"));
}

#[test]
fn page_furniture_does_not_leak_into_scenes() {
    let text = "THE LONG NIGHT\nINT. HALL - DAY\nJOHN waits.\n2.\n\u{000C}\
                THE LONG NIGHT\nMARY arrives.\n(MORE)\n3.\n\u{000C}\
                THE LONG NIGHT\nEXT. YARD - DUSK\nThey leave.\n4.\n";
    let record = extract(text, Some("en")).expect("extract");

    let bodies: String = record.scenes.iter().map(|s| s.body.as_str()).collect();
    assert!(!bodies.contains("THE LONG NIGHT"), "{bodies}");
    assert!(!bodies.contains("(MORE)"), "{bodies}");
    assert!(!bodies.contains("3."), "{bodies}");
    assert_eq!(record.scenes.first().map(|s| s.heading.is_some()), Some(true));
    assert_eq!(record.scenes.len(), 2);
    assert_eq!(record.scenes[1].time_of_day, TimeOfDay::Dusk);
}

#[test]
fn basic_table_rows() {
    let record = extract(KITCHEN_STREET, None).expect("extract");
    let table = record.to_table(&TablePreset::Basic);
    assert_eq!(
        table.rows,
        vec![
            vec!["0", "", "DAY", "INT", "KITCHEN", "JOHN", "KNIFE"],
            vec!["1", "", "NIGHT", "EXT", "STREET", "JOHN, MARY", ""],
        ]
        .into_iter()
        .map(|row| row.into_iter().map(String::from).collect::<Vec<_>>())
        .collect::<Vec<_>>()
    );

    let extended = record.to_table(&TablePreset::Extended);
    let cell = |column: Column| {
        let at = extended
            .columns
            .iter()
            .position(|c| *c == column)
            .unwrap_or_else(|| panic!("no {column:?} column"));
        extended.rows[0][at].as_str()
    };
    assert_eq!(cell(Column::Props), "KNIFE");
    assert_eq!(cell(Column::SubLocation), "");
    assert!(cell(Column::Synopsis).starts_with("JOHN enters holding a KNIFE."));
}

#[test]
fn returning_to_a_location_on_every_page_keeps_the_scene() {
    let text = "INT. KITCHEN - DAY\nJOHN cooks.\n\u{000C}\
                EXT. STREET - NIGHT\nMARY runs.\n\u{000C}\
                INT. KITCHEN - DAY\nJOHN eats.\n";
    let record = extract(text, Some("en")).expect("extract");

    let headings: Vec<Option<&str>> = record.scenes.iter().map(|s| s.heading.as_deref()).collect();
    assert_eq!(
        headings,
        [
            Some("INT. KITCHEN - DAY"),
            Some("EXT. STREET - NIGHT"),
            Some("INT. KITCHEN - DAY"),
        ]
    );
    assert!(record.scenes[0].content().contains("JOHN cooks."));
    assert_eq!(record.scenes[0].location_id, record.scenes[2].location_id);
    assert_eq!(record.registry.locations.len(), 2);
}

#[test]
fn sub_locations_and_extras_reach_the_table() {
    let text = "INT. JOHN'S HOUSE - KITCHEN - DAY\n\
                JOHN cooks. A CROWD (30) watches through the window.\n\n\
                ИНТ. ЧЕЛЮСКИН. КАЮТ-КОМПАНИЯ - НОЧЬ\n\
                Гости (12) молчат.\n";
    let record = extract(text, None).expect("extract");

    assert_eq!(record.scenes[0].sub_location.as_deref(), Some("KITCHEN"));
    assert_eq!(record.scenes[0].location_object(), Some("JOHN'S HOUSE"));
    assert_eq!(record.scenes[1].sub_location.as_deref(), Some("КАЮТ-КОМПАНИЯ"));
    assert_eq!(record.scenes[1].location_object(), Some("ЧЕЛЮСКИН"));

    let table = record.to_table(&TablePreset::Custom(vec![
        Column::Scene,
        Column::SubLocation,
        Column::Extras,
    ]));
    assert_eq!(
        table.to_csv().expect("csv"),
        "Scene,Sub-location,Extras\r\n0,KITCHEN,crowd (30)\r\n1,КАЮТ-КОМПАНИЯ,гости (12)\r\n"
    );
}

#[test]
fn record_serialises_to_json() {
    let record = extract(KITCHEN_STREET, None).expect("extract");
    let json = serde_json::to_value(&record).expect("serialise");
    assert_eq!(json["scenes"][0]["time_of_day"], "DAY");
    assert_eq!(json["scenes"].as_array().map(Vec::len), Some(2));
}

// ── Properties ───────────────────────────────────────────────────────────────

const LINES: &[&str] = &[
    "INT. KITCHEN - DAY",
    "EXT. STREET - NIGHT",
    "INT. JOHN'S HOUSE - LIVING ROOM - NIGHT",
    "12 INT. WAREHOUSE - DAWN 12",
    "JOHN enters holding a KNIFE.",
    "JOHN SMITH (CONT'D)",
    "MARY",
    "Where were you?",
    "John says hello.",
    "A taxi waits in the rain.",
    "CUT TO:",
    "(MORE)",
    "12.",
    "",
    "   ",
    "\u{000C}",
    "Иван говорит по телефону.",
];

fn arb_script() -> impl Strategy<Value = String> {
    proptest::collection::vec(prop::sample::select(LINES.to_vec()), 0..40)
        .prop_map(|lines| lines.join("\n"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_segmentation_covers_the_text(script in arb_script()) {
        let normalized = normalize(&script, &ExtractionConfig::default());
        let scenes = segment(&normalized);
        let joined: String = scenes.iter().map(|s| s.body.as_str()).collect();
        prop_assert_eq!(joined, normalized.to_text());
        for (i, scene) in scenes.iter().enumerate() {
            prop_assert_eq!(scene.index, i);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_records_are_consistent(script in arb_script()) {
        let record = extract(&script, None).expect("extract");

        for (i, scene) in record.scenes.iter().enumerate() {
            prop_assert_eq!(scene.index, i);
            for id in scene.references() {
                prop_assert!(record.entity(id).is_some(), "dangling {}", id);
            }
        }

        for entity in record.registry.iter() {
            let name = normalize_surface(&entity.name);
            prop_assert!(entity.aliases.contains(&entity.name));
            for alias in &entity.aliases {
                let alias = normalize_surface(alias);
                prop_assert!(
                    alias.contains(&name) || name.contains(&alias),
                    "{} does not relate to {}", alias, name
                );
            }
        }
    }

    #[test]
    fn prop_extraction_is_idempotent(script in arb_script()) {
        let first = without_timings(extract(&script, None).expect("extract"));
        let second = without_timings(extract(&script, None).expect("extract"));
        prop_assert_eq!(first, second);
    }
}
