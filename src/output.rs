//! Output types: the breakdown record and everything it owns.
//!
//! A [`BreakdownRecord`] is a single-owner tree. Scenes refer to entities by
//! [`EntityId`] only, never by surface text or by reference into the raw
//! document, so a record can be serialised, cloned and sent across threads
//! without lifetimes.

use crate::error::ExtractWarning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ── Scene attributes ─────────────────────────────────────────────────────

/// Time of day printed at the end of a slugline, mapped to a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeOfDay {
    Day,
    Night,
    Dusk,
    Dawn,
    #[default]
    Unspecified,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Day => "DAY",
            TimeOfDay::Night => "NIGHT",
            TimeOfDay::Dusk => "DUSK",
            TimeOfDay::Dawn => "DAWN",
            TimeOfDay::Unspecified => "UNSPECIFIED",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interior/exterior marker from the slugline prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Setting {
    Interior,
    Exterior,
    InteriorExterior,
    #[default]
    Unspecified,
}

impl Setting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Setting::Interior => "INT",
            Setting::Exterior => "EXT",
            Setting::InteriorExterior => "INT/EXT",
            Setting::Unspecified => "",
        }
    }
}

// ── Entities ─────────────────────────────────────────────────────────────

/// The closed set of entity kinds the breakdown tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Character,
    Location,
    Object,
}

impl EntityKind {
    /// Identifier prefix used by [`EntityId::new`].
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Character => "CHR",
            EntityKind::Location => "LOC",
            EntityKind::Object => "OBJ",
        }
    }

    pub fn all() -> [EntityKind; 3] {
        [EntityKind::Character, EntityKind::Location, EntityKind::Object]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Character => "CHARACTER",
            EntityKind::Location => "LOCATION",
            EntityKind::Object => "OBJECT",
        };
        f.write_str(s)
    }
}

/// Production department an object belongs to, when a tagger knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectCategory {
    Prop,
    Vehicle,
    Effect,
    Equipment,
}

/// Stable identifier of a canonical entity, e.g. `CHR-0001`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Build the identifier for the `seq`-th (1-based) entity of `kind`.
    pub fn new(kind: EntityKind, seq: usize) -> Self {
        Self(format!("{}-{:04}", kind.prefix(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The entity kind encoded in the prefix, if recognisable.
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::all()
            .into_iter()
            .find(|k| self.0.starts_with(k.prefix()))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A deduplicated entity after alias merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Display name chosen among the aliases.
    pub name: String,
    /// Every distinct surface form merged into this entity.
    pub aliases: BTreeSet<String>,
    /// Scene indices where the entity was detected.
    pub scenes: BTreeSet<usize>,
    /// Maximum confidence among the merged detections.
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ObjectCategory>,
}

/// Canonical entities partitioned by kind, each list ordered by identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRegistry {
    pub characters: Vec<CanonicalEntity>,
    pub locations: Vec<CanonicalEntity>,
    pub objects: Vec<CanonicalEntity>,
}

impl EntityRegistry {
    pub fn of_kind(&self, kind: EntityKind) -> &[CanonicalEntity] {
        match kind {
            EntityKind::Character => &self.characters,
            EntityKind::Location => &self.locations,
            EntityKind::Object => &self.objects,
        }
    }

    pub(crate) fn of_kind_mut(&mut self, kind: EntityKind) -> &mut Vec<CanonicalEntity> {
        match kind {
            EntityKind::Character => &mut self.characters,
            EntityKind::Location => &mut self.locations,
            EntityKind::Object => &mut self.objects,
        }
    }

    /// Look up an entity by identifier.
    pub fn get(&self, id: &EntityId) -> Option<&CanonicalEntity> {
        self.of_kind(id.kind()?).iter().find(|e| &e.id == id)
    }

    /// Find an entity of `kind` whose name or alias matches `name`
    /// case-insensitively.
    pub fn find_by_name(&self, kind: EntityKind, name: &str) -> Option<&CanonicalEntity> {
        let wanted = name.to_lowercase();
        self.of_kind(kind).iter().find(|e| {
            e.name.to_lowercase() == wanted || e.aliases.iter().any(|a| a.to_lowercase() == wanted)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalEntity> {
        self.characters
            .iter()
            .chain(self.locations.iter())
            .chain(self.objects.iter())
    }

    pub fn len(&self) -> usize {
        self.characters.len() + self.locations.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Scenes ───────────────────────────────────────────────────────────────

/// Background performers mentioned in a scene (`A CROWD (30) gathers`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdNote {
    /// Indicator in its dictionary form (`crowd`, `толпа`).
    pub label: String,
    /// Head count printed in parentheses after the indicator, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl fmt::Display for CrowdNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            Some(n) => write!(f, "{} ({})", self.label, n),
            None => write!(f, "{} (?)", self.label),
        }
    }
}

/// One scene of the breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// 0-based position in the document; contiguous across the record.
    pub index: usize,
    /// Slugline text, `None` for the preamble.
    pub heading: Option<String>,
    /// Production scene number printed next to the slugline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_number: Option<String>,
    pub setting: Setting,
    /// Slugline location; `None` means UNSPECIFIED.
    pub location: Option<String>,
    /// Part of the location after its first inner separator:
    /// `KITCHEN` in `JOHN'S HOUSE - KITCHEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_location: Option<String>,
    pub time_of_day: TimeOfDay,
    /// Full text span of the scene, heading line included. Every line is
    /// terminated by `\n`.
    pub body: String,
    pub location_id: Option<EntityId>,
    pub characters: Vec<EntityId>,
    pub objects: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<CrowdNote>,
}

impl Scene {
    /// The scene text without its heading line.
    pub fn content(&self) -> &str {
        if self.heading.is_none() {
            return &self.body;
        }
        match self.body.find('\n') {
            Some(pos) => &self.body[pos + 1..],
            None => "",
        }
    }

    /// The location without its sub-location: `JOHN'S HOUSE` in
    /// `JOHN'S HOUSE - KITCHEN`.
    pub fn location_object(&self) -> Option<&str> {
        let location = self.location.as_deref()?;
        let Some(sub) = self.sub_location.as_deref() else {
            return Some(location);
        };
        let head = location
            .strip_suffix(sub)
            .unwrap_or(location)
            .trim_end_matches(|c: char| matches!(c, '-' | '–' | '—' | '.') || c.is_whitespace());
        Some(if head.is_empty() { location } else { head })
    }

    pub fn is_preamble(&self) -> bool {
        self.heading.is_none()
    }

    /// All entity identifiers this scene references.
    pub fn references(&self) -> impl Iterator<Item = &EntityId> {
        self.location_id
            .iter()
            .chain(self.characters.iter())
            .chain(self.objects.iter())
    }
}

// ── Record ───────────────────────────────────────────────────────────────

/// Document-level metadata carried into the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_name: Option<String>,
    /// ISO 639-1 code (`en`, `ru`) or `und` when undetermined.
    pub language: String,
    /// Encoding detected by [`crate::pipeline::input::decode_input`], if
    /// the document arrived as bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Number of logical lines after normalisation.
    pub line_count: usize,
}

/// Counters and timings for one extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub scene_count: usize,
    /// Candidates kept after object filtering, across all taggers.
    pub candidate_count: usize,
    /// Identifiers of the taggers that ran.
    pub taggers_used: Vec<String>,
    pub recognize_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The complete breakdown of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRecord {
    pub metadata: DocumentMetadata,
    pub scenes: Vec<Scene>,
    pub registry: EntityRegistry,
    pub warnings: Vec<ExtractWarning>,
    pub stats: ExtractionStats,
}

impl BreakdownRecord {
    /// Resolve an identifier referenced by one of the scenes.
    pub fn entity(&self, id: &EntityId) -> Option<&CanonicalEntity> {
        self.registry.get(id)
    }

    /// Display names of the characters in `scene`, in identifier order.
    pub fn character_names(&self, scene: &Scene) -> Vec<&str> {
        self.names(&scene.characters)
    }

    /// Display names of the objects in `scene`, in identifier order.
    pub fn object_names(&self, scene: &Scene) -> Vec<&str> {
        self.names(&scene.objects)
    }

    fn names<'a>(&'a self, ids: &[EntityId]) -> Vec<&'a str> {
        ids.iter()
            .filter_map(|id| self.entity(id))
            .map(|e| e.name.as_str())
            .collect()
    }

    /// True when the record was produced with at least one degraded stage.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}
