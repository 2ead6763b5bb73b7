//! Entity reconciliation: merge candidates into canonical entities.
//!
//! Taggers report the same person as `JOHN`, `John`, `JOHN SMITH` and
//! `JOHN'S`; a breakdown needs one character. Candidates are grouped by
//! kind, collapsed by normalised text into *forms*, and forms are clustered
//! by containment:
//!
//! - token containment: `john` is a run of `john smith`
//! - character containment within an edit-distance budget: `john` inside
//!   `johns` (distance 1)
//!
//! Forms are visited longest first and join a cluster only when they are
//! related to every member, so a cluster can never chain `al` → `alan` →
//! `alana` into one entity. When a form fits several clusters it joins one
//! only if it is a spelling variant (within the edit budget) of that
//! cluster's seed alone; `JOHN` next to `JOHN SMITH` and `JOHN DOE` stays
//! on its own.

use crate::config::MergePolicy;
use crate::output::{CanonicalEntity, EntityId, EntityKind, EntityRegistry, ObjectCategory, Scene};
use crate::pipeline::recognize::{EntityCandidate, SLUGLINE_TAGGER};
use rapidfuzz::distance::levenshtein;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Case-fold, strip punctuation and collapse whitespace.
///
/// Apostrophes vanish (`JOHN'S` → `johns`), other punctuation separates
/// words (`JEAN-LUC` → `jean luc`), `ё` folds to `е`.
pub fn normalize_surface(surface: &str) -> String {
    let mut folded = String::with_capacity(surface.len());
    for c in surface.chars().flat_map(char::to_lowercase) {
        match c {
            '\'' | '’' | '`' => {}
            'ё' => folded.push('е'),
            c if c.is_alphanumeric() => folded.push(c),
            _ => folded.push(' '),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A distinct normalised text within one kind.
#[derive(Debug)]
struct Form {
    normalized: String,
    tokens: Vec<String>,
    char_len: usize,
    /// Position of the first candidate with this form.
    first_seen: usize,
    /// Indices into the candidate slice.
    members: Vec<usize>,
}

#[derive(Debug)]
struct Cluster {
    seed: usize,
    forms: Vec<usize>,
}

fn contains_tokens(longer: &[String], shorter: &[String]) -> bool {
    !shorter.is_empty()
        && shorter.len() <= longer.len()
        && longer.windows(shorter.len()).any(|w| w == shorter)
}

fn distance(a: &str, b: &str) -> usize {
    levenshtein::distance(a.chars(), b.chars())
}

/// Whether two forms name the same entity.
fn related(a: &Form, b: &Form, policy: &MergePolicy) -> bool {
    let (longer, shorter) = if (a.tokens.len(), a.char_len) >= (b.tokens.len(), b.char_len) {
        (a, b)
    } else {
        (b, a)
    };
    if contains_tokens(&longer.tokens, &shorter.tokens) {
        return true;
    }
    longer.normalized.contains(shorter.normalized.as_str())
        && distance(&longer.normalized, &shorter.normalized) <= policy.max_distance(longer.char_len)
}

/// Group one kind's candidates into forms, ordered by first appearance.
fn collect_forms(candidates: &[EntityCandidate], kind: EntityKind) -> Vec<Form> {
    let mut forms: Vec<Form> = Vec::new();
    let mut by_text: HashMap<&str, usize> = HashMap::new();
    for (i, c) in candidates.iter().enumerate().filter(|(_, c)| c.kind == kind) {
        match by_text.get(c.normalized.as_str()) {
            Some(&f) => forms[f].members.push(i),
            None => {
                by_text.insert(c.normalized.as_str(), forms.len());
                forms.push(Form {
                    normalized: c.normalized.clone(),
                    tokens: c.normalized.split(' ').map(str::to_string).collect(),
                    char_len: c.normalized.chars().count(),
                    first_seen: i,
                    members: vec![i],
                });
            }
        }
    }
    forms
}

fn cluster_forms(forms: &[Form], policy: &MergePolicy) -> Vec<Cluster> {
    let mut order: Vec<usize> = (0..forms.len()).collect();
    order.sort_by(|&a, &b| {
        let (fa, fb) = (&forms[a], &forms[b]);
        fb.tokens
            .len()
            .cmp(&fa.tokens.len())
            .then(fb.char_len.cmp(&fa.char_len))
            .then(fa.first_seen.cmp(&fb.first_seen))
    });

    let mut clusters: Vec<Cluster> = Vec::new();
    for f in order {
        let form = &forms[f];
        let compatible: Vec<(usize, usize)> = clusters
            .iter()
            .enumerate()
            .filter(|(_, cl)| cl.forms.iter().all(|&m| related(form, &forms[m], policy)))
            .map(|(ci, cl)| (ci, distance(&form.normalized, &forms[cl.seed].normalized)))
            .collect();

        let target = match compatible.as_slice() {
            [] => None,
            [(ci, _)] => Some(*ci),
            many => {
                // Only a spelling variant of exactly one seed may pick a side.
                let mut spelling = many.iter().filter(|(ci, d)| {
                    *d <= policy.max_distance(forms[clusters[*ci].seed].char_len)
                });
                match (spelling.next(), spelling.next()) {
                    (Some((ci, _)), None) => Some(*ci),
                    _ => {
                        debug!("'{}' fits several entities, kept apart", form.normalized);
                        None
                    }
                }
            }
        };

        match target {
            Some(ci) => clusters[ci].forms.push(f),
            None => clusters.push(Cluster {
                seed: f,
                forms: vec![f],
            }),
        }
    }

    // Identifier order is first appearance in the document.
    clusters.sort_by_key(|cl| cl.forms.iter().map(|&f| forms[f].first_seen).min());
    clusters
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Longest surface with an observation at or above the median confidence;
/// ties go to higher confidence, then to the lexicographically smaller text.
fn canonical_name(observations: &[(&str, f32)]) -> String {
    let mut confidences: Vec<f32> = observations.iter().map(|(_, c)| *c).collect();
    let median = median(&mut confidences);

    let mut best: HashMap<&str, f32> = HashMap::new();
    for &(surface, conf) in observations.iter().filter(|(_, c)| *c >= median) {
        let entry = best.entry(surface).or_insert(conf);
        *entry = entry.max(conf);
    }

    best.into_iter()
        .max_by(|(sa, ca), (sb, cb)| {
            sa.chars()
                .count()
                .cmp(&sb.chars().count())
                .then(ca.total_cmp(cb))
                .then(sb.cmp(sa))
        })
        .map(|(s, _)| s.to_string())
        .unwrap_or_default()
}

/// Most frequent category among members; ties go to the first seen.
fn dominant_category(categories: impl Iterator<Item = ObjectCategory>) -> Option<ObjectCategory> {
    let mut counts: Vec<(ObjectCategory, usize)> = Vec::new();
    for cat in categories {
        match counts.iter_mut().find(|(c, _)| *c == cat) {
            Some((_, n)) => *n += 1,
            None => counts.push((cat, 1)),
        }
    }
    let max = counts.iter().map(|(_, n)| *n).max()?;
    counts.into_iter().find(|(_, n)| *n == max).map(|(c, _)| c)
}

/// Build the canonical registry and fill every scene's entity references.
pub(crate) fn reconcile(
    candidates: &[EntityCandidate],
    scenes: &mut [Scene],
    policy: &MergePolicy,
) -> EntityRegistry {
    let mut registry = EntityRegistry::default();

    for kind in EntityKind::all() {
        let forms = collect_forms(candidates, kind);
        let clusters = cluster_forms(&forms, policy);

        for (seq, cluster) in clusters.iter().enumerate() {
            let id = EntityId::new(kind, seq + 1);
            let mut members: Vec<usize> = cluster
                .forms
                .iter()
                .flat_map(|&f| forms[f].members.iter().copied())
                .collect();
            members.sort_unstable();
            let members: Vec<&EntityCandidate> = members.iter().map(|&i| &candidates[i]).collect();

            let observations: Vec<(&str, f32)> = members
                .iter()
                .map(|c| (c.surface.as_str(), c.confidence))
                .collect();
            let scene_set: BTreeSet<usize> = members.iter().map(|c| c.scene).collect();

            for &index in &scene_set {
                let Some(scene) = scenes.get_mut(index) else {
                    continue;
                };
                match kind {
                    EntityKind::Character => scene.characters.push(id.clone()),
                    EntityKind::Object => scene.objects.push(id.clone()),
                    EntityKind::Location => {
                        let from_slugline = members
                            .iter()
                            .any(|c| c.scene == index && c.tagger == SLUGLINE_TAGGER);
                        if from_slugline {
                            scene.location_id = Some(id.clone());
                        }
                    }
                }
            }

            registry.of_kind_mut(kind).push(CanonicalEntity {
                id,
                kind,
                name: canonical_name(&observations),
                aliases: members.iter().map(|c| c.surface.clone()).collect(),
                scenes: scene_set,
                confidence: members.iter().map(|c| c.confidence).fold(0.0, f32::max),
                category: dominant_category(members.iter().filter_map(|c| c.category)),
            });
        }
        debug!(
            "Reconciled {} {} form(s) into {} entities",
            forms.len(),
            kind,
            clusters.len()
        );
    }

    registry
}
