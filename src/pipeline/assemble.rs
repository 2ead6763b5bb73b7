//! Breakdown assembly: compose the final record and check its integrity.
//!
//! Reconciliation builds scene references and the registry together, so a
//! dangling identifier here means a bug upstream. The check is cheap
//! (linear in references) and turns such a bug into an
//! [`ExtractError::Integrity`] instead of a record that lies.

use crate::error::{ExtractError, ExtractWarning};
use crate::output::{
    BreakdownRecord, DocumentMetadata, EntityId, EntityKind, EntityRegistry, ExtractionStats, Scene,
};
use std::collections::HashSet;

/// Compose and validate a [`BreakdownRecord`].
pub(crate) fn assemble(
    metadata: DocumentMetadata,
    scenes: Vec<Scene>,
    registry: EntityRegistry,
    warnings: Vec<ExtractWarning>,
    stats: ExtractionStats,
) -> Result<BreakdownRecord, ExtractError> {
    validate(&scenes, &registry)?;
    Ok(BreakdownRecord {
        metadata,
        scenes,
        registry,
        warnings,
        stats,
    })
}

fn integrity(detail: String) -> ExtractError {
    ExtractError::Integrity { detail }
}

/// Check scene indices, scene references and entity scene sets.
pub fn validate(scenes: &[Scene], registry: &EntityRegistry) -> Result<(), ExtractError> {
    for (position, scene) in scenes.iter().enumerate() {
        if scene.index != position {
            return Err(integrity(format!(
                "scene at position {} has index {}",
                position, scene.index
            )));
        }
    }

    let mut ids: HashSet<&EntityId> = HashSet::new();
    for kind in EntityKind::all() {
        for entity in registry.of_kind(kind) {
            if entity.kind != kind || entity.id.kind() != Some(kind) {
                return Err(integrity(format!(
                    "entity {} filed under {}",
                    entity.id, kind
                )));
            }
            if !ids.insert(&entity.id) {
                return Err(integrity(format!("duplicate entity id {}", entity.id)));
            }
            if let Some(&bad) = entity.scenes.iter().find(|&&s| s >= scenes.len()) {
                return Err(integrity(format!(
                    "{} lists scene {} of {}",
                    entity.id,
                    bad,
                    scenes.len()
                )));
            }
        }
    }

    for scene in scenes {
        let expected = scene
            .location_id
            .iter()
            .map(|id| (id, EntityKind::Location))
            .chain(scene.characters.iter().map(|id| (id, EntityKind::Character)))
            .chain(scene.objects.iter().map(|id| (id, EntityKind::Object)));
        for (id, kind) in expected {
            match registry.get(id) {
                Some(entity) if entity.kind == kind => {}
                Some(entity) => {
                    return Err(integrity(format!(
                        "scene {} lists {} {} as {}",
                        scene.index, entity.kind, id, kind
                    )))
                }
                None => {
                    return Err(integrity(format!(
                        "scene {} references missing {}",
                        scene.index, id
                    )))
                }
            }
        }
    }

    Ok(())
}
