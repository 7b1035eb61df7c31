/// Shadow slot priority selection

use std::cmp::Ordering;
use hecs::Entity;

/// A light competing for a shadow map slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCandidate {
    pub entity: Entity,
    /// Higher wins
    pub priority: f64,
}

/// Top `capacity` candidates, highest priority first
///
/// Ties are broken by entity id so the choice is stable from frame to frame.
/// Candidates past `capacity` get no shadow this frame.
pub fn select_shadow_casters(mut candidates: Vec<ShadowCandidate>, capacity: usize) -> Vec<Entity> {
    candidates.sort_by(|a, b| match b.priority.total_cmp(&a.priority) {
        Ordering::Equal => a.entity.to_bits().cmp(&b.entity.to_bits()),
        other => other,
    });
    candidates.truncate(capacity);
    candidates.into_iter().map(|c| c.entity).collect()
}

/// Spread `selected` over `slots`, keeping lights in the slot they held before
///
/// Returns the new slot occupancy.
pub fn assign_slots(previous: &[Option<Entity>], selected: &[Entity]) -> Vec<Option<Entity>> {
    let mut slots: Vec<Option<Entity>> = previous
        .iter()
        .map(|prev| prev.filter(|e| selected.contains(e)))
        .collect();

    for &entity in selected {
        if slots.contains(&Some(entity)) {
            continue;
        }
        match slots.iter_mut().find(|s| s.is_none()) {
            Some(free) => *free = Some(entity),
            None => break,
        }
    }
    slots
}
