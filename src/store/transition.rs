//! Toggle transition rules.
//!
//! Single-type ("like"):
//! - actor absent: add actor, increment count
//! - actor present: remove actor, decrement count (floor 0)
//!
//! Multi-type ("reaction"):
//! - no reaction: add it, increment total and the type's count
//! - same type: remove it, decrement total and the type's count
//! - different type: replace it, total unchanged, move one count between types
//!
//! A type whose count reaches zero is removed from the per-type map.

use std::collections::BTreeMap;

use super::entity::{InteractionMode, InteractionState, Interactions, Intent, Reaction};
use crate::core::{ActorId, ReactionType};

/// Apply one toggle by `actor` to `state`.
///
/// `reaction` must be `Some` for multi-type entities and `None` for
/// single-type ones; on mismatch `state` is untouched and the mode the entity
/// expects is returned.
pub fn apply_toggle(
    state: &mut InteractionState,
    actor: &ActorId,
    reaction: Option<&ReactionType>,
) -> Result<Intent, InteractionMode> {
    match (&mut state.interactions, reaction) {
        (Interactions::Likes(actors), None) => {
            if actors.remove(actor) {
                state.count = state.count.saturating_sub(1);
                Ok(Intent::Liked(false))
            } else {
                actors.insert(actor.clone());
                state.count += 1;
                Ok(Intent::Liked(true))
            }
        }
        (Interactions::Reactions(reactions), Some(reaction_type)) => {
            let counts = &mut state.counts_by_type;
            match reactions.iter().position(|r| &r.actor == actor) {
                None => {
                    reactions.push(Reaction {
                        actor: actor.clone(),
                        reaction_type: reaction_type.clone(),
                    });
                    state.count += 1;
                    increment(counts, reaction_type);
                    Ok(Intent::Reacted(Some(reaction_type.clone())))
                }
                Some(index) if &reactions[index].reaction_type == reaction_type => {
                    reactions.remove(index);
                    state.count = state.count.saturating_sub(1);
                    decrement(counts, reaction_type);
                    Ok(Intent::Reacted(None))
                }
                Some(index) => {
                    let previous =
                        std::mem::replace(&mut reactions[index].reaction_type, reaction_type.clone());
                    decrement(counts, &previous);
                    increment(counts, reaction_type);
                    Ok(Intent::Reacted(Some(reaction_type.clone())))
                }
            }
        }
        (Interactions::Likes(_), Some(_)) => Err(InteractionMode::Like),
        (Interactions::Reactions(_), None) => Err(InteractionMode::Reaction),
    }
}

fn increment(counts: &mut BTreeMap<ReactionType, u64>, reaction_type: &ReactionType) {
    *counts.entry(reaction_type.clone()).or_insert(0) += 1;
}

fn decrement(counts: &mut BTreeMap<ReactionType, u64>, reaction_type: &ReactionType) {
    if let Some(count) = counts.get_mut(reaction_type) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(reaction_type);
        }
    }
}
