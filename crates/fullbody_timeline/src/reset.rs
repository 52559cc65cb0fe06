// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reset engine: undo everything a timeline did.

use crate::command::Role;
use crate::host::Host;
use crate::timeline::ActiveTimeline;

/// Restore captured scales and translations, clear sustained morphs, and
/// forget all capture and sustain state.
///
/// Restores go through the pose adapter for any role that still resolves.
/// Morph clears are skipped for participants without a presentation, but the
/// in-memory state is dropped regardless, so a second call is a no-op.
pub(crate) fn apply_reset(tl: &mut ActiveTimeline, host: &Host<'_>) {
    for (key, original) in &tl.original_scale {
        let Some(entity) = host.actors.resolve(&tl.event, key.role) else {
            continue;
        };
        host.pose.apply_scale(entity, &key.node, *original);
        tracing::info!(
            %entity,
            role = key.role.label(),
            node = %key.node,
            scale = original,
            "Reset: restored scale"
        );
    }

    for (key, original) in &tl.original_translate {
        let Some(entity) = host.actors.resolve(&tl.event, key.role) else {
            continue;
        };
        host.pose.apply_translate(entity, &key.node, *original);
        tracing::info!(
            %entity,
            role = key.role.label(),
            node = %key.node,
            pos = ?original,
            "Reset: restored translation"
        );
    }

    for role in Role::SUSTAINED {
        let morphs = &tl.sustain(role).morphs;
        if morphs.is_empty() {
            continue;
        }
        let Some(entity) = host.actors.resolve(&tl.event, role) else {
            continue;
        };
        if !host.pose.is_presentable(entity) {
            tracing::info!(
                %entity,
                role = role.label(),
                "Reset: not presentable, skipping morph clear"
            );
            continue;
        }
        for name in morphs.keys() {
            host.effects.clear(entity, name);
        }
        tracing::info!(%entity, role = role.label(), count = morphs.len(), "Reset: cleared morphs");
    }

    tl.original_scale.clear();
    tl.original_translate.clear();
    tl.caster.clear();
    tl.target.clear();
}
