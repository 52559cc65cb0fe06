// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sustain engine.
//!
//! Translate offsets and morph values are overwritten by the external system
//! every frame, so they are re-asserted instead of applied once. Translate
//! offsets are additive: the engine recovers the frame's base pose before
//! adding the offset so it never compounds onto its own previous write.

use crate::command::Role;
use crate::event::EntityId;
use crate::host::{Host, PoseAdapter};
use crate::timeline::{ActiveTimeline, RoleSustain};
use std::fmt;

/// When, relative to the external frame update, a post-update sustain runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SustainPhase {
    /// Directly after the external update
    Immediate,
    /// Later in the same frame
    Deferred,
    /// Last chance before the frame is presented
    Late,
}

impl SustainPhase {
    /// Every phase, in the order they run within a frame
    pub const ALL: [SustainPhase; 3] = [Self::Immediate, Self::Deferred, Self::Late];
}

impl TryFrom<u8> for SustainPhase {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Immediate),
            1 => Ok(Self::Deferred),
            2 => Ok(Self::Late),
            other => Err(other),
        }
    }
}

impl fmt::Display for SustainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = match self {
            Self::Immediate => 0,
            Self::Deferred => 1,
            Self::Late => 2,
        };
        write!(f, "{index}")
    }
}

fn approx_eq3(a: [f32; 3], b: [f32; 3], epsilon: f32) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= epsilon)
}

/// Write `base + offset` for every sustained node of one participant.
///
/// If a node still holds what we wrote last time, its base is recovered by
/// subtracting the offset used for that write, which may differ from the
/// current offset right after a refresh. Otherwise another writer produced
/// this frame's pose and the current value is the base.
pub(crate) fn reassert_translates(
    entity: EntityId,
    sustain: &mut RoleSustain,
    pose: &dyn PoseAdapter,
    epsilon: f32,
) -> usize {
    let mut written = 0;
    for (node, offset) in &sustain.translate_offsets {
        let Some(current) = pose.try_get_translate(entity, node) else {
            continue;
        };

        let base = match sustain.last_applied.get(node) {
            Some((last, applied_with)) if approx_eq3(current, *last, epsilon) => [
                current[0] - applied_with[0],
                current[1] - applied_with[1],
                current[2] - applied_with[2],
            ],
            _ => current,
        };

        let applied = [base[0] + offset[0], base[1] + offset[1], base[2] + offset[2]];
        pose.apply_translate(entity, node, applied);
        sustain.last_applied.insert(node.clone(), (applied, *offset));
        written += 1;
    }
    written
}

/// Tick-driven sustain for one timeline.
///
/// Translates are re-asserted every call; morphs only once `now` has passed
/// the timeline's throttle clock.
pub(crate) fn sustain_tick(
    tl: &mut ActiveTimeline,
    host: &Host<'_>,
    now: f64,
    morph_interval: f64,
    epsilon: f32,
) {
    for role in Role::SUSTAINED {
        if tl.sustain(role).translate_offsets.is_empty() {
            continue;
        }
        let Some(entity) = host.presentable(&tl.event, role) else {
            continue;
        };
        reassert_translates(entity, tl.sustain_mut(role), host.pose, epsilon);
    }

    if now < tl.next_morph_sustain_at {
        return;
    }
    tl.next_morph_sustain_at = now + morph_interval;

    for role in Role::SUSTAINED {
        let morphs = &tl.sustain(role).morphs;
        if morphs.is_empty() {
            continue;
        }
        let Some(entity) = host.presentable(&tl.event, role) else {
            continue;
        };
        for (name, value) in morphs {
            host.effects.set(entity, name, *value);
        }
    }
}

/// Post-update sustain for one timeline, limited to roles that resolve to
/// `entity`.
pub(crate) fn sustain_after_update(
    tl: &mut ActiveTimeline,
    entity: EntityId,
    host: &Host<'_>,
    epsilon: f32,
) -> usize {
    if !tl.event.is_valid() {
        return 0;
    }

    let mut written = 0;
    for role in Role::SUSTAINED {
        if tl.sustain(role).translate_offsets.is_empty() {
            continue;
        }
        if host.actors.resolve(&tl.event, role) != Some(entity) {
            continue;
        }
        written += reassert_translates(entity, tl.sustain_mut(role), host.pose, epsilon);
    }
    written
}
