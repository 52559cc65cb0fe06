// SPDX-License-Identifier: MIT OR Apache-2.0
//! Live timeline instances.

use crate::command::{Generation, Role};
use crate::event::{EntityId, TriggerEvent};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Key for per-node state: which participant, which node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleNodeKey {
    /// Participant, always canonical (never [`Role::Owner`])
    pub role: Role,
    /// Node name
    pub node: String,
}

impl RoleNodeKey {
    /// Build a key, folding the role to its canonical form
    pub fn new(role: Role, node: impl Into<String>) -> Self {
        Self {
            role: role.canonical(),
            node: node.into(),
        }
    }
}

/// Lifecycle state of a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineState {
    /// Firing commands
    Active,
    /// All commands fired; waiting for a close event
    Completed,
    /// Closed with a delay; waiting for the reset to fall due
    ResetPending,
}

/// Effects sustained for one participant
#[derive(Debug, Clone, Default)]
pub struct RoleSustain {
    /// Morph name to value
    pub morphs: IndexMap<String, f32>,
    /// Node name to translation offset
    pub translate_offsets: IndexMap<String, [f32; 3]>,
    /// Node name to the translation last written by the sustain engine and
    /// the offset it carried
    pub last_applied: HashMap<String, ([f32; 3], [f32; 3])>,
}

impl RoleSustain {
    /// Whether nothing is sustained for this participant
    pub fn is_empty(&self) -> bool {
        self.morphs.is_empty() && self.translate_offsets.is_empty()
    }

    /// Forget every sustained value
    pub fn clear(&mut self) {
        self.morphs.clear();
        self.translate_offsets.clear();
        self.last_applied.clear();
    }
}

/// One live run of a script for one (entity, script) pair
#[derive(Debug, Clone)]
pub struct ActiveTimeline {
    pub(crate) event: TriggerEvent,
    pub(crate) script: String,
    pub(crate) start: f64,
    pub(crate) elapsed: f64,
    pub(crate) cursor: usize,
    pub(crate) generation: Generation,
    pub(crate) completed: bool,
    pub(crate) original_scale: IndexMap<RoleNodeKey, f32>,
    pub(crate) original_translate: IndexMap<RoleNodeKey, [f32; 3]>,
    pub(crate) caster: RoleSustain,
    pub(crate) target: RoleSustain,
    pub(crate) reset_at: Option<f64>,
    pub(crate) next_morph_sustain_at: f64,
}

impl ActiveTimeline {
    /// Start a fresh instance at scheduler time `now`
    pub fn new(
        event: TriggerEvent,
        script: impl Into<String>,
        generation: Generation,
        now: f64,
    ) -> Self {
        Self {
            event,
            script: script.into(),
            start: now,
            elapsed: 0.0,
            cursor: 0,
            generation,
            completed: false,
            original_scale: IndexMap::new(),
            original_translate: IndexMap::new(),
            caster: RoleSustain::default(),
            target: RoleSustain::default(),
            reset_at: None,
            next_morph_sustain_at: 0.0,
        }
    }

    /// Reinitialize in place exactly as a fresh instance
    pub fn restart(&mut self, event: TriggerEvent, generation: Generation, now: f64) {
        let script = std::mem::take(&mut self.script);
        *self = Self::new(event, script, generation, now);
    }

    /// Whether this instance belongs to `(entity, script)`
    pub fn matches(&self, entity: EntityId, script: &str) -> bool {
        self.event.entity == entity && self.script == script
    }

    /// Current lifecycle state
    pub fn state(&self) -> TimelineState {
        if self.reset_at.is_some() {
            TimelineState::ResetPending
        } else if self.completed {
            TimelineState::Completed
        } else {
            TimelineState::Active
        }
    }

    /// Event that started (or last restarted) this instance
    pub fn event(&self) -> &TriggerEvent {
        &self.event
    }

    /// Entity that owns this instance
    pub fn entity(&self) -> EntityId {
        self.event.entity
    }

    /// Script name
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Index of the next command to fire
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Seconds since start, as of the last tick
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Generation this instance is bound to
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Scheduler time at which a pending reset falls due
    pub fn reset_at(&self) -> Option<f64> {
        self.reset_at
    }

    /// Captured pre-effect scale for a node
    pub fn original_scale(&self, role: Role, node: &str) -> Option<f32> {
        self.original_scale.get(&RoleNodeKey::new(role, node)).copied()
    }

    /// Captured pre-effect translation for a node
    pub fn original_translate(&self, role: Role, node: &str) -> Option<[f32; 3]> {
        self.original_translate.get(&RoleNodeKey::new(role, node)).copied()
    }

    /// Sustained state for a participant
    pub fn sustain(&self, role: Role) -> &RoleSustain {
        match role.canonical() {
            Role::Target => &self.target,
            _ => &self.caster,
        }
    }

    pub(crate) fn sustain_mut(&mut self, role: Role) -> &mut RoleSustain {
        match role.canonical() {
            Role::Target => &mut self.target,
            _ => &mut self.caster,
        }
    }

    /// Whether any baseline or sustained value is held
    pub fn holds_effects(&self) -> bool {
        !self.original_scale.is_empty()
            || !self.original_translate.is_empty()
            || !self.caster.is_empty()
            || !self.target.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> ActiveTimeline {
        ActiveTimeline::new(TriggerEvent::new("Start", EntityId(100)), "S1", 1, 5.0)
    }

    #[test]
    fn test_fresh_state() {
        let tl = timeline();
        assert_eq!(tl.state(), TimelineState::Active);
        assert_eq!(tl.cursor(), 0);
        assert_eq!(tl.elapsed(), 0.0);
        assert!(tl.matches(EntityId(100), "S1"));
        assert!(!tl.matches(EntityId(101), "S1"));
        assert!(!tl.holds_effects());
    }

    #[test]
    fn test_state_transitions() {
        let mut tl = timeline();
        tl.completed = true;
        assert_eq!(tl.state(), TimelineState::Completed);
        tl.reset_at = Some(7.0);
        assert_eq!(tl.state(), TimelineState::ResetPending);
    }

    #[test]
    fn test_restart_reinitializes_everything() {
        let mut tl = timeline();
        tl.cursor = 3;
        tl.elapsed = 2.0;
        tl.completed = true;
        tl.reset_at = Some(9.0);
        tl.original_scale.insert(RoleNodeKey::new(Role::Caster, "Head"), 1.0);
        tl.caster.morphs.insert("Smile".into(), 0.5);
        tl.next_morph_sustain_at = 6.0;

        tl.restart(TriggerEvent::new("Start", EntityId(100)), 2, 10.0);

        assert_eq!(tl.cursor(), 0);
        assert_eq!(tl.elapsed(), 0.0);
        assert_eq!(tl.state(), TimelineState::Active);
        assert_eq!(tl.generation(), 2);
        assert_eq!(tl.start, 10.0);
        assert_eq!(tl.script(), "S1");
        assert!(!tl.holds_effects());
        assert_eq!(tl.next_morph_sustain_at, 0.0);
    }

    #[test]
    fn test_owner_shares_caster_keys() {
        let mut tl = timeline();
        tl.original_scale.insert(RoleNodeKey::new(Role::Owner, "Head"), 1.25);
        assert_eq!(tl.original_scale(Role::Caster, "Head"), Some(1.25));
        tl.sustain_mut(Role::Owner).morphs.insert("Smile".into(), 1.0);
        assert_eq!(tl.sustain(Role::Caster).morphs.get("Smile"), Some(&1.0));
        assert!(tl.sustain(Role::Target).is_empty());
    }
}
