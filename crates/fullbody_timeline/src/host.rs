// SPDX-License-Identifier: MIT OR Apache-2.0
//! Boundary to the external system.
//!
//! The scheduler never touches entities directly. It resolves participants
//! through an [`ActorResolver`], dispatches commands to a
//! [`CommandExecutor`], reads and writes node transforms through a
//! [`PoseAdapter`], and drives morphs through an [`EffectBridge`]. All calls
//! are best-effort: a missing entity or node is a normal outcome, not an
//! error.

use crate::command::{Args, Command, Opcode, Role};
use crate::event::{EntityId, TriggerEvent};

/// Resolves the participant of an event for a role
pub trait ActorResolver {
    /// The live entity playing `role` for `event`, if any
    fn resolve(&self, event: &TriggerEvent, role: Role) -> Option<EntityId>;
}

/// Carries out a command against the external system
pub trait CommandExecutor {
    /// Execute `command` in the context of `event`; failures are swallowed
    fn execute(&self, command: &Command, event: &TriggerEvent);
}

/// Reads and writes node transforms on an entity's presentation
pub trait PoseAdapter {
    /// Whether the entity currently has a presentation to write to
    fn is_presentable(&self, entity: EntityId) -> bool;

    /// Current uniform scale of a node
    fn try_get_scale(&self, entity: EntityId, node: &str) -> Option<f32>;

    /// Current local translation of a node
    fn try_get_translate(&self, entity: EntityId, node: &str) -> Option<[f32; 3]>;

    /// Write a node's uniform scale
    fn apply_scale(&self, entity: EntityId, node: &str, value: f32);

    /// Write a node's local translation
    fn apply_translate(&self, entity: EntityId, node: &str, value: [f32; 3]);
}

/// Fire-and-forget morph/expression bridge
pub trait EffectBridge {
    /// Set a morph value
    fn set(&self, entity: EntityId, name: &str, value: f32);

    /// Clear a morph
    fn clear(&self, entity: EntityId, name: &str);
}

/// The collaborators the scheduler calls during a tick
#[derive(Clone, Copy)]
pub struct Host<'a> {
    /// Participant resolution
    pub actors: &'a dyn ActorResolver,
    /// Command dispatch
    pub executor: &'a dyn CommandExecutor,
    /// Node transforms
    pub pose: &'a dyn PoseAdapter,
    /// Morph bridge
    pub effects: &'a dyn EffectBridge,
}

impl<'a> Host<'a> {
    /// Bundle collaborators
    pub fn new(
        actors: &'a dyn ActorResolver,
        executor: &'a dyn CommandExecutor,
        pose: &'a dyn PoseAdapter,
        effects: &'a dyn EffectBridge,
    ) -> Self {
        Self {
            actors,
            executor,
            pose,
            effects,
        }
    }

    /// Resolve a role and require a presentation
    pub(crate) fn presentable(&self, event: &TriggerEvent, role: Role) -> Option<EntityId> {
        self.actors
            .resolve(event, role)
            .filter(|entity| self.pose.is_presentable(*entity))
    }
}

/// Default executor that applies transform commands through a pose adapter.
///
/// Scale is applied immediately. Move and Set are sustained by the scheduler
/// every tick, so executing them here would only race the sustain pass.
pub struct PoseExecutor<'a> {
    actors: &'a dyn ActorResolver,
    pose: &'a dyn PoseAdapter,
}

impl<'a> PoseExecutor<'a> {
    /// Create an executor over a resolver and a pose adapter
    pub fn new(actors: &'a dyn ActorResolver, pose: &'a dyn PoseAdapter) -> Self {
        Self { actors, pose }
    }
}

impl CommandExecutor for PoseExecutor<'_> {
    fn execute(&self, command: &Command, event: &TriggerEvent) {
        match (&command.opcode, command.is_scale()) {
            (Opcode::Scale, true) => {
                let Some(scale) = Args::scalar(&command.args) else {
                    tracing::warn!(args = %command.args, "Exec: failed to parse scale");
                    return;
                };
                let Some(entity) = self.actors.resolve(event, command.role) else {
                    tracing::info!(
                        role = command.role.label(),
                        entity = %event.entity,
                        "Exec: could not resolve actor"
                    );
                    return;
                };
                if command.target.is_empty() {
                    tracing::warn!("Exec: scale without node name");
                    return;
                }
                self.pose.apply_scale(entity, &command.target, scale.max(0.0));
                tracing::debug!(%entity, node = %command.target, scale, "Exec: applied scale");
            }
            (Opcode::Move | Opcode::Set, _) => {
                tracing::debug!(
                    opcode = %command.opcode,
                    target = %command.target,
                    "Exec: sustained"
                );
            }
            _ => {
                tracing::info!(
                    kind = ?command.kind,
                    opcode = %command.opcode,
                    "Exec: command not implemented"
                );
            }
        }
    }
}
