// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory world for tests and demos.
//!
//! [`SimWorld`] stands in for the external system: it holds entities with a
//! position, a load flag, per-node scales and translations, and morph values.
//! Nodes may carry a base pose that [`SimWorld::advance_frame`] writes back
//! every frame, the way an animation system overwrites whatever was applied
//! on top of it.

use crate::command::Role;
use crate::event::{EntityId, TriggerEvent};
use crate::host::{ActorResolver, EffectBridge, PoseAdapter};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Maximum distance at which another entity is picked as the target
pub const TARGET_RADIUS: f32 = 250.0;

#[derive(Debug, Clone, Default)]
struct SimEntity {
    position: [f32; 3],
    loaded: bool,
    scales: HashMap<String, f32>,
    translates: HashMap<String, [f32; 3]>,
    base_translates: HashMap<String, [f32; 3]>,
    morphs: HashMap<String, f32>,
}

#[derive(Debug, Default)]
struct SimState {
    entities: HashMap<EntityId, SimEntity>,
    frame: u64,
}

/// Thread-safe in-memory world
#[derive(Debug, Default)]
pub struct SimWorld {
    state: Mutex<SimState>,
}

fn distance_sq(a: [f32; 3], b: [f32; 3]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl SimWorld {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a loaded entity at a position
    pub fn spawn(&self, entity: EntityId, position: [f32; 3]) {
        let sim = SimEntity {
            position,
            loaded: true,
            ..SimEntity::default()
        };
        self.state.lock().entities.insert(entity, sim);
    }

    /// Remove an entity
    pub fn despawn(&self, entity: EntityId) {
        self.state.lock().entities.remove(&entity);
    }

    /// Load or unload an entity's presentation
    pub fn set_loaded(&self, entity: EntityId, loaded: bool) {
        if let Some(sim) = self.state.lock().entities.get_mut(&entity) {
            sim.loaded = loaded;
        }
    }

    /// Move an entity
    pub fn set_position(&self, entity: EntityId, position: [f32; 3]) {
        if let Some(sim) = self.state.lock().entities.get_mut(&entity) {
            sim.position = position;
        }
    }

    /// Write a node scale directly, bypassing the load check
    pub fn set_scale(&self, entity: EntityId, node: &str, value: f32) {
        if let Some(sim) = self.state.lock().entities.get_mut(&entity) {
            sim.scales.insert(node.to_string(), value);
        }
    }

    /// Write a node translation directly, bypassing the load check
    pub fn set_translate(&self, entity: EntityId, node: &str, value: [f32; 3]) {
        if let Some(sim) = self.state.lock().entities.get_mut(&entity) {
            sim.translates.insert(node.to_string(), value);
        }
    }

    /// Pose a node is returned to on every [`SimWorld::advance_frame`]
    pub fn set_base_translate(&self, entity: EntityId, node: &str, value: [f32; 3]) {
        if let Some(sim) = self.state.lock().entities.get_mut(&entity) {
            sim.base_translates.insert(node.to_string(), value);
            sim.translates.insert(node.to_string(), value);
        }
    }

    /// Write a morph value directly
    pub fn set_morph(&self, entity: EntityId, name: &str, value: f32) {
        if let Some(sim) = self.state.lock().entities.get_mut(&entity) {
            sim.morphs.insert(name.to_string(), value);
        }
    }

    /// Current node scale
    pub fn scale(&self, entity: EntityId, node: &str) -> Option<f32> {
        let state = self.state.lock();
        state.entities.get(&entity)?.scales.get(node).copied()
    }

    /// Current node translation
    pub fn translate(&self, entity: EntityId, node: &str) -> Option<[f32; 3]> {
        let state = self.state.lock();
        state.entities.get(&entity)?.translates.get(node).copied()
    }

    /// Current morph value
    pub fn morph(&self, entity: EntityId, name: &str) -> Option<f32> {
        let state = self.state.lock();
        state.entities.get(&entity)?.morphs.get(name).copied()
    }

    /// Simulate the external pose update: every node with a base pose is
    /// written back to it. Returns the new frame number.
    pub fn advance_frame(&self) -> u64 {
        let mut state = self.state.lock();
        for sim in state.entities.values_mut() {
            if !sim.loaded {
                continue;
            }
            for (node, base) in &sim.base_translates {
                sim.translates.insert(node.clone(), *base);
            }
        }
        state.frame += 1;
        state.frame
    }

    /// Frames simulated so far
    pub fn frame(&self) -> u64 {
        self.state.lock().frame
    }

    /// Ids of all entities, sorted
    pub fn entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.state.lock().entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl ActorResolver for SimWorld {
    fn resolve(&self, event: &TriggerEvent, role: Role) -> Option<EntityId> {
        let state = self.state.lock();
        let caster = state.entities.get(&event.entity)?;
        match role.canonical() {
            Role::Target => {
                let radius_sq = TARGET_RADIUS * TARGET_RADIUS;
                state
                    .entities
                    .iter()
                    .filter(|(id, sim)| **id != event.entity && sim.loaded)
                    .map(|(id, sim)| (*id, distance_sq(caster.position, sim.position)))
                    .filter(|(_, d)| *d <= radius_sq)
                    .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
                    .map(|(id, _)| id)
            }
            _ => Some(event.entity),
        }
    }
}

impl PoseAdapter for SimWorld {
    fn is_presentable(&self, entity: EntityId) -> bool {
        self.state
            .lock()
            .entities
            .get(&entity)
            .is_some_and(|sim| sim.loaded)
    }

    fn try_get_scale(&self, entity: EntityId, node: &str) -> Option<f32> {
        let state = self.state.lock();
        let sim = state.entities.get(&entity).filter(|sim| sim.loaded)?;
        sim.scales.get(node).copied()
    }

    fn try_get_translate(&self, entity: EntityId, node: &str) -> Option<[f32; 3]> {
        let state = self.state.lock();
        let sim = state.entities.get(&entity).filter(|sim| sim.loaded)?;
        sim.translates.get(node).copied()
    }

    fn apply_scale(&self, entity: EntityId, node: &str, value: f32) {
        let mut state = self.state.lock();
        if let Some(sim) = state.entities.get_mut(&entity).filter(|sim| sim.loaded) {
            sim.scales.insert(node.to_string(), value);
        }
    }

    fn apply_translate(&self, entity: EntityId, node: &str, value: [f32; 3]) {
        let mut state = self.state.lock();
        if let Some(sim) = state.entities.get_mut(&entity).filter(|sim| sim.loaded) {
            sim.translates.insert(node.to_string(), value);
        }
    }
}

impl EffectBridge for SimWorld {
    fn set(&self, entity: EntityId, name: &str, value: f32) {
        self.set_morph(entity, name, value);
    }

    fn clear(&self, entity: EntityId, name: &str) {
        if let Some(sim) = self.state.lock().entities.get_mut(&entity) {
            sim.morphs.remove(name);
        }
    }
}
