// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo scene and scripted event feed.
//!
//! Populates a [`SimWorld`] with a caster, a target in range, and a
//! bystander out of range, then replays a timed list of trigger events from
//! a producer thread while the scheduler runs.

use fullbody_config::node_alias;
use fullbody_timeline::sim::SimWorld;
use fullbody_timeline::{EntityId, EventQueue, Snapshot, TriggerEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Entity that raises the demo events
pub const CASTER: EntityId = EntityId(0x14);
/// Nearest entity to the caster
pub const TARGET: EntityId = EntityId(0x0001_A2B3);
/// Entity outside target range
pub const BYSTANDER: EntityId = EntityId(0x0001_A2B4);

const SCALED_NODES: [&str; 6] = ["Head", "Neck", "Spine2", "Pelvis", "LHand", "RHand"];
const ANIMATED_NODES: [(&str, [f32; 3]); 3] = [
    ("COM", [0.0, 0.0, 68.0]),
    ("Pelvis", [0.0, 0.0, 4.0]),
    ("Head", [0.0, 2.0, 12.0]),
];

/// Spawn the demo participants with a neutral pose
pub fn populate(world: &SimWorld) {
    for (entity, position) in [
        (CASTER, [0.0, 0.0, 0.0]),
        (TARGET, [80.0, 10.0, 0.0]),
        (BYSTANDER, [900.0, 0.0, 0.0]),
    ] {
        world.spawn(entity, position);
        for key in SCALED_NODES {
            world.set_scale(entity, node_alias(key).unwrap_or(key), 1.0);
        }
        for (key, base) in ANIMATED_NODES {
            world.set_base_translate(entity, node_alias(key).unwrap_or(key), base);
        }
    }
}

/// One scripted event
#[derive(Debug, Clone, PartialEq)]
pub struct DemoStep {
    /// Seconds after the feed starts
    pub at: f64,
    /// Event tag
    pub tag: String,
    /// Raising entity
    pub entity: EntityId,
}

impl DemoStep {
    /// Create a step
    pub fn new(at: f64, tag: impl Into<String>, entity: EntityId) -> Self {
        Self {
            at,
            tag: tag.into(),
            entity,
        }
    }
}

/// Replays [`DemoStep`]s in time order
#[derive(Debug, Clone, Default)]
pub struct DemoFeeder {
    steps: Vec<DemoStep>,
    next: usize,
}

impl DemoFeeder {
    /// Create a feeder; steps are sorted by time
    pub fn new(mut steps: Vec<DemoStep>) -> Self {
        steps.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self { steps, next: 0 }
    }

    /// Two open/close cycles on the first non-close event the snapshot maps
    pub fn from_snapshot(snapshot: &Snapshot, entity: EntityId) -> Self {
        let Some(start) = snapshot
            .events()
            .map(|(tag, _)| tag)
            .find(|tag| !snapshot.is_close_tag(tag))
        else {
            tracing::warn!("Demo: snapshot maps no start event, nothing to feed");
            return Self::default();
        };

        let close = snapshot
            .script_for(&snapshot.close_tag)
            .map(|_| snapshot.close_tag.as_str());

        let mut steps = Vec::new();
        for cycle in [0.5, 5.0] {
            steps.push(DemoStep::new(cycle, start, entity));
            if let Some(close) = close {
                steps.push(DemoStep::new(cycle + 3.5, close, entity));
            }
        }
        Self::new(steps)
    }

    /// Events whose time has come, in order
    pub fn due(&mut self, elapsed: f64) -> Vec<TriggerEvent> {
        let mut events = Vec::new();
        while let Some(step) = self.steps.get(self.next) {
            if step.at > elapsed {
                break;
            }
            events.push(TriggerEvent::new(step.tag.as_str(), step.entity));
            self.next += 1;
        }
        events
    }

    /// Whether every step has been emitted
    pub fn is_finished(&self) -> bool {
        self.next >= self.steps.len()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there are no steps at all
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Push events into `queue` from a producer thread until finished or
    /// `running` clears. The thread returns how many events it pushed.
    pub fn spawn(
        mut self,
        queue: Arc<EventQueue>,
        running: Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<usize>> {
        std::thread::Builder::new()
            .name("fullbody-demo".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut pushed = 0;
                while running.load(Ordering::SeqCst) && !self.is_finished() {
                    for event in self.due(started.elapsed().as_secs_f64()) {
                        tracing::info!(tag = %event.tag, entity = %event.entity, "Demo: push");
                        queue.push(event);
                        pushed += 1;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                pushed
            })
    }
}
