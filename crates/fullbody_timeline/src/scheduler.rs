// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline scheduler.
//!
//! The scheduler owns every live [`ActiveTimeline`] and advances them from a
//! single context through [`Scheduler::tick`]. Each tick drains the event
//! queue, starts, restarts, or closes timelines, keeps sustained effects
//! asserted, and fires every command whose offset has been reached.

use crate::command::{Args, Command, Generation};
use crate::event::{EntityId, EventQueue, TriggerEvent};
use crate::host::Host;
use crate::reset::apply_reset;
use crate::snapshot::Snapshot;
use crate::store::SnapshotSource;
use crate::sustain::{sustain_after_update, sustain_tick, SustainPhase};
use crate::timeline::{ActiveTimeline, RoleNodeKey};
use std::sync::Arc;

/// Scheduler tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Minimum seconds between morph re-assertions for one timeline
    pub morph_sustain_interval: f64,
    /// Per-axis tolerance when recognizing our own translate write
    pub translate_epsilon: f32,
    /// Upper bound on timeline visits in one pass
    pub iteration_guard: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            morph_sustain_interval: 0.10,
            translate_epsilon: 0.0005,
            iteration_guard: 100_000,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Events taken from the queue
    pub events_drained: usize,
    /// Timelines started
    pub created: usize,
    /// Existing timelines restarted by a repeat event
    pub restarted: usize,
    /// Delayed resets scheduled by close events
    pub reset_scheduled: usize,
    /// Timelines removed (closed, due, or rolled over)
    pub removed: usize,
    /// Commands fired
    pub commands_fired: usize,
    /// Whether the iteration guard cut the pass short
    pub guard_tripped: bool,
}

/// Drives timelines from events and elapsed time
pub struct Scheduler {
    source: Arc<dyn SnapshotSource>,
    queue: Arc<EventQueue>,
    config: SchedulerConfig,
    timelines: Vec<ActiveTimeline>,
    /// Scheduler clock in seconds
    now: f64,
    last_generation: Generation,
}

impl Scheduler {
    /// Create a scheduler over a snapshot source and an event queue
    pub fn new(source: Arc<dyn SnapshotSource>, queue: Arc<EventQueue>) -> Self {
        Self::with_config(source, queue, SchedulerConfig::default())
    }

    /// Create a scheduler with explicit tuning
    pub fn with_config(
        source: Arc<dyn SnapshotSource>,
        queue: Arc<EventQueue>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            source,
            queue,
            config,
            timelines: Vec::new(),
            now: 0.0,
            last_generation: 0,
        }
    }

    /// Advance by `dt` seconds.
    ///
    /// Negative or non-finite `dt` is treated as zero. Nothing that happens
    /// inside a tick is reported as an error: bad events and commands are
    /// logged and dropped.
    pub fn tick(&mut self, dt: f32, host: &Host<'_>) -> TickReport {
        let mut report = TickReport::default();

        let Some(snapshot) = self.source.snapshot() else {
            return report;
        };

        if snapshot.generation != self.last_generation {
            self.rollover(&snapshot, host, &mut report);
        }

        if dt.is_finite() && dt > 0.0 {
            self.now += f64::from(dt);
        }

        let events = self.queue.drain();
        report.events_drained = events.len();
        if !events.is_empty() {
            tracing::debug!(
                dt,
                generation = snapshot.generation,
                drained = events.len(),
                "Tick: drained events"
            );
        }

        for event in events {
            self.accept(event, &snapshot, host, &mut report);
        }

        self.advance(&snapshot, host, &mut report);
        report
    }

    /// Re-assert translate offsets on `entity` after the external system has
    /// re-posed it.
    ///
    /// Only timelines whose caster or target resolves to `entity` are
    /// touched. Returns the number of node writes.
    pub fn sustain_after_external_update(
        &mut self,
        entity: EntityId,
        phase: SustainPhase,
        host: &Host<'_>,
    ) -> usize {
        if self.timelines.is_empty() || !host.pose.is_presentable(entity) {
            return 0;
        }

        let epsilon = self.config.translate_epsilon;
        let written: usize = self
            .timelines
            .iter_mut()
            .map(|tl| sustain_after_update(tl, entity, host, epsilon))
            .sum();

        if written > 0 {
            tracing::trace!(%entity, %phase, written, "Sustain: post-update");
        }
        written
    }

    /// Reset and remove every resident timeline
    pub fn teardown(&mut self, host: &Host<'_>) -> usize {
        let count = self.timelines.len();
        for tl in &mut self.timelines {
            apply_reset(tl, host);
        }
        self.timelines.clear();
        if count > 0 {
            tracing::info!(count, "Scheduler: teardown");
        }
        count
    }

    /// Resident timelines
    pub fn timelines(&self) -> &[ActiveTimeline] {
        &self.timelines
    }

    /// The timeline for `(entity, script)`, if resident
    pub fn timeline(&self, entity: EntityId, script: &str) -> Option<&ActiveTimeline> {
        self.timelines.iter().find(|tl| tl.matches(entity, script))
    }

    /// Number of resident timelines
    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    /// Whether no timeline is resident
    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Scheduler clock in seconds
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Generation the resident timelines are bound to
    pub fn last_generation(&self) -> Generation {
        self.last_generation
    }

    /// Tuning in effect
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn rollover(&mut self, snapshot: &Snapshot, host: &Host<'_>, report: &mut TickReport) {
        tracing::info!(
            from = self.last_generation,
            to = snapshot.generation,
            resident = self.timelines.len(),
            "Scheduler: generation changed"
        );

        if snapshot.reset_on_pair_end {
            for tl in &mut self.timelines {
                apply_reset(tl, host);
            }
        }
        report.removed += self.timelines.len();
        self.timelines.clear();
        self.last_generation = snapshot.generation;
    }

    fn position(&self, entity: EntityId, script: &str) -> Option<usize> {
        self.timelines.iter().position(|tl| tl.matches(entity, script))
    }

    fn accept(
        &mut self,
        event: TriggerEvent,
        snapshot: &Snapshot,
        host: &Host<'_>,
        report: &mut TickReport,
    ) {
        if !event.is_valid() {
            tracing::warn!(tag = %event.tag, entity = %event.entity, "Tick: invalid event dropped");
            return;
        }

        let Some(script) = snapshot.script_for(&event.tag) else {
            tracing::info!(tag = %event.tag, entity = %event.entity, "Tick: no mapping for event");
            return;
        };

        if snapshot.is_close_tag(&event.tag) {
            match self.position(event.entity, script) {
                Some(index) => {
                    tracing::info!(entity = %event.entity, script, "Timeline: close");
                    self.close_at(index, snapshot, host, report);
                }
                None => {
                    tracing::debug!(
                        entity = %event.entity,
                        script,
                        "Timeline: close with nothing resident"
                    );
                }
            }
            return;
        }

        if snapshot.script(script).is_none() {
            tracing::warn!(tag = %event.tag, script, "Tick: mapped script is missing");
            return;
        }

        match self.position(event.entity, script) {
            Some(index) => {
                tracing::info!(entity = %event.entity, script, "Timeline: restart");
                self.timelines[index].restart(event, snapshot.generation, self.now);
                report.restarted += 1;
            }
            None => {
                tracing::info!(
                    entity = %event.entity,
                    script,
                    generation = snapshot.generation,
                    "Timeline: start"
                );
                self.timelines
                    .push(ActiveTimeline::new(event, script, snapshot.generation, self.now));
                report.created += 1;
            }
        }
    }

    /// Close the timeline at `index` under the snapshot's reset policy.
    ///
    /// Returns `true` if it was removed. With a positive delay the timeline
    /// stays resident and a reset is scheduled once.
    fn close_at(
        &mut self,
        index: usize,
        snapshot: &Snapshot,
        host: &Host<'_>,
        report: &mut TickReport,
    ) -> bool {
        if snapshot.reset_on_pair_end {
            let delay = snapshot.reset_delay();
            if delay > 0.0 {
                let now = self.now;
                let tl = &mut self.timelines[index];
                match tl.reset_at {
                    Some(at) => {
                        tracing::info!(
                            entity = %tl.entity(),
                            script = tl.script(),
                            at,
                            "Timeline: reset already scheduled"
                        );
                    }
                    None => {
                        let at = now + f64::from(delay);
                        tl.reset_at = Some(at);
                        report.reset_scheduled += 1;
                        tracing::info!(
                            entity = %tl.entity(),
                            script = tl.script(),
                            delay,
                            at,
                            "Timeline: reset scheduled"
                        );
                    }
                }
                return false;
            }
            apply_reset(&mut self.timelines[index], host);
        }

        self.timelines.swap_remove(index);
        report.removed += 1;
        true
    }

    fn advance(&mut self, snapshot: &Snapshot, host: &Host<'_>, report: &mut TickReport) {
        let now = self.now;
        let interval = self.config.morph_sustain_interval;
        let epsilon = self.config.translate_epsilon;

        let mut visits = 0usize;
        let mut i = 0;
        while i < self.timelines.len() {
            visits += 1;
            if visits > self.config.iteration_guard {
                tracing::error!(
                    severity = "critical",
                    guard = self.config.iteration_guard,
                    resident = self.timelines.len(),
                    "Tick: iteration guard exceeded, aborting pass"
                );
                report.guard_tripped = true;
                break;
            }

            let tl = &mut self.timelines[i];
            tl.elapsed = now - tl.start;

            sustain_tick(tl, host, now, interval, epsilon);

            if let Some(due) = tl.reset_at {
                if now >= due {
                    tracing::info!(
                        entity = %tl.entity(),
                        script = tl.script(),
                        "Timeline: delayed reset due"
                    );
                    apply_reset(tl, host);
                    self.timelines.swap_remove(i);
                    report.removed += 1;
                } else {
                    i += 1;
                }
                continue;
            }

            let Some(script) = snapshot.script(&tl.script) else {
                tracing::warn!(
                    entity = %tl.entity(),
                    script = tl.script(),
                    "Timeline: script vanished, closing"
                );
                if !self.close_at(i, snapshot, host, report) {
                    i += 1;
                }
                continue;
            };

            if tl.cursor >= script.len() {
                mark_completed(tl);
                i += 1;
                continue;
            }

            while let Some(timed) = script.get(tl.cursor) {
                if f64::from(timed.offset) > tl.elapsed {
                    break;
                }
                tl.cursor += 1;
                fire(tl, &timed.command, host);
                report.commands_fired += 1;
            }

            if tl.cursor >= script.len() {
                mark_completed(tl);
            }
            i += 1;
        }
    }
}

fn mark_completed(tl: &mut ActiveTimeline) {
    if tl.completed {
        return;
    }
    tl.completed = true;
    tracing::info!(entity = %tl.entity(), script = tl.script(), "Timeline: completed");
}

fn fire(tl: &mut ActiveTimeline, command: &Command, host: &Host<'_>) {
    if !command.is_valid() {
        tracing::warn!(
            opcode = %command.opcode,
            target = %command.target,
            "Timeline: invalid command skipped"
        );
        return;
    }

    capture_baseline(tl, command, host);
    host.executor.execute(command, &tl.event);
    register_sustain(tl, command);
}

/// Record the pre-effect value of a node the first time a command touches it
fn capture_baseline(tl: &mut ActiveTimeline, command: &Command, host: &Host<'_>) {
    if command.target.is_empty() || !(command.is_scale() || command.is_translate()) {
        return;
    }

    let key = RoleNodeKey::new(command.role, command.target.as_str());
    let already = if command.is_scale() {
        tl.original_scale.contains_key(&key)
    } else {
        tl.original_translate.contains_key(&key)
    };
    if already {
        return;
    }

    let Some(entity) = host.actors.resolve(&tl.event, command.role) else {
        tracing::debug!(
            role = command.role.label(),
            node = %command.target,
            "Capture: actor unresolved"
        );
        return;
    };

    if command.is_scale() {
        if let Some(scale) = host.pose.try_get_scale(entity, &command.target) {
            tracing::debug!(
                %entity,
                role = key.role.label(),
                node = %key.node,
                scale,
                "Capture: scale"
            );
            tl.original_scale.insert(key, scale);
        }
    } else if let Some(pos) = host.pose.try_get_translate(entity, &command.target) {
        tracing::debug!(
            %entity,
            role = key.role.label(),
            node = %key.node,
            ?pos,
            "Capture: translation"
        );
        tl.original_translate.insert(key, pos);
    }
}

fn register_sustain(tl: &mut ActiveTimeline, command: &Command) {
    if command.is_translate() {
        let Some(offset) = Args::vec3(&command.args) else {
            tracing::warn!(
                args = %command.args,
                node = %command.target,
                "Sustain: bad translate args"
            );
            return;
        };
        tl.sustain_mut(command.role)
            .translate_offsets
            .insert(command.target.clone(), offset);
    } else if command.is_morph() {
        let Some(value) = Args::scalar(&command.args) else {
            tracing::warn!(
                args = %command.args,
                morph = %command.target,
                "Sustain: bad morph args"
            );
            return;
        };
        tl.sustain_mut(command.role)
            .morphs
            .insert(command.target.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandKind, Opcode, Role, TimedCommand};
    use crate::host::PoseExecutor;
    use crate::sim::SimWorld;
    use crate::snapshot::Script;
    use crate::timeline::TimelineState;
    use parking_lot::RwLock;

    const CASTER: EntityId = EntityId(100);
    const TARGET: EntityId = EntityId(200);

    struct Rig {
        world: SimWorld,
        source: Arc<RwLock<Option<Arc<Snapshot>>>>,
        queue: Arc<EventQueue>,
        scheduler: Scheduler,
    }

    impl Rig {
        fn new(snapshot: Snapshot) -> Self {
            Self::with_config(snapshot, SchedulerConfig::default())
        }

        fn with_config(snapshot: Snapshot, config: SchedulerConfig) -> Self {
            let world = SimWorld::new();
            world.spawn(CASTER, [0.0, 0.0, 0.0]);
            world.spawn(TARGET, [100.0, 0.0, 0.0]);
            world.set_scale(CASTER, "Head", 1.0);
            world.set_scale(TARGET, "Head", 1.0);
            world.set_translate(CASTER, "Pelvis", [0.0, 0.0, 10.0]);

            let source = Arc::new(RwLock::new(Some(Arc::new(snapshot))));
            let queue = Arc::new(EventQueue::new());
            let scheduler = Scheduler::with_config(source.clone(), queue.clone(), config);
            Self {
                world,
                source,
                queue,
                scheduler,
            }
        }

        fn push(&self, tag: &str, entity: EntityId) {
            self.queue.push(TriggerEvent::new(tag, entity));
        }

        fn tick(&mut self, dt: f32) -> TickReport {
            let executor = PoseExecutor::new(&self.world, &self.world);
            let host = Host::new(&self.world, &executor, &self.world, &self.world);
            self.scheduler.tick(dt, &host)
        }

        fn post_update(&mut self, entity: EntityId, phase: SustainPhase) -> usize {
            let executor = PoseExecutor::new(&self.world, &self.world);
            let host = Host::new(&self.world, &executor, &self.world, &self.world);
            self.scheduler.sustain_after_external_update(entity, phase, &host)
        }

        fn swap(&self, snapshot: Snapshot) {
            *self.source.write() = Some(Arc::new(snapshot));
        }
    }

    fn scale(offset: f32, role: Role, value: f32, generation: Generation) -> TimedCommand {
        TimedCommand::new(offset, Command::scale(role, generation, "Head", value))
    }

    fn scenario_a(generation: Generation) -> Snapshot {
        Snapshot::new(generation).with_event("Start", "S1").with_script(
            "S1",
            Script::new(vec![
                scale(0.0, Role::Caster, 0.8, generation),
                scale(1.0, Role::Caster, 1.0, generation),
            ]),
        )
    }

    fn with_close(snapshot: Snapshot, reset: bool, delay: f32) -> Snapshot {
        snapshot
            .with_event("PairEnd", "S1")
            .with_reset_policy(reset, delay)
    }

    #[test]
    fn test_no_snapshot_is_noop() {
        let source: Arc<RwLock<Option<Arc<Snapshot>>>> = Arc::new(RwLock::new(None));
        let queue = Arc::new(EventQueue::new());
        queue.push(TriggerEvent::new("Start", CASTER));
        let mut scheduler = Scheduler::new(source, queue.clone());

        let world = SimWorld::new();
        let executor = PoseExecutor::new(&world, &world);
        let host = Host::new(&world, &executor, &world, &world);
        let report = scheduler.tick(1.0, &host);

        assert_eq!(report, TickReport::default());
        assert_eq!(scheduler.now(), 0.0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_scenario_a_fire_and_complete() {
        let mut rig = Rig::new(scenario_a(1));
        rig.push("Start", CASTER);

        let report = rig.tick(0.0);
        assert_eq!(report.created, 1);
        assert_eq!(report.commands_fired, 1);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));
        let tl = rig.scheduler.timeline(CASTER, "S1").unwrap();
        assert_eq!(tl.cursor(), 1);
        assert_eq!(tl.original_scale(Role::Caster, "Head"), Some(1.0));
        assert_eq!(tl.state(), TimelineState::Active);

        let report = rig.tick(1.0);
        assert_eq!(report.commands_fired, 1);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.0));
        let tl = rig.scheduler.timeline(CASTER, "S1").unwrap();
        assert_eq!(tl.cursor(), 2);
        assert_eq!(tl.state(), TimelineState::Completed);

        // completed timelines stay resident and fire nothing more
        let report = rig.tick(5.0);
        assert_eq!(report.commands_fired, 0);
        assert_eq!(rig.scheduler.len(), 1);
    }

    #[test]
    fn test_baseline_captured_once() {
        let mut rig = Rig::new(scenario_a(1));
        rig.push("Start", CASTER);
        rig.tick(0.0);
        rig.tick(1.0);

        // second fire saw 0.8 on the node but the baseline stays 1.0
        let tl = rig.scheduler.timeline(CASTER, "S1").unwrap();
        assert_eq!(tl.original_scale(Role::Caster, "Head"), Some(1.0));
    }

    #[test]
    fn test_scenario_b_delayed_reset() {
        let mut rig = Rig::new(with_close(scenario_a(1), true, 2.0));
        rig.push("Start", CASTER);
        rig.tick(0.0);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));

        rig.push("PairEnd", CASTER);
        let report = rig.tick(0.5);
        assert_eq!(report.reset_scheduled, 1);
        let tl = rig.scheduler.timeline(CASTER, "S1").unwrap();
        assert_eq!(tl.state(), TimelineState::ResetPending);
        assert_eq!(tl.reset_at(), Some(2.5));

        // a second close does not push the deadline out
        rig.push("PairEnd", CASTER);
        let report = rig.tick(1.0);
        assert_eq!(report.reset_scheduled, 0);
        assert_eq!(report.commands_fired, 0);
        assert_eq!(rig.scheduler.timeline(CASTER, "S1").unwrap().reset_at(), Some(2.5));
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));

        let report = rig.tick(1.0);
        assert_eq!(report.removed, 1);
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.0));
    }

    #[test]
    fn test_close_without_delay_resets_immediately() {
        let mut rig = Rig::new(with_close(scenario_a(1), true, 0.0));
        rig.push("Start", CASTER);
        rig.tick(0.0);

        rig.push("PairEnd", CASTER);
        let report = rig.tick(0.1);
        assert_eq!(report.removed, 1);
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.0));
    }

    #[test]
    fn test_close_without_reset_policy_keeps_pose() {
        let mut rig = Rig::new(with_close(scenario_a(1), false, 0.0));
        rig.push("Start", CASTER);
        rig.tick(0.0);

        rig.push("PairEnd", CASTER);
        rig.tick(0.1);
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));
    }

    #[test]
    fn test_close_with_nothing_resident() {
        let mut rig = Rig::new(with_close(scenario_a(1), true, 0.0));
        rig.push("PairEnd", CASTER);
        let report = rig.tick(0.1);
        assert_eq!(report.events_drained, 1);
        assert_eq!(report.removed, 0);
        assert!(rig.scheduler.is_empty());
    }

    #[test]
    fn test_scenario_c_generation_rollover() {
        let snapshot = scenario_a(1)
            .with_event("Other", "S2")
            .with_script("S2", Script::new(vec![scale(0.0, Role::Target, 0.5, 1)]))
            .with_reset_policy(true, 0.0);
        let mut rig = Rig::new(snapshot);
        rig.push("Start", CASTER);
        rig.push("Other", CASTER);
        rig.tick(0.0);
        assert_eq!(rig.scheduler.len(), 2);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));
        assert_eq!(rig.world.scale(TARGET, "Head"), Some(0.5));

        rig.swap(scenario_a(2).with_reset_policy(true, 0.0));
        let report = rig.tick(0.1);
        assert_eq!(report.removed, 2);
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.scheduler.last_generation(), 2);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.0));
        assert_eq!(rig.world.scale(TARGET, "Head"), Some(1.0));

        rig.push("Start", CASTER);
        rig.tick(0.1);
        assert_eq!(rig.scheduler.timeline(CASTER, "S1").unwrap().generation(), 2);
    }

    #[test]
    fn test_rollover_without_reset_leaves_pose() {
        let mut rig = Rig::new(scenario_a(1));
        rig.push("Start", CASTER);
        rig.tick(0.0);

        rig.swap(scenario_a(2));
        rig.tick(0.1);
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));
    }

    #[test]
    fn test_scenario_d_invalid_event_dropped() {
        let mut rig = Rig::new(scenario_a(1));
        rig.push("Start", EntityId(0));
        rig.push("", CASTER);
        let report = rig.tick(0.0);
        assert_eq!(report.events_drained, 2);
        assert_eq!(report.created, 0);
        assert!(rig.scheduler.is_empty());
        assert!(rig.queue.is_empty());
    }

    #[test]
    fn test_scenario_e_same_batch_restart() {
        let snapshot = Snapshot::new(1)
            .with_event("Start", "S1")
            .with_event("Again", "S1")
            .with_script("S1", Script::new(vec![scale(0.5, Role::Caster, 0.8, 1)]));
        let mut rig = Rig::new(snapshot);
        rig.push("Start", CASTER);
        rig.push("Again", CASTER);

        let report = rig.tick(0.0);
        assert_eq!(report.created, 1);
        assert_eq!(report.restarted, 1);
        assert_eq!(rig.scheduler.len(), 1);

        let tl = rig.scheduler.timeline(CASTER, "S1").unwrap();
        assert_eq!(tl.event().tag, "Again");
        assert_eq!(tl.cursor(), 0);
        assert_eq!(tl.elapsed(), 0.0);
    }

    #[test]
    fn test_restart_rewinds_cursor() {
        let mut rig = Rig::new(scenario_a(1));
        rig.push("Start", CASTER);
        rig.tick(0.0);
        rig.tick(1.0);
        assert_eq!(rig.scheduler.timeline(CASTER, "S1").unwrap().cursor(), 2);

        rig.push("Start", CASTER);
        let report = rig.tick(0.25);
        assert_eq!(report.restarted, 1);
        let tl = rig.scheduler.timeline(CASTER, "S1").unwrap();
        // restarted at the current clock, so the t=0 command fires again
        assert_eq!(tl.cursor(), 1);
        assert_eq!(tl.state(), TimelineState::Active);
        assert_eq!(tl.original_scale(Role::Caster, "Head"), Some(1.0));
    }

    #[test]
    fn test_cursor_never_decreases_between_restarts() {
        let snapshot = Snapshot::new(1).with_event("Start", "S1").with_script(
            "S1",
            Script::new((0..10).map(|i| scale(i as f32 * 0.3, Role::Caster, 1.0, 1)).collect()),
        );
        let mut rig = Rig::new(snapshot);
        rig.push("Start", CASTER);

        let mut last = 0;
        for _ in 0..40 {
            rig.tick(0.1);
            let cursor = rig.scheduler.timeline(CASTER, "S1").unwrap().cursor();
            assert!(cursor >= last);
            last = cursor;
        }
        assert_eq!(last, 10);
    }

    #[test]
    fn test_unmapped_and_missing_script() {
        let snapshot = Snapshot::new(1).with_event("Start", "Nowhere");
        let mut rig = Rig::new(snapshot);
        rig.push("Start", CASTER);
        rig.push("Unknown", CASTER);
        let report = rig.tick(0.0);
        assert_eq!(report.events_drained, 2);
        assert!(rig.scheduler.is_empty());
    }

    #[test]
    fn test_script_vanishing_closes_timeline() {
        let mut rig = Rig::new(scenario_a(1).with_reset_policy(true, 0.0));
        rig.push("Start", CASTER);
        rig.tick(0.0);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));

        // same generation, script gone
        rig.swap(Snapshot::new(1).with_event("Start", "S1").with_reset_policy(true, 0.0));
        let report = rig.tick(0.1);
        assert_eq!(report.removed, 1);
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.0));
    }

    #[test]
    fn test_script_vanishing_with_delay_waits_for_reset() {
        let mut rig = Rig::new(scenario_a(1).with_reset_policy(true, 1.0));
        rig.push("Start", CASTER);
        rig.tick(0.0);

        rig.swap(Snapshot::new(1).with_event("Start", "S1").with_reset_policy(true, 1.0));
        let report = rig.tick(0.1);
        assert_eq!(report.reset_scheduled, 1);
        assert_eq!(report.removed, 0);
        let tl = rig.scheduler.timeline(CASTER, "S1").unwrap();
        assert_eq!(tl.state(), TimelineState::ResetPending);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));

        let report = rig.tick(0.5);
        assert_eq!(report.reset_scheduled, 0);
        assert_eq!(rig.scheduler.len(), 1);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));

        let report = rig.tick(1.0);
        assert_eq!(report.removed, 1);
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.0));
    }

    #[test]
    fn test_invalid_command_skipped_cursor_advances() {
        let bad = Command::new(
            CommandKind::Transform,
            Role::Caster,
            0,
            Opcode::Scale,
            "Head",
            "0.1",
        );
        let snapshot = Snapshot::new(1).with_event("Start", "S1").with_script(
            "S1",
            Script::new(vec![TimedCommand::new(0.0, bad), scale(0.0, Role::Caster, 0.8, 1)]),
        );
        let mut rig = Rig::new(snapshot);
        rig.push("Start", CASTER);
        let report = rig.tick(0.0);
        assert_eq!(report.commands_fired, 2);
        assert_eq!(rig.scheduler.timeline(CASTER, "S1").unwrap().cursor(), 2);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(0.8));
    }

    #[test]
    fn test_negative_and_nan_dt_ignored() {
        let mut rig = Rig::new(scenario_a(1));
        rig.tick(1.0);
        rig.tick(-5.0);
        rig.tick(f32::NAN);
        assert_eq!(rig.scheduler.now(), 1.0);
    }

    #[test]
    fn test_iteration_guard_aborts_pass() {
        let config = SchedulerConfig {
            iteration_guard: 2,
            ..SchedulerConfig::default()
        };
        let mut rig = Rig::with_config(scenario_a(1), config);
        for id in 1..=3 {
            let entity = EntityId(id);
            rig.world.spawn(entity, [1000.0 * id as f32, 0.0, 0.0]);
            rig.world.set_scale(entity, "Head", 1.0);
            rig.push("Start", entity);
        }

        let report = rig.tick(0.0);
        assert!(report.guard_tripped);
        assert_eq!(report.created, 3);
        assert_eq!(report.commands_fired, 2);
    }

    #[test]
    fn test_target_role_resolves_nearest() {
        let snapshot = Snapshot::new(1)
            .with_event("Start", "S1")
            .with_script("S1", Script::new(vec![scale(0.0, Role::Target, 0.6, 1)]))
            .with_reset_policy(true, 0.0)
            .with_event("PairEnd", "S1");
        let mut rig = Rig::new(snapshot);
        rig.push("Start", CASTER);
        rig.tick(0.0);
        assert_eq!(rig.world.scale(TARGET, "Head"), Some(0.6));
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.0));

        rig.push("PairEnd", CASTER);
        rig.tick(0.0);
        assert_eq!(rig.world.scale(TARGET, "Head"), Some(1.0));
    }

    fn move_snapshot() -> Snapshot {
        Snapshot::new(1)
            .with_event("Start", "S1")
            .with_event("PairEnd", "S1")
            .with_reset_policy(true, 0.0)
            .with_script(
                "S1",
                Script::new(vec![TimedCommand::new(
                    0.0,
                    Command::translate(Role::Caster, 1, "Pelvis", [0.0, 0.0, 5.0]),
                )]),
            )
    }

    #[test]
    fn test_translate_sustained_without_compounding() {
        let mut rig = Rig::new(move_snapshot());
        rig.push("Start", CASTER);
        rig.tick(0.0);

        // registered this tick, asserted from the next one on
        assert_eq!(rig.world.translate(CASTER, "Pelvis"), Some([0.0, 0.0, 10.0]));
        for _ in 0..5 {
            rig.tick(0.016);
        }
        assert_eq!(rig.world.translate(CASTER, "Pelvis"), Some([0.0, 0.0, 15.0]));

        let tl = rig.scheduler.timeline(CASTER, "S1").unwrap();
        assert_eq!(tl.original_translate(Role::Caster, "Pelvis"), Some([0.0, 0.0, 10.0]));
    }

    #[test]
    fn test_refreshed_move_does_not_stack() {
        let first = Command::translate(Role::Caster, 1, "Pelvis", [0.0, 0.0, 5.0]);
        let second = Command::translate(Role::Caster, 1, "Pelvis", [0.0, 0.0, 2.0]);
        let snapshot = Snapshot::new(1).with_event("Start", "S1").with_script(
            "S1",
            Script::new(vec![TimedCommand::new(0.0, first), TimedCommand::new(1.0, second)]),
        );
        let mut rig = Rig::new(snapshot);
        rig.push("Start", CASTER);
        for dt in [0.0, 0.1, 0.1] {
            rig.tick(dt);
        }
        assert_eq!(rig.world.translate(CASTER, "Pelvis"), Some([0.0, 0.0, 15.0]));

        // second Move lands at t=1 and replaces the first offset
        for dt in [1.0, 0.1, 0.1] {
            rig.tick(dt);
        }
        assert_eq!(rig.world.translate(CASTER, "Pelvis"), Some([0.0, 0.0, 12.0]));
        let tl = rig.scheduler.timeline(CASTER, "S1").unwrap();
        assert_eq!(tl.original_translate(Role::Caster, "Pelvis"), Some([0.0, 0.0, 10.0]));
    }

    #[test]
    fn test_post_update_sustain_over_external_pose() {
        let mut rig = Rig::new(move_snapshot());
        rig.world.set_base_translate(CASTER, "Pelvis", [0.0, 0.0, 10.0]);
        rig.push("Start", CASTER);
        rig.tick(0.0);

        for frame in 0..3 {
            rig.world.advance_frame();
            assert_eq!(rig.world.translate(CASTER, "Pelvis"), Some([0.0, 0.0, 10.0]));
            for phase in 0..3u8 {
                let phase = SustainPhase::try_from(phase).unwrap();
                assert_eq!(rig.post_update(CASTER, phase), 1, "frame {frame}");
            }
            assert_eq!(rig.world.translate(CASTER, "Pelvis"), Some([0.0, 0.0, 15.0]));
            rig.tick(0.016);
            assert_eq!(rig.world.translate(CASTER, "Pelvis"), Some([0.0, 0.0, 15.0]));
        }

        rig.push("PairEnd", CASTER);
        rig.tick(0.016);
        assert_eq!(rig.world.translate(CASTER, "Pelvis"), Some([0.0, 0.0, 10.0]));
        assert_eq!(rig.post_update(CASTER, SustainPhase::Immediate), 0);
    }

    #[test]
    fn test_post_update_ignores_other_entities() {
        let mut rig = Rig::new(move_snapshot());
        rig.push("Start", CASTER);
        rig.tick(0.0);
        assert_eq!(rig.post_update(TARGET, SustainPhase::Immediate), 0);
        assert_eq!(rig.post_update(EntityId(999), SustainPhase::Late), 0);
    }

    #[test]
    fn test_morphs_throttled_and_cleared() {
        let snapshot = Snapshot::new(1)
            .with_event("Start", "S1")
            .with_event("PairEnd", "S1")
            .with_reset_policy(true, 0.0)
            .with_script(
                "S1",
                Script::new(vec![TimedCommand::new(
                    0.0,
                    Command::morph(Role::Caster, 1, "Smile", 0.7),
                )]),
            );
        let mut rig = Rig::new(snapshot);
        rig.push("Start", CASTER);
        rig.tick(0.0);
        assert_eq!(rig.world.morph(CASTER, "Smile"), None);

        // throttle clock was armed at t=0; next assertion after 100 ms
        rig.tick(0.05);
        assert_eq!(rig.world.morph(CASTER, "Smile"), None);
        rig.tick(0.06);
        assert_eq!(rig.world.morph(CASTER, "Smile"), Some(0.7));

        // external writer wipes it; sustain puts it back on the next window
        rig.world.set_morph(CASTER, "Smile", 0.0);
        rig.tick(0.02);
        assert_eq!(rig.world.morph(CASTER, "Smile"), Some(0.0));
        rig.tick(0.1);
        assert_eq!(rig.world.morph(CASTER, "Smile"), Some(0.7));

        rig.push("PairEnd", CASTER);
        rig.tick(0.0);
        assert_eq!(rig.world.morph(CASTER, "Smile"), None);
    }

    #[test]
    fn test_teardown_resets_everything() {
        let mut rig = Rig::new(scenario_a(1));
        rig.push("Start", CASTER);
        rig.tick(0.0);

        let executor = PoseExecutor::new(&rig.world, &rig.world);
        let host = Host::new(&rig.world, &executor, &rig.world, &rig.world);
        assert_eq!(rig.scheduler.teardown(&host), 1);
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.0));
    }

    #[test]
    fn test_capture_scale_then_reset_round_trip() {
        let mut rig = Rig::new(with_close(scenario_a(1), true, 0.0));
        rig.world.set_scale(CASTER, "Head", 1.37);
        rig.push("Start", CASTER);
        rig.tick(0.0);
        rig.tick(1.0);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.0));

        rig.push("PairEnd", CASTER);
        rig.tick(0.0);
        assert_eq!(rig.world.scale(CASTER, "Head"), Some(1.37));
    }
}
