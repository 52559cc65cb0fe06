// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event-driven timeline scheduler for full-body effects.
//!
//! This crate turns trigger events into timed effect commands:
//! - Event queue shared between producers and the scheduler
//! - Generation-numbered configuration snapshots with hot swap
//! - Per-(entity, script) timelines with baseline capture
//! - Sustain engine for effects the external system overwrites each frame
//! - Reset engine that restores captured state
//!
//! ## Architecture
//!
//! The scheduler is built on:
//! - [`ConfigStore`] publishing immutable [`Snapshot`]s
//! - [`EventQueue`] drained once per [`Scheduler::tick`]
//! - Collaborator traits in [`host`] for everything outside the process
//! - [`sim::SimWorld`] as an in-memory stand-in for the external system

pub mod command;
pub mod error;
pub mod event;
pub mod host;
pub mod scheduler;
pub mod sim;
pub mod snapshot;
pub mod store;
pub mod timeline;

mod reset;
mod sustain;

pub use command::{Args, Command, CommandKind, Generation, Opcode, Role, TimedCommand};
pub use error::{BoxError, ConfigError, Result};
pub use event::{EntityId, EventQueue, TriggerEvent};
pub use host::{ActorResolver, CommandExecutor, EffectBridge, Host, PoseAdapter, PoseExecutor};
pub use scheduler::{Scheduler, SchedulerConfig, TickReport};
pub use snapshot::{Script, Snapshot, DEFAULT_CLOSE_TAG};
pub use store::{ConfigStore, SnapshotBuilder, SnapshotSource};
pub use sustain::SustainPhase;
pub use timeline::{ActiveTimeline, RoleNodeKey, RoleSustain, TimelineState};
