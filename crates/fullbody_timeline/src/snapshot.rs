// SPDX-License-Identifier: MIT OR Apache-2.0
//! Immutable configuration snapshots.
//!
//! A [`Snapshot`] bundles the event map, the compiled scripts, and the reset
//! policy under one generation number. Snapshots are built once and then
//! shared read-only; a reload replaces the whole value.

use crate::command::{Generation, TimedCommand};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Tag that closes a paired interaction unless the snapshot says otherwise
pub const DEFAULT_CLOSE_TAG: &str = "PairEnd";

/// An ordered list of timed commands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TimedCommand>", into = "Vec<TimedCommand>")]
pub struct Script {
    commands: Vec<TimedCommand>,
}

impl Script {
    /// Build a script, sorting commands by offset (stable for equal offsets)
    pub fn new(mut commands: Vec<TimedCommand>) -> Self {
        commands.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Self { commands }
    }

    /// Add a command, keeping offset order
    pub fn push(&mut self, command: TimedCommand) {
        let idx = self.commands.partition_point(|c| c.offset <= command.offset);
        self.commands.insert(idx, command);
    }

    /// Command at a cursor position
    pub fn get(&self, index: usize) -> Option<&TimedCommand> {
        self.commands.get(index)
    }

    /// All commands in firing order
    pub fn commands(&self) -> &[TimedCommand] {
        &self.commands
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the script has no commands
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Offset of the last command
    pub fn duration(&self) -> f32 {
        self.commands.last().map(|c| c.offset).unwrap_or(0.0)
    }
}

impl From<Vec<TimedCommand>> for Script {
    fn from(commands: Vec<TimedCommand>) -> Self {
        Self::new(commands)
    }
}

impl From<Script> for Vec<TimedCommand> {
    fn from(script: Script) -> Self {
        script.commands
    }
}

fn sanitize_delay(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}

fn deserialize_delay<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    f32::deserialize(deserializer).map(sanitize_delay)
}

/// One immutable configuration version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Version number, starting at 1
    pub generation: Generation,
    /// Event tag to script name
    event_map: IndexMap<String, String>,
    /// Script name to script body
    scripts: IndexMap<String, Script>,
    /// Whether closing a pair restores captured state
    pub reset_on_pair_end: bool,
    /// Seconds to wait before restoring after a close
    #[serde(deserialize_with = "deserialize_delay")]
    reset_delay: f32,
    /// Tag that denotes a close event
    pub close_tag: String,
}

impl Snapshot {
    /// Create an empty snapshot for a generation
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            event_map: IndexMap::new(),
            scripts: IndexMap::new(),
            reset_on_pair_end: false,
            reset_delay: 0.0,
            close_tag: DEFAULT_CLOSE_TAG.to_string(),
        }
    }

    /// Map an event tag to a script name
    pub fn map_event(&mut self, tag: impl Into<String>, script: impl Into<String>) {
        self.event_map.insert(tag.into(), script.into());
    }

    /// Register a script body
    pub fn insert_script(&mut self, name: impl Into<String>, script: Script) {
        self.scripts.insert(name.into(), script);
    }

    /// Set the reset policy; negative or non-finite delays become zero
    pub fn set_reset_policy(&mut self, reset_on_pair_end: bool, delay_seconds: f32) {
        self.reset_on_pair_end = reset_on_pair_end;
        self.reset_delay = sanitize_delay(delay_seconds);
    }

    /// Builder form of [`Snapshot::map_event`]
    pub fn with_event(mut self, tag: impl Into<String>, script: impl Into<String>) -> Self {
        self.map_event(tag, script);
        self
    }

    /// Builder form of [`Snapshot::insert_script`]
    pub fn with_script(mut self, name: impl Into<String>, script: Script) -> Self {
        self.insert_script(name, script);
        self
    }

    /// Builder form of [`Snapshot::set_reset_policy`]
    pub fn with_reset_policy(mut self, reset_on_pair_end: bool, delay_seconds: f32) -> Self {
        self.set_reset_policy(reset_on_pair_end, delay_seconds);
        self
    }

    /// Script name mapped to an event tag
    pub fn script_for(&self, tag: &str) -> Option<&str> {
        self.event_map.get(tag).map(String::as_str)
    }

    /// Script body by name
    pub fn script(&self, name: &str) -> Option<&Script> {
        self.scripts.get(name)
    }

    /// Whether a tag closes a paired interaction
    pub fn is_close_tag(&self, tag: &str) -> bool {
        self.close_tag == tag
    }

    /// Delay before a scheduled reset, in seconds (never negative)
    pub fn reset_delay(&self) -> f32 {
        self.reset_delay
    }

    /// Iterate the event map
    pub fn events(&self) -> impl Iterator<Item = (&str, &str)> {
        self.event_map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate scripts by name
    pub fn scripts(&self) -> impl Iterator<Item = (&str, &Script)> {
        self.scripts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of scripts
    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }
}
