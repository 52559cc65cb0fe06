// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command definitions for timeline scripts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic configuration version
pub type Generation = u64;

/// What family of effect a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CommandKind {
    /// Node transform (scale, translate)
    #[default]
    Transform,
    /// Morph or expression slider
    Morph,
    /// Visual effect
    Fx,
    /// Actor state change
    State,
}

/// Which participant of a paired interaction a command applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    /// The entity that raised the event; resolved like [`Role::Caster`]
    #[default]
    #[serde(rename = "Self")]
    Owner,
    /// The initiator of the interaction
    Caster,
    /// The other participant
    Target,
}

impl Role {
    /// Roles that own distinct sustain and capture state
    pub const SUSTAINED: [Role; 2] = [Role::Caster, Role::Target];

    /// Fold [`Role::Owner`] into [`Role::Caster`]
    pub fn canonical(self) -> Self {
        match self {
            Role::Target => Role::Target,
            Role::Owner | Role::Caster => Role::Caster,
        }
    }

    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            Role::Owner => "S",
            Role::Caster => "C",
            Role::Target => "T",
        }
    }
}

/// Recognized operation codes
///
/// Unrecognized codes are preserved in [`Opcode::Other`] so they can be
/// passed through to the executor and logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Set a node's uniform scale
    Scale,
    /// Offset a node's translation
    Move,
    /// Set a morph value
    Set,
    /// Anything else
    Other(String),
}

impl Opcode {
    /// Parse an opcode name
    pub fn parse(name: &str) -> Self {
        match name {
            "Scale" => Self::Scale,
            "Move" => Self::Move,
            "Set" => Self::Set,
            other => Self::Other(other.to_string()),
        }
    }

    /// The opcode's name
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scale => "Scale",
            Self::Move => "Move",
            Self::Set => "Set",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An effect instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Effect family
    pub kind: CommandKind,
    /// Participant the command applies to
    pub role: Role,
    /// Generation of the snapshot that produced this command
    pub generation: Generation,
    /// Operation
    pub opcode: Opcode,
    /// Node or morph name
    pub target: String,
    /// Raw argument string
    pub args: String,
}

impl Command {
    /// Create a command
    pub fn new(
        kind: CommandKind,
        role: Role,
        generation: Generation,
        opcode: Opcode,
        target: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            role,
            generation,
            opcode,
            target: target.into(),
            args: args.into(),
        }
    }

    /// Scale a node
    pub fn scale(role: Role, generation: Generation, node: impl Into<String>, value: f32) -> Self {
        Self::new(CommandKind::Transform, role, generation, Opcode::Scale, node, value.to_string())
    }

    /// Offset a node's translation
    pub fn translate(
        role: Role,
        generation: Generation,
        node: impl Into<String>,
        offset: [f32; 3],
    ) -> Self {
        let args = format!("{},{},{}", offset[0], offset[1], offset[2]);
        Self::new(CommandKind::Transform, role, generation, Opcode::Move, node, args)
    }

    /// Set a morph value
    pub fn morph(role: Role, generation: Generation, name: impl Into<String>, value: f32) -> Self {
        Self::new(CommandKind::Morph, role, generation, Opcode::Set, name, value.to_string())
    }

    /// A command needs a generation and an opcode
    pub fn is_valid(&self) -> bool {
        self.generation != 0 && !self.opcode.as_str().is_empty()
    }

    /// Whether this command writes a node scale
    pub fn is_scale(&self) -> bool {
        self.kind == CommandKind::Transform && self.opcode == Opcode::Scale
    }

    /// Whether this command writes a node translation
    pub fn is_translate(&self) -> bool {
        self.kind == CommandKind::Transform && self.opcode == Opcode::Move
    }

    /// Whether this command drives a morph
    pub fn is_morph(&self) -> bool {
        self.kind == CommandKind::Morph
    }
}

/// A command scheduled at an offset from timeline start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedCommand {
    /// Seconds since timeline start
    pub offset: f32,
    /// The command
    pub command: Command,
}

impl TimedCommand {
    /// Create a timed command
    pub fn new(offset: f32, command: Command) -> Self {
        Self { offset, command }
    }
}

/// Argument parsing shared by the executor and the sustain engine
pub struct Args;

impl Args {
    /// Parse a single number, tolerating a `name=` prefix
    pub fn scalar(args: &str) -> Option<f32> {
        let value = match args.split_once('=') {
            Some((_, rest)) => rest,
            None => args,
        };
        Self::numbers(value).next()
    }

    /// Parse the first three numbers separated by commas or whitespace
    pub fn vec3(args: &str) -> Option<[f32; 3]> {
        let mut numbers = Self::numbers(args);
        Some([numbers.next()?, numbers.next()?, numbers.next()?])
    }

    fn numbers(args: &str) -> impl Iterator<Item = f32> + '_ {
        args.split([',', ' ', '\t'])
            .filter(|token| !token.is_empty())
            .map_while(|token| token.parse::<f32>().ok())
            .filter(|v| v.is_finite())
    }
}
