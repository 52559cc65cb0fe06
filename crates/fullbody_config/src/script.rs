// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-clip script files.
//!
//! A script file holds one section per participant:
//!
//! ```text
//! [FB:paired_huga.hkx|Caster]
//! 0.0  FBScale_Head(0.8)
//! 0.5  FBMove_Pelvis(0, 0, 4)
//! 1.0  2_FBMorph_Smile(0.6)   ; retargeted to the target
//!
//! [FB:paired_huga.hkx|Target]
//! 0.2  FBScale_Head(1.2)
//! ```
//!
//! Lines outside a matching section, unknown operations, and malformed lines
//! are skipped.

use crate::nodes::NodeResolver;
use fullbody_timeline::{Command, CommandKind, Generation, Opcode, Role, Script, TimedCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Caster,
    Target,
}

fn strip_comment(line: &str) -> &str {
    match line.find(['#', ';']) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Parse the script for `clip` out of a script file
pub fn parse_script(
    text: &str,
    clip: &str,
    generation: Generation,
    nodes: &NodeResolver,
) -> Script {
    let want_caster = format!("FB:{clip}|Caster");
    let want_target = format!("FB:{clip}|Target");

    let mut section = Section::None;
    let mut commands = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            section = if name == want_caster {
                Section::Caster
            } else if name == want_target {
                Section::Target
            } else {
                Section::None
            };
            continue;
        }

        let role = match section {
            Section::None => continue,
            Section::Caster => Role::Caster,
            Section::Target => Role::Target,
        };

        match parse_line(line, role, generation, nodes) {
            Some(timed) => {
                tracing::debug!(
                    clip,
                    offset = timed.offset,
                    role = timed.command.role.label(),
                    opcode = %timed.command.opcode,
                    target = %timed.command.target,
                    "Script: added command"
                );
                commands.push(timed);
            }
            None => {
                tracing::debug!(clip, line = index + 1, text = line, "Script: skipped line");
            }
        }
    }

    Script::new(commands)
}

/// Parse `<seconds> [2_]<Op>_<Key>(<args>)`
fn parse_line(
    line: &str,
    section_role: Role,
    generation: Generation,
    nodes: &NodeResolver,
) -> Option<TimedCommand> {
    let (time, rest) = line.split_once(char::is_whitespace)?;
    let offset = time.parse::<f32>().ok().filter(|t| t.is_finite())?;

    let mut body = rest.trim();
    let mut role = section_role;
    if let Some(stripped) = body.strip_prefix("2_") {
        body = stripped.trim_start();
        if section_role == Role::Caster {
            role = Role::Target;
        }
    }

    let open = body.find('(')?;
    let close = body.rfind(')')?;
    if close <= open {
        return None;
    }
    let op_and_key = body[..open].trim();
    let args = body[open + 1..close].trim();

    let command = if let Some(node) = op_and_key.strip_prefix("FBScale_") {
        let node = nodes.resolve(node.trim());
        Command::new(CommandKind::Transform, role, generation, Opcode::Scale, node, args)
    } else if let Some(node) = op_and_key.strip_prefix("FBMove_") {
        let node = nodes.resolve(node.trim());
        Command::new(CommandKind::Transform, role, generation, Opcode::Move, node, args)
    } else if let Some(name) = op_and_key.strip_prefix("FBMorph_") {
        Command::new(CommandKind::Morph, role, generation, Opcode::Set, name.trim(), args)
    } else {
        return None;
    };

    Some(TimedCommand::new(offset, command))
}
