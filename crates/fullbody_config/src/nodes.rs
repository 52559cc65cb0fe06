// SPDX-License-Identifier: MIT OR Apache-2.0
//! Friendly skeleton node names.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Full node name for a friendly alias
pub fn node_alias(key: &str) -> Option<&'static str> {
    let full = match key {
        "NPC" => "NPC",
        "Root" => "NPC Root [Root]",
        "COM" => "NPC COM [COM ]",

        "Pelvis" | "Pelv" => "NPC Pelvis [Pelv]",
        "Spine" | "Spine0" | "Spn0" => "NPC Spine [Spn0]",
        "Spine1" | "Spn1" => "NPC Spine1 [Spn1]",
        "Spine2" | "Spn2" => "NPC Spine2 [Spn2]",
        "Neck" => "NPC Neck [Neck]",
        "Head" => "NPC Head [Head]",

        "LClavicle" | "LeftClavicle" | "LClv" => "NPC L Clavicle [LClv]",
        "LUpperArm" | "LeftUpperArm" | "LUar" => "NPC L UpperArm [LUar]",
        "LForearm" | "LeftForearm" | "LLar" => "NPC L Forearm [LLar]",
        "LHand" | "LeftHand" | "LHnd" => "NPC L Hand [LHnd]",

        "RClavicle" | "RightClavicle" | "RClv" => "NPC R Clavicle [RClv]",
        "RUpperArm" | "RightUpperArm" | "RUar" => "NPC R UpperArm [RUar]",
        "RForearm" | "RightForearm" | "RLar" => "NPC R Forearm [RLar]",
        "RHand" | "RightHand" | "RHnd" => "NPC R Hand [RHnd]",

        "LThigh" | "LeftThigh" | "LThg" => "NPC L Thigh [LThg]",
        "LCalf" | "LeftCalf" | "LClf" => "NPC L Calf [LClf]",
        "LFoot" | "LeftFoot" | "LLft" => "NPC L Foot [LLft ]",
        "LToe" | "LeftToe" => "NPC L Toe0 [LToe]",

        "RThigh" | "RightThigh" | "RThg" => "NPC R Thigh [RThg]",
        "RCalf" | "RightCalf" | "RClf" => "NPC R Calf [RClf]",
        "RFoot" | "RightFoot" | "Rft" => "NPC R Foot [Rft ]",
        "RToe" | "RightToe" => "NPC R Toe0 [RToe]",

        _ => return None,
    };
    Some(full)
}

/// Resolves node aliases, remembering which unknown keys were reported
#[derive(Debug, Default)]
pub struct NodeResolver {
    unknown: Mutex<HashSet<String>>,
}

impl NodeResolver {
    /// Create a resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Full node name for `key`, or `key` itself if it is not an alias.
    ///
    /// Each unknown key is logged the first time it is seen.
    pub fn resolve<'a>(&self, key: &'a str) -> &'a str {
        if key.is_empty() {
            return key;
        }
        if let Some(full) = node_alias(key) {
            return full;
        }
        if self.unknown.lock().insert(key.to_string()) {
            tracing::debug!(key, "Nodes: pass-through for unknown node key");
        }
        key
    }

    /// Unknown keys reported so far
    pub fn unknown_count(&self) -> usize {
        self.unknown.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        let nodes = NodeResolver::new();
        assert_eq!(nodes.resolve("Head"), "NPC Head [Head]");
        assert_eq!(nodes.resolve("COM"), "NPC COM [COM ]");
        assert_eq!(nodes.resolve("LeftHand"), nodes.resolve("LHnd"));
        assert_eq!(nodes.resolve("Spine"), nodes.resolve("Spine0"));
        assert_eq!(nodes.unknown_count(), 0);
    }

    #[test]
    fn test_unknown_passes_through_once() {
        let nodes = NodeResolver::new();
        assert_eq!(nodes.resolve("NPC Head [Head]"), "NPC Head [Head]");
        assert_eq!(nodes.resolve("Tail"), "Tail");
        assert_eq!(nodes.resolve("Tail"), "Tail");
        assert_eq!(nodes.unknown_count(), 2);
        assert_eq!(nodes.resolve(""), "");
        assert_eq!(nodes.unknown_count(), 2);
    }
}
