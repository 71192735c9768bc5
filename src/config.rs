use serde_json::Value;

use crate::tree::{PropertyTree, id_key};

/// Which containers to scan and what to pull out of them.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Container names relative to the asset directory, scanned in order.
    pub containers: Vec<String>,
    /// At most one rule applies to an object, the first whose script matches.
    pub rules: Vec<HarvestRule>,
    /// Script types explore mode prints a sample for.
    pub interesting_types: Vec<String>,
    pub sample_fields: usize,
    pub sample_width: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            containers: [
                "sharedassets0.assets",
                "resources.assets",
                "globalgamemanagers.assets",
            ]
            .map(String::from)
            .to_vec(),
            rules: vec![
                HarvestRule::new("Monster", "ID", "monsterName", "monster-ids.json", "monsters"),
                HarvestRule::new(
                    "DialogueCharacter",
                    "ID",
                    "characterName",
                    "npc-ids.json",
                    "NPCs",
                ),
            ],
            interesting_types: [
                "Monster",
                "DialogueCharacter",
                "Biome",
                "Level",
                "Skill",
                "Item",
            ]
            .map(String::from)
            .to_vec(),
            sample_fields: 15,
            sample_width: 80,
        }
    }
}

/// Maps objects of one script type to `id -> name` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRule {
    pub script: String,
    pub id_field: String,
    pub name_field: String,
    /// File name of the JSON output, inside the output directory.
    pub output: String,
    /// Plural used in the summary, e.g. `monsters`.
    pub label: String,
}

impl HarvestRule {
    pub fn new(script: &str, id_field: &str, name_field: &str, output: &str, label: &str) -> Self {
        HarvestRule {
            script: script.to_owned(),
            id_field: id_field.to_owned(),
            name_field: name_field.to_owned(),
            output: output.to_owned(),
            label: label.to_owned(),
        }
    }

    /// Returns the entry for `tree` if both fields are present and the name is a non-empty string.
    pub fn extract(&self, tree: &PropertyTree) -> Option<(String, String)> {
        let id = tree.get(&self.id_field)?;
        let name = match tree.get(&self.name_field)? {
            Value::String(name) if !name.is_empty() => name,
            _ => return None,
        };
        Some((id_key(id), name.clone()))
    }
}
