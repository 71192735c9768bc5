use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rabex::objects::ClassIdType;
use rustc_hash::FxHashMap;

use crate::config::{HarvestRule, ScanConfig};
use crate::source::{AssetObject, AssetSource};
use crate::unity::types::MonoBehaviour;

/// Stringified id to display name. Later entries overwrite earlier ones.
pub type IdMapping = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerOutcome {
    Scanned,
    Missing,
    Failed(String),
}

#[derive(Debug)]
pub struct HarvestedMapping {
    pub rule: HarvestRule,
    pub entries: IdMapping,
    /// Objects whose script matched the rule, whether or not they yielded an entry.
    pub seen: usize,
}

impl HarvestedMapping {
    pub fn summary(&self) -> String {
        match (self.entries.len(), self.seen) {
            (0, 0) => format!("No {} found", self.rule.label),
            (0, _) => format!(
                "No {} extracted (type tree reading may have failed)",
                self.rule.label
            ),
            (n, _) => format!("Extracted {n} {}", self.rule.label),
        }
    }
}

#[derive(Debug)]
pub struct HarvestReport {
    pub containers: Vec<(String, ContainerOutcome)>,
    pub mappings: Vec<HarvestedMapping>,
}

impl HarvestReport {
    pub fn mapping(&self, script: &str) -> Option<&IdMapping> {
        self.mappings
            .iter()
            .find(|mapping| mapping.rule.script == script)
            .map(|mapping| &mapping.entries)
    }

    /// Writes every non-empty mapping into `output_dir`, creating it if needed.
    /// Returns the written paths.
    pub fn write(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Could not create '{}'", output_dir.display()))?;

        let mut written = Vec::new();
        for mapping in &self.mappings {
            if mapping.entries.is_empty() {
                continue;
            }
            let path = output_dir.join(&mapping.rule.output);
            let mut json = serde_json::to_string_pretty(&mapping.entries)?;
            json.push('\n');
            std::fs::write(&path, json)
                .with_context(|| format!("Could not write '{}'", path.display()))?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Scans every configured container and collects the entries of all harvest rules.
///
/// Missing and unloadable containers are recorded and skipped, objects that fail to decode are dropped.
pub fn harvest(source: &impl AssetSource, config: &ScanConfig) -> HarvestReport {
    let mut mappings: Vec<_> = config
        .rules
        .iter()
        .map(|rule| HarvestedMapping {
            rule: rule.clone(),
            entries: IdMapping::new(),
            seen: 0,
        })
        .collect();

    let mut rule_lookup = FxHashMap::default();
    for (i, rule) in config.rules.iter().enumerate() {
        rule_lookup.entry(rule.script.as_str()).or_insert(i);
    }

    let mut containers = Vec::with_capacity(config.containers.len());
    for container in &config.containers {
        if !source.contains(container) {
            tracing::warn!("Skipping {container} - not found");
            containers.push((container.clone(), ContainerOutcome::Missing));
            continue;
        }

        tracing::info!("Processing {container}...");
        let visited = source.visit_objects(container, &mut |object: &dyn AssetObject| {
            // a failed read only loses this object
            let _ = harvest_object(object, &rule_lookup, &mut mappings);
        });

        let outcome = match visited {
            Ok(()) => ContainerOutcome::Scanned,
            Err(e) => {
                tracing::error!("Error loading {container}: {e:#}");
                ContainerOutcome::Failed(format!("{e:#}"))
            }
        };
        containers.push((container.clone(), outcome));
    }

    HarvestReport {
        containers,
        mappings,
    }
}

fn harvest_object(
    object: &dyn AssetObject,
    rule_lookup: &FxHashMap<&str, usize>,
    mappings: &mut [HarvestedMapping],
) -> Result<()> {
    if object.class_id() != MonoBehaviour::CLASS_ID {
        return Ok(());
    }
    let Some(script) = object.script_name()? else {
        return Ok(());
    };
    let Some(&index) = rule_lookup.get(script.as_str()) else {
        return Ok(());
    };

    let mapping = &mut mappings[index];
    mapping.seen += 1;

    let tree = object.property_tree()?;
    if let Some((id, name)) = mapping.rule.extract(&tree) {
        mapping.entries.insert(id, name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::{MemoryObject, MemorySource};
    use rabex::objects::ClassId;
    use serde_json::json;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::util::SubscriberInitExt as _;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn config() -> ScanConfig {
        ScanConfig {
            containers: vec!["a.assets".to_owned(), "b.assets".to_owned()],
            ..ScanConfig::default()
        }
    }

    #[test]
    fn harvests_monster() {
        let source = MemorySource::default().with(
            "a.assets",
            vec![MemoryObject::behaviour(
                "Monster",
                json!({ "ID": 7, "monsterName": "Slime" }),
            )],
        );
        let report = harvest(&source, &config());

        let monsters = report.mapping("Monster").unwrap();
        assert_eq!(monsters.len(), 1);
        assert_eq!(monsters["7"], "Slime");
        assert!(report.mapping("DialogueCharacter").unwrap().is_empty());
    }

    #[test]
    fn harvests_dialogue_characters() {
        let source = MemorySource::default().with(
            "b.assets",
            vec![MemoryObject::behaviour(
                "DialogueCharacter",
                json!({ "m_Name": "Smith", "ID": 1001, "characterName": "Blacksmith" }),
            )],
        );
        let report = harvest(&source, &config());

        let npcs = report.mapping("DialogueCharacter").unwrap();
        assert_eq!(npcs["1001"], "Blacksmith");
        assert!(report.mapping("Monster").unwrap().is_empty());
    }

    #[test]
    fn ignores_non_behaviours() {
        let source = MemorySource::default().with(
            "a.assets",
            vec![
                MemoryObject::other(ClassId::GameObject),
                MemoryObject::other(ClassId::MonoScript),
            ],
        );
        let report = harvest(&source, &config());

        let objects = source.containers["a.assets"].as_ref().unwrap();
        assert!(objects.iter().all(|object| object.reads.get() == 0));
        assert_eq!(report.mappings[0].seen, 0);
    }

    #[test]
    fn skips_incomplete_and_empty_names() {
        let source = MemorySource::default().with(
            "a.assets",
            vec![
                MemoryObject::behaviour("Monster", json!({ "ID": 1 })),
                MemoryObject::behaviour("Monster", json!({ "ID": 2, "monsterName": "" })),
                MemoryObject::behaviour("Monster", json!({ "monsterName": "Ghost" })),
            ],
        );
        let report = harvest(&source, &config());

        assert!(report.mapping("Monster").unwrap().is_empty());
        assert_eq!(report.mappings[0].seen, 3);
        assert_eq!(
            report.mappings[0].summary(),
            "No monsters extracted (type tree reading may have failed)"
        );
    }

    #[test]
    fn drops_objects_that_fail_to_decode() {
        let broken_script = MemoryObject {
            script: Err("dangling m_Script".to_owned()),
            ..MemoryObject::behaviour("Monster", json!({ "ID": 3, "monsterName": "Imp" }))
        };
        let source = MemorySource::default().with(
            "a.assets",
            vec![
                MemoryObject::undecodable("Monster"),
                broken_script,
                MemoryObject::unscripted(),
                MemoryObject::behaviour("Monster", json!({ "ID": 4, "monsterName": "Wisp" })),
            ],
        );
        let report = harvest(&source, &config());

        let monsters = report.mapping("Monster").unwrap();
        assert_eq!(monsters.len(), 1);
        assert_eq!(monsters["4"], "Wisp");
        assert_eq!(report.containers[0].1, ContainerOutcome::Scanned);
    }

    #[test]
    fn last_write_wins() {
        let source = MemorySource::default()
            .with(
                "a.assets",
                vec![MemoryObject::behaviour(
                    "Monster",
                    json!({ "ID": 7, "monsterName": "Slime" }),
                )],
            )
            .with(
                "b.assets",
                vec![MemoryObject::behaviour(
                    "Monster",
                    json!({ "ID": 7, "monsterName": "King Slime" }),
                )],
            );
        let report = harvest(&source, &config());

        let monsters = report.mapping("Monster").unwrap();
        assert_eq!(monsters.len(), 1);
        assert_eq!(monsters["7"], "King Slime");
    }

    #[test]
    fn logs_skip_notice_per_missing_container() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let _guard = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish()
            .set_default();

        harvest(&MemorySource::default(), &ScanConfig::default());

        let logs = logs.text();
        for container in [
            "sharedassets0.assets",
            "resources.assets",
            "globalgamemanagers.assets",
        ] {
            assert!(
                logs.contains(&format!("Skipping {container} - not found")),
                "{logs}"
            );
        }
    }

    #[test]
    fn reports_missing_containers() {
        let report = harvest(&MemorySource::default(), &ScanConfig::default());

        let outcomes: Vec<_> = report
            .containers
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome.clone()))
            .collect();
        assert_eq!(
            outcomes,
            [
                ("sharedassets0.assets", ContainerOutcome::Missing),
                ("resources.assets", ContainerOutcome::Missing),
                ("globalgamemanagers.assets", ContainerOutcome::Missing),
            ]
        );
        assert!(report.mappings.iter().all(|m| m.entries.is_empty()));
        assert_eq!(report.mappings[0].summary(), "No monsters found");
    }

    #[test]
    fn broken_container_does_not_stop_the_scan() {
        let source = MemorySource::default().with_broken("a.assets").with(
            "b.assets",
            vec![MemoryObject::behaviour(
                "Monster",
                json!({ "ID": 9, "monsterName": "Golem" }),
            )],
        );
        let report = harvest(&source, &config());

        assert!(matches!(
            &report.containers[0],
            (name, ContainerOutcome::Failed(e)) if name == "a.assets" && e.contains("unsupported format")
        ));
        assert_eq!(report.containers[1].1, ContainerOutcome::Scanned);
        assert_eq!(report.mapping("Monster").unwrap()["9"], "Golem");
        assert_eq!(report.mappings[0].summary(), "Extracted 1 monsters");
    }

    #[test]
    fn first_matching_rule_applies() {
        let mut config = config();
        config.rules.push(HarvestRule::new(
            "Monster",
            "ID",
            "m_Name",
            "monster-assets.json",
            "monster assets",
        ));
        let source = MemorySource::default().with(
            "a.assets",
            vec![MemoryObject::behaviour(
                "Monster",
                json!({ "m_Name": "MON_Slime", "ID": 7, "monsterName": "Slime" }),
            )],
        );
        let report = harvest(&source, &config);

        assert_eq!(report.mappings[0].entries["7"], "Slime");
        assert!(report.mappings[2].entries.is_empty());
        assert_eq!(report.mappings[2].seen, 0);
    }

    #[test]
    fn writes_only_non_empty_mappings() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("data");
        let source = MemorySource::default().with(
            "a.assets",
            vec![
                MemoryObject::behaviour("Monster", json!({ "ID": 12, "monsterName": "Wolf" })),
                MemoryObject::behaviour("Monster", json!({ "ID": 3, "monsterName": "Bat" })),
            ],
        );
        let report = harvest(&source, &config());
        let written = report.write(&output).unwrap();

        assert_eq!(written, [output.join("monster-ids.json")]);
        assert!(!output.join("npc-ids.json").exists());

        let contents = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(contents, "{\n  \"12\": \"Wolf\",\n  \"3\": \"Bat\"\n}\n");
        let parsed: IdMapping = serde_json::from_str(&contents).unwrap();
        assert_eq!(&parsed, report.mapping("Monster").unwrap());
    }
}
