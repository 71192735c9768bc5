use std::cmp::Reverse;
use std::io::Write;

use anyhow::Result;
use indexmap::IndexMap;
use indexmap::map::Entry;
use rabex::objects::ClassIdType;

use crate::config::ScanConfig;
use crate::source::{AssetObject, AssetSource};
use crate::tree::{self, PropertyTree};
use crate::unity::types::MonoBehaviour;

/// Script types of one container, in the order they were first seen.
#[derive(Debug, Default)]
pub struct Exploration {
    pub counts: IndexMap<String, usize>,
    /// The first property tree that could be decoded for each script type.
    pub samples: IndexMap<String, PropertyTree>,
}

impl Exploration {
    /// Script types by descending count. Ties keep first-seen order.
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<_> = self
            .counts
            .iter()
            .map(|(name, &count)| (name.as_str(), count))
            .collect();
        ranked.sort_by_key(|&(_, count)| Reverse(count));
        ranked
    }

    pub fn print<W: Write>(&self, config: &ScanConfig, mut writer: W) -> Result<()> {
        writeln!(writer, "=== MonoBehaviour Types Found ===")?;
        for (name, count) in self.ranked() {
            writeln!(writer, "  {name}: {count}")?;
        }

        writeln!(writer)?;
        writeln!(writer, "=== Sample Data for Key Types ===")?;
        for type_name in &config.interesting_types {
            let Some(sample) = self.samples.get(type_name) else {
                continue;
            };
            writeln!(writer)?;
            writeln!(writer, "{type_name}:")?;
            for (i, (field, value)) in tree::fields(sample).enumerate() {
                if i >= config.sample_fields {
                    writeln!(writer, "  ...")?;
                    break;
                }
                let value = tree::truncated(value, config.sample_width);
                writeln!(writer, "  {field}: {value}")?;
            }
        }
        Ok(())
    }

    /// Adds the objects of `container` to the tally. Samples already taken are kept.
    pub fn visit(&mut self, source: &impl AssetSource, container: &str) -> Result<()> {
        source.visit_objects(container, &mut |object: &dyn AssetObject| {
            // objects that can't be read are left out of the tally
            let _ = self.record(object);
        })
    }

    fn record(&mut self, object: &dyn AssetObject) -> Result<()> {
        if object.class_id() != MonoBehaviour::CLASS_ID {
            return Ok(());
        }
        let Some(script) = object.script_name()? else {
            return Ok(());
        };

        *self.counts.entry(script.clone()).or_default() += 1;
        if let Entry::Vacant(entry) = self.samples.entry(script) {
            entry.insert(object.property_tree()?);
        }
        Ok(())
    }
}

/// Tallies the script types of every `MonoBehaviour` in `container` and keeps one sample per type.
pub fn explore(source: &impl AssetSource, container: &str) -> Result<Exploration> {
    let mut exploration = Exploration::default();
    exploration.visit(source, container)?;
    Ok(exploration)
}
