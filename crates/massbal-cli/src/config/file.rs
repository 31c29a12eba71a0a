use crate::error::{CliError, Result};
use massbal::core::stream::FlowBasis;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileComponent {
    pub name: String,
    pub atoms: Vec<String>,
    pub counts: Vec<u32>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileStream {
    pub name: String,
    #[serde(default)]
    pub basis: FlowBasis,
    pub flows: Option<ComponentFlows>,
    /// A CSV history, relative to the flowsheet file.
    pub history: Option<PathBuf>,
}

/// Steady flows by component, in the order the file lists them; the stream's
/// rows follow that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentFlows(pub Vec<(String, f64)>);

impl<'de> Deserialize<'de> for ComponentFlows {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlowsVisitor;

        impl<'de> Visitor<'de> for FlowsVisitor {
            type Value = ComponentFlows;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of component flows")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<ComponentFlows, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut flows = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, f64>()? {
                    flows.push(entry);
                }
                Ok(ComponentFlows(flows))
            }
        }

        deserializer.deserialize_map(FlowsVisitor)
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileUnitOpKind {
    Passive,
    Mixer,
    FlowSplitter,
    ComponentSplitter,
    StoichiometricReactor,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileReaction {
    pub reactants: BTreeMap<String, f64>,
    pub products: BTreeMap<String, f64>,
    pub key: String,
    pub conversion: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileUnitOp {
    pub name: String,
    #[serde(default)]
    pub inlets: Vec<String>,
    #[serde(default)]
    pub outlets: Vec<String>,
    pub kind: FileUnitOpKind,
    pub fractions: Option<Vec<f64>>,
    pub routes: Option<BTreeMap<String, BTreeMap<String, f64>>>,
    pub reactions: Option<Vec<FileReaction>>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileBoundary {
    pub name: String,
    #[serde(rename = "unit-ops")]
    pub unit_ops: Vec<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileReconciliationConfig {
    pub anchor: Option<String>,
    pub total_weight: Option<f64>,
    pub element_weight: Option<f64>,
    /// Per-element weights; elements not listed use `element-weight`.
    pub element_weights: Option<BTreeMap<String, f64>>,
    pub lambda: Option<f64>,
    pub max_iterations: Option<usize>,
    pub gradient_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(default, rename = "component")]
    pub components: Vec<FileComponent>,
    #[serde(default, rename = "stream")]
    pub streams: Vec<FileStream>,
    #[serde(default, rename = "unit-op")]
    pub unit_ops: Vec<FileUnitOp>,
    #[serde(default, rename = "boundary")]
    pub boundaries: Vec<FileBoundary>,
    pub execution_order: Option<Vec<String>>,
    pub reconciliation: Option<FileReconciliationConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading flowsheet definition from file: {:?}", path);
        let unreadable = |source: anyhow::Error| CliError::FlowsheetFile {
            path: path.to_path_buf(),
            source,
        };
        let content = std::fs::read_to_string(path).map_err(|e| unreadable(e.into()))?;
        toml::from_str(&content).map_err(|e| unreadable(e.into()))
    }
}
