use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{ReconcileError, Result};

/// Built-in source tables, embedded at compile time
const BUILTIN_SOURCES_TOML: &str = include_str!("../config/sources.toml");

static BUILTIN_CATALOG: Lazy<std::result::Result<SourceCatalog, String>> =
    Lazy::new(|| SourceCatalog::from_toml_str(BUILTIN_SOURCES_TOML).map_err(|e| e.to_string()));

/// Declarative description of one interaction source.
/// Everything source-specific about reconciliation lives here rather than in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub format: SourceFormat,
    /// Line layout; required for tabular sources
    #[serde(default)]
    pub tabular: Option<TabularFormat>,
    /// Edge eligibility; required for graph-exchange sources
    #[serde(default)]
    pub graph: Option<GraphExchangeFormat>,
    #[serde(default)]
    pub fields: FieldRules,
    /// Applied in declaration order
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub identifiers: IdentifierRules,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Tabular,
    GraphExchange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularFormat {
    /// Zero-based index of the line holding column names
    pub header_line: usize,
    /// Zero-based index of the first data line
    pub data_start: usize,
    #[serde(default = "default_comment_prefix")]
    pub comment_prefix: String,
    #[serde(default = "default_column_separator")]
    pub column_separator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExchangeFormat {
    /// Only edges carrying this interaction label are reconciled
    pub edge_interaction: String,
    #[serde(default = "default_graph_namespace")]
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRules {
    /// Raw token meaning "no value"
    #[serde(default)]
    pub empty_sentinel: Option<String>,
    #[serde(default = "default_list_separator")]
    pub list_separator: String,
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    #[serde(default)]
    pub int_fields: Vec<String>,
    #[serde(default)]
    pub float_fields: Vec<String>,
    #[serde(default)]
    pub list_fields: Vec<String>,
    #[serde(default)]
    pub int_list_fields: Vec<String>,
    #[serde(default)]
    pub composite_fields: Vec<CompositeField>,
}

/// A column of list-separated entries whose parts are joined by a secondary separator,
/// e.g. `12345:two hybrid:HQ|67890:affinity capture:LC`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeField {
    pub field: String,
    pub target: String,
    pub separator: String,
    pub parts: Vec<String>,
}

/// Moves `{source_field: target_field}` into a nested object named `name`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub fields: BTreeMap<String, String>,
}

/// Candidate identifiers per interactor side, most preferred first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifierRules {
    #[serde(default)]
    pub a: Vec<IdentifierRule>,
    #[serde(default)]
    pub b: Vec<IdentifierRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierRule {
    /// Field name inside the interactor group
    pub field: String,
    pub namespace: String,
    /// Require an integer identifier; non-integer text makes the rule unusable
    #[serde(default)]
    pub numeric: bool,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self {
            empty_sentinel: None,
            list_separator: default_list_separator(),
            rename: BTreeMap::new(),
            int_fields: Vec::new(),
            float_fields: Vec::new(),
            list_fields: Vec::new(),
            int_list_fields: Vec::new(),
            composite_fields: Vec::new(),
        }
    }
}

fn default_comment_prefix() -> String {
    "#".to_string()
}

fn default_column_separator() -> String {
    "\t".to_string()
}

fn default_list_separator() -> String {
    "|".to_string()
}

fn default_graph_namespace() -> String {
    crate::constants::NDEX_NAMESPACE.to_string()
}

impl SourceConfig {
    /// Check that the tables are internally consistent before a run
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| -> Result<()> {
            Err(ReconcileError::Config(format!(
                "source '{}': {}",
                self.source_id, reason
            )))
        };

        if self.source_id.trim().is_empty() {
            return Err(ReconcileError::Config("source_id must not be empty".to_string()));
        }

        match self.format {
            SourceFormat::Tabular => {
                let Some(tabular) = &self.tabular else {
                    return fail("tabular source requires a [tabular] section".to_string());
                };
                if tabular.data_start <= tabular.header_line {
                    return fail(format!(
                        "data_start ({}) must come after header_line ({})",
                        tabular.data_start, tabular.header_line
                    ));
                }
                if tabular.column_separator.is_empty() {
                    return fail("column_separator must not be empty".to_string());
                }
                if self.identifiers.a.is_empty() || self.identifiers.b.is_empty() {
                    return fail("identifier rules are required for both sides".to_string());
                }
            }
            SourceFormat::GraphExchange => {
                if self.graph.is_none() {
                    return fail("graph-exchange source requires a [graph] section".to_string());
                }
            }
        }

        if self.fields.list_separator.is_empty() {
            return fail("list_separator must not be empty".to_string());
        }
        for composite in &self.fields.composite_fields {
            if composite.separator.is_empty() || composite.parts.is_empty() {
                return fail(format!(
                    "composite field '{}' needs a separator and at least one part",
                    composite.field
                ));
            }
        }

        let mut seen_groups = HashSet::new();
        for group in &self.groups {
            if !seen_groups.insert(group.name.as_str()) {
                return fail(format!("group '{}' is declared twice", group.name));
            }
        }

        Ok(())
    }
}

/// The set of sources known to a run, keyed by `source_id`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCatalog {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl SourceCatalog {
    /// The catalog shipped with the crate
    pub fn builtin() -> Result<Self> {
        (*BUILTIN_CATALOG)
            .clone()
            .map_err(|e| ReconcileError::Config(format!("built-in source catalog: {}", e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: SourceCatalog = toml::from_str(content)?;
        for source in &catalog.sources {
            source.validate()?;
        }
        Ok(catalog)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(format!(
                "Failed to read catalog file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Built-in sources overlaid with the sources from an optional catalog file
    pub fn load_with_overrides<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut catalog = Self::builtin()?;
        if let Some(path) = path {
            catalog.merge(Self::load_from_file(path)?);
        }
        Ok(catalog)
    }

    /// Add sources from `other`, replacing entries with the same id
    pub fn merge(&mut self, other: SourceCatalog) {
        for source in other.sources {
            match self
                .sources
                .iter_mut()
                .find(|s| s.source_id == source.source_id)
            {
                Some(existing) => *existing = source,
                None => self.sources.push(source),
            }
        }
    }

    pub fn get(&self, source_id: &str) -> Result<&SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.source_id == source_id)
            .ok_or_else(|| ReconcileError::UnknownSource(source_id.to_string()))
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source_id.as_str()).collect()
    }
}
