//! Per-rule `qsub` parameter overlay.
//!
//! A `uge.yaml` file next to the workflow maps rule names (or `__default__`)
//! to extra scheduler flags, either a single string or a list of strings:
//!
//! ```yaml
//! __default__:
//!   - "-P project"
//! heavy_rule: "-l gpu=1"
//! ```
//!
//! The flags are appended to the synthesized command after the flags the
//! workflow engine passed on the command line.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const DEFAULT_RULE: &str = "__default__";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ParamEntry {
    One(String),
    Many(Vec<String>),
}

impl ParamEntry {
    fn into_vec(self) -> Vec<String> {
        match self {
            ParamEntry::One(param) => vec![param],
            ParamEntry::Many(params) => params,
        }
    }
}

/// Extra scheduler flags keyed by rule name.
#[derive(Debug, Clone, Default)]
pub struct RuleParams {
    params: HashMap<String, Vec<String>>,
}

impl RuleParams {
    /// Load the overlay file; a missing file is an empty overlay.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml(&contents).with_context(|| format!("malformed overlay {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: HashMap<String, ParamEntry> =
            serde_yaml::from_str(contents).context("expected a mapping of rule name to flags")?;
        let params = raw
            .into_iter()
            .map(|(rule, entry)| (rule, entry.into_vec()))
            .collect();
        Ok(Self { params })
    }

    /// Extra flags for `rule`: the `__default__` entries first, then the
    /// rule's own, each in file order, joined by single spaces. Empty when
    /// neither is present.
    pub fn params_for_rule(&self, rule: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(defaults) = self.params.get(DEFAULT_RULE) {
            parts.extend(defaults.iter().map(String::as_str));
        }
        if let Some(own) = self.params.get(rule) {
            parts.extend(own.iter().map(String::as_str));
        }
        parts.join(" ")
    }
}
