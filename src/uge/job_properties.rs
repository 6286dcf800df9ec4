//! Job metadata embedded in workflow job scripts.
//!
//! Snakemake writes a `# properties = {json}` comment into every cluster job
//! script it hands to the submit tool. That line is the only channel through
//! which rule name, wildcards, resource requests, and per-job cluster
//! overrides reach the scheduler side.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

const PROPERTIES_PREFIX: &str = "# properties =";

/// Properties of a single workflow job, read-only once parsed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobProperties {
    /// Job kind; `"group"` changes how ids, names, and log stems are derived
    #[serde(rename = "type")]
    pub job_type: String,

    /// Engine-assigned id: an integer for single jobs, a UUID-like string
    /// for group jobs
    pub jobid: Option<Value>,

    /// Workflow rule name (absent for group jobs)
    pub rule: Option<String>,

    /// Group identifier (group jobs only)
    pub groupid: Option<String>,

    /// Thread request from the rule definition
    pub threads: Option<u32>,

    /// Wildcard assignments, in rule order
    pub wildcards: Map<String, Value>,

    /// Resource requests (`mem_mb`, `runtime`, ...)
    pub resources: Map<String, Value>,

    /// Per-job cluster overrides (`queue`, `logdir`, `jobname`, ...)
    pub cluster: Map<String, Value>,
}

impl JobProperties {
    /// Parse the properties comment out of a job script.
    pub fn from_jobscript(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read job script {}", path.display()))?;
        for line in contents.lines() {
            if let Some(json) = line.strip_prefix(PROPERTIES_PREFIX) {
                return serde_json::from_str(json.trim()).with_context(|| {
                    format!("malformed job properties in {}", path.display())
                });
            }
        }
        Err(anyhow!(
            "no `{}` line found in job script {}",
            PROPERTIES_PREFIX,
            path.display()
        ))
    }

    pub fn is_group_jobtype(&self) -> bool {
        self.job_type == "group"
    }
}

/// String form of a JSON scalar, without quotes around strings.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integer lookup that tolerates numeric strings, which per-job cluster
/// overrides frequently carry.
pub fn map_u64(map: &Map<String, Value>, key: &str) -> Option<u64> {
    match map.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// String lookup over a properties map.
pub fn map_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).map(value_to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> JobProperties {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_single_job_properties() {
        let props = parse(
            r#"{"type": "single", "rule": "align", "wildcards": {"sample": "a", "i": "0"},
                "jobid": 7, "threads": 4, "resources": {"mem_mb": 2000}}"#,
        );
        assert!(!props.is_group_jobtype());
        assert_eq!(props.rule.as_deref(), Some("align"));
        assert_eq!(props.threads, Some(4));
        assert_eq!(map_u64(&props.resources, "mem_mb"), Some(2000));
        let keys: Vec<&String> = props.wildcards.keys().collect();
        assert_eq!(keys, ["sample", "i"]);
    }

    #[test]
    fn test_group_job_properties() {
        let props = parse(
            r#"{"type": "group", "groupid": "mygroup",
                "jobid": "a9722c33-51ba-5ac4-9f17-bab04c68bc3d"}"#,
        );
        assert!(props.is_group_jobtype());
        assert_eq!(props.groupid.as_deref(), Some("mygroup"));
    }

    #[test]
    fn test_map_u64_accepts_numeric_strings() {
        let props = parse(r#"{"cluster": {"mem_mb": "3000", "queue": "long"}}"#);
        assert_eq!(map_u64(&props.cluster, "mem_mb"), Some(3000));
        assert_eq!(map_u64(&props.cluster, "queue"), None);
        assert_eq!(map_string(&props.cluster, "queue").as_deref(), Some("long"));
    }

    #[test]
    fn test_jobscript_without_properties_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("job.sh");
        fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        assert!(JobProperties::from_jobscript(&script).is_err());
    }

    #[test]
    fn test_jobscript_with_properties_line() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("job.sh");
        fs::write(
            &script,
            "#!/bin/sh\n# properties = {\"type\": \"single\", \"rule\": \"sort\", \"jobid\": 3}\nsort in > out\n",
        )
        .unwrap();
        let props = JobProperties::from_jobscript(&script).unwrap();
        assert_eq!(props.rule.as_deref(), Some("sort"));
        assert_eq!(map_u64(&props.resources, "mem_mb"), None);
    }
}
