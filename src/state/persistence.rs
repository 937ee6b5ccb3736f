//! State file persistence.
//!
//! The state file is a single JSON document holding every managed rule group,
//! keyed by resource address (`netfw_rule_group.<label>`). Each save bumps the
//! serial and replaces the file atomically through a temporary sibling.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::ResourceState;
use crate::error::{Error, Result};

/// Resource type prefix used in addresses.
pub const RESOURCE_TYPE: &str = "netfw_rule_group";

/// Current state file format version.
pub const STATE_VERSION: u32 = 1;

/// Address of the rule group declared under `label`.
pub fn resource_address(label: &str) -> String {
    format!("{RESOURCE_TYPE}.{label}")
}

fn label_of(address: &str) -> Option<&str> {
    address
        .strip_prefix(RESOURCE_TYPE)
        .and_then(|rest| rest.strip_prefix('.'))
}

/// Persisted state for all managed rule groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Identifies this state across saves
    pub lineage: Uuid,
    /// Incremented on every save
    pub serial: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub resources: IndexMap<String, ResourceState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

impl StateFile {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            lineage: Uuid::new_v4(),
            serial: 0,
            updated_at: Utc::now(),
            resources: IndexMap::new(),
        }
    }

    /// Loads state from `path`, or starts empty if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No state file, starting empty");
            return Ok(Self::new());
        }

        let file = File::open(path)?;
        let state: StateFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::State(format!("{}: {}", path.display(), e)))?;

        if state.version > STATE_VERSION {
            return Err(Error::State(format!(
                "{} has format version {}, this build supports up to {}",
                path.display(),
                state.version,
                STATE_VERSION
            )));
        }

        debug!(
            path = %path.display(),
            serial = state.serial,
            resources = state.resources.len(),
            "Loaded state"
        );
        Ok(state)
    }

    /// Writes state to `path`, bumping the serial.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.serial += 1;
        self.updated_at = Utc::now();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), serial = self.serial, "Saved state");
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&ResourceState> {
        self.resources.get(&resource_address(label))
    }

    /// Inserts or replaces the state for `label`.
    pub fn insert(&mut self, label: &str, state: ResourceState) {
        self.resources.insert(resource_address(label), state);
    }

    pub fn remove(&mut self, label: &str) -> Option<ResourceState> {
        self.resources.shift_remove(&resource_address(label))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.resources.contains_key(&resource_address(label))
    }

    /// Labels of all managed resources, in insertion order.
    pub fn labels(&self) -> Vec<String> {
        self.resources
            .keys()
            .filter_map(|address| label_of(address))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuleGroupType;
    use tempfile::TempDir;

    fn resource(name: &str) -> ResourceState {
        let arn = format!("arn:aws:network-firewall:us-east-1:1:stateful-rulegroup/{name}");
        ResourceState {
            id: arn.clone(),
            arn,
            name: name.into(),
            rule_group_type: RuleGroupType::Stateful,
            capacity: 100,
            description: None,
            rules: Some("pass ip any any -> any any (sid:1;)".into()),
            rule_group: None,
            tags: Default::default(),
            update_token: "t".into(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = StateFile::load(&dir.path().join("netfw.state.json")).unwrap();
        assert!(state.is_empty());
        assert_eq!(state.serial, 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("netfw.state.json");

        let mut state = StateFile::new();
        state.insert("web", resource("web"));
        state.insert("dns", resource("dns"));
        state.save(&path).unwrap();
        state.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded.serial, 2);
        assert_eq!(loaded.lineage, state.lineage);
        assert_eq!(loaded.labels(), vec!["web", "dns"]);
        assert_eq!(loaded.get("dns").unwrap().name, "dns");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut state = StateFile::new();
        state.insert("a", resource("a"));
        state.insert("b", resource("b"));
        state.insert("c", resource("c"));

        assert!(state.remove("b").is_some());
        assert!(state.remove("b").is_none());
        assert_eq!(state.labels(), vec!["a", "c"]);
        assert!(state.contains("c"));
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut state = StateFile::new();
        state.version = STATE_VERSION + 1;
        fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        let err = StateFile::load(&path).unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[test]
    fn test_address_format() {
        assert_eq!(resource_address("web"), "netfw_rule_group.web");
        assert_eq!(label_of("netfw_rule_group.web"), Some("web"));
        assert_eq!(label_of("other.web"), None);
    }
}
