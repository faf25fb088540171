//! Compiled contract artifacts.
//!
//! Artifacts follow the Hardhat layout: one JSON file per contract carrying
//! `abi`, `bytecode` and `deployedBytecode`, stored anywhere below the
//! artifacts root (typically `artifacts/contracts/<Source>.sol/<Name>.json`).

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{B256, Bytes, keccak256};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DeployError};

/// A single compiled contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub contract_name: String,
    pub abi: serde_json::Value,
    pub bytecode: Bytes,
    #[serde(default)]
    pub deployed_bytecode: Bytes,
}

impl Artifact {
    /// Hash identifying this version of the creation code.
    pub fn bytecode_hash(&self) -> B256 {
        keccak256(&self.bytecode)
    }
}

/// Artifacts needed by a run, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    root: PathBuf,
    artifacts: BTreeMap<String, Artifact>,
}

impl ArtifactStore {
    /// An empty store rooted at `root`. Artifacts are added with [`Self::insert`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            artifacts: BTreeMap::new(),
        }
    }

    /// Load the named artifacts from `root`, failing on the first one missing.
    pub fn load<'a>(
        root: impl Into<PathBuf>,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, DeployError> {
        let mut store = Self::new(root);
        for name in names {
            let path = find_artifact(&store.root, name)?.ok_or_else(|| {
                ConfigError::MissingArtifact {
                    name: name.to_string(),
                    root: store.root.clone(),
                }
            })?;
            let artifact = read_artifact(&path)?;
            tracing::debug!(name, path = %path.display(), "Loaded artifact");
            store.artifacts.insert(name.to_string(), artifact);
        }
        Ok(store)
    }

    pub fn insert(&mut self, name: impl Into<String>, artifact: Artifact) {
        self.artifacts.insert(name.into(), artifact);
    }

    pub fn get(&self, name: &str) -> Result<&Artifact, ConfigError> {
        self.artifacts
            .get(name)
            .ok_or_else(|| ConfigError::MissingArtifact {
                name: name.to_string(),
                root: self.root.clone(),
            })
    }

    /// Check that every name is present.
    pub fn require<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), ConfigError> {
        for name in names {
            self.get(name)?;
        }
        Ok(())
    }
}

fn read_artifact(path: &Path) -> Result<Artifact, DeployError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DeployError::io(format!("Failed to read artifact {}", path.display()), e))?;
    let artifact: Artifact =
        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidArtifact {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if artifact.bytecode.is_empty() {
        return Err(ConfigError::InvalidArtifact {
            path: path.to_path_buf(),
            reason: "empty creation bytecode (abstract contract or interface?)".to_string(),
        }
        .into());
    }

    Ok(artifact)
}

/// Locate `<name>.json` below `dir`, preferring shallower matches.
fn find_artifact(dir: &Path, name: &str) -> Result<Option<PathBuf>, DeployError> {
    let file_name = format!("{name}.json");
    let candidate = dir.join(&file_name);
    if candidate.is_file() {
        return Ok(Some(candidate));
    }
    if !dir.is_dir() {
        return Ok(None);
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| DeployError::io(format!("Failed to list {}", dir.display()), e))?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| DeployError::io(format!("Failed to list {}", dir.display()), e))?;
        let path = entry.path();
        // build-info holds compiler input/output, never contract artifacts.
        if path.is_dir() && entry.file_name() != "build-info" {
            subdirs.push(path);
        }
    }
    subdirs.sort();

    for subdir in subdirs {
        if let Some(found) = find_artifact(&subdir, name)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}
