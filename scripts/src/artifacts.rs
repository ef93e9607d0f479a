//! Resolution of contract names to compiled bytecode & ABI

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

use alloy::{json_abi::JsonAbi, primitives::Bytes};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    constants::{ARTIFACT_EXTENSION, BUILD_INFO_DIR, DEBUG_ARTIFACT_SUFFIX},
    errors::ScriptError,
};

/// The compiled form of a contract
#[derive(Clone, Debug, PartialEq)]
pub struct ContractArtifact {
    /// The contract name
    pub name: String,
    /// The contract ABI
    pub abi: JsonAbi,
    /// The creation bytecode
    pub bytecode: Bytes,
}

/// The bytecode field, which is a hex string in Hardhat artifacts and an
/// object in Foundry artifacts
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// `"bytecode": "0x..."`
    Hex(Bytes),
    /// `"bytecode": { "object": "0x..." }`
    Object {
        /// The bytecode itself
        object: Bytes,
    },
}

/// The subset of an artifact file we read
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    /// The contract name, only present in Hardhat artifacts
    contract_name: Option<String>,
    /// The contract ABI
    abi: JsonAbi,
    /// The creation bytecode
    bytecode: RawBytecode,
}

impl ContractArtifact {
    /// Parse a Hardhat or Foundry artifact, falling back to `default_name`
    /// when the artifact does not carry a contract name
    pub fn from_json(default_name: &str, json: &str) -> Result<Self, ScriptError> {
        let raw: RawArtifact = serde_json::from_str(json)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{default_name}: {e}")))?;

        let bytecode = match raw.bytecode {
            RawBytecode::Hex(bytes) => bytes,
            RawBytecode::Object { object } => object,
        };

        Ok(Self {
            name: raw.contract_name.unwrap_or_else(|| default_name.to_string()),
            abi: raw.abi,
            bytecode,
        })
    }

    /// Whether the artifact can be deployed, i.e. it is not an interface or
    /// an abstract contract
    pub fn is_deployable(&self) -> bool {
        !self.bytecode.is_empty()
    }
}

/// A set of contract artifacts, keyed by contract name
#[derive(Clone, Debug, Default)]
pub struct Artifacts {
    /// The artifacts
    contracts: BTreeMap<String, ContractArtifact>,
}

impl Artifacts {
    /// An empty artifact set
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every artifact found under the given directory, recursively.
    ///
    /// Works with both Hardhat's `artifacts/` and Foundry's `out/` layouts;
    /// debug files and build info are skipped.
    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let mut artifacts = Self::new();
        let mut pending = vec![path.as_ref().to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir)
                .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", dir.display())))?;

            for entry in entries {
                let path = entry
                    .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?
                    .path();

                if path.is_dir() {
                    if !path.ends_with(BUILD_INFO_DIR) {
                        pending.push(path);
                    }
                    continue;
                }

                if let Some(artifact) = read_artifact(&path)? {
                    artifacts.insert(artifact);
                }
            }
        }

        debug!("Loaded {} artifacts", artifacts.contracts.len());
        Ok(artifacts)
    }

    /// Add an artifact, replacing any artifact of the same name
    pub fn insert(&mut self, artifact: ContractArtifact) {
        if let Some(previous) = self.contracts.insert(artifact.name.clone(), artifact) {
            warn!("Duplicate artifact for {}, keeping the last one", previous.name);
        }
    }

    /// Resolve a contract name to its artifact
    pub fn resolve(&self, name: &str) -> Result<&ContractArtifact, ScriptError> {
        self.contracts
            .get(name)
            .ok_or_else(|| ScriptError::ContractNotFound(name.to_string()))
    }

    /// The names of all known contracts
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(String::as_str)
    }
}

/// Read a single artifact file, returning `None` for files that are not
/// contract artifacts
fn read_artifact(path: &Path) -> Result<Option<ContractArtifact>, ScriptError> {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !file_name.ends_with(ARTIFACT_EXTENSION) || file_name.ends_with(DEBUG_ARTIFACT_SUFFIX) {
        return Ok(None);
    }

    let stem = file_name.trim_end_matches(ARTIFACT_EXTENSION);
    let contents = fs::read_to_string(path)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", path.display())))?;

    match ContractArtifact::from_json(stem, &contents) {
        Ok(artifact) => Ok(Some(artifact)),
        Err(e) => {
            debug!("Skipping {}: {e}", path.display());
            Ok(None)
        }
    }
}
