//! Contract Lock - Frozen Governance Constants
//!
//! Changes to the frozen lock are contract changes. Alternate locks can be
//! loaded from TOML, but must pass `check_consistency` before any input is
//! processed.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::ActionKind;
use crate::ENGINE_VERSION;

pub const CONTRACT_VERSION_PREFIX: &str = "GOV-SPEC-V";
pub const ENGINE_VERSION_PREFIX: &str = "ENGINE-V";

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("allowed action set is empty")]
    NoAllowedActions,

    #[error("supported schema version set is empty")]
    NoSupportedSchemas,

    #[error("action '{0}' is listed more than once")]
    DuplicateAction(ActionKind),

    #[error("schema version '{0}' is listed more than once")]
    DuplicateSchemaVersion(String),

    #[error("required-target action '{0}' is not in the allowed action set")]
    RequiredTargetNotAllowed(ActionKind),

    #[error("action '{0}' always carries a target and must stay in the required-target set")]
    RequiredTargetLoosened(ActionKind),

    #[error("default schema version '{0}' is not supported")]
    DefaultSchemaUnsupported(String),

    #[error("hash truncation {0} is outside 1..=64")]
    InvalidTruncation(usize),

    #[error("contract version '{0}' is not of the form GOV-SPEC-V<major>.<minor>")]
    InvalidContractVersion(String),

    #[error("engine version '{0}' is not of the form ENGINE-V<semver>")]
    InvalidEngineVersion(String),

    #[error("contract is locked to {locked}, running engine is {running}")]
    EngineMismatch { locked: String, running: String },

    #[error("failed to read contract lock: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse contract lock: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize contract lock: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Volatile data is excluded from artifacts and hashes.
    #[default]
    Release,
    /// Timestamps and export ids are stamped into artifacts and hashes.
    Development,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Release => "release",
            BuildMode::Development => "development",
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(BuildMode::Release),
            "development" => Ok(BuildMode::Development),
            other => Err(format!("unknown build mode '{other}' (expected release or development)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashEncoding {
    #[default]
    Hex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashConfig {
    #[serde(default)]
    pub algorithm: HashAlgorithm,
    #[serde(default)]
    pub encoding: HashEncoding,
    /// Number of leading hex characters kept.
    #[serde(default = "default_truncate")]
    pub truncate: usize,
}

fn default_truncate() -> usize { 16 }

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            encoding: HashEncoding::Hex,
            truncate: default_truncate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractLock {
    pub expected_contract_version: String,
    pub export_engine_version: String,
    pub supported_schema_versions: Vec<String>,
    pub default_schema_version: String,
    pub allowed_actions: Vec<ActionKind>,
    pub required_target_actions: Vec<ActionKind>,
    #[serde(default)]
    pub build_mode: BuildMode,
    #[serde(default)]
    pub hash: HashConfig,
}

impl ContractLock {
    /// The governance-controlled lock shipped with this engine.
    pub fn frozen() -> Self {
        Self {
            expected_contract_version: format!("{CONTRACT_VERSION_PREFIX}2.0"),
            export_engine_version: format!("{ENGINE_VERSION_PREFIX}{ENGINE_VERSION}"),
            supported_schema_versions: ["1.0", "1.1", "1.2", "2.0"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_schema_version: "1.0".to_string(),
            allowed_actions: ActionKind::ALL.to_vec(),
            required_target_actions: vec![
                ActionKind::ShowInformation,
                ActionKind::Navigate,
                ActionKind::ExternalLink,
            ],
            build_mode: BuildMode::Release,
            hash: HashConfig::default(),
        }
    }

    /// Load an alternate lock from a TOML file.
    ///
    /// The result is not checked; callers go through `check_consistency`
    /// (or `Pipeline::new`) before using it.
    pub fn from_file(path: &Path) -> Result<Self, ContractError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ContractError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ContractError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_build_mode(&self, build_mode: BuildMode) -> Self {
        Self { build_mode, ..self.clone() }
    }

    pub fn allows(&self, kind: ActionKind) -> bool {
        self.allowed_actions.contains(&kind)
    }

    pub fn requires_target(&self, kind: ActionKind) -> bool {
        kind.requires_target() || self.required_target_actions.contains(&kind)
    }

    pub fn supports_schema(&self, version: &str) -> bool {
        self.supported_schema_versions.iter().any(|v| v == version)
    }

    /// Parsed engine version, e.g. `ENGINE-V2.0.0` -> `2.0.0`.
    pub fn engine_semver(&self) -> Result<semver::Version, ContractError> {
        self.export_engine_version
            .strip_prefix(ENGINE_VERSION_PREFIX)
            .and_then(|v| semver::Version::parse(v).ok())
            .ok_or_else(|| ContractError::InvalidEngineVersion(self.export_engine_version.clone()))
    }

    /// Parsed contract revision, e.g. `GOV-SPEC-V2.0` -> `(2, 0)`.
    pub fn contract_revision(&self) -> Result<(u64, u64), ContractError> {
        self.expected_contract_version
            .strip_prefix(CONTRACT_VERSION_PREFIX)
            .and_then(|v| semver::Version::parse(&format!("{v}.0")).ok())
            .map(|v| (v.major, v.minor))
            .ok_or_else(|| ContractError::InvalidContractVersion(self.expected_contract_version.clone()))
    }

    /// Reject a lock that contradicts itself or the running engine.
    pub fn check_consistency(&self) -> Result<(), ContractError> {
        if self.allowed_actions.is_empty() {
            return Err(ContractError::NoAllowedActions);
        }
        if self.supported_schema_versions.is_empty() {
            return Err(ContractError::NoSupportedSchemas);
        }

        for list in [&self.allowed_actions, &self.required_target_actions] {
            if let Some(kind) = first_duplicate(list.iter().copied()) {
                return Err(ContractError::DuplicateAction(kind));
            }
        }
        if let Some(version) = first_duplicate(self.supported_schema_versions.iter()) {
            return Err(ContractError::DuplicateSchemaVersion(version.clone()));
        }

        for kind in &self.required_target_actions {
            if !self.allows(*kind) {
                return Err(ContractError::RequiredTargetNotAllowed(*kind));
            }
        }
        for kind in &self.allowed_actions {
            if kind.requires_target() && !self.required_target_actions.contains(kind) {
                return Err(ContractError::RequiredTargetLoosened(*kind));
            }
        }

        if !self.supports_schema(&self.default_schema_version) {
            return Err(ContractError::DefaultSchemaUnsupported(self.default_schema_version.clone()));
        }
        if !(1..=64).contains(&self.hash.truncate) {
            return Err(ContractError::InvalidTruncation(self.hash.truncate));
        }

        self.contract_revision()?;
        let locked = self.engine_semver()?;
        let running = semver::Version::parse(ENGINE_VERSION)
            .map_err(|_| ContractError::InvalidEngineVersion(ENGINE_VERSION.to_string()))?;
        if locked.major != running.major || locked > running {
            return Err(ContractError::EngineMismatch {
                locked: self.export_engine_version.clone(),
                running: format!("{ENGINE_VERSION_PREFIX}{running}"),
            });
        }

        Ok(())
    }
}

fn first_duplicate<T: Ord + Clone>(items: impl IntoIterator<Item = T>) -> Option<T> {
    let mut seen = BTreeSet::new();
    items.into_iter().find(|item| !seen.insert(item.clone()))
}

impl Default for ContractLock {
    fn default() -> Self {
        Self::frozen()
    }
}
