//! Validation System - Contract Gates
//!
//! Rules produce structured violations. Every rule runs; the report carries
//! all of them. Nothing here repairs a tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actions::{ActionViolation, GovernedAction};
use crate::contract::ContractLock;
use crate::model::SpecTree;

/// Where in a tree an offending action sits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationLocation {
    /// 1-based section position.
    pub section: usize,
    pub section_id: String,
    /// Dotted 1-based path below the section, e.g. `2.1`.
    pub path: String,
}

impl fmt::Display for ViolationLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.section_id.is_empty() {
            write!(f, "section {} > {}", self.section, self.path)
        } else {
            write!(f, "{} > {}", self.section_id, self.path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ViolationLocation>,
    pub remediation: Vec<String>,
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " (at {location})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    /// Declared contract version, or the lock's expected one when absent.
    pub contract_version: String,
    /// Declared schema version, or the lock's default when absent.
    pub schema_version: String,
}

impl ValidationReport {
    pub fn new(tree: &SpecTree, lock: &ContractLock, violations: Vec<ValidationViolation>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
            contract_version: effective_contract_version(tree, lock).to_string(),
            schema_version: effective_schema_version(tree, lock).to_string(),
        }
    }

    pub fn violations_for<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a ValidationViolation> + 'a {
        self.violations.iter().filter(move |v| v.rule == rule)
    }
}

pub fn effective_contract_version<'a>(tree: &'a SpecTree, lock: &'a ContractLock) -> &'a str {
    tree.contract_version
        .as_deref()
        .unwrap_or(&lock.expected_contract_version)
}

pub fn effective_schema_version<'a>(tree: &'a SpecTree, lock: &'a ContractLock) -> &'a str {
    tree.schema_version
        .as_deref()
        .unwrap_or(&lock.default_schema_version)
}

/// Validation rule trait - produces violations
pub trait ContractRule {
    fn name(&self) -> &'static str;
    fn check(&self, tree: &SpecTree, lock: &ContractLock) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

pub struct ContractVersionRule;

impl ContractRule for ContractVersionRule {
    fn name(&self) -> &'static str { "contract_version" }

    fn check(&self, tree: &SpecTree, lock: &ContractLock) -> Vec<ValidationViolation> {
        let declared = effective_contract_version(tree, lock);
        if declared == lock.expected_contract_version {
            return vec![];
        }

        vec![ValidationViolation {
            rule: self.name().to_string(),
            message: format!("Contract version mismatch: {declared}"),
            expected: Some(lock.expected_contract_version.clone()),
            actual: Some(declared.to_string()),
            location: None,
            remediation: vec![format!(
                "Re-export the layout against {}",
                lock.expected_contract_version
            )],
        }]
    }
}

pub struct SchemaVersionRule;

impl ContractRule for SchemaVersionRule {
    fn name(&self) -> &'static str { "schema_version" }

    fn check(&self, tree: &SpecTree, lock: &ContractLock) -> Vec<ValidationViolation> {
        let declared = effective_schema_version(tree, lock);
        if lock.supports_schema(declared) {
            return vec![];
        }

        vec![ValidationViolation {
            rule: self.name().to_string(),
            message: format!("Unsupported schema version: {declared}"),
            expected: Some(lock.supported_schema_versions.join(", ")),
            actual: Some(declared.to_string()),
            location: None,
            remediation: vec!["Migrate the layout to a supported schema version".to_string()],
        }]
    }
}

pub struct ActionTaxonomyRule;

impl ContractRule for ActionTaxonomyRule {
    fn name(&self) -> &'static str { "action_taxonomy" }

    fn check(&self, tree: &SpecTree, lock: &ContractLock) -> Vec<ValidationViolation> {
        action_failures(tree, lock)
            .filter_map(|(failure, location)| {
                let actual = match &failure {
                    ActionViolation::Unrecognized { tag } => tag.clone(),
                    ActionViolation::NotAllowed { kind } => kind.to_string(),
                    ActionViolation::MissingTarget { .. } => return None,
                };
                Some(ValidationViolation {
                    rule: self.name().to_string(),
                    message: failure.to_string(),
                    expected: Some(allowed_list(lock)),
                    actual: Some(actual),
                    location: Some(location),
                    remediation: vec!["Use an action from the frozen taxonomy".to_string()],
                })
            })
            .collect()
    }
}

pub struct RequiredTargetRule;

impl ContractRule for RequiredTargetRule {
    fn name(&self) -> &'static str { "required_target" }

    fn check(&self, tree: &SpecTree, lock: &ContractLock) -> Vec<ValidationViolation> {
        action_failures(tree, lock)
            .filter_map(|(failure, location)| match failure {
                ActionViolation::MissingTarget { kind } => Some(ValidationViolation {
                    rule: self.name().to_string(),
                    message: failure.to_string(),
                    expected: Some("non-empty target".to_string()),
                    actual: Some("empty".to_string()),
                    location: Some(location),
                    remediation: vec![format!("Set a target for the {kind} action")],
                }),
                _ => None,
            })
            .collect()
    }
}

fn action_failures<'a>(
    tree: &'a SpecTree,
    lock: &'a ContractLock,
) -> impl Iterator<Item = (ActionViolation, ViolationLocation)> + 'a {
    tree.nodes().into_iter().filter_map(move |(located, path)| {
        let raw = located.node.raw_action()?;
        let failure = GovernedAction::resolve(raw, lock).err()?;
        Some((
            failure,
            ViolationLocation {
                section: located.section,
                section_id: located.section_id.to_string(),
                path: path.to_string(),
            },
        ))
    })
}

fn allowed_list(lock: &ContractLock) -> String {
    lock.allowed_actions
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validator runs every contract gate in order
pub struct ContractValidator {
    rules: Vec<Box<dyn ContractRule>>,
}

impl ContractValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ContractVersionRule),
                Box::new(SchemaVersionRule),
                Box::new(ActionTaxonomyRule),
                Box::new(RequiredTargetRule),
            ],
        }
    }

    pub fn validate(&self, tree: &SpecTree, lock: &ContractLock) -> ValidationReport {
        let mut all_violations = vec![];

        for rule in &self.rules {
            all_violations.extend(rule.check(tree, lock));
        }

        ValidationReport::new(tree, lock, all_violations)
    }
}

impl Default for ContractValidator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate(tree: &SpecTree, lock: &ContractLock) -> ValidationReport {
    ContractValidator::new().validate(tree, lock)
}
