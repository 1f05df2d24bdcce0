//! Export Pipeline - Single Entry Point
//!
//! CRITICAL: every export is normalized and validated before it is hashed or
//! rendered. No bypass. Invalid exports are still produced, flagged invalid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::contract::{BuildMode, ContractError, ContractLock};
use crate::hashing::{compute_export_hash, compute_model_hash, compute_raw_hash, VolatileStamp};
use crate::manifest::{Manifest, ManifestEntry};
use crate::model::{Category, SpecTree};
use crate::normalize::normalize;
use crate::render::{
    render_export_csv, render_governed_spec, render_inventory_csv, render_rejection, render_rejection_csv,
};
use crate::validation::{ContractValidator, ValidationReport, ValidationViolation};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

pub const INVENTORY_FILENAME: &str = "export_inventory.csv";
pub const SUMMARY_FILENAME: &str = "summary.json";

pub fn governed_spec_filename(page_id: &str) -> String {
    format!("{page_id}_governed_spec_new.txt")
}

pub fn export_csv_filename(page_id: &str) -> String {
    format!("{page_id}_export.csv")
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Contract lock rejected: {0}")]
    Contract(#[from] ContractError),

    #[error("Malformed input '{id}': {reason}")]
    MalformedInput { id: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl PipelineError {
    fn rule(&self) -> &'static str {
        match self {
            PipelineError::MalformedInput { .. } => "malformed_input",
            PipelineError::Contract(_) => "contract_lock",
            PipelineError::SerializationError(_) => "serialization",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub model_hash: String,
    pub export_hash: String,
    pub contract_version: String,
    pub schema_version: String,
    pub engine_version: String,
    pub build_mode: BuildMode,
    pub total_subsections: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResult {
    pub page_id: String,
    pub category: Category,
    /// Governed spec text.
    pub content: String,
    pub csv: String,
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub metadata: ExportMetadata,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_pages: usize,
    pub total_components: usize,
    pub total_exports: usize,
    pub valid_exports: usize,
    pub invalid_exports: usize,
    pub all_valid: bool,
}

impl BatchSummary {
    pub fn from_results(results: &[ExportResult]) -> Self {
        let summary = results.iter().fold(Self::default(), |mut acc, result| {
            match result.category {
                Category::Pages => acc.total_pages += 1,
                Category::Components => acc.total_components += 1,
            }
            if result.valid {
                acc.valid_exports += 1;
            } else {
                acc.invalid_exports += 1;
            }
            acc
        });

        Self {
            total_exports: results.len(),
            all_valid: summary.invalid_exports == 0,
            ..summary
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// One result per manifest entry, in manifest order.
    pub results: Vec<ExportResult>,
    pub summary: BatchSummary,
}

impl BatchOutcome {
    pub fn inventory_csv(&self) -> String {
        render_inventory_csv(&self.results)
    }

    pub fn result(&self, page_id: &str) -> Option<&ExportResult> {
        self.results.iter().find(|r| r.page_id == page_id)
    }
}

/// The export pipeline - single entry point for all governed exports
pub struct Pipeline {
    lock: ContractLock,
    validator: ContractValidator,
}

impl Pipeline {
    /// Refuses a contract lock that contradicts itself.
    pub fn new(lock: ContractLock) -> Result<Self, PipelineError> {
        lock.check_consistency()?;
        Ok(Self {
            lock,
            validator: ContractValidator::new(),
        })
    }

    pub fn contract(&self) -> &ContractLock {
        &self.lock
    }

    /// Validate a normalized tree
    ///
    /// This is the ONLY validation entry point.
    pub fn validate_tree(&self, tree: &SpecTree) -> ValidationReport {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        self.validator.validate(tree, &self.lock)
    }

    /// Normalize, validate, hash and render one tree.
    pub fn export_tree(
        &self,
        page_id: &str,
        category: Category,
        tree: &SpecTree,
    ) -> Result<ExportResult, PipelineError> {
        let normalized = normalize(tree);

        // MANDATORY: validation always runs, valid or not.
        let validation = self.validate_tree(&normalized);

        let stamp = VolatileStamp::capture(self.lock.build_mode);
        let model_hash = compute_model_hash(&normalized, &self.lock.hash, stamp.as_ref())?;
        let content = render_governed_spec(&normalized, &validation, page_id, category, &self.lock, stamp.as_ref());
        let export_hash = compute_export_hash(&content, &self.lock.hash);
        let csv = render_export_csv(&normalized, &validation, page_id, category);

        if validation.valid {
            info!(page = %page_id, %category, %model_hash, %export_hash, "exported governed spec");
        } else {
            warn!(
                page = %page_id,
                %category,
                violations = validation.violations.len(),
                "governed spec failed contract validation"
            );
        }

        Ok(ExportResult {
            page_id: page_id.to_string(),
            category,
            content,
            csv,
            valid: validation.valid,
            metadata: ExportMetadata {
                model_hash,
                export_hash,
                contract_version: validation.contract_version,
                schema_version: validation.schema_version,
                engine_version: self.lock.export_engine_version.clone(),
                build_mode: self.lock.build_mode,
                total_subsections: normalized.sections.len(),
                generated_at: stamp.as_ref().map(|s| s.generated_at),
                export_id: stamp.as_ref().map(|s| s.export_id),
            },
            violations: validation.violations,
        })
    }

    /// Export a single manifest entry.
    ///
    /// A raw tree that cannot be read as a spec tree is an error here; see
    /// `run_batch` for how a batch records it instead.
    pub fn export_one(&self, entry: &ManifestEntry) -> Result<ExportResult, PipelineError> {
        let tree = SpecTree::from_value(entry.tree.clone()).map_err(|e| PipelineError::MalformedInput {
            id: entry.id.clone(),
            reason: e.to_string(),
        })?;
        self.export_tree(&entry.id, entry.category, &tree)
    }

    /// Export every manifest entry and fold the summary.
    ///
    /// Never aborts: an entry that fails outright is recorded as an invalid
    /// result carrying a single violation for the failure.
    pub fn run_batch(&self, manifest: &Manifest) -> BatchOutcome {
        let results: Vec<_> = manifest
            .entries
            .iter()
            .map(|entry| match self.export_one(entry) {
                Ok(result) => result,
                Err(err) => self.reject(entry, &err),
            })
            .collect();

        let summary = BatchSummary::from_results(&results);
        info!(
            total = summary.total_exports,
            valid = summary.valid_exports,
            invalid = summary.invalid_exports,
            "batch export complete"
        );

        BatchOutcome { results, summary }
    }

    fn reject(&self, entry: &ManifestEntry, err: &PipelineError) -> ExportResult {
        warn!(page = %entry.id, error = %err, "input rejected before validation");

        let violation = ValidationViolation {
            rule: err.rule().to_string(),
            message: err.to_string(),
            expected: Some("a spec tree with a `sections` list of records".to_string()),
            actual: None,
            location: None,
            remediation: vec!["Fix the layout JSON structure and re-run the export".to_string()],
        };

        let stamp = VolatileStamp::capture(self.lock.build_mode);
        let content = render_rejection(&entry.id, entry.category, &self.lock, stamp.as_ref(), &violation);

        ExportResult {
            page_id: entry.id.clone(),
            category: entry.category,
            csv: render_rejection_csv(&entry.id, entry.category),
            valid: false,
            metadata: ExportMetadata {
                model_hash: compute_raw_hash(&entry.tree, &self.lock.hash),
                export_hash: compute_export_hash(&content, &self.lock.hash),
                contract_version: self.lock.expected_contract_version.clone(),
                schema_version: self.lock.default_schema_version.clone(),
                engine_version: self.lock.export_engine_version.clone(),
                build_mode: self.lock.build_mode,
                total_subsections: 0,
                generated_at: stamp.as_ref().map(|s| s.generated_at),
                export_id: stamp.as_ref().map(|s| s.export_id),
            },
            content,
            violations: vec![violation],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pipeline() -> Pipeline {
        Pipeline::new(ContractLock::frozen()).unwrap()
    }

    #[test]
    fn test_summary_fold() {
        let mut manifest = Manifest::default();
        manifest.push("home", Category::Pages, json!({"sections": []}));
        manifest.push("faq", Category::Pages, json!({"schema_version": "7.0", "sections": []}));
        manifest.push("nav", Category::Components, json!({"sections": []}));

        let summary = pipeline().run_batch(&manifest).summary;
        assert_eq!(
            summary,
            BatchSummary {
                total_pages: 2,
                total_components: 1,
                total_exports: 3,
                valid_exports: 2,
                invalid_exports: 1,
                all_valid: false,
            }
        );
    }

    #[test]
    fn test_empty_batch_is_all_valid() {
        let outcome = pipeline().run_batch(&Manifest::default());
        assert!(outcome.results.is_empty());
        assert!(outcome.summary.all_valid);
        assert_eq!(outcome.inventory_csv(), "Page,Total Subsections,Validation Status,Model Hash,Export Hash\n");
    }

    #[test]
    fn test_export_one_propagates_malformed_input() {
        let entry = ManifestEntry::new("broken", Category::Pages, json!({"sections": [42]}));
        let err = pipeline().export_one(&entry).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { ref id, .. } if id == "broken"));
    }

    #[test]
    fn test_batch_records_malformed_input() {
        let mut manifest = Manifest::default();
        manifest.push("broken", Category::Pages, json!({"title": "no sections"}));

        let outcome = pipeline().run_batch(&manifest);
        let result = &outcome.results[0];

        assert!(!result.valid);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rule, "malformed_input");
        assert!(result.content.contains("Validation Status: INVALID"));
        assert_eq!(result.metadata.model_hash.len(), 16);

        let rows: Vec<_> = result.csv.lines().collect();
        assert_eq!(rows[0], crate::render::EXPORT_CSV_HEADER);
        assert_eq!(rows[1], "broken,Pages,,,,,,,,,,INVALID");
        assert_eq!(rows.len(), 2);
        assert_eq!(outcome.summary.invalid_exports, 1);
    }

    #[test]
    fn test_metadata_in_release_mode() {
        let entry = ManifestEntry::new("home", Category::Pages, json!({"schema_version": "2.0", "sections": [{}, {}]}));
        let result = pipeline().export_one(&entry).unwrap();

        assert_eq!(result.metadata.schema_version, "2.0");
        assert_eq!(result.metadata.contract_version, "GOV-SPEC-V2.0");
        assert_eq!(result.metadata.engine_version, "ENGINE-V2.0.0");
        assert_eq!(result.metadata.total_subsections, 2);
        assert!(result.metadata.generated_at.is_none());
        assert!(result.metadata.export_id.is_none());
        assert_eq!(result.metadata.export_hash, compute_export_hash(&result.content, &ContractLock::frozen().hash));
    }

    #[test]
    fn test_development_mode_stamps_metadata() {
        let pipeline = Pipeline::new(ContractLock::frozen().with_build_mode(BuildMode::Development)).unwrap();
        let entry = ManifestEntry::new("home", Category::Pages, json!({"sections": []}));
        let result = pipeline.export_one(&entry).unwrap();

        let export_id = result.metadata.export_id.unwrap();
        assert!(result.metadata.generated_at.is_some());
        assert!(result.content.contains(&export_id.to_string()));
    }

    #[test]
    fn test_inconsistent_lock_refused() {
        let mut lock = ContractLock::frozen();
        lock.supported_schema_versions.clear();
        assert!(matches!(Pipeline::new(lock), Err(PipelineError::Contract(_))));
    }

    #[test]
    fn test_filenames() {
        assert_eq!(governed_spec_filename("homepage"), "homepage_governed_spec_new.txt");
        assert_eq!(export_csv_filename("nav-primary"), "nav-primary_export.csv");
    }
}
