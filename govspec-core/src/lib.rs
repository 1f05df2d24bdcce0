//! Governed Spec Core - Contract-Locked Export Engine
//!
//! # The Five Laws (Non-Negotiable)
//! 1. The Contract Lock Is Frozen
//! 2. Legacy Shapes Are Normalized, Never Special-Cased
//! 3. Validation Reports, It Never Repairs
//! 4. Release Output Is Deterministic
//! 5. A Batch Never Drops An Input

pub mod actions;
pub mod contract;
pub mod model;
pub mod normalize;
pub mod validation;
pub mod hashing;
pub mod render;
pub mod pipeline;
pub mod manifest;

pub use actions::{ActionKind, ActionViolation, GovernedAction, RawAction};
pub use contract::{BuildMode, ContractError, ContractLock, HashConfig};
pub use model::{Category, Node, Section, SpecTree};
pub use normalize::{legacy_suffix, normalize};
pub use validation::{validate, ContractValidator, ValidationReport, ValidationViolation, ViolationLocation};
pub use hashing::{canonical_json, compute_export_hash, compute_model_hash, VolatileStamp};
pub use render::{render_export_csv, render_governed_spec, render_inventory_csv, render_rejection_csv};
pub use pipeline::{BatchOutcome, BatchSummary, ExportMetadata, ExportResult, Pipeline, PipelineError};
pub use manifest::{write_artifacts, Manifest, ManifestEntry, ManifestError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
