//! Legacy Normalizer - One Canonical Shape
//!
//! Rewrites every section to `section_NN` / `SECTION_NN` with an explicit
//! location and a resolved semantic key. Works on a clone; the input tree is
//! never touched. Nothing is validated here.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::model::{Section, SpecTree};

pub fn normalize(tree: &SpecTree) -> SpecTree {
    let mut normalized = tree.clone();

    for (idx, section) in normalized.sections.iter_mut().enumerate() {
        canonicalize_section(section, idx + 1);
    }

    debug!(sections = normalized.sections.len(), "normalized spec tree");
    normalized
}

pub fn canonical_section_id(position: usize) -> String {
    format!("section_{position:02}")
}

pub fn canonical_section_name(position: usize) -> String {
    format!("SECTION_{position:02}")
}

fn canonicalize_section(section: &mut Section, position: usize) {
    let semantic_key = resolve_semantic_key(section);
    let canonical_id = canonical_section_id(position);

    section.section_id = Some(canonical_id.clone());
    section.id = Some(canonical_id);
    section.name = Some(canonical_section_name(position));
    section.semantic_key = Some(semantic_key);
    section.location = Some(position.to_string());
}

/// Semantic key fallback: explicit field, then legacy identifier suffix,
/// then legacy name suffix (case-folded), then empty.
pub fn resolve_semantic_key(section: &Section) -> String {
    if let Some(key) = section.semantic_key.as_deref().filter(|k| !k.trim().is_empty()) {
        return key.to_string();
    }

    let legacy_id = section.section_id.as_deref().or(section.id.as_deref());
    if let Some(suffix) = legacy_id.and_then(legacy_suffix) {
        return suffix;
    }

    section
        .name
        .as_deref()
        .and_then(|name| legacy_suffix(&name.to_lowercase()))
        .unwrap_or_default()
}

/// Trailing `_word` of a legacy identifier, e.g. `sec_hero_pricing` -> `pricing`.
///
/// Compatibility shim for layouts written before semantic keys existed. Only
/// lowercase ASCII letters after the final underscore qualify, so canonical
/// ids (`section_01`) never yield a key and normalization stays a fixed point.
/// Only the last segment is taken: `hero_main_area` yields `area`, not
/// `main_area`. A multi-word key has to come from the explicit
/// `data-page-section` field. Prefer that field in general; this heuristic
/// makes no promise beyond that pattern.
pub fn legacy_suffix(value: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"_([a-z]+)$").expect("legacy suffix pattern compiles"));

    pattern
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
