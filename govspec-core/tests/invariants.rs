//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use govspec_core::{
    contract::{BuildMode, ContractLock},
    hashing::canonical_json,
    manifest::{Manifest, ManifestEntry},
    model::{Category, SpecTree},
    normalize::normalize,
    pipeline::{Pipeline, PipelineError},
    validation::validate,
    ActionKind,
};
use serde_json::{json, Value};

fn create_pipeline() -> Pipeline {
    Pipeline::new(ContractLock::frozen()).unwrap()
}

fn hero_pricing_spec() -> Value {
    json!({
        "sections": [{
            "section_id": "sec_hero_pricing",
            "children": [{"type": "button", "label": "Pricing", "action": "navigate", "target": ""}]
        }]
    })
}

fn valid_homepage_spec() -> Value {
    json!({
        "contract_version": "GOV-SPEC-V2.0",
        "schema_version": "1.1",
        "sections": [
            {
                "section_id": "homepage_hero",
                "name": "Hero",
                "children": [
                    {"type": "button", "label": "Schedule a tour", "action": "navigate", "target": "/contact"},
                    {"type": "link", "label": "Call us", "action": "phone_call", "target": "+1-555-0100"}
                ]
            },
            {
                "name": "Homepage_Amenities",
                "elements": [
                    {"type": "accordion", "action": "toggle", "children": [
                        {"type": "link", "label": "Details", "action": "show_information", "target": "#pool"}
                    ]}
                ]
            }
        ]
    })
}

fn create_manifest() -> Manifest {
    let mut manifest = Manifest::default();
    manifest.push("homepage", Category::Pages, valid_homepage_spec());
    manifest.push("apartments-pricing", Category::Pages, hero_pricing_spec());
    manifest.push("nav-primary", Category::Components, json!({
        "sections": [{"section_id": "nav_links", "children": [
            {"type": "link", "label": "Floor plans", "action": "navigate", "target": "/floor-plans"},
            {"type": "input", "action": "search"}
        ]}]
    }));
    manifest
}

#[test]
fn invariant_scenario_hero_pricing() {
    let tree = SpecTree::from_value(hero_pricing_spec()).unwrap();
    let normalized = normalize(&tree);

    assert_eq!(normalized.sections[0].section_id.as_deref(), Some("section_01"));
    assert_eq!(normalized.sections[0].semantic_key.as_deref(), Some("pricing"));

    let report = validate(&normalized, &ContractLock::frozen());
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].message, "navigate requires non-empty target");

    let result = create_pipeline()
        .export_one(&ManifestEntry::new("apartments-pricing", Category::Pages, hero_pricing_spec()))
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.violations.len(), 1);
}

#[test]
fn invariant_batch_never_aborts() {
    let mut manifest = Manifest::default();
    manifest.push("apartments-pricing", Category::Pages, hero_pricing_spec());
    manifest.push("homepage", Category::Pages, valid_homepage_spec());

    let outcome = create_pipeline().run_batch(&manifest);

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.summary.valid_exports, 1);
    assert_eq!(outcome.summary.invalid_exports, 1);
    assert!(!outcome.summary.all_valid);
    assert!(!outcome.result("apartments-pricing").unwrap().valid);
    assert!(outcome.result("homepage").unwrap().valid);
}

#[test]
fn invariant_malformed_input_is_recorded_not_skipped() {
    let mut manifest = create_manifest();
    manifest.push("gallery", Category::Pages, json!({"sections": "not a list"}));

    let outcome = create_pipeline().run_batch(&manifest);

    assert_eq!(outcome.summary.total_exports, 4);
    assert_eq!(outcome.results.len(), 4);
    let gallery = outcome.result("gallery").unwrap();
    assert!(!gallery.valid);
    assert_eq!(gallery.violations[0].rule, "malformed_input");
    assert!(outcome.inventory_csv().contains("gallery,0,INVALID,"));
}

#[test]
fn invariant_actions_cannot_bypass_the_gates() {
    let mut manifest = Manifest::default();
    manifest.push("hero", Category::Pages, json!({"sections": [{"action": "teleport", "target": ""}]}));
    manifest.push("menu", Category::Components, json!({
        "sections": [{"items": [{"action": "teleport"}, {"action": "navigate"}]}]
    }));

    let outcome = create_pipeline().run_batch(&manifest);

    assert_eq!(outcome.summary.invalid_exports, 2);
    for result in &outcome.results {
        assert!(!result.valid, "{} exported as valid", result.page_id);
        assert_eq!(result.violations[0].rule, "malformed_input");
    }
}

#[test]
fn invariant_release_batches_are_reproducible() {
    let pipeline = create_pipeline();
    let manifest = create_manifest();

    let first = pipeline.run_batch(&manifest);
    let second = pipeline.run_batch(&manifest);

    for (a, b) in first.results.iter().zip(&second.results) {
        assert_eq!(a.metadata.model_hash, b.metadata.model_hash);
        assert_eq!(a.metadata.export_hash, b.metadata.export_hash);
        assert_eq!(a.content, b.content);
        assert_eq!(a.csv, b.csv);
    }
    assert_eq!(first.inventory_csv(), second.inventory_csv());
}

#[test]
fn invariant_development_mode_hashes_differ_from_release() {
    let release = create_pipeline();
    let development = Pipeline::new(ContractLock::frozen().with_build_mode(BuildMode::Development)).unwrap();
    let entry = ManifestEntry::new("homepage", Category::Pages, valid_homepage_spec());

    let r = release.export_one(&entry).unwrap();
    let d = development.export_one(&entry).unwrap();

    assert_ne!(r.metadata.model_hash, d.metadata.model_hash);
    assert_ne!(r.metadata.export_hash, d.metadata.export_hash);
    assert!(d.content.contains("Generated At: "));
}

#[test]
fn invariant_hash_format_follows_contract() {
    let result = create_pipeline()
        .export_one(&ManifestEntry::new("homepage", Category::Pages, valid_homepage_spec()))
        .unwrap();

    for hash in [&result.metadata.model_hash, &result.metadata.export_hash] {
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}

#[test]
fn invariant_model_hash_ignores_legacy_identifiers() {
    // Same semantics, different legacy ids: normalization erases the difference.
    let a = json!({"sections": [{"section_id": "old_faq", "data-page-section": "faq"}]});
    let b = json!({"sections": [{"section_id": "section_9", "id": "x", "data-page-section": "faq"}]});
    let pipeline = create_pipeline();

    let ha = pipeline.export_one(&ManifestEntry::new("faq", Category::Pages, a)).unwrap();
    let hb = pipeline.export_one(&ManifestEntry::new("faq", Category::Pages, b)).unwrap();
    assert_eq!(ha.metadata.model_hash, hb.metadata.model_hash);
    assert_eq!(ha.metadata.export_hash, hb.metadata.export_hash);
}

#[test]
fn invariant_inconsistent_contract_halts_startup() {
    let mut lock = ContractLock::frozen();
    lock.allowed_actions.retain(|k| *k != ActionKind::ShowInformation);

    let result = Pipeline::new(lock);
    assert!(matches!(result, Err(PipelineError::Contract(_))));
}

#[test]
fn invariant_summary_counts_categories() {
    let outcome = create_pipeline().run_batch(&create_manifest());

    assert_eq!(outcome.summary.total_pages, 2);
    assert_eq!(outcome.summary.total_components, 1);
    assert_eq!(outcome.summary.total_exports, 3);

    let summary = serde_json::to_value(outcome.summary).unwrap();
    assert_eq!(
        summary,
        json!({
            "totalPages": 2,
            "totalComponents": 1,
            "totalExports": 3,
            "validExports": 2,
            "invalidExports": 1,
            "allValid": false
        })
    );
}

#[test]
fn invariant_inventory_rows_follow_manifest_order() {
    let outcome = create_pipeline().run_batch(&create_manifest());
    let inventory = outcome.inventory_csv();
    let rows: Vec<_> = inventory.lines().collect();

    assert_eq!(rows[0], "Page,Total Subsections,Validation Status,Model Hash,Export Hash");
    assert!(rows[1].starts_with("homepage,2,VALID,"));
    assert!(rows[2].starts_with("apartments-pricing,1,INVALID,"));
    assert!(rows[3].starts_with("nav-primary,1,VALID,"));

    let home = outcome.result("homepage").unwrap();
    assert_eq!(
        rows[1],
        format!("homepage,2,VALID,{},{}", home.metadata.model_hash, home.metadata.export_hash)
    );
}

#[test]
fn invariant_canonical_json_deterministic() {
    let obj1 = json!({"z": 1, "a": 2, "m": {"b": 1, "a": 2}});
    let obj2 = json!({"a": 2, "m": {"a": 2, "b": 1}, "z": 1});

    assert_eq!(canonical_json(&obj1).unwrap(), canonical_json(&obj2).unwrap());
}
