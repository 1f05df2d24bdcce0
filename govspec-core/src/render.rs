//! Serializer - Governed Spec Text and CSV Rows
//!
//! Pure functions of their inputs: the same tree, report, identifiers, lock
//! and stamp always render the same bytes. Output uses `\n` line endings.

use std::borrow::Cow;

use crate::contract::ContractLock;
use crate::hashing::VolatileStamp;
use crate::model::{Category, Node, NodePath, Section, SpecTree};
use crate::pipeline::ExportResult;
use crate::validation::{ValidationReport, ValidationViolation};

pub const DOCUMENT_TITLE: &str = "VENTERRA GOVERNED SPEC CONTRACT";
pub const EXPORT_CSV_HEADER: &str = "Page,Category,Section ID,Section Name,Semantic Key,Location,Element Path,Element Type,Element Label,Action,Target,Validation Status";
pub const INVENTORY_CSV_HEADER: &str = "Page,Total Subsections,Validation Status,Model Hash,Export Hash";

const RULE: &str = "================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------";

pub fn status_label(valid: bool) -> &'static str {
    if valid { "VALID" } else { "INVALID" }
}

/// Render the governed spec document for a normalized tree.
pub fn render_governed_spec(
    tree: &SpecTree,
    validation: &ValidationReport,
    page_id: &str,
    category: Category,
    lock: &ContractLock,
    stamp: Option<&VolatileStamp>,
) -> String {
    let mut lines = header(page_id, category, lock, stamp);

    for (idx, section) in tree.sections.iter().enumerate() {
        section_block(&mut lines, idx + 1, section);
    }

    lines.push(String::new());
    lines.push(RULE.to_string());
    lines.push("SUMMARY".to_string());
    lines.push(RULE.to_string());
    lines.push(format!("Total Subsections: {}", tree.sections.len()));
    lines.push(format!("Total Elements: {}", tree.node_count()));
    lines.push(format!("Total Actions: {}", tree.action_count()));
    lines.push(format!("Declared Contract Version: {}", validation.contract_version));
    lines.push(format!("Declared Schema Version: {}", validation.schema_version));
    status_block(&mut lines, validation.valid, &validation.violations);

    finish(lines)
}

/// Document for an input that could not be read as a spec tree.
pub fn render_rejection(
    page_id: &str,
    category: Category,
    lock: &ContractLock,
    stamp: Option<&VolatileStamp>,
    violation: &ValidationViolation,
) -> String {
    let mut lines = header(page_id, category, lock, stamp);

    lines.push(String::new());
    lines.push(RULE.to_string());
    lines.push("SUMMARY".to_string());
    lines.push(RULE.to_string());
    lines.push("Total Subsections: 0".to_string());
    status_block(&mut lines, false, std::slice::from_ref(violation));

    finish(lines)
}

fn header(
    page_id: &str,
    category: Category,
    lock: &ContractLock,
    stamp: Option<&VolatileStamp>,
) -> Vec<String> {
    let mut lines = vec![
        RULE.to_string(),
        DOCUMENT_TITLE.to_string(),
        RULE.to_string(),
        format!("Page ID: {page_id}"),
        format!("Category: {category}"),
        format!("Contract Lock: {}", lock.expected_contract_version),
        format!("Export Engine: {}", lock.export_engine_version),
        format!("Build Mode: {}", lock.build_mode),
    ];
    if let Some(stamp) = stamp {
        lines.push(format!("Generated At: {}", stamp.timestamp()));
        lines.push(format!("Export ID: {}", stamp.export_id));
    }
    lines
}

fn section_block(lines: &mut Vec<String>, position: usize, section: &Section) {
    lines.push(String::new());
    lines.push(THIN_RULE.to_string());
    lines.push(format!("SECTION {position:02}"));
    lines.push(THIN_RULE.to_string());
    lines.push(format!("Section ID: {}", or_dash(section.section_id.as_deref())));
    lines.push(format!("Name: {}", or_dash(section.name.as_deref())));
    lines.push(format!("Semantic Key: {}", or_dash(section.semantic_key.as_deref())));
    lines.push(format!("Location: {}", or_dash(section.location.as_deref())));

    if section.children.is_empty() {
        lines.push("Elements: none".to_string());
        return;
    }
    lines.push("Elements:".to_string());
    node_lines(lines, &section.children, &NodePath::default());
}

fn node_lines(lines: &mut Vec<String>, nodes: &[Node], parent: &NodePath) {
    for (idx, node) in nodes.iter().enumerate() {
        let path = parent.child(idx + 1);
        let indent = "  ".repeat(path.depth());
        lines.push(format!(
            "{indent}[{path}] type={} id={} label={} action={} target={}",
            or_dash(node.kind.as_deref()),
            or_dash(node.id.as_deref()),
            node.label.as_deref().map(|l| format!("{l:?}")).unwrap_or_else(|| "-".to_string()),
            or_dash(node.action.as_deref()),
            or_dash(node.target.as_deref()),
        ));
        node_lines(lines, &node.children, &path);
    }
}

fn status_block(lines: &mut Vec<String>, valid: bool, violations: &[ValidationViolation]) {
    lines.push(format!("Validation Status: {}", status_label(valid)));
    lines.push(format!("Violations: {}", violations.len()));
    for (i, violation) in violations.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, single_line(&violation.to_string())));
    }
    lines.push(RULE.to_string());
}

fn finish(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn or_dash(value: Option<&str>) -> Cow<'_, str> {
    match value {
        Some(v) if !v.is_empty() => single_line(v),
        _ => Cow::Borrowed("-"),
    }
}

fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r']) {
        Cow::Owned(value.replace('\r', "\\r").replace('\n', "\\n"))
    } else {
        Cow::Borrowed(value)
    }
}

/// Per-input CSV: one row per nested node.
///
/// A section without nodes still gets a row; a tree without sections gets a
/// single page-level row.
pub fn render_export_csv(
    tree: &SpecTree,
    validation: &ValidationReport,
    page_id: &str,
    category: Category,
) -> String {
    let status = status_label(validation.valid);
    let mut rows = vec![EXPORT_CSV_HEADER.to_string()];

    if tree.sections.is_empty() {
        rows.push(page_row(page_id, category, status));
    }

    for section in &tree.sections {
        let section_cells = [
            section.section_id.as_deref().unwrap_or_default(),
            section.name.as_deref().unwrap_or_default(),
            section.semantic_key.as_deref().unwrap_or_default(),
            section.location.as_deref().unwrap_or_default(),
        ];

        if section.children.is_empty() {
            rows.push(csv_row([
                page_id,
                category.as_str(),
                section_cells[0],
                section_cells[1],
                section_cells[2],
                section_cells[3],
                "", "", "", "", "",
                status,
            ]));
            continue;
        }

        let mut stack: Vec<(NodePath, &Node)> = Vec::new();
        push_children(&mut stack, &section.children, &NodePath::default());
        while let Some((path, node)) = stack.pop() {
            let path_text = path.to_string();
            rows.push(csv_row([
                page_id,
                category.as_str(),
                section_cells[0],
                section_cells[1],
                section_cells[2],
                section_cells[3],
                path_text.as_str(),
                node.kind.as_deref().unwrap_or_default(),
                node.label.as_deref().unwrap_or_default(),
                node.action.as_deref().unwrap_or_default(),
                node.target.as_deref().unwrap_or_default(),
                status,
            ]));
            push_children(&mut stack, &node.children, &path);
        }
    }

    finish(rows)
}

/// Per-input CSV for an input that could not be read as a spec tree.
pub fn render_rejection_csv(page_id: &str, category: Category) -> String {
    finish(vec![EXPORT_CSV_HEADER.to_string(), page_row(page_id, category, status_label(false))])
}

fn page_row(page_id: &str, category: Category, status: &str) -> String {
    csv_row([page_id, category.as_str(), "", "", "", "", "", "", "", "", "", status])
}

// Reversed so popping yields document order.
fn push_children<'a>(stack: &mut Vec<(NodePath, &'a Node)>, nodes: &'a [Node], parent: &NodePath) {
    for (idx, node) in nodes.iter().enumerate().rev() {
        stack.push((parent.child(idx + 1), node));
    }
}

/// Aggregate inventory across a batch, in result order.
pub fn render_inventory_csv(results: &[ExportResult]) -> String {
    let mut rows = vec![INVENTORY_CSV_HEADER.to_string()];
    for result in results {
        let subsections = result.metadata.total_subsections.to_string();
        rows.push(csv_row([
            result.page_id.as_str(),
            subsections.as_str(),
            status_label(result.valid),
            result.metadata.model_hash.as_str(),
            result.metadata.export_hash.as_str(),
        ]));
    }
    finish(rows)
}

fn csv_row<'a>(cells: impl IntoIterator<Item = &'a str>) -> String {
    cells.into_iter().map(csv_field).collect::<Vec<_>>().join(",")
}

/// RFC 4180 field: quoted only when it holds a quote, comma, CR or LF.
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains(['"', ',', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
