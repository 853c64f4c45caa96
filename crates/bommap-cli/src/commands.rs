use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use tracing::info;

use bommap_core::{MappingService, PreviewPage, UploadRequest};
use bommap_ingest::{ReadOptions, SourceFormat, extract_headers, read_sample_data};
use bommap_map::MappingEngine;
use bommap_model::{
    ColumnName, DerivedColumnType, FactwiseIdRule, FormulaRule, JobStatus, Session, TemplateDraft,
};
use bommap_store::{
    BlobStore, Clock, FsBlobStore, MemoryBlobStore, MemoryRecordStore, SystemClock,
};
use bommap_transform::EvaluationMode;

use crate::cli::{
    ExportArgs, HeadersArgs, MapArgs, RuleArgs, TemplatesArgs, TransformArgs, WorkflowArgs,
};

pub fn run_headers(args: &HeadersArgs) -> Result<()> {
    let bytes = read_bytes(&args.file)?;
    let format = SourceFormat::from_name(&file_name(&args.file)?)?;
    let options = ReadOptions {
        sheet: args.sheet.clone(),
        header_row: args.header_row,
    };
    let headers = extract_headers(&bytes, format, &options)?;

    let mut table = Table::new();
    table.set_header(vec![header_cell("#"), header_cell("Header")]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for (idx, header) in headers.iter().enumerate() {
        table.add_row(vec![Cell::new(idx + 1), Cell::new(header.as_str())]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_map(args: &MapArgs) -> Result<()> {
    let workflow = &args.workflow;
    let source_bytes = read_bytes(&workflow.source)?;
    let source_format = SourceFormat::from_name(&file_name(&workflow.source)?)?;
    let source_options = ReadOptions {
        sheet: workflow.source_sheet.clone(),
        header_row: workflow.source_header_row,
    };
    let source_headers = extract_headers(&source_bytes, source_format, &source_options)?;

    let target_bytes = read_bytes(&workflow.target)?;
    let target_format = SourceFormat::from_name(&file_name(&workflow.target)?)?;
    let target_headers = extract_headers(
        &target_bytes,
        target_format,
        &ReadOptions {
            sheet: workflow.target_sheet.clone(),
            header_row: workflow.target_header_row,
        },
    )?;

    let mut engine = MappingEngine::new(args.threshold);
    if let Some(path) = &workflow.template {
        let draft = load_template(path)?;
        engine = engine.with_synonyms(&draft_synonyms(&draft));
    }
    let proposal = engine.propose(&source_headers, &target_headers);
    let samples = read_sample_data(&source_bytes, source_format, &source_options, args.samples)?;

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Target"),
        header_cell("Source"),
        header_cell("Score"),
        header_cell("Sample values"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for entry in &proposal.proposals {
        let (source_cell, score_cell, sample_cell) = match &entry.source {
            Some(source) => (
                Cell::new(source.as_str()),
                Cell::new(format!("{:.2}", entry.score)),
                Cell::new(
                    samples
                        .get(source)
                        .map(|values| values.join(", "))
                        .unwrap_or_default(),
                ),
            ),
            None => (dim_cell("-"), dim_cell("-"), dim_cell("")),
        };
        table.add_row(vec![
            Cell::new(entry.target.as_str()),
            source_cell,
            score_cell,
            sample_cell,
        ]);
    }
    println!("{table}");

    if !proposal.unmapped_sources.is_empty() {
        let names: Vec<&str> = proposal
            .unmapped_sources
            .iter()
            .map(ColumnName::as_str)
            .collect();
        println!("Unmapped source columns: {}", names.join(", "));
    }
    info!(
        mapped = proposal.mapped_count(),
        targets = proposal.proposals.len(),
        "proposed mapping"
    );
    Ok(())
}

pub fn run_transform(args: &TransformArgs) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new(Arc::clone(&clock)));
    let service = MappingService::new(blobs, Arc::new(MemoryRecordStore::new()), clock);

    let session = open_session(&service, &args.workflow)?;
    let session = configure_session(&service, session, &args.rules)?;
    if args.rules.strict {
        service.apply_rules(&session.session_id, EvaluationMode::Strict)?;
    }

    let page = service.preview(&session.session_id, args.page, args.page_size)?;
    print_preview(&page);
    Ok(())
}

pub fn run_export(args: &ExportArgs) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let blobs = Arc::new(FsBlobStore::new(&args.output_dir, Arc::clone(&clock))?);
    let service = MappingService::new(
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        Arc::new(MemoryRecordStore::new()),
        clock,
    );

    let session = open_session(&service, &args.workflow)?;
    let session = configure_session(&service, session, &args.rules)?;
    if args.rules.strict {
        service.apply_rules(&session.session_id, EvaluationMode::Strict)?;
    }

    let job = service.create_job(&session.session_id)?;
    let job = service.run_export_job(&job.job_id)?;
    match job.status {
        JobStatus::Completed => {
            let result = job.result.context("completed job carries no result")?;
            let locator = blobs.retrieval_locator(&result, chrono::Duration::hours(1))?;
            println!("Exported {result}");
            println!("Download: {} (valid until {})", locator.url, locator.expires_at);
            Ok(())
        }
        JobStatus::Failed => bail!(
            "export job failed: {}",
            job.error_message
                .unwrap_or_else(|| "unknown error".to_string())
        ),
        status => bail!("export job ended in unexpected status {status}"),
    }
}

pub fn run_templates(args: &TemplatesArgs) -> Result<()> {
    let draft = load_template(&args.file)?;

    println!("Name: {}", draft.name);
    if let Some(description) = &draft.description {
        println!("Description: {description}");
    }
    if let Some(category) = &draft.category {
        println!("Category: {category}");
    }
    if let Some(created_by) = &draft.created_by {
        println!("Created by: {created_by}");
    }
    println!("Public: {}", if draft.is_public { "yes" } else { "no" });
    if !draft.tags.is_empty() {
        println!("Tags: {}", draft.tags.join(", "));
    }

    let mut mapping_table = Table::new();
    mapping_table.set_header(vec![header_cell("Target"), header_cell("Source")]);
    apply_table_style(&mut mapping_table);
    for entry in draft.mapping.entries() {
        let source_cell = match &entry.source {
            Some(source) => Cell::new(source.as_str()),
            None => dim_cell("-"),
        };
        mapping_table.add_row(vec![Cell::new(entry.target.as_str()), source_cell]);
    }
    println!("{mapping_table}");

    if !draft.formula_rules.is_empty() {
        let mut rules_table = Table::new();
        rules_table.set_header(vec![
            header_cell("#"),
            header_cell("Source column"),
            header_cell("Derives"),
            header_cell("Sub-rules"),
        ]);
        apply_table_style(&mut rules_table);
        align_column(&mut rules_table, 0, CellAlignment::Right);
        for (idx, rule) in draft.formula_rules.iter().enumerate() {
            let derives = match rule.column_type {
                DerivedColumnType::Tag => "Tag".to_string(),
                DerivedColumnType::Specification => format!(
                    "Specification ({})",
                    rule.specification_name.as_deref().unwrap_or("?")
                ),
            };
            let sub_rules: Vec<String> = rule
                .sub_rules
                .iter()
                .map(|sub| {
                    format!(
                        "{:?} => {:?}{}",
                        sub.search_text,
                        sub.output_value,
                        if sub.case_sensitive { " (case)" } else { "" }
                    )
                })
                .collect();
            rules_table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(rule.source_column.as_str()),
                Cell::new(derives),
                Cell::new(sub_rules.join("; ")),
            ]);
        }
        println!("{rules_table}");
    }

    for rule in &draft.factwise_rules {
        let components: Vec<&str> = rule.components.iter().map(ColumnName::as_str).collect();
        println!("Factwise ID: {}", components.join(&rule.separator));
    }
    for (target, value) in &draft.default_values {
        println!("Default {target}: {value}");
    }
    Ok(())
}

/// Uploads the file pair, applies the optional template and confirms a
/// mapping: the template's re-matched one when present, otherwise the
/// fuzzy proposal.
fn open_session(service: &MappingService, workflow: &WorkflowArgs) -> Result<Session> {
    let template_id = match &workflow.template {
        Some(path) => {
            let draft = load_template(path)?;
            Some(service.save_template(draft)?.id)
        }
        None => None,
    };
    let request = UploadRequest {
        source_file_name: file_name(&workflow.source)?,
        source_bytes: read_bytes(&workflow.source)?,
        target_file_name: file_name(&workflow.target)?,
        target_bytes: read_bytes(&workflow.target)?,
        source_sheet: workflow.source_sheet.clone(),
        source_header_row: workflow.source_header_row,
        target_sheet: workflow.target_sheet.clone(),
        target_header_row: workflow.target_header_row,
        template_id,
    };
    let session = service.upload(request)?;

    let mapping = match &session.mapping {
        Some(mapping) => mapping.clone(),
        None => service
            .propose_mapping(&session.session_id, None)?
            .into_mapping()?,
    };
    Ok(service.confirm_mapping(&session.session_id, mapping)?)
}

fn configure_session(
    service: &MappingService,
    mut session: Session,
    rules: &RuleArgs,
) -> Result<Session> {
    let id = session.session_id.clone();
    if let Some(path) = &rules.rules {
        session = service.set_formula_rules(&id, load_rules(path)?)?;
    }
    if let Some(path) = &rules.defaults {
        session = service.set_default_values(&id, load_defaults(path)?)?;
    }
    if let Some(columns) = &rules.factwise {
        session = service.set_factwise_rule(&id, parse_factwise(columns, &rules.separator)?)?;
    }
    Ok(session)
}

fn print_preview(page: &PreviewPage) {
    let mut table = Table::new();
    table.set_header(
        page.headers
            .iter()
            .map(|header| header_cell(header.as_str()))
            .collect::<Vec<_>>(),
    );
    apply_table_style(&mut table);
    for row in &page.rows {
        table.add_row(
            page.headers
                .iter()
                .map(|header| Cell::new(row.text(header).unwrap_or_default()))
                .collect::<Vec<_>>(),
        );
    }
    println!("{table}");
    println!(
        "Page {} of {} ({} rows total)",
        page.page,
        page.total_pages.max(1),
        page.total_rows
    );
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("read {}", path.display()))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))
}

fn load_rules(path: &Path) -> Result<Vec<FormulaRule>> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parse formula rules from {}", path.display()))
}

fn load_defaults(path: &Path) -> Result<BTreeMap<ColumnName, String>> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parse default values from {}", path.display()))
}

fn load_template(path: &Path) -> Result<TemplateDraft> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parse template bundle from {}", path.display()))
}

/// Per-target synonyms of a not-yet-saved bundle: the source spelling each
/// target was mapped to.
fn draft_synonyms(draft: &TemplateDraft) -> BTreeMap<ColumnName, Vec<String>> {
    let mut synonyms: BTreeMap<ColumnName, Vec<String>> = BTreeMap::new();
    for entry in draft.mapping.entries() {
        if let Some(source) = &entry.source {
            synonyms
                .entry(entry.target.clone())
                .or_default()
                .push(source.as_str().to_string());
        }
    }
    synonyms
}

fn parse_factwise(columns: &str, separator: &str) -> Result<FactwiseIdRule> {
    let mut components = Vec::new();
    for part in columns.split(',') {
        let trimmed = part.trim();
        if !trimmed.is_empty() {
            components.push(ColumnName::new(trimmed)?);
        }
    }
    if components.is_empty() {
        bail!("--factwise needs at least one column name");
    }
    Ok(FactwiseIdRule::new(components).with_separator(separator))
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell(label: &str) -> Cell {
    Cell::new(label).fg(Color::DarkGrey)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}
