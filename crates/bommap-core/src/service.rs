//! The workflow service.
//!
//! One facade over the managers and stores, exposing the operations the
//! excluded HTTP layer calls: upload, header extraction, mapping proposal
//! and confirmation, rule management, preview, export and jobs. Stateless
//! per invocation; everything durable goes through the injected stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;

use bommap_ingest::{ReadOptions, SourceFormat, extract_headers, read_table};
use bommap_map::{MappingEngine, MappingProposal};
use bommap_model::{
    BlobRef, ColumnName, FactwiseIdRule, FormulaRule, HeaderMapping, JobId, ProcessingJob, Row,
    Session, SessionId, Table, TagTemplateDraft, Template, TemplateDraft, TemplateFilter,
    TemplateId,
};
use bommap_store::{BlobStore, Clock, RecordStore, RetrievalLocator};
use bommap_transform::{
    EvaluationMode, apply_default_values, apply_formula_rules, apply_mapping,
    generate_factwise_id,
};

use crate::error::{EngineError, Entity, Result, ValidationError};
use crate::jobs::JobManager;
use crate::sessions::{NewSession, SessionManager};
use crate::templates::TemplateStore;

const UPLOADS_PREFIX: &str = "uploads";
const PROCESSED_PREFIX: &str = "processed";

/// How long an export download locator stays valid.
const EXPORT_LOCATOR_TTL_SECS: i64 = 3600;

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Inputs for the upload operation.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source_file_name: String,
    pub source_bytes: Vec<u8>,
    pub target_file_name: String,
    pub target_bytes: Vec<u8>,
    pub source_sheet: Option<String>,
    pub source_header_row: u32,
    pub target_sheet: Option<String>,
    pub target_header_row: u32,
    /// Apply this template immediately after creating the session.
    pub template_id: Option<TemplateId>,
}

/// One page of the transformed table.
#[derive(Debug, Clone)]
pub struct PreviewPage {
    pub headers: Vec<ColumnName>,
    pub rows: Vec<Row>,
    pub page: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub total_pages: usize,
}

/// Result of a successful export.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub blob_ref: BlobRef,
    pub locator: RetrievalLocator,
    pub file_name: String,
    pub rows: usize,
}

pub struct MappingService {
    blobs: Arc<dyn BlobStore>,
    sessions: SessionManager,
    jobs: JobManager,
    templates: TemplateStore,
}

impl MappingService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            blobs,
            sessions: SessionManager::new(Arc::clone(&records), Arc::clone(&clock)),
            jobs: JobManager::new(Arc::clone(&records), Arc::clone(&clock)),
            templates: TemplateStore::new(records, clock),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Stores both files and opens a session in `uploaded`. Formats are
    /// validated up front so a bad extension fails the upload, not a later
    /// read. With `template_id` set, the template is applied immediately
    /// against the file's actual headers.
    pub fn upload(&self, request: UploadRequest) -> Result<Session> {
        let source_format =
            SourceFormat::from_name(&request.source_file_name).map_err(ValidationError::Ingest)?;
        SourceFormat::from_name(&request.target_file_name).map_err(ValidationError::Ingest)?;

        let source_ref = upload_ref("source", &request.source_file_name)?;
        let target_ref = upload_ref("target", &request.target_file_name)?;
        self.blobs.put(&source_ref, &request.source_bytes)?;
        self.blobs.put(&target_ref, &request.target_bytes)?;

        let mut session = self.sessions.create(NewSession {
            source_file_ref: source_ref,
            target_file_ref: target_ref,
            source_file_name: request.source_file_name,
            target_file_name: request.target_file_name,
            source_sheet: request.source_sheet,
            source_header_row: request.source_header_row,
            target_sheet: request.target_sheet,
            target_header_row: request.target_header_row,
        })?;

        if let Some(template_id) = &request.template_id {
            let headers = extract_headers(
                &request.source_bytes,
                source_format,
                &ReadOptions {
                    sheet: session.source_sheet.clone(),
                    header_row: session.source_header_row,
                },
            )
            .map_err(ValidationError::Ingest)?;
            self.templates
                .apply_to(template_id, &mut session, Some(&headers))?;
            session = self.sessions.update(session)?;
        }

        Ok(session)
    }

    /// Source and target header lists for a session.
    pub fn headers(&self, session_id: &SessionId) -> Result<(Vec<ColumnName>, Vec<ColumnName>)> {
        let session = self.sessions.get(session_id)?;
        Ok((
            self.source_headers(&session)?,
            self.target_headers(&session)?,
        ))
    }

    /// Proposes a mapping for the session's headers, optionally seeded with
    /// a template's synonym vocabulary.
    pub fn propose_mapping(
        &self,
        session_id: &SessionId,
        template_id: Option<&TemplateId>,
    ) -> Result<MappingProposal> {
        let session = self.sessions.get(session_id)?;
        let source_headers = self.source_headers(&session)?;
        let target_headers = self.target_headers(&session)?;

        let mut engine = MappingEngine::default();
        if let Some(template_id) = template_id {
            let template = self.templates.get(template_id)?;
            engine = engine.with_synonyms(&template.synonyms());
        }
        Ok(engine.propose(&source_headers, &target_headers))
    }

    /// Confirms a mapping after checking every mapped source column exists
    /// in the uploaded file, then advances the session to `mapped`.
    pub fn confirm_mapping(
        &self,
        session_id: &SessionId,
        mapping: HeaderMapping,
    ) -> Result<Session> {
        let session = self.sessions.get(session_id)?;
        let source_headers = self.source_headers(&session)?;
        for entry in mapping.entries() {
            if let Some(source) = &entry.source
                && !source_headers.contains(source)
            {
                return Err(ValidationError::UnknownSourceColumn {
                    column: source.as_str().to_string(),
                }
                .into());
            }
        }
        self.sessions.confirm_mapping(session_id, mapping)
    }

    pub fn set_formula_rules(
        &self,
        session_id: &SessionId,
        rules: Vec<FormulaRule>,
    ) -> Result<Session> {
        self.sessions.set_formula_rules(session_id, rules)
    }

    pub fn set_factwise_rule(
        &self,
        session_id: &SessionId,
        rule: FactwiseIdRule,
    ) -> Result<Session> {
        self.sessions.set_factwise_rule(session_id, rule)
    }

    pub fn set_default_values(
        &self,
        session_id: &SessionId,
        defaults: BTreeMap<ColumnName, String>,
    ) -> Result<Session> {
        self.sessions.set_default_values(session_id, defaults)
    }

    /// Runs the session's full transformation and returns the table.
    ///
    /// `Strict` mode surfaces formula rules that reference columns missing
    /// from the mapped output; the default `Lenient` mode treats them as
    /// not applicable.
    pub fn apply_rules(&self, session_id: &SessionId, mode: EvaluationMode) -> Result<Table> {
        let session = self.sessions.get(session_id)?;
        self.transformed(&session, mode)
    }

    /// One page of the transformed table. Pages are 1-based.
    pub fn preview(
        &self,
        session_id: &SessionId,
        page: usize,
        page_size: usize,
    ) -> Result<PreviewPage> {
        let session = self.sessions.get(session_id)?;
        let table = self.transformed(&session, EvaluationMode::Lenient)?;

        let page = page.max(1);
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        let total_rows = table.row_count();
        let total_pages = total_rows.div_ceil(page_size);
        let start = (page - 1) * page_size;
        let rows = table
            .rows
            .iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();

        Ok(PreviewPage {
            headers: table.headers,
            rows,
            page,
            page_size,
            total_rows,
            total_pages,
        })
    }

    /// Transforms, writes the CSV result to the blob store and marks the
    /// session `processed`. Returns a time-limited download locator.
    pub fn export(&self, session_id: &SessionId) -> Result<ExportOutcome> {
        let session = self.sessions.get(session_id)?;
        let table = self.transformed(&session, EvaluationMode::Lenient)?;
        let bytes = write_csv(&table, session_id)?;

        let file_name = format!("processed_data_{session_id}.csv");
        let blob_ref = BlobRef::new(format!("{PROCESSED_PREFIX}/{session_id}/{file_name}"))
            .map_err(ValidationError::Model)?;
        self.blobs.put(&blob_ref, &bytes)?;
        let locator = self
            .blobs
            .retrieval_locator(&blob_ref, Duration::seconds(EXPORT_LOCATOR_TTL_SECS))?;
        self.sessions.mark_processed(session_id)?;

        tracing::info!(session_id = %session_id, rows = table.row_count(), "exported session");
        Ok(ExportOutcome {
            blob_ref,
            locator,
            file_name,
            rows: table.row_count(),
        })
    }

    /// Queues an export job for a session in `mapped` or later. Returns
    /// immediately; a worker drives the job through `run_export_job`.
    pub fn create_job(&self, session_id: &SessionId) -> Result<ProcessingJob> {
        let session = self.sessions.get(session_id)?;
        self.jobs.create(&session)
    }

    pub fn get_job(&self, job_id: &JobId) -> Result<ProcessingJob> {
        self.jobs.get(job_id)
    }

    /// Worker entry point: picks up a queued job and drives it to a
    /// terminal state. Transform and export failures land in the job's
    /// `error_message` and leave the session untouched; only store failures
    /// while updating the job itself propagate as errors.
    pub fn run_export_job(&self, job_id: &JobId) -> Result<ProcessingJob> {
        let job = self.jobs.start(job_id)?;
        let session_id = job.session_id.clone();
        self.jobs.record_progress(job_id, 10)?;

        match self.export(&session_id) {
            Ok(outcome) => {
                self.jobs.record_progress(job_id, 90)?;
                self.jobs.complete(job_id, outcome.blob_ref)
            }
            Err(error) => {
                tracing::warn!(job_id = %job_id, error = %error, "export job failed");
                self.jobs.fail(job_id, error.to_string())
            }
        }
    }

    pub fn save_template(&self, draft: TemplateDraft) -> Result<Template> {
        self.templates.create(draft)
    }

    pub fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>> {
        self.templates.list(filter)
    }

    /// Applies a template to an existing session, re-matching its stored
    /// source headers against the uploaded file's actual headers.
    pub fn apply_template(
        &self,
        session_id: &SessionId,
        template_id: &TemplateId,
    ) -> Result<Session> {
        let mut session = self.sessions.get(session_id)?;
        let headers = self.source_headers(&session)?;
        self.templates
            .apply_to(template_id, &mut session, Some(&headers))?;
        self.sessions.update(session)
    }

    pub fn save_tag_template(&self, draft: TagTemplateDraft) -> Result<bommap_model::TagTemplate> {
        self.templates.create_tag_template(draft)
    }

    pub fn apply_tag_template(
        &self,
        session_id: &SessionId,
        template_id: &TemplateId,
    ) -> Result<Session> {
        let mut session = self.sessions.get(session_id)?;
        self.templates
            .apply_tag_template_to(template_id, &mut session)?;
        self.sessions.update(session)
    }

    /// Removes the session record and its uploaded blobs. Processed
    /// exports stay behind their own TTL'd locators.
    pub fn delete_session(&self, session_id: &SessionId) -> Result<bool> {
        match self.sessions.get(session_id) {
            Ok(session) => {
                self.blobs.delete(&session.source_file_ref)?;
                self.blobs.delete(&session.target_file_ref)?;
            }
            Err(EngineError::NotFound { .. }) => {}
            Err(error) => return Err(error),
        }
        self.sessions.delete(session_id)
    }

    fn source_headers(&self, session: &Session) -> Result<Vec<ColumnName>> {
        let bytes = self.blob_bytes(&session.source_file_ref)?;
        let format =
            SourceFormat::from_name(&session.source_file_name).map_err(ValidationError::Ingest)?;
        let headers = extract_headers(
            &bytes,
            format,
            &ReadOptions {
                sheet: session.source_sheet.clone(),
                header_row: session.source_header_row,
            },
        )
        .map_err(ValidationError::Ingest)?;
        Ok(headers)
    }

    fn target_headers(&self, session: &Session) -> Result<Vec<ColumnName>> {
        let bytes = self.blob_bytes(&session.target_file_ref)?;
        let format =
            SourceFormat::from_name(&session.target_file_name).map_err(ValidationError::Ingest)?;
        let headers = extract_headers(
            &bytes,
            format,
            &ReadOptions {
                sheet: session.target_sheet.clone(),
                header_row: session.target_header_row,
            },
        )
        .map_err(ValidationError::Ingest)?;
        Ok(headers)
    }

    /// Mapping application, formula rules, defaults, factwise id, in that
    /// order.
    fn transformed(&self, session: &Session, mode: EvaluationMode) -> Result<Table> {
        let mapping = session.mapping.as_ref().ok_or_else(|| {
            ValidationError::MappingNotConfirmed(session.session_id.as_str().to_string())
        })?;

        let bytes = self.blob_bytes(&session.source_file_ref)?;
        let format =
            SourceFormat::from_name(&session.source_file_name).map_err(ValidationError::Ingest)?;
        let source_table = read_table(
            &bytes,
            format,
            &ReadOptions {
                sheet: session.source_sheet.clone(),
                header_row: session.source_header_row,
            },
        )
        .map_err(ValidationError::Ingest)?;

        let mut table = apply_mapping(&source_table, mapping);
        apply_formula_rules(&mut table, &session.formula_rules, mode)
            .map_err(ValidationError::Transform)?;
        apply_default_values(&mut table, &session.default_values);
        if let Some(rule) = session.factwise_rule() {
            generate_factwise_id(&mut table, rule).map_err(ValidationError::Transform)?;
        }
        Ok(table)
    }

    fn blob_bytes(&self, blob_ref: &BlobRef) -> Result<Vec<u8>> {
        self.blobs
            .get(blob_ref)?
            .ok_or_else(|| EngineError::not_found(Entity::Blob, blob_ref))
    }
}

fn upload_ref(kind: &str, file_name: &str) -> Result<BlobRef> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let key = format!(
        "{UPLOADS_PREFIX}/{}_{kind}.{extension}",
        uuid::Uuid::new_v4()
    );
    BlobRef::new(key)
        .map_err(ValidationError::Model)
        .map_err(EngineError::from)
}

fn write_csv(table: &Table, session_id: &SessionId) -> Result<Vec<u8>> {
    let export_error = |source: Box<dyn std::error::Error + Send + Sync>| EngineError::Export {
        id: session_id.as_str().to_string(),
        source,
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.headers.iter().map(ColumnName::as_str))
        .map_err(|error| export_error(Box::new(error)))?;
    for row in &table.rows {
        writer
            .write_record(
                table
                    .headers
                    .iter()
                    .map(|header| row.text(header).unwrap_or_default()),
            )
            .map_err(|error| export_error(Box::new(error)))?;
    }
    writer
        .into_inner()
        .map_err(|error| export_error(Box::new(error)))
}
