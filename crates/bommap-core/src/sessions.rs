//! Session lifecycle over the record store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;

use bommap_model::{
    BlobRef, ColumnName, FactwiseIdRule, FormulaRule, HeaderMapping, Session, SessionId,
    SessionStatus,
};
use bommap_store::{Clock, RecordStore, StoreError, StoredRecord};

use crate::error::{EngineError, Entity, Result, ValidationError};

pub(crate) const SESSIONS_TABLE: &str = "sessions";

/// Default session lifetime. Sessions are short-lived working state, not an
/// archive; templates are the durable artifact.
const SESSION_TTL_HOURS: i64 = 24;

/// Inputs for creating a session at upload time.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub source_file_ref: BlobRef,
    pub target_file_ref: BlobRef,
    pub source_file_name: String,
    pub target_file_name: String,
    pub source_sheet: Option<String>,
    pub source_header_row: u32,
    pub target_sheet: Option<String>,
    pub target_header_row: u32,
}

/// Owns per-session persistence and the forward-only status machine.
///
/// All writes are full-record overwrites with last-writer-wins semantics;
/// callers needing stronger guarantees must layer their own optimistic
/// checks. Every read re-checks `expires_at` against the injected clock, so
/// an expired session is indistinguishable from a deleted one.
pub struct SessionManager {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(records: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            clock,
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn create(&self, new: NewSession) -> Result<Session> {
        let now = self.clock.now();
        let session = Session {
            session_id: SessionId::generate(),
            source_file_ref: new.source_file_ref,
            target_file_ref: new.target_file_ref,
            source_file_name: new.source_file_name,
            target_file_name: new.target_file_name,
            source_sheet: new.source_sheet,
            source_header_row: new.source_header_row,
            target_sheet: new.target_sheet,
            target_header_row: new.target_header_row,
            mapping: None,
            formula_rules: Vec::new(),
            factwise_rules: Vec::new(),
            default_values: BTreeMap::new(),
            applied_template_id: None,
            status: SessionStatus::Uploaded,
            created_at: now,
            updated_at: now,
            expires_at: now + self.ttl,
        };
        self.persist(&session)?;
        tracing::info!(session_id = %session.session_id, "created session");
        Ok(session)
    }

    /// Loads a session, treating expiry as absence.
    pub fn get(&self, session_id: &SessionId) -> Result<Session> {
        let record = self
            .records
            .get(SESSIONS_TABLE, session_id.as_str())?
            .ok_or_else(|| EngineError::not_found(Entity::Session, session_id))?;

        let session: Session = deserialize(SESSIONS_TABLE, session_id.as_str(), &record)?;
        if session.is_expired(self.clock.now()) {
            return Err(EngineError::not_found(Entity::Session, session_id));
        }
        Ok(session)
    }

    /// Confirms the mapping and advances the session to `mapped`.
    ///
    /// The mapping's internal invariants (unique targets) are enforced by
    /// [`HeaderMapping`] itself; source-column existence is the transform
    /// service's concern since it requires the uploaded file.
    pub fn confirm_mapping(
        &self,
        session_id: &SessionId,
        mapping: HeaderMapping,
    ) -> Result<Session> {
        let mut session = self.get(session_id)?;
        self.advance(&mut session, SessionStatus::Mapped)?;
        session.mapping = Some(mapping);
        self.touch_and_persist(&mut session)?;
        tracing::info!(session_id = %session_id, "confirmed mapping");
        Ok(session)
    }

    /// Replaces the session's formula rules after validating each one.
    /// Rule and sub-rule order is preserved exactly as given.
    pub fn set_formula_rules(
        &self,
        session_id: &SessionId,
        rules: Vec<FormulaRule>,
    ) -> Result<Session> {
        for rule in &rules {
            rule.validate().map_err(ValidationError::Model)?;
        }
        let mut session = self.get(session_id)?;
        session.formula_rules = rules;
        self.touch_and_persist(&mut session)?;
        Ok(session)
    }

    pub fn set_factwise_rule(
        &self,
        session_id: &SessionId,
        rule: FactwiseIdRule,
    ) -> Result<Session> {
        let mut session = self.get(session_id)?;
        session.set_factwise_rule(rule);
        self.touch_and_persist(&mut session)?;
        Ok(session)
    }

    pub fn set_default_values(
        &self,
        session_id: &SessionId,
        defaults: BTreeMap<ColumnName, String>,
    ) -> Result<Session> {
        let mut session = self.get(session_id)?;
        session.default_values = defaults;
        self.touch_and_persist(&mut session)?;
        Ok(session)
    }

    pub fn mark_processed(&self, session_id: &SessionId) -> Result<Session> {
        let mut session = self.get(session_id)?;
        self.advance(&mut session, SessionStatus::Processed)?;
        self.touch_and_persist(&mut session)?;
        Ok(session)
    }

    /// Full-record overwrite of an already-loaded session.
    pub fn update(&self, mut session: Session) -> Result<Session> {
        self.touch_and_persist(&mut session)?;
        Ok(session)
    }

    pub fn delete(&self, session_id: &SessionId) -> Result<bool> {
        let removed = self.records.delete(SESSIONS_TABLE, session_id.as_str())?;
        if removed {
            tracing::info!(session_id = %session_id, "deleted session");
        }
        Ok(removed)
    }

    fn advance(&self, session: &mut Session, next: SessionStatus) -> Result<()> {
        session.advance_status(next).map_err(|error| EngineError::State {
            entity: Entity::Session,
            id: session.session_id.as_str().to_string(),
            detail: error.to_string(),
        })
    }

    fn touch_and_persist(&self, session: &mut Session) -> Result<()> {
        session.updated_at = self.clock.now();
        self.persist(session)
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let record = serialize(SESSIONS_TABLE, session.session_id.as_str(), session)?
            .with_expiry(session.expires_at);
        self.records
            .put(SESSIONS_TABLE, session.session_id.as_str(), record)?;
        Ok(())
    }
}

pub(crate) fn serialize<T: serde::Serialize>(
    table: &str,
    key: &str,
    value: &T,
) -> Result<StoredRecord> {
    let body = serde_json::to_value(value).map_err(|source| StoreError::Serialization {
        operation: "serialize",
        table: table.to_string(),
        key: key.to_string(),
        source,
    })?;
    Ok(StoredRecord::new(body))
}

pub(crate) fn deserialize<T: serde::de::DeserializeOwned>(
    table: &str,
    key: &str,
    record: &StoredRecord,
) -> Result<T> {
    let value = serde_json::from_value(record.body.clone()).map_err(|source| {
        StoreError::Serialization {
            operation: "deserialize",
            table: table.to_string(),
            key: key.to_string(),
            source,
        }
    })?;
    Ok(value)
}
