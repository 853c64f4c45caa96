use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    BlobRef, ColumnName, FactwiseIdRule, FormulaRule, HeaderMapping, ModelError, SessionId,
    TemplateId,
};

/// Workflow position of a session. Advances forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Uploaded,
    Mapped,
    Processed,
}

impl SessionStatus {
    /// A transition is legal when it does not regress. Staying in place is
    /// allowed: re-confirming a mapping on a `mapped` session is a normal
    /// edit, not a state violation.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        next >= self
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uploaded => "uploaded",
            Self::Mapped => "mapped",
            Self::Processed => "processed",
        };
        f.write_str(label)
    }
}

/// One upload-to-export workflow instance.
///
/// Owns its mapping and rules by value. Applying a template copies the
/// template's data in; later edits never reach back into the template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub source_file_ref: BlobRef,
    pub target_file_ref: BlobRef,
    pub source_file_name: String,
    pub target_file_name: String,
    pub source_sheet: Option<String>,
    /// 1-based header row index in the source sheet.
    pub source_header_row: u32,
    pub target_sheet: Option<String>,
    pub target_header_row: u32,
    #[serde(default)]
    pub mapping: Option<HeaderMapping>,
    #[serde(default)]
    pub formula_rules: Vec<FormulaRule>,
    #[serde(default)]
    pub factwise_rules: Vec<FactwiseIdRule>,
    #[serde(default)]
    pub default_values: BTreeMap<ColumnName, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_template_id: Option<TemplateId>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Expiry is a hard external deadline: an expired session must be
    /// treated as not found by every read path, whatever its status.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn advance_status(&mut self, next: SessionStatus) -> Result<(), ModelError> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Replaces any previous factwise rule; the generator is idempotent so
    /// only the latest rule is meaningful.
    pub fn set_factwise_rule(&mut self, rule: FactwiseIdRule) {
        self.factwise_rules.clear();
        self.factwise_rules.push(rule);
    }

    pub fn factwise_rule(&self) -> Option<&FactwiseIdRule> {
        self.factwise_rules.last()
    }
}
