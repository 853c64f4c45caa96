use serde::{Deserialize, Serialize};

use crate::{ColumnName, ModelError};

/// What kind of derived column a formula rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivedColumnType {
    Tag,
    Specification,
}

/// One ordered pattern inside a formula rule. Matches when the source cell
/// contains `search_text` as a substring under the rule's case sensitivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRule {
    pub search_text: String,
    pub output_value: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl SubRule {
    /// Sub-rules without both a pattern and an output are inert and skipped
    /// during evaluation rather than rejected, so a half-edited rule saved
    /// from the UI does not poison the whole rule list.
    pub fn is_effective(&self) -> bool {
        !self.search_text.is_empty() && !self.output_value.is_empty()
    }
}

/// Ordered derivation of a new column from an existing column's values.
/// Sub-rule order is user-significant: first match wins per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaRule {
    pub source_column: ColumnName,
    pub column_type: DerivedColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification_name: Option<String>,
    pub sub_rules: Vec<SubRule>,
}

impl FormulaRule {
    /// Specification rules must carry the name that labels the derived
    /// name/value column pair.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.column_type == DerivedColumnType::Specification
            && self
                .specification_name
                .as_deref()
                .is_none_or(|name| name.trim().is_empty())
        {
            return Err(ModelError::MissingSpecificationName(
                self.source_column.as_str().to_string(),
            ));
        }
        Ok(())
    }
}

pub const DEFAULT_FACTWISE_SEPARATOR: &str = "-";

/// Composite-identifier rule: ordered component headers joined by a
/// separator. Empty components render as empty segments so that segment
/// positions keep their meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactwiseIdRule {
    pub components: Vec<ColumnName>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    DEFAULT_FACTWISE_SEPARATOR.to_string()
}

impl FactwiseIdRule {
    pub fn new(components: Vec<ColumnName>) -> Self {
        Self {
            components,
            separator: default_separator(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}
