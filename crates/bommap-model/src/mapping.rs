use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ColumnName, ModelError};

/// One target-header slot in a confirmed mapping. `source` is `None` when the
/// target is left unmapped; unmapped source headers simply have no entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub target: ColumnName,
    pub source: Option<ColumnName>,
}

/// Ordered association of target schema headers to source file headers.
///
/// Entry order drives output column order. Each target appears at most once;
/// a single source header may feed several targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMapping {
    entries: Vec<MappingEntry>,
}

impl HeaderMapping {
    pub fn new(entries: Vec<MappingEntry>) -> Result<Self, ModelError> {
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if !seen.insert(entry.target.clone()) {
                return Err(ModelError::DuplicateMappingTarget(
                    entry.target.as_str().to_string(),
                ));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn source_for(&self, target: &ColumnName) -> Option<&ColumnName> {
        self.entries
            .iter()
            .find(|entry| &entry.target == target)
            .and_then(|entry| entry.source.as_ref())
    }

    pub fn targets(&self) -> impl Iterator<Item = &ColumnName> {
        self.entries.iter().map(|entry| &entry.target)
    }

    pub fn mapped_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.source.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
