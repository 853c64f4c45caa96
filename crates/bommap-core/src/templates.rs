//! Template persistence and application.
//!
//! Templates are written all-or-nothing as single records: a partial bundle
//! would poison later synonym lookups, so there is no multi-step write to
//! half-complete. Applying a template copies its data into the session by
//! value and bumps `usage_count` through the record store's atomic add.

use std::sync::Arc;

use bommap_map::score_headers;
use bommap_model::{
    ColumnName, HeaderMapping, MappingEntry, Session, TagTemplate, TagTemplateDraft, Template,
    TemplateDraft, TemplateFilter, TemplateId,
};
use bommap_store::{Clock, RecordStore, StoreError};

use crate::error::{EngineError, Entity, Result, ValidationError};
use crate::sessions::{deserialize, serialize};

pub(crate) const TEMPLATES_TABLE: &str = "templates";
pub(crate) const TAG_TEMPLATES_TABLE: &str = "tag_templates";
const USAGE_COUNT_FIELD: &str = "usage_count";

/// Bounded retries for the usage-count increment before surfacing the
/// conflict to the caller.
const MAX_INCREMENT_ATTEMPTS: u32 = 5;

/// A template's stored source header must clear this score to re-attach to
/// a drifted session header.
const REMATCH_THRESHOLD: f64 = 0.7;

/// CRUD plus usage bookkeeping for templates and tag templates.
pub struct TemplateStore {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl TemplateStore {
    pub fn new(records: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }

    /// Persists a full template bundle in a single write.
    pub fn create(&self, draft: TemplateDraft) -> Result<Template> {
        for rule in &draft.formula_rules {
            rule.validate().map_err(ValidationError::Model)?;
        }
        let template = Template {
            id: TemplateId::generate(),
            name: draft.name,
            description: draft.description,
            created_by: draft.created_by,
            created_at: self.clock.now(),
            usage_count: 0,
            category: draft.category,
            tags: draft.tags,
            is_public: draft.is_public,
            mapping: draft.mapping,
            formula_rules: draft.formula_rules,
            factwise_rules: draft.factwise_rules,
            default_values: draft.default_values,
        };
        let record = serialize(TEMPLATES_TABLE, template.id.as_str(), &template)?;
        self.records
            .put(TEMPLATES_TABLE, template.id.as_str(), record)?;
        tracing::info!(template_id = %template.id, name = %template.name, "created template");
        Ok(template)
    }

    pub fn get(&self, template_id: &TemplateId) -> Result<Template> {
        let record = self
            .records
            .get(TEMPLATES_TABLE, template_id.as_str())?
            .ok_or_else(|| EngineError::not_found(Entity::Template, template_id))?;
        deserialize(TEMPLATES_TABLE, template_id.as_str(), &record)
    }

    pub fn list(&self, filter: &TemplateFilter) -> Result<Vec<Template>> {
        let mut templates = Vec::new();
        for record in self.records.list(TEMPLATES_TABLE)? {
            let template: Template = deserialize(TEMPLATES_TABLE, "*", &record)?;
            if filter.matches(&template) {
                templates.push(template);
            }
        }
        Ok(templates)
    }

    /// Copies a template's mapping, rules and defaults into a session and
    /// counts the apply.
    ///
    /// When the session's actual source headers are supplied, each stored
    /// source header is re-attached: exact (normalized) match first, then
    /// the best fuzzy candidate above the re-match threshold, else the
    /// target is left unmapped. The copy is by value; later session edits
    /// never reach the stored template.
    pub fn apply_to(
        &self,
        template_id: &TemplateId,
        session: &mut Session,
        source_headers: Option<&[ColumnName]>,
    ) -> Result<()> {
        let template = self.get(template_id)?;

        let mapping = match source_headers {
            Some(headers) => rematch_mapping(&template.mapping, headers)?,
            None => template.mapping.clone(),
        };
        session.mapping = Some(mapping);
        session.formula_rules = template.formula_rules.clone();
        session.factwise_rules = template.factwise_rules.clone();
        session.default_values = template.default_values.clone();
        session.applied_template_id = Some(template.id.clone());

        self.count_usage(TEMPLATES_TABLE, Entity::Template, template_id)?;
        tracing::info!(
            template_id = %template_id,
            session_id = %session.session_id,
            "applied template"
        );
        Ok(())
    }

    pub fn create_tag_template(&self, draft: TagTemplateDraft) -> Result<TagTemplate> {
        for rule in &draft.formula_rules {
            rule.validate().map_err(ValidationError::Model)?;
        }
        let template = TagTemplate {
            id: TemplateId::generate(),
            name: draft.name,
            description: draft.description,
            created_by: draft.created_by,
            created_at: self.clock.now(),
            usage_count: 0,
            category: draft.category,
            tags: draft.tags,
            is_public: draft.is_public,
            formula_rules: draft.formula_rules,
        };
        let record = serialize(TAG_TEMPLATES_TABLE, template.id.as_str(), &template)?;
        self.records
            .put(TAG_TEMPLATES_TABLE, template.id.as_str(), record)?;
        Ok(template)
    }

    pub fn get_tag_template(&self, template_id: &TemplateId) -> Result<TagTemplate> {
        let record = self
            .records
            .get(TAG_TEMPLATES_TABLE, template_id.as_str())?
            .ok_or_else(|| EngineError::not_found(Entity::TagTemplate, template_id))?;
        deserialize(TAG_TEMPLATES_TABLE, template_id.as_str(), &record)
    }

    /// Copies a tag template's formula rules into a session and counts the
    /// apply. Mapping, defaults and factwise rules are untouched.
    pub fn apply_tag_template_to(
        &self,
        template_id: &TemplateId,
        session: &mut Session,
    ) -> Result<()> {
        let template = self.get_tag_template(template_id)?;
        session.formula_rules = template.formula_rules.clone();
        self.count_usage(TAG_TEMPLATES_TABLE, Entity::TagTemplate, template_id)?;
        Ok(())
    }

    /// Atomic add with bounded retry on conflict. Read-modify-write would
    /// lose counts under concurrent applies; the add itself is the store's
    /// job, the retry budget is ours.
    fn count_usage(&self, table: &str, entity: Entity, template_id: &TemplateId) -> Result<()> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self
                .records
                .increment(table, template_id.as_str(), USAGE_COUNT_FIELD, 1)
            {
                Ok(_) => return Ok(()),
                Err(StoreError::Conflict { .. }) if attempts < MAX_INCREMENT_ATTEMPTS => {
                    tracing::debug!(
                        template_id = %template_id,
                        attempts,
                        "usage count increment conflict, retrying"
                    );
                }
                Err(StoreError::Conflict { .. }) => {
                    return Err(EngineError::Conflict {
                        entity,
                        id: template_id.as_str().to_string(),
                        attempts,
                    });
                }
                Err(StoreError::MissingRecord { .. }) => {
                    return Err(EngineError::not_found(entity, template_id));
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

/// Re-attaches a stored mapping to the actual source headers of a session.
fn rematch_mapping(
    stored: &HeaderMapping,
    source_headers: &[ColumnName],
) -> Result<HeaderMapping> {
    let mut entries = Vec::new();
    for entry in stored.entries() {
        let source = entry
            .source
            .as_ref()
            .and_then(|stored_source| rematch_source(stored_source, source_headers));
        entries.push(MappingEntry {
            target: entry.target.clone(),
            source,
        });
    }
    HeaderMapping::new(entries)
        .map_err(ValidationError::Model)
        .map_err(EngineError::from)
}

fn rematch_source(stored: &ColumnName, source_headers: &[ColumnName]) -> Option<ColumnName> {
    let mut best: Option<(f64, &ColumnName)> = None;
    for header in source_headers {
        let score = score_headers(stored.as_str(), header.as_str());
        if score >= 1.0 {
            return Some(header.clone());
        }
        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, header));
        }
    }
    best.and_then(|(score, header)| (score >= REMATCH_THRESHOLD).then(|| header.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> ColumnName {
        ColumnName::new(name).unwrap()
    }

    #[test]
    fn rematch_survives_cosmetic_header_drift() {
        let headers = vec![col("Part_Number "), col("Menge")];
        assert_eq!(
            rematch_source(&col("Part Number"), &headers),
            Some(col("Part_Number"))
        );
    }

    #[test]
    fn rematch_gives_up_below_threshold() {
        let headers = vec![col("Completely Different")];
        assert_eq!(rematch_source(&col("Part Number"), &headers), None);
    }
}
