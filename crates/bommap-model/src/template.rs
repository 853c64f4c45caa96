use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ColumnName, FactwiseIdRule, FormulaRule, HeaderMapping, TemplateId};

/// A persisted, reusable mapping + rule bundle.
///
/// Immutable once created except for metadata edits and `usage_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub usage_count: u64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    pub mapping: HeaderMapping,
    #[serde(default)]
    pub formula_rules: Vec<FormulaRule>,
    #[serde(default)]
    pub factwise_rules: Vec<FactwiseIdRule>,
    #[serde(default)]
    pub default_values: BTreeMap<ColumnName, String>,
}

impl Template {
    /// Per-target synonym vocabulary for later fuzzy runs: the source header
    /// this template mapped to a target is known-good spelling for it.
    pub fn synonyms(&self) -> BTreeMap<ColumnName, Vec<String>> {
        let mut synonyms = BTreeMap::new();
        for entry in self.mapping.entries() {
            if let Some(source) = &entry.source {
                synonyms
                    .entry(entry.target.clone())
                    .or_insert_with(Vec::new)
                    .push(source.as_str().to_string());
            }
        }
        synonyms
    }
}

/// Same shape as [`Template`] restricted to formula rules, reusable on its
/// own for tagging passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub usage_count: u64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    pub formula_rules: Vec<FormulaRule>,
}

/// User-settable fields of a template; the store stamps id, creation time
/// and the zeroed usage count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub mapping: HeaderMapping,
    #[serde(default)]
    pub formula_rules: Vec<FormulaRule>,
    #[serde(default)]
    pub factwise_rules: Vec<FactwiseIdRule>,
    #[serde(default)]
    pub default_values: BTreeMap<ColumnName, String>,
}

/// User-settable fields of a tag template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagTemplateDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    pub formula_rules: Vec<FormulaRule>,
}

/// Listing filter. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub category: Option<String>,
    pub created_by: Option<String>,
    pub public_only: bool,
}

impl TemplateFilter {
    pub fn matches(&self, template: &Template) -> bool {
        if self.public_only && !template.is_public {
            return false;
        }
        if let Some(category) = &self.category
            && template.category.as_deref() != Some(category.as_str())
        {
            return false;
        }
        if let Some(created_by) = &self.created_by
            && template.created_by.as_deref() != Some(created_by.as_str())
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MappingEntry;

    fn col(name: &str) -> ColumnName {
        ColumnName::new(name).unwrap()
    }

    fn sample_template() -> Template {
        Template {
            id: TemplateId::generate(),
            name: "EMS BOM".to_string(),
            description: None,
            created_by: Some("ops".to_string()),
            created_at: Utc::now(),
            usage_count: 0,
            category: Some("electronics".to_string()),
            tags: vec!["bom".to_string()],
            is_public: true,
            mapping: HeaderMapping::new(vec![
                MappingEntry {
                    target: col("Item Code"),
                    source: Some(col("Part Number")),
                },
                MappingEntry {
                    target: col("Quantity"),
                    source: None,
                },
            ])
            .unwrap(),
            formula_rules: Vec::new(),
            factwise_rules: Vec::new(),
            default_values: BTreeMap::new(),
        }
    }

    #[test]
    fn synonyms_skip_unmapped_targets() {
        let template = sample_template();
        let synonyms = template.synonyms();
        assert_eq!(
            synonyms.get(&col("Item Code")).map(Vec::as_slice),
            Some(&["Part Number".to_string()][..])
        );
        assert!(!synonyms.contains_key(&col("Quantity")));
    }

    #[test]
    fn filter_combines_criteria() {
        let template = sample_template();

        let all = TemplateFilter::default();
        assert!(all.matches(&template));

        let wrong_category = TemplateFilter {
            category: Some("mechanical".to_string()),
            ..TemplateFilter::default()
        };
        assert!(!wrong_category.matches(&template));

        let by_owner = TemplateFilter {
            created_by: Some("ops".to_string()),
            public_only: true,
            ..TemplateFilter::default()
        };
        assert!(by_owner.matches(&template));
    }
}
