use std::collections::BTreeSet;

use bommap_model::{
    CellValue, ColumnName, DerivedColumnType, FormulaRule, SubRule, Table,
};

use crate::error::{Result, TransformError};

/// How to treat a rule whose source column is not in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationMode {
    /// The rule does not apply; no error. Default.
    #[default]
    Lenient,
    /// Fail with [`TransformError::RuleReferencesMissingColumn`].
    Strict,
}

/// Evaluates formula rules against every row, adding derived columns.
///
/// Rules are independent of one another and all evaluated; within one rule
/// the sub-rules run in list order and the first match wins for that row.
/// Rows where nothing matched get no entry in the derived column at all,
/// which callers can distinguish from an empty value.
///
/// Tag rules derive one `Tag_N` column each; specification rules derive a
/// `Specification_Name_N` / `Specification_Value_N` pair, the name column
/// carrying the rule's specification name on every row. Numbering skips
/// column names the table already uses.
///
/// Returns the derived column names in creation order.
pub fn apply_formula_rules(
    table: &mut Table,
    rules: &[FormulaRule],
    mode: EvaluationMode,
) -> Result<Vec<ColumnName>> {
    let mut used_names: BTreeSet<String> = table
        .headers
        .iter()
        .map(|header| header.as_str().to_string())
        .collect();
    let mut new_columns = Vec::new();
    let mut tag_counter = 1u32;
    let mut spec_counter = 1u32;

    for rule in rules {
        if rule.sub_rules.is_empty() {
            continue;
        }
        if !table.has_header(&rule.source_column) {
            match mode {
                EvaluationMode::Lenient => {
                    tracing::debug!(
                        column = rule.source_column.as_str(),
                        "rule source column absent, skipping rule"
                    );
                    continue;
                }
                EvaluationMode::Strict => {
                    return Err(TransformError::RuleReferencesMissingColumn {
                        column: rule.source_column.as_str().to_string(),
                    });
                }
            }
        }

        match rule.column_type {
            DerivedColumnType::Tag => {
                let column = next_free_name(&mut used_names, &mut tag_counter, |n| {
                    format!("Tag_{n}")
                })?;
                table.ensure_header(column.clone());
                for row in &mut table.rows {
                    let value = row
                        .text(&rule.source_column)
                        .unwrap_or_default()
                        .to_string();
                    if let Some(output) = first_match(&rule.sub_rules, &value) {
                        row.set(column.clone(), CellValue::Text(output));
                    }
                }
                new_columns.push(column);
            }
            DerivedColumnType::Specification => {
                let Some(spec_name) = rule
                    .specification_name
                    .as_deref()
                    .filter(|name| !name.trim().is_empty())
                else {
                    match mode {
                        EvaluationMode::Lenient => continue,
                        EvaluationMode::Strict => {
                            rule.validate()?;
                            continue;
                        }
                    }
                };

                let (name_column, value_column) =
                    next_free_pair(&mut used_names, &mut spec_counter)?;
                table.ensure_header(name_column.clone());
                table.ensure_header(value_column.clone());
                for row in &mut table.rows {
                    row.set(
                        name_column.clone(),
                        CellValue::Text(spec_name.to_string()),
                    );
                    let value = row
                        .text(&rule.source_column)
                        .unwrap_or_default()
                        .to_string();
                    if let Some(output) = first_match(&rule.sub_rules, &value) {
                        row.set(value_column.clone(), CellValue::Text(output));
                    }
                }
                new_columns.push(name_column);
                new_columns.push(value_column);
            }
        }
    }

    tracing::debug!(derived = new_columns.len(), "applied formula rules");
    Ok(new_columns)
}

/// First effective sub-rule whose pattern the value contains.
fn first_match(sub_rules: &[SubRule], value: &str) -> Option<String> {
    for sub_rule in sub_rules {
        if !sub_rule.is_effective() {
            continue;
        }
        let hit = if sub_rule.case_sensitive {
            value.contains(&sub_rule.search_text)
        } else {
            value
                .to_lowercase()
                .contains(&sub_rule.search_text.to_lowercase())
        };
        if hit {
            return Some(sub_rule.output_value.clone());
        }
    }
    None
}

fn next_free_name(
    used: &mut BTreeSet<String>,
    counter: &mut u32,
    make: impl Fn(u32) -> String,
) -> Result<ColumnName> {
    let mut name = make(*counter);
    while used.contains(&name) {
        *counter += 1;
        name = make(*counter);
    }
    *counter += 1;
    used.insert(name.clone());
    Ok(ColumnName::new(name)?)
}

fn next_free_pair(
    used: &mut BTreeSet<String>,
    counter: &mut u32,
) -> Result<(ColumnName, ColumnName)> {
    let mut name = format!("Specification_Name_{counter}");
    let mut value = format!("Specification_Value_{counter}");
    while used.contains(&name) || used.contains(&value) {
        *counter += 1;
        name = format!("Specification_Name_{counter}");
        value = format!("Specification_Value_{counter}");
    }
    *counter += 1;
    used.insert(name.clone());
    used.insert(value.clone());
    Ok((ColumnName::new(name)?, ColumnName::new(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> ColumnName {
        ColumnName::new(name).unwrap()
    }

    fn desc_table(values: &[&str]) -> Table {
        let mut table = Table::new(vec![col("Desc")]);
        for value in values {
            let mut row = bommap_model::Row::new();
            row.set(col("Desc"), CellValue::from_raw(value));
            table.push_row(row);
        }
        table
    }

    fn tag_rule(sub_rules: Vec<SubRule>) -> FormulaRule {
        FormulaRule {
            source_column: col("Desc"),
            column_type: DerivedColumnType::Tag,
            specification_name: None,
            sub_rules,
        }
    }

    fn sub(search: &str, output: &str, case_sensitive: bool) -> SubRule {
        SubRule {
            search_text: search.to_string(),
            output_value: output.to_string(),
            case_sensitive,
        }
    }

    #[test]
    fn first_matching_sub_rule_wins() {
        let mut table = desc_table(&["10k SMD Resistor"]);
        let rule = tag_rule(vec![
            sub("smd resistor", "SMD Resistor", false),
            sub("resistor", "Resistor", false),
        ]);

        apply_formula_rules(&mut table, &[rule], EvaluationMode::Lenient).unwrap();
        assert_eq!(table.rows[0].text(&col("Tag_1")), Some("SMD Resistor"));
    }

    #[test]
    fn no_match_leaves_column_absent_for_that_row() {
        let mut table = desc_table(&["10k Resistor SMD", "Capacitor 10uF"]);
        let rule = tag_rule(vec![sub("resistor", "Resistor", false)]);

        apply_formula_rules(&mut table, &[rule], EvaluationMode::Lenient).unwrap();
        assert_eq!(table.rows[0].text(&col("Tag_1")), Some("Resistor"));
        assert_eq!(table.rows[1].get(&col("Tag_1")), None);
        assert!(table.has_header(&col("Tag_1")));
    }

    #[test]
    fn case_sensitivity_is_per_rule() {
        let mut table = desc_table(&["smd resistor"]);
        let rule = tag_rule(vec![sub("SMD", "Surface Mount", true)]);

        apply_formula_rules(&mut table, &[rule], EvaluationMode::Lenient).unwrap();
        assert_eq!(table.rows[0].get(&col("Tag_1")), None);

        let rule = tag_rule(vec![sub("SMD", "Surface Mount", false)]);
        apply_formula_rules(&mut table, &[rule], EvaluationMode::Lenient).unwrap();
        assert_eq!(table.rows[0].text(&col("Tag_2")), Some("Surface Mount"));
    }

    #[test]
    fn tag_numbering_skips_existing_columns() {
        let mut table = Table::new(vec![col("Desc"), col("Tag_1")]);
        let mut row = bommap_model::Row::new();
        row.set(col("Desc"), CellValue::from_raw("resistor"));
        row.set(col("Tag_1"), CellValue::from_raw("manual"));
        table.push_row(row);

        let rule = tag_rule(vec![sub("resistor", "Resistor", false)]);
        let added =
            apply_formula_rules(&mut table, &[rule], EvaluationMode::Lenient).unwrap();
        assert_eq!(added, vec![col("Tag_2")]);
        assert_eq!(table.rows[0].text(&col("Tag_1")), Some("manual"));
    }

    #[test]
    fn specification_rule_adds_name_value_pair() {
        let mut table = desc_table(&["Cap 50V", "Relay"]);
        let rule = FormulaRule {
            source_column: col("Desc"),
            column_type: DerivedColumnType::Specification,
            specification_name: Some("Voltage Rating".to_string()),
            sub_rules: vec![sub("50v", "50V", false)],
        };

        apply_formula_rules(&mut table, &[rule], EvaluationMode::Lenient).unwrap();
        let name = col("Specification_Name_1");
        let value = col("Specification_Value_1");
        assert_eq!(table.rows[0].text(&name), Some("Voltage Rating"));
        assert_eq!(table.rows[0].text(&value), Some("50V"));
        // Name labels every row; value stays absent where nothing matched.
        assert_eq!(table.rows[1].text(&name), Some("Voltage Rating"));
        assert_eq!(table.rows[1].get(&value), None);
    }

    #[test]
    fn missing_source_column_skips_in_lenient_mode() {
        let mut table = desc_table(&["resistor"]);
        let rule = FormulaRule {
            source_column: col("Nope"),
            column_type: DerivedColumnType::Tag,
            specification_name: None,
            sub_rules: vec![sub("resistor", "Resistor", false)],
        };

        let added =
            apply_formula_rules(&mut table, &[rule], EvaluationMode::Lenient).unwrap();
        assert!(added.is_empty());
    }

    #[test]
    fn missing_source_column_errors_in_strict_mode() {
        let mut table = desc_table(&["resistor"]);
        let rule = FormulaRule {
            source_column: col("Nope"),
            column_type: DerivedColumnType::Tag,
            specification_name: None,
            sub_rules: vec![sub("resistor", "Resistor", false)],
        };

        let err = apply_formula_rules(&mut table, &[rule], EvaluationMode::Strict).unwrap_err();
        assert!(matches!(
            err,
            TransformError::RuleReferencesMissingColumn { column } if column == "Nope"
        ));
    }

    #[test]
    fn re_evaluation_is_deterministic() {
        let original = desc_table(&["10k Resistor", "Capacitor", "RESISTOR array"]);
        let rules = vec![tag_rule(vec![
            sub("capacitor", "Capacitor", false),
            sub("resistor", "Resistor", false),
        ])];

        let mut first = original.clone();
        apply_formula_rules(&mut first, &rules, EvaluationMode::Lenient).unwrap();
        let mut second = original.clone();
        apply_formula_rules(&mut second, &rules, EvaluationMode::Lenient).unwrap();

        assert_eq!(first, second);
    }
}
