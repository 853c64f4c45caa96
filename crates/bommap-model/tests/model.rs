use std::collections::BTreeMap;

use chrono::Utc;

use bommap_model::{
    BlobRef, CellValue, ColumnName, DerivedColumnType, FactwiseIdRule, FormulaRule, HeaderMapping,
    JobId, JobStatus, MappingEntry, ProcessingJob, Session, SessionId, SessionStatus, SubRule,
    TemplateId,
};

fn col(name: &str) -> ColumnName {
    ColumnName::new(name).unwrap()
}

#[test]
fn session_round_trips_through_json() {
    let now = Utc::now();
    let session = Session {
        session_id: SessionId::generate(),
        source_file_ref: BlobRef::new("uploads/client.xlsx").unwrap(),
        target_file_ref: BlobRef::new("uploads/target.xlsx").unwrap(),
        source_file_name: "client.xlsx".to_string(),
        target_file_name: "target.xlsx".to_string(),
        source_sheet: Some("Sheet1".to_string()),
        source_header_row: 2,
        target_sheet: None,
        target_header_row: 1,
        mapping: Some(
            HeaderMapping::new(vec![MappingEntry {
                target: col("Item Code"),
                source: Some(col("Part No")),
            }])
            .unwrap(),
        ),
        formula_rules: vec![FormulaRule {
            source_column: col("Desc"),
            column_type: DerivedColumnType::Tag,
            specification_name: None,
            sub_rules: vec![SubRule {
                search_text: "resistor".to_string(),
                output_value: "Resistor".to_string(),
                case_sensitive: false,
            }],
        }],
        factwise_rules: vec![FactwiseIdRule::new(vec![col("Item Code")])],
        default_values: BTreeMap::from([(col("Unit"), "pcs".to_string())]),
        applied_template_id: Some(TemplateId::generate()),
        status: SessionStatus::Mapped,
        created_at: now,
        updated_at: now,
        expires_at: now + chrono::Duration::hours(24),
    };

    let json = serde_json::to_string(&session).expect("serialize session");
    let round: Session = serde_json::from_str(&json).expect("deserialize session");

    assert_eq!(round.session_id, session.session_id);
    assert_eq!(round.status, SessionStatus::Mapped);
    assert_eq!(round.mapping, session.mapping);
    assert_eq!(round.formula_rules, session.formula_rules);
    assert_eq!(round.default_values, session.default_values);
}

#[test]
fn formula_rule_sub_rule_order_survives_persistence() {
    let rule = FormulaRule {
        source_column: col("Desc"),
        column_type: DerivedColumnType::Tag,
        specification_name: None,
        sub_rules: vec![
            SubRule {
                search_text: "smd resistor".to_string(),
                output_value: "SMD Resistor".to_string(),
                case_sensitive: false,
            },
            SubRule {
                search_text: "resistor".to_string(),
                output_value: "Resistor".to_string(),
                case_sensitive: false,
            },
        ],
    };

    let json = serde_json::to_string(&rule).unwrap();
    let round: FormulaRule = serde_json::from_str(&json).unwrap();

    // The broad pattern must stay second or it would shadow the narrow one.
    assert_eq!(round.sub_rules[0].search_text, "smd resistor");
    assert_eq!(round.sub_rules[1].search_text, "resistor");
}

#[test]
fn job_error_message_only_with_failed() {
    let now = Utc::now();
    let mut job = ProcessingJob {
        job_id: JobId::generate(),
        session_id: SessionId::generate(),
        status: JobStatus::Queued,
        progress: 0,
        error_message: None,
        result: None,
        created_at: now,
        updated_at: now,
        expires_at: now + chrono::Duration::hours(24),
    };
    job.transition(JobStatus::Processing).unwrap();
    job.transition(JobStatus::Failed).unwrap();
    job.error_message = Some("source blob missing".to_string());

    let json = serde_json::to_string(&job).unwrap();
    let round: ProcessingJob = serde_json::from_str(&json).unwrap();
    assert_eq!(round.status, JobStatus::Failed);
    assert_eq!(round.error_message.as_deref(), Some("source blob missing"));
    assert!(round.result.is_none());
}

#[test]
fn missing_cell_serde_is_tagged() {
    let cell = CellValue::Missing;
    let json = serde_json::to_string(&cell).unwrap();
    assert!(json.contains("Missing"));
    let round: CellValue = serde_json::from_str(&json).unwrap();
    assert!(round.is_missing());
}
