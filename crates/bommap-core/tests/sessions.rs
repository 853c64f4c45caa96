use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use bommap_core::{EngineError, NewSession, SessionManager};
use bommap_model::{
    BlobRef, ColumnName, DerivedColumnType, FormulaRule, HeaderMapping, MappingEntry,
    SessionStatus, SubRule,
};
use bommap_store::{FixedClock, MemoryRecordStore, RecordStore};

fn col(name: &str) -> ColumnName {
    ColumnName::new(name).unwrap()
}

fn new_session() -> NewSession {
    NewSession {
        source_file_ref: BlobRef::new("uploads/src.csv").unwrap(),
        target_file_ref: BlobRef::new("uploads/tgt.csv").unwrap(),
        source_file_name: "src.csv".to_string(),
        target_file_name: "tgt.csv".to_string(),
        source_sheet: None,
        source_header_row: 1,
        target_sheet: None,
        target_header_row: 1,
    }
}

fn simple_mapping() -> HeaderMapping {
    HeaderMapping::new(vec![MappingEntry {
        target: col("Item Code"),
        source: Some(col("Part No")),
    }])
    .unwrap()
}

fn manager() -> (SessionManager, Arc<MemoryRecordStore>, Arc<FixedClock>) {
    let records = Arc::new(MemoryRecordStore::new());
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let manager = SessionManager::new(
        Arc::clone(&records) as Arc<dyn bommap_store::RecordStore>,
        Arc::clone(&clock) as Arc<dyn bommap_store::Clock>,
    );
    (manager, records, clock)
}

#[test]
fn create_then_get_round_trips() {
    let (manager, _, _) = manager();
    let created = manager.create(new_session()).unwrap();
    assert_eq!(created.status, SessionStatus::Uploaded);

    let loaded = manager.get(&created.session_id).unwrap();
    assert_eq!(loaded.session_id, created.session_id);
    assert_eq!(loaded.source_file_name, "src.csv");
}

#[test]
fn get_unknown_session_is_not_found() {
    let (manager, _, _) = manager();
    let missing = bommap_model::SessionId::generate();
    assert!(matches!(
        manager.get(&missing),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn confirm_mapping_advances_to_mapped() {
    let (manager, _, _) = manager();
    let session = manager.create(new_session()).unwrap();

    let updated = manager
        .confirm_mapping(&session.session_id, simple_mapping())
        .unwrap();
    assert_eq!(updated.status, SessionStatus::Mapped);
    assert!(updated.mapping.is_some());
}

#[test]
fn confirm_mapping_on_processed_session_is_a_state_error() {
    let (manager, _, _) = manager();
    let session = manager.create(new_session()).unwrap();
    manager
        .confirm_mapping(&session.session_id, simple_mapping())
        .unwrap();
    manager.mark_processed(&session.session_id).unwrap();

    let err = manager
        .confirm_mapping(&session.session_id, simple_mapping())
        .unwrap_err();
    assert!(matches!(err, EngineError::State { .. }));
}

#[test]
fn expired_session_reads_as_not_found_while_record_persists() {
    let (manager, records, clock) = manager();
    let session = manager.create(new_session()).unwrap();

    clock.advance(Duration::hours(25));

    let err = manager
        .confirm_mapping(&session.session_id, simple_mapping())
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));

    // The record still physically exists; only the read path hides it.
    let raw = records
        .get("sessions", session.session_id.as_str())
        .unwrap();
    assert!(raw.is_some());
}

#[test]
fn formula_rules_are_validated_and_order_preserved() {
    let (manager, _, _) = manager();
    let session = manager.create(new_session()).unwrap();

    let bad = vec![FormulaRule {
        source_column: col("Desc"),
        column_type: DerivedColumnType::Specification,
        specification_name: None,
        sub_rules: vec![],
    }];
    assert!(matches!(
        manager.set_formula_rules(&session.session_id, bad),
        Err(EngineError::Validation(_))
    ));

    let rules = vec![
        FormulaRule {
            source_column: col("Desc"),
            column_type: DerivedColumnType::Tag,
            specification_name: None,
            sub_rules: vec![SubRule {
                search_text: "b".to_string(),
                output_value: "B".to_string(),
                case_sensitive: false,
            }],
        },
        FormulaRule {
            source_column: col("Desc"),
            column_type: DerivedColumnType::Tag,
            specification_name: None,
            sub_rules: vec![SubRule {
                search_text: "a".to_string(),
                output_value: "A".to_string(),
                case_sensitive: false,
            }],
        },
    ];
    let updated = manager
        .set_formula_rules(&session.session_id, rules.clone())
        .unwrap();
    assert_eq!(updated.formula_rules, rules);

    let reloaded = manager.get(&session.session_id).unwrap();
    assert_eq!(reloaded.formula_rules, rules);
}

#[test]
fn default_values_round_trip() {
    let (manager, _, _) = manager();
    let session = manager.create(new_session()).unwrap();

    let defaults = BTreeMap::from([(col("Unit"), "pcs".to_string())]);
    manager
        .set_default_values(&session.session_id, defaults.clone())
        .unwrap();
    assert_eq!(manager.get(&session.session_id).unwrap().default_values, defaults);
}

#[test]
fn delete_removes_the_record() {
    let (manager, _, _) = manager();
    let session = manager.create(new_session()).unwrap();
    assert!(manager.delete(&session.session_id).unwrap());
    assert!(!manager.delete(&session.session_id).unwrap());
    assert!(matches!(
        manager.get(&session.session_id),
        Err(EngineError::NotFound { .. })
    ));
}
