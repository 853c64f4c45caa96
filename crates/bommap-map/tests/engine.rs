use std::collections::BTreeMap;

use bommap_map::{DEFAULT_SCORE_THRESHOLD, MappingEngine};
use bommap_model::ColumnName;

fn cols(names: &[&str]) -> Vec<ColumnName> {
    names
        .iter()
        .map(|name| ColumnName::new(*name).unwrap())
        .collect()
}

fn source_for<'a>(
    proposal: &'a bommap_map::MappingProposal,
    target: &str,
) -> Option<(&'a str, f32)> {
    proposal
        .proposals
        .iter()
        .find(|p| p.target.as_str() == target)
        .and_then(|p| p.source.as_ref().map(|s| (s.as_str(), p.score)))
}

#[test]
fn exact_matches_score_one_regardless_of_case_and_spacing() {
    let engine = MappingEngine::default();
    let proposal = engine.propose(
        &cols(&["part_number", "  QUANTITY "]),
        &cols(&["Part Number", "Quantity"]),
    );

    let (source, score) = source_for(&proposal, "Part Number").unwrap();
    assert_eq!(source, "part_number");
    assert_eq!(score, 1.0);

    let (source, score) = source_for(&proposal, "Quantity").unwrap();
    assert_eq!(source, "  QUANTITY ");
    assert_eq!(score, 1.0);
}

#[test]
fn no_source_is_assigned_twice() {
    let engine = MappingEngine::default();
    // Both targets would pick "Part Number" in isolation; only one may get
    // it, and the winner is the better-scoring pair.
    let proposal = engine.propose(
        &cols(&["Part Number", "Notes"]),
        &cols(&["Part Number", "Part No"]),
    );

    let assigned: Vec<&str> = proposal
        .proposals
        .iter()
        .filter_map(|p| p.source.as_ref().map(|s| s.as_str()))
        .collect();
    let unique: std::collections::BTreeSet<&&str> = assigned.iter().collect();
    assert_eq!(assigned.len(), unique.len(), "a source was assigned twice");

    let (source, score) = source_for(&proposal, "Part Number").unwrap();
    assert_eq!(source, "Part Number");
    assert_eq!(score, 1.0);
}

#[test]
fn bom_headers_map_through_builtin_vocabulary() {
    let engine = MappingEngine::new(DEFAULT_SCORE_THRESHOLD);
    let proposal = engine.propose(
        &cols(&["Part No", "Desc", "Qty"]),
        &cols(&["Item Code", "Item Name", "Quantity"]),
    );

    let (source, score) = source_for(&proposal, "Item Code").unwrap();
    assert_eq!(source, "Part No");
    assert!(score >= 0.7, "Item Code score {score}");

    let (source, _) = source_for(&proposal, "Item Name").unwrap();
    assert_eq!(source, "Desc");

    let (source, _) = source_for(&proposal, "Quantity").unwrap();
    assert_eq!(source, "Qty");

    assert!(proposal.unmapped_sources.is_empty());
}

#[test]
fn below_threshold_targets_stay_unmapped() {
    let engine = MappingEngine::default();
    let proposal = engine.propose(
        &cols(&["Internal Audit Notes"]),
        &cols(&["Quantity"]),
    );

    assert_eq!(source_for(&proposal, "Quantity"), None);
    assert_eq!(proposal.mapped_count(), 0);
    assert_eq!(proposal.unmapped_sources.len(), 1);
}

#[test]
fn template_synonyms_outrank_distance_scoring() {
    let target = ColumnName::new("Item Code").unwrap();
    let synonyms = BTreeMap::from([(target.clone(), vec!["Artikelnummer".to_string()])]);
    let engine = MappingEngine::default().with_synonyms(&synonyms);

    let proposal = engine.propose(
        &cols(&["Artikelnummer", "Menge"]),
        &cols(&["Item Code"]),
    );
    let (source, score) = source_for(&proposal, "Item Code").unwrap();
    assert_eq!(source, "Artikelnummer");
    assert_eq!(score, 1.0);
}

#[test]
fn proposal_converts_to_unique_target_mapping() {
    let engine = MappingEngine::default();
    let proposal = engine.propose(
        &cols(&["Part No", "Qty"]),
        &cols(&["Item Code", "Quantity", "Unit"]),
    );

    let mapping = proposal.into_mapping().unwrap();
    assert_eq!(mapping.entries().len(), 3);
    assert!(
        mapping
            .source_for(&ColumnName::new("Unit").unwrap())
            .is_none()
    );
}
