//! Built-in BOM vocabulary.
//!
//! Header names in bill-of-materials exports are dominated by a small set of
//! concepts with many spellings. The dictionary below maps each canonical
//! concept to its common synonyms; abbreviations expand before lookup so
//! `Desc` participates as `description`. All entries are in normalized form
//! (lowercase, space-separated).

/// Canonical concept -> known synonyms.
const DICTIONARY: &[(&str, &[&str])] = &[
    (
        "item code",
        &[
            "part number",
            "part no",
            "item id",
            "sku",
            "mpn",
            "manufacturer part number",
        ],
    ),
    (
        "item name",
        &["description", "name", "title", "component", "part description"],
    ),
    ("quantity", &["qty", "amount", "count", "pieces", "pcs"]),
    ("unit", &["uom", "unit of measure", "units"]),
    (
        "manufacturer",
        &["mfg", "maker", "brand", "vendor", "supplier"],
    ),
    (
        "specification",
        &["spec", "properties", "specs", "characteristics"],
    ),
    ("value", &["val", "data", "rating", "nominal"]),
    ("reference", &["ref", "designator", "ref des", "location"]),
    ("type", &["category", "class", "family", "group"]),
    ("price", &["cost", "rate", "price per unit", "unit cost"]),
    ("voltage", &["volt", "volts", "vdc", "vac"]),
    ("current", &["amp", "amps", "ampere", "ma", "ua"]),
    ("resistance", &["ohm", "ohms"]),
    ("capacitance", &["cap", "farad", "uf", "pf", "nf"]),
    ("tolerance", &["tol", "tolerance percent", "accuracy"]),
    ("package", &["footprint", "case", "housing", "form factor"]),
    ("temperature", &["temp", "temp range", "operating temp"]),
    (
        "power",
        &["power rating", "watts", "power dissipation"],
    ),
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("qty", "quantity"),
    ("desc", "description"),
    ("mfg", "manufacturer"),
    ("uom", "unit"),
    ("ref", "reference"),
    ("spec", "specification"),
    ("val", "value"),
    ("temp", "temperature"),
    ("vol", "voltage"),
    ("cur", "current"),
    ("res", "resistance"),
    ("cap", "capacitance"),
    ("tol", "tolerance"),
];

/// Expands a normalized term through the abbreviation table; unknown terms
/// pass through unchanged.
pub fn expand_abbreviation(term: &str) -> &str {
    ABBREVIATIONS
        .iter()
        .find(|(abbrev, _)| *abbrev == term)
        .map_or(term, |(_, full)| *full)
}

/// Semantic similarity between two normalized headers, via the dictionary.
///
/// Tiers: 1.0 identical, 0.95 synonyms of the same concept, 0.9 canonical
/// name vs one of its synonyms, 0.85 equal after abbreviation expansion,
/// 0.0 otherwise. Inputs must already be normalized.
pub fn semantic_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a = expand_abbreviation(a);
    let b = expand_abbreviation(b);

    for (canonical, synonyms) in DICTIONARY {
        let a_is_canonical = a == *canonical;
        let b_is_canonical = b == *canonical;
        let a_is_synonym = synonyms.contains(&a);
        let b_is_synonym = synonyms.contains(&b);

        if a_is_synonym && b_is_synonym {
            return 0.95;
        }
        if (a_is_canonical && b_is_synonym) || (b_is_canonical && a_is_synonym) {
            return 0.9;
        }
    }

    if a == b { 0.85 } else { 0.0 }
}
