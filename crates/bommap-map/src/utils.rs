/// Normalizes a header for comparison: trimmed, lowercased, separators
/// treated as spaces, runs of whitespace collapsed.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['_', '-', '.', '/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separators_and_case() {
        assert_eq!(normalize_header("  Part_Number "), "part number");
        assert_eq!(normalize_header("Ref-Des"), "ref des");
        assert_eq!(normalize_header("Unit  of\tMeasure"), "unit of measure");
    }
}
