//! Adapters for the loosely-typed request forms of the original Python API,
//! where field lists and ranges arrive as comma-separated strings.

use crate::data::filter::{ranges_to_filter, FilterSpec};
use crate::error::QueryResult;
use crate::query::Projection;

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(text: &str) -> Vec<&str> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// `""` → default fields, `"*"` → all fields, `"Mw,Repi"` → those fields.
pub fn projection_from_str(text: &str) -> Projection {
    Projection::from_requested(&split_list(text))
}

/// `("Mw,Rjb", "6 to 8, 0 to 10")` → `Mw in [6, 8] AND Rjb in [0, 10]`.
pub fn multi_range_filter(fields: &str, ranges: &str) -> QueryResult<FilterSpec> {
    ranges_to_filter(&split_list(fields), &split_list(ranges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::Clause;
    use crate::error::QueryError;

    #[test]
    fn splits_and_trims() {
        assert_eq!(split_list(" Mw , Repi,,Vs30 "), ["Mw", "Repi", "Vs30"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn projection_strings() {
        assert_eq!(projection_from_str(""), Projection::Default);
        assert_eq!(projection_from_str(" * "), Projection::All);
        assert_eq!(projection_from_str("Mw,Repi"), Projection::fields(["Mw", "Repi"]));
    }

    #[test]
    fn comma_separated_ranges() {
        let spec = multi_range_filter("Mw, Rjb", "6 to 8 , -1 to 10").unwrap();
        assert_eq!(
            spec.clauses,
            vec![Clause::in_range("Mw", "6 to 8"), Clause::in_range("Rjb", "-1 to 10")]
        );
        assert_eq!(
            multi_range_filter("Mw,Rjb,Vs30", "6 to 8").unwrap_err(),
            QueryError::ArityMismatch { fields: 3, ranges: 1 }
        );
    }
}
