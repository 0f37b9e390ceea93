//! # "Did you mean" suggestions
//!
//! Hints for when the user supplies a name that is close to, but not
//! exactly, something we know about: package IDs in the catalog,
//! manifest keys, test-driver names. A near-miss gets the nearest
//! valid spelling attached to its error instead of a bare rejection.

/// Find the candidate closest to `given` by Levenshtein edit distance.
///
/// Returns `None` only when `candidates` is empty; a suggestion is
/// always produced otherwise, since these hints accompany errors that
/// already list the valid options.
pub fn did_you_mean<I, S>(given: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .map(|c| {
            let distance = edit_distance(given, c.as_ref());
            (c.as_ref().to_string(), distance)
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Render a suggestion as a sentence suffix: `" (Did you mean 'x'?)"`.
///
/// Returns an empty string for `None` so the result can be appended
/// unconditionally to an error message.
pub fn sentence_suffix(suggestion: Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (Did you mean '{s}'?)"),
        None => String::new(),
    }
}

/// Levenshtein distance between `given` and `candidate`.
///
/// Single-row dynamic program: `row[j]` holds the distance from the
/// prefix of `given` consumed so far to the first `j` characters of
/// `candidate`, so memory stays proportional to the candidate alone.
fn edit_distance(given: &str, candidate: &str) -> usize {
    let target: Vec<char> = candidate.chars().collect();
    let mut row: Vec<usize> = (0..=target.len()).collect();

    for (i, gc) in given.chars().enumerate() {
        // `diag` carries the previous row's row[j] (the substitution
        // cell) as the update sweeps left to right.
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, &tc) in target.iter().enumerate() {
            let substitute = diag + usize::from(gc != tc);
            diag = row[j + 1];
            row[j + 1] = substitute.min(diag + 1).min(row[j] + 1);
        }
    }

    row[target.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("catch", "catch"), 0);
        assert_eq!(edit_distance("catc", "catch"), 1);
        assert_eq!(edit_distance("cacth", "catch"), 2);
        assert_eq!(edit_distance("", "catch"), 5);
        assert_eq!(edit_distance("catch", ""), 5);
    }

    #[test]
    fn test_did_you_mean_picks_nearest() {
        let candidates = ["name", "namespace", "version", "depends", "test_driver"];
        assert_eq!(
            did_you_mean("nmae", candidates),
            Some("name".to_string())
        );
        assert_eq!(
            did_you_mean("depend", candidates),
            Some("depends".to_string())
        );
        assert_eq!(
            did_you_mean("test-driver", candidates),
            Some("test_driver".to_string())
        );
    }

    #[test]
    fn test_did_you_mean_empty_candidates() {
        let empty: [&str; 0] = [];
        assert_eq!(did_you_mean("anything", empty), None);
    }

    #[test]
    fn test_sentence_suffix() {
        assert_eq!(
            sentence_suffix(Some("Catch".to_string())),
            " (Did you mean 'Catch'?)"
        );
        assert_eq!(sentence_suffix(None), "");
    }
}
