//! Fuzzy matching of completion queries

/// Score of an empty query: matches everything, below any real match.
pub const EMPTY_QUERY_SCORE: f64 = f64::MIN_POSITIVE;

/// Scores how well `pattern` matches `data` as a case-insensitive
/// subsequence. `0.0` means no match; higher is better. Contiguous runs and
/// matches near the start of `data` score best.
pub fn match_score(pattern: &str, data: &str) -> f64 {
    if pattern.is_empty() {
        return EMPTY_QUERY_SCORE;
    }
    let data: Vec<char> = data.chars().flat_map(char::to_lowercase).collect();
    let mut position = 0;
    let mut skipped = 0usize;
    let mut matched = 0usize;
    for wanted in pattern.chars().flat_map(char::to_lowercase) {
        let Some(found) = data[position..].iter().position(|c| *c == wanted) else {
            return 0.0;
        };
        skipped += found;
        position += found + 1;
        matched += 1;
    }
    let coverage = matched as f64 / data.len().max(1) as f64;
    coverage / (1.0 + skipped as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_is_zero() {
        assert_eq!(match_score("xyz", "name"), 0.0);
        assert_eq!(match_score("nn", "name"), 0.0);
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(match_score("", "anything") > 0.0);
        assert!(match_score("", "anything") < match_score("a", "anything"));
    }

    #[test]
    fn test_prefix_beats_scattered() {
        let prefix = match_score("po", "port");
        let scattered = match_score("pt", "port");
        assert!(prefix > scattered);
        assert!(scattered > 0.0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(match_score("MAX", "maxThreads"), match_score("max", "maxThreads"));
    }

    #[test]
    fn test_exact_match_is_best() {
        assert!(match_score("port", "port") > match_score("port", "ports"));
        assert_eq!(match_score("port", "port"), 1.0);
    }
}
