//! Query/candidate text similarity. This is the tie-break backbone of element resolution,
//! so the constants here are part of the observable ranking behavior.

/// Floor for a containment match (either string contains the other).
pub const CONTAINMENT_BASE: f64 = 0.7;
/// Added on top of [`CONTAINMENT_BASE`], scaled by length coverage.
pub const CONTAINMENT_SPAN: f64 = 0.2;
/// Weight of a partial (substring) word match relative to an exact word match.
pub const PARTIAL_WORD_WEIGHT: f64 = 0.4;
/// Word overlap never reaches the containment floor.
pub const WORD_OVERLAP_CEILING: f64 = 0.69;

const MIN_PARTIAL_WORD_LEN: usize = 3;

/// Match strength of `candidate` for `query`, in `[0, 1]`.
pub fn similarity(query: &str, candidate: &str) -> f64 {
    let query = normalize(query);
    let candidate = normalize(candidate);
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if query == candidate {
        return 1.0;
    }

    if candidate.contains(&query) || query.contains(&candidate) {
        let (q_len, c_len) = (query.chars().count(), candidate.chars().count());
        let coverage = q_len.min(c_len) as f64 / q_len.max(c_len) as f64;
        return CONTAINMENT_BASE + CONTAINMENT_SPAN * coverage;
    }

    let forward = word_overlap(&query, &candidate);
    let backward = word_overlap(&candidate, &query);
    forward.max(backward).min(WORD_OVERLAP_CEILING)
}

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn word_overlap(left: &str, right: &str) -> f64 {
    let left_words: Vec<&str> = left.split_whitespace().collect();
    let right_words: Vec<&str> = right.split_whitespace().collect();
    let denominator = left_words.len().max(right_words.len());
    if denominator == 0 {
        return 0.0;
    }

    let mut used = vec![false; right_words.len()];
    let mut exact = 0usize;
    let mut unmatched = Vec::new();

    for word in &left_words {
        match right_words
            .iter()
            .enumerate()
            .position(|(i, other)| !used[i] && other == word)
        {
            Some(i) => {
                used[i] = true;
                exact += 1;
            }
            None => unmatched.push(*word),
        }
    }

    let mut partial = 0usize;
    for word in unmatched
        .into_iter()
        .filter(|w| w.chars().count() >= MIN_PARTIAL_WORD_LEN)
    {
        let hit = right_words.iter().enumerate().position(|(i, other)| {
            !used[i]
                && other.chars().count() >= MIN_PARTIAL_WORD_LEN
                && (other.contains(word) || word.contains(other))
        });
        if let Some(i) = hit {
            used[i] = true;
            partial += 1;
        }
    }

    let exact_score = exact as f64 / denominator as f64;
    let partial_score = partial as f64 / denominator as f64 * PARTIAL_WORD_WEIGHT;
    (exact_score + partial_score).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_and_empty_inputs() {
        for q in ["Submit", "  sign in  ", "Create account now", "x"] {
            assert_eq!(similarity(q, q), 1.0);
            assert_eq!(similarity(q, ""), 0.0);
            assert_eq!(similarity("", q), 0.0);
        }
        assert_eq!(similarity("   ", "abc"), 0.0);
    }

    #[test]
    fn normalization_ignores_case_and_padding() {
        assert_eq!(similarity("SUBMIT", " submit "), 1.0);
    }

    #[test]
    fn containment_scales_with_coverage() {
        let tight = similarity("submit", "submit form");
        let loose = similarity("submit", "please submit the form after reading the terms");
        assert!(tight > loose);
        assert!(loose >= CONTAINMENT_BASE);
        assert!(tight <= CONTAINMENT_BASE + CONTAINMENT_SPAN);
    }

    #[test]
    fn containment_beats_word_overlap() {
        let query = "submit application";
        let containing = similarity(query, "Please submit application today and many other words");
        let overlapping = similarity(query, "application form submit");
        let reordered = similarity(query, "application submit");
        assert!(containing > overlapping);
        assert!(containing > reordered);
    }

    #[test]
    fn word_overlap_for_natural_descriptions() {
        let score = similarity("submit button", "Submit Your Application");
        assert!(score > 0.0 && score < CONTAINMENT_BASE);
        assert!(score > similarity("submit button", "Cancel"));
    }

    #[test]
    fn partial_words_count_less_than_exact_words() {
        let exact = similarity("email address", "email field");
        let partial = similarity("email address", "emails field");
        assert!(exact > partial);
        assert!(partial > 0.0);
    }

    #[test]
    fn short_words_do_not_partially_match() {
        assert_eq!(similarity("go up", "gopher upward"), 0.0);
    }
}
