//! Close-match suggestions for misspelled names.

const DEFAULT_CUTOFF: f64 = 0.6;
const MAX_SUGGESTIONS: usize = 3;

/// Return up to three candidates that closely match `word`, ignoring case.
///
/// Similarity is normalized Levenshtein distance with a 0.6 cutoff.
/// Candidates are ranked best first and keep their original spelling.
pub fn close_matches<'a, I>(word: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let word = word.to_lowercase();
    let mut scored: Vec<(f64, &str)> = candidates
        .into_iter()
        .map(|c| (strsim::normalized_levenshtein(&word, &c.to_lowercase()), c))
        .filter(|(score, _)| *score >= DEFAULT_CUTOFF)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, c)| c.to_string())
        .collect()
}
