//! Medication suggestions for the prescription form.
//!
//! Full-text matches come first; when the catalog has no full-text hit (typos
//! such as "dipirnoa") every active item is scored by fuzzy similarity.

use serde::{Deserialize, Serialize};
use strsim::{jaro_winkler, normalized_levenshtein};

use super::normalizer::fold;
use crate::db::{Database, DbResult};
use crate::models::CatalogMedication;

/// Number of candidates to retrieve from FTS5.
const FTS_CANDIDATE_LIMIT: usize = 20;

/// Minimum score for a fuzzy-only suggestion.
const MIN_FUZZY_SCORE: f64 = 0.70;

/// A ranked catalog suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub medication: CatalogMedication,
    /// Match quality (0.0 - 1.0)
    pub score: f64,
}

/// Suggests catalog medications for typed text.
pub struct MedicationSuggester<'a> {
    db: &'a Database,
}

impl<'a> MedicationSuggester<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Suggest up to `limit` medications, best first.
    pub fn suggest(&self, query: &str, limit: usize) -> DbResult<Vec<Suggestion>> {
        let folded = fold(query);
        if folded.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self.db.search_medications(query, FTS_CANDIDATE_LIMIT)?;
        let (candidates, min_score) = if candidates.is_empty() {
            (self.db.list_medications(true)?, MIN_FUZZY_SCORE)
        } else {
            (candidates, 0.0)
        };

        let mut scored: Vec<Suggestion> = candidates
            .into_iter()
            .map(|medication| Suggestion {
                score: score_name_match(&medication, &folded),
                medication,
            })
            .filter(|s| s.score >= min_score)
            .collect();

        // Sort by score descending, then name for stable output
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.medication.name.cmp(&b.medication.name))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Score name/alias match quality (0.0 - 1.0) against a folded query.
fn score_name_match(item: &CatalogMedication, query: &str) -> f64 {
    let name = fold(&item.name);
    if name.starts_with(query) {
        return 1.0;
    }
    if name.contains(query) || item.aliases.iter().any(|a| fold(a) == query) {
        return 0.95;
    }

    let name_similarity = best_word_match(query, &name);
    let alias_similarity = item
        .aliases
        .iter()
        .map(|a| best_word_match(query, &fold(a)))
        .fold(0.0, f64::max);

    name_similarity.max(alias_similarity)
}

/// Similarity against the whole text or its best single word.
fn best_word_match(query: &str, text: &str) -> f64 {
    text.split_whitespace()
        .map(|word| fuzzy_match(query, word))
        .fold(fuzzy_match(query, text), f64::max)
}

/// Compute fuzzy string similarity using combined metrics.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    // Jaro-Winkler favours shared prefixes, Levenshtein overall edits
    let jw = jaro_winkler(a, b);
    let lev = normalized_levenshtein(a, b);
    jw * 0.6 + lev * 0.4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();

        let mut dipirona = CatalogMedication::new(1, "Dipirona".into());
        dipirona.aliases = vec!["novalgina".into()];
        db.upsert_medication(&dipirona).unwrap();
        db.upsert_medication(&CatalogMedication::new(2, "Paracetamol".into()))
            .unwrap();
        db.upsert_medication(&CatalogMedication::new(3, "Amoxicilina".into()))
            .unwrap();
        db
    }

    #[test]
    fn test_prefix_hit_ranks_first() {
        let db = setup_db();
        let suggestions = MedicationSuggester::new(&db).suggest("dipi", 5).unwrap();
        assert_eq!(suggestions[0].medication.id, 1);
        assert_eq!(suggestions[0].score, 1.0);
    }

    #[test]
    fn test_alias_hit() {
        let db = setup_db();
        let suggestions = MedicationSuggester::new(&db)
            .suggest("Novalgina", 5)
            .unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].medication.id, 1);
    }

    #[test]
    fn test_typo_falls_back_to_fuzzy() {
        let db = setup_db();
        let suggestions = MedicationSuggester::new(&db)
            .suggest("paracetmol", 5)
            .unwrap();
        assert!(!suggestions.is_empty());
        assert_eq!(suggestions[0].medication.id, 2);
    }

    #[test]
    fn test_nonsense_yields_nothing() {
        let db = setup_db();
        assert!(MedicationSuggester::new(&db)
            .suggest("xyzw", 5)
            .unwrap()
            .is_empty());
        assert!(MedicationSuggester::new(&db).suggest(" ", 5).unwrap().is_empty());
    }

    #[test]
    fn test_fuzzy_match_range() {
        assert_eq!(fuzzy_match("abc", "abc"), 1.0);
        assert!(fuzzy_match("abc", "xyz") < 0.3);
    }
}
