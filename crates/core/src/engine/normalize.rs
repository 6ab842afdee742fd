use crate::engine::tables::{normalize_key, CategoryTables};

/// Sentinel category for queries nothing matches. Not an error: the engine
/// still ranks cards on their base rates.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Maps a free-text merchant or category query to a normalized category.
pub struct CategoryNormalizer {
    tables: CategoryTables,
}

impl CategoryNormalizer {
    pub fn new(tables: CategoryTables) -> Self {
        Self { tables }
    }

    /// Resolution order: exact synonym match, exact merchant match, then
    /// substring containment with the longest matching key winning.
    pub fn resolve(&self, query: &str) -> String {
        let query = normalize_key(query);
        if query.is_empty() {
            return UNCATEGORIZED.to_string();
        }

        if let Some(category) = self.tables.category_for_synonym(&query) {
            return category.to_string();
        }

        if let Some(category) = self.tables.category_for_merchant(&query) {
            return category.to_string();
        }

        if let Some(category) = self.containment_match(&query) {
            return category.to_string();
        }

        UNCATEGORIZED.to_string()
    }

    /// Longest key that contains or is contained by the query. Length ties
    /// resolve to the lexicographically first key, keeping resolution
    /// deterministic for fixed tables.
    fn containment_match(&self, query: &str) -> Option<&str> {
        let mut best: Option<(usize, &str)> = None;
        for (key, category) in self.tables.all_keys() {
            if !(key.contains(query) || query.contains(key)) {
                continue;
            }
            let longer = match best {
                None => true,
                Some((best_len, _)) => key.len() > best_len,
            };
            if longer {
                best = Some((key.len(), category));
            }
        }
        best.map(|(_, category)| category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn normalizer() -> CategoryNormalizer {
        CategoryNormalizer::new(CategoryTables::default_us())
    }

    #[test]
    fn resolves_canonical_category_directly() {
        assert_eq!(normalizer().resolve("groceries"), "groceries");
    }

    #[test]
    fn resolves_synonym_with_messy_casing_and_whitespace() {
        assert_eq!(normalizer().resolve("  Grocery   Store "), "groceries");
        assert_eq!(normalizer().resolve("GASOLINE"), "gas");
    }

    #[test]
    fn exact_merchant_match_wins_over_substring_fallback() {
        // "whole foods" also contains the restaurants synonym "food"; the
        // merchant table entry must win.
        assert_eq!(normalizer().resolve("whole foods"), "groceries");
    }

    #[test]
    fn resolves_merchant_alias() {
        assert_eq!(normalizer().resolve("amazon.com"), "online_shopping");
    }

    #[test]
    fn containment_falls_back_to_longest_key() {
        let tables = CategoryTables::new(
            BTreeMap::new(),
            [
                ("sam".to_string(), "gas".to_string()),
                ("sams club".to_string(), "wholesale".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let normalizer = CategoryNormalizer::new(tables);
        assert_eq!(normalizer.resolve("visit sams club today"), "wholesale");
    }

    #[test]
    fn query_contained_by_key_matches() {
        assert_eq!(normalizer().resolve("starbuck"), "restaurants");
    }

    #[test]
    fn unknown_query_is_uncategorized() {
        assert_eq!(normalizer().resolve("zzz_unknown_merchant"), UNCATEGORIZED);
    }

    #[test]
    fn empty_query_is_uncategorized() {
        assert_eq!(normalizer().resolve("   "), UNCATEGORIZED);
    }
}
