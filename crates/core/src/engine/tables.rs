use std::collections::BTreeMap;

/// Immutable category-synonym and merchant->category tables consumed by the
/// normalizer. Passed explicitly into the engine rather than held as
/// process-wide globals.
#[derive(Debug, Clone)]
pub struct CategoryTables {
    /// Synonym (or canonical name) -> canonical category.
    synonyms: BTreeMap<String, String>,
    /// Merchant brand name -> canonical category. Many merchants per
    /// category, one category per merchant.
    merchants: BTreeMap<String, String>,
}

impl CategoryTables {
    /// Builds tables from canonical->synonyms and merchant->category inputs.
    /// All keys are normalized (trimmed, lowercased, whitespace collapsed);
    /// each canonical name also resolves to itself.
    pub fn new(
        synonyms: BTreeMap<String, Vec<String>>,
        merchants: BTreeMap<String, String>,
    ) -> Self {
        let mut synonym_index = BTreeMap::new();
        for (canonical, words) in synonyms {
            let canonical = normalize_key(&canonical);
            synonym_index.insert(canonical.clone(), canonical.clone());
            for word in words {
                synonym_index.insert(normalize_key(&word), canonical.clone());
            }
        }

        let merchants = merchants
            .into_iter()
            .map(|(merchant, category)| (normalize_key(&merchant), normalize_key(&category)))
            .collect();

        Self {
            synonyms: synonym_index,
            merchants,
        }
    }

    pub fn category_for_synonym(&self, key: &str) -> Option<&str> {
        self.synonyms.get(key).map(String::as_str)
    }

    pub fn category_for_merchant(&self, key: &str) -> Option<&str> {
        self.merchants.get(key).map(String::as_str)
    }

    /// Every known key (synonyms first, then merchants) with its category,
    /// for the containment fallback.
    pub fn all_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.synonyms
            .iter()
            .chain(self.merchants.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Built-in US tables matching the default seed catalog.
    pub fn default_us() -> Self {
        let synonyms = [
            (
                "groceries",
                vec![
                    "grocery",
                    "supermarket",
                    "supermarkets",
                    "grocery store",
                    "grocery stores",
                    "food store",
                    "food shopping",
                    "market",
                ],
            ),
            (
                "gas",
                vec![
                    "gas station",
                    "gas stations",
                    "fuel",
                    "gasoline",
                    "petrol",
                    "filling station",
                    "service station",
                ],
            ),
            (
                "restaurants",
                vec![
                    "restaurant",
                    "dining",
                    "dine",
                    "food",
                    "fast food",
                    "cafe",
                    "coffee shop",
                    "takeout",
                    "delivery",
                    "diner",
                ],
            ),
            (
                "travel",
                vec![
                    "trip",
                    "vacation",
                    "airline",
                    "airlines",
                    "flight",
                    "flights",
                    "airport",
                    "hotel",
                    "hotels",
                    "lodging",
                    "resort",
                    "cruise",
                    "car rental",
                    "rental car",
                    "train",
                ],
            ),
            (
                "online_shopping",
                vec![
                    "online",
                    "e-commerce",
                    "ecommerce",
                    "internet shopping",
                    "online store",
                    "online purchase",
                ],
            ),
            (
                "department_store",
                vec!["department store", "department stores", "retail store"],
            ),
            (
                "wholesale",
                vec!["wholesale club", "warehouse", "warehouse club", "bulk store"],
            ),
            (
                "streaming",
                vec![
                    "streaming service",
                    "streaming services",
                    "netflix",
                    "spotify",
                    "hulu",
                    "disney plus",
                    "hbo max",
                ],
            ),
            (
                "utilities",
                vec![
                    "utility",
                    "phone",
                    "internet",
                    "cable",
                    "electricity",
                    "electric",
                    "water",
                    "cell phone",
                    "wireless",
                ],
            ),
            (
                "pharmacy",
                vec![
                    "pharmacies",
                    "drugstore",
                    "drug store",
                    "prescription",
                    "prescriptions",
                ],
            ),
            (
                "entertainment",
                vec![
                    "movies",
                    "movie",
                    "cinema",
                    "theater",
                    "theatre",
                    "concert",
                    "concerts",
                    "amusement park",
                ],
            ),
            (
                "transit",
                vec![
                    "public transit",
                    "public transportation",
                    "metro",
                    "subway",
                    "bus",
                    "rideshare",
                    "taxi",
                ],
            ),
        ];

        let merchants = [
            ("macy's", "department_store"),
            ("macys", "department_store"),
            ("amazon", "online_shopping"),
            ("amazon.com", "online_shopping"),
            ("amzn", "online_shopping"),
            ("costco", "wholesale"),
            ("costco wholesale", "wholesale"),
            ("sam's club", "wholesale"),
            ("walmart", "groceries"),
            ("target", "department_store"),
            ("kroger", "groceries"),
            ("safeway", "groceries"),
            ("whole foods", "groceries"),
            ("whole foods market", "groceries"),
            ("wholefoods", "groceries"),
            ("trader joe's", "groceries"),
            ("delta", "travel"),
            ("delta air lines", "travel"),
            ("united", "travel"),
            ("united airlines", "travel"),
            ("american airlines", "travel"),
            ("marriott", "travel"),
            ("hilton", "travel"),
            ("starbucks", "restaurants"),
            ("mcdonald's", "restaurants"),
            ("chipotle", "restaurants"),
            ("doordash", "restaurants"),
            ("shell", "gas"),
            ("exxon", "gas"),
            ("chevron", "gas"),
            ("cvs", "pharmacy"),
            ("walgreens", "pharmacy"),
            ("rite aid", "pharmacy"),
            ("uber", "transit"),
            ("lyft", "transit"),
        ];

        Self::new(
            synonyms
                .into_iter()
                .map(|(canonical, words)| {
                    (
                        canonical.to_string(),
                        words.into_iter().map(str::to_string).collect(),
                    )
                })
                .collect(),
            merchants
                .into_iter()
                .map(|(merchant, category)| (merchant.to_string(), category.to_string()))
                .collect(),
        )
    }
}

/// Trim, lowercase, collapse internal whitespace.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_resolve_to_themselves() {
        let tables = CategoryTables::default_us();
        assert_eq!(tables.category_for_synonym("groceries"), Some("groceries"));
    }

    #[test]
    fn keys_are_normalized_on_construction() {
        let tables = CategoryTables::new(
            [(
                "Groceries".to_string(),
                vec!["  Grocery   Store ".to_string()],
            )]
            .into_iter()
            .collect(),
            [("  Whole   Foods ".to_string(), "Groceries".to_string())]
                .into_iter()
                .collect(),
        );
        assert_eq!(
            tables.category_for_synonym("grocery store"),
            Some("groceries")
        );
        assert_eq!(
            tables.category_for_merchant("whole foods"),
            Some("groceries")
        );
    }

    #[test]
    fn normalize_key_collapses_whitespace_and_case() {
        assert_eq!(normalize_key("  Whole \t Foods  Market "), "whole foods market");
    }
}
