use crate::config::Settings;
use crate::domain::catalog::{Catalog, CatalogDraft};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/card_catalog";
const DEFAULT_RETRIES: u32 = 3;

/// Source of an already-parsed card catalog. Scraping and caching live
/// behind this boundary; the engine only ever sees validated catalogs.
#[async_trait::async_trait]
pub trait CardCatalogProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Returns the validated catalog together with the raw feed payload
    /// (persisted alongside the snapshot for diagnostics).
    async fn fetch_catalog(&self) -> Result<(Catalog, Value)>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonCatalogProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonCatalogProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_card_feed_base_url()?.to_string();
        let api_key = settings.card_feed_api_key.clone();

        let timeout_secs = std::env::var("CARD_FEED_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("CARD_FEED_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let path = std::env::var("CARD_FEED_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build card feed http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self) -> Result<(Catalog, Value)> {
        let url = self.url();
        let headers = self.headers()?;

        let res = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .context("card feed request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read feed response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("feed response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("card feed HTTP {status}: {raw_json}");
        }

        let draft = serde_json::from_value::<CatalogDraft>(raw_json.clone())
            .context("failed to parse feed response into CatalogDraft")?;
        let catalog = validate_feed_catalog(draft)?;
        Ok((catalog, raw_json))
    }
}

#[async_trait::async_trait]
impl CardCatalogProvider for HttpJsonCatalogProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_catalog(&self) -> Result<(Catalog, Value)> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(out) => return Ok(out),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "card feed fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// A refresh that would replace a working snapshot with an empty catalog is
/// treated as a bad feed, even though an empty catalog is valid engine
/// input.
fn validate_feed_catalog(draft: CatalogDraft) -> Result<Catalog> {
    let catalog = draft.validate_and_into_catalog()?;
    anyhow::ensure!(
        !catalog.cards.is_empty(),
        "card feed returned no cards"
    );
    anyhow::ensure!(
        catalog.rule_count() > 0,
        "card feed returned no earning rules"
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed_payload() -> Value {
        json!({
            "programs": [
                {"id": "cash", "name": "Direct Cashback", "unit": "cashback", "cents_per_unit": 1.0}
            ],
            "cards": [
                {
                    "id": "acme_everyday",
                    "name": "Acme Everyday",
                    "issuer": "Acme Bank",
                    "network": "visa",
                    "annual_fee": 0.0,
                    "program_id": "cash",
                    "base_multiplier": 1.0
                }
            ],
            "rules": [
                {
                    "card_id": "acme_everyday",
                    "category": "groceries",
                    "multiplier": 3.0,
                    "cap": {"amount": 1500.0, "period": "quarter"}
                },
                {"card_id": "acme_everyday", "category": null, "multiplier": 1.0, "cap": null}
            ]
        })
    }

    #[test]
    fn parses_and_validates_expected_feed_shape() {
        let draft: CatalogDraft = serde_json::from_value(feed_payload()).unwrap();
        let catalog = validate_feed_catalog(draft).unwrap();
        assert_eq!(catalog.cards.len(), 1);
        assert_eq!(catalog.rules_for("acme_everyday").len(), 2);
        // rotating defaults to false when the feed omits it.
        assert!(!catalog.rules_for("acme_everyday")[0].rotating);
    }

    #[test]
    fn rejects_feed_with_invalid_cap() {
        let mut payload = feed_payload();
        payload["rules"][0]["cap"]["amount"] = json!(0.0);
        let draft: CatalogDraft = serde_json::from_value(payload).unwrap();
        assert!(validate_feed_catalog(draft).is_err());
    }

    #[test]
    fn rejects_feed_with_unknown_unit_via_deserialize() {
        let mut payload = feed_payload();
        payload["programs"][0]["unit"] = json!("stamps");
        assert!(serde_json::from_value::<CatalogDraft>(payload).is_err());
    }

    #[test]
    fn rejects_empty_feed() {
        let payload = json!({"programs": [], "cards": [], "rules": []});
        let draft: CatalogDraft = serde_json::from_value(payload).unwrap();
        assert!(validate_feed_catalog(draft).is_err());
    }
}
