//! Remote rule sources.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::{RuleError, RuleResult};
use super::types::{NutrientLimit, RuleRecord};

const RULE_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
/// Supplies rule tables that extend the built-in set.
pub trait RuleSource: Send + Sync {
    async fn fetch_critical_rules(&self) -> RuleResult<Vec<RuleRecord>>;
    async fn fetch_nutrient_limits(&self) -> RuleResult<Vec<NutrientLimit>>;
    /// Extra alias groups. Sources without aliases keep the default.
    async fn fetch_aliases(&self) -> RuleResult<HashMap<String, Vec<String>>> {
        Ok(HashMap::new())
    }
}

/// JSON-over-HTTP rule source: `GET {base}/critical-rules` and `GET {base}/nutrient-limits`.
pub struct HttpRuleSource {
    base_url: String,
    http: HttpClient,
}

impl HttpRuleSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: HttpClient::builder()
                .timeout(RULE_SOURCE_TIMEOUT)
                .build()
                .unwrap_or_else(|_| HttpClient::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RuleResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Fetching rule table");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RuleError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RuleSource for HttpRuleSource {
    async fn fetch_critical_rules(&self) -> RuleResult<Vec<RuleRecord>> {
        self.get_json("critical-rules").await
    }

    async fn fetch_nutrient_limits(&self) -> RuleResult<Vec<NutrientLimit>> {
        self.get_json("nutrient-limits").await
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockRuleSource;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// In-memory rule source that counts fetches and can be told to fail.
    #[derive(Default)]
    pub struct MockRuleSource {
        pub rules: Vec<RuleRecord>,
        pub limits: Vec<NutrientLimit>,
        pub aliases: HashMap<String, Vec<String>>,
        failing: AtomicBool,
        fetches: AtomicUsize,
    }

    impl MockRuleSource {
        pub fn new(rules: Vec<RuleRecord>, limits: Vec<NutrientLimit>) -> Self {
            Self {
                rules,
                limits,
                ..Default::default()
            }
        }

        pub fn with_alias(mut self, canonical: &str, names: &[&str]) -> Self {
            self.aliases.insert(
                canonical.to_string(),
                names.iter().map(|n| n.to_string()).collect(),
            );
            self
        }

        pub fn failing() -> Self {
            let source = Self::default();
            source.failing.store(true, Ordering::SeqCst);
            source
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn check(&self) -> RuleResult<()> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(RuleError::Source {
                    reason: "mock rule source unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RuleSource for MockRuleSource {
        async fn fetch_critical_rules(&self) -> RuleResult<Vec<RuleRecord>> {
            self.check()?;
            Ok(self.rules.clone())
        }

        async fn fetch_nutrient_limits(&self) -> RuleResult<Vec<NutrientLimit>> {
            Ok(self.limits.clone())
        }

        async fn fetch_aliases(&self) -> RuleResult<HashMap<String, Vec<String>>> {
            Ok(self.aliases.clone())
        }
    }
}
