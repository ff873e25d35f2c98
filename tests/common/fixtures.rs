//! Test fixtures for integration tests.

use std::sync::Arc;

use stacksafe::cache::{CacheConfig, ResponseCache};
use stacksafe::domain::{Ingredient, Product, StackItem};
use stacksafe::router::{AnalysisPayload, MockAnalyzer, StaticNetworkStatus, TierRouter};
use stacksafe::rules::{RuleEvaluator, RuleRepository};

pub fn evaluator() -> RuleEvaluator {
    RuleEvaluator::new(Arc::new(RuleRepository::builtin()))
}

pub fn live_payload() -> AnalysisPayload {
    AnalysisPayload {
        summary: "No additional concerns beyond known rules".to_string(),
        recommendations: vec!["Review the stack with a pharmacist yearly".to_string()],
        confidence: Some(0.88),
        ..AnalysisPayload::default()
    }
}

pub fn router_with_cache(
    analyzer: Arc<MockAnalyzer>,
    cache: ResponseCache<AnalysisPayload>,
) -> TierRouter {
    TierRouter::new(evaluator(), cache, analyzer)
}

pub fn router(analyzer: Arc<MockAnalyzer>) -> TierRouter {
    router_with_cache(analyzer, ResponseCache::new(CacheConfig::default()))
}

pub fn offline_router(analyzer: Arc<MockAnalyzer>) -> TierRouter {
    router(analyzer).with_network(Arc::new(StaticNetworkStatus::new(true)))
}

pub fn iron_product() -> Product {
    Product::new("Iron 65mg")
}

pub fn calcium_stack() -> Vec<StackItem> {
    vec![StackItem::supplement("Calcium 500mg")]
}

pub fn vitamin_d_product(mcg: f64) -> Product {
    Product::new("Sunshine D").with_ingredient(Ingredient::with_amount("Vitamin D", mcg, "mcg"))
}

pub fn quiet_product() -> Product {
    Product::new("Vitamin C").with_brand("Acme")
}
