//! Tier routing: rules first, then the response cache, then delegated analysis.
//!
//! [`TierRouter::analyze_product`] always evaluates the rule tier, short-circuits on
//! findings when speed is requested or the network is down, consults the cache unless a
//! refresh is forced, and only then calls the [`GenerativeAnalyzer`]. Analyzer failures
//! degrade to the rule result instead of failing the request.

pub mod error;
pub mod genai;
pub mod merge;
pub mod ports;
pub mod tier;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{AnalyzerError, RouterError, RouterResult};
pub use genai::{GenaiAnalyzer, parse_reply};
pub use merge::{ANALYSIS_KEY_PREFIX, analysis_key, analysis_tags, merge, payload_quality};
#[cfg(any(test, feature = "mock"))]
pub use ports::{MockAnalyzer, RecordingCostTracker};
pub use ports::{
    CostTracker, GenerativeAnalyzer, NetworkStatus, StaticNetworkStatus, TracingCostTracker,
};
pub use tier::{RouterConfig, TierRouter};
pub use types::{
    AnalysisPayload, AnalysisPriority, AnalyzeOptions, RouterStats, Tier, TierResult, TierUsage,
};
