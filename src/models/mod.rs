// Models module
pub mod detector;
pub mod pricing;
pub mod record;

pub use detector::{CostEstimator, Detection, HostSignals, LlmDetector};
pub use pricing::{CostSavings, DEFAULT_MODEL, ModelPricing, PricingManager};
pub use record::{CompressionLevel, CompressionRecord};
