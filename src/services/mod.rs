pub mod content;
pub mod distribution;

pub use content::{ContentService, SaveRequest};
pub use distribution::{AnnotatedItem, DistributionService, PublishOutcome, PublishRequest};
