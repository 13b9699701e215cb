pub mod baseline;
pub mod classifier;
pub mod forecast;
pub mod insights;

pub use baseline::build_baseline;
pub use classifier::{classify, ClassifierConfig};
pub use forecast::{forecast, ForecastConfig};
pub use insights::{weekday_insight, WeekdayInsight};
