pub mod memory;
pub mod normalize;
pub mod provider;
pub mod types;

pub use memory::InMemorySearchProvider;
pub use normalize::{normalize_quotes, NormalizeConfig, Normalized};
pub use provider::{HttpJsonSearchProvider, SearchProvider};
pub use types::RawQuote;
