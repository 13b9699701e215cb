pub mod baseline;
pub mod forecast;
pub mod history;
pub mod query;
pub mod quote;
pub mod recommendation;
pub mod route;
