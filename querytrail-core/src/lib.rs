pub mod config;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod query;
pub mod source;
