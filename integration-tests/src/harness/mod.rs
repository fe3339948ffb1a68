pub mod lines;
pub mod server;
pub mod tracing;

pub use server::{TestExporter, sample};
pub use tracing::{CapturedEvent, init_test_tracing};
