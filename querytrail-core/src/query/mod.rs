//! Query lifecycle correlation.
//!
//! A server query is described by several lines that share its id:
//!
//! raw line
//! PatternLibrary::classify -> RawEvent
//! decode -> typed fields
//! Correlator -> CorrelationStore + MetricsSink
//! caller (evicts fully described records)

mod correlator;
pub mod decode;
pub mod patterns;
mod statement;
mod store;
#[cfg(test)]
pub(crate) mod tests;
mod types;

pub use correlator::{
    Correlator, DUPLICATED_ERROR_EVENT, DUPLICATED_INITIAL_QUERY, DUPLICATED_MEMORY_EVENT,
    DUPLICATED_STATS_EVENT, NOT_FOUND_QUERY,
};
pub use decode::{DecodeError, DecodeKind};
pub use patterns::{PatternLibrary, RawEvent, RegexPatterns};
pub use statement::StatementKind;
pub use store::CorrelationStore;
pub use types::{
    FailedEvent, MemoryPeakEvent, QueryEvent, QueryFailure, QueryRecord, QueryState,
    StartedEvent, StatsEvent,
};
