//! Holdings aggregation.
//!
//! Enumerates an owner's tokens across the configured collections, resolves
//! each token's metadata in fixed-size concurrent batches, and accumulates
//! de-duplicated records into per-run state.

pub mod runner;
pub mod state;

pub use runner::HoldingsAggregator;
pub use state::ResolutionState;

use crate::chain::{ChainError, CollectionReader};
use crate::metadata::FetchError;
use crate::models::RunSummary;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default number of holdings resolved concurrently.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// A collection together with the capability used to query it.
#[derive(Clone)]
pub struct Collection {
    pub name: String,
    pub address: String,
    pub reader: Arc<dyn CollectionReader>,
}

impl Collection {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        reader: Arc<dyn CollectionReader>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            reader,
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Configuration for the aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Tasks started together; the next batch waits for all of them.
    pub batch_size: usize,
    /// Upper bound for each remote step of a task (id lookup, uri lookup,
    /// metadata fetch), applied separately. `None` waits indefinitely.
    pub task_timeout: Option<Duration>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            task_timeout: None,
        }
    }
}

/// Failure to resolve one holding. Never aborts the run.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Run-level failure. Carries the statistics gathered before the run stopped.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("failed to read holding count for {collection}: {source}")]
    Count {
        collection: String,
        #[source]
        source: ChainError,
        summary: Box<RunSummary>,
    },
}

impl AggregateError {
    /// Partial statistics of the stopped run.
    pub fn summary(&self) -> &RunSummary {
        match self {
            AggregateError::Count { summary, .. } => summary,
        }
    }
}
