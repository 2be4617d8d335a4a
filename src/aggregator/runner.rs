//! The holdings aggregator run loop.

use super::state::ResolutionState;
use super::{AggregateError, AggregatorConfig, Collection, ResolveError};
use crate::chain::ChainError;
use crate::metadata::MetadataFetcher;
use crate::models::{HoldingKey, HoldingRecord, HoldingsView, RunSummary, TokenId};
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

/// How a single resolution task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Resolved,
    Duplicate,
    Failed,
}

/// Aggregates an owner's holdings across a fixed list of collections.
///
/// Each run owns a fresh [`ResolutionState`]. Starting a run swaps the
/// current state; a superseded run keeps writing into its own, now
/// unobserved, state.
pub struct HoldingsAggregator {
    config: AggregatorConfig,
    collections: Vec<Collection>,
    fetcher: Arc<dyn MetadataFetcher>,
    current: RwLock<Arc<ResolutionState>>,
    generation: AtomicU64,
    active: Mutex<Option<AbortHandle>>,
}

impl HoldingsAggregator {
    pub fn new(
        mut config: AggregatorConfig,
        collections: Vec<Collection>,
        fetcher: Arc<dyn MetadataFetcher>,
    ) -> Self {
        config.batch_size = config.batch_size.max(1);
        Self {
            config,
            collections,
            fetcher,
            current: RwLock::new(Arc::new(ResolutionState::new(0))),
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// State of the latest run.
    pub fn state(&self) -> Arc<ResolutionState> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Snapshot of the latest run.
    pub fn view(&self) -> HoldingsView {
        self.state().view()
    }

    /// Reset state and aggregate `owner`'s holdings to completion.
    #[allow(dead_code)]
    pub async fn run(&self, owner: &str) -> Result<RunSummary, AggregateError> {
        let state = self.begin_run(owner);
        self.drive(state, owner).await
    }

    /// Supersede any run started through `restart` and start a new one in
    /// the background.
    ///
    /// The new state is installed, already loading for a non-blank owner,
    /// before this returns, so [`view`] never shows the previous run
    /// afterwards.
    ///
    /// Installing the state and recording the abort handle happen under one
    /// lock, so the installed state always belongs to the run left active.
    ///
    /// [`view`]: HoldingsAggregator::view
    pub fn restart(
        self: &Arc<Self>,
        owner: impl Into<String>,
    ) -> JoinHandle<Result<RunSummary, AggregateError>> {
        let owner = owner.into();
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let state = self.begin_run(&owner);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.drive(state, &owner).await });

        if let Some(previous) = active.replace(handle.abort_handle()) {
            debug!("Cancelling superseded run");
            previous.abort();
        }
        handle
    }

    fn begin_run(&self, owner: &str) -> Arc<ResolutionState> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let state = Arc::new(ResolutionState::new(generation));
        state.set_loading(!owner.trim().is_empty());
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::clone(&state);
        state
    }

    async fn drive(
        &self,
        state: Arc<ResolutionState>,
        owner: &str,
    ) -> Result<RunSummary, AggregateError> {
        let mut summary = RunSummary::idle(state.generation());

        let owner = owner.trim();
        if owner.is_empty() {
            debug!("Run {}: no owner, nothing to do", state.generation());
            return Ok(summary);
        }

        state.set_loading(true);
        info!(
            "Run {}: scanning {} collections for {}",
            state.generation(),
            self.collections.len(),
            owner
        );

        let outcome = self.enumerate(&state, owner, &mut summary).await;
        summary.resolved = state.resolved_count();
        state.set_loading(false);

        match outcome {
            Ok(()) => {
                info!(
                    "Run {} complete: {} resolved, {} failed, {} duplicates",
                    summary.generation, summary.resolved, summary.failed, summary.duplicates
                );
                Ok(summary)
            }
            Err((collection, source)) => {
                let e = AggregateError::Count {
                    collection,
                    source,
                    summary: Box::new(summary),
                };
                error!("Run {} stopped: {}", state.generation(), e);
                Err(e)
            }
        }
    }

    async fn enumerate(
        &self,
        state: &ResolutionState,
        owner: &str,
        summary: &mut RunSummary,
    ) -> Result<(), (String, ChainError)> {
        let batch_size = self.config.batch_size as u64;

        for collection in &self.collections {
            let count = collection
                .reader
                .balance_of(owner)
                .await
                .map_err(|source| (collection.name.clone(), source))?;
            summary.collections_scanned += 1;
            summary.discovered += count;
            info!("{}: {} holdings", collection.name, count);

            let mut start = 0;
            while start < count {
                let end = (start + batch_size).min(count);
                debug!("{}: resolving indices {}..{}", collection.name, start, end);

                let tasks = (start..end)
                    .map(|index| self.resolve_holding(state, collection, owner, index));
                for outcome in join_all(tasks).await {
                    match outcome {
                        TaskOutcome::Resolved => {}
                        TaskOutcome::Duplicate => summary.duplicates += 1,
                        TaskOutcome::Failed => summary.failed += 1,
                    }
                }

                start = end;
            }
        }

        Ok(())
    }

    async fn resolve_holding(
        &self,
        state: &ResolutionState,
        collection: &Collection,
        owner: &str,
        index: u64,
    ) -> TaskOutcome {
        let token_id = match self
            .bounded(collection.reader.token_of_owner_by_index(owner, index))
            .await
        {
            Ok(token_id) => token_id,
            Err(e) => {
                warn!(
                    "{}: failed to read token at index {}: {}",
                    collection.name, index, e
                );
                return TaskOutcome::Failed;
            }
        };

        let key = HoldingKey::new(collection.name.clone(), token_id.clone());
        if !state.try_claim(&key) {
            debug!("{} already claimed, skipping", key);
            return TaskOutcome::Duplicate;
        }

        match self.load_record(collection, token_id).await {
            Ok(record) => {
                if state.append(record) {
                    debug!("Resolved {}", key);
                    TaskOutcome::Resolved
                } else {
                    TaskOutcome::Duplicate
                }
            }
            Err(e) => {
                warn!("Failed to resolve metadata for {}: {}", key, e);
                state.release(&key);
                TaskOutcome::Failed
            }
        }
    }

    async fn load_record(
        &self,
        collection: &Collection,
        token_id: TokenId,
    ) -> Result<HoldingRecord, ResolveError> {
        let metadata_uri = self.bounded(collection.reader.token_uri(&token_id)).await?;
        let metadata = self.bounded(self.fetcher.fetch(&metadata_uri)).await?;

        Ok(HoldingRecord {
            collection: collection.name.clone(),
            token_id,
            metadata_uri,
            metadata: Some(metadata),
        })
    }

    async fn bounded<T, E, F>(&self, step: F) -> Result<T, ResolveError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<ResolveError>,
    {
        match self.config.task_timeout {
            Some(limit) => tokio::time::timeout(limit, step)
                .await
                .map_err(|_| ResolveError::Timeout(limit))?
                .map_err(Into::into),
            None => step.await.map_err(Into::into),
        }
    }
}
