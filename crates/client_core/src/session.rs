use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use shared::filter::{Filter, FilterValue, FilterWithValue};
use storage::{FilterValueStore, ValuesSnapshot};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use crate::{
    definitions::FilterSnapshot,
    error::SessionError,
    join::{join_filters, share_unchanged},
};

/// Published entries; each entry keeps its `Arc` across recomputations while
/// its value is unchanged.
pub type FilterView = Arc<Vec<Arc<FilterWithValue>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// At least one of the two sources has not published yet.
    Pending,
    Ready(FilterView),
    /// A persisted value did not match its filter's variant. Terminal.
    Failed(shared::FilterError),
}

impl ViewState {
    pub fn ready(&self) -> Option<&FilterView> {
        match self {
            ViewState::Ready(view) => Some(view),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ViewState::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ViewState::Pending)
    }
}

#[derive(Debug)]
pub struct SaveOutcome {
    pub key: String,
    pub result: anyhow::Result<()>,
}

/// Per-key result of [`FilterSession::save`].
#[derive(Debug, Default)]
pub struct SaveReport {
    pub outcomes: Vec<SaveOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveSummary {
    pub saved: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }

    pub fn saved_keys(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .map(|outcome| outcome.key.as_str())
            .collect()
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .map(|outcome| outcome.key.as_str())
            .collect()
    }

    pub fn summary(&self) -> SaveSummary {
        let mut summary = SaveSummary {
            saved: Vec::new(),
            failed: Vec::new(),
        };
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(()) => summary.saved.push(outcome.key.clone()),
                Err(err) => summary
                    .failed
                    .push((outcome.key.clone(), format!("{err:#}"))),
            }
        }
        summary
    }
}

/// Latest publication of each source, guarded together with the publish of
/// the joined view.
struct JoinState {
    filters: Option<Arc<Vec<Filter>>>,
    values: ValuesSnapshot,
    closed: bool,
}

/// Joins live filter definitions with live persisted values.
///
/// The view stays [`ViewState::Pending`] until both sources have published
/// at least once, then is recomputed on every publication of either source.
/// Recomputation, edits and teardown are serialized by one lock, so a
/// publication never starts a join while another is in flight.
pub struct FilterSession {
    store: Arc<dyn FilterValueStore>,
    state: Arc<Mutex<JoinState>>,
    view: Arc<watch::Sender<ViewState>>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FilterSession {
    pub fn spawn(
        filters: watch::Receiver<FilterSnapshot>,
        values: watch::Receiver<ValuesSnapshot>,
        store: Arc<dyn FilterValueStore>,
    ) -> Self {
        let state = Arc::new(Mutex::new(JoinState {
            filters: None,
            values: None,
            closed: false,
        }));
        let (view, _) = watch::channel(ViewState::Pending);
        let view = Arc::new(view);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_join(
            filters,
            values,
            Arc::clone(&state),
            Arc::clone(&view),
            shutdown_rx,
        ));

        Self {
            store,
            state,
            view,
            shutdown_tx,
            task,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    pub fn stream(&self) -> WatchStream<ViewState> {
        WatchStream::new(self.view.subscribe())
    }

    pub fn current(&self) -> ViewState {
        self.view.borrow().clone()
    }

    /// Waits until the view leaves [`ViewState::Pending`].
    pub async fn ready(&self) -> Result<FilterView, SessionError> {
        let mut rx = self.view.subscribe();
        let state = rx
            .wait_for(|state| !state.is_pending())
            .await
            .map_err(|_| SessionError::Closed)?
            .clone();
        match state {
            ViewState::Ready(view) => Ok(view),
            ViewState::Failed(err) => Err(err.into()),
            ViewState::Pending => Err(SessionError::NotReady),
        }
    }

    /// Replaces the in-memory value of the entry with the same key and
    /// republishes the view. Not persisted until [`FilterSession::save`];
    /// the next upstream publication recomputes from the sources.
    pub async fn update_value(&self, value: FilterValue) -> Result<(), SessionError> {
        let guard = self.state.lock().await;
        let current = match &*self.view.borrow() {
            ViewState::Ready(view) => Arc::clone(view),
            ViewState::Pending => return Err(SessionError::NotReady),
            ViewState::Failed(err) => return Err(err.clone().into()),
        };
        if guard.closed {
            return Err(SessionError::Closed);
        }

        let index = current
            .iter()
            .position(|entry| entry.key() == value.key())
            .ok_or_else(|| shared::FilterError::UnknownFilter {
                key: value.key().to_string(),
            })?;
        let updated = current[index].with_value(value)?;
        if *current[index] == updated {
            return Ok(());
        }

        let mut next = current.as_ref().clone();
        next[index] = Arc::new(updated);
        self.view.send_replace(ViewState::Ready(Arc::new(next)));
        drop(guard);
        Ok(())
    }

    /// Writes every entry of the current view to the store.
    ///
    /// Keys are written independently; one failed write does not stop the
    /// others.
    pub async fn save(&self) -> Result<SaveReport, SessionError> {
        let view = match &*self.view.borrow() {
            ViewState::Ready(view) => Arc::clone(view),
            ViewState::Pending => return Err(SessionError::NotReady),
            ViewState::Failed(err) => return Err(err.clone().into()),
        };

        let writes = view.iter().map(|entry| {
            let store = Arc::clone(&self.store);
            let value = entry.value();
            async move {
                let result = store.upsert_filter_value(&value).await;
                SaveOutcome {
                    key: value.key().to_string(),
                    result,
                }
            }
        });
        let report = SaveReport {
            outcomes: join_all(writes).await,
        };

        for outcome in &report.outcomes {
            if let Err(err) = &outcome.result {
                warn!("filter session: failed to save {}: {err:#}", outcome.key);
            }
        }
        info!(
            "filter session: saved {}/{} filter values",
            report.saved_keys().len(),
            report.outcomes.len()
        );
        Ok(report)
    }

    /// Releases both source subscriptions. No recomputation happens afterwards.
    pub async fn shutdown(&self) {
        let mut guard = self.state.lock().await;
        guard.closed = true;
        drop(guard);
        let _ = self.shutdown_tx.send(true);
        self.task.abort();
        debug!("filter session: shut down");
    }
}

impl Drop for FilterSession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.task.abort();
    }
}

async fn run_join(
    mut filters_rx: watch::Receiver<FilterSnapshot>,
    mut values_rx: watch::Receiver<ValuesSnapshot>,
    state: Arc<Mutex<JoinState>>,
    view: Arc<watch::Sender<ViewState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut filters_open = true;
    let mut values_open = true;
    let mut published = true;

    loop {
        if published {
            let mut guard = state.lock().await;
            if guard.closed {
                break;
            }
            // sources only ever move from None to Some
            let filters = filters_rx.borrow_and_update().clone();
            let values = values_rx.borrow_and_update().clone();
            if filters.is_some() {
                guard.filters = filters;
            }
            if values.is_some() {
                guard.values = values;
            }
            if let Err(err) = recompute(&guard, &view) {
                error!("filter session: {err}; view is no longer updated");
                guard.closed = true;
                view.send_replace(ViewState::Failed(err));
                break;
            }
        }

        if !filters_open && !values_open {
            debug!("filter session: both sources closed");
            break;
        }

        // a closed source wakes the loop without new input
        published = tokio::select! {
            _ = shutdown_rx.changed() => break,
            changed = filters_rx.changed(), if filters_open => {
                if changed.is_err() {
                    debug!("filter session: filter source closed");
                    filters_open = false;
                }
                changed.is_ok()
            }
            changed = values_rx.changed(), if values_open => {
                if changed.is_err() {
                    debug!("filter session: value source closed");
                    values_open = false;
                }
                changed.is_ok()
            }
        };
    }
}

fn recompute(
    state: &JoinState,
    view: &watch::Sender<ViewState>,
) -> Result<(), shared::FilterError> {
    let (Some(filters), Some(values)) = (&state.filters, &state.values) else {
        return Ok(());
    };

    let joined = join_filters(filters, values)?;
    let previous = view.borrow().ready().cloned();
    let entries = match previous {
        Some(previous) => share_unchanged(&previous, joined),
        None => share_unchanged(&[], joined),
    };
    debug!("filter session: published {} entries", entries.len());
    view.send_replace(ViewState::Ready(Arc::new(entries)));
    Ok(())
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
