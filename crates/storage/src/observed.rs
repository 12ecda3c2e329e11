use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::filter::FilterValue;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::FilterValueStore;

/// `None` until the first successful read of the store.
pub type ValuesSnapshot = Option<Arc<Vec<FilterValue>>>;

/// Observable "all current values" view over a [`FilterValueStore`].
///
/// Every successful write republishes the store contents. A failed read keeps
/// the previous publication in place. Refreshes are serialized, so a read
/// never publishes over the result of a read that started after it.
pub struct ObservedValues<S> {
    store: S,
    tx: watch::Sender<ValuesSnapshot>,
    refresh_lock: Mutex<()>,
}

impl<S: FilterValueStore> ObservedValues<S> {
    pub fn new(store: S) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            store,
            tx,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<ValuesSnapshot> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> ValuesSnapshot {
        self.tx.borrow().clone()
    }

    /// Re-reads the store and publishes the result if it differs from the
    /// current publication.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        let values = match self.store.load_filter_values().await {
            Ok(values) => values,
            Err(err) => {
                warn!("filter values: store read failed, keeping last snapshot: {err:#}");
                return Err(err);
            }
        };

        let published = self.tx.send_if_modified(|current| {
            if current.as_deref() == Some(&values) {
                return false;
            }
            *current = Some(Arc::new(values));
            true
        });
        if published {
            debug!("filter values: published new snapshot");
        }
        Ok(())
    }
}

#[async_trait]
impl<S: FilterValueStore> FilterValueStore for ObservedValues<S> {
    async fn load_filter_values(&self) -> Result<Vec<FilterValue>> {
        self.store.load_filter_values().await
    }

    async fn upsert_filter_value(&self, value: &FilterValue) -> Result<()> {
        self.store.upsert_filter_value(value).await?;
        // the write itself succeeded; a failed re-read only delays the republish
        let _ = self.refresh().await;
        Ok(())
    }
}
