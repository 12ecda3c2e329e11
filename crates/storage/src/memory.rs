use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use shared::{domain::Plug, filter::FilterValue};
use tokio::sync::RwLock;

use crate::{FilterValueStore, PlugStore};

/// Process-local store, handy for tests and for running without a database.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: Arc<RwLock<BTreeMap<String, FilterValue>>>,
    plugs: Arc<RwLock<Vec<Plug>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: impl IntoIterator<Item = FilterValue>) -> Self {
        let values = values
            .into_iter()
            .map(|value| (value.key().to_string(), value))
            .collect();
        Self {
            values: Arc::new(RwLock::new(values)),
            plugs: Arc::default(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<FilterValue> {
        self.values.read().await.get(key).cloned()
    }

    pub async fn remove(&self, key: &str) -> Option<FilterValue> {
        self.values.write().await.remove(key)
    }
}

#[async_trait]
impl FilterValueStore for MemoryStore {
    async fn load_filter_values(&self) -> Result<Vec<FilterValue>> {
        Ok(self.values.read().await.values().cloned().collect())
    }

    async fn upsert_filter_value(&self, value: &FilterValue) -> Result<()> {
        self.values
            .write()
            .await
            .insert(value.key().to_string(), value.clone());
        Ok(())
    }
}

#[async_trait]
impl PlugStore for MemoryStore {
    async fn load_plugs(&self) -> Result<Vec<Plug>> {
        Ok(self.plugs.read().await.clone())
    }

    async fn replace_plugs(&self, plugs: &[Plug]) -> Result<()> {
        *self.plugs.write().await = plugs.to_vec();
        Ok(())
    }
}
