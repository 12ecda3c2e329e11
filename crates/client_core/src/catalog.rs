use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{domain::Plug, protocol::PlugListResponse};
use storage::PlugStore;
use tokio::sync::watch;
use tracing::{info, warn};
use url::Url;

const PLUG_LIST_PATH: &str = "chargepoints/pluglist/";

/// `None` until a plug list has been published once.
pub type PlugSnapshot = Option<Arc<Vec<Plug>>>;

/// Remote source of selectable plug types.
#[async_trait]
pub trait PlugCatalog: Send + Sync {
    async fn fetch_plugs(&self) -> Result<Vec<Plug>>;
}

#[async_trait]
impl<C: PlugCatalog + ?Sized> PlugCatalog for Arc<C> {
    async fn fetch_plugs(&self) -> Result<Vec<Plug>> {
        (**self).fetch_plugs().await
    }
}

pub struct HttpPlugCatalog {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpPlugCatalog {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url =
            Url::parse(&base_url).with_context(|| format!("invalid catalog url: {base_url}"))?;
        Ok(Self {
            http: Client::new(),
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl PlugCatalog for HttpPlugCatalog {
    async fn fetch_plugs(&self) -> Result<Vec<Plug>> {
        let url = self.base_url.join(PLUG_LIST_PATH)?;
        let mut request = self.http.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        let response: PlugListResponse = request
            .send()
            .await
            .with_context(|| format!("failed to request plug list from {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("failed to decode plug list")?;
        if !response.is_ok() {
            return Err(anyhow!("plug list request returned status {}", response.status));
        }
        Ok(response.into_plugs())
    }
}

/// Fixed plug list, for offline use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPlugCatalog {
    plugs: Vec<Plug>,
}

impl StaticPlugCatalog {
    pub fn new(plugs: Vec<Plug>) -> Self {
        Self { plugs }
    }

    pub fn from_names<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self::new(names.into_iter().map(Plug::new).collect())
    }
}

#[async_trait]
impl PlugCatalog for StaticPlugCatalog {
    async fn fetch_plugs(&self) -> Result<Vec<Plug>> {
        Ok(self.plugs.clone())
    }
}

/// Observable plug list backed by a local cache and a remote catalog.
pub struct PlugRepository {
    catalog: Arc<dyn PlugCatalog>,
    cache: Arc<dyn PlugStore>,
    tx: watch::Sender<PlugSnapshot>,
}

impl PlugRepository {
    pub fn new(catalog: Arc<dyn PlugCatalog>, cache: Arc<dyn PlugStore>) -> Self {
        let (tx, _) = watch::channel(None);
        Self { catalog, cache, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlugSnapshot> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> PlugSnapshot {
        self.tx.borrow().clone()
    }

    /// Publishes the cached plug list, if the cache holds one.
    pub async fn load_cached(&self) -> Result<bool> {
        let plugs = self.cache.load_plugs().await?;
        if plugs.is_empty() {
            return Ok(false);
        }
        info!("plug catalog: publishing {} cached plugs", plugs.len());
        self.publish(plugs);
        Ok(true)
    }

    /// Fetches the remote list, updates the cache and republishes.
    ///
    /// On failure the previously published list stays in place.
    pub async fn refresh(&self) -> Result<()> {
        let plugs = match self.catalog.fetch_plugs().await {
            Ok(plugs) => plugs,
            Err(err) => {
                warn!("plug catalog: fetch failed, keeping last list: {err:#}");
                return Err(err);
            }
        };
        if let Err(err) = self.cache.replace_plugs(&plugs).await {
            warn!("plug catalog: failed to cache fetched plugs: {err:#}");
        }
        info!("plug catalog: fetched {} plugs", plugs.len());
        self.publish(plugs);
        Ok(())
    }

    fn publish(&self, plugs: Vec<Plug>) {
        self.tx.send_replace(Some(Arc::new(plugs)));
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
