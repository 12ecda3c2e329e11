use std::sync::Arc;

use anyhow::Result;
use storage::{FilterValueStore, ObservedValues, PlugStore};
use tracing::{debug, warn};

pub mod catalog;
pub mod definitions;
pub mod error;
pub mod join;
pub mod list_diff;
pub mod session;

pub use catalog::{HttpPlugCatalog, PlugCatalog, PlugRepository, StaticPlugCatalog};
pub use definitions::{build_filters, FilterDefinitions};
pub use error::SessionError;
pub use join::join_filters;
pub use session::{FilterSession, FilterView, SaveReport, ViewState};

/// Wires catalog, definitions, persisted values and the joined view together.
pub struct FilterController {
    plugs: PlugRepository,
    definitions: FilterDefinitions,
    values: Arc<ObservedValues<Arc<dyn FilterValueStore>>>,
    session: FilterSession,
}

impl FilterController {
    /// Starts the pipeline and performs the initial reads.
    ///
    /// Failed reads are logged; the view stays pending until both the plug
    /// list and the stored values have been read once.
    pub async fn start(
        catalog: Arc<dyn PlugCatalog>,
        plug_cache: Arc<dyn PlugStore>,
        store: Arc<dyn FilterValueStore>,
    ) -> Self {
        let plugs = PlugRepository::new(catalog, plug_cache);
        let definitions = FilterDefinitions::spawn(plugs.subscribe());
        let values = Arc::new(ObservedValues::new(store));
        let session = FilterSession::spawn(
            definitions.subscribe(),
            values.subscribe(),
            values.clone(),
        );

        if let Err(err) = plugs.load_cached().await {
            warn!("filter controller: plug cache unreadable: {err:#}");
        }
        if let Err(err) = values.refresh().await {
            debug!("filter controller: initial value read failed: {err:#}");
        }
        if let Err(err) = plugs.refresh().await {
            debug!("filter controller: initial catalog fetch failed: {err:#}");
        }

        Self {
            plugs,
            definitions,
            values,
            session,
        }
    }

    pub fn session(&self) -> &FilterSession {
        &self.session
    }

    pub fn definitions(&self) -> &FilterDefinitions {
        &self.definitions
    }

    pub fn plugs(&self) -> &PlugRepository {
        &self.plugs
    }

    pub async fn refresh_catalog(&self) -> Result<()> {
        self.plugs.refresh().await
    }

    pub async fn refresh_values(&self) -> Result<()> {
        self.values.refresh().await
    }

    pub async fn save(&self) -> std::result::Result<SaveReport, SessionError> {
        self.session.save().await
    }

    pub async fn shutdown(&self) {
        self.session.shutdown().await;
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
