use std::{collections::BTreeSet, sync::Arc};

use indexmap::IndexMap;
use shared::{
    domain::{plug_ids, Plug},
    filter::{BooleanFilter, Filter, MultipleChoiceFilter, SliderFilter},
    steps::PowerStepMap,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info};

use crate::catalog::PlugSnapshot;

pub const FREE_CHARGING_KEY: &str = "freecharging";
pub const FREE_PARKING_KEY: &str = "freeparking";
pub const MIN_POWER_KEY: &str = "min_power";
pub const CONNECTORS_KEY: &str = "connectors";
pub const MIN_CONNECTORS_KEY: &str = "min_connectors";

const MAX_MIN_CONNECTORS: u32 = 10;

/// `None` until the plug list has been published once.
pub type FilterSnapshot = Option<Arc<Vec<Filter>>>;

const PLUG_LABELS: [(&str, &str); 9] = [
    (plug_ids::TYPE_1, "Type 1"),
    (plug_ids::TYPE_2, "Type 2"),
    (plug_ids::TYPE_3, "Type 3"),
    (plug_ids::CCS, "CCS"),
    (plug_ids::SCHUKO, "Schuko"),
    (plug_ids::CHADEMO, "CHAdeMO"),
    (plug_ids::SUPERCHARGER, "Tesla Supercharger"),
    (plug_ids::CEE_BLAU, "CEE blue"),
    (plug_ids::CEE_ROT, "CEE red"),
];

/// Display label for a plug, falling back to the raw catalog name.
pub fn plug_label(name: &str) -> &str {
    PLUG_LABELS
        .iter()
        .find(|(id, _)| *id == name)
        .map(|(_, label)| *label)
        .unwrap_or(name)
}

/// The complete filter definition set for a plug list.
///
/// Pure: the same plugs always produce an equal definition set.
pub fn build_filters(plugs: &[Plug]) -> Vec<Filter> {
    let choices: IndexMap<String, String> = plugs
        .iter()
        .map(|plug| (plug.name.clone(), plug_label(&plug.name).to_string()))
        .collect();

    vec![
        BooleanFilter::new("Free charging", FREE_CHARGING_KEY).into(),
        BooleanFilter::new("Free parking", FREE_PARKING_KEY).into(),
        SliderFilter::stepped(
            "Minimum power",
            MIN_POWER_KEY,
            PowerStepMap::charging_power(),
            Some("kW".to_string()),
        )
        .into(),
        MultipleChoiceFilter {
            name: "Connectors".to_string(),
            key: CONNECTORS_KEY.to_string(),
            choices,
            common_choices: Some(BTreeSet::from([
                plug_ids::TYPE_2.to_string(),
                plug_ids::CCS.to_string(),
                plug_ids::CHADEMO.to_string(),
            ])),
        }
        .into(),
        SliderFilter::counting(
            "Minimum number of connectors",
            MIN_CONNECTORS_KEY,
            MAX_MIN_CONNECTORS,
        )
        .into(),
    ]
}

/// Republishes a fresh definition set on every plug list publication.
pub struct FilterDefinitions {
    rx: watch::Receiver<FilterSnapshot>,
    task: JoinHandle<()>,
}

impl FilterDefinitions {
    pub fn spawn(mut plugs: watch::Receiver<PlugSnapshot>) -> Self {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            loop {
                let snapshot = plugs.borrow_and_update().clone();
                if let Some(plugs) = snapshot {
                    let filters = build_filters(&plugs);
                    debug!("filter definitions: rebuilt {} filters", filters.len());
                    tx.send_replace(Some(Arc::new(filters)));
                }
                if plugs.changed().await.is_err() {
                    info!("filter definitions: plug source closed");
                    break;
                }
            }
        });
        Self { rx, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterSnapshot> {
        self.rx.clone()
    }

    pub fn latest(&self) -> FilterSnapshot {
        self.rx.borrow().clone()
    }
}

impl Drop for FilterDefinitions {
    fn drop(&mut self) {
        self.task.abort();
    }
}
