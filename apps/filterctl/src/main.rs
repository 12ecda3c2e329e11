use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    FilterController, FilterView, HttpPlugCatalog, PlugCatalog, SaveReport, StaticPlugCatalog,
};
use serde_json::{json, Value};
use shared::filter::{
    BooleanFilterValue, FilterValue, FilterWithValue, MultipleChoiceFilterValue,
    SliderFilterValue,
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, normalize_database_url, Settings, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(about = "Inspect and edit persisted charging-station search filters")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    database_url: Option<String>,
    /// Use the configured offline plug list instead of the remote catalog.
    #[arg(long)]
    offline: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every filter with its current value.
    Show,
    /// Print every persisted value, including orphans.
    Stored,
    /// Print the plug list the connector filter is built from.
    Plugs,
    SetBool {
        key: String,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
    /// Set a slider by step index, or by domain value with --value.
    SetSlider {
        key: String,
        #[arg(conflicts_with = "value", required_unless_present = "value")]
        step: Option<u32>,
        #[arg(long, allow_negative_numbers = true)]
        value: Option<i64>,
    },
    SetChoices {
        key: String,
        ids: Vec<String>,
        /// Allow every option regardless of the listed ids.
        #[arg(long)]
        all: bool,
    },
    /// Delete every persisted value so all filters fall back to defaults.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    if let Some(url) = &cli.database_url {
        settings.database_url = normalize_database_url(url);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let storage = Arc::new(
        Storage::new(&settings.database_url)
            .await
            .with_context(|| format!("failed to open {}", settings.database_url))?,
    );

    if let Command::Reset = cli.command {
        let removed = storage.clear_filter_values().await?;
        println!("{}", json!({ "removed": removed }));
        return Ok(());
    }

    let catalog = build_catalog(&settings, cli.offline)?;
    let controller = FilterController::start(catalog, storage.clone(), storage.clone()).await;
    let view = tokio::time::timeout(settings.ready_timeout(), controller.session().ready())
        .await
        .map_err(|_| anyhow!("filter view unavailable: no plug list could be loaded"))??;

    match cli.command {
        Command::Show => {
            for entry in view.iter() {
                println!("{}", describe(entry));
            }
        }
        Command::Stored => {
            let known: BTreeSet<&str> = view.iter().map(|entry| entry.key()).collect();
            for stored in storage.list_stored_filter_values().await? {
                let key = stored.value.key();
                println!(
                    "{}",
                    json!({
                        "key": key,
                        "value": &stored.value,
                        "updated_at": stored.updated_at,
                        "orphan": !known.contains(key),
                    })
                );
            }
        }
        Command::Plugs => {
            let plugs = controller.plugs().latest().unwrap_or_default();
            for plug in plugs.iter() {
                println!("{}", plug.name);
            }
        }
        Command::SetBool { key, value } => {
            let edit = FilterValue::Boolean(BooleanFilterValue { key, value });
            apply_and_save(&controller, edit).await?;
        }
        Command::SetSlider { key, step, value } => {
            let step = slider_step(&view, &key, step, value)?;
            let edit = FilterValue::Slider(SliderFilterValue { key, value: step });
            apply_and_save(&controller, edit).await?;
        }
        Command::SetChoices { key, ids, all } => {
            let edit = FilterValue::MultipleChoice(MultipleChoiceFilterValue {
                key,
                values: ids.into_iter().collect(),
                all,
            });
            apply_and_save(&controller, edit).await?;
        }
        Command::Reset => unreachable!("handled before the controller starts"),
    }

    controller.shutdown().await;
    Ok(())
}

fn build_catalog(settings: &Settings, offline: bool) -> Result<Arc<dyn PlugCatalog>> {
    match (&settings.catalog_url, offline) {
        (Some(url), false) => {
            info!("using remote plug catalog at {url}");
            Ok(Arc::new(HttpPlugCatalog::new(
                url,
                settings.catalog_api_key.clone(),
            )?))
        }
        _ => Ok(Arc::new(StaticPlugCatalog::from_names(
            settings.offline_plugs.iter().cloned(),
        ))),
    }
}

fn slider_step(
    view: &FilterView,
    key: &str,
    step: Option<u32>,
    value: Option<i64>,
) -> Result<u32> {
    let entry = view
        .iter()
        .find(|entry| entry.key() == key)
        .ok_or_else(|| anyhow!("no filter with key {key}"))?;
    let FilterWithValue::Slider { filter, .. } = entry.as_ref() else {
        bail!("filter {key} is a {} filter, not a slider", entry.kind());
    };
    let step = match (step, value) {
        (Some(step), _) => step,
        (None, Some(value)) => filter.inverse_mapping(value),
        (None, None) => bail!("either a step index or --value is required"),
    };
    if step > filter.max {
        bail!("step {step} is beyond the slider maximum {}", filter.max);
    }
    Ok(step)
}

async fn apply_and_save(controller: &FilterController, edit: FilterValue) -> Result<()> {
    controller.session().update_value(edit).await?;
    let report = controller.save().await?;
    print_report(&report)?;
    if !report.is_complete() {
        bail!("failed to save: {}", report.failed_keys().join(", "));
    }
    Ok(())
}

fn print_report(report: &SaveReport) -> Result<()> {
    println!("{}", serde_json::to_string(&report.summary())?);
    Ok(())
}

fn describe(entry: &FilterWithValue) -> Value {
    let mut line = json!({
        "key": entry.key(),
        "name": entry.name(),
        "kind": entry.kind(),
        "value": entry.value(),
    });
    match entry {
        FilterWithValue::Slider { filter, value } => {
            line["max"] = json!(filter.max);
            line["mapped"] = json!(filter.mapping(value.value));
            if let Some(unit) = &filter.unit {
                line["unit"] = json!(unit);
            }
        }
        FilterWithValue::MultipleChoice { filter, value } => {
            line["choices"] = json!(filter.choices);
            line["common_choices"] = json!(filter.common_choices);
            line["effective"] = json!(filter
                .choices
                .keys()
                .filter(|id| value.allows(id))
                .collect::<Vec<_>>());
        }
        FilterWithValue::Boolean { .. } => {}
    }
    line
}
