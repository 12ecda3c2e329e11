use super::*;
use shared::filter::{BooleanFilterValue, MultipleChoiceFilterValue, SliderFilterValue};
use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

fn free_charging(value: bool) -> FilterValue {
    FilterValue::Boolean(BooleanFilterValue {
        key: "freecharging".into(),
        value,
    })
}

fn min_power(step: u32) -> FilterValue {
    FilterValue::Slider(SliderFilterValue {
        key: "min_power".into(),
        value: step,
    })
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("filters.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn upsert_replaces_value_by_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .upsert_filter_value(&free_charging(false))
        .await
        .expect("insert");
    storage
        .upsert_filter_value(&free_charging(true))
        .await
        .expect("update");
    storage
        .upsert_filter_value(&min_power(4))
        .await
        .expect("insert slider");

    let values = storage.load_filter_values().await.expect("load");
    assert_eq!(values, vec![free_charging(true), min_power(4)]);
}

#[tokio::test]
async fn multiple_choice_values_survive_storage() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let value = FilterValue::MultipleChoice(MultipleChoiceFilterValue {
        key: "connectors".into(),
        values: BTreeSet::from(["CCS".to_string(), "Typ2".to_string()]),
        all: false,
    });
    storage.upsert_filter_value(&value).await.expect("insert");

    let stored = storage.list_stored_filter_values().await.expect("list");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].value, value);
}

#[tokio::test]
async fn delete_and_clear_filter_values() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .upsert_filter_value(&free_charging(true))
        .await
        .expect("insert");
    storage
        .upsert_filter_value(&min_power(2))
        .await
        .expect("insert");

    assert!(storage
        .delete_filter_value("freecharging")
        .await
        .expect("delete"));
    assert!(!storage
        .delete_filter_value("freecharging")
        .await
        .expect("delete again"));
    assert_eq!(storage.clear_filter_values().await.expect("clear"), 1);
    assert!(storage.load_filter_values().await.expect("load").is_empty());
}

#[tokio::test]
async fn corrupt_payload_fails_the_read() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    sqlx::query(
        "INSERT INTO filter_values (key, kind, payload, updated_at) VALUES ('broken', 'slider', '{not json', ?)",
    )
    .bind(Utc::now())
    .execute(storage.pool())
    .await
    .expect("raw insert");

    let err = storage.load_filter_values().await.expect_err("corrupt row");
    assert!(format!("{err:#}").contains("broken"));
}

#[tokio::test]
async fn replaces_cached_plugs_in_order() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .replace_plugs(&[Plug::new("Typ2"), Plug::new("CCS")])
        .await
        .expect("first");
    storage
        .replace_plugs(&[Plug::new("CHAdeMO"), Plug::new("Typ2"), Plug::new("Typ2")])
        .await
        .expect("second");

    let plugs = storage.load_plugs().await.expect("load");
    assert_eq!(plugs, vec![Plug::new("CHAdeMO"), Plug::new("Typ2")]);
}

#[tokio::test]
async fn observed_values_publish_after_first_refresh() {
    let observed = ObservedValues::new(MemoryStore::with_values([min_power(3)]));
    let mut rx = observed.subscribe();
    assert!(rx.borrow().is_none());

    observed.refresh().await.expect("refresh");
    assert!(rx.has_changed().expect("sender alive"));
    let snapshot = rx.borrow_and_update().clone().expect("published");
    assert_eq!(*snapshot, vec![min_power(3)]);
}

#[tokio::test]
async fn observed_values_republish_on_write_only_when_changed() {
    let observed = ObservedValues::new(MemoryStore::new());
    observed.refresh().await.expect("refresh");
    let mut rx = observed.subscribe();

    observed
        .upsert_filter_value(&free_charging(true))
        .await
        .expect("write");
    assert!(rx.has_changed().expect("sender alive"));
    rx.borrow_and_update();

    observed
        .upsert_filter_value(&free_charging(true))
        .await
        .expect("same write");
    assert!(!rx.has_changed().expect("sender alive"));
    assert_eq!(
        observed.latest().expect("snapshot").as_slice(),
        &[free_charging(true)]
    );
}

struct FailingReads;

#[async_trait]
impl FilterValueStore for FailingReads {
    async fn load_filter_values(&self) -> Result<Vec<FilterValue>> {
        anyhow::bail!("disk unplugged")
    }

    async fn upsert_filter_value(&self, _value: &FilterValue) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn failed_refresh_keeps_nothing_published() {
    let observed = ObservedValues::new(FailingReads);
    assert!(observed.refresh().await.is_err());
    assert!(observed.latest().is_none());
    observed
        .upsert_filter_value(&free_charging(true))
        .await
        .expect("write still succeeds");
    assert!(observed.latest().is_none());
}

/// Holds its first read back after taking the snapshot, so that read
/// finishes after later ones.
#[derive(Default)]
struct SlowFirstRead {
    inner: MemoryStore,
    delayed: AtomicBool,
}

#[async_trait]
impl FilterValueStore for SlowFirstRead {
    async fn load_filter_values(&self) -> Result<Vec<FilterValue>> {
        let values = self.inner.load_filter_values().await?;
        if !self.delayed.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(values)
    }

    async fn upsert_filter_value(&self, value: &FilterValue) -> Result<()> {
        self.inner.upsert_filter_value(value).await
    }
}

#[tokio::test]
async fn concurrent_writes_publish_the_newest_store_contents() {
    let observed = ObservedValues::new(SlowFirstRead::default());

    let first_value = free_charging(true);
    let second_value = min_power(4);
    let (first, second) = tokio::join!(
        observed.upsert_filter_value(&first_value),
        observed.upsert_filter_value(&second_value),
    );
    first.expect("first write");
    second.expect("second write");

    let stored = observed.store().load_filter_values().await.expect("load");
    assert_eq!(stored, vec![free_charging(true), min_power(4)]);
    assert_eq!(observed.latest().as_deref(), Some(&stored));
}

#[derive(Default)]
struct SwitchableReads {
    inner: MemoryStore,
    failing: AtomicBool,
}

#[async_trait]
impl FilterValueStore for SwitchableReads {
    async fn load_filter_values(&self) -> Result<Vec<FilterValue>> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("disk unplugged");
        }
        self.inner.load_filter_values().await
    }

    async fn upsert_filter_value(&self, value: &FilterValue) -> Result<()> {
        self.inner.upsert_filter_value(value).await
    }
}

#[tokio::test]
async fn failed_refresh_keeps_last_published_snapshot() {
    let observed = ObservedValues::new(SwitchableReads::default());
    observed
        .upsert_filter_value(&min_power(3))
        .await
        .expect("write");
    let before = observed.latest().expect("published");
    let mut rx = observed.subscribe();

    observed.store().failing.store(true, Ordering::SeqCst);
    observed
        .upsert_filter_value(&free_charging(true))
        .await
        .expect("write still succeeds");
    assert!(observed.refresh().await.is_err());

    assert!(!rx.has_changed().expect("sender alive"));
    let after = observed.latest().expect("still published");
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(*after, vec![min_power(3)]);
}
