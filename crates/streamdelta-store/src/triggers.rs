//! Persisted trigger state for tenants and the legacy global job.

use streamdelta_core::{TenantId, TriggerState};

use crate::blob::{BlobStore, Versioned};
use crate::cas::update_json;
use crate::error::StoreError;
use crate::paths::{schedule_path, GLOBAL_SCHEDULE_PATH};

async fn load_state<S>(store: &S, path: &str) -> Result<Versioned<TriggerState>, StoreError>
where
    S: BlobStore + ?Sized,
{
    let Some(blob) = store.get(path).await? else {
        return Ok(Versioned {
            value: TriggerState::default(),
            version: None,
        });
    };
    let value = serde_json::from_str(&blob.content).map_err(|e| StoreError::Deserialize {
        context: path.to_owned(),
        source: e,
    })?;
    Ok(Versioned {
        value,
        version: Some(blob.version),
    })
}

/// Reads a tenant's trigger state. A missing record yields the default
/// (`09:00`, enabled) with no version.
///
/// # Errors
///
/// Returns [`StoreError`] on read failure or a malformed record.
pub async fn load_trigger<S>(store: &S, tenant: &TenantId) -> Result<Versioned<TriggerState>, StoreError>
where
    S: BlobStore + ?Sized,
{
    load_state(store, &schedule_path(tenant)).await
}

/// Reads the legacy global trigger state.
///
/// # Errors
///
/// Returns [`StoreError`] on read failure or a malformed record.
pub async fn load_global_trigger<S>(store: &S) -> Result<Versioned<TriggerState>, StoreError>
where
    S: BlobStore + ?Sized,
{
    load_state(store, GLOBAL_SCHEDULE_PATH).await
}

/// Writes a tenant's trigger state through compare-and-swap.
///
/// # Errors
///
/// Returns [`StoreError::Conflict`] if the write loses twice, or any other
/// store failure.
pub async fn save_trigger<S>(
    store: &S,
    tenant: &TenantId,
    state: TriggerState,
) -> Result<Versioned<TriggerState>, StoreError>
where
    S: BlobStore + ?Sized,
{
    let message = format!(
        "Update user schedule for {tenant} to {} (enabled: {})",
        state.time, state.enabled
    );
    let saved = update_json(store, &schedule_path(tenant), &message, |_: Option<TriggerState>| {
        Ok::<_, StoreError>(state)
    })
    .await?;
    tracing::info!(tenant = %tenant, time = %state.time, enabled = state.enabled, "store: trigger saved");
    Ok(saved)
}

/// Marks a tenant's trigger disabled, keeping the stored time (or the
/// default when nothing was stored).
///
/// # Errors
///
/// As [`save_trigger`].
pub async fn disable_trigger<S>(store: &S, tenant: &TenantId) -> Result<Versioned<TriggerState>, StoreError>
where
    S: BlobStore + ?Sized,
{
    let retained = load_trigger(store, tenant).await?.value.time;
    let message = format!("Update user schedule for {tenant} to {retained} (enabled: false)");
    let saved = update_json(store, &schedule_path(tenant), &message, |current: Option<TriggerState>| {
        let time = current.map_or(retained, |c| c.time);
        Ok::<_, StoreError>(TriggerState { time, enabled: false })
    })
    .await?;
    tracing::info!(tenant = %tenant, time = %saved.value.time, "store: trigger disabled");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use streamdelta_core::DailyTime;

    use super::*;
    use crate::memory::MemoryStore;

    fn tenant() -> TenantId {
        TenantId::parse("555").unwrap()
    }

    #[tokio::test]
    async fn missing_trigger_is_default_without_version() {
        let store = MemoryStore::new();
        let loaded = load_trigger(&store, &tenant()).await.unwrap();
        assert_eq!(loaded.value, TriggerState::default());
        assert!(loaded.version.is_none());
    }

    #[tokio::test]
    async fn save_then_load_carries_version() {
        let store = MemoryStore::new();
        let state = TriggerState {
            time: DailyTime::parse("09:00").unwrap(),
            enabled: true,
        };
        let saved = save_trigger(&store, &tenant(), state).await.unwrap();
        let loaded = load_trigger(&store, &tenant()).await.unwrap();
        assert_eq!(loaded.value, state);
        assert_eq!(loaded.version, saved.version);
        assert!(loaded.version.is_some());
    }

    #[tokio::test]
    async fn disable_keeps_stored_time() {
        let store = MemoryStore::new();
        let state = TriggerState {
            time: DailyTime::parse("21:45").unwrap(),
            enabled: true,
        };
        save_trigger(&store, &tenant(), state).await.unwrap();

        let disabled = disable_trigger(&store, &tenant()).await.unwrap();
        assert_eq!(disabled.value.time.to_string(), "21:45");
        assert!(!disabled.value.enabled);
    }

    #[tokio::test]
    async fn disable_without_record_uses_default_time() {
        let store = MemoryStore::new();
        let disabled = disable_trigger(&store, &tenant()).await.unwrap();
        assert_eq!(disabled.value.time.to_string(), "09:00");
        assert!(!disabled.value.enabled);
    }

    #[tokio::test]
    async fn legacy_global_record_loads() {
        let store = MemoryStore::new();
        store
            .put(GLOBAL_SCHEDULE_PATH, r#"{"time":"06:30","enabled":false}"#, None, "m")
            .await
            .unwrap();
        let global = load_global_trigger(&store).await.unwrap();
        assert_eq!(global.value.time.to_string(), "06:30");
        assert!(!global.value.enabled);
    }
}
