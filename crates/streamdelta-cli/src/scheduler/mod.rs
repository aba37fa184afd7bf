//! Multi-tenant daily triggers.
//!
//! Wraps a [`JobScheduler`] with a registry mapping each tenant to its job.
//! The registry is private to [`TenantScheduler`]; a firing job hands the
//! tenant id to the check callback and shares nothing else. Each tenant has
//! its own lock, so a slow store call for one tenant never holds up another.
//!
//! Tenants are hydrated lazily: the persisted trigger state is read and the
//! job registered on the first interaction with that tenant. The legacy
//! global trigger is hydrated once at startup and fires a check for every
//! tenant in turn.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use streamdelta_core::{DailyTime, TenantId, TriggerState, ValidationError};
use streamdelta_store::{
    disable_trigger, list_tenants, load_global_trigger, load_trigger, save_trigger, BlobStore,
    StoreError,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

/// Pause between tenants when the global trigger fires.
pub(crate) const GLOBAL_TENANT_PAUSE: Duration = Duration::from_secs(3);

/// Invoked with the tenant id whenever a trigger fires.
pub(crate) type CheckCallback = Arc<dyn Fn(TenantId) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Error)]
pub(crate) enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

/// Per-tenant state. Its lock is held across the store call and the job
/// swap, so operations on one tenant apply in order.
#[derive(Default)]
struct TenantSlot {
    hydrated: bool,
    job: Option<Uuid>,
}

/// Short-lived map lookups only; never held across an await.
#[derive(Default)]
struct Registry {
    slots: HashMap<TenantId, Arc<Mutex<TenantSlot>>>,
    scheduled: HashMap<TenantId, DailyTime>,
}

pub(crate) struct TenantScheduler {
    jobs: JobScheduler,
    store: Arc<dyn BlobStore>,
    on_fire: CheckCallback,
    global_pause: Duration,
    registry: StdMutex<Registry>,
    global: Mutex<Option<Uuid>>,
}

impl TenantScheduler {
    /// Creates and starts the underlying job scheduler.
    pub(crate) async fn start(
        store: Arc<dyn BlobStore>,
        on_fire: CheckCallback,
    ) -> Result<Self, ScheduleError> {
        let jobs = JobScheduler::new().await?;
        jobs.start().await?;
        Ok(Self {
            jobs,
            store,
            on_fire,
            global_pause: GLOBAL_TENANT_PAUSE,
            registry: StdMutex::new(Registry::default()),
            global: Mutex::new(None),
        })
    }

    #[must_use]
    pub(crate) fn with_global_pause(mut self, pause: Duration) -> Self {
        self.global_pause = pause;
        self
    }

    /// Validates `raw`, persists `{time, enabled: true}` and replaces the
    /// tenant's job. An invalid time changes nothing.
    pub(crate) async fn set_schedule(
        &self,
        tenant: &TenantId,
        raw: &str,
    ) -> Result<TriggerState, ScheduleError> {
        let time = DailyTime::parse(raw)?;
        let job = self.tenant_job(tenant, time)?;
        let state = TriggerState {
            time,
            enabled: true,
        };

        let entry = self.slot(tenant);
        let mut slot = entry.lock().await;
        save_trigger(self.store.as_ref(), tenant, state).await?;
        self.remove_job(tenant, &mut slot).await?;
        let id = self.jobs.add(job).await?;
        slot.job = Some(id);
        slot.hydrated = true;
        self.registry().scheduled.insert(tenant.clone(), time);
        drop(slot);

        tracing::info!(tenant = %tenant, time = %time, job = %id, "scheduler: daily trigger set");
        Ok(state)
    }

    /// Persists the trigger as disabled, keeping its time, and removes the
    /// tenant's job.
    pub(crate) async fn disable(&self, tenant: &TenantId) -> Result<TriggerState, ScheduleError> {
        let entry = self.slot(tenant);
        let mut slot = entry.lock().await;
        let saved = disable_trigger(self.store.as_ref(), tenant).await?;
        self.remove_job(tenant, &mut slot).await?;
        slot.hydrated = true;
        drop(slot);

        tracing::info!(tenant = %tenant, time = %saved.value.time, "scheduler: daily trigger disabled");
        Ok(saved.value)
    }

    /// Persisted trigger state for `tenant`, hydrating it first.
    pub(crate) async fn show(&self, tenant: &TenantId) -> Result<TriggerState, ScheduleError> {
        self.hydrate_tenant(tenant).await?;
        Ok(load_trigger(self.store.as_ref(), tenant).await?.value)
    }

    /// Registers the tenant's persisted trigger on first contact. Returns
    /// whether a job was registered by this call.
    ///
    /// A failed read leaves the tenant unhydrated so the next interaction
    /// tries again.
    pub(crate) async fn hydrate_tenant(&self, tenant: &TenantId) -> Result<bool, ScheduleError> {
        let entry = self.slot(tenant);
        let mut slot = entry.lock().await;
        if slot.hydrated {
            return Ok(false);
        }

        let state = load_trigger(self.store.as_ref(), tenant).await?.value;
        let mut registered = false;
        if state.enabled && slot.job.is_none() {
            let id = self.jobs.add(self.tenant_job(tenant, state.time)?).await?;
            slot.job = Some(id);
            self.registry().scheduled.insert(tenant.clone(), state.time);
            registered = true;
            tracing::info!(tenant = %tenant, time = %state.time, "scheduler: restored daily trigger");
        }
        slot.hydrated = true;
        Ok(registered)
    }

    /// Registers the legacy global trigger if its persisted state is
    /// enabled. Safe to call more than once.
    pub(crate) async fn hydrate_global(&self) -> Result<bool, ScheduleError> {
        let mut global = self.global.lock().await;
        if global.is_some() {
            return Ok(false);
        }

        let state = load_global_trigger(self.store.as_ref()).await?.value;
        if !state.enabled {
            tracing::info!("scheduler: global trigger disabled");
            return Ok(false);
        }

        let store = Arc::clone(&self.store);
        let on_fire = Arc::clone(&self.on_fire);
        let pause = self.global_pause;
        let cron = state.time.cron_expression();
        let job = Job::new_async_tz(cron.as_str(), chrono::Local, move |_uuid, _lock| {
            let store = Arc::clone(&store);
            let on_fire = Arc::clone(&on_fire);
            Box::pin(async move {
                tracing::info!("scheduler: global trigger fired");
                run_global(store.as_ref(), &on_fire, pause).await;
            })
        })?;

        let id = self.jobs.add(job).await?;
        *global = Some(id);
        tracing::info!(time = %state.time, "scheduler: global trigger registered");
        Ok(true)
    }

    /// Time of the tenant's registered job, if any.
    pub(crate) fn scheduled_time(&self, tenant: &TenantId) -> Option<DailyTime> {
        self.registry().scheduled.get(tenant).copied()
    }

    pub(crate) fn is_scheduled(&self, tenant: &TenantId) -> bool {
        self.scheduled_time(tenant).is_some()
    }

    pub(crate) fn scheduled_count(&self) -> usize {
        self.registry().scheduled.len()
    }

    pub(crate) async fn shutdown(&self) -> Result<(), ScheduleError> {
        let mut jobs = self.jobs.clone();
        jobs.shutdown().await?;
        tracing::info!("scheduler: stopped");
        Ok(())
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, tenant: &TenantId) -> Arc<Mutex<TenantSlot>> {
        Arc::clone(self.registry().slots.entry(tenant.clone()).or_default())
    }

    async fn remove_job(&self, tenant: &TenantId, slot: &mut TenantSlot) -> Result<(), ScheduleError> {
        if let Some(previous) = slot.job {
            self.jobs.remove(&previous).await?;
            slot.job = None;
            self.registry().scheduled.remove(tenant);
        }
        Ok(())
    }

    fn tenant_job(&self, tenant: &TenantId, time: DailyTime) -> Result<Job, JobSchedulerError> {
        let on_fire = Arc::clone(&self.on_fire);
        let tenant = tenant.clone();
        let cron = time.cron_expression();
        Job::new_async_tz(cron.as_str(), chrono::Local, move |_uuid, _lock| {
            let on_fire = Arc::clone(&on_fire);
            let tenant = tenant.clone();
            Box::pin(async move {
                tracing::info!(tenant = %tenant, "scheduler: daily trigger fired");
                on_fire(tenant).await;
            })
        })
    }
}

/// Fires a check for every tenant in the store, one after another with
/// `pause` in between.
pub(crate) async fn run_global(store: &dyn BlobStore, on_fire: &CheckCallback, pause: Duration) {
    let tenants = match list_tenants(store).await {
        Ok(tenants) => tenants,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to list tenants for global trigger");
            return;
        }
    };

    tracing::info!(tenants = tenants.len(), "scheduler: running global check");
    for (index, tenant) in tenants.into_iter().enumerate() {
        if index > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        on_fire(tenant).await;
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
