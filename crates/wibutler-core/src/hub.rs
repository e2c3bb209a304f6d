// ── Hub facade ──
//
// Owns the session, the device snapshot, every entity, and the push-channel
// task. Everything is built once at connect time and injected; nothing is
// looked up ambiently.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wibutler_api::{Device, HubSession, RealtimeChannel, StreamState};

use crate::config::HubConfig;
use crate::entity::{self, Entity, EntityCommand, EntityOptions};
use crate::error::CoreError;
use crate::registry::DispatchRegistry;

/// How long `close()` waits for the stream task before aborting it.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// A connected hub.
///
/// Cheaply cloneable via `Arc<HubInner>`. The push-channel task runs until
/// [`close`](Self::close) is called or the last clone is dropped.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    session: Arc<HubSession>,
    registry: Arc<DispatchRegistry>,
    channel: Arc<RealtimeChannel>,
    devices: BTreeMap<String, Device>,
    entities: Vec<Entity>,
    cancel: CancellationToken,
    stream_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Drop for HubInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Hub {
    // ── Lifecycle ────────────────────────────────────────────────

    /// Authenticate, load the directory, build and register every entity,
    /// then start the push channel.
    pub async fn connect(config: HubConfig) -> Result<Self, CoreError> {
        let hub = Self::connect_without_stream(config).await?;
        hub.start_streaming().await?;
        Ok(hub)
    }

    /// Like [`connect`](Self::connect), but leaves the push channel idle.
    /// Entities then only change through their own commands.
    pub async fn connect_without_stream(config: HubConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let endpoint = config.endpoint()?;
        let session = Arc::new(HubSession::new(
            endpoint,
            config.credentials(),
            &config.transport(),
        )?);

        info!(
            hub = %session.endpoint(),
            username = session.username(),
            "connecting to hub"
        );
        session.login().await.map_err(|e| {
            warn!(error = %e, "hub login failed");
            CoreError::from(e)
        })?;

        let devices = session.list_devices().await;
        let options = EntityOptions {
            stop_settle: config.stop_settle,
        };
        let entities = Self::build_entities(&session, &devices, &options);

        let registry = Arc::new(DispatchRegistry::new());
        for entity in &entities {
            registry.register(entity.listener());
        }
        info!(
            devices = devices.len(),
            entities = entities.len(),
            "hub ready"
        );

        let channel = Arc::new(RealtimeChannel::new(
            Arc::clone(&session),
            config.reconnect.clone(),
        ));

        Ok(Self {
            inner: Arc::new(HubInner {
                session,
                registry,
                channel,
                devices,
                entities,
                cancel: CancellationToken::new(),
                stream_task: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Spawn the push-channel task. No-op while one is already running.
    pub async fn start_streaming(&self) -> Result<(), CoreError> {
        if self.is_closed() {
            return Err(CoreError::HubClosed);
        }

        let mut slot = self.inner.stream_task.lock().await;
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("push channel already running");
            return Ok(());
        }

        let channel = Arc::clone(&self.inner.channel);
        let registry = Arc::clone(&self.inner.registry);
        let cancel = self.inner.cancel.clone();

        *slot = Some(tokio::spawn(async move {
            match channel.run(registry.as_ref(), &cancel).await {
                Ok(()) => debug!("push channel task finished"),
                Err(e) => warn!(error = %e, "push channel ended"),
            }
        }));
        debug!("push channel task spawned");
        Ok(())
    }

    /// Cancel the push channel and wait (briefly) for it to finish.
    /// Calling this more than once is harmless.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();

        let task = self.inner.stream_task.lock().await.take();
        if let Some(mut task) = task {
            match tokio::time::timeout(CLOSE_GRACE, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => warn!(error = %e, "push channel task panicked"),
                Err(_) => {
                    warn!("push channel task did not stop in time, aborting");
                    task.abort();
                }
            }
        }
        info!("hub closed");
    }

    /// Connect without streaming, run `f`, close.
    pub async fn oneshot<F, Fut, T>(config: HubConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Hub) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let hub = Self::connect_without_stream(config).await?;
        let result = f(hub.clone()).await;
        hub.close().await;
        result
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    // ── Construction ─────────────────────────────────────────────

    /// Build every entity for a directory snapshot, device by device.
    pub fn build_entities(
        session: &Arc<HubSession>,
        devices: &BTreeMap<String, Device>,
        options: &EntityOptions,
    ) -> Vec<Entity> {
        devices
            .values()
            .flat_map(|device| {
                let built = entity::build_for_device(session, device, options);
                debug!(
                    device_id = %device.id,
                    kind = %device.kind,
                    entities = built.len(),
                    "built entities"
                );
                built
            })
            .collect()
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Run `command` on the entity with `unique_id`.
    pub async fn execute(&self, unique_id: &str, command: EntityCommand) -> Result<(), CoreError> {
        if self.is_closed() {
            return Err(CoreError::HubClosed);
        }
        let entity = self.entity(unique_id).ok_or_else(|| CoreError::EntityNotFound {
            identifier: unique_id.to_owned(),
        })?;
        entity.execute(command).await
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Directory snapshot taken at connect time, keyed by device id.
    pub fn devices(&self) -> &BTreeMap<String, Device> {
        &self.inner.devices
    }

    pub fn device(&self, id: &str) -> Result<&Device, CoreError> {
        self.inner
            .devices
            .get(id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_owned(),
            })
    }

    pub fn entities(&self) -> &[Entity] {
        &self.inner.entities
    }

    pub fn entity(&self, unique_id: &str) -> Option<&Entity> {
        self.inner
            .entities
            .iter()
            .find(|e| e.unique_id() == unique_id)
    }

    pub fn session(&self) -> &Arc<HubSession> {
        &self.inner.session
    }

    pub fn registry(&self) -> &Arc<DispatchRegistry> {
        &self.inner.registry
    }

    /// Push-channel lifecycle.
    pub fn stream_state(&self) -> watch::Receiver<StreamState> {
        self.inner.channel.state()
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("endpoint", &self.inner.session.endpoint().to_string())
            .field("devices", &self.inner.devices.len())
            .field("entities", &self.inner.entities.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
