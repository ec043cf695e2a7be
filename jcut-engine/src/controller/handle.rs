//! Async attach driver
//!
//! [`attach`] moves an [`ElementController`] into a tokio task that owns it
//! exclusively and feeds it element events, a periodic tick, and commands from
//! the returned [`AttachHandle`]. The task is the single writer of controller
//! state, so no locking is needed around it.

use crate::context::EngineContext;
use crate::controller::{ElementController, ReadyState};
use crate::element::{ElementEvent, PlaybackElement};
use crate::error::{Error, Result};
use jcut_common::events::{TelemetryRecord, TimeSavedTotals};
use jcut_common::Settings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Control-domain tick period
pub const TICK_INTERVAL: Duration = Duration::from_millis(5);

/// How long detach waits for an initialising strategy before tearing down anyway
const DETACH_READY_TIMEOUT: Duration = Duration::from_secs(2);

const COMMAND_CAPACITY: usize = 32;

enum ControlCommand {
    UpdateConfig {
        settings: Settings,
        reply: oneshot::Sender<Result<()>>,
    },
    Telemetry(oneshot::Sender<TelemetryRecord>),
    TimeSaved(oneshot::Sender<TimeSavedTotals>),
    Detach(oneshot::Sender<()>),
}

/// Handle to one attached element
pub struct AttachHandle {
    id: Uuid,
    commands: mpsc::Sender<ControlCommand>,
    task: Option<JoinHandle<()>>,
}

/// Attach the engine to `element` and start driving it
///
/// Must be called from within a tokio runtime. Never fails: strategies that
/// cannot run are replaced by always-sounded.
pub async fn attach(element: Arc<dyn PlaybackElement>, settings: Settings, ctx: EngineContext) -> AttachHandle {
    let events = element.subscribe();
    let controller = ElementController::new(element, settings, ctx);
    let id = controller.id();
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let task = tokio::spawn(run_controller(controller, events, rx));
    AttachHandle { id, commands: tx, task: Some(task) }
}

impl AttachHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> ControlCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(make(reply)).await.map_err(|_| Error::Detached)?;
        response.await.map_err(|_| Error::Detached)
    }

    /// Replace the settings as a whole
    pub async fn update_config(&self, settings: Settings) -> Result<()> {
        self.request(|reply| ControlCommand::UpdateConfig { settings, reply }).await?
    }

    pub async fn telemetry(&self) -> Result<TelemetryRecord> {
        self.request(ControlCommand::Telemetry).await
    }

    pub async fn time_saved(&self) -> Result<TimeSavedTotals> {
        self.request(ControlCommand::TimeSaved).await
    }

    /// Detach and wait for the driver task to finish
    ///
    /// Detaching an element whose driver already stopped is not an error.
    pub async fn detach(mut self) -> Result<()> {
        if self.request(ControlCommand::Detach).await.is_err() {
            debug!("Controller {} already stopped", self.id);
        }
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| Error::Internal(format!("controller task failed: {}", e)))?;
        }
        Ok(())
    }
}

async fn run_controller(
    mut controller: ElementController,
    mut events: broadcast::Receiver<ElementEvent>,
    mut commands: mpsc::Receiver<ControlCommand>,
) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ControlCommand::UpdateConfig { settings, reply }) => {
                    let _ = reply.send(controller.update_settings(settings));
                }
                Some(ControlCommand::Telemetry(reply)) => {
                    let _ = reply.send(controller.telemetry());
                }
                Some(ControlCommand::TimeSaved(reply)) => {
                    let _ = reply.send(controller.time_saved());
                }
                Some(ControlCommand::Detach(reply)) => {
                    wait_until_initialized(&mut controller).await;
                    controller.detach();
                    let _ = reply.send(());
                    break;
                }
                None => {
                    debug!("Handle of {} dropped, detaching", controller.id());
                    controller.detach();
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => controller.handle_event(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Controller {} missed {} element event(s)", controller.id(), missed);
                }
                Err(RecvError::Closed) => {
                    info!("Element of {} is gone, detaching", controller.id());
                    controller.detach();
                    break;
                }
            },
            _ = ticker.tick() => controller.tick(),
        }
    }
}

/// Let in-flight initialisation finish before teardown
async fn wait_until_initialized(controller: &mut ElementController) {
    let deadline = tokio::time::Instant::now() + DETACH_READY_TIMEOUT;
    while controller.ready_state() == ReadyState::Initializing {
        if tokio::time::Instant::now() >= deadline {
            warn!("Detaching {} before initialisation finished", controller.id());
            return;
        }
        tokio::time::sleep(TICK_INTERVAL).await;
        controller.tick();
    }
}
