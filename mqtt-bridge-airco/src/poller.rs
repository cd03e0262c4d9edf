//! Periodic device polling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::codec::{FanSpeed, Mode};
use crate::controller::SharedController;
use crate::device::{
    CURRENT_TEMPERATURE_INPUT, DeviceError, FAN_SPEED_REGISTER, MODE_REGISTER, RUNNING_COIL,
    Register, RegisterTransport, SET_TEMPERATURE_REGISTER,
};
use crate::state::{DeviceState, Temperature};

/// Whether the scheduler has a poll loop running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
}

/// Result of one scheduled firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Skipped without touching the device.
    Suppressed { remaining: u8 },
    /// Registers were read and merged.
    Polled { fields: usize, changed: usize },
    /// The connection failed; nothing was merged.
    Failed(DeviceError),
}

/// Self-rescheduling poll loop.
///
/// Each firing runs one cycle, then sleeps a full interval before the next,
/// so the effective period is the interval plus the cycle's duration.
pub struct PollScheduler<D> {
    controller: SharedController<D>,
    interval: Duration,
    shutdown: watch::Sender<bool>,
    scheduled: Arc<AtomicBool>,
}

impl<D: RegisterTransport> PollScheduler<D> {
    pub fn new(controller: SharedController<D>, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            controller,
            interval,
            shutdown,
            scheduled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.scheduled.load(Ordering::SeqCst) {
            SchedulerState::Scheduled
        } else {
            SchedulerState::Idle
        }
    }

    /// Start the poll loop. The first cycle runs one interval from now.
    ///
    /// Returns `None` if a loop is already running.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self.scheduled.swap(true, Ordering::SeqCst) {
            return None;
        }

        self.shutdown.send_replace(false);
        let mut shutdown = self.shutdown.subscribe();
        let controller = self.controller.clone();
        let interval = self.interval;
        let scheduled = self.scheduled.clone();

        info!(interval_secs = interval.as_secs_f64(), "Starting poll scheduler");

        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.wait_for(|stop| *stop) => break,
                }

                poll_once(&controller).await;

                if *shutdown.borrow() {
                    break;
                }
            }

            scheduled.store(false, Ordering::SeqCst);
            debug!("Poll scheduler stopped");
        }))
    }

    /// Stop the loop. A cycle in progress completes but is not followed by another.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// A handle that stops this scheduler, for use from shutdown hooks.
    pub fn stopper(&self) -> impl Fn() + Send + Sync + 'static {
        let shutdown = self.shutdown.clone();
        move || {
            shutdown.send_replace(true);
        }
    }

    /// Run one firing now, outside the timer.
    pub async fn fire(&self) -> PollOutcome {
        poll_once(&self.controller).await
    }
}

/// One scheduled firing: skip if suppressed, otherwise read and merge.
pub async fn poll_once<D: RegisterTransport>(controller: &SharedController<D>) -> PollOutcome {
    let mut controller = controller.lock().await;

    if let Some(remaining) = controller.take_suppressed_poll() {
        debug!(remaining, "Poll suppressed after write");
        return PollOutcome::Suppressed { remaining };
    }

    match read_partial_state(controller.device_mut()).await {
        Ok(observed) => {
            let delta = controller.merge(&observed);
            let outcome = PollOutcome::Polled {
                fields: observed.known_fields(),
                changed: delta.known_fields(),
            };
            debug!(outcome = ?outcome, "Poll cycle complete");
            outcome
        }
        Err(e) => {
            error!(error = %e, "Polling error");
            PollOutcome::Failed(e)
        }
    }
}

/// Read every mapped register once.
///
/// A failed read leaves its field unknown and the other reads go ahead. A
/// connection failure aborts the cycle.
pub async fn read_partial_state<D: RegisterTransport>(
    device: &mut D,
) -> Result<DeviceState, DeviceError> {
    device.ensure_connected().await?;

    let running = observe(
        Register::Coil(RUNNING_COIL),
        device.read_coil(RUNNING_COIL).await,
    )?;
    let current_temperature = observe(
        Register::Input(CURRENT_TEMPERATURE_INPUT),
        device.read_input_register(CURRENT_TEMPERATURE_INPUT).await,
    )?;
    let set_temperature = observe(
        Register::Holding(SET_TEMPERATURE_REGISTER),
        device.read_holding_register(SET_TEMPERATURE_REGISTER).await,
    )?;
    let mode = observe(
        Register::Holding(MODE_REGISTER),
        device.read_holding_register(MODE_REGISTER).await,
    )?;
    let fan_speed = observe(
        Register::Holding(FAN_SPEED_REGISTER),
        device.read_holding_register(FAN_SPEED_REGISTER).await,
    )?;

    Ok(DeviceState {
        running,
        current_temperature: current_temperature.map(Temperature::from_register),
        set_temperature: set_temperature.map(Temperature::from_register),
        mode: mode.and_then(|code| {
            let mode = Mode::from_code(code);
            if mode.is_none() {
                warn!(code, "Unknown mode code");
            }
            mode
        }),
        fan_speed: fan_speed.and_then(|code| {
            let fan_speed = FanSpeed::from_code(code);
            if fan_speed.is_none() {
                warn!(code, "Unknown fan speed code");
            }
            fan_speed
        }),
    })
}

fn observe<T>(register: Register, result: Result<T, DeviceError>) -> Result<Option<T>, DeviceError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_connection() => Err(e),
        Err(e) => {
            warn!(register = %register, error = %e, "Failed to read register");
            Ok(None)
        }
    }
}
