//! Serialized access to the device and its state.
//!
//! The device connection, the poll skip counter and the [`StateStore`] live
//! together in one [`Controller`] behind a single async mutex. Whoever holds
//! the lock has exclusive use of all three, so a poll cycle, a command write
//! and a deferred mode write can never interleave on the wire.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::codec::{FanSpeed, Mode};
use crate::device::{
    DeviceError, FAN_SPEED_REGISTER, MODE_REGISTER, RUNNING_COIL, RegisterTransport,
    SET_TEMPERATURE_REGISTER,
};
use crate::state::{DeviceState, StateStore, Temperature};

/// Number of scheduled polls skipped after every device write.
///
/// The unit takes a few seconds to reflect a write in its registers; polling
/// sooner would read back the old values and publish them.
pub const WRITE_SUPPRESSED_POLLS: u8 = 3;

/// A controller shared between the poller and the command path.
pub type SharedController<D> = Arc<Mutex<Controller<D>>>;

/// Device, state store and poll suppression under one owner.
pub struct Controller<D> {
    device: D,
    store: StateStore,
    skip_polls: u8,
}

impl<D: RegisterTransport> Controller<D> {
    pub fn new(device: D, store: StateStore) -> Self {
        Self {
            device,
            store,
            skip_polls: 0,
        }
    }

    /// Wrap in the shared lock.
    pub fn shared(self) -> SharedController<D> {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> &DeviceState {
        self.store.state()
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Remaining polls to skip.
    pub fn skip_polls(&self) -> u8 {
        self.skip_polls
    }

    /// Consume one suppressed poll, if any is pending.
    ///
    /// Returns the count left after this one.
    pub fn take_suppressed_poll(&mut self) -> Option<u8> {
        if self.skip_polls == 0 {
            return None;
        }
        self.skip_polls -= 1;
        Some(self.skip_polls)
    }

    fn suppress_polls(&mut self) {
        self.skip_polls = WRITE_SUPPRESSED_POLLS;
    }

    /// Open the device connection.
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        self.device.ensure_connected().await
    }

    /// Close the device connection.
    pub async fn disconnect(&mut self) {
        self.device.disconnect().await;
    }

    /// Merge an observation into the state store.
    pub fn merge(&mut self, incoming: &DeviceState) -> DeviceState {
        self.store.merge(incoming)
    }

    pub async fn write_running(&mut self, running: bool) -> Result<(), DeviceError> {
        self.suppress_polls();
        self.device.ensure_connected().await?;
        self.device.write_coil(RUNNING_COIL, running).await?;
        tracing::debug!(running, "Wrote running coil");
        Ok(())
    }

    pub async fn write_set_temperature(&mut self, value: Temperature) -> Result<(), DeviceError> {
        self.suppress_polls();
        self.device.ensure_connected().await?;
        self.device
            .write_register(SET_TEMPERATURE_REGISTER, value.to_register())
            .await?;
        tracing::debug!(temperature = %value, "Wrote set temperature");
        Ok(())
    }

    pub async fn write_mode(&mut self, mode: Mode) -> Result<(), DeviceError> {
        self.suppress_polls();
        self.device.ensure_connected().await?;
        self.device.write_register(MODE_REGISTER, mode.code()).await?;
        tracing::debug!(mode = ?mode, "Wrote mode");
        Ok(())
    }

    pub async fn write_fan_speed(&mut self, fan_speed: FanSpeed) -> Result<(), DeviceError> {
        self.suppress_polls();
        self.device.ensure_connected().await?;
        self.device
            .write_register(FAN_SPEED_REGISTER, fan_speed.code())
            .await?;
        tracing::debug!(fan_speed = ?fan_speed, "Wrote fan speed");
        Ok(())
    }
}
