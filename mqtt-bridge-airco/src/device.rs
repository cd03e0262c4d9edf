//! Register access to the air conditioner's Modbus interface.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use crate::config::ConnectionConfig;

/// Coil: unit is running.
pub const RUNNING_COIL: u16 = 0;
/// Holding register: operating mode code.
pub const MODE_REGISTER: u16 = 0;
/// Holding register: target temperature, tenths of a degree.
pub const SET_TEMPERATURE_REGISTER: u16 = 1;
/// Input register: measured room temperature, tenths of a degree.
pub const CURRENT_TEMPERATURE_INPUT: u16 = 2;
/// Holding register: fan speed code.
pub const FAN_SPEED_REGISTER: u16 = 14;

/// One addressable point in the device's register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Coil(u16),
    Input(u16),
    Holding(u16),
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Coil(addr) => write!(f, "coil {}", addr),
            Register::Input(addr) => write!(f, "input register {}", addr),
            Register::Holding(addr) => write!(f, "holding register {}", addr),
        }
    }
}

/// Error type for register access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// No usable link to the device: connect failed, transport I/O failed,
    /// or no connection is open.
    #[error("Connection failed: {0}")]
    Connection(String),
    /// The device answered a read with an exception or an unusable response.
    #[error("Read of {register} failed: {message}")]
    Read { register: Register, message: String },
    /// The device answered a write with an exception.
    #[error("Write to {register} failed: {message}")]
    Write { register: Register, message: String },
}

impl DeviceError {
    /// Whether the error concerns the link rather than one register.
    pub fn is_connection(&self) -> bool {
        matches!(self, DeviceError::Connection(_))
    }
}

/// Single-register access to a device.
///
/// Implementations keep at most one connection open and drop it on transport
/// errors, so the next [`ensure_connected`](Self::ensure_connected)
/// reconnects.
pub trait RegisterTransport: Send + 'static {
    /// Open a connection if none is open.
    fn ensure_connected(&mut self) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn read_coil(&mut self, address: u16) -> impl Future<Output = Result<bool, DeviceError>> + Send;

    fn read_input_register(
        &mut self,
        address: u16,
    ) -> impl Future<Output = Result<u16, DeviceError>> + Send;

    fn read_holding_register(
        &mut self,
        address: u16,
    ) -> impl Future<Output = Result<u16, DeviceError>> + Send;

    fn write_coil(
        &mut self,
        address: u16,
        value: bool,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn write_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Close the connection, if open.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}

#[derive(Clone, Copy)]
enum Access {
    Read,
    Write,
}

/// A Modbus TCP or RTU device.
pub struct ModbusDevice {
    connection: ConnectionConfig,
    slave: Slave,
    timeout: Duration,
    ctx: Option<Context>,
}

impl ModbusDevice {
    /// Create a device handle. Nothing is opened until the first connect.
    pub fn new(connection: ConnectionConfig, unit_id: u8, timeout: Duration) -> Self {
        Self {
            connection,
            slave: Slave(unit_id),
            timeout,
            ctx: None,
        }
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    fn context(&mut self) -> Result<&mut Context, DeviceError> {
        self.ctx
            .as_mut()
            .ok_or_else(|| DeviceError::Connection("not connected".to_string()))
    }

    /// Unwrap a Modbus response. Transport errors drop the connection.
    fn settle<T>(
        &mut self,
        register: Register,
        access: Access,
        result: tokio_modbus::Result<T>,
    ) -> Result<T, DeviceError> {
        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(exception)) => {
                let message = format!("Exception: {:?}", exception);
                Err(match access {
                    Access::Read => DeviceError::Read { register, message },
                    Access::Write => DeviceError::Write { register, message },
                })
            }
            Err(e) => {
                self.ctx = None;
                Err(DeviceError::Connection(format!("{}: {}", register, e)))
            }
        }
    }

    async fn read(&mut self, register: Register) -> Result<u16, DeviceError> {
        let ctx = self.context()?;
        let result = match register {
            Register::Coil(addr) => ctx
                .read_coils(addr, 1)
                .await
                .map(|r| r.map(|bits| bits.into_iter().map(u16::from).collect::<Vec<_>>())),
            Register::Input(addr) => ctx.read_input_registers(addr, 1).await,
            Register::Holding(addr) => ctx.read_holding_registers(addr, 1).await,
        };

        let words = self.settle(register, Access::Read, result)?;
        words.first().copied().ok_or(DeviceError::Read {
            register,
            message: "empty response".to_string(),
        })
    }
}

/// Open a connection to the device.
///
/// Takes the settings rather than `&ModbusDevice`: `Context` is not `Sync`,
/// and a shared borrow of it held across an await would make the future `!Send`.
async fn open(
    connection: &ConnectionConfig,
    slave: Slave,
    timeout: Duration,
) -> Result<Context, DeviceError> {
    match connection {
        ConnectionConfig::Tcp { host, port } => {
            let addr = resolve(host, *port).await?;

            let ctx = tokio::time::timeout(timeout, tcp::connect_slave(addr, slave))
                .await
                .map_err(|_| DeviceError::Connection("Connection timeout".to_string()))?
                .map_err(|e| DeviceError::Connection(e.to_string()))?;

            Ok(ctx)
        }
        ConnectionConfig::Rtu {
            port,
            baud_rate,
            data_bits,
            parity,
            stop_bits,
        } => {
            let parity = match parity.to_lowercase().as_str() {
                "even" => tokio_serial::Parity::Even,
                "odd" => tokio_serial::Parity::Odd,
                _ => tokio_serial::Parity::None,
            };

            let stop_bits = match stop_bits {
                2 => tokio_serial::StopBits::Two,
                _ => tokio_serial::StopBits::One,
            };

            let data_bits = match data_bits {
                5 => tokio_serial::DataBits::Five,
                6 => tokio_serial::DataBits::Six,
                7 => tokio_serial::DataBits::Seven,
                _ => tokio_serial::DataBits::Eight,
            };

            let builder = tokio_serial::new(port, *baud_rate)
                .parity(parity)
                .stop_bits(stop_bits)
                .data_bits(data_bits)
                .timeout(timeout);

            let serial = tokio_serial::SerialStream::open(&builder).map_err(|e| {
                DeviceError::Connection(format!("Serial open failed: {}", e))
            })?;

            Ok(rtu::attach_slave(serial, slave))
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, DeviceError> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| DeviceError::Connection(format!("Invalid address: {}", e)))?
        .next()
        .ok_or_else(|| DeviceError::Connection(format!("No address for {}", host)))
}

impl RegisterTransport for ModbusDevice {
    async fn ensure_connected(&mut self) -> Result<(), DeviceError> {
        if self.ctx.is_none() {
            let ctx = open(&self.connection, self.slave, self.timeout).await?;
            tracing::info!(connection = ?self.connection, "Connected to Modbus device");
            self.ctx = Some(ctx);
        }
        Ok(())
    }

    async fn read_coil(&mut self, address: u16) -> Result<bool, DeviceError> {
        Ok(self.read(Register::Coil(address)).await? != 0)
    }

    async fn read_input_register(&mut self, address: u16) -> Result<u16, DeviceError> {
        self.read(Register::Input(address)).await
    }

    async fn read_holding_register(&mut self, address: u16) -> Result<u16, DeviceError> {
        self.read(Register::Holding(address)).await
    }

    async fn write_coil(&mut self, address: u16, value: bool) -> Result<(), DeviceError> {
        let result = self.context()?.write_single_coil(address, value).await;
        self.settle(Register::Coil(address), Access::Write, result)
    }

    async fn write_register(&mut self, address: u16, value: u16) -> Result<(), DeviceError> {
        let result = self.context()?.write_single_register(address, value).await;
        self.settle(Register::Holding(address), Access::Write, result)
    }

    async fn disconnect(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::warn!(error = %e, "Error closing Modbus connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_display() {
        assert_eq!(Register::Coil(RUNNING_COIL).to_string(), "coil 0");
        assert_eq!(
            Register::Input(CURRENT_TEMPERATURE_INPUT).to_string(),
            "input register 2"
        );
        assert_eq!(
            Register::Holding(FAN_SPEED_REGISTER).to_string(),
            "holding register 14"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(DeviceError::Connection("reset".into()).is_connection());
        assert!(
            !DeviceError::Read {
                register: Register::Holding(MODE_REGISTER),
                message: "Exception: IllegalDataAddress".into(),
            }
            .is_connection()
        );
    }

    #[tokio::test]
    async fn test_calls_without_connection_fail() {
        let mut device = ModbusDevice::new(
            ConnectionConfig::Tcp {
                host: "127.0.0.1".to_string(),
                port: 502,
            },
            1,
            Duration::from_millis(100),
        );

        assert!(!device.is_connected());
        let err = device.read_coil(RUNNING_COIL).await.unwrap_err();
        assert!(err.is_connection());
        let err = device.write_register(MODE_REGISTER, 4).await.unwrap_err();
        assert!(err.is_connection());

        // No-op when nothing is open
        device.disconnect().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Nothing listens on port 1 on the loopback interface.
        let mut device = ModbusDevice::new(
            ConnectionConfig::Tcp {
                host: "127.0.0.1".to_string(),
                port: 1,
            },
            1,
            Duration::from_millis(500),
        );

        let err = device.ensure_connected().await.unwrap_err();
        assert!(err.is_connection());
        assert!(!device.is_connected());
    }

    #[tokio::test]
    async fn test_device_runs_on_spawned_task() {
        let mut device = ModbusDevice::new(
            ConnectionConfig::Tcp {
                host: "localhost".to_string(),
                port: 1,
            },
            1,
            Duration::from_millis(500),
        );

        // tokio::spawn only accepts Send futures.
        let handle = tokio::spawn(async move {
            let connected = device.ensure_connected().await;
            let read = device.read_input_register(CURRENT_TEMPERATURE_INPUT).await;
            (connected.is_err(), read.is_err())
        });

        assert_eq!(handle.await.unwrap(), (true, true));
    }

    #[tokio::test]
    async fn test_missing_serial_port() {
        let mut device = ModbusDevice::new(
            ConnectionConfig::Rtu {
                port: "/dev/does-not-exist".to_string(),
                baud_rate: 9600,
                data_bits: 8,
                parity: "none".to_string(),
                stop_bits: 1,
            },
            1,
            Duration::from_millis(100),
        );

        let err = device.ensure_connected().await.unwrap_err();
        assert!(matches!(err, DeviceError::Connection(msg) if msg.starts_with("Serial open")));
    }
}
