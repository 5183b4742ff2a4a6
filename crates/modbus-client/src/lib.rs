#![allow(dead_code)]

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::{rtu, Context};
use tokio_modbus::prelude::{Reader, Slave, Writer};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info, warn};

#[cfg(feature = "mock")]
pub mod mock;

/// Serial link settings for a Modbus RTU device.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub device: String,
    pub baud_rate: u32,
    pub unit_id: u8,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 9_600,
            unit_id: 1,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to open serial port {device}: {source}")]
    Open {
        device: String,
        source: tokio_serial::Error,
    },
    #[error("modbus transport error: {0}")]
    Modbus(#[from] io::Error),
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// The register operations a physical link has to offer.
///
/// Implementations perform exactly one request per call and never retry.
#[async_trait]
pub trait RegisterIo: Send {
    async fn read_input_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>>;

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>>;

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> io::Result<()>;
}

#[async_trait]
impl RegisterIo for Context {
    async fn read_input_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>> {
        Reader::read_input_registers(self, address, count).await
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>> {
        Reader::read_holding_registers(self, address, count).await
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> io::Result<()> {
        Writer::write_multiple_registers(self, address, values).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    ReadInput,
    ReadHolding,
    WriteHolding,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Self::ReadInput => "read_input",
            Self::ReadHolding => "read_holding",
            Self::WriteHolding => "write_holding",
        }
    }
}

/// Serializes every register operation against one physical link.
///
/// The serial transport corrupts responses when requests overlap, so each
/// call holds the link for its whole request/response window. The lock is
/// `tokio::sync::Mutex`, which hands out access in FIFO order.
pub struct ModbusClient<T = Context> {
    link: Mutex<T>,
    timeout: Duration,
}

impl ModbusClient<Context> {
    /// Opens the serial port (8N1) and attaches the configured unit id.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let port = tokio_serial::new(&config.device, config.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .open_native_async()
            .map_err(|source| ClientError::Open {
                device: config.device.clone(),
                source,
            })?;
        let context = rtu::attach_slave(port, Slave(config.unit_id));
        info!(
            device = %config.device,
            baud_rate = config.baud_rate,
            unit_id = config.unit_id,
            "modbus rtu link open"
        );
        Ok(Self::with_link(context, Duration::from_millis(config.timeout_ms)))
    }
}

impl<T: RegisterIo> ModbusClient<T> {
    pub fn with_link(link: T, timeout: Duration) -> Self {
        Self {
            link: Mutex::new(link),
            timeout,
        }
    }

    pub async fn read_input(&self, address: u16, count: u16) -> Result<Vec<u16>, ClientError> {
        let mut link = self.link.lock().await;
        let request = link.read_input_registers(address, count);
        self.finish(Operation::ReadInput, address, count, request).await
    }

    pub async fn read_holding(&self, address: u16, count: u16) -> Result<Vec<u16>, ClientError> {
        let mut link = self.link.lock().await;
        let request = link.read_holding_registers(address, count);
        self.finish(Operation::ReadHolding, address, count, request).await
    }

    pub async fn write_holding(&self, address: u16, values: &[u16]) -> Result<(), ClientError> {
        let count = u16::try_from(values.len()).unwrap_or(u16::MAX);
        let mut link = self.link.lock().await;
        let request = link.write_multiple_registers(address, values);
        self.finish(Operation::WriteHolding, address, count, request).await
    }

    async fn finish<R>(
        &self,
        operation: Operation,
        address: u16,
        count: u16,
        request: impl std::future::Future<Output = io::Result<R>>,
    ) -> Result<R, ClientError> {
        let op = operation.as_str();
        match timeout(self.timeout, request).await {
            Ok(Ok(value)) => {
                debug!(op, address, count, "modbus request ok");
                Ok(value)
            }
            Ok(Err(err)) => {
                warn!(op, address, count, error = %err, "modbus request failed");
                Err(ClientError::Modbus(err))
            }
            Err(_) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(op, address, count, timeout_ms, "modbus request timed out");
                Err(ClientError::Timeout { timeout_ms })
            }
        }
    }
}
