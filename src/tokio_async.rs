//! Asynchronous transports on top of `tokio-modbus`.
//!
//! Any asynchronous `tokio-modbus` context is an [`AsyncTransport`]; it has
//! no timeout of its own, so wrap calls in `tokio::time::timeout` when
//! using it directly. [`RtuTransport`] builds the serial context from a
//! [`SerialConfig`], applies the configured timeout to every transaction
//! and optionally reopens the port for each call.
//!
//! # Examples
//!
//! ```no_run
//! use rs485_relay_board::{config::RelayBoardConfig, tokio_async};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayBoardConfig::from_file("relay-board.yml")?;
//!     let mut board = tokio_async::connect_rtu(&config)?;
//!
//!     board.open_relay(1).await?;
//!     board.delay(1, 10).await?;
//!     println!("Relays: {:?}", board.read_all_relays().await?);
//!     Ok(())
//! }
//! ```

use crate::tokio_common::{map_tokio_result, Error};
use crate::transport::AsyncTransport;
use tokio_modbus::prelude::{Reader, Writer};

#[cfg(feature = "tokio-rtu")]
use crate::{
    async_relay_board::AsyncRelayBoard,
    config::{RelayBoardConfig, SerialConfig},
    tokio_common::{log_request, Result},
};
#[cfg(feature = "tokio-rtu")]
use std::{future::Future, time::Duration};

impl AsyncTransport for tokio_modbus::client::Context {
    type Error = Error;

    async fn write_register(&mut self, address: u16, value: u16) -> std::result::Result<(), Error> {
        map_tokio_result(self.write_single_register(address, value).await)
    }

    async fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> std::result::Result<Vec<u16>, Error> {
        map_tokio_result(self.read_holding_registers(address, count).await)
    }
}

/// Serial Modbus-RTU transport built from a [`SerialConfig`].
#[cfg(feature = "tokio-rtu")]
pub struct RtuTransport {
    config: SerialConfig,
    ctx: Option<tokio_modbus::client::Context>,
}

#[cfg(feature = "tokio-rtu")]
impl std::fmt::Debug for RtuTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtuTransport")
            .field("config", &self.config)
            .field("is_open", &self.is_open())
            .finish()
    }
}

#[cfg(feature = "tokio-rtu")]
impl RtuTransport {
    /// Creates the transport, opening the port right away unless it is
    /// reopened for every call.
    pub fn open(config: SerialConfig) -> Result<Self> {
        let ctx = if config.close_port_after_each_call {
            None
        } else {
            Some(Self::connect(&config)?)
        };
        Ok(Self { config, ctx })
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.ctx.is_some()
    }

    fn connect(config: &SerialConfig) -> Result<tokio_modbus::client::Context> {
        log::debug!(
            "Opening {} at {} baud for slave {}",
            config.port,
            config.baud_rate,
            config.address
        );
        let builder = crate::tokio_common::serial_port_builder(&config.port, &config.baud_rate);
        let port = tokio_serial::SerialStream::open(&builder).map_err(std::io::Error::from)?;
        Ok(tokio_modbus::client::rtu::attach_slave(
            port,
            tokio_modbus::Slave(*config.address),
        ))
    }

    fn take_context(&mut self) -> Result<tokio_modbus::client::Context> {
        match self.ctx.take() {
            Some(ctx) => Ok(ctx),
            None => Self::connect(&self.config),
        }
    }

    /// Puts the context back, or drops it (closing the port) when the port
    /// is reopened for every call.
    fn restore_context(&mut self, ctx: tokio_modbus::client::Context) {
        if !self.config.close_port_after_each_call {
            self.ctx = Some(ctx);
        }
    }
}

#[cfg(feature = "tokio-rtu")]
async fn with_timeout<T>(timeout: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_elapsed) => Err(std::io::Error::from(std::io::ErrorKind::TimedOut).into()),
    }
}

#[cfg(feature = "tokio-rtu")]
impl AsyncTransport for RtuTransport {
    type Error = Error;

    async fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        let debug = self.config.debug;
        log_request(
            debug,
            format_args!("write_register(address={address}, value={value:#06x})"),
        );
        let mut ctx = self.take_context()?;
        let result = with_timeout(self.config.timeout, ctx.write_register(address, value)).await;
        self.restore_context(ctx);
        if let Err(err) = &result {
            log_request(debug, format_args!("write_register failed: {err}"));
        }
        result
    }

    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let debug = self.config.debug;
        log_request(
            debug,
            format_args!("read_registers(address={address}, count={count})"),
        );
        let mut ctx = self.take_context()?;
        let result = with_timeout(self.config.timeout, ctx.read_registers(address, count)).await;
        self.restore_context(ctx);
        match &result {
            Ok(registers) => log_request(debug, format_args!("read_registers -> {registers:?}")),
            Err(err) => log_request(debug, format_args!("read_registers failed: {err}")),
        }
        result
    }
}

/// Opens the serial link described by `config` and returns a ready board.
///
/// Must be called from within a `tokio` runtime.
#[cfg(feature = "tokio-rtu")]
pub fn connect_rtu(config: &RelayBoardConfig) -> Result<AsyncRelayBoard<RtuTransport>> {
    Ok(AsyncRelayBoard::with_channels(
        RtuTransport::open(config.serial.clone())?,
        config.channels,
    ))
}

#[cfg(all(test, feature = "tokio-rtu"))]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn elapsed_timeout_is_a_transport_timeout() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn open_per_call_defers_the_port() {
        let mut board = AsyncRelayBoard::new(
            RtuTransport::open(SerialConfig {
                port: "/dev/relay-board-does-not-exist".to_string(),
                close_port_after_each_call: true,
                ..Default::default()
            })
            .unwrap(),
        );
        assert!(!board.transport().is_open());
        assert!(format!("{board:?}").contains("RtuTransport"));
        assert!(format!("{:?}", board.transport()).contains("is_open: false"));
        assert_matches!(
            board.close_all().await,
            Err(crate::relay_board::Error::Transport(Error::TokioError(_)))
        );
    }
}
