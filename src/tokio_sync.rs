//! Blocking transports on top of `tokio-modbus`.
//!
//! Any synchronous `tokio-modbus` context (RTU, or TCP for boards behind a
//! gateway) is a [`Transport`]. For serial links, [`SerialTransport`]
//! builds the context from a [`SerialConfig`] and decides whether the port
//! stays open between transactions.
//!
//! # Examples
//!
//! ## RTU Client Example
//!
//! ```no_run
//! use rs485_relay_board::config::{RelayBoardConfig, SerialConfig};
//! use rs485_relay_board::tokio_sync;
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayBoardConfig {
//!         channels: 8.into(),
//!         serial: SerialConfig {
//!             port: "/dev/ttyUSB0".to_string(), // Or "COM3" on Windows, etc.
//!             timeout: Duration::from_millis(500),
//!             ..Default::default()
//!         },
//!     };
//!     let mut board = tokio_sync::open(&config)?;
//!     board.close_all()?;
//!     println!("Relay 1 open: {}", board.read_relay(1)?);
//!     Ok(())
//! }
//! ```
//!
//! ## TCP Client Example
//!
//! ```ignore
//! use rs485_relay_board::relay_board::RelayBoard;
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut ctx = tokio_modbus::client::sync::tcp::connect_slave(
//!         "192.168.1.100:502".parse()?,
//!         tokio_modbus::Slave(1),
//!     )?;
//!     ctx.set_timeout(Some(Duration::from_secs(1)));
//!
//!     let mut board = RelayBoard::new(ctx);
//!     board.toggle(3)?;
//!     Ok(())
//! }
//! ```

use crate::tokio_common::{map_tokio_result, Error};
use crate::transport::Transport;
use tokio_modbus::prelude::{SyncReader, SyncWriter};

#[cfg(feature = "tokio-rtu-sync")]
use crate::{
    config::{RelayBoardConfig, SerialConfig},
    relay_board::RelayBoard,
    tokio_common::{log_request, Result},
};

impl Transport for tokio_modbus::client::sync::Context {
    type Error = Error;

    fn write_register(&mut self, address: u16, value: u16) -> std::result::Result<(), Error> {
        map_tokio_result(self.write_single_register(address, value))
    }

    fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> std::result::Result<Vec<u16>, Error> {
        map_tokio_result(self.read_holding_registers(address, count))
    }
}

/// Serial Modbus-RTU transport built from a [`SerialConfig`].
///
/// Unless [`SerialConfig::close_port_after_each_call`] is set, the port is
/// opened once and held until the transport is dropped. Otherwise it is
/// opened for each transaction and closed right after it.
#[cfg(feature = "tokio-rtu-sync")]
pub struct SerialTransport {
    config: SerialConfig,
    ctx: Option<tokio_modbus::client::sync::Context>,
}

#[cfg(feature = "tokio-rtu-sync")]
impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("config", &self.config)
            .field("is_open", &self.is_open())
            .finish()
    }
}

#[cfg(feature = "tokio-rtu-sync")]
impl SerialTransport {
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

    /// Returns `true` while the port is held open between transactions.
    pub fn is_open(&self) -> bool {
        self.ctx.is_some()
    }

    fn connect(config: &SerialConfig) -> Result<tokio_modbus::client::sync::Context> {
        log::debug!(
            "Opening {} at {} baud for slave {}",
            config.port,
            config.baud_rate,
            config.address
        );
        let builder = crate::tokio_common::serial_port_builder(&config.port, &config.baud_rate);
        let mut ctx = tokio_modbus::client::sync::rtu::connect_slave(
            &builder,
            tokio_modbus::Slave(*config.address),
        )?;
        ctx.set_timeout(config.timeout);
        Ok(ctx)
    }

    fn with_context<T, F>(&mut self, call: F) -> Result<T>
    where
        F: FnOnce(&mut tokio_modbus::client::sync::Context) -> Result<T>,
    {
        match self.ctx.as_mut() {
            Some(ctx) => call(ctx),
            None => {
                let mut ctx = Self::connect(&self.config)?;
                // The port is closed when `ctx` goes out of scope.
                call(&mut ctx)
            }
        }
    }
}

#[cfg(feature = "tokio-rtu-sync")]
impl Transport for SerialTransport {
    type Error = Error;

    fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        let debug = self.config.debug;
        log_request(
            debug,
            format_args!("write_register(address={address}, value={value:#06x})"),
        );
        let result = self.with_context(|ctx| ctx.write_register(address, value));
        if let Err(err) = &result {
            log_request(debug, format_args!("write_register failed: {err}"));
        }
        result
    }

    fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let debug = self.config.debug;
        log_request(
            debug,
            format_args!("read_registers(address={address}, count={count})"),
        );
        let result = self.with_context(|ctx| ctx.read_registers(address, count));
        match &result {
            Ok(registers) => log_request(debug, format_args!("read_registers -> {registers:?}")),
            Err(err) => log_request(debug, format_args!("read_registers failed: {err}")),
        }
        result
    }
}

/// Opens the serial link described by `config` and returns a ready board.
#[cfg(feature = "tokio-rtu-sync")]
pub fn open(config: &RelayBoardConfig) -> Result<RelayBoard<SerialTransport>> {
    Ok(RelayBoard::with_channels(
        SerialTransport::open(config.serial.clone())?,
        config.channels,
    ))
}
