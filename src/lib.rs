//! A library for controlling RS485 Modbus relay boards (R4D3B16, R4D8A08 and similar).
//!
//! Each relay channel of these boards is a holding register. Commands are
//! single register writes whose high byte selects the operation (open,
//! close, toggle, latch, momentary, delay, open all, close all) and whose
//! low byte carries the operand. Reading a register returns `1` for an open
//! relay. Open means COM connected to NO with the LED lit; closed (COM to
//! NC) is the power-on state.
//!
//! This crate provides:
//!
//! 1.  **Board controllers**: [`relay_board::RelayBoard`] (blocking) and
//!     [`async_relay_board::AsyncRelayBoard`] (`async`). They validate every
//!     channel and delay before a single byte is sent, then issue exactly one
//!     Modbus transaction per operation over a [`transport::Transport`] or
//!     [`transport::AsyncTransport`].
//!
//! 2.  **Safe Clients**: clonable, thread-safe handles that serialize
//!     access to the bus. See [`safe_client::SafeClient`] (blocking) and
//!     `tokio_async_safe_client::SafeClient` (`async`).
//!
//! 3.  **Transports**: `tokio-modbus` contexts implement the transport
//!     traits; [`tokio_sync`] and [`tokio_async`] add serial transports
//!     built from a [`config::SerialConfig`].
//!
//! ## Features
//!
//! - `tokio-rtu-sync` (default): blocking Modbus RTU over `tokio-serial`.
//! - `tokio-tcp-sync`: blocking Modbus TCP, for boards behind a gateway.
//! - `tokio-rtu` / `tokio-tcp`: the `async` variants.
//! - `serde` (default): (de)serialization and YAML configuration files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rs485_relay_board::{config::RelayBoardConfig, tokio_sync};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayBoardConfig::from_yaml_str(
//!         "channels: 16\nserial:\n  port: /dev/ttyUSB0\n  address: 1\n",
//!     )?;
//!     let mut board = tokio_sync::open(&config)?;
//!
//!     board.open_relay(5)?;
//!     board.delay(6, 30)?;
//!     println!("Relay states: {:?}", board.read_all_relays()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! Operations can be observed through an [`events::EventSink`], e.g.
//! [`events::LogEventSink`] to log them with the `log` crate.

pub mod async_relay_board;
pub mod config;
pub mod events;
pub mod protocol;
pub mod relay_board;
pub mod safe_client;
pub mod transport;

#[cfg(any(
    feature = "tokio-rtu-sync",
    feature = "tokio-tcp-sync",
    feature = "tokio-rtu",
    feature = "tokio-tcp"
))]
pub mod tokio_common;

#[cfg_attr(
    docsrs,
    doc(cfg(any(feature = "tokio-rtu-sync", feature = "tokio-tcp-sync")))
)]
#[cfg(any(feature = "tokio-rtu-sync", feature = "tokio-tcp-sync"))]
pub mod tokio_sync;

#[cfg_attr(docsrs, doc(cfg(any(feature = "tokio-rtu", feature = "tokio-tcp"))))]
#[cfg(any(feature = "tokio-rtu", feature = "tokio-tcp"))]
pub mod tokio_async;

#[cfg_attr(docsrs, doc(cfg(any(feature = "tokio-rtu", feature = "tokio-tcp"))))]
#[cfg(any(feature = "tokio-rtu", feature = "tokio-tcp"))]
pub mod tokio_async_safe_client;
