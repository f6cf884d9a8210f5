//! Thread-safe, blocking relay board client.
//!
//! Modbus-RTU allows one transaction at a time on the bus. [`SafeClient`]
//! shares a [`RelayBoard`] behind a mutex so that concurrent callers queue
//! up instead of interleaving frames.
//!
//! ## Example
//!
//! ```no_run
//! use rs485_relay_board::{config::RelayBoardConfig, safe_client::SafeClient, tokio_sync};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let board = tokio_sync::open(&RelayBoardConfig::default())?;
//!     let client = SafeClient::new(board);
//!
//!     let worker = {
//!         let client = client.clone();
//!         std::thread::spawn(move || client.toggle(1))
//!     };
//!     client.momentary(2)?;
//!     worker.join().expect("worker panicked")?;
//!     Ok(())
//! }
//! ```

use crate::protocol as proto;
use crate::relay_board::{RelayBoard, Result};
use crate::transport::Transport;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Clonable handle to a shared [`RelayBoard`].
#[derive(Debug)]
pub struct SafeClient<T> {
    board: Arc<Mutex<RelayBoard<T>>>,
}

impl<T> Clone for SafeClient<T> {
    fn clone(&self) -> Self {
        Self {
            board: self.board.clone(),
        }
    }
}

impl<T: Transport> SafeClient<T> {
    /// Wraps a board so it can be shared between callers.
    pub fn new(board: RelayBoard<T>) -> Self {
        Self {
            board: Arc::new(Mutex::new(board)),
        }
    }

    /// Creates a client from an already shared board.
    pub fn from_shared(board: Arc<Mutex<RelayBoard<T>>>) -> Self {
        Self { board }
    }

    /// Returns the shared board behind this client.
    pub fn clone_shared(&self) -> Arc<Mutex<RelayBoard<T>>> {
        self.board.clone()
    }

    /// Locks the board for the duration of one or more transactions.
    ///
    /// The board holds no relay state, so a mutex poisoned by a panicking
    /// holder is taken over as is.
    pub fn lock(&self) -> MutexGuard<'_, RelayBoard<T>> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of channels of the board.
    pub fn channels(&self) -> proto::Channels {
        self.lock().channels()
    }

    /// Opens the relay (COM connected to NO).
    pub fn open_relay(&self, channel: u16) -> Result<(), T::Error> {
        self.lock().open_relay(channel)
    }

    /// Closes the relay (COM connected to NC).
    pub fn close_relay(&self, channel: u16) -> Result<(), T::Error> {
        self.lock().close_relay(channel)
    }

    /// Opens the relay if `state` is `true`, closes it otherwise.
    pub fn set_relay(&self, channel: u16, state: bool) -> Result<(), T::Error> {
        self.lock().set_relay(channel, state)
    }

    /// Inverts the state of the relay.
    pub fn toggle(&self, channel: u16) -> Result<(), T::Error> {
        self.lock().toggle(channel)
    }

    /// Sends the latch command to the relay.
    pub fn latch(&self, channel: u16) -> Result<(), T::Error> {
        self.lock().latch(channel)
    }

    /// Switches the relay for one second.
    pub fn momentary(&self, channel: u16) -> Result<(), T::Error> {
        self.lock().momentary(channel)
    }

    /// Switches the relay for `seconds` (0 to 255).
    pub fn delay(&self, channel: u16, seconds: u32) -> Result<(), T::Error> {
        self.lock().delay(channel, seconds)
    }

    /// Opens every relay of the board with one broadcast write.
    pub fn open_all(&self) -> Result<(), T::Error> {
        self.lock().open_all()
    }

    /// Closes every relay of the board with one broadcast write.
    pub fn close_all(&self) -> Result<(), T::Error> {
        self.lock().close_all()
    }

    /// Reads one relay, `true` meaning open.
    pub fn read_relay(&self, channel: u16) -> Result<bool, T::Error> {
        self.lock().read_relay(channel)
    }

    /// Reads `length` relays starting at `start_channel` in one transaction.
    pub fn read_relays(&self, start_channel: u16, length: u16) -> Result<Vec<bool>, T::Error> {
        self.lock().read_relays(start_channel, length)
    }

    /// Reads every relay of the board in one transaction.
    pub fn read_all_relays(&self) -> Result<Vec<bool>, T::Error> {
        self.lock().read_all_relays()
    }
}
