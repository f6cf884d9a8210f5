//! Task-safe, `async` relay board client.
//!
//! ## Example
//!
//! ```no_run
//! use rs485_relay_board::{
//!     config::RelayBoardConfig, tokio_async, tokio_async_safe_client::SafeClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SafeClient::new(tokio_async::connect_rtu(&RelayBoardConfig::default())?);
//!
//!     let other = client.clone();
//!     let task = tokio::spawn(async move { other.toggle(1).await });
//!     client.momentary(2).await?;
//!     task.await??;
//!     Ok(())
//! }
//! ```

use crate::async_relay_board::AsyncRelayBoard;
use crate::protocol as proto;
use crate::relay_board::Result;
use crate::transport::AsyncTransport;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Clonable handle to a shared [`AsyncRelayBoard`].
///
/// Concurrent callers wait for the lock, so transactions never overlap on
/// the bus.
#[derive(Debug)]
pub struct SafeClient<T> {
    board: Arc<Mutex<AsyncRelayBoard<T>>>,
}

impl<T> Clone for SafeClient<T> {
    fn clone(&self) -> Self {
        Self {
            board: self.board.clone(),
        }
    }
}

impl<T: AsyncTransport> SafeClient<T> {
    /// Wraps a board so it can be shared between callers.
    pub fn new(board: AsyncRelayBoard<T>) -> Self {
        Self {
            board: Arc::new(Mutex::new(board)),
        }
    }

    /// Creates a client from an already shared board.
    pub fn from_shared(board: Arc<Mutex<AsyncRelayBoard<T>>>) -> Self {
        Self { board }
    }

    /// Returns the shared board behind this client.
    pub fn clone_shared(&self) -> Arc<Mutex<AsyncRelayBoard<T>>> {
        self.board.clone()
    }

    /// Locks the board for the duration of one or more transactions.
    pub async fn lock(&self) -> MutexGuard<'_, AsyncRelayBoard<T>> {
        self.board.lock().await
    }

    /// Returns the number of channels of the board.
    pub async fn channels(&self) -> proto::Channels {
        self.board.lock().await.channels()
    }

    /// Opens the relay (COM connected to NO).
    pub async fn open_relay(&self, channel: u16) -> Result<(), T::Error> {
        self.board.lock().await.open_relay(channel).await
    }

    /// Closes the relay (COM connected to NC).
    pub async fn close_relay(&self, channel: u16) -> Result<(), T::Error> {
        self.board.lock().await.close_relay(channel).await
    }

    /// Opens the relay if `state` is `true`, closes it otherwise.
    pub async fn set_relay(&self, channel: u16, state: bool) -> Result<(), T::Error> {
        self.board.lock().await.set_relay(channel, state).await
    }

    /// Inverts the state of the relay.
    pub async fn toggle(&self, channel: u16) -> Result<(), T::Error> {
        self.board.lock().await.toggle(channel).await
    }

    /// Sends the latch command to the relay.
    pub async fn latch(&self, channel: u16) -> Result<(), T::Error> {
        self.board.lock().await.latch(channel).await
    }

    /// Switches the relay for one second.
    pub async fn momentary(&self, channel: u16) -> Result<(), T::Error> {
        self.board.lock().await.momentary(channel).await
    }

    /// Switches the relay for `seconds` (0 to 255).
    pub async fn delay(&self, channel: u16, seconds: u32) -> Result<(), T::Error> {
        self.board.lock().await.delay(channel, seconds).await
    }

    /// Opens every relay of the board with one broadcast write.
    pub async fn open_all(&self) -> Result<(), T::Error> {
        self.board.lock().await.open_all().await
    }

    /// Closes every relay of the board with one broadcast write.
    pub async fn close_all(&self) -> Result<(), T::Error> {
        self.board.lock().await.close_all().await
    }

    /// Reads one relay, `true` meaning open.
    pub async fn read_relay(&self, channel: u16) -> Result<bool, T::Error> {
        self.board.lock().await.read_relay(channel).await
    }

    /// Reads `length` relays starting at `start_channel` in one transaction.
    pub async fn read_relays(&self, start_channel: u16, length: u16) -> Result<Vec<bool>, T::Error> {
        self.board.lock().await.read_relays(start_channel, length).await
    }

    /// Reads every relay of the board in one transaction.
    pub async fn read_all_relays(&self) -> Result<Vec<bool>, T::Error> {
        self.board.lock().await.read_all_relays().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay_board::tests::{Call, MockTransport};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_tasks_are_serialized() {
        let client = SafeClient::new(AsyncRelayBoard::new(MockTransport::default()));

        let tasks: Vec<_> = (1..=4u16)
            .map(|channel| {
                let client = client.clone();
                tokio::spawn(async move {
                    for _ in 0..10 {
                        client.delay(channel, 5).await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let board = client.lock().await;
        let calls = &board.transport().calls;
        assert_eq!(calls.len(), 40);
        assert!(calls
            .iter()
            .all(|call| matches!(call, Call::Write { value: 0x0605, .. })));
    }

    #[tokio::test]
    async fn shared_board_is_the_same_board() {
        let client = SafeClient::new(AsyncRelayBoard::with_channels(
            MockTransport::with_registers(&[0, 1]),
            2,
        ));
        let other = SafeClient::from_shared(client.clone_shared());
        assert_eq!(other.read_all_relays().await.unwrap(), vec![false, true]);
        assert_eq!(client.channels().await.count(), 2);
        assert_eq!(
            client.lock().await.transport().calls,
            vec![Call::Read { address: 1, count: 2 }]
        );
    }
}
