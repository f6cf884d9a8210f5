//! `async` relay board controller.
//!
//! Same operations and guarantees as [`crate::relay_board::RelayBoard`],
//! over an [`AsyncTransport`]. All methods must be `.await`ed.

use crate::events::{EventSink, EventTarget, Events, Operation, RelayEvent};
use crate::protocol::{self as proto, Command, Target};
use crate::relay_board::{Error, Result};
use crate::transport::AsyncTransport;
use std::sync::Arc;
use std::time::Duration;

/// Asynchronous controller of one relay board.
#[derive(Debug)]
pub struct AsyncRelayBoard<T> {
    transport: T,
    channels: proto::Channels,
    events: Events,
}

impl<T: AsyncTransport> AsyncRelayBoard<T> {
    /// Creates a new controller for a board with the default channel count.
    pub fn new(transport: T) -> Self {
        Self::with_channels(transport, proto::Channels::DEFAULT)
    }

    /// Creates a controller for a board with the given number of channels.
    pub fn with_channels(transport: T, channels: impl Into<proto::Channels>) -> Self {
        Self {
            transport,
            channels: channels.into(),
            events: Events::default(),
        }
    }

    /// Attaches a sink that observes every operation.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events.set(sink);
        self
    }

    /// Returns the number of channels of the board.
    pub fn channels(&self) -> proto::Channels {
        self.channels
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the underlying transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the controller and returns the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Fails with [`proto::Error::InvalidChannel`] unless `1 <= channel <= channels`.
    pub fn check_channel(&self, channel: u16) -> std::result::Result<(), proto::Error> {
        self.channels.check(channel)
    }

    async fn write(&mut self, target: Target, command: Command) -> Result<(), T::Error> {
        let request = self.channels.write_request(target, command)?;
        self.transport
            .write_register(request.address, request.value)
            .await
            .map_err(Error::Transport)
    }

    async fn read(&mut self, request: proto::ReadRegisters) -> Result<Vec<bool>, T::Error> {
        let registers = self
            .transport
            .read_registers(request.address, request.quantity)
            .await
            .map_err(Error::Transport)?;
        if registers.len() != usize::from(request.quantity) {
            return Err(Error::UnexpectedResponse {
                expected: request.quantity,
                actual: registers.len(),
            });
        }
        Ok(request.decode(&registers))
    }

    /// Opens the relay (COM connected to NO).
    pub async fn open_relay(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events.emit(
            RelayEvent::new(Operation::Open, EventTarget::Channel(channel)).with_state(true),
        );
        self.write(Target::Channel(channel), Command::Open).await
    }

    /// Closes the relay (COM connected to NC).
    pub async fn close_relay(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events.emit(
            RelayEvent::new(Operation::Close, EventTarget::Channel(channel)).with_state(false),
        );
        self.write(Target::Channel(channel), Command::Close).await
    }

    /// Opens the relay if `state` is `true`, closes it otherwise.
    pub async fn set_relay(&mut self, channel: u16, state: bool) -> Result<(), T::Error> {
        if state {
            self.open_relay(channel).await
        } else {
            self.close_relay(channel).await
        }
    }

    /// Inverts the state of the relay.
    pub async fn toggle(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::Toggle, EventTarget::Channel(channel)));
        self.write(Target::Channel(channel), Command::Toggle).await
    }

    /// Sends the latch command to the relay.
    pub async fn latch(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::Latch, EventTarget::Channel(channel)));
        self.write(Target::Channel(channel), Command::Latch).await
    }

    /// Switches the relay for one second.
    pub async fn momentary(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events.emit(
            RelayEvent::new(Operation::Momentary, EventTarget::Channel(channel))
                .with_duration(Duration::from_secs(1)),
        );
        self.write(Target::Channel(channel), Command::Momentary).await
    }

    /// Switches the relay for `seconds` (0 to 255).
    pub async fn delay(&mut self, channel: u16, seconds: u32) -> Result<(), T::Error> {
        self.events.emit(
            RelayEvent::new(Operation::Delay, EventTarget::Channel(channel))
                .with_duration(Duration::from_secs(u64::from(seconds))),
        );
        self.check_channel(channel)?;
        let delay = proto::Delay::try_from(seconds)?;
        self.write(Target::Channel(channel), Command::Delay(delay)).await
    }

    /// Opens every relay of the board with one broadcast write.
    pub async fn open_all(&mut self) -> Result<(), T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::OpenAll, EventTarget::Board).with_state(true));
        self.write(Target::AllChannels, Command::OpenAll).await
    }

    /// Closes every relay of the board with one broadcast write.
    pub async fn close_all(&mut self) -> Result<(), T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::CloseAll, EventTarget::Board).with_state(false));
        self.write(Target::AllChannels, Command::CloseAll).await
    }

    /// Reads one relay, `true` meaning open.
    pub async fn read_relay(&mut self, channel: u16) -> Result<bool, T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::ReadRelay, EventTarget::Channel(channel)));
        let request = self.channels.read_request(channel, 1)?;
        Ok(self.read(request).await?[0])
    }

    /// Reads `length` relays starting at `start_channel` in one transaction.
    pub async fn read_relays(
        &mut self,
        start_channel: u16,
        length: u16,
    ) -> Result<Vec<bool>, T::Error> {
        self.events.emit(RelayEvent::new(
            Operation::ReadRelays,
            EventTarget::Range {
                start: start_channel,
                length,
            },
        ));
        let request = self.channels.read_request(start_channel, length)?;
        self.read(request).await
    }

    /// Reads every relay of the board in one transaction.
    pub async fn read_all_relays(&mut self) -> Result<Vec<bool>, T::Error> {
        self.read_relays(1, self.channels.count()).await
    }
}
