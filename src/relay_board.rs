//! Blocking relay board controller.
//!
//! [`RelayBoard`] turns relay operations into Modbus register transactions
//! on any [`Transport`]. Every operation validates its arguments first and
//! then issues exactly one transaction; nothing is cached and nothing is
//! retried.
//!
//! # Example
//!
//! ```no_run
//! use rs485_relay_board::{config::RelayBoardConfig, tokio_sync};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = RelayBoardConfig::default();
//!     config.serial.port = "/dev/ttyUSB0".to_string();
//!
//!     let mut board = tokio_sync::open(&config)?;
//!     board.open_relay(1)?;
//!     board.delay(2, 30)?;
//!     println!("Relays: {:?}", board.read_all_relays()?);
//!     Ok(())
//! }
//! ```

use crate::events::{EventSink, EventTarget, Events, Operation, RelayEvent};
use crate::protocol::{self as proto, Command, Target};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;

/// Errors returned by the board operations.
#[derive(thiserror::Error, Debug)]
pub enum Error<E> {
    /// The request was rejected before anything was sent.
    #[error(transparent)]
    Protocol(#[from] proto::Error),

    /// The transport failed; the error is passed through untouched.
    #[error("Transport error: {0}")]
    Transport(#[source] E),

    /// The transport answered a read with the wrong number of registers.
    #[error("Unexpected response: expected {expected} registers, got {actual}")]
    UnexpectedResponse { expected: u16, actual: usize },
}

impl<E> Error<E> {
    /// Returns the validation error, if the request never reached the transport.
    pub fn as_protocol(&self) -> Option<&proto::Error> {
        match self {
            Error::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E> = std::result::Result<T, Error<E>>;

/// Controller of one relay board.
///
/// The board keeps no relay state; every read goes to the wire.
#[derive(Debug)]
pub struct RelayBoard<T> {
    transport: T,
    channels: proto::Channels,
    events: Events,
}

impl<T: Transport> RelayBoard<T> {
    /// Creates a controller for a board with [`proto::Channels::DEFAULT`] channels.
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

    /// Fails with [`proto::Error::InvalidDelay`] unless `0 <= seconds <= 255`.
    pub fn check_seconds(seconds: u32) -> std::result::Result<proto::Delay, proto::Error> {
        proto::Delay::try_from(seconds)
    }

    fn write(&mut self, target: Target, command: Command) -> Result<(), T::Error> {
        let request = self.channels.write_request(target, command)?;
        self.transport
            .write_register(request.address, request.value)
            .map_err(Error::Transport)
    }

    fn read(&mut self, request: proto::ReadRegisters) -> Result<Vec<bool>, T::Error> {
        let registers = self
            .transport
            .read_registers(request.address, request.quantity)
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
    pub fn open_relay(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events.emit(
            RelayEvent::new(Operation::Open, EventTarget::Channel(channel)).with_state(true),
        );
        self.write(Target::Channel(channel), Command::Open)
    }

    /// Closes the relay (COM connected to NC).
    pub fn close_relay(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events.emit(
            RelayEvent::new(Operation::Close, EventTarget::Channel(channel)).with_state(false),
        );
        self.write(Target::Channel(channel), Command::Close)
    }

    /// Opens the relay if `state` is `true`, closes it otherwise.
    pub fn set_relay(&mut self, channel: u16, state: bool) -> Result<(), T::Error> {
        if state {
            self.open_relay(channel)
        } else {
            self.close_relay(channel)
        }
    }

    /// Inverts the state of the relay.
    pub fn toggle(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::Toggle, EventTarget::Channel(channel)));
        self.write(Target::Channel(channel), Command::Toggle)
    }

    /// Sends the latch command to the relay.
    pub fn latch(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::Latch, EventTarget::Channel(channel)));
        self.write(Target::Channel(channel), Command::Latch)
    }

    /// Switches the relay for one second. The board times the pulse.
    pub fn momentary(&mut self, channel: u16) -> Result<(), T::Error> {
        self.events.emit(
            RelayEvent::new(Operation::Momentary, EventTarget::Channel(channel))
                .with_duration(Duration::from_secs(1)),
        );
        self.write(Target::Channel(channel), Command::Momentary)
    }

    /// Switches the relay for `seconds` (0 to 255). The board times the
    /// delay and restarts it if the relay is already switched.
    pub fn delay(&mut self, channel: u16, seconds: u32) -> Result<(), T::Error> {
        self.events.emit(
            RelayEvent::new(Operation::Delay, EventTarget::Channel(channel))
                .with_duration(Duration::from_secs(u64::from(seconds))),
        );
        self.check_channel(channel)?;
        let delay = Self::check_seconds(seconds)?;
        self.write(Target::Channel(channel), Command::Delay(delay))
    }

    /// Opens every relay of the board with one broadcast write.
    pub fn open_all(&mut self) -> Result<(), T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::OpenAll, EventTarget::Board).with_state(true));
        self.write(Target::AllChannels, Command::OpenAll)
    }

    /// Closes every relay of the board with one broadcast write.
    pub fn close_all(&mut self) -> Result<(), T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::CloseAll, EventTarget::Board).with_state(false));
        self.write(Target::AllChannels, Command::CloseAll)
    }

    /// Reads one relay, `true` meaning open.
    pub fn read_relay(&mut self, channel: u16) -> Result<bool, T::Error> {
        self.events
            .emit(RelayEvent::new(Operation::ReadRelay, EventTarget::Channel(channel)));
        let request = self.channels.read_request(channel, 1)?;
        Ok(self.read(request)?[0])
    }

    /// Reads `length` relays starting at `start_channel` in one transaction.
    pub fn read_relays(&mut self, start_channel: u16, length: u16) -> Result<Vec<bool>, T::Error> {
        self.events.emit(RelayEvent::new(
            Operation::ReadRelays,
            EventTarget::Range {
                start: start_channel,
                length,
            },
        ));
        let request = self.channels.read_request(start_channel, length)?;
        self.read(request)
    }

    /// Reads every relay of the board in one transaction.
    pub fn read_all_relays(&mut self) -> Result<Vec<bool>, T::Error> {
        self.read_relays(1, self.channels.count())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Mutex;

    #[derive(thiserror::Error, Debug, PartialEq, Eq)]
    #[error("mock transport failure")]
    pub(crate) struct MockError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Call {
        Write { address: u16, value: u16 },
        Read { address: u16, count: u16 },
    }

    /// Records every call and answers reads from a register image.
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        pub(crate) calls: Vec<Call>,
        /// Register image, index 0 is the broadcast register.
        pub(crate) registers: Vec<u16>,
        pub(crate) fail: bool,
        /// Number of registers dropped from every read answer.
        pub(crate) short_by: usize,
    }

    impl MockTransport {
        pub(crate) fn with_registers(registers: &[u16]) -> Self {
            let mut image = vec![0];
            image.extend_from_slice(registers);
            Self {
                registers: image,
                ..Default::default()
            }
        }

        pub(crate) fn respond_read(&self, address: u16, count: u16) -> Vec<u16> {
            let start = usize::from(address);
            let end = start + usize::from(count) - self.short_by.min(usize::from(count));
            (start..end)
                .map(|i| self.registers.get(i).copied().unwrap_or(0))
                .collect()
        }
    }

    impl Transport for MockTransport {
        type Error = MockError;

        fn write_register(&mut self, address: u16, value: u16) -> std::result::Result<(), MockError> {
            self.calls.push(Call::Write { address, value });
            if self.fail {
                Err(MockError)
            } else {
                Ok(())
            }
        }

        fn read_registers(
            &mut self,
            address: u16,
            count: u16,
        ) -> std::result::Result<Vec<u16>, MockError> {
            self.calls.push(Call::Read { address, count });
            if self.fail {
                Err(MockError)
            } else {
                Ok(self.respond_read(address, count))
            }
        }
    }

    fn board() -> RelayBoard<MockTransport> {
        RelayBoard::new(MockTransport::default())
    }

    #[test]
    fn commands_encode_into_single_writes() {
        let mut board = board();
        board.open_relay(5).unwrap();
        board.close_relay(5).unwrap();
        board.toggle(5).unwrap();
        board.latch(5).unwrap();
        board.momentary(5).unwrap();
        board.delay(5, 30).unwrap();
        board.open_all().unwrap();
        board.close_all().unwrap();

        assert_eq!(
            board.transport().calls,
            vec![
                Call::Write { address: 5, value: 0x0100 },
                Call::Write { address: 5, value: 0x0200 },
                Call::Write { address: 5, value: 0x0300 },
                Call::Write { address: 5, value: 0x0400 },
                Call::Write { address: 5, value: 0x0500 },
                Call::Write { address: 5, value: 0x061E },
                Call::Write { address: 0, value: 0x0700 },
                Call::Write { address: 0, value: 0x0800 },
            ]
        );
    }

    #[test]
    fn set_relay_dispatches_to_open_and_close() {
        let mut board = board();
        board.set_relay(3, true).unwrap();
        board.open_relay(3).unwrap();
        board.set_relay(3, false).unwrap();
        board.close_relay(3).unwrap();

        let calls = &board.transport().calls;
        assert_eq!(calls[0], calls[1]);
        assert_eq!(calls[2], calls[3]);
        assert_eq!(calls[0], Call::Write { address: 3, value: 0x0100 });
        assert_eq!(calls[2], Call::Write { address: 3, value: 0x0200 });
    }

    #[test]
    fn invalid_channel_never_reaches_transport() {
        let mut board = board();
        for channel in [0, 17, 100, u16::MAX] {
            assert_matches!(
                board.open_relay(channel),
                Err(Error::Protocol(proto::Error::InvalidChannel { .. }))
            );
            assert_matches!(board.close_relay(channel), Err(Error::Protocol(_)));
            assert_matches!(board.set_relay(channel, true), Err(Error::Protocol(_)));
            assert_matches!(board.toggle(channel), Err(Error::Protocol(_)));
            assert_matches!(board.latch(channel), Err(Error::Protocol(_)));
            assert_matches!(board.momentary(channel), Err(Error::Protocol(_)));
            assert_matches!(
                board.delay(channel, 10),
                Err(Error::Protocol(proto::Error::InvalidChannel { .. }))
            );
            assert_matches!(
                board.read_relay(channel),
                Err(Error::Protocol(proto::Error::InvalidChannel { .. }))
            );
            assert_matches!(
                board.read_relays(channel, 1),
                Err(Error::Protocol(proto::Error::InvalidChannel { .. }))
            );
        }
        assert!(board.transport().calls.is_empty());
    }

    #[test]
    fn invalid_delay_never_reaches_transport() {
        let mut board = board();
        for seconds in [256, 1000, u32::MAX] {
            assert_matches!(
                board.delay(1, seconds),
                Err(Error::Protocol(proto::Error::InvalidDelay(_)))
            );
        }
        assert!(board.transport().calls.is_empty());

        board.delay(1, 0).unwrap();
        board.delay(1, 255).unwrap();
        assert_eq!(
            board.transport().calls,
            vec![
                Call::Write { address: 1, value: 0x0600 },
                Call::Write { address: 1, value: 0x06FF },
            ]
        );
    }

    #[test]
    fn read_relay_is_open_only_for_one() {
        let mut board = RelayBoard::with_channels(MockTransport::with_registers(&[1, 0, 2, 0x0100]), 4);
        assert!(board.read_relay(1).unwrap());
        assert!(!board.read_relay(2).unwrap());
        assert!(!board.read_relay(3).unwrap());
        assert!(!board.read_relay(4).unwrap());
        assert_eq!(
            board.transport().calls[0],
            Call::Read { address: 1, count: 1 }
        );
    }

    #[test]
    fn read_relays_window() {
        let mut board = RelayBoard::with_channels(
            MockTransport::with_registers(&[0, 1, 1, 0, 7, 1, 0, 0]),
            8,
        );
        assert_eq!(
            board.read_relays(2, 4).unwrap(),
            vec![true, true, false, false]
        );
        assert_eq!(board.read_relays(8, 1).unwrap(), vec![false]);
        assert_matches!(
            board.read_relays(8, 2),
            Err(Error::Protocol(proto::Error::InvalidRange {
                start: 8,
                length: 2,
                channels: 8
            }))
        );
        assert_matches!(
            board.read_relays(3, 7),
            Err(Error::Protocol(proto::Error::InvalidRange { .. }))
        );
        assert_eq!(
            board.transport().calls,
            vec![
                Call::Read { address: 2, count: 4 },
                Call::Read { address: 8, count: 1 },
            ]
        );
    }

    #[test]
    fn read_all_relays_is_one_transaction() {
        let mut registers = [0u16; 16];
        registers[0] = 1;
        registers[15] = 1;
        let mut board = RelayBoard::new(MockTransport::with_registers(&registers));

        let states = board.read_all_relays().unwrap();
        assert_eq!(states.len(), 16);
        assert!(states[0]);
        assert!(states[15]);
        assert_eq!(states.iter().filter(|s| **s).count(), 2);
        assert_eq!(
            board.transport().calls,
            vec![Call::Read { address: 1, count: 16 }]
        );
    }

    #[test]
    fn short_answer_is_rejected() {
        let mut transport = MockTransport::with_registers(&[1; 16]);
        transport.short_by = 1;
        let mut board = RelayBoard::new(transport);
        assert_matches!(
            board.read_relays(1, 4),
            Err(Error::UnexpectedResponse {
                expected: 4,
                actual: 3
            })
        );
        assert_matches!(board.read_relay(1), Err(Error::UnexpectedResponse { .. }));
    }

    #[test]
    fn transport_errors_pass_through() {
        let mut board = board();
        board.transport_mut().fail = true;
        assert_matches!(board.open_relay(1), Err(Error::Transport(MockError)));
        assert_matches!(board.open_all(), Err(Error::Transport(MockError)));
        assert_matches!(board.read_relay(1), Err(Error::Transport(MockError)));
        // One attempt each, no retries.
        assert_eq!(board.transport().calls.len(), 3);
    }

    #[test]
    fn close_twice_sends_twice() {
        let mut board = board();
        board.close_relay(7).unwrap();
        board.close_relay(7).unwrap();
        assert_eq!(
            board.transport().calls,
            vec![
                Call::Write { address: 7, value: 0x0200 },
                Call::Write { address: 7, value: 0x0200 },
            ]
        );
    }

    #[test]
    fn events_are_emitted_before_validation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_sink = seen.clone();
        let mut board = board().with_event_sink(Arc::new(move |event: &RelayEvent| {
            seen_in_sink.lock().unwrap().push(*event)
        }));

        board.delay(2, 30).unwrap();
        assert_matches!(board.open_relay(99), Err(Error::Protocol(_)));
        board.close_all().unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                RelayEvent::new(Operation::Delay, EventTarget::Channel(2))
                    .with_duration(Duration::from_secs(30)),
                RelayEvent::new(Operation::Open, EventTarget::Channel(99)).with_state(true),
                RelayEvent::new(Operation::CloseAll, EventTarget::Board).with_state(false),
            ]
        );
        assert_eq!(board.transport().calls.len(), 2);
    }

    #[test]
    fn works_through_mutable_reference() {
        let mut transport = MockTransport::default();
        RelayBoard::with_channels(&mut transport, 8)
            .toggle(8)
            .unwrap();
        assert_eq!(transport.calls, vec![Call::Write { address: 8, value: 0x0300 }]);
    }
}
