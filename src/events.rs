//! Observability side-channel.
//!
//! A board can be given an [`EventSink`] that receives one [`RelayEvent`]
//! per public operation, before the request is validated. Sinks only
//! observe: they cannot fail an operation or change what is sent.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The public operation that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Close,
    Toggle,
    Latch,
    Momentary,
    Delay,
    OpenAll,
    CloseAll,
    ReadRelay,
    ReadRelays,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Open => "open_relay",
            Operation::Close => "close_relay",
            Operation::Toggle => "toggle",
            Operation::Latch => "latch",
            Operation::Momentary => "momentary",
            Operation::Delay => "delay",
            Operation::OpenAll => "open_all",
            Operation::CloseAll => "close_all",
            Operation::ReadRelay => "read_relay",
            Operation::ReadRelays => "read_relays",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an operation was aimed at, exactly as the caller asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Channel(u16),
    Range { start: u16, length: u16 },
    /// The whole board. Displayed as `-1`.
    Board,
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTarget::Channel(channel) => write!(f, "{channel}"),
            EventTarget::Range { start, length } => write!(f, "{start}+{length}"),
            EventTarget::Board => f.write_str("-1"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayEvent {
    pub operation: Operation,
    pub target: EventTarget,
    /// State the relay is driven to, `true` meaning open. `None` when the
    /// operation does not set a fixed state.
    pub state: Option<bool>,
    /// Hold time of timed operations.
    pub duration: Option<Duration>,
}

impl RelayEvent {
    pub fn new(operation: Operation, target: EventTarget) -> Self {
        Self {
            operation,
            target,
            state: None,
            duration: None,
        }
    }

    pub fn with_state(mut self, state: bool) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

impl fmt::Display for RelayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation={} channel={}", self.operation, self.target)?;
        if let Some(state) = self.state {
            write!(f, " state={}", if state { "open" } else { "closed" })?;
        }
        if let Some(duration) = self.duration {
            write!(f, " duration={}s", duration.as_secs())?;
        }
        Ok(())
    }
}

/// Receiver of [`RelayEvent`]s.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &RelayEvent);
}

impl<F> EventSink for F
where
    F: Fn(&RelayEvent) + Send + Sync,
{
    fn record(&self, event: &RelayEvent) {
        self(event)
    }
}

/// Writes every event to the `log` facade.
#[derive(Debug, Clone)]
pub struct LogEventSink {
    level: log::Level,
}

impl LogEventSink {
    pub const TARGET: &'static str = "rs485_relay_board::events";

    pub fn new(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new(log::Level::Info)
    }
}

impl EventSink for LogEventSink {
    fn record(&self, event: &RelayEvent) {
        log::log!(target: Self::TARGET, self.level, "{event}");
    }
}

/// Optional sink shared by the board implementations.
#[derive(Clone, Default)]
pub(crate) struct Events(Option<Arc<dyn EventSink>>);

impl Events {
    pub(crate) fn set(&mut self, sink: Arc<dyn EventSink>) {
        self.0 = Some(sink);
    }

    pub(crate) fn emit(&self, event: RelayEvent) {
        if let Some(sink) = &self.0 {
            sink.record(&event);
        }
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Events")
            .field(&self.0.as_ref().map(|_| "EventSink"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn display_whole_board_as_sentinel() {
        let event = RelayEvent::new(Operation::OpenAll, EventTarget::Board).with_state(true);
        assert_eq!(event.to_string(), "operation=open_all channel=-1 state=open");
    }

    #[test]
    fn display_timed_event() {
        let event = RelayEvent::new(Operation::Delay, EventTarget::Channel(3))
            .with_duration(Duration::from_secs(30));
        assert_eq!(event.to_string(), "operation=delay channel=3 duration=30s");
    }

    #[test]
    fn closure_sink_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_sink = seen.clone();
        let mut events = Events::default();
        events.set(Arc::new(move |event: &RelayEvent| {
            seen_in_sink.lock().unwrap().push(*event)
        }));

        events.emit(RelayEvent::new(Operation::Toggle, EventTarget::Channel(2)));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![RelayEvent::new(Operation::Toggle, EventTarget::Channel(2))]
        );
    }

    #[test]
    fn no_sink_is_silent() {
        Events::default().emit(RelayEvent::new(Operation::Close, EventTarget::Channel(1)));
    }
}
