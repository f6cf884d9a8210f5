//! Register map and command encoding of the RS485 Modbus relay boards
//! (R4D3B16, R4D8A08 and compatible).
//!
//! Every relay channel is mapped to one holding register whose address is
//! the 1-based channel number. Writing a register with function code 6
//! issues a command: the high byte selects the operation, the low byte
//! carries its operand. Reading the register returns `1` while the relay
//! is open.
//!
//! Nothing in this module performs I/O. The functions validate their
//! input and produce the [`WriteRegister`] or [`ReadRegisters`] request
//! that a transport has to execute.

use std::fmt;
use std::ops::Deref;
use std::time::Duration;

/// Errors raised while validating a request, before anything is sent.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid channel {channel}, expected a value between 1 and {channels}")]
    InvalidChannel { channel: u16, channels: u16 },

    #[error("Invalid delay of {0} seconds, expected a value between 0 and 255")]
    InvalidDelay(u64),

    #[error("Invalid range: {length} channels starting at channel {start} exceed the {channels} channels of the board")]
    InvalidRange { start: u16, length: u16, channels: u16 },

    #[error("Command '{command}' cannot be sent to {target}")]
    InvalidTarget { command: Command, target: Target },

    #[error("Slave address {0} out of range, expected a value between 0 and 247")]
    AddressOutOfRange(u8),
}

/// Register address used for commands that apply to every channel.
///
/// This address is never a valid channel number.
pub const BROADCAST_REG_ADDR: u16 = 0x0000;

/// Register value reported for an open relay.
pub const RELAY_OPEN_REG_VALUE: u16 = 0x0001;

/// Interprets a relay register read from the board.
///
/// Only the exact value `1` means open (COM connected to NO); every other
/// value reads as closed.
pub fn decode_relay_state(value: u16) -> bool {
    value == RELAY_OPEN_REG_VALUE
}

/// Number of seconds a relay is held by [`Command::Delay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Delay(u8);

impl Delay {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 255;

    /// Returns the delay as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.0))
    }
}

impl Deref for Delay {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u8> for Delay {
    fn from(seconds: u8) -> Self {
        Self(seconds)
    }
}

impl TryFrom<u32> for Delay {
    type Error = Error;

    fn try_from(seconds: u32) -> Result<Self, Self::Error> {
        u8::try_from(seconds)
            .map(Self)
            .map_err(|_| Error::InvalidDelay(u64::from(seconds)))
    }
}

impl TryFrom<Duration> for Delay {
    type Error = Error;

    /// Sub-second fractions are truncated.
    fn try_from(duration: Duration) -> Result<Self, Self::Error> {
        let seconds = duration.as_secs();
        u8::try_from(seconds)
            .map(Self)
            .map_err(|_| Error::InvalidDelay(seconds))
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// A relay command, encoded into a single register write.
///
/// `OpenAll` and `CloseAll` are broadcast commands and only valid for
/// [`Target::AllChannels`]; the others address exactly one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Connects COM to NO, the LED lights up.
    Open,
    /// Connects COM to NC, the power-on state of every relay.
    Close,
    /// Inverts the current state (self-locking).
    Toggle,
    /// Inter-locking. The boards seen so far handle it like `Open`.
    Latch,
    /// Switches the relay for one second, the board reverts it on its own.
    Momentary,
    /// Switches the relay for the given time, the board reverts it on its own.
    /// Restarts the timer if the relay is already switched.
    Delay(Delay),
    /// Opens every relay of the board.
    OpenAll,
    /// Closes every relay of the board.
    CloseAll,
}

impl Command {
    /// The command code carried in the high byte of the register value.
    pub const fn code(&self) -> u8 {
        match self {
            Command::Open => 0x01,
            Command::Close => 0x02,
            Command::Toggle => 0x03,
            Command::Latch => 0x04,
            Command::Momentary => 0x05,
            Command::Delay(_) => 0x06,
            Command::OpenAll => 0x07,
            Command::CloseAll => 0x08,
        }
    }

    /// The operand carried in the low byte of the register value.
    pub const fn operand(&self) -> u8 {
        match self {
            Command::Delay(delay) => delay.0,
            _ => 0x00,
        }
    }

    pub const fn is_broadcast(&self) -> bool {
        matches!(self, Command::OpenAll | Command::CloseAll)
    }

    pub fn encode_for_write_register(&self) -> u16 {
        (u16::from(self.code()) << 8) | u16::from(self.operand())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Open => write!(f, "open"),
            Command::Close => write!(f, "close"),
            Command::Toggle => write!(f, "toggle"),
            Command::Latch => write!(f, "latch"),
            Command::Momentary => write!(f, "momentary"),
            Command::Delay(delay) => write!(f, "delay {delay}"),
            Command::OpenAll => write!(f, "open all"),
            Command::CloseAll => write!(f, "close all"),
        }
    }
}

/// Destination of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A single, 1-based channel. Not yet validated.
    Channel(u16),
    /// Every channel, through the broadcast register.
    AllChannels,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Channel(channel) => write!(f, "channel {channel}"),
            Target::AllChannels => write!(f, "all channels"),
        }
    }
}

/// A validated "write single register" (function code 6) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRegister {
    pub address: u16,
    pub value: u16,
}

/// A validated "read holding registers" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRegisters {
    pub address: u16,
    pub quantity: u16,
}

impl ReadRegisters {
    /// Decodes the registers returned for this request into relay states,
    /// in ascending channel order.
    pub fn decode(&self, registers: &[u16]) -> Vec<bool> {
        registers.iter().copied().map(decode_relay_state).collect()
    }
}

/// The channel layout of a board.
///
/// Channels are numbered from `1` to [`Channels::count`]; every request
/// is checked against this range before it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Channels(u16);

impl Channels {
    pub const DEFAULT: Channels = Channels(16);

    /// Creates a layout with `count` channels.
    ///
    /// A count of `0` is accepted, but then every per-channel request fails.
    pub const fn new(count: u16) -> Self {
        Self(count)
    }

    pub const fn count(&self) -> u16 {
        self.0
    }

    /// Fails with [`Error::InvalidChannel`] unless `1 <= channel <= count`.
    pub fn check(&self, channel: u16) -> Result<(), Error> {
        if (1..=self.0).contains(&channel) {
            Ok(())
        } else {
            Err(Error::InvalidChannel {
                channel,
                channels: self.0,
            })
        }
    }

    /// Validates `target` and `command` and builds the register write.
    pub fn write_request(&self, target: Target, command: Command) -> Result<WriteRegister, Error> {
        let address = match target {
            Target::Channel(channel) if !command.is_broadcast() => {
                self.check(channel)?;
                channel
            }
            Target::AllChannels if command.is_broadcast() => BROADCAST_REG_ADDR,
            _ => return Err(Error::InvalidTarget { command, target }),
        };
        Ok(WriteRegister {
            address,
            value: command.encode_for_write_register(),
        })
    }

    /// Builds the read of `length` relays starting at `start`.
    ///
    /// Fails with [`Error::InvalidRange`] if the window does not fit into
    /// the board.
    pub fn read_request(&self, start: u16, length: u16) -> Result<ReadRegisters, Error> {
        self.check(start)?;
        if self.0 - start + 1 < length {
            return Err(Error::InvalidRange {
                start,
                length,
                channels: self.0,
            });
        }
        Ok(ReadRegisters {
            address: start,
            quantity: length,
        })
    }

    /// Builds the read of every relay of the board.
    pub fn read_all_request(&self) -> Result<ReadRegisters, Error> {
        self.read_request(1, self.0)
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u16> for Channels {
    fn from(count: u16) -> Self {
        Self(count)
    }
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Modbus slave address of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct Address(u8);

impl Address {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 247;
}

impl Deref for Address {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for Address {
    fn default() -> Self {
        Self(0x01)
    }
}

impl TryFrom<u8> for Address {
    type Error = Error;

    fn try_from(address: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&address) {
            Ok(Self(address))
        } else {
            Err(Error::AddressOutOfRange(address))
        }
    }
}

impl From<Address> for u8 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Serial baud rate of the link.
///
/// Any value is carried as-is; the serial port rejects rates it cannot do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct BaudRate(u32);

impl BaudRate {
    pub const DEFAULT: Self = Self(9600);
}

impl Deref for BaudRate {
    type Target = u32;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for BaudRate {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<BaudRate> for u32 {
    fn from(baud_rate: BaudRate) -> Self {
        baud_rate.0
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
