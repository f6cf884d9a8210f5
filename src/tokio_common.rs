//! Common pieces of the `tokio-modbus` based transports.
//!
//! It defines the `Error` enum, which encapsulates all possible communication errors.

/// Represents all possible errors that can occur during Modbus communication.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Wraps `tokio_modbus::ExceptionCode`.
    #[error(transparent)]
    TokioExceptionError(#[from] tokio_modbus::ExceptionCode),

    /// Wraps `tokio_modbus::Error`.
    #[error(transparent)]
    TokioError(#[from] tokio_modbus::Error),
}

impl Error {
    /// Returns `true` if the board did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::TokioError(tokio_modbus::Error::Transport(err))
                if err.kind() == std::io::ErrorKind::TimedOut
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::TokioError(tokio_modbus::Error::Transport(err))
    }
}

/// The result type for tokio operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Maps the nested `tokio-modbus` result to our result.
pub(crate) fn map_tokio_result<T>(result: tokio_modbus::Result<T>) -> Result<T> {
    match result {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(err.into()), // Modbus exception
        Err(err) => Err(err.into()),     // IO error
    }
}

/// Logs a request, at debug level when tracing was asked for.
#[cfg(any(feature = "tokio-rtu-sync", feature = "tokio-rtu"))]
pub(crate) fn log_request(debug: bool, request: std::fmt::Arguments<'_>) {
    if debug {
        log::debug!("{request}");
    } else {
        log::trace!("{request}");
    }
}

/// The parity used for serial communication.
#[cfg(any(feature = "tokio-rtu-sync", feature = "tokio-rtu"))]
pub const PARITY: &tokio_serial::Parity = &tokio_serial::Parity::None;
/// The number of stop bits used for serial communication.
#[cfg(any(feature = "tokio-rtu-sync", feature = "tokio-rtu"))]
pub const STOP_BITS: &tokio_serial::StopBits = &tokio_serial::StopBits::One;
/// The number of data bits used for serial communication.
#[cfg(any(feature = "tokio-rtu-sync", feature = "tokio-rtu"))]
pub const DATA_BITS: &tokio_serial::DataBits = &tokio_serial::DataBits::Eight;

/// Creates a `tokio_serial::SerialPortBuilder` with the specified settings.
///
/// # Arguments
///
/// * `device` - The path to the serial port device (e.g., `/dev/ttyUSB0`).
/// * `baud_rate` - The baud rate for the serial communication.
#[cfg(any(feature = "tokio-rtu-sync", feature = "tokio-rtu"))]
pub fn serial_port_builder(
    device: &str,
    baud_rate: &crate::protocol::BaudRate,
) -> tokio_serial::SerialPortBuilder {
    tokio_serial::new(device, u32::from(*baud_rate))
        .parity(*PARITY)
        .stop_bits(*STOP_BITS)
        .data_bits(*DATA_BITS)
        .flow_control(tokio_serial::FlowControl::None)
}
