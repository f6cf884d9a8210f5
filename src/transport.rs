//! The narrow interface between a board and the Modbus link it talks over.
//!
//! A transport executes exactly one Modbus transaction per call. Framing,
//! CRC, serial timing and timeouts are its business; the boards only
//! validate and encode requests.

use std::future::Future;

/// Blocking Modbus transport.
pub trait Transport {
    /// Failure of the underlying exchange (I/O error, timeout, exception, ...).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes one holding register with function code 6.
    fn write_register(&mut self, address: u16, value: u16) -> Result<(), Self::Error>;

    /// Reads `count` consecutive holding registers starting at `address`.
    fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn write_register(&mut self, address: u16, value: u16) -> Result<(), Self::Error> {
        (**self).write_register(address, value)
    }

    fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, Self::Error> {
        (**self).read_registers(address, count)
    }
}

/// `async` counterpart of [`Transport`].
pub trait AsyncTransport: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, Self::Error>> + Send;
}
