//! Command codec.
//!
//! Every instruction is one [Frame] (opcode, address, dummy bytes) followed by
//! an optional [Payload], sent inside a single [SpiDevice::transaction] so the
//! chip select stays asserted for the whole instruction and the bus is held
//! until it is released.
use embedded_hal::spi::{Operation, SpiDevice};

use crate::{error::MemoryError, profile::AddressWidth};
use utils::spi_transaction;

/// Opcode, address and dummy bytes of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub opcode: u8,
    pub address: u32,
    pub width: AddressWidth,
    pub dummy: u8,
}

impl Frame {
    /// Longest encoded frame: opcode, 3 address bytes and one dummy byte
    pub const MAX_LEN: usize = 5;

    /// Opcode only
    pub const fn command(opcode: u8) -> Self {
        Frame {
            opcode,
            address: 0,
            width: AddressWidth::None,
            dummy: 0,
        }
    }

    pub const fn addressed(opcode: u8, address: u32, width: AddressWidth) -> Self {
        Frame {
            opcode,
            address,
            width,
            dummy: 0,
        }
    }

    pub const fn with_dummy(mut self, dummy: u8) -> Self {
        self.dummy = dummy;
        self
    }

    /// Encode into `buf`, returning the used part.
    ///
    /// Only `width` address bytes are produced, most significant first. Any
    /// higher bits of `address` are dropped. Dummy bytes are sent as `0x00`
    /// and capped so the frame fits in [Frame::MAX_LEN].
    pub fn encode<'a>(&self, buf: &'a mut [u8; Self::MAX_LEN]) -> &'a [u8] {
        buf[0] = self.opcode;
        let width = self.width.bytes();
        for i in 0..width {
            let shift = 8 * (width - 1 - i);
            buf[1 + i] = (self.address >> shift) as u8;
        }
        let end = (1 + width + self.dummy as usize).min(Self::MAX_LEN);
        buf[1 + width..end].fill(0);
        &buf[..end]
    }
}

/// Data phase of an instruction
pub enum Payload<'a> {
    None,
    /// Bytes clocked out after the frame
    Out(&'a [u8]),
    /// Buffer filled with the bytes clocked in after the frame
    In(&'a mut [u8]),
}

/// Issue one instruction inside one chip select window
pub fn issue<SPI: SpiDevice>(
    spi: &mut SPI,
    frame: &Frame,
    payload: Payload<'_>,
) -> Result<(), MemoryError<SPI::Error>> {
    let mut buf = [0; Frame::MAX_LEN];
    let header = frame.encode(&mut buf);
    trace!("Issuing opcode {} with {} header bytes", frame.opcode, header.len());
    match payload {
        Payload::None => spi_transaction(spi, &mut [Operation::Write(header)]),
        Payload::Out(data) => {
            spi_transaction(spi, &mut [Operation::Write(header), Operation::Write(data)])
        }
        Payload::In(data) => {
            spi_transaction(spi, &mut [Operation::Write(header), Operation::Read(data)])
        }
    }
}

pub mod utils {
    use embedded_hal::spi::{Operation, SpiDevice};

    use crate::error::MemoryError;

    /// Wrapper around [SpiDevice::transaction] that maps errors
    pub fn spi_transaction<SPI: SpiDevice>(
        spi: &mut SPI,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), MemoryError<SPI::Error>> {
        spi.transaction(operations).map_err(MemoryError::Spi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::SimMemory;
    use crate::devices::CY15B108QN;
    use test_log::test;

    fn encoded(frame: Frame) -> Vec<u8> {
        let mut buf = [0; Frame::MAX_LEN];
        frame.encode(&mut buf).to_vec()
    }

    #[test]
    fn opcode_only() {
        assert_eq!(encoded(Frame::command(0x06)), [0x06]);
    }

    #[test]
    fn address_is_msb_first() {
        let frame = Frame::addressed(0x03, 0x01_5678, AddressWidth::Three);
        assert_eq!(encoded(frame), [0x03, 0x01, 0x56, 0x78]);
        let frame = Frame::addressed(0x0F, 0xC0, AddressWidth::One);
        assert_eq!(encoded(frame), [0x0F, 0xC0]);
    }

    #[test]
    fn wide_address_is_truncated_to_width() {
        let frame = Frame::addressed(0x02, 0x1234_5678, AddressWidth::Three);
        assert_eq!(encoded(frame), [0x02, 0x34, 0x56, 0x78]);
        let frame = Frame::addressed(0x03, 0x1234_5678, AddressWidth::Two);
        assert_eq!(encoded(frame), [0x03, 0x56, 0x78]);
    }

    #[test]
    fn dummy_bytes_follow_address() {
        let frame = Frame::addressed(0x03, 0x0810, AddressWidth::Two).with_dummy(1);
        assert_eq!(encoded(frame), [0x03, 0x08, 0x10, 0x00]);
        // capped to the frame size
        let frame = Frame::addressed(0x0B, 0, AddressWidth::Three).with_dummy(4);
        assert_eq!(encoded(frame).len(), Frame::MAX_LEN);
    }

    #[test]
    fn one_window_per_instruction() {
        let mut spi = SimMemory::new(&CY15B108QN);
        let frame = Frame::addressed(0x02, 0x10, AddressWidth::Three);
        issue(&mut spi, &Frame::command(0x06), Payload::None).unwrap();
        issue(&mut spi, &frame, Payload::Out(&[0xAA, 0xBB])).unwrap();
        let mut read = [0; 2];
        let frame = Frame::addressed(0x03, 0x10, AddressWidth::Three);
        issue(&mut spi, &frame, Payload::In(&mut read)).unwrap();

        assert_eq!(read, [0xAA, 0xBB]);
        let windows = spi.windows();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[1].mosi, [0x02, 0x00, 0x00, 0x10, 0xAA, 0xBB]);
        assert_eq!(windows[2].mosi, [0x03, 0x00, 0x00, 0x10]);
        assert_eq!(windows[2].read, 2);
    }
}
