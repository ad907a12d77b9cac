use core::fmt::Debug;

use embedded_hal::spi::SpiDevice;

use crate::{
    codec::{issue, utils::spi_transaction, Frame, Payload},
    error::MemoryError,
    profile::{ChipProfile, Eeprom, Family, Fram, Linear, Mram, Nor, Paged},
};

/// JEDEC manufacturer and device ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JedecId {
    pub manufacturer: u8,
    pub device: u16,
}

impl JedecId {
    pub(crate) fn from_bytes(bytes: [u8; 3]) -> Self {
        JedecId {
            manufacturer: bytes[0],
            device: u16::from_be_bytes([bytes[1], bytes[2]]),
        }
    }
}

/// Driver for one chip on the bus.
///
/// Holds the chip's [ChipProfile] and nothing else. The bus is not owned:
/// every operation borrows the [SpiDevice] for the chip (bus plus chip
/// select) exclusively for as long as it runs, so two instructions can never
/// interleave on the wire.
///
/// Write operations do not set the write enable latch themselves. Call
/// [SpiMemory::enable_write] first, and on chips with a write cycle wait for
/// the previous write with [SpiMemory::wait_until_ready]. A write issued
/// without these fails with [MemoryError::PreconditionViolated] before
/// anything is written.
#[derive(Clone, Copy)]
pub struct SpiMemory<F> {
    pub(crate) profile: ChipProfile<F>,
}

impl<F: Debug> Debug for SpiMemory<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpiMemory")
            .field("chip", &self.profile.name)
            .field("family", &self.profile.family)
            .finish()
    }
}

impl<F: Family> SpiMemory<F> {
    pub const fn new(profile: ChipProfile<F>) -> Self {
        SpiMemory { profile }
    }

    pub fn profile(&self) -> &ChipProfile<F> {
        &self.profile
    }

    pub(crate) fn read_frame(&self, address: u32) -> Frame {
        Frame::addressed(
            self.profile.opcodes.read,
            address,
            self.profile.address_width,
        )
        .with_dummy(self.profile.read_dummy)
    }

    /// Opcode only instruction
    fn command<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        opcode: u8,
    ) -> Result<(), MemoryError<SPI::Error>> {
        issue(spi, &Frame::command(opcode), Payload::None)
    }
}

/// Direct array access, for every family except serial NAND
impl<F: Linear> SpiMemory<F> {
    /// Read the byte at `address`
    pub fn read_byte<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        address: u32,
    ) -> Result<u8, MemoryError<SPI::Error>> {
        if address > self.profile.max_address {
            return Err(MemoryError::OutOfRange);
        }
        let mut byte = [0];
        issue(spi, &self.read_frame(address), Payload::In(&mut byte))?;
        Ok(byte[0])
    }

    /// Read `buf.len()` consecutive bytes starting at `start`.
    ///
    /// On chips that wrap around the read continues from address 0 once it
    /// passes the top of the array; the chip does this itself within the one
    /// instruction. On other chips such a read is [MemoryError::OutOfRange].
    pub fn read_n_bytes<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        start: u32,
        buf: &mut [u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        if !self.profile.check_span(start, buf.len()) {
            return Err(MemoryError::OutOfRange);
        }
        if buf.is_empty() {
            return Ok(());
        }
        trace!("Reading {} bytes from address {}", buf.len(), start);
        issue(spi, &self.read_frame(start), Payload::In(buf))
    }

    /// Write one byte
    pub fn write_byte<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        address: u32,
        value: u8,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.write_n_bytes(spi, address, &[value])
    }

    /// Write consecutive bytes starting at `start` in one instruction.
    ///
    /// On paged chips the bytes must stay inside one program page, as the
    /// chip would otherwise wrap to the start of the page.
    pub fn write_n_bytes<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        start: u32,
        data: &[u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        if !self.profile.check_span(start, data.len()) {
            return Err(MemoryError::OutOfRange);
        }
        let page_size = self.profile.page_size;
        if page_size != 0 && (start % page_size) as usize + data.len() > page_size as usize {
            return Err(MemoryError::OutOfRange);
        }
        if data.is_empty() {
            return Ok(());
        }
        self.program(spi, start, data)
    }

    fn program<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        start: u32,
        data: &[u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.ensure_writable(spi)?;
        trace!("Writing {} bytes to address {}", data.len(), start);
        let frame = Frame::addressed(
            self.profile.opcodes.write,
            start,
            self.profile.address_width,
        );
        issue(spi, &frame, Payload::Out(data))?;
        self.finish_write(spi)
    }
}

impl<F: Paged> SpiMemory<F> {
    fn check_page<SE>(&self, address: u32, len: usize) -> Result<(), MemoryError<SE>> {
        let page_size = self.profile.page_size;
        if address > self.profile.max_address || len == 0 || len > page_size as usize {
            return Err(MemoryError::OutOfRange);
        }
        if address % page_size != 0 {
            return Err(MemoryError::NotAligned);
        }
        Ok(())
    }

    /// Program up to one page starting at the page aligned `address`
    pub fn write_page<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        address: u32,
        data: &[u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.check_page(address, data.len())?;
        self.program(spi, address, data)
    }

    /// Read up to one page starting at the page aligned `address`
    pub fn read_page<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        address: u32,
        buf: &mut [u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.check_page(address, buf.len())?;
        issue(spi, &self.read_frame(address), Payload::In(buf))
    }
}

impl SpiMemory<Eeprom> {
    fn check_id_span<SE>(&self, offset: u32, len: usize) -> Result<(), MemoryError<SE>> {
        if offset as u64 + len as u64 > self.profile.family.id_page_size as u64 {
            return Err(MemoryError::OutOfRange);
        }
        Ok(())
    }

    /// Read from the identification page
    pub fn read_identification_page<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.check_id_span(offset, buf.len())?;
        let family = self.profile.family;
        let frame = Frame::addressed(family.read_id, offset, self.profile.address_width);
        issue(spi, &frame, Payload::In(buf))
    }

    /// Write to the identification page. Fails on the chip, silently, once
    /// the page is locked.
    pub fn write_identification_page<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        offset: u32,
        data: &[u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.check_id_span(offset, data.len())?;
        self.ensure_writable(spi)?;
        let family = self.profile.family;
        let frame = Frame::addressed(family.write_id, offset, self.profile.address_width);
        issue(spi, &frame, Payload::Out(data))?;
        self.finish_write(spi)
    }

    /// Permanently make the identification page read only
    pub fn lock_identification_page<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.ensure_writable(spi)?;
        let family = self.profile.family;
        let frame = Frame::addressed(
            family.write_id,
            family.lock_select,
            self.profile.address_width,
        );
        debug!("Locking identification page of {}", self.profile.name);
        issue(spi, &frame, Payload::Out(&[0x02]))?;
        self.finish_write(spi)
    }

    pub fn is_identification_page_locked<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<bool, MemoryError<SPI::Error>> {
        let family = self.profile.family;
        let frame = Frame::addressed(
            family.read_id,
            family.lock_select,
            self.profile.address_width,
        );
        let mut status = [0];
        issue(spi, &frame, Payload::In(&mut status))?;
        Ok(status[0] & 0x01 != 0)
    }
}

impl SpiMemory<Fram> {
    /// Read with the fast read instruction, which adds one dummy byte
    pub fn fast_read<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        start: u32,
        buf: &mut [u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        if !self.profile.check_span(start, buf.len()) {
            return Err(MemoryError::OutOfRange);
        }
        let frame = Frame::addressed(
            self.profile.family.fast_read,
            start,
            self.profile.address_width,
        )
        .with_dummy(1);
        issue(spi, &frame, Payload::In(buf))
    }

    /// Enter deep power down. Leave with [SpiMemory::wake_up].
    pub fn deep_power_down<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.command(spi, self.profile.family.deep_power_down)
    }

    /// Enter hibernate. Leave with [SpiMemory::wake_up].
    pub fn hibernate<SPI: SpiDevice>(&self, spi: &mut SPI) -> Result<(), MemoryError<SPI::Error>> {
        self.command(spi, self.profile.family.hibernate)
    }

    /// Pulse chip select, which takes the chip out of deep power down or
    /// hibernate
    pub fn wake_up<SPI: SpiDevice>(&self, spi: &mut SPI) -> Result<(), MemoryError<SPI::Error>> {
        spi_transaction(spi, &mut [])
    }
}

impl SpiMemory<Mram> {
    pub fn sleep<SPI: SpiDevice>(&self, spi: &mut SPI) -> Result<(), MemoryError<SPI::Error>> {
        self.command(spi, self.profile.family.sleep)
    }

    pub fn wake<SPI: SpiDevice>(&self, spi: &mut SPI) -> Result<(), MemoryError<SPI::Error>> {
        self.command(spi, self.profile.family.wake)
    }
}

impl SpiMemory<Nor> {
    fn erase<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        opcode: u8,
        size: u32,
        address: u32,
    ) -> Result<(), MemoryError<SPI::Error>> {
        if address > self.profile.max_address {
            return Err(MemoryError::OutOfRange);
        }
        if address % size != 0 {
            return Err(MemoryError::NotAligned);
        }
        self.ensure_writable(spi)?;
        trace!("Erasing {} bytes from address {}", size, address);
        let frame = Frame::addressed(opcode, address, self.profile.address_width);
        issue(spi, &frame, Payload::None)
    }

    /// Start erasing the subsector at `address`. The chip stays busy until done.
    pub fn erase_subsector<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        address: u32,
    ) -> Result<(), MemoryError<SPI::Error>> {
        let family = self.profile.family;
        self.erase(spi, family.subsector_erase, family.subsector_size, address)
    }

    /// Start erasing the sector at `address`. The chip stays busy until done.
    pub fn erase_sector<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        address: u32,
    ) -> Result<(), MemoryError<SPI::Error>> {
        let family = self.profile.family;
        self.erase(spi, family.sector_erase, family.sector_size, address)
    }

    pub fn read_jedec_id<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<JedecId, MemoryError<SPI::Error>> {
        let mut id = [0; 3];
        issue(
            spi,
            &Frame::command(self.profile.family.read_id),
            Payload::In(&mut id),
        )?;
        Ok(JedecId::from_bytes(id))
    }

    pub fn deep_power_down<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.command(spi, self.profile.family.deep_power_down)
    }

    pub fn release_power_down<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.command(spi, self.profile.family.release_power_down)
    }
}
