//! NAND page-buffer controller.
//!
//! Serial NAND never reads or programs the array directly. A page is first
//! staged in the chip's data buffer (page read), then streamed out; a program
//! fills the buffer and then commits it to a page (program execute). The
//! controller drives those two-step sequences, interprets the ECC bits, and
//! keeps a [PageLedger] so a page is not programmed more often than the chip
//! allows between erases.
mod ledger;

use core::ops::Range;

use embedded_hal::spi::SpiDevice;

pub use ledger::{PageLedger, PageState};

use crate::{
    address::{BlockIndex, ByteAddress, ColumnAddress, PageIndex},
    codec::{issue, Frame, Payload},
    device::{JedecId, SpiMemory},
    error::{MemoryError, Precondition},
    profile::{AddressWidth, ChipProfile, Nand, NandGeometry},
    status::{EccResult, StatusSnapshot},
};

/// Decoded block protect (BP3..BP0) and top/bottom (TB) bits of the
/// protection register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockProtection {
    pub raw: u8,
}

impl BlockProtection {
    pub const fn from_register(raw: u8) -> Self {
        BlockProtection { raw }
    }

    const fn level(&self) -> u8 {
        (self.raw >> 3) & 0x0F
    }

    /// Protected area counts from block 0 up instead of from the top down
    const fn from_bottom(&self) -> bool {
        self.raw & 0x04 != 0
    }

    /// Blocks covered in an array of `block_count` blocks.
    ///
    /// Levels 1 to 8 protect 1/256 up to 1/2 of the array, anything higher
    /// protects all of it.
    pub fn blocks(&self, block_count: u16) -> Range<u16> {
        let level = self.level();
        if level == 0 {
            return 0..0;
        }
        if level > 8 {
            return 0..block_count;
        }
        let count = block_count >> (9 - level);
        if self.from_bottom() {
            0..count
        } else {
            block_count - count..block_count
        }
    }

    pub fn covers(&self, block: BlockIndex, block_count: u16) -> bool {
        self.blocks(block_count).contains(&block.as_u16())
    }
}

/// Page held in the chip's data buffer
#[derive(Debug, Clone, Copy)]
struct Loaded {
    page: PageIndex,
    /// Outcome of the page read, known once the chip finished it
    ecc: Option<EccResult>,
}

/// Controller for one serial NAND chip.
///
/// The lifecycle ledger lives in `ledger`, caller provided storage of
/// [PageLedger::storage_len] bytes for the chip's page count (24 KiB for a
/// W25N01GV). Pages past what the ledger tracks are rejected as out of
/// range.
///
/// Like [SpiMemory] the controller does not own the bus. It does own the
/// ledger and remembers which page the chip's buffer holds, so it must be
/// the only thing programming the chip.
pub struct NandController<'a> {
    memory: SpiMemory<Nand>,
    ledger: PageLedger<'a>,
    loaded: Option<Loaded>,
}

impl<'a> NandController<'a> {
    pub fn new(profile: ChipProfile<Nand>, ledger: &'a mut [u8]) -> Self {
        let nand = profile.family;
        let ledger = PageLedger::new(
            ledger,
            nand.max_partial_writes,
            nand.geometry.pages_per_block,
        );
        if (ledger.capacity() as u64) < nand.geometry.page_count() as u64 {
            warn!(
                "Tracking {} of {} pages of {}",
                ledger.capacity(),
                nand.geometry.page_count(),
                profile.name
            );
        }
        NandController {
            memory: SpiMemory::new(profile),
            ledger,
            loaded: None,
        }
    }

    pub fn profile(&self) -> &ChipProfile<Nand> {
        self.memory.profile()
    }

    fn nand(&self) -> &Nand {
        &self.memory.profile.family
    }

    fn geometry(&self) -> &NandGeometry {
        &self.nand().geometry
    }

    fn page_count(&self) -> u32 {
        let tracked = u32::try_from(self.ledger.capacity()).unwrap_or(u32::MAX);
        self.geometry().page_count().min(tracked)
    }

    fn check_page<SE>(&self, page: PageIndex) -> Result<(), MemoryError<SE>> {
        if page.as_u32() >= self.page_count() {
            return Err(MemoryError::OutOfRange);
        }
        Ok(())
    }

    fn check_column<SE>(&self, column: ColumnAddress, len: usize) -> Result<(), MemoryError<SE>> {
        if column.as_u16() as usize + len > self.geometry().buffer_size() {
            return Err(MemoryError::OutOfRange);
        }
        Ok(())
    }

    /// Page currently held in the chip's data buffer, as far as this
    /// controller knows
    pub fn loaded_page(&self) -> Option<PageIndex> {
        self.loaded.map(|loaded| loaded.page)
    }

    /// ECC outcome of the loaded page, `None` while nothing is loaded or the
    /// chip is still reading it
    pub fn loaded_ecc(&self) -> Option<EccResult> {
        self.loaded.and_then(|loaded| loaded.ecc)
    }

    /// Lifecycle state of `page`, `None` for pages not tracked
    pub fn page_state(&self, page: PageIndex) -> Option<PageState> {
        self.ledger.state(page)
    }

    // Status and write enable, straight from the transfer engine

    pub fn read_status<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<StatusSnapshot, MemoryError<SPI::Error>> {
        self.memory.read_status(spi)
    }

    pub fn enable_write<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.memory.enable_write(spi)
    }

    pub fn disable_write<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.memory.disable_write(spi)
    }

    pub fn is_write_enabled<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<bool, MemoryError<SPI::Error>> {
        self.memory.is_write_enabled(spi)
    }

    pub fn is_busy<SPI: SpiDevice>(&self, spi: &mut SPI) -> Result<bool, MemoryError<SPI::Error>> {
        self.memory.is_busy(spi)
    }

    pub fn wait_until_ready<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<StatusSnapshot, MemoryError<SPI::Error>> {
        self.memory.wait_until_ready(spi)
    }

    pub fn wait_until_ready_within<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        expired: impl FnMut() -> bool,
    ) -> Result<StatusSnapshot, MemoryError<SPI::Error>> {
        self.memory.wait_until_ready_within(spi, expired)
    }

    // ============ Registers and configuration ============

    /// Read the register at `register` (protection, configuration or status)
    pub fn read_register<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        register: u8,
    ) -> Result<u8, MemoryError<SPI::Error>> {
        self.memory.read_register_at(spi, Some(register))
    }

    /// Write the register at `register`. These writes do not need the write
    /// enable latch.
    pub fn write_register<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        register: u8,
        value: u8,
    ) -> Result<(), MemoryError<SPI::Error>> {
        let frame = Frame::addressed(
            self.memory.profile.opcodes.write_status,
            register as u32,
            AddressWidth::One,
        );
        issue(spi, &frame, Payload::Out(&[value]))
    }

    /// Set or clear `mask` in a register, writing only on change
    fn update_register<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        register: u8,
        mask: u8,
        set: bool,
    ) -> Result<(), MemoryError<SPI::Error>> {
        let value = self.read_register(spi, register)?;
        let updated = if set { value | mask } else { value & !mask };
        if updated != value {
            debug!("Register {} {} -> {}", register, value, updated);
            self.write_register(spi, register, updated)?;
        }
        Ok(())
    }

    /// Turn the on-die ECC on or off. With ECC on the chip owns the spare area.
    pub fn set_ecc_enabled<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        enabled: bool,
    ) -> Result<(), MemoryError<SPI::Error>> {
        let registers = self.nand().registers;
        self.update_register(spi, registers.configuration, registers.ecc_enable, enabled)
    }

    /// Select buffer read mode (`true`) or continuous read mode (`false`).
    ///
    /// In continuous mode the column of a buffer read is ignored and reads
    /// run on into the following pages.
    pub fn set_buffer_mode<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        enabled: bool,
    ) -> Result<(), MemoryError<SPI::Error>> {
        let registers = self.nand().registers;
        self.update_register(spi, registers.configuration, registers.buffer_mode, enabled)
    }

    pub fn block_protection<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<BlockProtection, MemoryError<SPI::Error>> {
        let raw = self.read_register(spi, self.nand().registers.protection)?;
        Ok(BlockProtection::from_register(raw))
    }

    /// Range of blocks that refuse erase and program
    pub fn protected_blocks<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<Range<u16>, MemoryError<SPI::Error>> {
        let block_count = self.geometry().block_count as u16;
        Ok(self.block_protection(spi)?.blocks(block_count))
    }

    /// Clear the block protect and top/bottom bits. Chips power up with the
    /// whole array protected.
    pub fn disable_block_protection<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        let registers = self.nand().registers;
        self.update_register(spi, registers.protection, registers.protection_bits, false)
    }

    fn ensure_unprotected<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        page: PageIndex,
    ) -> Result<(), MemoryError<SPI::Error>> {
        let block = page.as_block_index(self.geometry().pages_per_block);
        let block_count = self.geometry().block_count as u16;
        if self.block_protection(spi)?.covers(block, block_count) {
            return Err(MemoryError::precondition(Precondition::Protected));
        }
        Ok(())
    }

    /// Device reset. The buffer contents are lost.
    pub fn reset<SPI: SpiDevice>(&mut self, spi: &mut SPI) -> Result<(), MemoryError<SPI::Error>> {
        issue(spi, &Frame::command(self.nand().opcodes.reset), Payload::None)?;
        self.loaded = None;
        self.memory.wait_until_ready(spi)?;
        Ok(())
    }

    pub fn read_jedec_id<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<JedecId, MemoryError<SPI::Error>> {
        let mut id = [0; 3];
        let frame = Frame::command(self.nand().opcodes.jedec_id).with_dummy(1);
        issue(spi, &frame, Payload::In(&mut id))?;
        Ok(JedecId::from_bytes(id))
    }

    // ============ Read ============

    /// Stage `page` in the chip's data buffer. The chip is busy until done.
    pub fn load_page_into_buffer<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        page: PageIndex,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.check_page(page)?;
        if self.memory.read_status(spi)?.busy {
            return Err(MemoryError::precondition(Precondition::Busy));
        }
        let frame = Frame::addressed(
            self.nand().opcodes.page_read,
            page.as_u32(),
            AddressWidth::Three,
        );
        issue(spi, &frame, Payload::None)?;
        trace!("Loading page {}", page);
        self.loaded = Some(Loaded { page, ecc: None });
        Ok(())
    }

    /// Wait for a pending page read and take its ECC outcome from the status
    /// register. Returns the outcome for the loaded page, or
    /// [EccResult::NoError] when the buffer holds no page read.
    fn settle_loaded<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
    ) -> Result<EccResult, MemoryError<SPI::Error>> {
        let Some(loaded) = self.loaded else {
            return Ok(EccResult::NoError);
        };
        if let Some(ecc) = loaded.ecc {
            return Ok(ecc);
        }
        let status = self.memory.wait_until_ready(spi)?;
        let ecc = status.ecc.unwrap_or(EccResult::NoError);
        match ecc {
            EccResult::NoError => {}
            EccResult::Corrected => debug!("Corrected bit errors in page {}", loaded.page),
            _ => warn!("Uncorrectable ECC error in page {}", loaded.page),
        }
        self.loaded = Some(Loaded {
            ecc: Some(ecc),
            ..loaded
        });
        Ok(ecc)
    }

    /// Read from the data buffer at `column` without loading a page.
    ///
    /// Waits for a page read still in progress. Returns the ECC outcome of
    /// the loaded page the data came from, [EccResult::NoError] if the
    /// buffer holds no loaded page.
    pub fn read_buffer<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        column: ColumnAddress,
        buf: &mut [u8],
    ) -> Result<EccResult, MemoryError<SPI::Error>> {
        self.check_column(column, buf.len())?;
        let ecc = self.settle_loaded(spi)?;
        let frame = self.memory.read_frame(column.as_u16() as u32);
        issue(spi, &frame, Payload::In(buf))?;
        Ok(ecc)
    }

    /// Read one byte at a linear address, with the ECC outcome of its page.
    /// The page it falls in must be the loaded one.
    pub fn read_byte<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        address: ByteAddress,
    ) -> Result<(u8, EccResult), MemoryError<SPI::Error>> {
        let column_bits = self.geometry().column_bits;
        let page = address.as_page_index(column_bits);
        let column = address.as_column_address(column_bits);
        self.check_page(page)?;
        self.check_column(column, 1)?;
        if self.loaded_page() != Some(page) {
            return Err(MemoryError::precondition(Precondition::PageNotLoaded));
        }
        let mut byte = [0];
        let ecc = self.read_buffer(spi, column, &mut byte)?;
        Ok((byte[0], ecc))
    }

    /// Load `page` and read all of it, spare area included, into `buf`.
    ///
    /// `buf` must be exactly the buffer size. The data is returned whatever
    /// the ECC outcome; use [EccResult::check] to treat anything but a clean
    /// read as an error.
    pub fn read_page<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        page: PageIndex,
        buf: &mut [u8],
    ) -> Result<EccResult, MemoryError<SPI::Error>> {
        if buf.len() != self.geometry().buffer_size() {
            return Err(MemoryError::OutOfRange);
        }
        self.load_page_into_buffer(spi, page)?;
        self.read_buffer(spi, ColumnAddress::new(0), buf)
    }

    // ============ Erase and program ============

    /// Erase the block containing `page` and wait for it to finish
    pub fn erase_block<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        page: PageIndex,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.check_page(page)?;
        self.memory.ensure_writable(spi)?;
        self.ensure_unprotected(spi, page)?;

        let pages_per_block = self.geometry().pages_per_block;
        let block = page.as_block_index(pages_per_block);
        let first = block.first_page(pages_per_block);
        let frame = Frame::addressed(
            self.nand().opcodes.block_erase,
            first.as_u32(),
            AddressWidth::Three,
        );
        issue(spi, &frame, Payload::None)?;
        if self
            .loaded_page()
            .is_some_and(|p| p.as_block_index(pages_per_block) == block)
        {
            self.loaded = None;
        }

        let status = self.memory.wait_until_ready(spi)?;
        if status.erase_failed {
            warn!("Erase of block {} failed", block);
            return Err(MemoryError::EraseFailed);
        }
        self.ledger.erase_block(block);
        debug!("Erased block {}", block);
        Ok(())
    }

    /// Checks shared by every program, none of which touch the buffer
    fn ensure_programmable<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        page: PageIndex,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.check_page(page)?;
        self.ledger
            .check_write(page)
            .map_err(MemoryError::precondition)?;
        self.memory.ensure_writable(spi)?;
        self.ensure_unprotected(spi, page)
    }

    /// Commit the buffer to `page`, wait and record the program
    fn execute<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        page: PageIndex,
    ) -> Result<(), MemoryError<SPI::Error>> {
        let frame = Frame::addressed(
            self.nand().opcodes.program_execute,
            page.as_u32(),
            AddressWidth::Three,
        );
        issue(spi, &frame, Payload::None)?;
        // The buffer now holds what was programmed, not the loaded page
        self.loaded = None;

        let status = self.memory.wait_until_ready(spi)?;
        // counted even if it failed, the page may be partly programmed
        self.ledger.record_write(page);
        if status.program_failed {
            warn!("Program of page {} failed", page);
            return Err(MemoryError::ProgramFailed);
        }
        Ok(())
    }

    /// Program a whole page, spare area included.
    ///
    /// `buf` must be exactly the buffer size. With ECC enabled the chip
    /// replaces the spare area with its own ECC bytes.
    pub fn write_page<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        page: PageIndex,
        buf: &[u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        if buf.len() != self.geometry().buffer_size() {
            return Err(MemoryError::OutOfRange);
        }
        self.ensure_programmable(spi, page)?;
        let frame = Frame::addressed(
            self.nand().opcodes.random_program_load,
            0,
            AddressWidth::Two,
        );
        issue(spi, &frame, Payload::Out(buf))?;
        self.execute(spi, page)
    }

    /// Program `data` at `column` of `page`, leaving the rest of the page as
    /// it is. Counts as one of the page's partial programs.
    pub fn write_partial<SPI: SpiDevice>(
        &mut self,
        spi: &mut SPI,
        page: PageIndex,
        column: ColumnAddress,
        data: &[u8],
    ) -> Result<(), MemoryError<SPI::Error>> {
        if data.is_empty() {
            return Err(MemoryError::OutOfRange);
        }
        self.check_column(column, data.len())?;
        self.ensure_programmable(spi, page)?;
        // Program load fills the rest of the buffer with 0xFF
        let frame = Frame::addressed(
            self.nand().opcodes.program_load,
            column.as_u16() as u32,
            AddressWidth::Two,
        );
        issue(spi, &frame, Payload::Out(data))?;
        self.execute(spi, page)
    }
}
