//! Chip profiles.
//!
//! A [ChipProfile] is the immutable description of one memory chip: its
//! opcodes, how it frames addresses, how big it is and how its status
//! register is laid out. The same codec and transfer engine serve every
//! family; the family value `F` carries the few opcodes that only one family
//! has and selects the capability traits ([Linear], [Busy], [Paged]) that
//! gate the operations the family supports.
use core::fmt::Debug;

use embedded_hal::spi::Mode;

/// Number of address bytes clocked out after an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressWidth {
    None,
    One,
    Two,
    Three,
}

impl AddressWidth {
    pub const fn bytes(self) -> usize {
        match self {
            AddressWidth::None => 0,
            AddressWidth::One => 1,
            AddressWidth::Two => 2,
            AddressWidth::Three => 3,
        }
    }
}

/// Clock settings the SPI peripheral must be configured with for this chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Maximum clock frequency in Hz for single transfer rate commands
    pub frequency: u32,
    pub mode: Mode,
}

/// Opcodes shared by every family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpcodeTable {
    pub write_enable: u8,
    pub write_disable: u8,
    pub read_status: u8,
    pub write_status: u8,
    pub read: u8,
    pub write: u8,
}

/// Where the status bits live.
///
/// A mask of `0` means the chip has no such bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusLayout {
    /// Register address sent after the status opcode, for chips with
    /// addressable status registers
    pub register: Option<u8>,
    pub write_enable: u8,
    pub busy: u8,
    pub program_failed: u8,
    pub erase_failed: u8,
    /// Two adjacent bits holding the ECC result
    pub ecc: u8,
}

impl StatusLayout {
    /// Layout of the classic 25-series status register: WIP in bit 0, WEL in bit 1
    pub const fn classic(busy: bool) -> Self {
        StatusLayout {
            register: None,
            write_enable: 0x02,
            busy: if busy { 0x01 } else { 0x00 },
            program_failed: 0,
            erase_failed: 0,
            ecc: 0,
        }
    }
}

/// Immutable description of one chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipProfile<F> {
    pub name: &'static str,
    pub opcodes: OpcodeTable,
    /// Width of the address field on array read and write commands
    pub address_width: AddressWidth,
    /// Dummy bytes between the address and the data of a READ
    pub read_dummy: u8,
    /// Highest valid byte address
    pub max_address: u32,
    /// Program page size in bytes, `0` for byte addressable chips
    pub page_size: u32,
    pub bus: BusConfig,
    pub status: StatusLayout,
    /// Whether sequential transfers roll over from `max_address` to `0`
    pub wraparound: bool,
    /// Whether the chip clears WEL by itself when a write completes. When it
    /// does not, the driver sends WRDI after every write.
    pub clears_write_enable: bool,
    /// Family specific opcodes and geometry
    pub family: F,
}

impl<F> ChipProfile<F> {
    /// Array size in bytes
    pub const fn capacity(&self) -> u32 {
        self.max_address.wrapping_add(1)
    }

    /// Check `len` bytes starting at `start` against the array bounds.
    ///
    /// Transfers that run past the top of the array are accepted only when the
    /// profile wraps around.
    pub(crate) fn check_span(&self, start: u32, len: usize) -> bool {
        if start > self.max_address {
            return false;
        }
        if len == 0 || self.wraparound {
            return true;
        }
        let last = start as u64 + len as u64 - 1;
        last <= self.max_address as u64
    }
}

/// A memory family.
pub trait Family: Debug + Clone + Copy {
    const NAME: &'static str;
}

/// Families whose array is read and written directly at a linear byte
/// address.
///
/// Serial NAND is not one of them: its array is only reached through the
/// page buffer, see [crate::NandController].
///
/// ```compile_fail
/// use spi_memory::{devices::W25N01GV, SpiMemory};
///
/// fn write<SPI: embedded_hal::spi::SpiDevice>(spi: &mut SPI) {
///     let nand = SpiMemory::new(W25N01GV);
///     let _ = nand.write_byte(spi, 0, 0x83);
/// }
/// ```
pub trait Linear: Family {}

/// Families with an internal write cycle and therefore a busy bit
pub trait Busy: Family {}

/// Families whose writes are bounded by program pages
pub trait Paged: Linear {}

/// Serial EEPROM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Eeprom {
    /// Read identification page, also read lock status
    pub read_id: u8,
    /// Write identification page, also lock identification page
    pub write_id: u8,
    /// Address bit selecting the lock status instead of the page contents
    pub lock_select: u32,
    pub id_page_size: u32,
}

/// Ferroelectric RAM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fram {
    pub fast_read: u8,
    pub deep_power_down: u8,
    pub hibernate: u8,
}

/// Magnetoresistive RAM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mram {
    pub sleep: u8,
    pub wake: u8,
}

/// Serial NOR flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Nor {
    pub subsector_erase: u8,
    pub sector_erase: u8,
    pub subsector_size: u32,
    pub sector_size: u32,
    pub read_id: u8,
    pub deep_power_down: u8,
    pub release_power_down: u8,
}

/// Serial NAND flash with an internal page buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Nand {
    pub geometry: NandGeometry,
    pub opcodes: NandOpcodes,
    pub registers: NandRegisters,
    /// Partial programs allowed on one page between erases
    pub max_partial_writes: u8,
    pub manufacturer_id: u8,
    pub device_id: u16,
}

/// NAND array layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NandGeometry {
    /// Data bytes per page
    pub page_size: u32,
    /// Spare bytes per page, used for ECC when the chip has it enabled
    pub spare_size: u32,
    pub pages_per_block: u32,
    pub block_count: u32,
    /// Column bits in a linear byte address
    pub column_bits: u32,
}

impl NandGeometry {
    /// Bytes in the page buffer, spare area included
    pub const fn buffer_size(&self) -> usize {
        (self.page_size + self.spare_size) as usize
    }

    pub const fn page_count(&self) -> u32 {
        self.pages_per_block * self.block_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NandOpcodes {
    pub reset: u8,
    pub jedec_id: u8,
    pub page_read: u8,
    pub block_erase: u8,
    pub program_load: u8,
    pub random_program_load: u8,
    pub program_execute: u8,
}

/// Register addresses and bits of the NAND configuration registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NandRegisters {
    pub protection: u8,
    pub configuration: u8,
    pub status: u8,
    /// Block protect and top/bottom bits in the protection register
    pub protection_bits: u8,
    /// ECC enable bit in the configuration register
    pub ecc_enable: u8,
    /// Buffer read mode bit in the configuration register
    pub buffer_mode: u8,
}

impl Family for Eeprom {
    const NAME: &'static str = "EEPROM";
}
impl Linear for Eeprom {}
impl Busy for Eeprom {}
impl Paged for Eeprom {}

impl Family for Fram {
    const NAME: &'static str = "FRAM";
}
impl Linear for Fram {}

impl Family for Mram {
    const NAME: &'static str = "MRAM";
}
impl Linear for Mram {}

impl Family for Nor {
    const NAME: &'static str = "NOR";
}
impl Linear for Nor {}
impl Busy for Nor {}
impl Paged for Nor {}

impl Family for Nand {
    const NAME: &'static str = "NAND";
}
impl Busy for Nand {}
