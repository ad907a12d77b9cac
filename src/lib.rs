//! Protocol layer for SPI non-volatile memories.
//!
//! One command codec and transfer engine drive serial EEPROM, FRAM, MRAM and
//! NOR chips, each described by a [ChipProfile] constant (see [devices]).
//! Serial NAND adds the page-buffer sequences on top in [NandController].
//!
//! The bus is an [embedded_hal::spi::SpiDevice] passed by `&mut` to every
//! operation. Each instruction runs in one transaction, so the chip select
//! window is never split or shared.
//!
//! ```ignore
//! use spi_memory::{devices::M95M02, SpiMemory};
//!
//! let eeprom = SpiMemory::new(M95M02);
//! eeprom.enable_write(&mut spi)?;
//! eeprom.write_byte(&mut spi, 22222, 0x83)?;
//! eeprom.wait_until_ready(&mut spi)?;
//! assert_eq!(eeprom.read_byte(&mut spi, 22222)?, 0x83);
//! ```

#![cfg_attr(not(test), no_std)]

// Must be first to share macros across crate
pub(crate) mod fmt;

pub mod address;
pub mod codec;
mod device;
pub mod devices;
pub mod error;
pub mod nand;
pub mod profile;
mod status;

#[cfg(test)]
mod test;

pub use device::{JedecId, SpiMemory};
pub use error::{EccFailure, MemoryError, Precondition};
pub use nand::{BlockProtection, NandController, PageLedger, PageState};
pub use profile::{ChipProfile, Family};
pub use status::{EccResult, StatusSnapshot};
