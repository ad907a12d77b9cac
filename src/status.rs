//! Status register decoding and the write enable / busy state machine.
use embedded_hal::spi::SpiDevice;

use crate::{
    codec::{issue, Frame, Payload},
    device::SpiMemory,
    error::{EccFailure, MemoryError, Precondition},
    profile::{AddressWidth, Busy, Family, Linear, StatusLayout},
};

/// ECC result of the last page read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EccResult {
    NoError,
    /// Bit errors found and corrected
    Corrected,
    /// Uncorrectable errors in a single page
    UncorrectableSingle,
    /// Uncorrectable errors in several pages of a continuous read
    UncorrectableMulti,
}

impl EccResult {
    /// Decode the two ECC status bits, already shifted down
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => EccResult::NoError,
            0b01 => EccResult::Corrected,
            0b10 => EccResult::UncorrectableSingle,
            _ => EccResult::UncorrectableMulti,
        }
    }

    pub const fn is_uncorrectable(&self) -> bool {
        matches!(
            self,
            EccResult::UncorrectableSingle | EccResult::UncorrectableMulti
        )
    }

    /// Turn anything but a clean read into an error
    pub fn check<SE>(self) -> Result<(), MemoryError<SE>> {
        match self {
            EccResult::NoError => Ok(()),
            EccResult::Corrected => Err(MemoryError::Ecc(EccFailure::Corrected)),
            EccResult::UncorrectableSingle => Err(MemoryError::Ecc(EccFailure::Uncorrectable {
                multi_page: false,
            })),
            EccResult::UncorrectableMulti => Err(MemoryError::Ecc(EccFailure::Uncorrectable {
                multi_page: true,
            })),
        }
    }
}

/// Decoded status register.
///
/// Taken fresh from the chip on every query; nothing here is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusSnapshot {
    pub raw: u8,
    pub write_enabled: bool,
    pub busy: bool,
    pub program_failed: bool,
    pub erase_failed: bool,
    /// Only for chips with on-die ECC
    pub ecc: Option<EccResult>,
}

impl StatusSnapshot {
    pub fn decode(raw: u8, layout: &StatusLayout) -> Self {
        let set = |mask: u8| (raw & mask) != 0;
        let ecc = (layout.ecc != 0)
            .then(|| EccResult::from_bits((raw & layout.ecc) >> layout.ecc.trailing_zeros()));
        StatusSnapshot {
            raw,
            write_enabled: set(layout.write_enable),
            busy: set(layout.busy),
            program_failed: set(layout.program_failed),
            erase_failed: set(layout.erase_failed),
            ecc,
        }
    }
}

impl<F: Family> SpiMemory<F> {
    /// Read a status register. `register` is the register address for chips
    /// that have several, `None` for the single status register of the
    /// classic command set.
    pub(crate) fn read_register_at<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        register: Option<u8>,
    ) -> Result<u8, MemoryError<SPI::Error>> {
        let opcode = self.profile.opcodes.read_status;
        let frame = match register {
            Some(address) => Frame::addressed(opcode, address as u32, AddressWidth::One),
            None => Frame::command(opcode),
        };
        let mut value = [0];
        issue(spi, &frame, Payload::In(&mut value))?;
        Ok(value[0])
    }

    /// Read the raw status register
    pub fn read_status_register<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<u8, MemoryError<SPI::Error>> {
        self.read_register_at(spi, self.profile.status.register)
    }

    /// Read and decode the status register
    pub fn read_status<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<StatusSnapshot, MemoryError<SPI::Error>> {
        let raw = self.read_status_register(spi)?;
        Ok(StatusSnapshot::decode(raw, &self.profile.status))
    }

    /// Set the write enable latch.
    ///
    /// Chips ignore this while busy, check [SpiMemory::is_busy] first on
    /// families that have a write cycle.
    pub fn enable_write<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        issue(
            spi,
            &Frame::command(self.profile.opcodes.write_enable),
            Payload::None,
        )
    }

    /// Clear the write enable latch. A write already in progress completes.
    pub fn disable_write<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        issue(
            spi,
            &Frame::command(self.profile.opcodes.write_disable),
            Payload::None,
        )
    }

    pub fn is_write_enabled<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<bool, MemoryError<SPI::Error>> {
        Ok(self.read_status(spi)?.write_enabled)
    }

    /// Check the write preconditions: latch set and no write cycle running
    pub(crate) fn ensure_writable<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<StatusSnapshot, MemoryError<SPI::Error>> {
        let status = self.read_status(spi)?;
        if !status.write_enabled {
            return Err(MemoryError::precondition(Precondition::WriteDisabled));
        }
        if status.busy {
            return Err(MemoryError::precondition(Precondition::Busy));
        }
        Ok(status)
    }

    /// Leave the chip write disabled after a write, for parts that keep the
    /// latch set on their own
    pub(crate) fn finish_write<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<(), MemoryError<SPI::Error>> {
        if self.profile.clears_write_enable {
            Ok(())
        } else {
            self.disable_write(spi)
        }
    }
}

// NAND status registers are written through their own command, see
// NandController::write_register
impl<F: Linear> SpiMemory<F> {
    /// Write the status register (block protection and friends).
    ///
    /// Requires the write enable latch like any other write.
    pub fn write_status_register<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        value: u8,
    ) -> Result<(), MemoryError<SPI::Error>> {
        self.ensure_writable(spi)?;
        let opcode = self.profile.opcodes.write_status;
        let frame = match self.profile.status.register {
            Some(address) => Frame::addressed(opcode, address as u32, AddressWidth::One),
            None => Frame::command(opcode),
        };
        issue(spi, &frame, Payload::Out(&[value]))?;
        self.finish_write(spi)
    }
}

impl<F: Busy> SpiMemory<F> {
    pub fn is_busy<SPI: SpiDevice>(&self, spi: &mut SPI) -> Result<bool, MemoryError<SPI::Error>> {
        Ok(self.read_status(spi)?.busy)
    }

    /// Poll the status register until the busy bit clears.
    ///
    /// There is no timeout and no delay between polls. Returns the status read
    /// that found the chip ready.
    pub fn wait_until_ready<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
    ) -> Result<StatusSnapshot, MemoryError<SPI::Error>> {
        loop {
            let status = self.read_status(spi)?;
            if !status.busy {
                return Ok(status);
            }
        }
    }

    /// [SpiMemory::wait_until_ready] bounded by a caller supplied deadline.
    ///
    /// `expired` is called after every busy poll. Once it returns `true` the
    /// wait gives up with [MemoryError::ProtocolTimeout]. The operation on the
    /// chip is not aborted.
    pub fn wait_until_ready_within<SPI: SpiDevice>(
        &self,
        spi: &mut SPI,
        mut expired: impl FnMut() -> bool,
    ) -> Result<StatusSnapshot, MemoryError<SPI::Error>> {
        loop {
            let status = self.read_status(spi)?;
            if !status.busy {
                return Ok(status);
            }
            if expired() {
                warn!("Gave up waiting for {}", self.profile.name);
                return Err(MemoryError::ProtocolTimeout);
            }
        }
    }
}
