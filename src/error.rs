/// Errors returned by the memory drivers.
///
/// `SE` is the error type of the [embedded_hal::spi::SpiDevice] in use.
///
/// Range and alignment errors are detected before anything is sent on the
/// bus. Hardware failures are decoded from the status register after the
/// operation has run.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryError<SE> {
    #[error("SpiDevice error: {0:?}")]
    Spi(SE),
    /// Address, page or column outside the addressable array, or a transfer
    /// that does not fit.
    #[error("Address out of range")]
    OutOfRange,
    /// Page operation not starting on a page boundary
    #[error("Address not aligned to a page")]
    NotAligned,
    #[error("Precondition violated: {0:?}")]
    PreconditionViolated(Precondition),
    #[error("ECC: {0:?}")]
    Ecc(EccFailure),
    #[error("Program failed")]
    ProgramFailed,
    #[error("Erase failed")]
    EraseFailed,
    /// Raised only by a caller supplied deadline around a ready wait
    #[error("Timed out waiting for the device")]
    ProtocolTimeout,
}

/// The condition that made the device refuse a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Precondition {
    /// Write enable latch is not set
    WriteDisabled,
    /// An internal operation is still in progress
    Busy,
    /// Target block is covered by the block protection bits
    Protected,
    /// Page has used all of its partial programs since the last erase
    PageExhausted,
    /// A later page of the same block has already been programmed
    OutOfOrder,
    /// The page buffer does not hold the addressed page
    PageNotLoaded,
}

/// ECC outcome reported as an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EccFailure {
    /// Bit errors were found and corrected. Data is good but the block is wearing.
    Corrected,
    /// Data could not be corrected. `multi_page` is set when the failure was
    /// reported across several pages in continuous read mode.
    Uncorrectable { multi_page: bool },
}

impl<SE> MemoryError<SE> {
    pub(crate) fn precondition(condition: Precondition) -> Self {
        MemoryError::PreconditionViolated(condition)
    }
}
