use core::fmt::Display;

/// Index of a page in a NAND array
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageIndex(pub(crate) u32);

impl PageIndex {
    pub const fn new(index: u32) -> Self {
        PageIndex(index)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Block containing this page
    pub const fn as_block_index(&self, pages_per_block: u32) -> BlockIndex {
        BlockIndex((self.0 / pages_per_block) as u16)
    }

    /// Position of the page inside its block
    pub const fn offset_in_block(&self, pages_per_block: u32) -> u32 {
        self.0 % pages_per_block
    }

    /// Convert from a [BlockIndex], giving the first page of the block
    pub const fn from_block_index(block: BlockIndex, pages_per_block: u32) -> Self {
        PageIndex(block.0 as u32 * pages_per_block)
    }
}

impl From<PageIndex> for u32 {
    fn from(pa: PageIndex) -> Self {
        pa.as_u32()
    }
}

impl Display for PageIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Index of an erase block in a NAND array
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockIndex(pub(crate) u16);

impl BlockIndex {
    pub const fn new(index: u16) -> Self {
        BlockIndex(index)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    pub const fn first_page(&self, pages_per_block: u32) -> PageIndex {
        PageIndex::from_block_index(*self, pages_per_block)
    }
}

impl From<BlockIndex> for u16 {
    fn from(bi: BlockIndex) -> Self {
        bi.as_u16()
    }
}

impl Display for BlockIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Linear byte address in a NAND array.
///
/// The low `column_bits` bits select a byte inside the page buffer and the
/// remaining bits select the page, matching how the chip splits its 27 bit
/// address space (16 page bits, 11 column bits on a 2 KiB page).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteAddress(pub(crate) u32);

impl ByteAddress {
    pub const fn new(address: u32) -> Self {
        ByteAddress(address)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub const fn as_page_index(&self, column_bits: u32) -> PageIndex {
        PageIndex(self.0 >> column_bits)
    }

    pub const fn as_column_address(&self, column_bits: u32) -> ColumnAddress {
        ColumnAddress((self.0 & ((1 << column_bits) - 1)) as u16)
    }
}

impl From<ByteAddress> for u32 {
    fn from(ba: ByteAddress) -> Self {
        ba.as_u32()
    }
}

impl Display for ByteAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Address of a byte within the page buffer, spare area included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnAddress(pub(crate) u16);

impl ColumnAddress {
    pub const fn new(address: u16) -> Self {
        ColumnAddress(address)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl Display for ColumnAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}
