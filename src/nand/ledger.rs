use core::ops::Range;

use crate::{
    address::{BlockIndex, PageIndex},
    error::Precondition,
};

/// Bits of program count kept per page
const COUNT_BITS: usize = 3;
const COUNT_MASK: u16 = (1 << COUNT_BITS) - 1;

/// Lifecycle of a NAND page between erases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PageState {
    Erased,
    /// Programmed this many times, fewer than the chip allows
    PartiallyWritten(u8),
    /// All partial programs used, the page must be erased before the next one
    Written,
}

/// Software record of how often each page has been programmed since its
/// block was last erased.
///
/// The chip does not expose this count, so the ledger only knows about
/// programs and erases made through this driver since it was created. It
/// starts out assuming every page is erased.
///
/// Counts are packed three bits per page into storage the caller provides,
/// so a whole W25N01GV (65536 pages) takes 24 KiB that can live in a
/// `static` rather than on the stack. Use [PageLedger::storage_len] to size
/// it. Pages past what the storage holds are not tracked.
pub struct PageLedger<'a> {
    counts: &'a mut [u8],
    pages: usize,
    max_writes: u8,
    pages_per_block: u32,
}

impl<'a> PageLedger<'a> {
    /// Bytes of storage needed to track `pages` pages
    pub const fn storage_len(pages: usize) -> usize {
        (pages * COUNT_BITS + 7) / 8
    }

    /// Ledger over `storage`, which is cleared. `max_writes` is capped at 7,
    /// the largest count a page slot holds.
    pub fn new(storage: &'a mut [u8], max_writes: u8, pages_per_block: u32) -> Self {
        storage.fill(0);
        let pages = storage.len() * 8 / COUNT_BITS;
        PageLedger {
            counts: storage,
            pages,
            max_writes: max_writes.min(COUNT_MASK as u8),
            pages_per_block,
        }
    }

    /// Number of pages tracked
    pub const fn capacity(&self) -> usize {
        self.pages
    }

    /// Byte and bit offset of the slot of page `index`. A slot may straddle
    /// two bytes.
    const fn slot(index: usize) -> (usize, usize) {
        let bit = index * COUNT_BITS;
        (bit / 8, bit % 8)
    }

    fn count(&self, index: usize) -> u8 {
        let (byte, shift) = Self::slot(index);
        let low = self.counts[byte] as u16;
        let high = self.counts.get(byte + 1).copied().unwrap_or(0) as u16;
        (((high << 8 | low) >> shift) & COUNT_MASK) as u8
    }

    fn set_count(&mut self, index: usize, count: u8) {
        let (byte, shift) = Self::slot(index);
        let mask = COUNT_MASK << shift;
        let value = (count as u16 & COUNT_MASK) << shift;
        self.counts[byte] = (self.counts[byte] & !(mask as u8)) | value as u8;
        if let Some(next) = self.counts.get_mut(byte + 1) {
            *next = (*next & !((mask >> 8) as u8)) | (value >> 8) as u8;
        }
    }

    fn tracked(&self, page: PageIndex) -> Option<usize> {
        let index = page.as_u32() as usize;
        (index < self.pages).then_some(index)
    }

    pub fn state(&self, page: PageIndex) -> Option<PageState> {
        let writes = self.count(self.tracked(page)?);
        Some(match writes {
            0 => PageState::Erased,
            n if n >= self.max_writes => PageState::Written,
            n => PageState::PartiallyWritten(n),
        })
    }

    /// Pages of the block holding `page`, clipped to what is tracked
    fn block_range(&self, page: PageIndex) -> Range<usize> {
        let block = page.as_block_index(self.pages_per_block);
        let first = block.first_page(self.pages_per_block).as_u32() as usize;
        let end = (first + self.pages_per_block as usize).min(self.pages);
        first.min(end)..end
    }

    /// Whether `page` may be programmed again.
    ///
    /// Refuses pages that used all their partial programs, and pages that
    /// would break the low-to-high programming order of their block.
    pub fn check_write(&self, page: PageIndex) -> Result<(), Precondition> {
        let Some(index) = self.tracked(page) else {
            return Ok(());
        };
        if self.count(index) >= self.max_writes {
            return Err(Precondition::PageExhausted);
        }
        let range = self.block_range(page);
        if (index + 1..range.end).any(|later| self.count(later) != 0) {
            return Err(Precondition::OutOfOrder);
        }
        Ok(())
    }

    pub fn record_write(&mut self, page: PageIndex) {
        if let Some(index) = self.tracked(page) {
            let writes = (self.count(index) + 1).min(COUNT_MASK as u8);
            self.set_count(index, writes);
            debug!("Page {} programmed {} times", page, writes);
        }
    }

    /// Mark every page of `block` erased
    pub fn erase_block(&mut self, block: BlockIndex) {
        for index in self.block_range(block.first_page(self.pages_per_block)) {
            self.set_count(index, 0);
        }
    }
}
