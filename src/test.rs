//! Simulated chips for the unit tests.
//!
//! Both simulators implement [SpiDevice] and log every chip select window so
//! tests can check the exact bytes on the wire. Reads are answered byte by
//! byte while the window is open; instructions that change state take effect
//! when the window closes, as on the real parts.
use std::collections::HashMap;
use std::convert::Infallible;

use embedded_hal::spi::{ErrorType, Operation, SpiDevice};

use crate::{
    address::PageIndex,
    nand::BlockProtection,
    profile::{ChipProfile, Eeprom, Family, Fram, Mram, Nand, Nor, OpcodeTable},
};

/// One chip select window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Every byte written by the driver, frame and payload
    pub mosi: Vec<u8>,
    /// Number of bytes read back
    pub read: usize,
}

/// Run `operations` as one window, answering reads with `respond(mosi, n)`
fn run_window(
    operations: &mut [Operation<'_, u8>],
    mut respond: impl FnMut(&[u8], usize) -> u8,
) -> Window {
    let mut mosi = Vec::new();
    let mut read = 0;
    for operation in operations.iter_mut() {
        match operation {
            Operation::Write(bytes) => mosi.extend_from_slice(*bytes),
            Operation::Read(buf) => {
                for byte in buf.iter_mut() {
                    *byte = respond(&mosi, read);
                    read += 1;
                }
            }
            Operation::DelayNs(_) => {}
            _ => panic!("unexpected full duplex transfer"),
        }
    }
    Window { mosi, read }
}

fn be_address(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | b as u32)
}

/// Family specific instructions a [SimMemory] understands
#[derive(Debug, Clone, Copy)]
pub enum Extras {
    Eeprom(Eeprom),
    Fram(Fram),
    Mram(Mram),
    Nor(Nor),
}

pub trait Simulated: Family {
    fn extras(&self) -> Extras;
}

impl Simulated for Eeprom {
    fn extras(&self) -> Extras {
        Extras::Eeprom(*self)
    }
}

impl Simulated for Fram {
    fn extras(&self) -> Extras {
        Extras::Fram(*self)
    }
}

impl Simulated for Mram {
    fn extras(&self) -> Extras {
        Extras::Mram(*self)
    }
}

impl Simulated for Nor {
    fn extras(&self) -> Extras {
        Extras::Nor(*self)
    }
}

/// EEPROM, FRAM, MRAM or NOR chip with the classic 25-series command set
pub struct SimMemory {
    opcodes: OpcodeTable,
    width: usize,
    max_address: u32,
    page_size: u32,
    has_busy: bool,
    keeps_write_enable: bool,
    extras: Extras,
    erased: u8,
    cells: HashMap<u32, u8>,
    id_page: [u8; 256],
    id_locked: bool,
    /// Writable status bits (block protect and SRWD)
    protection: u8,
    write_enabled: bool,
    busy_polls: u32,
    write_cycle: u32,
    asleep: bool,
    windows: Vec<Window>,
}

impl SimMemory {
    pub fn new<F: Simulated>(profile: &ChipProfile<F>) -> Self {
        let extras = profile.family.extras();
        let has_busy = profile.status.busy != 0;
        SimMemory {
            opcodes: profile.opcodes,
            width: profile.address_width.bytes(),
            max_address: profile.max_address,
            page_size: profile.page_size,
            has_busy,
            keeps_write_enable: !profile.clears_write_enable,
            extras,
            erased: match extras {
                Extras::Eeprom(_) | Extras::Nor(_) => 0xFF,
                _ => 0x00,
            },
            cells: HashMap::new(),
            id_page: [0xFF; 256],
            id_locked: false,
            protection: 0,
            write_enabled: false,
            busy_polls: 0,
            write_cycle: if has_busy { 2 } else { 0 },
            asleep: false,
            windows: Vec::new(),
        }
    }

    /// Status polls that read busy after every write
    pub fn with_write_cycle(mut self, polls: u32) -> Self {
        if self.has_busy {
            self.write_cycle = polls;
        }
        self
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn clear_windows(&mut self) {
        self.windows.clear();
    }

    pub fn peek(&self, address: u32) -> u8 {
        self.cells.get(&address).copied().unwrap_or(self.erased)
    }

    pub fn is_busy(&self) -> bool {
        self.busy_polls > 0
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// Set the latch behind the driver's back
    pub fn force_write_enable(&mut self) {
        self.write_enabled = true;
    }

    fn status(&self) -> u8 {
        self.protection | (self.write_enabled as u8) << 1 | (self.busy_polls > 0) as u8
    }

    fn address(&self, mosi: &[u8]) -> u32 {
        let end = (1 + self.width).min(mosi.len());
        be_address(&mosi[1.min(end)..end])
    }

    fn wrap(&self, address: u64) -> u32 {
        (address % (self.max_address as u64 + 1)) as u32
    }

    fn respond(&self, mosi: &[u8], index: usize) -> u8 {
        let Some(&opcode) = mosi.first() else {
            return 0xFF;
        };
        if self.asleep {
            return 0xFF;
        }
        let address = self.address(mosi) as u64;
        if opcode == self.opcodes.read_status {
            return self.status();
        }
        if opcode == self.opcodes.read {
            return self.peek(self.wrap(address + index as u64));
        }
        match self.extras {
            Extras::Fram(fram) if opcode == fram.fast_read => {
                self.peek(self.wrap(address + index as u64))
            }
            Extras::Eeprom(eeprom) if opcode == eeprom.read_id => {
                if address as u32 & eeprom.lock_select != 0 {
                    self.id_locked as u8
                } else {
                    self.id_page[(address as usize + index) % 256]
                }
            }
            Extras::Nor(nor) if opcode == nor.read_id => [0x20, 0xBA, 0x21][index % 3],
            _ => 0xFF,
        }
    }

    fn writable(&self) -> bool {
        self.write_enabled && self.busy_polls == 0
    }

    fn finish_write(&mut self) {
        if !self.keeps_write_enable {
            self.write_enabled = false;
        }
        self.busy_polls = self.write_cycle;
    }

    fn program(&mut self, mosi: &[u8]) {
        let start = self.address(mosi);
        let data = &mosi[(1 + self.width).min(mosi.len())..];
        let and_program = matches!(self.extras, Extras::Nor(_));
        for (i, &value) in data.iter().enumerate() {
            let address = if self.page_size != 0 {
                let base = start - start % self.page_size;
                base + (start % self.page_size + i as u32) % self.page_size
            } else {
                self.wrap(start as u64 + i as u64)
            };
            let value = if and_program {
                self.peek(address) & value
            } else {
                value
            };
            self.cells.insert(address, value);
        }
    }

    fn erase(&mut self, start: u32, size: u32) {
        let base = start - start % size;
        self.cells.retain(|&address, _| !(base..base + size).contains(&address));
    }

    fn complete(&mut self, mosi: &[u8]) {
        let Some(&opcode) = mosi.first() else {
            // bare chip select pulse
            if matches!(self.extras, Extras::Fram(_)) {
                self.asleep = false;
            }
            return;
        };
        if self.asleep {
            match self.extras {
                Extras::Mram(mram) if opcode == mram.wake => self.asleep = false,
                Extras::Nor(nor) if opcode == nor.release_power_down => self.asleep = false,
                _ => {}
            }
            return;
        }
        let opcodes = self.opcodes;
        if opcode == opcodes.write_enable {
            if self.busy_polls == 0 {
                self.write_enabled = true;
            }
        } else if opcode == opcodes.write_disable {
            self.write_enabled = false;
        } else if opcode == opcodes.read_status {
            self.busy_polls = self.busy_polls.saturating_sub(1);
        } else if opcode == opcodes.write_status {
            if self.writable() {
                self.protection = mosi.get(1).copied().unwrap_or(0) & 0x8C;
                self.finish_write();
            }
        } else if opcode == opcodes.write {
            if self.writable() {
                self.program(mosi);
                self.finish_write();
            }
        } else {
            self.complete_extra(opcode, mosi);
        }
    }

    fn complete_extra(&mut self, opcode: u8, mosi: &[u8]) {
        match self.extras {
            Extras::Eeprom(eeprom) if opcode == eeprom.write_id => {
                if !self.writable() {
                    return;
                }
                let address = self.address(mosi);
                let data = &mosi[(1 + self.width).min(mosi.len())..];
                if address & eeprom.lock_select != 0 {
                    if data.first().is_some_and(|b| b & 0x02 != 0) {
                        self.id_locked = true;
                    }
                } else if !self.id_locked {
                    for (i, &value) in data.iter().enumerate() {
                        self.id_page[(address as usize + i) % 256] = value;
                    }
                }
                self.finish_write();
            }
            Extras::Fram(fram) if opcode == fram.deep_power_down || opcode == fram.hibernate => {
                self.asleep = true;
            }
            Extras::Mram(mram) if opcode == mram.sleep => self.asleep = true,
            Extras::Nor(nor) if opcode == nor.subsector_erase || opcode == nor.sector_erase => {
                if !self.writable() {
                    return;
                }
                let size = if opcode == nor.sector_erase {
                    nor.sector_size
                } else {
                    nor.subsector_size
                };
                self.erase(self.address(mosi), size);
                self.finish_write();
            }
            Extras::Nor(nor) if opcode == nor.deep_power_down => self.asleep = true,
            _ => {}
        }
    }
}

impl ErrorType for SimMemory {
    type Error = Infallible;
}

impl SpiDevice for SimMemory {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let window = run_window(operations, |mosi, index| self.respond(mosi, index));
        self.complete(&window.mosi);
        self.windows.push(window);
        Ok(())
    }
}

/// Serial NAND with a W25N style command set, page buffer and status registers
pub struct SimNand {
    nand: Nand,
    opcodes: OpcodeTable,
    pages: HashMap<u32, Vec<u8>>,
    buffer: Vec<u8>,
    loaded: u32,
    protection: u8,
    configuration: u8,
    write_enabled: bool,
    busy_polls: u32,
    busy_cycle: u32,
    program_failed: bool,
    erase_failed: bool,
    ecc: u8,
    ecc_faults: HashMap<u32, u8>,
    fail_program: bool,
    fail_erase: bool,
    windows: Vec<Window>,
}

impl SimNand {
    pub fn new(profile: &ChipProfile<Nand>) -> Self {
        let nand = profile.family;
        SimNand {
            nand,
            opcodes: profile.opcodes,
            pages: HashMap::new(),
            buffer: vec![0xFF; nand.geometry.buffer_size()],
            loaded: 0,
            // power up: whole array protected, ECC on, buffer mode
            protection: nand.registers.protection_bits,
            configuration: nand.registers.ecc_enable | nand.registers.buffer_mode,
            write_enabled: false,
            busy_polls: 0,
            busy_cycle: 2,
            program_failed: false,
            erase_failed: false,
            ecc: 0,
            ecc_faults: HashMap::new(),
            fail_program: false,
            fail_erase: false,
            windows: Vec::new(),
        }
    }

    /// Status polls that read busy after page read, program and erase
    pub fn with_busy_cycle(mut self, polls: u32) -> Self {
        self.busy_cycle = polls;
        self
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn clear_windows(&mut self) {
        self.windows.clear();
    }

    /// ECC status bits reported whenever `page` is read with ECC on
    pub fn inject_ecc(&mut self, page: PageIndex, bits: u8) {
        self.ecc_faults.insert(page.as_u32(), bits & 0b11);
    }

    pub fn fail_next_program(&mut self) {
        self.fail_program = true;
    }

    pub fn fail_next_erase(&mut self) {
        self.fail_erase = true;
    }

    fn ecc_enabled(&self) -> bool {
        self.configuration & self.nand.registers.ecc_enable != 0
    }

    fn buffer_mode(&self) -> bool {
        self.configuration & self.nand.registers.buffer_mode != 0
    }

    fn status(&self) -> u8 {
        (self.ecc << 4)
            | (self.program_failed as u8) << 3
            | (self.erase_failed as u8) << 2
            | (self.write_enabled as u8) << 1
            | (self.busy_polls > 0) as u8
    }

    fn page(&self, page: u32) -> Vec<u8> {
        self.pages
            .get(&page)
            .cloned()
            .unwrap_or_else(|| vec![0xFF; self.nand.geometry.buffer_size()])
    }

    fn is_protected(&self, page: u32) -> bool {
        let geometry = self.nand.geometry;
        let block = (page / geometry.pages_per_block) as u16;
        BlockProtection::from_register(self.protection)
            .blocks(geometry.block_count as u16)
            .contains(&block)
    }

    /// Stand-in for the chip's ECC bytes: one parity byte per data chunk
    fn ecc_bytes(&self, data: &[u8]) -> Vec<u8> {
        let geometry = self.nand.geometry;
        let chunk = (geometry.page_size / geometry.spare_size) as usize;
        data[..geometry.page_size as usize]
            .chunks(chunk)
            .map(|c| !c.iter().fold(0, |acc, b| acc ^ b))
            .collect()
    }

    fn respond(&self, mosi: &[u8], index: usize) -> u8 {
        let Some(&opcode) = mosi.first() else {
            return 0xFF;
        };
        let registers = self.nand.registers;
        if opcode == self.opcodes.read_status {
            return match mosi.get(1).copied() {
                Some(r) if r == registers.protection => self.protection,
                Some(r) if r == registers.configuration => self.configuration,
                Some(r) if r == registers.status => self.status(),
                _ => 0xFF,
            };
        }
        if opcode == self.opcodes.read {
            let size = self.buffer.len();
            if self.buffer_mode() {
                let column = be_address(&mosi[1..3]) as usize;
                return self.buffer.get(column + index).copied().unwrap_or(0xFF);
            }
            // continuous: column ignored, runs on into the next pages
            return match index / size {
                0 => self.buffer[index],
                n => self.page(self.loaded + n as u32)[index % size],
            };
        }
        if opcode == self.nand.opcodes.jedec_id {
            let id = self.nand.device_id.to_be_bytes();
            return [self.nand.manufacturer_id, id[0], id[1]][index % 3];
        }
        0xFF
    }

    fn complete(&mut self, mosi: &[u8]) {
        let Some(&opcode) = mosi.first() else {
            return;
        };
        let ops = self.nand.opcodes;
        let registers = self.nand.registers;
        let address = be_address(&mosi[1.min(mosi.len())..4.min(mosi.len())]);
        let idle = self.busy_polls == 0;

        if opcode == self.opcodes.write_enable {
            if idle {
                self.write_enabled = true;
            }
        } else if opcode == self.opcodes.write_disable {
            self.write_enabled = false;
        } else if opcode == self.opcodes.read_status {
            self.busy_polls = self.busy_polls.saturating_sub(1);
        } else if opcode == self.opcodes.write_status {
            let value = mosi.get(2).copied().unwrap_or(0);
            match mosi.get(1).copied() {
                Some(r) if r == registers.protection => self.protection = value,
                Some(r) if r == registers.configuration => self.configuration = value,
                _ => {}
            }
        } else if opcode == ops.reset {
            self.write_enabled = false;
            self.program_failed = false;
            self.erase_failed = false;
            self.ecc = 0;
            self.busy_polls = self.busy_cycle;
        } else if opcode == ops.page_read {
            if idle {
                self.loaded = address;
                self.buffer = self.page(address);
                self.ecc = match self.ecc_enabled() {
                    true => self.ecc_faults.get(&address).copied().unwrap_or(0),
                    false => 0,
                };
                self.busy_polls = self.busy_cycle;
            }
        } else if opcode == ops.program_load || opcode == ops.random_program_load {
            if self.write_enabled {
                if opcode == ops.program_load {
                    self.buffer.fill(0xFF);
                }
                let column = be_address(&mosi[1..3]) as usize;
                for (i, &value) in mosi[3..].iter().enumerate() {
                    if let Some(byte) = self.buffer.get_mut(column + i) {
                        *byte = value;
                    }
                }
            }
        } else if opcode == ops.program_execute {
            if self.write_enabled && idle {
                self.program_failed = self.fail_program || self.is_protected(address);
                self.fail_program = false;
                if !self.program_failed {
                    let mut data = self.buffer.clone();
                    if self.ecc_enabled() {
                        let spare = self.ecc_bytes(&data);
                        let page_size = self.nand.geometry.page_size as usize;
                        data[page_size..].copy_from_slice(&spare);
                    }
                    let mut page = self.page(address);
                    page.iter_mut().zip(data).for_each(|(cell, value)| *cell &= value);
                    self.pages.insert(address, page);
                }
                self.write_enabled = false;
                self.busy_polls = self.busy_cycle;
            }
        } else if opcode == ops.block_erase && self.write_enabled && idle {
            self.erase_failed = self.fail_erase || self.is_protected(address);
            self.fail_erase = false;
            if !self.erase_failed {
                let per_block = self.nand.geometry.pages_per_block;
                let first = address - address % per_block;
                self.pages.retain(|&page, _| !(first..first + per_block).contains(&page));
            }
            self.write_enabled = false;
            self.busy_polls = self.busy_cycle;
        }
    }
}

impl ErrorType for SimNand {
    type Error = Infallible;
}

impl SpiDevice for SimNand {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let window = run_window(operations, |mosi, index| self.respond(mosi, index));
        self.complete(&window.mosi);
        self.windows.push(window);
        Ok(())
    }
}
