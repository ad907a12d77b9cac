use embedded_hal::spi::MODE_0;

use crate::profile::{
    AddressWidth, BusConfig, ChipProfile, Nand, NandGeometry, NandOpcodes, NandRegisters,
    OpcodeTable, StatusLayout,
};

/// W25N01GV, 1 Gbit SPI NAND: 1024 blocks of 64 pages of 2048 + 64 bytes
pub const W25N01GV: ChipProfile<Nand> = w25n("W25N01GV", 1024, 0xAA21);
/// W25N512G, 512 Mbit SPI NAND
pub const W25N512G: ChipProfile<Nand> = w25n("W25N512G", 512, 0xAA20);

// All W25N devices share the command set and have 2048 byte pages
const fn w25n(name: &'static str, block_count: u32, device_id: u16) -> ChipProfile<Nand> {
    let geometry = NandGeometry {
        page_size: 2048,
        spare_size: 64,
        pages_per_block: 64,
        block_count,
        column_bits: 11,
    };
    ChipProfile {
        name,
        opcodes: OpcodeTable {
            write_enable: 0x06,
            write_disable: 0x04,
            read_status: 0x0F,
            write_status: 0x1F,
            read: 0x03,
            write: 0x84,
        },
        // Array commands address a column of the page buffer
        address_width: AddressWidth::Two,
        read_dummy: 1,
        max_address: (geometry.page_count() << geometry.column_bits) - 1,
        page_size: geometry.page_size,
        bus: BusConfig {
            frequency: 104_000_000,
            mode: MODE_0,
        },
        status: StatusLayout {
            register: Some(0xC0),
            write_enable: 0x02,
            busy: 0x01,
            program_failed: 0x08,
            erase_failed: 0x04,
            ecc: 0x30,
        },
        wraparound: false,
        clears_write_enable: true,
        family: Nand {
            geometry,
            opcodes: NandOpcodes {
                reset: 0xFF,
                jedec_id: 0x9F,
                page_read: 0x13,
                block_erase: 0xD8,
                program_load: 0x02,
                random_program_load: 0x84,
                program_execute: 0x10,
            },
            registers: NandRegisters {
                protection: 0xA0,
                configuration: 0xB0,
                status: 0xC0,
                protection_bits: 0b0111_1100,
                ecc_enable: 0x10,
                buffer_mode: 0x08,
            },
            max_partial_writes: 4,
            manufacturer_id: 0xEF,
            device_id,
        },
    }
}
