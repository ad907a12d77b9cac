use embedded_hal::spi::MODE_0;

use crate::profile::{AddressWidth, BusConfig, ChipProfile, Mram, OpcodeTable, StatusLayout};

/// Everspin MR25H40, 4 Mbit MRAM.
///
/// WEL survives a completed write on this part, so the driver follows every
/// write with WRDI.
pub const MR25H40: ChipProfile<Mram> = ChipProfile {
    name: "MR25H40",
    opcodes: OpcodeTable {
        write_enable: 0x06,
        write_disable: 0x04,
        read_status: 0x05,
        write_status: 0x01,
        read: 0x03,
        write: 0x02,
    },
    address_width: AddressWidth::Three,
    read_dummy: 0,
    max_address: 0x7_FFFF,
    page_size: 0,
    bus: BusConfig {
        frequency: 40_000_000,
        mode: MODE_0,
    },
    status: StatusLayout::classic(false),
    wraparound: true,
    clears_write_enable: false,
    family: Mram {
        sleep: 0xB9,
        wake: 0xAB,
    },
};
