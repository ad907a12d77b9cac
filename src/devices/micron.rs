use embedded_hal::spi::MODE_0;

use crate::profile::{AddressWidth, BusConfig, ChipProfile, Nor, OpcodeTable, StatusLayout};

/// Micron MT25TL01G, 1 Gbit dual die NOR, used in 3 byte address mode.
///
/// In 3 byte mode one 16 MiB segment is visible and sequential reads roll
/// over inside it.
pub const MT25TL01G: ChipProfile<Nor> = ChipProfile {
    name: "MT25TL01G",
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
    max_address: 0xFF_FFFF,
    page_size: 256,
    bus: BusConfig {
        frequency: 133_000_000,
        mode: MODE_0,
    },
    status: StatusLayout::classic(true),
    wraparound: true,
    clears_write_enable: true,
    family: Nor {
        subsector_erase: 0x20,
        sector_erase: 0xD8,
        subsector_size: 4 * 1024,
        sector_size: 64 * 1024,
        read_id: 0x9F,
        deep_power_down: 0xB9,
        release_power_down: 0xAB,
    },
};
