use embedded_hal::spi::MODE_0;

use crate::profile::{AddressWidth, BusConfig, ChipProfile, Fram, OpcodeTable, StatusLayout};

/// Infineon (Cypress) CY15B108QN, 8 Mbit FRAM.
///
/// Writes complete at bus speed so there is no busy bit. Sequential reads and
/// writes roll over from `0xFFFFF` to `0`.
pub const CY15B108QN: ChipProfile<Fram> = ChipProfile {
    name: "CY15B108QN",
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
    max_address: 0xF_FFFF,
    page_size: 0,
    bus: BusConfig {
        frequency: 8_000_000,
        mode: MODE_0,
    },
    status: StatusLayout::classic(false),
    wraparound: true,
    clears_write_enable: true,
    family: Fram {
        fast_read: 0x0B,
        deep_power_down: 0xBA,
        hibernate: 0xB9,
    },
};
