use embedded_hal::spi::MODE_0;

use crate::profile::{AddressWidth, BusConfig, ChipProfile, Eeprom, OpcodeTable, StatusLayout};

/// ST M95M02, 2 Mbit EEPROM with 256 byte pages.
///
/// 5 MHz is the limit at 2.5 V. Reads roll over at the top of the array but
/// writes wrap inside the addressed page, so the profile does not declare
/// wraparound.
pub const M95M02: ChipProfile<Eeprom> = ChipProfile {
    name: "M95M02",
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
    max_address: 0x3_FFFF,
    page_size: 256,
    bus: BusConfig {
        frequency: 5_000_000,
        mode: MODE_0,
    },
    status: StatusLayout::classic(true),
    wraparound: false,
    clears_write_enable: true,
    family: Eeprom {
        read_id: 0x83,
        write_id: 0x82,
        // A10 selects lock status / lock instead of the page contents
        lock_select: 0x400,
        id_page_size: 256,
    },
};
