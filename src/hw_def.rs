use crc::{Crc, CRC_8_NRSC_5};

#[cfg(feature = "defmt")]
use defmt::Format;

/// Fixed I2C address shared by the SHTC1 and SHTC3
pub const I2C_ADDR: u8 = 0x70;

/// Settle time after a wakeup command, in microseconds
pub const WAKEUP_SETTLE_US: u32 = 200;
/// Settle time after a soft reset command, in microseconds
pub const SOFT_RESET_SETTLE_US: u32 = 200;
/// Conversion time of a high precision measurement, in milliseconds
pub const MEASUREMENT_DURATION_MS: u32 = 50;

/// Bits of the ID register that identify the SHTCx family
pub const ID_FAMILY_MASK: u16 = 0x003F;
/// Value of the family bits for an SHTC1 or SHTC3
pub const ID_FAMILY_SHTCX: u16 = 0x0007;
/// ID register bit that is only set on an SHTC3
pub const ID_SHTC3_BIT: u16 = 0x0800;

/// Bytes on the wire per data word: MSB, LSB, CRC
pub const WORD_GROUP_LEN: usize = 3;
/// Most words read in one transaction
pub const MAX_WORDS: usize = 2;

// poly 0x31 (x^8 + x^5 + x^4 + 1), init 0xff, no reflection, no final xor
const CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_NRSC_5);

/// CRC-8 over one big-endian data word as sent by the sensor
pub fn crc8(word: &[u8; 2]) -> u8 {
    CRC.checksum(word)
}

/// Commands understood by the SHTCx
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum Command {
    /// enter sleep mode (SHTC3 only)
    Sleep = 0xB098,
    /// leave sleep mode (SHTC3 only)
    Wakeup = 0x3517,
    /// read the ID register
    ReadIdRegister = 0xEFC8,
    /// software reset
    SoftReset = 0x805D,
    /// measure temperature first, high precision, no clock stretching
    PollingHighPrecision = 0x7866,
}
impl Command {
    /// All commands the driver issues
    pub const ALL: [Command; 5] = [
        Command::Sleep,
        Command::Wakeup,
        Command::ReadIdRegister,
        Command::SoftReset,
        Command::PollingHighPrecision,
    ];

    /// 16-bit command code
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Command code as sent on the bus, most significant byte first
    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.code().to_be_bytes()
    }

    /// Decode a command from the two bytes of a write transaction
    pub fn from_be_bytes(bytes: [u8; 2]) -> Option<Self> {
        Self::try_from(u16::from_be_bytes(bytes)).ok()
    }
}
impl TryFrom<u16> for Command {
    type Error = u16;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Command::ALL
            .iter()
            .copied()
            .find(|cmd| cmd.code() == code)
            .ok_or(code)
    }
}

/// Convert a raw temperature word to degrees centigrade
pub fn raw_temp_to_centigrade(raw: u16) -> f32 {
    175.0 * raw as f32 / 65536.0 - 45.0
}

/// Convert a raw temperature word to degrees fahrenheit
pub fn raw_temp_to_fahrenheit(raw: u16) -> f32 {
    raw_temp_to_centigrade(raw) * 1.8 + 32.0
}

/// Convert a raw humidity word to relative humidity in percent
pub fn raw_rel_humid_to_percent(raw: u16) -> f32 {
    100.0 * raw as f32 / 65536.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitwise_crc(word: &[u8; 2]) -> u8 {
        let mut crc: u8 = 0xFF;
        for byte in word {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x31 } else { crc << 1 };
            }
        }
        crc
    }

    #[test]
    fn crc_matches_sensirion_vector() {
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
        assert_eq!(crc8(&[0x00, 0x00]), 0x81);
    }

    #[test]
    fn crc_matches_polynomial_definition() {
        for hi in (0..=0xFFu16).step_by(7) {
            for lo in (0..=0xFFu16).step_by(13) {
                let word = [hi as u8, lo as u8];
                assert_eq!(crc8(&word), bitwise_crc(&word), "word {word:02x?}");
            }
        }
    }

    #[test]
    fn commands_are_big_endian() {
        assert_eq!(Command::Sleep.to_be_bytes(), [0xB0, 0x98]);
        assert_eq!(Command::Wakeup.to_be_bytes(), [0x35, 0x17]);
        assert_eq!(Command::ReadIdRegister.to_be_bytes(), [0xEF, 0xC8]);
        assert_eq!(Command::SoftReset.to_be_bytes(), [0x80, 0x5D]);
        assert_eq!(Command::PollingHighPrecision.to_be_bytes(), [0x78, 0x66]);
    }

    #[test]
    fn commands_decode_from_wire() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_be_bytes(cmd.to_be_bytes()), Some(cmd));
        }
        assert_eq!(Command::from_be_bytes([0x12, 0x34]), None);
        assert_eq!(Command::try_from(0x1234), Err(0x1234));
    }

    #[test]
    fn conversion_endpoints() {
        assert_eq!(raw_temp_to_centigrade(0), -45.0);
        assert_eq!(raw_rel_humid_to_percent(0), 0.0);
        assert!((raw_temp_to_centigrade(u16::MAX) - 129.997).abs() < 0.001);
        assert!((raw_rel_humid_to_percent(u16::MAX) - 99.998).abs() < 0.001);
        assert_eq!(raw_temp_to_centigrade(0x8000), 42.5);
        assert_eq!(raw_rel_humid_to_percent(0x8000), 50.0);
        assert!((raw_temp_to_fahrenheit(0x8000) - 108.5).abs() < 0.001);
    }
}
