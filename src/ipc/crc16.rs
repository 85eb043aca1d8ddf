//! CRC-16 used by the framed transport.
//!
//! CCITT polynomial `0x1021`, MSB-first, seeded with `0xEF4A`, no final XOR.

const CRC16_START: u16 = 0xEF4A;
const CRC16_POLY: u16 = 0x1021;

static CRC16_TABLE: [u16; 256] = build_table(CRC16_POLY);

const fn build_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut index = 0;
    while index < 256 {
        let mut crc = 0u16;
        let mut byte = (index as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            let top = crc ^ byte;
            crc <<= 1;
            if top & 0x8000 != 0 {
                crc ^= poly;
            }
            byte <<= 1;
            bit += 1;
        }
        table[index] = crc;
        index += 1;
    }
    table
}

/// Checksum of a frame payload.
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(CRC16_START, |crc, &byte| {
        (crc << 8) ^ CRC16_TABLE[usize::from((crc >> 8) as u8 ^ byte)]
    })
}
