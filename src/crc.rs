//! The vendor CRC-16 variant used to protect inquiry/setting payloads.
//!
//! The underlying 16-bit check is the standard CRC-16/XMODEM parameterization
//! (poly 0x1021, init 0, no reflect, no xorout), same as the nibble-table
//! algorithm the reference device firmware runs inline; what makes the wire
//! format vendor-specific is the escape step afterward, which moves the two
//! output bytes away from three protocol-reserved values.

use crc16::{State, XMODEM};

const RESERVED_BYTES: [u8; 3] = [0x28, 0x0d, 0x0a];

fn raw_crc(message: &[u8]) -> u16 {
    State::<XMODEM>::calculate(message)
}

/// Computes the escaped two-byte CRC for `message`, as it appears on the wire.
///
/// The escape check is performed exactly once per byte position, not
/// iteratively until both bytes are clear of reserved values. If the
/// adjustment happens to reintroduce a reserved byte, the frame ships with it
/// anyway — this mirrors the reference implementation's `cal_crc_half`, which
/// never re-checks after applying the adjustment.
///
/// Note the adjustment is cross-wired in the reference firmware: a reserved
/// *MSB* bumps the integer by `+1` (which actually changes the LSB), and a
/// reserved *LSB* bumps it by `+0x0100` (which changes the MSB). This reads
/// backwards but is exactly what the device does and what downstream
/// firmware expects, confirmed against `cal_crc_half`; it is not corrected
/// here.
pub fn crc16(message: &[u8]) -> [u8; 2] {
    let mut crc = raw_crc(message);

    let bytes = crc.to_be_bytes();
    if RESERVED_BYTES.contains(&bytes[0]) {
        crc = crc.wrapping_add(1);
    }
    if RESERVED_BYTES.contains(&bytes[1]) {
        crc = crc.wrapping_add(0x0100);
    }

    crc.to_be_bytes()
}
