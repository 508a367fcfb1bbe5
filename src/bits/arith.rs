//! Byte arithmetic helpers shared by the flag-computation routines.
//!
//! All arithmetic here is total: values wrap, they never err. The
//! half-carry reports follow the documented 8080 convention for
//! INR/DCR, which is deliberately asymmetric between the two
//! directions and is reproduced exactly.

/// True iff the byte has an even number of set bits.
///
/// The 8080 parity flag is *even* parity: `parity(0x00)` is true.
#[inline]
pub fn parity(value: u8) -> bool {
    value.count_ones() % 2 == 0
}

/// Increment a byte with wraparound, reporting the half-carry.
///
/// The half-carry (carry out of bit 3) occurs exactly when the
/// pre-increment low nibble is 0x9.
#[inline]
pub fn increment(value: u8) -> (u8, bool) {
    let half_carry = value & 0x0F == 0x09;
    (value.wrapping_add(1), half_carry)
}

/// Decrement a byte with wraparound, reporting the half-borrow.
///
/// The half-borrow (borrow into bit 4) occurs exactly when the
/// pre-decrement low nibble is 0x0.
#[inline]
pub fn decrement(value: u8) -> (u8, bool) {
    let half_borrow = value & 0x0F == 0x00;
    (value.wrapping_sub(1), half_borrow)
}

/// Split a byte into its (high, low) BCD nibbles.
#[inline]
pub fn split_nibbles(value: u8) -> (u8, u8) {
    ((value >> 4) & 0x0F, value & 0x0F)
}

/// Recombine (high, low) nibbles into a byte.
#[inline]
pub fn join_nibbles(high: u8, low: u8) -> u8 {
    ((high & 0x0F) << 4) | (low & 0x0F)
}
