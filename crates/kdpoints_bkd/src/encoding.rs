//! Sortable byte encodings for numeric dimensions.
//!
//! Points compare dimension by dimension as unsigned big-endian bytes.
//! These helpers map numbers onto byte strings with the same order.

/// Encodes an `i32` so that byte order matches numeric order.
#[must_use]
pub fn encode_i32(value: i32) -> [u8; 4] {
    ((value as u32) ^ 0x8000_0000).to_be_bytes()
}

/// Inverse of [`encode_i32`].
#[must_use]
pub fn decode_i32(bytes: [u8; 4]) -> i32 {
    (u32::from_be_bytes(bytes) ^ 0x8000_0000) as i32
}

/// Encodes an `i64` so that byte order matches numeric order.
#[must_use]
pub fn encode_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ 0x8000_0000_0000_0000).to_be_bytes()
}

/// Inverse of [`encode_i64`].
#[must_use]
pub fn decode_i64(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ 0x8000_0000_0000_0000) as i64
}

/// Encodes a `u64` (big-endian).
#[must_use]
pub fn encode_u64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Inverse of [`encode_u64`].
#[must_use]
pub fn decode_u64(bytes: [u8; 8]) -> u64 {
    u64::from_be_bytes(bytes)
}

/// Encodes an `f64` so that byte order matches numeric order.
///
/// `-0.0` sorts before `0.0`; NaN sorts after positive infinity.
#[must_use]
pub fn encode_f64(value: f64) -> [u8; 8] {
    encode_i64(sortable_f64_bits(value.to_bits() as i64))
}

/// Inverse of [`encode_f64`].
#[must_use]
pub fn decode_f64(bytes: [u8; 8]) -> f64 {
    f64::from_bits(sortable_f64_bits(decode_i64(bytes)) as u64)
}

/// Flips the magnitude bits of negative values; its own inverse.
fn sortable_f64_bits(bits: i64) -> i64 {
    bits ^ ((bits >> 63) & 0x7FFF_FFFF_FFFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_values() {
        assert_eq!(encode_i32(0), [0x80, 0, 0, 0]);
        assert_eq!(encode_i32(-1), [0x7F, 0xFF, 0xFF, 0xFF]);
        assert_eq!(encode_i32(i32::MIN), [0, 0, 0, 0]);
        assert_eq!(encode_u64(1), [0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn float_edges_keep_order() {
        let values = [f64::NEG_INFINITY, -1.5, -0.0, 0.0, 1e-300, 2.5, f64::INFINITY];
        for pair in values.windows(2) {
            assert!(encode_f64(pair[0]) < encode_f64(pair[1]), "{pair:?}");
        }
        assert_eq!(decode_f64(encode_f64(-1.5)), -1.5);
    }

    proptest! {
        #[test]
        fn i32_order_preserved(a in any::<i32>(), b in any::<i32>()) {
            prop_assert_eq!(a.cmp(&b), encode_i32(a).cmp(&encode_i32(b)));
            prop_assert_eq!(decode_i32(encode_i32(a)), a);
        }

        #[test]
        fn i64_order_preserved(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(a.cmp(&b), encode_i64(a).cmp(&encode_i64(b)));
            prop_assert_eq!(decode_i64(encode_i64(a)), a);
        }

        #[test]
        fn f64_order_preserved(a in -1e300f64..1e300, b in -1e300f64..1e300) {
            if let Some(ord) = a.partial_cmp(&b) {
                if a != b {
                    prop_assert_eq!(ord, encode_f64(a).cmp(&encode_f64(b)));
                }
            }
            prop_assert_eq!(decode_f64(encode_f64(a)), a);
        }
    }
}
