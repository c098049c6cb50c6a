use std::time::{SystemTime, UNIX_EPOCH};

use ethereum_consensus::primitives::U256;

pub fn utcnow_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or_default()
}

pub fn utcnow_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}

pub fn utcnow_sec() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

/// Parses a decimal string into a U256, the format used for bid values in
/// JSON bodies and the durable store.
pub fn u256_from_dec_str(s: &str) -> Option<U256> {
    U256::from_str_radix(s, 10).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_u256() {
        assert_eq!(u256_from_dec_str("0"), Some(U256::ZERO));
        assert_eq!(
            u256_from_dec_str("1000000000000000000"),
            Some(U256::from(1_000_000_000_000_000_000u64))
        );
        assert_eq!(u256_from_dec_str("not a number"), None);
    }
}
