//! Address and amount parsing plus the unit formatting used in previews.

use alloy::primitives::utils::{format_ether, format_units, parse_ether};
use alloy::primitives::{Address, B256, U256};
use std::str::FromStr;

use crate::error::EngineError;

/// Parse a `0x`-prefixed 32-byte transaction hash.
pub fn parse_tx_hash(raw: &str) -> Result<B256, EngineError> {
    let invalid = || EngineError::Validation("Invalid or missing transaction hash.".to_string());
    let trimmed = raw.trim();
    let well_formed = trimmed
        .strip_prefix("0x")
        .is_some_and(|digits| digits.len() == 64 && digits.chars().all(|c| c.is_ascii_hexdigit()));
    if !well_formed {
        return Err(invalid());
    }
    B256::from_str(trimmed).map_err(|_| invalid())
}

/// Parse a `0x`-prefixed 20-byte address.
///
/// All-lowercase and all-uppercase forms are accepted as is; mixed case must carry a valid
/// EIP-55 checksum.
pub fn parse_address(field: &str, raw: &str) -> Result<Address, EngineError> {
    let trimmed = raw.trim();
    let Some(digits) = trimmed.strip_prefix("0x") else {
        return Err(EngineError::invalid_address(field, raw));
    };
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EngineError::invalid_address(field, raw));
    }
    let address = Address::from_str(trimmed).map_err(|_| EngineError::invalid_address(field, raw))?;
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum(None) != trimmed {
        return Err(EngineError::Validation(format!(
            "Invalid {field} address checksum: {raw}"
        )));
    }
    Ok(address)
}

/// Parse a strictly positive decimal amount of native currency into wei.
pub fn parse_amount(raw: &str) -> Result<U256, EngineError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        return Err(EngineError::Validation(format!("Invalid amount: {raw}")));
    }
    let wei = parse_ether(trimmed).map_err(|_| EngineError::Validation(format!("Invalid amount: {raw}")))?;
    if wei.is_zero() {
        return Err(EngineError::Validation(
            "Amount must be greater than zero.".to_string(),
        ));
    }
    Ok(wei)
}

/// Parse an optional `valueEth` attached to a payable call. Zero is allowed.
pub fn parse_value_eth(raw: &str) -> Result<U256, EngineError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        return Err(EngineError::Validation(
            "Invalid valueEth (must be numeric/parseable)".to_string(),
        ));
    }
    parse_ether(trimmed)
        .map_err(|_| EngineError::Validation("Invalid valueEth (must be numeric/parseable)".to_string()))
}

/// Wei as a decimal amount of native currency without trailing zeros (`1.5`, `0.000021`).
pub fn display_ether(wei: U256) -> String {
    trim_decimal(format_ether(wei))
}

/// Wei as gwei without trailing zeros.
pub fn display_gwei(wei: u128) -> String {
    format_units(U256::from(wei), "gwei")
        .map(trim_decimal)
        .unwrap_or_else(|_| wei.to_string())
}

/// `gas * price` in wei.
pub fn fee_wei(gas: u64, price: u128) -> U256 {
    U256::from(gas).saturating_mul(U256::from(price))
}

fn trim_decimal(value: String) -> String {
    if !value.contains('.') {
        return value;
    }
    let trimmed = value.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_forms() {
        let lower = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
        let checksummed = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert_eq!(
            parse_address("recipient", lower).unwrap(),
            parse_address("recipient", checksummed).unwrap()
        );
        assert!(parse_address("recipient", &lower.to_uppercase().replace("0X", "0x")).is_ok());
    }

    #[test]
    fn test_address_rejections() {
        assert!(parse_address("recipient", "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
        assert!(parse_address("recipient", "0x5aaeb6053f3e94c9b9a09f33669435e7ef1bea").is_err());
        assert!(parse_address("recipient", "0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
        // Mixed case with one flipped letter fails the checksum.
        let err = parse_address("recipient", "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_tx_hash_format() {
        let hash = format!("0x{}", "Ab".repeat(32));
        assert_eq!(parse_tx_hash(&hash).unwrap(), B256::repeat_byte(0xab));
        let unprefixed = "ab".repeat(32);
        let not_hex = format!("0x{}", "zz".repeat(32));
        for bad in ["", "0x1234", unprefixed.as_str(), not_hex.as_str()] {
            assert_eq!(
                parse_tx_hash(bad).unwrap_err().to_string(),
                "Invalid or missing transaction hash."
            );
        }
    }

    #[test]
    fn test_amounts() {
        assert_eq!(
            parse_amount("1.5").unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("abc").is_err());
        assert_eq!(parse_value_eth("0").unwrap(), U256::ZERO);
    }

    #[test]
    fn test_display_units() {
        assert_eq!(display_ether(U256::from(1_500_000_000_000_000_000u128)), "1.5");
        assert_eq!(display_ether(U256::ZERO), "0");
        assert_eq!(display_gwei(1_500_000_000), "1.5");
        assert_eq!(display_ether(fee_wei(21_000, 1_000_000_000)), "0.000021");
    }
}
