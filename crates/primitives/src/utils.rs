//! Misc serde and byte helpers

use ethers::{
    types::{Address, Bytes, U256},
    utils::{hex, to_checksum},
};

/// Serializes an address as checksum address
pub fn as_checksum_addr<S>(val: &Address, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&to_checksum(val, None))
}

/// Serializes bytes with the leading 20 bytes rendered as checksum address
pub fn as_checksum_bytes<S>(val: &Bytes, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let mut str = hex::encode_prefixed(val);
    s.serialize_str(if val.len() >= 20 {
        let addr = Address::from_slice(&val[0..20]);
        str.replace_range(0..42, &to_checksum(&addr, None));
        &str
    } else {
        &str
    })
}

/// Skip-serializing predicate for optional timestamps that are zero on chain
pub fn is_zero_or_none(val: &Option<U256>) -> bool {
    match val {
        Some(v) => v.is_zero(),
        None => true,
    }
}

/// If possible, parses an address from the first 20 bytes
/// (factory from `init_code`, paymaster from `paymaster_and_data`)
pub fn get_address(buf: &[u8]) -> Option<Address> {
    if buf.len() >= 20 {
        Some(Address::from_slice(&buf[0..20]))
    } else {
        None
    }
}

/// Parses a decimal string into U256 (CLI arguments)
pub fn parse_u256(s: &str) -> Result<U256, String> {
    U256::from_dec_str(s).map_err(|_| format!("{s} is not a valid number"))
}

/// Parses an address from a hex string (CLI arguments)
pub fn parse_address(s: &str) -> Result<Address, String> {
    s.parse::<Address>().map_err(|_| format!("{s} is not a valid address"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_from_prefix_bytes() {
        assert_eq!(get_address(&[]), None);
        assert_eq!(get_address(&[0x1f; 19]), None);

        let buf = [&[0xab; 20][..], &[0xff; 13][..]].concat();
        assert_eq!(get_address(&buf), Some(Address::from_slice(&[0xab; 20])));
    }
}
