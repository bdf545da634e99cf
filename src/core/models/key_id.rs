use std::fmt;
use std::str::FromStr;

/// A 64-bit OpenPGP key identifier.
///
/// The all-zero value is the OpenPGP wildcard ("anonymous recipient")
/// and stands for "no identifier available".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u64);

impl KeyId {
    /// Sentinel for "no identifier available".
    pub const NONE: KeyId = KeyId(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Key ID of a v4 fingerprint (low 64 bits).
    pub fn from_v4_fingerprint(fpr: &[u8]) -> Option<Self> {
        let tail: [u8; 8] = fpr.get(fpr.len().checked_sub(8)?..)?.try_into().ok()?;
        Some(Self::from_be_bytes(tail))
    }

    /// Key ID of a v6 fingerprint (high 64 bits).
    pub fn from_v6_fingerprint(fpr: &[u8]) -> Option<Self> {
        let head: [u8; 8] = fpr.get(..8)?.try_into().ok()?;
        Some(Self::from_be_bytes(head))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Last eight hex digits, the short form shown next to user IDs.
    pub fn small_fingerprint(&self) -> String {
        format!("{:08X}", self.0 & 0xFFFF_FFFF)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for KeyId {
    type Err = String;

    /// Parse a hex key ID, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex.is_empty() || hex.len() > 16 {
            return Err(format!("'{s}' is not a 64-bit key ID"));
        }

        u64::from_str_radix(hex, 16)
            .map(KeyId)
            .map_err(|e| format!("'{s}' is not a hex key ID: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_sixteen_upper_hex_digits() {
        let id = KeyId::new(0x00ab_cdef_0123_4567);
        assert_eq!(id.to_string(), "00ABCDEF01234567");
        assert_eq!(id.small_fingerprint(), "01234567");
    }

    #[test]
    fn parse_accepts_prefix_and_lowercase() {
        let id: KeyId = "0xdeadbeefcafebabe".parse().unwrap();
        assert_eq!(id, KeyId::new(0xdead_beef_cafe_babe));
        assert_eq!("CAFEBABE".parse::<KeyId>().unwrap().as_u64(), 0xcafe_babe);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<KeyId>().is_err());
        assert!("xyz".parse::<KeyId>().is_err());
        assert!("0123456789ABCDEF0".parse::<KeyId>().is_err());
    }

    #[test]
    fn fingerprint_derivations() {
        let fpr: Vec<u8> = (1..=20).collect();
        assert_eq!(
            KeyId::from_v4_fingerprint(&fpr).unwrap(),
            KeyId::from_be_bytes([13, 14, 15, 16, 17, 18, 19, 20])
        );
        assert_eq!(
            KeyId::from_v6_fingerprint(&fpr).unwrap(),
            KeyId::from_be_bytes([1, 2, 3, 4, 5, 6, 7, 8])
        );
        assert!(KeyId::from_v4_fingerprint(&[1, 2]).is_none());
    }

    #[test]
    fn wildcard_is_none() {
        assert!(KeyId::NONE.is_none());
        assert!(!KeyId::new(1).is_none());
    }
}
