//! MAC address type with case-insensitive parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// The SDN plane reports MACs in lower case while the fabric backend reports
/// them in upper case; parsing both into bytes makes equality independent of
/// the source.
///
/// # Examples
///
/// ```
/// use fabric_types::MacAddress;
///
/// let sdn: MacAddress = "aa:bb:cc:00:11:22".parse().unwrap();
/// let fabric: MacAddress = "AA:BB:CC:00:11:22".parse().unwrap();
/// assert_eq!(sdn, fabric);
/// assert_eq!(fabric.to_upper_string(), "AA:BB:CC:00:11:22");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Creates a new MAC address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Returns the raw bytes of the MAC address.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Formats the address the way the fabric backend stores it.
    pub fn to_upper_string(&self) -> String {
        self.to_string().to_uppercase()
    }

    /// Returns true if `other` parses to the same address.
    ///
    /// Unparseable input never matches.
    pub fn matches_str(&self, other: &str) -> bool {
        other.parse::<MacAddress>().map(|m| m == *self).unwrap_or(false)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') { ':' } else { '-' };

        let parts: Vec<&str> = s.trim().split(separator).collect();
        if parts.len() != 6 {
            return Err(ParseError::InvalidMacAddress(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ParseError::InvalidMacAddress(s.to_string()));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidMacAddress(s.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}
