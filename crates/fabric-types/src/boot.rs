//! Boot priority and power state of fabric-managed servers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Firmware boot hint carried by a server profile connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BootPriority {
    Primary,
    Secondary,
    NotBootable,
}

impl BootPriority {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BootPriority::Primary => "Primary",
            BootPriority::Secondary => "Secondary",
            BootPriority::NotBootable => "NotBootable",
        }
    }

    /// Returns true for `Primary` and `Secondary`.
    pub const fn is_bootable(&self) -> bool {
        matches!(self, BootPriority::Primary | BootPriority::Secondary)
    }
}

impl Default for BootPriority {
    fn default() -> Self {
        BootPriority::NotBootable
    }
}

impl fmt::Display for BootPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BootPriority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Primary" => Ok(BootPriority::Primary),
            "Secondary" => Ok(BootPriority::Secondary),
            "NotBootable" => Ok(BootPriority::NotBootable),
            _ => Err(ParseError::InvalidBootPriority(s.to_string())),
        }
    }
}

/// Power state reported by server hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    On,
    Off,
    PoweringOn,
    PoweringOff,
    Resetting,
    #[serde(other)]
    Unknown,
}

impl PowerState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PowerState::On => "On",
            PowerState::Off => "Off",
            PowerState::PoweringOn => "PoweringOn",
            PowerState::PoweringOff => "PoweringOff",
            PowerState::Resetting => "Resetting",
            PowerState::Unknown => "Unknown",
        }
    }

    /// Returns the settled state a snapshot of `self` should be restored to.
    ///
    /// Transitional states restore to where they were heading; `Unknown`
    /// cannot be restored.
    pub const fn restore_target(&self) -> Option<PowerState> {
        match self {
            PowerState::On | PowerState::PoweringOn | PowerState::Resetting => {
                Some(PowerState::On)
            }
            PowerState::Off | PowerState::PoweringOff => Some(PowerState::Off),
            PowerState::Unknown => None,
        }
    }
}

impl Default for PowerState {
    fn default() -> Self {
        PowerState::Unknown
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_boot_priority_round_trip() {
        for p in [
            BootPriority::Primary,
            BootPriority::Secondary,
            BootPriority::NotBootable,
        ] {
            assert_eq!(p.as_str().parse::<BootPriority>().unwrap(), p);
        }
        assert!("primary".parse::<BootPriority>().is_err());
        assert!(BootPriority::Secondary.is_bootable());
        assert!(!BootPriority::NotBootable.is_bootable());
    }

    #[test]
    fn test_power_state_restore_target() {
        assert_eq!(PowerState::On.restore_target(), Some(PowerState::On));
        assert_eq!(PowerState::PoweringOn.restore_target(), Some(PowerState::On));
        assert_eq!(PowerState::PoweringOff.restore_target(), Some(PowerState::Off));
        assert_eq!(PowerState::Unknown.restore_target(), None);
    }

    #[test]
    fn test_power_state_unknown_variant() {
        let s: PowerState = serde_json::from_str("\"Flickering\"").unwrap();
        assert_eq!(s, PowerState::Unknown);
        let on: PowerState = serde_json::from_str("\"On\"").unwrap();
        assert_eq!(on, PowerState::On);
    }
}
