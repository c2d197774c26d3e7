//! Verification helpers for fabric state.

use crate::fake_fabric::{FabricCall, FakeFabric};
use fabric_api::models::{Connection, ServerProfile};
use fabric_types::uri::id_from_uri;
use fabric_types::{BootPriority, MacAddress};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("{what} not found")]
    Missing { what: String },

    #[error("profile {profile} has {count} connections with priority {priority}")]
    DuplicatePriority {
        profile: String,
        priority: &'static str,
        count: usize,
    },

    #[error("no connection with MAC {mac} in profile {profile}")]
    ConnectionNotFound { profile: String, mac: String },

    #[error("{resource} carries {actual:?}, expected {expected:?}")]
    MembershipMismatch {
        resource: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("profile {profile} written without powering off hardware {hardware} first")]
    UnsafeProfileWrite { profile: String, hardware: String },
}

pub type VerifyResult<T> = Result<T, VerificationError>;

/// Checks that at most one connection is Primary and at most one Secondary.
pub fn assert_boot_priorities(profile: &ServerProfile) -> VerifyResult<()> {
    for priority in [BootPriority::Primary, BootPriority::Secondary] {
        let count = profile
            .connections
            .iter()
            .filter(|c| c.priority() == priority)
            .count();
        if count > 1 {
            return Err(VerificationError::DuplicatePriority {
                profile: profile.uri.clone(),
                priority: priority.as_str(),
                count,
            });
        }
    }
    Ok(())
}

/// Returns the connection carrying `mac`.
pub fn find_connection<'a>(profile: &'a ServerProfile, mac: &str) -> VerifyResult<&'a Connection> {
    let parsed: Option<MacAddress> = mac.parse().ok();
    profile
        .connections
        .iter()
        .find(|c| parsed.as_ref().map(|m| c.has_mac(m)).unwrap_or(false))
        .ok_or_else(|| VerificationError::ConnectionNotFound {
            profile: profile.uri.clone(),
            mac: mac.to_string(),
        })
}

fn compare_membership(resource: String, uris: &[String], expected: &[&str]) -> VerifyResult<()> {
    let mut actual: Vec<String> = uris.iter().map(|u| id_from_uri(u).to_string()).collect();
    actual.sort();
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    if actual != expected {
        return Err(VerificationError::MembershipMismatch {
            resource,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Checks the exact network membership of a live uplinkset.
pub fn assert_uplink_set_carries(
    fabric: &FakeFabric,
    uplink_set_id: &str,
    expected: &[&str],
) -> VerifyResult<()> {
    let us = fabric
        .uplink_set(uplink_set_id)
        .ok_or_else(|| VerificationError::Missing {
            what: format!("uplinkset {}", uplink_set_id),
        })?;
    compare_membership(format!("uplinkset {}", uplink_set_id), &us.network_uris, expected)
}

/// Checks the exact network membership of a template uplinkset.
pub fn assert_group_uplink_carries(
    fabric: &FakeFabric,
    group_id: &str,
    uplink_set_name: &str,
    expected: &[&str],
) -> VerifyResult<()> {
    let group = fabric
        .uplink_group(group_id)
        .ok_or_else(|| VerificationError::Missing {
            what: format!("uplink group {}", group_id),
        })?;
    let us = group
        .uplink_set(uplink_set_name)
        .ok_or_else(|| VerificationError::Missing {
            what: format!("uplinkset {} in {}", uplink_set_name, group_id),
        })?;
    compare_membership(
        format!("{}/{}", group_id, uplink_set_name),
        &us.network_uris,
        expected,
    )
}

/// Checks that every profile write in `calls` was preceded by a power-off
/// of `hardware_id` with no power-on in between.
pub fn assert_writes_bracketed_by_power_off(
    calls: &[FabricCall],
    profile_id: &str,
    hardware_id: &str,
) -> VerifyResult<()> {
    let mut powered_off = false;
    for call in calls {
        match call {
            FabricCall::UpdatePowerState { hardware, state } if hardware == hardware_id => {
                powered_off = *state == fabric_types::PowerState::Off;
            }
            FabricCall::UpdateServerProfile(profile) if profile == profile_id => {
                if !powered_off {
                    return Err(VerificationError::UnsafeProfileWrite {
                        profile: profile_id.to_string(),
                        hardware: hardware_id.to_string(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Counts profile writes for `profile_id`.
pub fn profile_writes(calls: &[FabricCall], profile_id: &str) -> usize {
    calls
        .iter()
        .filter(|c| matches!(c, FabricCall::UpdateServerProfile(p) if p == profile_id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_types::PowerState;

    #[test]
    fn test_bracketing() {
        let ok = vec![
            FabricCall::UpdatePowerState {
                hardware: "sh-1".into(),
                state: PowerState::Off,
            },
            FabricCall::UpdateServerProfile("sp-1".into()),
            FabricCall::UpdatePowerState {
                hardware: "sh-1".into(),
                state: PowerState::On,
            },
        ];
        assert!(assert_writes_bracketed_by_power_off(&ok, "sp-1", "sh-1").is_ok());
        assert_eq!(profile_writes(&ok, "sp-1"), 1);

        let bad = vec![FabricCall::UpdateServerProfile("sp-1".into())];
        assert!(assert_writes_bracketed_by_power_off(&bad, "sp-1", "sh-1").is_err());
    }
}
