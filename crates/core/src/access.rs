//! Chamber network access policy
//!
//! Terminals other than the moderator's must sign in from the chamber's
//! registered address. A chamber with no address, or a loopback one, is
//! in test mode and accepts any client.

use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{ChamberConfig, Role};

pub struct AccessPolicy;

impl AccessPolicy {
    fn is_test_mode(allowed_ip: &str) -> bool {
        let ip = allowed_ip.trim();
        ip.is_empty() || ip == "127.0.0.1" || ip == "localhost"
    }

    /// Check a sign-in against the chamber's config
    ///
    /// `client_ip` is `None` when the client address could not be detected.
    pub fn check(config: Option<&ChamberConfig>, role: Role, client_ip: Option<&str>) -> Result<()> {
        if role == Role::Moderator {
            return Ok(());
        }
        let Some(config) = config else {
            return Ok(());
        };

        if !config.is_active {
            warn!(city = %config.city, role = %role, "Sign-in to inactive chamber refused");
            return Err(Error::AccessDenied(format!(
                "chamber {} is not active",
                config.city
            )));
        }

        if Self::is_test_mode(&config.allowed_ip) {
            return Ok(());
        }

        match client_ip {
            Some(ip) if ip.trim() == config.allowed_ip.trim() => Ok(()),
            other => {
                warn!(city = %config.city, client_ip = ?other, "Sign-in from unauthorized network");
                Err(Error::AccessDenied(format!(
                    "network {} is not authorized for {}",
                    other.unwrap_or("unidentified"),
                    config.city
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chamber(ip: &str) -> ChamberConfig {
        ChamberConfig::new("Jequitinhonha".into()).with_allowed_ip(ip.into())
    }

    #[test]
    fn test_moderator_bypasses() {
        let mut config = chamber("200.1.2.3");
        config.is_active = false;
        assert!(AccessPolicy::check(Some(&config), Role::Moderator, None).is_ok());
    }

    #[test]
    fn test_test_mode_addresses() {
        for ip in ["", "127.0.0.1", "localhost"] {
            assert!(AccessPolicy::check(Some(&chamber(ip)), Role::Councilman, Some("10.0.0.9")).is_ok());
            assert!(AccessPolicy::check(Some(&chamber(ip)), Role::Clerk, None).is_ok());
        }
    }

    #[test]
    fn test_registered_address_must_match() {
        let config = chamber("200.1.2.3");
        assert!(AccessPolicy::check(Some(&config), Role::President, Some("200.1.2.3")).is_ok());
        assert!(matches!(
            AccessPolicy::check(Some(&config), Role::President, Some("200.1.2.4")),
            Err(Error::AccessDenied(_))
        ));
        assert!(matches!(
            AccessPolicy::check(Some(&config), Role::Councilman, None),
            Err(Error::AccessDenied(_))
        ));
    }

    #[test]
    fn test_inactive_chamber_rejects() {
        let mut config = chamber("");
        config.is_active = false;
        assert!(matches!(
            AccessPolicy::check(Some(&config), Role::Clerk, Some("127.0.0.1")),
            Err(Error::AccessDenied(_))
        ));
    }

    #[test]
    fn test_unknown_chamber_is_open() {
        assert!(AccessPolicy::check(None, Role::Councilman, None).is_ok());
    }
}
