// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! IP address family classification.
//!
//! Any literal containing a `:` is IPv6, including IPv4-mapped IPv6 such as
//! `::ffff:10.0.0.1`. The hosts table relies on this so that a dual-stacked
//! node never contributes one endpoint under two families.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// An IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    #[serde(alias = "v4", alias = "IPv4")]
    Ipv4,
    #[serde(alias = "v6", alias = "IPv6")]
    Ipv6,
}

/// The literal is not a bare IP address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{0}' is not a valid IP address literal")]
pub struct InvalidAddress(pub String);

/// Classify a bare address literal (no port, no brackets).
///
/// # Errors
///
/// Returns [`InvalidAddress`] when the literal does not parse as an IP address.
///
/// # Example
///
/// ```rust
/// use kops_controller::ipfamily::{family, IpFamily};
///
/// assert_eq!(family("10.0.0.1").unwrap(), IpFamily::Ipv4);
/// assert_eq!(family("2001:db8::1").unwrap(), IpFamily::Ipv6);
/// assert_eq!(family("::ffff:10.0.0.1").unwrap(), IpFamily::Ipv6);
/// assert!(family("10.0.0.1:443").is_err());
/// ```
pub fn family(literal: &str) -> Result<IpFamily, InvalidAddress> {
    literal
        .parse::<IpAddr>()
        .map_err(|_| InvalidAddress(literal.to_string()))?;

    if literal.contains(':') {
        Ok(IpFamily::Ipv6)
    } else {
        Ok(IpFamily::Ipv4)
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::Ipv4 => f.write_str("ipv4"),
            IpFamily::Ipv6 => f.write_str("ipv6"),
        }
    }
}

impl FromStr for IpFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ipv4" | "v4" => Ok(IpFamily::Ipv4),
            "ipv6" | "v6" => Ok(IpFamily::Ipv6),
            other => Err(format!("unknown address family '{other}'")),
        }
    }
}

#[cfg(test)]
#[path = "ipfamily_tests.rs"]
mod ipfamily_tests;
