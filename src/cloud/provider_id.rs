// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Parsing of `Node.spec.providerID` URIs.
//!
//! | Cloud | Format |
//! |-------|--------|
//! | AWS | `aws:///<zone>/<instance-id>` |
//! | GCE | `gce://<project>/<zone>/<instance-name>` |
//! | Scaleway | `scaleway://instance/<zone>/<server-id>` |
//!
//! An empty provider ID means the cloud controller has not initialized the
//! node yet ([`ControllerError::NotReady`]). A non-empty ID that does not
//! match the expected shape can never become valid and is
//! [`ControllerError::Terminal`].

use crate::errors::ControllerError;
use k8s_openapi::api::core::v1::Node;

/// `aws:///<zone>/<instance-id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsProviderId {
    pub zone: String,
    pub instance_id: String,
}

/// `gce://<project>/<zone>/<instance-name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GceProviderId {
    pub project: String,
    pub zone: String,
    pub instance: String,
}

/// `scaleway://instance/<zone>/<server-id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalewayProviderId {
    pub zone: String,
    pub server_id: String,
}

impl ScalewayProviderId {
    /// Region of the zone (`fr-par-1` is in `fr-par`).
    #[must_use]
    pub fn region(&self) -> &str {
        match self.zone.rsplit_once('-') {
            Some((region, suffix)) if suffix.chars().all(|c| c.is_ascii_digit()) => region,
            _ => &self.zone,
        }
    }
}

/// The node's non-empty provider ID.
///
/// # Errors
///
/// Returns [`ControllerError::NotReady`] when the provider ID is missing or empty.
pub fn provider_id(node: &Node) -> Result<&str, ControllerError> {
    node.spec
        .as_ref()
        .and_then(|spec| spec.provider_id.as_deref())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ControllerError::NotReady(format!(
                "node {} has no providerID yet",
                node.metadata.name.as_deref().unwrap_or_default()
            ))
        })
}

fn malformed(provider_id: &str, expected: &str) -> ControllerError {
    ControllerError::Terminal(format!(
        "malformed providerID '{provider_id}', expected {expected}"
    ))
}

/// Split `rest` on `/` and require exactly `n` non-empty segments.
fn segments(rest: &str, n: usize) -> Option<Vec<&str>> {
    let parts: Vec<&str> = rest.split('/').collect();
    (parts.len() == n && parts.iter().all(|p| !p.is_empty())).then_some(parts)
}

/// Parse an AWS provider ID.
///
/// # Errors
///
/// Returns [`ControllerError::Terminal`] when the ID is not `aws:///<zone>/<instance-id>`.
pub fn parse_aws(provider_id: &str) -> Result<AwsProviderId, ControllerError> {
    const EXPECTED: &str = "aws:///<zone>/<instance-id>";
    let rest = provider_id
        .strip_prefix("aws:///")
        .ok_or_else(|| malformed(provider_id, EXPECTED))?;
    let parts = segments(rest, 2).ok_or_else(|| malformed(provider_id, EXPECTED))?;
    if !parts[1].starts_with("i-") {
        return Err(malformed(provider_id, EXPECTED));
    }
    Ok(AwsProviderId {
        zone: parts[0].to_string(),
        instance_id: parts[1].to_string(),
    })
}

/// Parse a GCE provider ID.
///
/// # Errors
///
/// Returns [`ControllerError::Terminal`] when the ID is not `gce://<project>/<zone>/<instance>`.
pub fn parse_gce(provider_id: &str) -> Result<GceProviderId, ControllerError> {
    const EXPECTED: &str = "gce://<project>/<zone>/<instance>";
    let rest = provider_id
        .strip_prefix("gce://")
        .ok_or_else(|| malformed(provider_id, EXPECTED))?;
    let parts = segments(rest, 3).ok_or_else(|| malformed(provider_id, EXPECTED))?;
    Ok(GceProviderId {
        project: parts[0].to_string(),
        zone: parts[1].to_string(),
        instance: parts[2].to_string(),
    })
}

/// Parse a Scaleway provider ID.
///
/// # Errors
///
/// Returns [`ControllerError::Terminal`] when the ID is not `scaleway://instance/<zone>/<server-id>`.
pub fn parse_scaleway(provider_id: &str) -> Result<ScalewayProviderId, ControllerError> {
    const EXPECTED: &str = "scaleway://instance/<zone>/<server-id>";
    let rest = provider_id
        .strip_prefix("scaleway://instance/")
        .ok_or_else(|| malformed(provider_id, EXPECTED))?;
    let parts = segments(rest, 2).ok_or_else(|| malformed(provider_id, EXPECTED))?;
    Ok(ScalewayProviderId {
        zone: parts[0].to_string(),
        server_id: parts[1].to_string(),
    })
}

#[cfg(test)]
#[path = "provider_id_tests.rs"]
mod provider_id_tests;
