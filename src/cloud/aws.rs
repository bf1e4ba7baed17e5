// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! AWS identity and IPv6 prefix lookup via the EC2 API.
//!
//! - Identity comes from the instance tags (`kops.k8s.io/instancegroup`,
//!   `k8s.io/role/<role>`, and cluster-autoscaler node-template labels).
//! - The pod CIDR is the single IPv6 prefix delegated to the instance's single
//!   network interface (`DescribeNetworkInterfaces` filtered by
//!   `attachment.instance-id`).

use super::provider_id::parse_aws;
use super::{InstanceIdentity, Role};
use crate::errors::ControllerError;
use crate::labels::{AWS_TAG_INSTANCE_GROUP, AWS_TAG_NODE_LABEL_PREFIX, AWS_TAG_ROLE_PREFIX};
use crate::reconcilers::scope::CallScope;
use async_trait::async_trait;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::Filter;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A network interface attached to an instance, reduced to what the controller reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkInterface {
    pub id: String,
    pub ipv6_prefixes: Vec<String>,
}

/// The EC2 calls the controller makes.
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// `DescribeNetworkInterfaces` filtered by `attachment.instance-id`.
    async fn network_interfaces(
        &self,
        instance_id: &str,
    ) -> Result<Vec<NetworkInterface>, ControllerError>;

    /// Tags of an instance (`DescribeInstances`).
    async fn instance_tags(&self, instance_id: &str)
        -> Result<BTreeMap<String, String>, ControllerError>;
}

/// [`Ec2Api`] backed by the AWS SDK.
pub struct SdkEc2 {
    client: aws_sdk_ec2::Client,
}

impl SdkEc2 {
    #[must_use]
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }
}

/// Classify an EC2 SDK failure.
fn classify_sdk_error<E>(operation: &str, err: &SdkError<E>) -> ControllerError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err {
        SdkError::ServiceError(service) => {
            let code = service.err().code().unwrap_or("Unknown");
            let message = format!("{code}: {}", service.err().message().unwrap_or_default());
            if code.ends_with(".NotFound") {
                ControllerError::NotFound(format!("{operation}: {message}"))
            } else if matches!(
                code,
                "RequestLimitExceeded"
                    | "Throttling"
                    | "InternalError"
                    | "ServiceUnavailable"
                    | "Unavailable"
            ) {
                ControllerError::transient(operation, message)
            } else {
                ControllerError::Terminal(format!("{operation}: {message}"))
            }
        }
        other => ControllerError::transient(operation, DisplayErrorContext(other)),
    }
}

#[async_trait]
impl Ec2Api for SdkEc2 {
    async fn network_interfaces(
        &self,
        instance_id: &str,
    ) -> Result<Vec<NetworkInterface>, ControllerError> {
        const OPERATION: &str = "DescribeNetworkInterfaces";
        let output = self
            .client
            .describe_network_interfaces()
            .filters(
                Filter::builder()
                    .name("attachment.instance-id")
                    .values(instance_id)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify_sdk_error(OPERATION, &e))?;

        Ok(output
            .network_interfaces()
            .iter()
            .map(|eni| NetworkInterface {
                id: eni.network_interface_id().unwrap_or_default().to_string(),
                ipv6_prefixes: eni
                    .ipv6_prefixes()
                    .iter()
                    .filter_map(|p| p.ipv6_prefix().map(ToString::to_string))
                    .collect(),
            })
            .collect())
    }

    async fn instance_tags(
        &self,
        instance_id: &str,
    ) -> Result<BTreeMap<String, String>, ControllerError> {
        const OPERATION: &str = "DescribeInstances";
        let output = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(OPERATION, &e))?;

        let instance = output
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .next()
            .ok_or_else(|| ControllerError::NotFound(format!("instance {instance_id}")))?;

        Ok(instance
            .tags()
            .iter()
            .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
            .collect())
    }
}

/// AWS provider.
#[derive(Clone)]
pub struct AwsProvider {
    ec2: Arc<dyn Ec2Api>,
}

impl AwsProvider {
    #[must_use]
    pub fn new(ec2: Arc<dyn Ec2Api>) -> Self {
        Self { ec2 }
    }

    /// Build an EC2 client from the default credential chain.
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_ec2::config::Region::new(region));
        }
        let config = loader.load().await;
        Self::new(Arc::new(SdkEc2::new(aws_sdk_ec2::Client::new(&config))))
    }

    pub(super) async fn identify_node(
        &self,
        scope: &CallScope,
        provider_id: &str,
    ) -> Result<InstanceIdentity, ControllerError> {
        let id = parse_aws(provider_id)?;
        let tags = scope
            .run("DescribeInstances", self.ec2.instance_tags(&id.instance_id))
            .await?;
        identity_from_tags(&id.instance_id, &tags)
    }

    pub(super) async fn lookup_instance_ipv6_prefix(
        &self,
        scope: &CallScope,
        provider_id: &str,
    ) -> Result<Vec<String>, ControllerError> {
        let id = parse_aws(provider_id)?;
        let interfaces = scope
            .run(
                "DescribeNetworkInterfaces",
                self.ec2.network_interfaces(&id.instance_id),
            )
            .await?;

        let [interface] = interfaces.as_slice() else {
            warn!(instance = %id.instance_id, count = interfaces.len(), "unexpected network interface count");
            return Err(ControllerError::Ambiguous(format!(
                "instance {} has {} network interfaces, expected 1",
                id.instance_id,
                interfaces.len()
            )));
        };

        let [prefix] = interface.ipv6_prefixes.as_slice() else {
            return Err(ControllerError::Ambiguous(format!(
                "network interface {} has {} IPv6 prefixes, expected 1",
                interface.id,
                interface.ipv6_prefixes.len()
            )));
        };

        debug!(instance = %id.instance_id, eni = %interface.id, prefix = %prefix, "found IPv6 prefix");
        Ok(vec![prefix.clone()])
    }
}

/// Derive identity from EC2 instance tags.
///
/// # Errors
///
/// Returns [`ControllerError::Terminal`] when the instance has no instance-group tag.
pub fn identity_from_tags(
    instance_id: &str,
    tags: &BTreeMap<String, String>,
) -> Result<InstanceIdentity, ControllerError> {
    let instance_group = tags.get(AWS_TAG_INSTANCE_GROUP).ok_or_else(|| {
        ControllerError::Terminal(format!(
            "instance {instance_id} has no {AWS_TAG_INSTANCE_GROUP} tag"
        ))
    })?;

    let role = tags
        .keys()
        .filter_map(|k| k.strip_prefix(AWS_TAG_ROLE_PREFIX))
        .find_map(Role::from_tag)
        .unwrap_or(Role::Node);

    let template_labels = tags
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(AWS_TAG_NODE_LABEL_PREFIX)
                .filter(|label| !label.is_empty())
                .map(|label| (label.to_string(), v.clone()))
        })
        .collect();

    Ok(InstanceIdentity::new(instance_group.clone(), role, template_labels))
}

#[cfg(test)]
#[path = "aws_tests.rs"]
mod aws_tests;
