//! AWS EC2 assets provider.
//!
//! Enumerates running instances in the profile's region via
//! `DescribeInstances`, normalizes each into an asset candidate (EC2 tags
//! become labels, the Name tag drives the hostname), and applies the
//! profile's selectors. Provenance is stamped into the comment so registry
//! assets can later be traced back to their profile.

use crate::traits::{AssetsProvider, AwsProfileConfig, ConnectorError, ConnectorResult};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2 as ec2;
use gs_core::selector::{self, TagSelector};
use gs_core::{InstanceAsset, Tag};
use tracing::{debug, info, instrument};

pub struct AwsAssetsProvider {
    profile: String,
    config: AwsProfileConfig,
    selectors: Vec<TagSelector>,
    client: ec2::Client,
}

impl AwsAssetsProvider {
    /// Builds a provider for `profile`. Credentials come from the standard
    /// AWS sources; the region is pinned from the profile config.
    pub async fn new(profile: &str, config: AwsProfileConfig) -> ConnectorResult<Self> {
        let selectors = config
            .selectors
            .iter()
            .map(TagSelector::compile)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                ConnectorError::ConfigError(format!("profile {}: {}", profile, e))
            })?;

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Ok(Self {
            profile: profile.to_string(),
            config,
            selectors,
            client: ec2::Client::new(&shared),
        })
    }
}

#[async_trait]
impl AssetsProvider for AwsAssetsProvider {
    fn profile(&self) -> &str {
        &self.profile
    }

    #[instrument(skip(self), fields(profile = %self.profile))]
    async fn list_assets(
        &self,
        instance_ids: Option<&[String]>,
        limit: Option<usize>,
    ) -> ConnectorResult<Vec<InstanceAsset>> {
        let limit = limit.or(self.config.limit);
        let mut assets = Vec::new();
        let mut next_token: Option<String> = None;

        'pages: loop {
            let mut request = self.client.describe_instances().filters(
                ec2::types::Filter::builder()
                    .name("instance-state-name")
                    .values("running")
                    .build(),
            );
            // Unknown ids simply match nothing; a hard error here would turn
            // a terminated instance into a poison request
            if let Some(ids) = instance_ids {
                request = request.filters(
                    ec2::types::Filter::builder()
                        .name("instance-id")
                        .set_values(Some(ids.to_vec()))
                        .build(),
                );
            }
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }

            let response = request.send().await.map_err(|e| {
                ConnectorError::Provider(format!("DescribeInstances failed: {}", e))
            })?;

            for reservation in response.reservations() {
                for instance in reservation.instances() {
                    let candidate =
                        candidate_from_instance(&self.profile, &self.config.region, instance);

                    if selector::is_ignored(&candidate) {
                        info!(asset = %candidate, "instance ignored");
                        continue;
                    }

                    // One yield per satisfying selector, each with its own
                    // attribute overrides
                    for sel in &self.selectors {
                        if let Some(selected) = sel.select(&candidate) {
                            debug!(asset = %selected, "instance selected");
                            assets.push(selected);
                            if let Some(max) = limit {
                                if assets.len() >= max {
                                    break 'pages;
                                }
                            }
                        }
                    }
                }
            }

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        info!(count = assets.len(), "generated assets from EC2 inventory");
        Ok(assets)
    }
}

/// Normalizes one EC2 instance into an asset candidate.
fn candidate_from_instance(
    profile: &str,
    configured_region: &str,
    instance: &ec2::types::Instance,
) -> InstanceAsset {
    let labels: Vec<Tag> = instance
        .tags()
        .iter()
        .filter_map(|tag| match (tag.key(), tag.value()) {
            (Some(key), Some(value)) => Some(Tag::new(key, value)),
            _ => None,
        })
        .collect();

    let instance_id = instance.instance_id().unwrap_or_default().to_string();
    let region = if configured_region.is_empty() {
        instance
            .placement()
            .and_then(|p| p.availability_zone())
            .map(region_from_zone)
            .unwrap_or_default()
    } else {
        configured_region.to_string()
    };

    let mut asset = InstanceAsset::new();
    asset.number = Some(instance_id.clone());
    asset.hostname = Some(derive_hostname(name_tag(&labels), &instance_id));
    asset.ip = instance.private_ip_address().map(str::to_string);
    asset.public_ip = instance.public_ip_address().map(str::to_string);
    asset.labels = labels;
    asset.account = Some(profile.to_string());
    asset.region = Some(region.clone());

    let instance_type = instance
        .instance_type()
        .map(|t| t.as_str().to_string());
    let key_name = instance.key_name().map(str::to_string);
    let image_id = instance.image_id().map(str::to_string);

    let mut meta: Vec<(&str, &str)> = vec![
        ("provider", "aws"),
        ("account", profile),
        ("region", &region),
    ];
    if let Some(value) = instance_type.as_deref() {
        meta.push(("instance_type", value));
    }
    if let Some(value) = key_name.as_deref() {
        meta.push(("key_name", value));
    }
    if let Some(value) = image_id.as_deref() {
        meta.push(("image_id", value));
    }
    asset.put_comment(&meta);

    asset
}

/// Hostname from the Name tag. A blank name falls back to the instance id;
/// a name that does not already end with the instance id gets it appended,
/// keeping hostnames unique under hostname-keyed sync.
fn derive_hostname(name: Option<&str>, instance_id: &str) -> String {
    let trimmed = name.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        instance_id.to_string()
    } else if trimmed.ends_with(instance_id) {
        trimmed.to_string()
    } else {
        format!("{}-{}", trimmed, instance_id)
    }
}

fn name_tag(labels: &[Tag]) -> Option<&str> {
    labels
        .iter()
        .find(|tag| tag.key == "Name")
        .map(|tag| tag.value.as_str())
}

/// `us-east-1a` to `us-east-1`. Zones end in a single letter.
fn region_from_zone(zone: &str) -> String {
    let trimmed = zone.trim();
    match trimmed.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => trimmed[..trimmed.len() - 1].to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instance() -> ec2::types::Instance {
        ec2::types::Instance::builder()
            .instance_id("i-0abc123")
            .private_ip_address("10.0.0.5")
            .public_ip_address("54.1.2.3")
            .instance_type(ec2::types::InstanceType::T3Medium)
            .key_name("ops-key")
            .image_id("ami-123")
            .placement(
                ec2::types::Placement::builder()
                    .availability_zone("us-east-1a")
                    .build(),
            )
            .tags(ec2::types::Tag::builder().key("Name").value("web").build())
            .tags(ec2::types::Tag::builder().key("env").value("prod").build())
            .build()
    }

    #[test]
    fn test_derive_hostname() {
        assert_eq!(derive_hostname(Some("web"), "i-0abc"), "web-i-0abc");
        assert_eq!(derive_hostname(Some("web-i-0abc"), "i-0abc"), "web-i-0abc");
        assert_eq!(derive_hostname(Some("  "), "i-0abc"), "i-0abc");
        assert_eq!(derive_hostname(None, "i-0abc"), "i-0abc");
        assert_eq!(derive_hostname(Some(" web "), "i-0abc"), "web-i-0abc");
    }

    #[test]
    fn test_region_from_zone() {
        assert_eq!(region_from_zone("us-east-1a"), "us-east-1");
        assert_eq!(region_from_zone("eu-central-1b"), "eu-central-1");
        assert_eq!(region_from_zone("us-east-1"), "us-east-1");
        assert_eq!(region_from_zone(""), "");
    }

    #[test]
    fn test_candidate_from_instance() {
        let instance = sample_instance();
        let asset = candidate_from_instance("prod", "us-east-1", &instance);

        assert_eq!(asset.number.as_deref(), Some("i-0abc123"));
        assert_eq!(asset.hostname.as_deref(), Some("web-i-0abc123"));
        assert_eq!(asset.ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(asset.public_ip.as_deref(), Some("54.1.2.3"));
        assert_eq!(asset.account.as_deref(), Some("prod"));
        assert_eq!(asset.region.as_deref(), Some("us-east-1"));
        assert_eq!(asset.labels.len(), 2);
        assert_eq!(
            asset.comment.as_deref(),
            Some(
                "provider=aws;account=prod;region=us-east-1;\
                 instance_type=t3.medium;key_name=ops-key;image_id=ami-123"
            )
        );
        assert_eq!(asset.comment_account().as_deref(), Some("prod"));
    }

    #[test]
    fn test_candidate_region_falls_back_to_zone() {
        let instance = sample_instance();
        let asset = candidate_from_instance("prod", "", &instance);
        assert_eq!(asset.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_candidate_without_optional_fields() {
        let instance = ec2::types::Instance::builder()
            .instance_id("i-bare")
            .private_ip_address("10.0.0.9")
            .build();
        let asset = candidate_from_instance("prod", "us-east-1", &instance);

        assert_eq!(asset.hostname.as_deref(), Some("i-bare"));
        assert!(asset.public_ip.is_none());
        assert_eq!(
            asset.comment.as_deref(),
            Some("provider=aws;account=prod;region=us-east-1")
        );
    }
}
