//! Declarative tag selectors.
//!
//! A selector pairs tag-match conditions with attribute templates. Providers
//! evaluate every configured selector against each candidate asset; each
//! selector that matches yields one enriched copy of the asset.
//!
//! Selection pipeline: required fields, tag match, attribute templates in
//! configuration order, reserved label overrides.

use crate::asset::InstanceAsset;
use crate::tag::{CompiledTag, Tag, TagError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Label key that overrides the admin user of a selected asset.
pub const ADMIN_USER_LABEL: &str = "gatesync_admin_user";
/// Label key that overrides the node placement of a selected asset.
pub const NODE_LABEL: &str = "gatesync_node";
/// Label key that overrides the gateway domain of a selected asset.
pub const DOMAIN_LABEL: &str = "gatesync_domain";
/// Label key that excludes an instance from selection when set to "true".
pub const IGNORE_LABEL: &str = "gatesync_ignore";

/// Errors raised while compiling selector configuration.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// A selector without tag conditions would match everything; treat it as
    /// a configuration mistake.
    #[error("selector has no tag conditions")]
    NoTags,
    #[error(transparent)]
    Tag(#[from] TagError),
}

/// Declarative selector configuration as it appears in profile config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Tag-match conditions: label key to value pattern.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Attribute templates applied to accepted assets, in file order.
    #[serde(default)]
    pub attrs: serde_json::Map<String, Value>,
}

/// A compiled selector ready for evaluation.
#[derive(Debug, Clone)]
pub struct TagSelector {
    tags: Vec<CompiledTag>,
    attrs: serde_json::Map<String, Value>,
}

impl TagSelector {
    /// Compiles a declarative selector. Fails on an empty tag set or an
    /// invalid value pattern.
    pub fn compile(config: &SelectorConfig) -> Result<Self, SelectorError> {
        if config.tags.is_empty() {
            return Err(SelectorError::NoTags);
        }
        let tags = config
            .tags
            .iter()
            .map(|(key, pattern)| CompiledTag::new(key.clone(), pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            tags,
            attrs: config.attrs.clone(),
        })
    }

    /// Evaluates the selector against a candidate asset.
    ///
    /// Returns an enriched copy when the asset satisfies the selector, or
    /// `None` when it does not. The input asset is never modified.
    pub fn select(&self, asset: &InstanceAsset) -> Option<InstanceAsset> {
        if !has_required_fields(asset) {
            return None;
        }
        if !self.match_tags(&asset.labels) {
            return None;
        }
        let mut selected = asset.clone();
        for (name, template) in &self.attrs {
            // Substitutions are rebuilt per attribute so a template may read
            // fields written by an earlier one.
            let subs = substitutions(&selected);
            let rendered = render_template(template, &subs);
            apply_attribute(&mut selected, name, &rendered);
        }
        apply_label_overrides(&mut selected);
        Some(selected)
    }

    /// Every configured tag must find a same-key label, and every same-key
    /// label must satisfy the pattern: one failing label rejects the asset
    /// even if a sibling matches.
    fn match_tags(&self, labels: &[Tag]) -> bool {
        for tag in &self.tags {
            let mut matched = false;
            for label in labels {
                if label.key == tag.key() {
                    if tag.matches(&label.value) {
                        matched = true;
                    } else {
                        return false;
                    }
                }
            }
            if !matched {
                return false;
            }
        }
        true
    }
}

/// Whether a candidate asset is excluded from selection outright: missing
/// required fields, no labels at all, or an ignore label set to "true"
/// (case-insensitive).
pub fn is_ignored(asset: &InstanceAsset) -> bool {
    if !has_required_fields(asset) || asset.labels.is_empty() {
        return true;
    }
    asset
        .labels
        .iter()
        .any(|l| l.key == IGNORE_LABEL && l.value.eq_ignore_ascii_case("true"))
}

fn has_required_fields(asset: &InstanceAsset) -> bool {
    fn filled(field: &Option<String>) -> bool {
        field.as_deref().map_or(false, |v| !v.is_empty())
    }
    filled(&asset.number) && filled(&asset.hostname) && filled(&asset.ip)
}

fn substitutions(asset: &InstanceAsset) -> [(&'static str, String); 6] {
    fn text(field: &Option<String>) -> String {
        field.clone().unwrap_or_default()
    }
    [
        ("{number}", text(&asset.number)),
        ("{hostname}", text(&asset.hostname)),
        ("{ip}", text(&asset.ip)),
        ("{public_ip}", text(&asset.public_ip)),
        ("{account}", text(&asset.account)),
        ("{region}", text(&asset.region)),
    ]
}

/// Expands placeholders recursively through strings, sequences, and
/// mappings. Unknown placeholders pass through verbatim.
fn render_template(template: &Value, subs: &[(&'static str, String)]) -> Value {
    match template {
        Value::String(s) => {
            let mut rendered = s.clone();
            for (placeholder, replacement) in subs {
                rendered = rendered.replace(placeholder, replacement);
            }
            Value::String(rendered)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| render_template(v, subs)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_template(v, subs)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Writes a rendered template value onto the asset field named by the
/// attribute. Unknown attribute names are skipped with a warning; the record
/// carries no dynamic attribute bag.
fn apply_attribute(asset: &mut InstanceAsset, name: &str, value: &Value) {
    match name {
        "hostname" => set_string(&mut asset.hostname, name, value),
        "ip" => set_string(&mut asset.ip, name, value),
        "public_ip" => set_string(&mut asset.public_ip, name, value),
        "comment" => set_string(&mut asset.comment, name, value),
        "admin_user" => set_string(&mut asset.admin_user, name, value),
        "domain" => set_string(&mut asset.domain, name, value),
        "account" => set_string(&mut asset.account, name, value),
        "region" => set_string(&mut asset.region, name, value),
        "protocol" => {
            if let Some(v) = value_as_string(value) {
                asset.protocol = v;
            } else {
                warn_skipped(name, value);
            }
        }
        "platform" => {
            if let Some(v) = value_as_string(value) {
                asset.platform = v;
            } else {
                warn_skipped(name, value);
            }
        }
        "port" => match port_value(value) {
            Some(port) => asset.port = port,
            None => warn_skipped(name, value),
        },
        "nodes" => match value {
            Value::String(s) => asset.nodes = vec![s.clone()],
            Value::Array(items) => {
                asset.nodes = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
            }
            _ => warn_skipped(name, value),
        },
        other => {
            warn!(
                attribute = other,
                "selector attribute does not map to an asset field, skipping"
            );
        }
    }
}

fn set_string(field: &mut Option<String>, name: &str, value: &Value) {
    match value_as_string(value) {
        Some(v) => *field = Some(v),
        None => warn_skipped(name, value),
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn port_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn warn_skipped(name: &str, value: &Value) {
    warn!(
        attribute = name,
        value = %value,
        "selector attribute value has an unexpected shape, skipping"
    );
}

/// Reserved labels override templated attributes outright.
fn apply_label_overrides(asset: &mut InstanceAsset) {
    let mut admin_user = None;
    let mut node = None;
    let mut domain = None;
    for label in &asset.labels {
        match label.key.as_str() {
            ADMIN_USER_LABEL => admin_user = Some(label.value.clone()),
            NODE_LABEL => node = Some(label.value.clone()),
            DOMAIN_LABEL => domain = Some(label.value.clone()),
            _ => {}
        }
    }
    if let Some(value) = admin_user {
        asset.admin_user = Some(value);
    }
    if let Some(value) = node {
        asset.nodes = vec![value];
    }
    if let Some(value) = domain {
        asset.domain = Some(value);
    }
}
