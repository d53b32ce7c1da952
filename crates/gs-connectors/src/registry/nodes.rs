//! Node path resolution over the registry's flat node listing.
//!
//! The registry stores its organizational tree flat: every node carries a
//! depth-encoded key (`"1:2:3"`) and its own path segment as `value`. A
//! `/`-delimited path like `Default/ops/prod` resolves by walking one depth
//! level per segment, descending only into keys that extend the parent key
//! at a `:` boundary.

use super::resources::NodeRecord;

pub const NODE_KEY_SEP: char = ':';
pub const NODE_PATH_SEP: char = '/';

/// Resolves a `/`-delimited node path to the leaf node id.
///
/// When sibling nodes share a segment value, the first record in listing
/// order wins. Returns `None` as soon as any segment has no match.
pub fn resolve_node_path(records: &[NodeRecord], path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split(NODE_PATH_SEP).collect();
    let mut parent_key: Option<&str> = None;

    for (depth, segment) in segments.iter().enumerate() {
        let level = depth + 1;
        let found = records.iter().find(|record| {
            key_depth(&record.key) == level
                && parent_key.map_or(true, |parent| is_child_key(&record.key, parent))
                && record.value == *segment
        })?;

        if level == segments.len() {
            return Some(found.id.clone());
        }
        parent_key = Some(&found.key);
    }

    None
}

/// Resolves a node id back to its full `/`-delimited path by stripping one
/// key segment at a time and looking the ancestor up in the listing.
pub fn node_full_path(records: &[NodeRecord], node_id: &str) -> Option<String> {
    let leaf = records.iter().find(|record| record.id == node_id)?;
    let mut segments = vec![leaf.value.as_str()];
    let mut key = leaf.key.as_str();

    while let Some(idx) = key.rfind(NODE_KEY_SEP) {
        let parent_key = &key[..idx];
        let parent = records.iter().find(|record| record.key == parent_key)?;
        segments.insert(0, &parent.value);
        key = parent_key;
    }

    Some(segments.join(&NODE_PATH_SEP.to_string()))
}

fn key_depth(key: &str) -> usize {
    key.split(NODE_KEY_SEP).count()
}

/// True when `key` sits strictly below `parent`, i.e. extends it at a `:`
/// boundary. `"1:20"` is not a child of `"1:2"`.
fn is_child_key(key: &str, parent: &str) -> bool {
    key.len() > parent.len()
        && key.starts_with(parent)
        && key.as_bytes()[parent.len()] == NODE_KEY_SEP as u8
}
