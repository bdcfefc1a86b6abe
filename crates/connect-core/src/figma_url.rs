//! Figma URL parsing and node id normalization.
//!
//! Figma writes node ids as `28-1289` in URLs and `28:1289` everywhere else.
//! [`NodeId`] always holds the colon form; [`NodeId::file_stem`] gives the
//! hyphen form used for file names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ConnectError, Result};

// `/file/<key>/...` or `/design/<key>/...`, capturing the key and the query string
static FIGMA_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(?:file|design)/([A-Za-z0-9]+)(?:/[^?#]*)?\?([^#]*)")
        .expect("Invalid regex pattern")
});

static NODE_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)[-:]([0-9]+)$").expect("Invalid regex pattern"));

/// Design node identifier in colon form (`28:1289`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Parse either `28:1289` or `28-1289`
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let caps = NODE_ID_REGEX
            .captures(trimmed)
            .ok_or_else(|| ConnectError::InvalidNodeId(raw.to_string()))?;
        Ok(Self(format!("{}:{}", &caps[1], &caps[2])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hyphen form, safe for file names and URLs
    pub fn file_stem(&self) -> String {
        self.0.replace(':', "-")
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = ConnectError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// A parsed Figma link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaUrl {
    pub file_key: String,
    pub node_id: NodeId,
    pub original_url: String,
}

impl FigmaUrl {
    /// Extract the file key and node id from a Figma link.
    ///
    /// Returns `None` for anything that is not a `/file/` or `/design/` link
    /// carrying a well-formed `node-id` query parameter.
    pub fn parse(url: &str) -> Option<Self> {
        let caps = FIGMA_PATH_REGEX.captures(url)?;
        let file_key = caps[1].to_string();

        let raw_node = caps[2]
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "node-id")
            .map(|(_, value)| value.replace("%3A", ":").replace("%3a", ":"))?;

        let node_id = NodeId::parse(&raw_node).ok()?;

        Some(Self {
            file_key,
            node_id,
            original_url: url.to_string(),
        })
    }
}
