//! Span tags shared by every operation on a connection.

use std::collections::BTreeMap;
use std::fmt;

use crate::conninfo::ConnectionConfig;

/// Scalar value of a span tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Str(s) => f.write_str(s),
            TagValue::Int(i) => write!(f, "{i}"),
            TagValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Str(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Str(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Int(value)
    }
}

impl From<u16> for TagValue {
    fn from(value: u16) -> Self {
        TagValue::Int(i64::from(value))
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

/// Tag mapping attached to a single span.
pub type Tags = BTreeMap<&'static str, TagValue>;

/// Connection-level tags, computed once when the connection is opened.
///
/// There is no way to mutate the set after construction; operations take a
/// private copy with [`SharedTags::to_tags`] and add their own tags to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedTags(Tags);

impl SharedTags {
    /// Compute the tag set for a connection opened with `config`.
    ///
    /// `peer.address` is only present when both host and port are known.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        let mut tags = Tags::new();
        tags.insert("component", "pg".into());
        tags.insert("db.type", "pg".into());
        tags.insert("span.kind", "client".into());

        if let Some(dbname) = &config.dbname {
            tags.insert("db.instance", dbname.as_str().into());
        }
        if let Some(user) = &config.user {
            tags.insert("db.user", user.as_str().into());
        }
        if let Some(host) = &config.host {
            tags.insert("peer.hostname", host.as_str().into());
        }
        if let Some(port) = config.port {
            tags.insert("peer.port", port.into());
        }
        if let (Some(host), Some(port)) = (&config.host, config.port) {
            tags.insert("peer.address", format!("pg://{host}:{port}").into());
        }

        Self(tags)
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &TagValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// A private copy for one operation.
    pub fn to_tags(&self) -> Tags {
        self.0.clone()
    }
}
