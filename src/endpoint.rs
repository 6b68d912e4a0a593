//! Candidate endpoint identity.
//!
//! Endpoints are keyed by their URL string; the service tag records which
//! transport the prober used to validate them.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Transport service a candidate URL belongs to.
///
/// Tags arrive as free-form strings from the prober; anything unrecognized
/// maps to `Unknown` rather than failing the event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceTag {
    Direct,
    Https,
    Envoy,
    Snowflake,
    Update,
    Unknown,
}

impl Serialize for ServiceTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ServiceTag::from_raw(&raw))
    }
}

impl ServiceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceTag::Direct => "direct",
            ServiceTag::Https => "https",
            ServiceTag::Envoy => "envoy",
            ServiceTag::Snowflake => "snowflake",
            ServiceTag::Update => "update",
            ServiceTag::Unknown => "unknown",
        }
    }

    /// Parse a raw tag, falling back to `Unknown`.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "direct" => ServiceTag::Direct,
            "https" => ServiceTag::Https,
            "envoy" => ServiceTag::Envoy,
            "snowflake" => ServiceTag::Snowflake,
            "update" => ServiceTag::Update,
            _ => ServiceTag::Unknown,
        }
    }
}

impl fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single candidate network address. Immutable once created.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    url: String,
    service: ServiceTag,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, service: ServiceTag) -> Self {
        Self {
            url: url.into(),
            service,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn service(&self) -> ServiceTag {
        self.service
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Redacted on purpose: endpoint addresses should not leak into logs.
        write!(f, "Endpoint({})", self.service.as_str())
    }
}

/// The designated baseline URLs indicating no proxy is needed.
#[derive(Clone, Debug, Default)]
pub struct DirectEndpoints(BTreeSet<String>);

impl DirectEndpoints {
    pub fn new(urls: impl IntoIterator<Item = String>) -> Self {
        Self(urls.into_iter().collect())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.contains(url)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
