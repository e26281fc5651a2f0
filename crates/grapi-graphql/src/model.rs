//! Resource graph nodes.
//!
//! Nodes are the upstream JSON objects themselves. A node never owns its
//! children: relations are hyperlinks (`links.<name>.href` in v3 payloads,
//! `*_url` attributes in legacy entities) that resolvers turn into
//! [`LoaderKey`]s on demand.

use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use crate::loaders::LoaderKey;

/// Process type that receives route mappings without an explicit process.
pub const DEFAULT_PROCESS_TYPE: &str = "web";

/// One App, Package, Process, Droplet, Route, Domain or Instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode(serde_json::Value);

impl ResourceNode {
    /// Wraps an upstream JSON object.
    #[must_use]
    pub fn new(body: serde_json::Value) -> Self {
        Self(body)
    }

    /// Wraps an object loaded from `key`, filling in `guid` from the URL when
    /// the payload does not carry one (legacy entities keep it in metadata).
    #[must_use]
    pub fn with_guid_from(mut body: serde_json::Value, key: &LoaderKey) -> Self {
        if body.get("guid").is_none()
            && let (Some(object), Some(guid)) = (body.as_object_mut(), last_segment(key.as_str()))
        {
            object.insert("guid".into(), serde_json::Value::String(guid));
        }
        Self(body)
    }

    /// Returns the underlying JSON.
    #[must_use]
    pub fn body(&self) -> &serde_json::Value {
        &self.0
    }

    /// Looks up an attribute by JSON pointer (e.g. `/usage/cpu`).
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&serde_json::Value> {
        self.0.pointer(pointer)
    }

    /// Returns a string attribute.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(serde_json::Value::as_str)
    }

    /// Returns the key of the named hyperlink (`links.<name>.href`).
    #[must_use]
    pub fn link(&self, name: &str) -> Option<LoaderKey> {
        self.0
            .get("links")
            .and_then(|links| links.get(name))
            .and_then(|link| link.get("href"))
            .and_then(serde_json::Value::as_str)
            .map(LoaderKey::new)
    }

    /// Splits a JSON array into nodes. Non-array values yield no nodes.
    #[must_use]
    pub fn list(value: serde_json::Value) -> Vec<Self> {
        match value {
            serde_json::Value::Array(items) => items.into_iter().map(Self).collect(),
            _ => Vec::new(),
        }
    }
}

/// A hyperlink inside a payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    /// Absolute URL of the linked resource.
    pub href: String,
}

/// A route mapping binding an app's process to a route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteMapping {
    /// Mapping GUID.
    #[serde(default)]
    pub guid: Option<String>,

    /// Hyperlinks to the mapped app, route and process.
    #[serde(default)]
    pub links: HashMap<String, Link>,
}

impl RouteMapping {
    /// Returns the key of the mapped route.
    #[must_use]
    pub fn route_key(&self) -> Option<LoaderKey> {
        self.links
            .get("route")
            .map(|link| LoaderKey::new(link.href.as_str()))
    }

    /// Returns the process type named by the mapping's process link.
    ///
    /// Process links end in `/processes/<type>`.
    #[must_use]
    pub fn process_type(&self) -> Option<String> {
        self.links
            .get("process")
            .and_then(|link| last_segment(&link.href))
    }

    /// Returns whether this mapping routes traffic to processes of
    /// `process_type`.
    #[must_use]
    pub fn targets_process(&self, process_type: &str) -> bool {
        self.process_type().as_deref().unwrap_or(DEFAULT_PROCESS_TYPE) == process_type
    }
}

/// Returns the last non-empty path segment of a URL, ignoring the query.
fn last_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}
