//! Hierarchical cache keys.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Request verbs that produce cacheable responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
}

impl Verb {
    pub const ALL: [Verb; 2] = [Verb::Get, Verb::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| {
                Error::validation_with_context(
                    format!("unsupported verb '{}'", s),
                    ErrorContext::new()
                        .with_field_path("verb")
                        .with_details("expected GET or POST")
                        .with_source("cache_key"),
                )
            })
    }
}

/// One level of the hierarchical key, from coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyLevel {
    Scope,
    Collection,
    Resource,
    Verb,
}

impl fmt::Display for KeyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyLevel::Scope => "scope",
            KeyLevel::Collection => "collection",
            KeyLevel::Resource => "resource",
            KeyLevel::Verb => "verb",
        };
        f.write_str(s)
    }
}

/// Full key of one cached response: `(scope, collection, resource, verb)`.
///
/// For the GitHub client this is `(owner, repo, endpoint, verb)`. Strings are
/// compared as given; callers pass canonical values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiCacheKey {
    pub scope: String,
    pub collection: String,
    pub resource: String,
    pub verb: Verb,
}

impl ApiCacheKey {
    pub fn new(
        scope: impl Into<String>,
        collection: impl Into<String>,
        resource: impl Into<String>,
        verb: Verb,
    ) -> Self {
        Self {
            scope: scope.into(),
            collection: collection.into(),
            resource: resource.into(),
            verb,
        }
    }

    pub fn path(&self) -> KeyPath<'_> {
        KeyPath::full(&self.scope, &self.collection, &self.resource, self.verb)
    }

    /// Build a key from a route such as `"GET /repos/{owner}/{repo}/pulls/{pull_number}"`.
    ///
    /// `owner` and `repo` become scope and collection. Templated path segments
    /// are filled from `params`; a missing parameter is logged and the segment
    /// is kept verbatim.
    pub fn from_route(route: &str, params: &HashMap<String, String>) -> Result<Self> {
        let mut parts = route.split_whitespace();
        let (Some(verb), Some(path), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::validation_with_context(
                format!("invalid route '{}'", route),
                ErrorContext::new()
                    .with_field_path("route")
                    .with_details("expected '<VERB> <path>'")
                    .with_source("route_key"),
            ));
        };
        let verb: Verb = verb.parse()?;

        let owner = params.get("owner");
        let repo = params.get("repo");
        let (Some(owner), Some(repo)) = (owner, repo) else {
            return Err(Error::validation_with_context(
                "missing owner or repo in route parameters",
                ErrorContext::new()
                    .with_field_path("params")
                    .with_source("route_key"),
            ));
        };

        let resource = path
            .split('/')
            .map(|segment| {
                let Some(name) = segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                else {
                    return segment.to_string();
                };
                match params.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        warn!(parameter = name, route, "missing route parameter");
                        segment.to_string()
                    }
                }
            })
            .collect::<Vec<_>>()
            .join("/");

        Ok(Self::new(owner.clone(), repo.clone(), resource, verb))
    }
}

impl fmt::Display for ApiCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{} {}",
            self.scope, self.collection, self.verb, self.resource
        )
    }
}

/// A possibly partial key, used to look up or invalidate a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPath<'a> {
    pub scope: &'a str,
    pub collection: Option<&'a str>,
    pub resource: Option<&'a str>,
    pub verb: Option<Verb>,
}

impl<'a> KeyPath<'a> {
    pub fn new(
        scope: &'a str,
        collection: Option<&'a str>,
        resource: Option<&'a str>,
        verb: Option<Verb>,
    ) -> Self {
        Self {
            scope,
            collection,
            resource,
            verb,
        }
    }

    pub fn full(scope: &'a str, collection: &'a str, resource: &'a str, verb: Verb) -> Self {
        Self::new(scope, Some(collection), Some(resource), Some(verb))
    }

    /// The finest level this path addresses. Levels after the first absent one
    /// are ignored.
    pub fn granularity(&self) -> KeyLevel {
        match (self.collection, self.resource, self.verb) {
            (None, _, _) => KeyLevel::Scope,
            (Some(_), None, _) => KeyLevel::Collection,
            (Some(_), Some(_), None) => KeyLevel::Resource,
            (Some(_), Some(_), Some(_)) => KeyLevel::Verb,
        }
    }
}
