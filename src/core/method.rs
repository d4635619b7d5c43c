//! The fixed verb set accepted at registration time.
//!
//! Routes may only be registered for one of the verbs below or for the
//! [`RouteMethod::RouteNotFound`] sentinel. Each trie node stores its
//! handlers in an array indexed by [`RouteMethod::index`], so method
//! resolution at a matched node is a constant-time lookup and the order in
//! which methods were registered never influences the outcome.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::core::error::RouteError;

/// HTTP verbs known to the router plus the "route not found" pseudo-method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteMethod {
    #[serde(rename = "CONNECT")]
    Connect,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "HEAD")]
    Head,
    #[serde(rename = "OPTIONS")]
    Options,
    #[serde(rename = "PATCH")]
    Patch,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PROPFIND")]
    Propfind,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "TRACE")]
    Trace,
    #[serde(rename = "REPORT")]
    Report,
    /// Handles requests whose path matched no route for any method.
    #[serde(rename = "ROUTE_NOT_FOUND")]
    RouteNotFound,
}

impl RouteMethod {
    /// Number of slots in a per-node method table (verbs + sentinel).
    pub const COUNT: usize = 12;

    /// Every real verb, in canonical order. Excludes the sentinel.
    pub const VERBS: [RouteMethod; 11] = [
        RouteMethod::Connect,
        RouteMethod::Delete,
        RouteMethod::Get,
        RouteMethod::Head,
        RouteMethod::Options,
        RouteMethod::Patch,
        RouteMethod::Post,
        RouteMethod::Propfind,
        RouteMethod::Put,
        RouteMethod::Trace,
        RouteMethod::Report,
    ];

    pub const fn index(self) -> usize {
        match self {
            RouteMethod::Connect => 0,
            RouteMethod::Delete => 1,
            RouteMethod::Get => 2,
            RouteMethod::Head => 3,
            RouteMethod::Options => 4,
            RouteMethod::Patch => 5,
            RouteMethod::Post => 6,
            RouteMethod::Propfind => 7,
            RouteMethod::Put => 8,
            RouteMethod::Trace => 9,
            RouteMethod::Report => 10,
            RouteMethod::RouteNotFound => 11,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RouteMethod::Connect => "CONNECT",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Get => "GET",
            RouteMethod::Head => "HEAD",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Post => "POST",
            RouteMethod::Propfind => "PROPFIND",
            RouteMethod::Put => "PUT",
            RouteMethod::Trace => "TRACE",
            RouteMethod::Report => "REPORT",
            RouteMethod::RouteNotFound => "ROUTE_NOT_FOUND",
        }
    }

    /// Map an inbound request method onto the verb set.
    ///
    /// Returns `None` for verbs the router does not know; such requests can
    /// never hit an exact handler.
    pub fn from_http(method: &http::Method) -> Option<Self> {
        match *method {
            http::Method::CONNECT => Some(RouteMethod::Connect),
            http::Method::DELETE => Some(RouteMethod::Delete),
            http::Method::GET => Some(RouteMethod::Get),
            http::Method::HEAD => Some(RouteMethod::Head),
            http::Method::OPTIONS => Some(RouteMethod::Options),
            http::Method::PATCH => Some(RouteMethod::Patch),
            http::Method::POST => Some(RouteMethod::Post),
            http::Method::PUT => Some(RouteMethod::Put),
            http::Method::TRACE => Some(RouteMethod::Trace),
            _ => match method.as_str() {
                "PROPFIND" => Some(RouteMethod::Propfind),
                "REPORT" => Some(RouteMethod::Report),
                _ => None,
            },
        }
    }

    pub fn is_verb(self) -> bool {
        self != RouteMethod::RouteNotFound
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteMethod {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(RouteMethod::Connect),
            "DELETE" => Ok(RouteMethod::Delete),
            "GET" => Ok(RouteMethod::Get),
            "HEAD" => Ok(RouteMethod::Head),
            "OPTIONS" => Ok(RouteMethod::Options),
            "PATCH" => Ok(RouteMethod::Patch),
            "POST" => Ok(RouteMethod::Post),
            "PROPFIND" => Ok(RouteMethod::Propfind),
            "PUT" => Ok(RouteMethod::Put),
            "TRACE" => Ok(RouteMethod::Trace),
            "REPORT" => Ok(RouteMethod::Report),
            "ROUTE_NOT_FOUND" => Ok(RouteMethod::RouteNotFound),
            other => Err(RouteError::UnknownMethod {
                method: other.to_string(),
            }),
        }
    }
}

/// Compact set of verbs, used to report the `Allow` list of a 405 outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodSet(u16);

impl MethodSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, method: RouteMethod) {
        self.0 |= 1 << method.index();
    }

    pub fn contains(&self, method: RouteMethod) -> bool {
        self.0 & (1 << method.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in canonical verb order.
    pub fn iter(&self) -> impl Iterator<Item = RouteMethod> + '_ {
        RouteMethod::VERBS
            .into_iter()
            .filter(move |method| self.contains(*method))
    }

    /// Render as an `Allow` header value, e.g. `GET, POST`.
    pub fn to_header_value(&self) -> String {
        self.iter()
            .map(RouteMethod::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<RouteMethod> for MethodSet {
    fn from_iter<I: IntoIterator<Item = RouteMethod>>(iter: I) -> Self {
        let mut set = MethodSet::empty();
        for method in iter {
            set.insert(method);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_unknown_verb() {
        assert_eq!("GET".parse::<RouteMethod>().unwrap(), RouteMethod::Get);
        assert_eq!(
            "PROPFIND".parse::<RouteMethod>().unwrap(),
            RouteMethod::Propfind
        );
        assert!(matches!(
            "BREW".parse::<RouteMethod>(),
            Err(RouteError::UnknownMethod { .. })
        ));
        // Verbs are case-sensitive, like the request line.
        assert!("get".parse::<RouteMethod>().is_err());
    }

    #[test]
    fn test_indices_are_unique() {
        let mut seen = [false; RouteMethod::COUNT];
        for method in RouteMethod::VERBS
            .into_iter()
            .chain([RouteMethod::RouteNotFound])
        {
            assert!(!seen[method.index()], "duplicate index for {method}");
            seen[method.index()] = true;
        }
    }

    #[test]
    fn test_from_http_extension_methods() {
        let propfind = http::Method::from_bytes(b"PROPFIND").unwrap();
        assert_eq!(
            RouteMethod::from_http(&propfind),
            Some(RouteMethod::Propfind)
        );
        let brew = http::Method::from_bytes(b"BREW").unwrap();
        assert_eq!(RouteMethod::from_http(&brew), None);
    }

    #[test]
    fn test_method_set_header_is_canonical_order() {
        let set: MethodSet = [RouteMethod::Post, RouteMethod::Get, RouteMethod::Delete]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_header_value(), "DELETE, GET, POST");
        assert!(!set.contains(RouteMethod::Put));
    }
}
