//! Route descriptors, pattern parsing and the per-router route registry.
//!
//! A pattern such as `/users/:id/files/*` is parsed once at registration into
//! a list of [`Segment`]s. The trie consumes the segments to place the route;
//! the [`Route`] keeps them to generate URLs back from parameter values.
use std::sync::Arc;

use serde::Serialize;

use crate::core::{
    error::{ReverseError, RouteError, RouteResult},
    method::RouteMethod,
};

/// Name recorded for the catch-all capture of a route.
pub const WILDCARD_PARAM: &str = "*";

/// One piece of a parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, matched byte for byte.
    Static(String),
    /// `:name`, captures up to the next `/`.
    Param(String),
    /// Trailing `*`, captures the rest of the path.
    Any,
}

/// Parse a normalized pattern into segments, validating captures.
pub fn parse_pattern(path: &str) -> RouteResult<Vec<Segment>> {
    let bytes = path.as_bytes();
    let mut segments = Vec::new();
    let mut names: Vec<&str> = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b':' => {
                if literal_start < i {
                    segments.push(Segment::Static(path[literal_start..i].to_string()));
                }
                let name_start = i + 1;
                let name_end = path[name_start..]
                    .find('/')
                    .map_or(path.len(), |offset| name_start + offset);
                let name = &path[name_start..name_end];

                if name.is_empty() {
                    return Err(RouteError::EmptyParamName {
                        path: path.to_string(),
                        position: i,
                    });
                }
                if name.contains([':', '*']) {
                    return Err(RouteError::ConflictingCapture {
                        path: path.to_string(),
                        name: name.to_string(),
                        position: i,
                    });
                }
                if names.contains(&name) {
                    return Err(RouteError::DuplicateParam {
                        path: path.to_string(),
                        name: name.to_string(),
                    });
                }
                names.push(name);
                segments.push(Segment::Param(name.to_string()));
                i = name_end;
                literal_start = i;
            }
            b'*' => {
                if i + 1 != bytes.len() {
                    return Err(RouteError::WildcardNotLast {
                        path: path.to_string(),
                    });
                }
                if literal_start < i {
                    segments.push(Segment::Static(path[literal_start..i].to_string()));
                }
                segments.push(Segment::Any);
                i += 1;
                literal_start = i;
            }
            _ => i += 1,
        }
    }

    if literal_start < bytes.len() {
        segments.push(Segment::Static(path[literal_start..].to_string()));
    }

    Ok(segments)
}

/// Empty patterns become `/`, and a leading `/` is added when missing.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Immutable record of one registered endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub method: RouteMethod,
    pub path: String,
    pub name: String,
    /// Capture names in declaration order; the wildcard is recorded as `*`.
    pub params: Vec<String>,
    #[serde(skip)]
    segments: Vec<Segment>,
}

impl Route {
    pub(crate) fn new(
        method: RouteMethod,
        path: String,
        name: Option<String>,
        segments: Vec<Segment>,
    ) -> Self {
        let params = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param(name) => Some(name.clone()),
                Segment::Any => Some(WILDCARD_PARAM.to_string()),
                Segment::Static(_) => None,
            })
            .collect();
        let name = name.unwrap_or_else(|| format!("{method} {path}"));
        Self {
            method,
            path,
            name,
            params,
            segments,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Any))
    }

    /// Substitute positional values into the pattern.
    ///
    /// Named captures take values in declaration order. Values left over
    /// after the named captures are joined with `/` into a trailing wildcard;
    /// a route without a wildcard rejects leftovers.
    pub fn reverse<S: AsRef<str>>(&self, values: &[S]) -> Result<String, ReverseError> {
        let named = self
            .segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Param(_)))
            .count();
        if values.len() < named {
            return Err(ReverseError::MissingParams {
                name: self.name.clone(),
                expected: named,
                given: values.len(),
            });
        }
        if !self.has_wildcard() && values.len() > named {
            return Err(ReverseError::TooManyParams {
                name: self.name.clone(),
                expected: named,
                given: values.len(),
            });
        }

        let mut url = String::with_capacity(self.path.len());
        let mut next = 0;
        for segment in &self.segments {
            match segment {
                Segment::Static(text) => url.push_str(text),
                Segment::Param(_) => {
                    url.push_str(values[next].as_ref());
                    next += 1;
                }
                Segment::Any => {
                    let rest = values[next..]
                        .iter()
                        .map(AsRef::as_ref)
                        .collect::<Vec<_>>()
                        .join("/");
                    url.push_str(&rest);
                    next = values.len();
                }
            }
        }
        Ok(url)
    }
}

/// Flat, ordered list of the routes a router holds.
#[derive(Debug, Default, Clone)]
pub struct RouteRegistry {
    routes: Vec<Arc<Route>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a route. When it replaces an earlier registration the new
    /// route takes over the old one's position.
    pub fn record(&mut self, route: Arc<Route>, replaced: Option<&Arc<Route>>) {
        if let Some(old) = replaced {
            if let Some(slot) = self.routes.iter_mut().find(|r| Arc::ptr_eq(r, old)) {
                *slot = route;
                return;
            }
        }
        self.routes.push(route);
    }

    /// First route registered under `name`.
    pub fn by_name(&self, name: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|route| route.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Largest capture count of any registered route.
    pub fn max_params(&self) -> usize {
        self.routes
            .iter()
            .map(|route| route.params.len())
            .max()
            .unwrap_or(0)
    }
}
