//! Radix trie holding the routes of one router.
//!
//! # Shape
//! - Static nodes carry a compressed byte label. Siblings never share a first
//!   byte; common prefixes are factored into an intermediate node when a new
//!   label diverges from an existing one.
//! - A node has at most one param child (captures up to the next `/`) and at
//!   most one any child (captures the remainder, always a leaf).
//! - Handlers live in a fixed per-node table indexed by method.
//!
//! The shape depends only on the set of registered patterns, never on the
//! order they were added in, so lookups are insertion-order independent.
//!
//! # Search
//! At each node the matcher tries, in order: the static child whose label
//! prefixes the remaining path, the param child, then the any child. A branch
//! that dead-ends (no handler for the request method) unwinds and the next
//! alternative of each ancestor is tried, so greedy static matches never
//! hide a param or wildcard route.
use std::{fmt, mem, ops::Range, sync::Arc};

use crate::core::{
    handler::Handler,
    method::{MethodSet, RouteMethod},
    route::{Route, Segment},
};

/// A handler bound to a node for one method.
#[derive(Clone)]
pub struct Endpoint {
    pub route: Arc<Route>,
    pub handler: Handler,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Static,
    Param,
    Any,
}

#[derive(Debug)]
pub(crate) struct Node {
    kind: NodeKind,
    label: Vec<u8>,
    static_children: Vec<Node>,
    param_child: Option<Box<Node>>,
    any_child: Option<Box<Node>>,
    endpoints: [Option<Endpoint>; RouteMethod::COUNT],
}

impl Default for Node {
    fn default() -> Self {
        Node::root()
    }
}

impl Node {
    pub(crate) fn root() -> Self {
        Self::new(NodeKind::Static, Vec::new())
    }

    fn new(kind: NodeKind, label: Vec<u8>) -> Self {
        Self {
            kind,
            label,
            static_children: Vec::new(),
            param_child: None,
            any_child: None,
            endpoints: Default::default(),
        }
    }

    /// Walk the segments from this node, creating and splitting nodes as
    /// needed, and return the node the last segment ends on.
    pub(crate) fn insert(&mut self, segments: &[Segment]) -> &mut Node {
        let mut node = self;
        for segment in segments {
            node = match segment {
                Segment::Static(text) => node.insert_static(text.as_bytes()),
                Segment::Param(_) => &mut **node
                    .param_child
                    .get_or_insert_with(|| Box::new(Node::new(NodeKind::Param, Vec::new()))),
                Segment::Any => &mut **node
                    .any_child
                    .get_or_insert_with(|| Box::new(Node::new(NodeKind::Any, Vec::new()))),
            };
        }
        node
    }

    fn insert_static(&mut self, text: &[u8]) -> &mut Node {
        let Some(&first) = text.first() else {
            return self;
        };
        let Some(idx) = self
            .static_children
            .iter()
            .position(|child| child.label.first() == Some(&first))
        else {
            self.static_children
                .push(Node::new(NodeKind::Static, text.to_vec()));
            let last = self.static_children.len() - 1;
            return &mut self.static_children[last];
        };

        let child = &mut self.static_children[idx];
        let common = common_prefix_len(&child.label, text);
        if common < child.label.len() {
            child.split(common);
        }
        child.insert_static(&text[common..])
    }

    /// Move everything below byte `at` of the label into a new child.
    fn split(&mut self, at: usize) {
        let mut tail = Node::new(NodeKind::Static, self.label.split_off(at));
        tail.static_children = mem::take(&mut self.static_children);
        tail.param_child = self.param_child.take();
        tail.any_child = self.any_child.take();
        tail.endpoints = mem::take(&mut self.endpoints);
        self.static_children.push(tail);
    }

    /// Bind an endpoint, returning the one it replaces.
    pub(crate) fn bind(&mut self, method: RouteMethod, endpoint: Endpoint) -> Option<Endpoint> {
        self.endpoints[method.index()].replace(endpoint)
    }

    fn endpoint_for(&self, method: Option<RouteMethod>) -> Option<&Endpoint> {
        method.and_then(|method| self.endpoints[method.index()].as_ref())
    }

    fn not_found(&self) -> Option<&Endpoint> {
        self.endpoints[RouteMethod::RouteNotFound.index()].as_ref()
    }

    fn has_verbs(&self) -> bool {
        RouteMethod::VERBS
            .iter()
            .any(|method| self.endpoints[method.index()].is_some())
    }

    /// Verbs bound on this node.
    pub(crate) fn allowed(&self) -> MethodSet {
        RouteMethod::VERBS
            .into_iter()
            .filter(|method| self.endpoints[method.index()].is_some())
            .collect()
    }

    /// Depth-first search for a handler of `method` consuming all of `path`.
    ///
    /// `self` has already consumed `path[..pos]`. Capture spans are pushed on
    /// `spans` and popped again when a branch is abandoned. The first node
    /// that consumes the full path and has handlers for other methods is kept
    /// in `fallback` for the method-not-allowed outcome.
    pub(crate) fn search<'n>(
        &'n self,
        path: &[u8],
        pos: usize,
        method: Option<RouteMethod>,
        spans: &mut Vec<Range<usize>>,
        fallback: &mut Option<&'n Node>,
    ) -> Option<&'n Endpoint> {
        if pos == path.len() {
            if let Some(endpoint) = self.endpoint_for(method).or_else(|| self.not_found()) {
                return Some(endpoint);
            }
            if fallback.is_none() && self.has_verbs() {
                *fallback = Some(self);
            }
        }

        let rest = &path[pos..];

        if let Some(&first) = rest.first() {
            let child = self
                .static_children
                .iter()
                .find(|child| child.label.first() == Some(&first));
            if let Some(child) = child {
                if rest.starts_with(&child.label) {
                    let found =
                        child.search(path, pos + child.label.len(), method, spans, fallback);
                    if found.is_some() {
                        return found;
                    }
                }
            }
        }

        // A param needs a segment to capture; at the end of the path only the
        // wildcard may still match.
        if let Some(child) = self.param_child.as_deref().filter(|_| !rest.is_empty()) {
            let end = rest
                .iter()
                .position(|&byte| byte == b'/')
                .map_or(path.len(), |offset| pos + offset);
            spans.push(pos..end);
            let found = child.search(path, end, method, spans, fallback);
            if found.is_some() {
                return found;
            }
            spans.pop();
        }

        if let Some(child) = self.any_child.as_deref() {
            if let Some(endpoint) = child.endpoint_for(method).or_else(|| child.not_found()) {
                spans.push(pos..path.len());
                return Some(endpoint);
            }
            if fallback.is_none() && child.has_verbs() {
                *fallback = Some(child);
            }
        }

        None
    }

    /// Every endpoint in the subtree.
    pub(crate) fn endpoints(&self) -> Vec<&Endpoint> {
        let mut out = Vec::new();
        self.collect_endpoints(&mut out);
        out
    }

    fn collect_endpoints<'n>(&'n self, out: &mut Vec<&'n Endpoint>) {
        out.extend(self.endpoints.iter().flatten());
        for child in &self.static_children {
            child.collect_endpoints(out);
        }
        if let Some(child) = self.param_child.as_deref() {
            child.collect_endpoints(out);
        }
        if let Some(child) = self.any_child.as_deref() {
            child.collect_endpoints(out);
        }
    }

    /// Canonical rendering of the subtree shape, independent of sibling order.
    #[cfg(test)]
    pub(crate) fn shape(&self) -> String {
        let mut children: Vec<String> = self
            .static_children
            .iter()
            .map(|child| child.shape())
            .collect();
        children.sort();
        if let Some(child) = self.param_child.as_deref() {
            children.push(child.shape());
        }
        if let Some(child) = self.any_child.as_deref() {
            children.push(child.shape());
        }
        let methods = self.allowed().to_header_value();
        format!(
            "{:?}{:?}[{}]({})",
            self.kind,
            String::from_utf8_lossy(&self.label),
            methods,
            children.join(",")
        )
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mut firsts: Vec<u8> = self
            .static_children
            .iter()
            .map(|child| {
                assert!(!child.label.is_empty(), "static child with empty label");
                child.label[0]
            })
            .collect();
        let count = firsts.len();
        firsts.sort_unstable();
        firsts.dedup();
        assert_eq!(firsts.len(), count, "static siblings share a first byte");
        if let Some(any) = self.any_child.as_deref() {
            assert!(any.static_children.is_empty() && any.param_child.is_none());
        }
        for child in &self.static_children {
            child.check_invariants();
        }
        if let Some(child) = self.param_child.as_deref() {
            child.check_invariants();
        }
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
