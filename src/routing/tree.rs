//! Radix tree over route patterns.
//!
//! # Responsibilities
//! - Merge patterns into a prefix-compressed tree, splitting shared prefixes
//! - Resolve a concrete path to a stored value plus bound parameters
//!
//! # Design Decisions
//! - Literal children are keyed by their first character; each node has at
//!   most one parameter child and one wildcard child
//! - Conflicts are checked against the existing tree before anything is
//!   mutated, so a rejected insert leaves the tree untouched
//! - Lookup is an explicit-stack depth-first search: static children are
//!   tried before the parameter child, which is tried before the wildcard
//! - A parameter binding lives exactly as long as its frame is on the stack

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::mem;

use thiserror::Error;

use crate::routing::pattern::{PathPattern, Segment};

/// Name bound by a wildcard registered without one (`/*`).
pub const UNNAMED_WILDCARD: &str = "wildcard";

/// Why a pattern could not be merged into the tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    #[error("a value is already registered for this pattern")]
    Duplicate,

    #[error("parameter `:{requested}` conflicts with existing `:{existing}`")]
    ParamConflict { existing: String, requested: String },

    #[error("wildcard `*{requested}` conflicts with existing `*{existing}`")]
    WildcardConflict { existing: String, requested: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Static,
    Param(String),
    Wildcard(Option<String>),
}

/// A tree node. The root is a static node with an empty prefix.
#[derive(Debug)]
pub struct Node<T> {
    prefix: String,
    kind: Kind,
    children: HashMap<char, Node<T>>,
    param: Option<Box<Node<T>>>,
    wildcard: Option<Box<Node<T>>>,
    value: Option<T>,
}

/// Successful lookup: the stored value and the bindings along the path.
#[derive(Debug)]
pub struct Found<'t, 'p, T> {
    pub value: &'t T,
    pub params: Vec<(&'t str, &'p str)>,
}

struct Frame<'t, 'p, T> {
    node: &'t Node<T>,
    rest: &'p str,
    bound: bool,
    visited: bool,
}

impl<'t, 'p, T> Frame<'t, 'p, T> {
    fn new(node: &'t Node<T>, rest: &'p str) -> Self {
        Self {
            node,
            rest,
            bound: false,
            visited: false,
        }
    }
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self::root()
    }
}

impl<T> Node<T> {
    /// An empty tree.
    pub fn root() -> Self {
        Self::with_kind(String::new(), Kind::Static)
    }

    fn with_kind(prefix: String, kind: Kind) -> Self {
        Self {
            prefix,
            kind,
            children: HashMap::new(),
            param: None,
            wildcard: None,
            value: None,
        }
    }

    /// True when nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.children.is_empty()
            && self.param.is_none()
            && self.wildcard.is_none()
    }

    /// Merge `pattern` into the tree and store `value` at its terminal node.
    pub fn insert(&mut self, pattern: &PathPattern, value: T) -> Result<(), InsertError> {
        self.check(pattern.segments())?;

        let mut node = self;
        for segment in pattern.segments() {
            node = match segment {
                Segment::Literal(text) => node.descend_literal(text),
                Segment::Param(name) => node
                    .param
                    .get_or_insert_with(|| {
                        Box::new(Node::with_kind(String::new(), Kind::Param(name.clone())))
                    })
                    .as_mut(),
                Segment::Wildcard(name) => node
                    .wildcard
                    .get_or_insert_with(|| {
                        Box::new(Node::with_kind(String::new(), Kind::Wildcard(name.clone())))
                    })
                    .as_mut(),
            };
        }
        node.value = Some(value);
        Ok(())
    }

    /// Walk the existing tree along `segments` without mutating it.
    ///
    /// Once the walk leaves existing nodes everything below is new, so no
    /// conflict is possible from there on.
    fn check(&self, segments: &[Segment]) -> Result<(), InsertError> {
        let mut node = self;
        for segment in segments {
            let next = match segment {
                Segment::Literal(text) => node.walk_literal(text),
                Segment::Param(name) => match node.param.as_deref() {
                    Some(child) => match &child.kind {
                        Kind::Param(existing) if existing != name => {
                            return Err(InsertError::ParamConflict {
                                existing: existing.clone(),
                                requested: name.clone(),
                            });
                        }
                        _ => Some(child),
                    },
                    None => None,
                },
                Segment::Wildcard(name) => match node.wildcard.as_deref() {
                    Some(child) => match &child.kind {
                        Kind::Wildcard(existing) if existing != name => {
                            return Err(InsertError::WildcardConflict {
                                existing: existing.clone().unwrap_or_default(),
                                requested: name.clone().unwrap_or_default(),
                            });
                        }
                        _ => Some(child),
                    },
                    None => None,
                },
            };
            match next {
                Some(child) => node = child,
                None => return Ok(()),
            }
        }

        if node.value.is_some() {
            Err(InsertError::Duplicate)
        } else {
            Ok(())
        }
    }

    fn walk_literal(&self, mut text: &str) -> Option<&Node<T>> {
        let mut node = self;
        while let Some(first) = text.chars().next() {
            let child = node.children.get(&first)?;
            text = text.strip_prefix(child.prefix.as_str())?;
            node = child;
        }
        Some(node)
    }

    fn descend_literal(&mut self, mut text: &str) -> &mut Node<T> {
        let mut node = self;
        while let Some(first) = text.chars().next() {
            let child = match node.children.entry(first) {
                Entry::Vacant(slot) => {
                    return slot.insert(Node::with_kind(text.to_string(), Kind::Static));
                }
                Entry::Occupied(slot) => slot.into_mut(),
            };
            let shared = common_prefix(&child.prefix, text);
            if shared < child.prefix.len() {
                child.split_at(shared);
            }
            text = &text[shared..];
            node = child;
        }
        node
    }

    /// Keep `prefix[..at]` here and push everything else one level down.
    fn split_at(&mut self, at: usize) {
        let tail = self.prefix.split_off(at);
        let lower = Node {
            prefix: tail,
            kind: Kind::Static,
            children: mem::take(&mut self.children),
            param: self.param.take(),
            wildcard: self.wildcard.take(),
            value: self.value.take(),
        };
        if let Some(first) = lower.prefix.chars().next() {
            self.children.insert(first, lower);
        }
    }

    /// Resolve `path` against the tree.
    pub fn find<'t, 'p>(&'t self, path: &'p str) -> Option<Found<'t, 'p, T>> {
        let mut stack = vec![Frame::new(self, path)];
        let mut params: Vec<(&'t str, &'p str)> = Vec::new();

        while let Some(frame) = stack.last_mut() {
            if frame.visited {
                if frame.bound {
                    params.pop();
                }
                stack.pop();
                continue;
            }
            frame.visited = true;
            let node = frame.node;
            let rest = frame.rest;

            let remaining = match &node.kind {
                Kind::Wildcard(name) => {
                    if let Some(value) = &node.value {
                        params.push((name.as_deref().unwrap_or(UNNAMED_WILDCARD), rest));
                        return Some(Found { value, params });
                    }
                    continue;
                }
                Kind::Param(name) => {
                    let end = rest.find('/').unwrap_or(rest.len());
                    if end == 0 {
                        continue;
                    }
                    params.push((name.as_str(), &rest[..end]));
                    frame.bound = true;
                    &rest[end..]
                }
                Kind::Static => match rest.strip_prefix(node.prefix.as_str()) {
                    Some(remaining) => remaining,
                    None => continue,
                },
            };

            if remaining.is_empty() {
                if let Some(value) = &node.value {
                    return Some(Found { value, params });
                }
                if let Some(wildcard) = node.wildcard.as_deref() {
                    stack.push(Frame::new(wildcard, remaining));
                }
                continue;
            }

            // Pushed least specific first so the static child is popped first.
            if let Some(wildcard) = node.wildcard.as_deref() {
                stack.push(Frame::new(wildcard, remaining));
            }
            if let Some(param) = node.param.as_deref() {
                stack.push(Frame::new(param, remaining));
            }
            if let Some(child) = remaining.chars().next().and_then(|c| node.children.get(&c)) {
                stack.push(Frame::new(child, remaining));
            }
        }

        None
    }
}

/// Length in bytes of the common prefix, always on a char boundary.
fn common_prefix(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map(|((at, _), _)| at)
        .unwrap_or_else(|| a.len().min(b.len()))
}
