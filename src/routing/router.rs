//! Route lookup per HTTP method.
//!
//! # Responsibilities
//! - Keep one radix tree per method plus one for routes registered
//!   without a method
//! - Look up the method tree first, then fall back to the method-agnostic tree
//!
//! # Design Decisions
//! - Built during registration, immutable once the app is frozen
//!   (thread-safe without locks)
//! - Explicit `None` for a miss; the caller decides how to report it

use std::collections::HashMap;

use axum::http::Method;

use crate::error::RegistrationError;
use crate::routing::pattern::PathPattern;
use crate::routing::tree::{InsertError, Node};

/// Path parameters bound by a match, in the order they were encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Bind `name`, replacing an existing binding in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Params {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl IntoIterator for Params {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A resolved route.
#[derive(Debug)]
pub struct RouteMatch<'t, T> {
    pub value: &'t T,
    pub params: Params,
}

/// Radix trees keyed by method.
#[derive(Debug)]
pub struct MethodRouter<T> {
    trees: HashMap<Method, Node<T>>,
    any: Node<T>,
    routes: usize,
}

impl<T> Default for MethodRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MethodRouter<T> {
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            any: Node::root(),
            routes: 0,
        }
    }

    /// Register `value` for `method` (`None` = every method) and `pattern`.
    pub fn add(
        &mut self,
        method: Option<Method>,
        pattern: &PathPattern,
        value: T,
    ) -> Result<(), RegistrationError> {
        let tree = match &method {
            Some(method) => self.trees.entry(method.clone()).or_default(),
            None => &mut self.any,
        };

        tree.insert(pattern, value).map_err(|err| {
            let pattern = pattern.to_string();
            match err {
                InsertError::Duplicate => RegistrationError::DuplicateRoute {
                    method: method_label(method.as_ref()).to_string(),
                    pattern,
                },
                InsertError::ParamConflict { existing, requested } => {
                    RegistrationError::ParamConflict {
                        pattern,
                        existing,
                        requested,
                    }
                }
                InsertError::WildcardConflict { existing, requested } => {
                    RegistrationError::WildcardConflict {
                        pattern,
                        existing,
                        requested,
                    }
                }
            }
        })?;

        self.routes += 1;
        Ok(())
    }

    /// Resolve `path` for `method`, retrying against the method-agnostic
    /// routes before reporting a miss.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        self.trees
            .get(method)
            .and_then(|tree| tree.find(path))
            .or_else(|| self.any.find(path))
            .map(|found| RouteMatch {
                value: found.value,
                params: found.params.into_iter().collect(),
            })
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes == 0
    }
}

/// Label used for routes registered without a method.
pub fn method_label(method: Option<&Method>) -> &str {
    method.map(Method::as_str).unwrap_or("ALL")
}
