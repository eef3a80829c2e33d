//! Public/private marking of operations.
//!
//! Flags are registered next to the routes when the router is built and
//! resolved per request by direct lookup:
//!
//! 1. an operation override for `(method, route pattern)`
//! 2. otherwise the longest registered group prefix covering the path
//! 3. otherwise the policy default

use std::collections::HashMap;

use axum::http::Method;

/// Whether an operation requires an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Private,
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    default: Access,
    groups: Vec<(String, Access)>,
    operations: HashMap<(Method, String), Access>,
}

impl Default for AccessPolicy {
    /// Everything private unless registered otherwise.
    fn default() -> Self {
        Self::new(Access::Private)
    }
}

impl AccessPolicy {
    pub fn new(default: Access) -> Self {
        Self {
            default,
            groups: Vec::new(),
            operations: HashMap::new(),
        }
    }

    /// Mark every route under `prefix` (segment-wise) with `access`.
    pub fn group(mut self, prefix: &str, access: Access) -> Self {
        let prefix = prefix.trim_end_matches('/');
        self.groups.retain(|(p, _)| p != prefix);
        self.groups.push((prefix.to_string(), access));
        self
    }

    /// Mark a single operation, identified by method and route pattern
    /// (e.g. `/api/v1/api-keys/{id}`). Beats any group.
    pub fn operation(mut self, method: Method, route: &str, access: Access) -> Self {
        self.operations.insert((method, route.to_string()), access);
        self
    }

    pub fn resolve(&self, method: &Method, route: &str) -> Access {
        if let Some(access) = self.operations.get(&(method.clone(), route.to_string())) {
            return *access;
        }

        self.groups
            .iter()
            .filter(|(prefix, _)| covers(prefix, route))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, access)| *access)
            .unwrap_or(self.default)
    }
}

/// `/api` covers `/api` and `/api/keys`, not `/apix`.
fn covers(prefix: &str, route: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match route.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
