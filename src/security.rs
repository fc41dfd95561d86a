//! Whitelist gate for host type access.
//!
//! Every script attempt to resolve a host type such as `System::DateTime`
//! goes through [`SecurityPolicy::check`]. All reads and writes happen under
//! one mutex, so a policy can be shared between interpreters through an
//! `Arc`.

use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::diagnostics::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyMode {
    #[default]
    Unrestricted,
    WhitelistOnly,
}

#[derive(Debug, Default)]
struct PolicyState {
    mode: PolicyMode,
    types: IndexSet<String>,
    namespaces: IndexSet<String>,
}

#[derive(Debug, Default)]
pub struct SecurityPolicy {
    state: Mutex<PolicyState>,
}

impl SecurityPolicy {
    pub fn new(mode: PolicyMode) -> Self {
        let policy = Self::default();
        policy.set_mode(mode);
        policy
    }

    pub fn mode(&self) -> PolicyMode {
        self.state.lock().mode
    }

    pub fn set_mode(&self, mode: PolicyMode) {
        debug!(?mode, "security policy mode changed");
        self.state.lock().mode = mode;
    }

    /// Allows one fully-qualified type name such as `System.DateTime`.
    pub fn allow_type(&self, name: impl Into<String>) {
        let name = name.into();
        debug!(%name, "type whitelisted");
        self.state.lock().types.insert(name);
    }

    /// Allows every type under a namespace. Accepts `System` or `System.*`.
    pub fn allow_namespace(&self, namespace: impl Into<String>) {
        let namespace = namespace.into();
        let namespace = namespace
            .strip_suffix(".*")
            .unwrap_or(&namespace)
            .to_string();
        debug!(%namespace, "namespace whitelisted");
        self.state.lock().namespaces.insert(namespace);
    }

    /// Drops every whitelist entry. The mode is left unchanged.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.types.clear();
        state.namespaces.clear();
    }

    pub fn is_allowed(&self, type_name: &str) -> bool {
        let state = self.state.lock();
        if state.mode == PolicyMode::Unrestricted || state.types.contains(type_name) {
            return true;
        }
        state.namespaces.iter().any(|namespace| {
            type_name
                .strip_prefix(namespace.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    pub fn check(&self, type_name: &str) -> Result<(), Diagnostic> {
        if self.is_allowed(type_name) {
            trace!(type_name, "host type access granted");
            return Ok(());
        }
        debug!(type_name, "host type access denied");
        Err(Diagnostic::new(
            DiagnosticKind::TypeAccess,
            format!("access to type '{type_name}' is not allowed by the security policy"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_allows_everything() {
        let policy = SecurityPolicy::default();
        assert!(policy.is_allowed("System.IO.File"));
    }

    #[test]
    fn namespace_prefix_requires_segment_boundary() {
        let policy = SecurityPolicy::new(PolicyMode::WhitelistOnly);
        policy.allow_namespace("System.*");
        assert!(policy.is_allowed("System.Guid"));
        assert!(policy.is_allowed("System.IO.File"));
        assert!(!policy.is_allowed("SystemX.Guid"));
        assert!(!policy.is_allowed("System"));
    }

    #[test]
    fn clear_keeps_mode() {
        let policy = SecurityPolicy::new(PolicyMode::WhitelistOnly);
        policy.allow_type("System.DateTime");
        policy.clear();
        assert_eq!(policy.mode(), PolicyMode::WhitelistOnly);
        assert!(policy.check("System.DateTime").is_err());
    }
}
