//! Display-name resolution for actor identifiers.
//!
//! The engine does not own user administration. It only knows this trait;
//! the concrete implementation is injected at startup. Resolution is
//! best-effort: a failed lookup falls back to the raw identifier.

use std::collections::HashMap;

/// Maps actor identifiers (operator emails/badges) to display names.
pub trait NameResolver: Send + Sync {
    /// Resolve an actor id to a display name, or None if unknown.
    fn resolve(&self, actor: &str) -> Option<String>;

    /// Resolve with fallback to the raw identifier.
    fn display_name(&self, actor: &str) -> String {
        self.resolve(actor).unwrap_or_else(|| actor.to_string())
    }
}

/// Resolver that knows nobody; every lookup falls back to the raw id.
pub struct IdentityResolver;

impl NameResolver for IdentityResolver {
    fn resolve(&self, _actor: &str) -> Option<String> {
        None
    }
}

/// Fixed in-memory mapping. Used by tests and small deployments.
pub struct StaticResolver {
    names: HashMap<String, String>,
}

impl StaticResolver {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }
}

impl NameResolver for StaticResolver {
    fn resolve(&self, actor: &str) -> Option<String> {
        self.names.get(actor).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_falls_back_to_raw_id() {
        assert_eq!(IdentityResolver.display_name("alice@plant"), "alice@plant");
    }

    #[test]
    fn static_resolver_maps_known_ids() {
        let mut names = HashMap::new();
        names.insert("alice@plant".to_string(), "Alice Novak".to_string());
        let resolver = StaticResolver::new(names);

        assert_eq!(resolver.display_name("alice@plant"), "Alice Novak");
        assert_eq!(resolver.display_name("bob@plant"), "bob@plant");
    }
}
