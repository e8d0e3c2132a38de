//! Run-scoped mapping from email domain to owning Admin.

use std::collections::BTreeMap;

use serde::Serialize;

/// Two Admins claimed the same email domain; the later one in id order won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousDomainOwner {
    /// Contested domain.
    pub domain: String,
    /// Admin id that owned the domain before.
    pub previous: String,
    /// Admin id that owns it now.
    pub winner: String,
}

/// `domain -> adminId`, built once in the Admin pass and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DomainOwnershipMap {
    owners: BTreeMap<String, String>,
}

impl DomainOwnershipMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `admin_id` as owner of `domain`.
    ///
    /// A domain that already had a different owner is reassigned and the
    /// conflict is returned.
    pub fn insert(
        &mut self,
        domain: impl Into<String>,
        admin_id: impl Into<String>,
    ) -> Option<AmbiguousDomainOwner> {
        let domain = domain.into();
        let admin_id = admin_id.into();
        match self.owners.insert(domain.clone(), admin_id.clone()) {
            Some(previous) if previous != admin_id => Some(AmbiguousDomainOwner {
                domain,
                previous,
                winner: admin_id,
            }),
            _ => None,
        }
    }

    /// Admin owning `domain`.
    pub fn owner(&self, domain: &str) -> Option<&str> {
        self.owners.get(domain).map(String::as_str)
    }

    /// Number of mapped domains.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether no domain is mapped.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
