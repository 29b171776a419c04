//! Shared identity types for keel's pluggable provider services.

use std::fmt;

/// Names one pluggable provider implementation: the service it extends and
/// the provider name it is registered under.
///
/// Identity is structural; two idents built from equal strings are equal and
/// hash identically, so the type is usable as a map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProviderIdent {
    service: String,
    provider_name: String,
}

impl ProviderIdent {
    #[must_use]
    pub fn new(service: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            provider_name: provider_name.into(),
        }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }
}

impl fmt::Display for ProviderIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.provider_name)
    }
}
