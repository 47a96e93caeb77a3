//! Provider registry: routes a media type to the providers that handle it.

use crate::error::Result;
use crate::models::Registration;
use crate::provider::ProviderHandle;
use globset::GlobSet;
use std::collections::{BTreeSet, HashMap};

struct Entry {
    registration: Registration,
    matcher: GlobSet,
    /// Registrations can exist without an implementation in this process
    /// (registered by a front end ahead of the provider being installed).
    provider: Option<ProviderHandle>,
}

/// Registry of capability providers and their routing information.
///
/// Read-mostly: resolved once per extraction, written only when providers are
/// installed or re-registered.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: HashMap<String, Entry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a provider implementation with its default registration.
    ///
    /// Replaces any previous implementation of the same name. An existing
    /// registration is kept, so stored overrides survive a restart.
    pub fn install(&mut self, provider: ProviderHandle) -> Result<()> {
        let name = provider.name().to_string();
        match self.entries.get_mut(&name) {
            Some(entry) => entry.provider = Some(provider),
            None => {
                let registration = provider.registration();
                let matcher = registration.matcher()?;
                self.entries.insert(name, Entry {
                    registration,
                    matcher,
                    provider: Some(provider),
                });
            },
        }
        Ok(())
    }

    /// Create or replace a registration, keeping any installed implementation.
    pub fn register(&mut self, registration: Registration) -> Result<()> {
        let matcher = registration.matcher()?;
        let provider = self.entries.remove(&registration.name).and_then(|entry| entry.provider);
        self.entries.insert(registration.name.clone(), Entry {
            registration,
            matcher,
            provider,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.entries.get(name).map(|entry| &entry.registration)
    }

    /// All registrations, highest priority first, then by name.
    pub fn registrations(&self) -> Vec<Registration> {
        let mut registrations = self.entries.values().map(|e| e.registration.clone()).collect::<Vec<_>>();
        registrations.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        registrations
    }

    /// Providers that should run for `media_type` to fill `wanted`.
    ///
    /// A provider qualifies when it is enabled, installed, available, accepts
    /// the media type and is registered for at least one wanted key. Ordered
    /// highest priority first.
    pub fn resolve(&self, media_type: &str, wanted: &BTreeSet<String>) -> Vec<ProviderHandle> {
        let media_type = media_type.to_ascii_lowercase();
        let mut matched = self
            .entries
            .values()
            .filter(|entry| entry.registration.enabled)
            .filter(|entry| entry.matcher.is_match(&media_type))
            .filter(|entry| entry.registration.keys.iter().any(|key| wanted.contains(key)))
            .filter_map(|entry| {
                let provider = entry.provider.as_ref()?;
                provider.is_available().then(|| (&entry.registration, provider.clone()))
            })
            .collect::<Vec<_>>();
        matched.sort_by(|(a, _), (b, _)| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        matched.into_iter().map(|(_, provider)| provider).collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.registrations().iter().map(|r| &r.name)).finish()
    }
}
