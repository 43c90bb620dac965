//! Backend capability detection
//!
//! Probes the host environment once for each backend's injected global.
//! The probe is an injected trait so tests and non-browser hosts can
//! substitute their own notion of "installed".

use std::collections::BTreeMap;

use crate::types::Backend;

/// Host-environment probe: is a backend's injected global present?
///
/// Implementations must not mutate the host environment.
pub trait HostProbe: Send + Sync {
    fn is_installed(&self, backend: Backend) -> bool;
}

/// A fixed probe answering from a precomputed set. Useful in tests and
/// in hosts that enumerate their injections up front.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    installed: Vec<Backend>,
}

impl StaticProbe {
    pub fn with(installed: impl IntoIterator<Item = Backend>) -> Self {
        Self {
            installed: installed.into_iter().collect(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl HostProbe for StaticProbe {
    fn is_installed(&self, backend: Backend) -> bool {
        self.installed.contains(&backend)
    }
}

/// Presence flags per backend, computed once at startup.
///
/// Not reactive: a backend injected after detection is not seen until
/// the host reloads and detection runs again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    present: BTreeMap<Backend, bool>,
}

impl CapabilityTable {
    /// Probe every known backend exactly once. Never fails; absence is
    /// recorded as `false`.
    pub fn detect(probe: &dyn HostProbe) -> Self {
        let present = Backend::ALL
            .iter()
            .map(|&backend| (backend, probe.is_installed(backend)))
            .collect();
        Self { present }
    }

    pub fn is_installed(&self, backend: Backend) -> bool {
        self.present.get(&backend).copied().unwrap_or(false)
    }

    /// Backends whose globals were present at detection time.
    pub fn installed(&self) -> Vec<Backend> {
        self.present
            .iter()
            .filter(|(_, &present)| present)
            .map(|(&backend, _)| backend)
            .collect()
    }
}
