//! Backend Catalog
//!
//! Static registry of inference-backend profiles. The catalog is built from
//! configuration at startup and is read-only for the process lifetime; it is
//! never persisted. Routing decisions examine profiles only — actual network
//! clients live in the `backend` module.

use crate::config::BackendsConfig;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A capability a backend advertises and the router can require
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// General-purpose chat and reasoning
    General,
    /// Strong step-by-step reasoning
    Reasoning,
    /// Low-latency responses
    Fast,
    /// Code generation and debugging
    Coding,
    /// Analysis and synthesis of structured material
    Analysis,
    /// Non-English and translation work
    Multilingual,
    /// Long or demanding tasks needing a large context window
    Complex,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::General => "general",
            Capability::Reasoning => "reasoning",
            Capability::Fast => "fast",
            Capability::Coding => "coding",
            Capability::Analysis => "analysis",
            Capability::Multilingual => "multilingual",
            Capability::Complex => "complex",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cost/speed class of a backend. `Light` is the fastest class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CostClass {
    /// Small, fast, cheap
    Light,
    /// Mid-sized default
    Medium,
    /// Large, slow, most capable
    Heavy,
}

impl fmt::Display for CostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CostClass::Light => "light",
            CostClass::Medium => "medium",
            CostClass::Heavy => "heavy",
        };
        write!(f, "{}", s)
    }
}

/// Profile of one inference backend. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendProfile {
    /// Catalog name the router and feedback store key on (e.g. "phi3")
    pub name: String,

    /// Model identifier passed to the serving endpoint (e.g. "phi3:mini")
    pub model: String,

    /// Capabilities this backend advertises
    pub capability_tags: BTreeSet<Capability>,

    /// Maximum context window in tokens
    pub max_context: u32,

    /// Cost/speed class
    pub cost_class: CostClass,

    /// Baseline priority used as the routing tie-break (higher wins)
    pub default_priority: u8,
}

impl BackendProfile {
    /// Whether this backend advertises the given capability
    pub fn has(&self, cap: Capability) -> bool {
        self.capability_tags.contains(&cap)
    }
}

/// Process-wide, read-only registry of backend profiles
#[derive(Debug, Clone)]
pub struct BackendCatalog {
    profiles: Vec<BackendProfile>,
}

impl BackendCatalog {
    /// Build the catalog from configuration.
    ///
    /// Fails if the configuration declares no backends or declares the same
    /// backend name twice — the profile set must be non-empty and unambiguous
    /// for the process lifetime.
    pub fn from_config(config: &BackendsConfig) -> Result<Self, EngineError> {
        if config.entries.is_empty() {
            return Err(EngineError::Validation(
                "backend catalog is empty: configure at least one backend".to_string(),
            ));
        }

        let mut profiles = Vec::with_capacity(config.entries.len());
        let mut seen = BTreeSet::new();

        for entry in &config.entries {
            if !seen.insert(entry.name.clone()) {
                return Err(EngineError::Validation(format!(
                    "duplicate backend name in catalog: {}",
                    entry.name
                )));
            }

            profiles.push(BackendProfile {
                name: entry.name.clone(),
                model: entry.model.clone(),
                capability_tags: entry.capabilities.iter().copied().collect(),
                max_context: entry.max_context,
                cost_class: entry.cost_class,
                default_priority: entry.default_priority,
            });
        }

        Ok(Self { profiles })
    }

    /// Look up a profile by name
    pub fn get(&self, name: &str) -> Option<&BackendProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// All registered profiles, in configuration order
    pub fn profiles(&self) -> &[BackendProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
