//! Filters and technology lists to scope the foreground dispatch.

use std::fmt::{Display, Formatter};

/// Intent action broadcast when a tag with a listed technology is discovered.
pub const ACTION_TECH_DISCOVERED: &str = "android.nfc.action.TECH_DISCOVERED";

/// A tag technology the platform can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Technology {
    IsoDep,
    NfcA,
    NfcB,
    NfcF,
    NfcV,
    Ndef,
    MifareClassic,
    MifareUltralight,
}

impl Display for Technology {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use Technology::*;

        let name = match self {
            IsoDep => "IsoDep",
            NfcA => "NfcA",
            NfcB => "NfcB",
            NfcF => "NfcF",
            NfcV => "NfcV",
            Ndef => "Ndef",
            MifareClassic => "MifareClassic",
            MifareUltralight => "MifareUltralight",
        };

        f.write_str(name)
    }
}

/// Matches notifications by their action and MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct IntentFilter {
    pub action: String,
    pub mime_type: String,
}

impl IntentFilter {
    pub fn new(action: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Determines whether a notification with the action passes this filter.
    pub fn matches(&self, action: &str) -> bool {
        self.action == action
    }
}

/// Immutable configuration for the foreground dispatch.
///
/// Each entry of `tech_lists` is a set of technologies that a tag must support all of,
/// and a tag is dispatched if any one of the sets matches.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DiscoveryConfig {
    filters: Vec<IntentFilter>,
    tech_lists: Vec<Vec<Technology>>,
}

impl DiscoveryConfig {
    pub fn new(filters: Vec<IntentFilter>, tech_lists: Vec<Vec<Technology>>) -> Self {
        Self {
            filters,
            tech_lists,
        }
    }

    pub fn filters(&self) -> &[IntentFilter] {
        &self.filters
    }

    pub fn tech_lists(&self) -> &[Vec<Technology>] {
        &self.tech_lists
    }

    /// Determines whether any filter lets notifications with the action through.
    pub fn matches_action(&self, action: &str) -> bool {
        self.filters.iter().any(|filter| filter.matches(action))
    }

    /// Determines whether a tag supporting `techs`, announced with the action, would be dispatched.
    pub fn dispatches(&self, action: &str, techs: &[Technology]) -> bool {
        self.matches_action(action) && self.accepts(techs)
    }

    /// Determines whether a tag supporting `techs` passes the technology lists.
    pub fn accepts(&self, techs: &[Technology]) -> bool {
        self.tech_lists
            .iter()
            .any(|list| list.iter().all(|t| techs.contains(t)))
    }
}

impl Default for DiscoveryConfig {
    /// Any MIME type on `TECH_DISCOVERED`, for ISO-DEP tags only.
    fn default() -> Self {
        Self::new(
            vec![IntentFilter::new(ACTION_TECH_DISCOVERED, "*/*")],
            vec![vec![Technology::IsoDep]],
        )
    }
}
