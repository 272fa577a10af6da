//! UTM attribution records.
//!
//! A fixed set of marketing query parameters is captured when a visitor
//! lands and kept for 30 days so the eventual checkout can be attributed.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Days a captured record stays valid.
pub const RECORD_TTL_DAYS: i64 = 30;

/// Recognised tracking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingKey {
    UtmSource,
    UtmMedium,
    UtmCampaign,
    UtmTerm,
    UtmContent,
    Gclid,
}

impl TrackingKey {
    pub const ALL: [Self; 6] = [
        Self::UtmSource,
        Self::UtmMedium,
        Self::UtmCampaign,
        Self::UtmTerm,
        Self::UtmContent,
        Self::Gclid,
    ];

    /// Query parameter name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UtmSource => "utm_source",
            Self::UtmMedium => "utm_medium",
            Self::UtmCampaign => "utm_campaign",
            Self::UtmTerm => "utm_term",
            Self::UtmContent => "utm_content",
            Self::Gclid => "gclid",
        }
    }

    /// Parse a query parameter name; unrecognised names yield `None`.
    #[must_use]
    pub fn from_param(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured tracking values keyed by parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtmParams(BTreeMap<TrackingKey, String>);

impl UtmParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep recognised keys with non-blank values, stored as given. A repeated
    /// key keeps its first value.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::new();
        for (name, value) in pairs {
            let value = value.as_ref();
            if value.trim().is_empty() {
                continue;
            }
            if let Some(key) = TrackingKey::from_param(name.as_ref()) {
                params.0.entry(key).or_insert_with(|| value.to_string());
            }
        }
        params
    }

    pub fn insert(&mut self, key: TrackingKey, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    #[must_use]
    pub fn get(&self, key: TrackingKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate in a stable key order.
    pub fn iter(&self) -> impl Iterator<Item = (TrackingKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// `self` overlaid with `newer`; values from `newer` win.
    #[must_use]
    pub fn merged_with(&self, newer: &Self) -> Self {
        let mut merged = self.clone();
        merged
            .0
            .extend(newer.0.iter().map(|(k, v)| (*k, v.clone())));
        merged
    }
}

/// Persisted tracking values with their validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmRecord {
    pub params: UtmParams,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiry: DateTime<Utc>,
}

impl UtmRecord {
    /// Record created at `now`, expiring 30 days later.
    #[must_use]
    pub fn new(params: UtmParams, now: DateTime<Utc>) -> Self {
        Self {
            params,
            timestamp: now,
            expiry: now + Duration::days(RECORD_TTL_DAYS),
        }
    }

    /// Valid strictly before the expiry instant.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiry
    }
}
