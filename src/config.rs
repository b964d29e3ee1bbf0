//! Configuration types. All fields have defaults, so `{}` is a valid [`Config`].

use std::str::FromStr;
use std::time::Duration;

use serde_with::{serde_as, DeserializeFromStr, SerializeDisplay};

/// Full core configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// See [`ReconcileOptions`].
    pub reconcile: ReconcileOptions,
    /// See [`WritePolicy`].
    pub write_policy: WritePolicy,
    /// See [`CardOptions`].
    pub card_options: CardOptions,
}

/// How feed names are compared against profile display names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub enum NameMatch {
    /// Byte-exact, case-sensitive.
    Exact,
    /// Trim, collapse internal whitespace, lowercase.
    #[default]
    Normalized,
}
impl NameMatch {
    /// Canonical form of `name` under this rule.
    pub fn key(self, name: &str) -> String {
        match self {
            Self::Exact => name.to_owned(),
            Self::Normalized => name
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        }
    }
}
impl FromStr for NameMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "normalized" => Ok(Self::Normalized),
            other => Err(format!(
                "Unknown name match `{}`, expected `exact` or `normalized`.",
                other
            )),
        }
    }
}
impl std::fmt::Display for NameMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
        })
    }
}

/// Reconciler options.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    /// Name comparison rule.
    pub name_match: NameMatch,
    /// Don't stage ops for cards whose points already equal the feed value.
    pub skip_unchanged: bool,
}

/// Retry and gas policy handed to the [`crate::interface::ChainWriter`].
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WritePolicy {
    /// Total submission attempts per write (at least 1).
    pub max_attempts: u32,
    /// Added on top of the gas estimate, in percent.
    pub gas_buffer_percent: u32,
    /// Wait between attempts.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub retry_delay: Duration,
    /// How many times to poll for a receipt before giving up on an attempt.
    pub receipt_poll_attempts: u32,
    /// Wait between receipt polls.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub receipt_poll_interval: Duration,
}
impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            gas_buffer_percent: 20,
            retry_delay: Duration::from_secs(2),
            receipt_poll_attempts: 30,
            receipt_poll_interval: Duration::from_secs(2),
        }
    }
}
impl WritePolicy {
    /// Gas limit for an estimate, with the buffer applied.
    pub fn gas_limit(&self, estimate: u64) -> u64 {
        let buffered = u128::from(estimate) * (u128::from(self.gas_buffer_percent) + 100) / 100;
        buffered.min(u128::from(u64::MAX)) as u64
    }

    /// [`Self::max_attempts`], but never zero.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Allowed values for the card mint form.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CardOptions {
    /// Allowed leagues.
    pub leagues: Vec<String>,
    /// Allowed seasons.
    pub seasons: Vec<String>,
    /// Allowed teams.
    pub teams: Vec<String>,
}
impl Default for CardOptions {
    fn default() -> Self {
        Self {
            leagues: vec![
                "UPSL_Division_1".to_owned(),
                "USSL_Elite".to_owned(),
                "PFL_Division_1".to_owned(),
            ],
            seasons: vec!["2023_Spring".to_owned(), "2023_Fall".to_owned()],
            teams: vec!["Hodler Miami FC".to_owned()],
        }
    }
}
