//! The fantasy points feed document and its filters.
//!
//! The scoring service publishes a single JSON object keyed by full player name:
//!
//! ```json
//! { "J. Doe": { "League": "UPSL_Division_1", "Season": "2023_Spring", "Team": "Hodler Miami FC",
//!               "Fantasy Points": 42, "Matchday Key": "MD7" } }
//! ```

use std::collections::BTreeMap;

use serde_with::serde_as;

use crate::error::ExternalError;
use crate::model::FantasyFeedEntry;

/// Selects feed entries. Every given constraint must match; empty/`None` matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedFilter {
    /// Only these player names (exact).
    pub player_names: Vec<String>,
    /// Only this league.
    pub league: Option<String>,
    /// Only this season.
    pub season: Option<String>,
    /// Only this team.
    pub team: Option<String>,
}
impl FeedFilter {
    /// If `entry` is selected by this filter.
    pub fn matches(&self, entry: &FantasyFeedEntry) -> bool {
        fn field(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |want| want == have)
        }
        (self.player_names.is_empty() || self.player_names.contains(&entry.player_name))
            && field(&self.league, &entry.league)
            && field(&self.season, &entry.season)
            && field(&self.team, &entry.team)
    }
}

#[serde_as]
#[derive(Debug, serde::Deserialize)]
struct FeedRecord {
    #[serde(rename = "League")]
    league: String,
    #[serde(rename = "Season")]
    season: String,
    #[serde(rename = "Team")]
    team: String,
    /// Number or numeric string; anything else is treated as missing.
    #[serde(rename = "Fantasy Points", default)]
    #[serde_as(as = "serde_with::DefaultOnError<Option<serde_with::PickFirst<(_, serde_with::DisplayFromStr)>>>")]
    fantasy_points: Option<u64>,
    #[serde(rename = "Matchday Key", default)]
    matchday_key: Option<serde_json::Value>,
}

/// Parse a feed document and apply `filter`. Entries are returned sorted by player name.
///
/// Only a document that is not a JSON object fails. Entries that don't parse, or have no
/// usable points, are dropped with a warning.
pub fn parse_feed_document(
    document: &[u8],
    filter: &FeedFilter,
) -> Result<Vec<FantasyFeedEntry>, ExternalError> {
    let records: BTreeMap<String, serde_json::Value> = serde_json::from_slice(document)
        .map_err(|e| ExternalError::new(format!("Malformed feed document: {}", e)))?;

    let entries = records
        .into_iter()
        .filter_map(|(player_name, value)| {
            let record = match serde_json::from_value::<FeedRecord>(value) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Feed entry for `{}` is malformed, skipping: {}", player_name, e);
                    return None;
                }
            };
            let Some(fantasy_points) = record.fantasy_points else {
                log::warn!(
                    "Feed entry for `{}` has no usable `Fantasy Points`, skipping.",
                    player_name
                );
                return None;
            };
            let matchday_key = record.matchday_key.and_then(|key| match key {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s),
                other => Some(other.to_string()),
            });
            Some(FantasyFeedEntry {
                player_name,
                league: record.league,
                season: record.season,
                team: record.team,
                fantasy_points,
                matchday_key,
            })
        })
        .filter(|entry| filter.matches(entry))
        .collect();
    Ok(entries)
}
