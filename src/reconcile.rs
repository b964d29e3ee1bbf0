//! Points Reconciler: match feed entries to active cards and stage point updates.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::ReconcileOptions;
use crate::index::CollectibleIndex;
use crate::model::{CardId, CollectibleCard, FantasyFeedEntry, UpdateOp};

/// A non-fatal data mismatch found while reconciling.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Diagnostic {
    /// No active, indexed card matched the feed entry.
    NoMatchingCard {
        /// Feed player name.
        player_name: String,
        /// Feed league.
        league: String,
        /// Feed season.
        season: String,
        /// Feed team.
        team: String,
    },
    /// A card matched more than one feed entry; the first entry's points were kept.
    DuplicateMatch {
        /// The card.
        card_id: CardId,
        /// Name of the ignored (later) feed entry.
        player_name: String,
    },
}
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingCard {
                player_name,
                league,
                season,
                team,
            } => write!(
                f,
                "No active card for `{}` in {} / {} / {}.",
                player_name, league, season, team
            ),
            Self::DuplicateMatch {
                card_id,
                player_name,
            } => write!(
                f,
                "Card {} already matched, ignoring feed entry for `{}`.",
                card_id, player_name
            ),
        }
    }
}

/// Result of [`reconcile`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Staged writes, in feed order.
    pub ops: Vec<UpdateOp>,
    /// Data mismatches, in feed order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Stage point updates for every active, indexed card matching a feed entry.
///
/// A card matches an entry when its owner's display name equals the entry's player name (under
/// [`ReconcileOptions::name_match`]), its `(league, season, team)` equals the entry's exactly and
/// it is active. Every matching card gets its own op carrying the feed's points (overwrite).
/// Entries with no match produce one [`Diagnostic::NoMatchingCard`] each.
///
/// Pure: identical inputs always give identical output.
pub fn reconcile(
    feed: &[FantasyFeedEntry],
    index: &CollectibleIndex,
    cards: &[CollectibleCard],
    options: &ReconcileOptions,
) -> Reconciliation {
    // Owner name key per indexed card, computed once.
    let name_keys = index
        .iter()
        .map(|(card_id, profile)| (card_id, options.name_match.key(&profile.display_name)))
        .collect::<HashMap<_, _>>();

    let mut out = Reconciliation::default();
    let mut staged = HashSet::new();
    for entry in feed {
        let key = options.name_match.key(&entry.player_name);
        let mut matched = false;
        for card in cards.iter().filter(|card| {
            card.is_active
                && card.league == entry.league
                && card.season == entry.season
                && card.team == entry.team
                && name_keys.get(&card.card_id) == Some(&key)
        }) {
            matched = true;
            if !staged.insert(card.card_id) {
                out.diagnostics.push(Diagnostic::DuplicateMatch {
                    card_id: card.card_id,
                    player_name: entry.player_name.clone(),
                });
                continue;
            }
            if options.skip_unchanged && card.fantasy_points == entry.fantasy_points {
                log::debug!(
                    "Card {} already has {} points.",
                    card.card_id,
                    entry.fantasy_points
                );
                continue;
            }
            out.ops.push(UpdateOp {
                card_id: card.card_id,
                new_points: entry.fantasy_points,
            });
        }
        if !matched {
            out.diagnostics.push(Diagnostic::NoMatchingCard {
                player_name: entry.player_name.clone(),
                league: entry.league.clone(),
                season: entry.season.clone(),
                team: entry.team.clone(),
            });
        }
    }
    for diagnostic in out.diagnostics.iter() {
        log::warn!("{}", diagnostic);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::NameMatch;
    use crate::testing::{addr, card, feed_entry, profile};

    fn index_of(entries: &[(u64, &str)]) -> CollectibleIndex {
        entries
            .iter()
            .map(|&(id, name)| (CardId(id), profile(addr(id as u8), name)))
            .collect()
    }

    #[test]
    fn test_single_match() {
        let feed = [feed_entry("J. Doe", "UPSL_Division_1", 42)];
        let cards = [card(1, addr(1), "UPSL_Division_1", true)];
        let index = index_of(&[(1, "J. Doe")]);

        let out = reconcile(&feed, &index, &cards, &ReconcileOptions::default());
        assert_eq!(
            vec![UpdateOp {
                card_id: CardId(1),
                new_points: 42
            }],
            out.ops
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_inactive_card_not_updated() {
        let feed = [feed_entry("J. Doe", "UPSL_Division_1", 42)];
        let cards = [card(1, addr(1), "UPSL_Division_1", false)];
        let index = index_of(&[(1, "J. Doe")]);

        let out = reconcile(&feed, &index, &cards, &ReconcileOptions::default());
        assert!(out.ops.is_empty());
        assert_eq!(
            vec![Diagnostic::NoMatchingCard {
                player_name: "J. Doe".to_owned(),
                league: "UPSL_Division_1".to_owned(),
                season: "2023_Spring".to_owned(),
                team: "Hodler Miami FC".to_owned(),
            }],
            out.diagnostics
        );
    }

    #[test]
    fn test_two_cards_two_leagues() {
        let feed = [
            feed_entry("J. Doe", "UPSL_Division_1", 42),
            feed_entry("J. Doe", "USSL_Elite", 7),
        ];
        let cards = [
            card(1, addr(1), "UPSL_Division_1", true),
            card(2, addr(1), "USSL_Elite", true),
        ];
        let index = index_of(&[(1, "J. Doe"), (2, "J. Doe")]);

        let out = reconcile(&feed, &index, &cards, &ReconcileOptions::default());
        assert_eq!(
            vec![
                UpdateOp {
                    card_id: CardId(1),
                    new_points: 42
                },
                UpdateOp {
                    card_id: CardId(2),
                    new_points: 7
                },
            ],
            out.ops
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_unindexed_card_never_updated() {
        let feed = [feed_entry("J. Doe", "UPSL_Division_1", 42)];
        let cards = [
            card(1, addr(1), "UPSL_Division_1", true),
            card(2, addr(2), "UPSL_Division_1", true),
        ];
        let index = index_of(&[(2, "Someone Else")]);

        let out = reconcile(&feed, &index, &cards, &ReconcileOptions::default());
        assert!(out.ops.is_empty());
        assert_eq!(1, out.diagnostics.len());
    }

    #[test]
    fn test_idempotent() {
        let feed = [
            feed_entry("J. Doe", "UPSL_Division_1", 42),
            feed_entry("Nobody", "UPSL_Division_1", 1),
        ];
        let cards = [card(1, addr(1), "UPSL_Division_1", true)];
        let index = index_of(&[(1, "J. Doe")]);
        let options = ReconcileOptions::default();

        let first = reconcile(&feed, &index, &cards, &options);
        let second = reconcile(&feed, &index, &cards, &options);
        assert_eq!(first, second);
        assert_eq!(1, first.ops.len());
        assert_eq!(1, first.diagnostics.len());
    }

    #[test]
    fn test_name_match_modes() {
        let feed = [feed_entry("  j.  DOE ", "UPSL_Division_1", 42)];
        let cards = [card(1, addr(1), "UPSL_Division_1", true)];
        let index = index_of(&[(1, "J. Doe")]);

        let normalized = reconcile(&feed, &index, &cards, &ReconcileOptions::default());
        assert_eq!(1, normalized.ops.len());

        let exact = ReconcileOptions {
            name_match: NameMatch::Exact,
            ..ReconcileOptions::default()
        };
        let out = reconcile(&feed, &index, &cards, &exact);
        assert!(out.ops.is_empty());
        assert!(matches!(
            &out.diagnostics[..],
            [Diagnostic::NoMatchingCard { player_name, .. }] if player_name == "  j.  DOE "
        ));
    }

    #[test]
    fn test_duplicate_feed_entries_first_wins() {
        let feed = [
            feed_entry("J. Doe", "UPSL_Division_1", 42),
            feed_entry("j. doe", "UPSL_Division_1", 99),
        ];
        let cards = [card(1, addr(1), "UPSL_Division_1", true)];
        let index = index_of(&[(1, "J. Doe")]);

        let out = reconcile(&feed, &index, &cards, &ReconcileOptions::default());
        assert_eq!(
            vec![UpdateOp {
                card_id: CardId(1),
                new_points: 42
            }],
            out.ops
        );
        assert_eq!(
            vec![Diagnostic::DuplicateMatch {
                card_id: CardId(1),
                player_name: "j. doe".to_owned(),
            }],
            out.diagnostics
        );
    }

    #[test]
    fn test_skip_unchanged() {
        let feed = [feed_entry("J. Doe", "UPSL_Division_1", 10)];
        let cards = [card(1, addr(1), "UPSL_Division_1", true)];
        let index = index_of(&[(1, "J. Doe")]);
        assert_eq!(10, cards[0].fantasy_points);

        let options = ReconcileOptions {
            skip_unchanged: true,
            ..ReconcileOptions::default()
        };
        let out = reconcile(&feed, &index, &cards, &options);
        assert!(out.ops.is_empty());
        assert!(out.diagnostics.is_empty());

        let out = reconcile(&feed, &index, &cards, &ReconcileOptions::default());
        assert_eq!(1, out.ops.len());
    }
}
