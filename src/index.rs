//! Collectible Index: card → owning player's profile.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::interface::{ChainReader, ContentStore};
use crate::model::{CardId, CollectibleCard, PlayerProfile, RegistrationStatus};
use crate::resolver::{IdentityResolver, NotFoundReason, Resolution};

/// Immutable snapshot mapping card IDs to resolved owner profiles.
///
/// Built once per pass and passed by reference; a missing entry means "unknown player".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectibleIndex {
    profiles: BTreeMap<CardId, PlayerProfile>,
}
impl CollectibleIndex {
    /// Profile of the owner of `card_id`, if resolved.
    pub fn get(&self, card_id: CardId) -> Option<&PlayerProfile> {
        self.profiles.get(&card_id)
    }

    /// If `card_id` is indexed.
    pub fn contains(&self, card_id: CardId) -> bool {
        self.profiles.contains_key(&card_id)
    }

    /// Number of indexed cards.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// If no cards are indexed.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Indexed `(card_id, profile)` pairs, by card ID.
    pub fn iter(&self) -> impl Iterator<Item = (CardId, &PlayerProfile)> {
        self.profiles.iter().map(|(&id, profile)| (id, profile))
    }
}
impl FromIterator<(CardId, PlayerProfile)> for CollectibleIndex {
    fn from_iter<T: IntoIterator<Item = (CardId, PlayerProfile)>>(iter: T) -> Self {
        Self {
            profiles: iter.into_iter().collect(),
        }
    }
}

/// Why a card was left out of the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The card record couldn't be read.
    CardUnavailable(Error),
    /// The owner's registration record couldn't be read.
    RegistryUnavailable(Error),
    /// The owner resolved to nothing.
    OwnerNotFound(NotFoundReason),
    /// The owner has a profile but isn't registered.
    OwnerNotRegistered(RegistrationStatus),
}

/// A card excluded from the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedCard {
    /// The card.
    pub card_id: CardId,
    /// Why.
    pub reason: SkipReason,
}

/// Result of [`build_index`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexBuild {
    /// The index.
    pub index: CollectibleIndex,
    /// Every card record that could be read, indexed or not, in `card_ids` order.
    pub cards: Vec<CollectibleCard>,
    /// Cards left out of the index.
    pub skipped: Vec<SkippedCard>,
}

/// Read each card and resolve its owner. Per-card failures skip that card; the build never aborts.
///
/// Owners are resolved through `resolver`'s cache, so each distinct owner is looked up once.
pub async fn build_index<C, S>(
    resolver: &mut IdentityResolver<'_, C, S>,
    card_ids: &[CardId],
) -> IndexBuild
where
    C: ChainReader + ?Sized,
    S: ContentStore + ?Sized,
{
    let mut build = IndexBuild::default();
    let mut profiles = BTreeMap::new();
    for &card_id in card_ids {
        let card = match resolver.chain().card(card_id).await {
            Ok(card) => card,
            Err(source) => {
                build.skip(
                    card_id,
                    SkipReason::CardUnavailable(Error::CardUnavailable {
                        card_id: Some(card_id),
                        source,
                    }),
                );
                continue;
            }
        };

        let reason = match resolver.resolve(&card.owner_address).await {
            Ok(Resolution::Found(profile))
                if profile.registration_status == RegistrationStatus::Registered =>
            {
                profiles.insert(card_id, profile);
                None
            }
            Ok(Resolution::Found(profile)) => {
                Some(SkipReason::OwnerNotRegistered(profile.registration_status))
            }
            Ok(Resolution::NotFound(reason)) => Some(SkipReason::OwnerNotFound(reason)),
            Err(e) => Some(SkipReason::RegistryUnavailable(e)),
        };
        if let Some(reason) = reason {
            build.skip(card_id, reason);
        }
        build.cards.push(card);
    }
    build.index = CollectibleIndex { profiles };
    log::info!(
        "Indexed {} of {} cards ({} skipped).",
        build.index.len(),
        card_ids.len(),
        build.skipped.len()
    );
    build
}

impl IndexBuild {
    fn skip(&mut self, card_id: CardId, reason: SkipReason) {
        log::warn!("Card {} left out of index: {:?}", card_id, reason);
        self.skipped.push(SkippedCard { card_id, reason });
    }
}
