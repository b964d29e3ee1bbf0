//! Identity Resolver: account → [`PlayerProfile`], via the registration contract's content-hash
//! pointer and the pinned profile blob.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::interface::{ChainReader, ContentStore};
use crate::model::{Address, ContentHash, PlayerProfile, ProfileBlob, RegistrationStatus};

/// Outcome of resolving an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Profile resolved (any status, including waitlisted).
    Found(PlayerProfile),
    /// No profile for the account. An expected outcome, not an error.
    NotFound(NotFoundReason),
}
impl Resolution {
    /// The profile, if found.
    pub fn profile(&self) -> Option<&PlayerProfile> {
        match self {
            Self::Found(profile) => Some(profile),
            Self::NotFound(_) => None,
        }
    }
}

/// Why a [`Resolution::NotFound`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotFoundReason {
    /// The account has no profile pointer.
    NoProfilePointer,
    /// The pinned blob could not be fetched or parsed (soft failure).
    ProfileUnavailable(Error),
}

/// Registration status of `address`.
pub async fn account_status<C>(chain: &C, address: &Address) -> Result<RegistrationStatus>
where
    C: ChainReader + ?Sized,
{
    let record = chain
        .registration_record(address)
        .await
        .map_err(|source| Error::RegistryUnavailable {
            address: *address,
            source,
        })?;
    Ok(record.status)
}

/// Resolves accounts to profiles, caching for the lifetime of one reconciliation pass.
///
/// Each pass owns its own resolver; it holds no locks and must not be shared between passes.
/// Registration lookups are cached per address and blob fetches per content hash (blobs are
/// immutable).
pub struct IdentityResolver<'a, C: ?Sized, S: ?Sized> {
    chain: &'a C,
    store: &'a S,
    by_address: HashMap<Address, Result<Resolution>>,
    by_hash: HashMap<ContentHash, Result<ProfileBlob>>,
}

impl<'a, C, S> IdentityResolver<'a, C, S>
where
    C: ChainReader + ?Sized,
    S: ContentStore + ?Sized,
{
    /// New resolver with empty caches.
    pub fn new(chain: &'a C, store: &'a S) -> Self {
        Self {
            chain,
            store,
            by_address: HashMap::new(),
            by_hash: HashMap::new(),
        }
    }

    /// Chain reader used for registration lookups.
    pub fn chain(&self) -> &'a C {
        self.chain
    }

    /// Resolve `address`.
    ///
    /// Errors only with [`Error::RegistryUnavailable`]. A blob that can't be fetched or parsed
    /// yields [`NotFoundReason::ProfileUnavailable`] instead.
    pub async fn resolve(&mut self, address: &Address) -> Result<Resolution> {
        if let Some(cached) = self.by_address.get(address) {
            return cached.clone();
        }
        let resolution = self.resolve_uncached(address).await;
        self.by_address.insert(*address, resolution.clone());
        resolution
    }

    async fn resolve_uncached(&mut self, address: &Address) -> Result<Resolution> {
        let record = self
            .chain
            .registration_record(address)
            .await
            .map_err(|source| Error::RegistryUnavailable {
                address: *address,
                source,
            })?;
        if record.content_hash.is_empty() {
            log::debug!("No profile pointer for {}.", address);
            return Ok(Resolution::NotFound(NotFoundReason::NoProfilePointer));
        }

        match self.fetch_profile_blob(&record.content_hash).await {
            Ok(blob) => Ok(Resolution::Found(PlayerProfile::merge(
                *address, &record, blob,
            ))),
            Err(e) => {
                log::warn!("Profile for {} unresolved: {}", address, e);
                Ok(Resolution::NotFound(NotFoundReason::ProfileUnavailable(e)))
            }
        }
    }

    async fn fetch_profile_blob(&mut self, content_hash: &ContentHash) -> Result<ProfileBlob> {
        if let Some(cached) = self.by_hash.get(content_hash) {
            return cached.clone();
        }
        let blob = self
            .store
            .fetch_blob(content_hash)
            .await
            .and_then(|value| {
                serde_json::from_value::<ProfileBlob>(value)
                    .map_err(|e| format!("Malformed profile JSON: {}", e).into())
            })
            .map_err(|source| Error::ProfileUnavailable {
                content_hash: content_hash.clone(),
                source,
            });
        self.by_hash.insert(content_hash.clone(), blob.clone());
        blob
    }
}

#[cfg(test)]
mod test {
    use futures::executor::block_on;

    use super::*;
    use crate::testing::{addr, profile_json, FakeChain, FakeStore};

    #[test]
    fn test_resolve_merges_record_and_blob() {
        let chain = FakeChain::default().with_player(addr(1), "QmA", RegistrationStatus::Registered);
        let store = FakeStore::default().with_blob("QmA", profile_json("Jane", "Doe"));
        let mut resolver = IdentityResolver::new(&chain, &store);

        let resolution = block_on(resolver.resolve(&addr(1))).unwrap();
        let profile = resolution.profile().unwrap();
        assert_eq!("Jane Doe", profile.display_name);
        assert_eq!(addr(1), profile.address);
        assert_eq!(RegistrationStatus::Registered, profile.registration_status);
        assert_eq!(Some(1), profile.player_number);
    }

    #[test]
    fn test_resolve_twice_fetches_once() {
        let chain = FakeChain::default().with_player(addr(1), "QmA", RegistrationStatus::Registered);
        let store = FakeStore::default().with_blob("QmA", profile_json("Jane", "Doe"));
        let mut resolver = IdentityResolver::new(&chain, &store);

        let first = block_on(resolver.resolve(&addr(1))).unwrap();
        let second = block_on(resolver.resolve(&addr(1))).unwrap();
        assert_eq!(first, second);
        assert_eq!(1, store.fetch_count());
        assert_eq!(1, chain.record_reads());
    }

    #[test]
    fn test_shared_hash_fetched_once() {
        let chain = FakeChain::default()
            .with_player(addr(1), "QmA", RegistrationStatus::Registered)
            .with_player(addr(2), "QmA", RegistrationStatus::Registered);
        let store = FakeStore::default().with_blob("QmA", profile_json("Jane", "Doe"));
        let mut resolver = IdentityResolver::new(&chain, &store);

        block_on(resolver.resolve(&addr(1))).unwrap();
        block_on(resolver.resolve(&addr(2))).unwrap();
        assert_eq!(1, store.fetch_count());
    }

    #[test]
    fn test_resolve_without_pointer_is_not_found() {
        let chain = FakeChain::default();
        let store = FakeStore::default();
        let mut resolver = IdentityResolver::new(&chain, &store);

        assert_eq!(
            Resolution::NotFound(NotFoundReason::NoProfilePointer),
            block_on(resolver.resolve(&addr(9))).unwrap()
        );
        assert_eq!(0, store.fetch_count());
    }

    #[test]
    fn test_malformed_blob_is_soft_failure() {
        let chain = FakeChain::default().with_player(addr(1), "QmBad", RegistrationStatus::Registered);
        let store = FakeStore::default().with_blob("QmBad", serde_json::json!({ "name": 5 }));
        let mut resolver = IdentityResolver::new(&chain, &store);

        match block_on(resolver.resolve(&addr(1))).unwrap() {
            Resolution::NotFound(NotFoundReason::ProfileUnavailable(Error::ProfileUnavailable {
                content_hash,
                ..
            })) => assert_eq!(ContentHash::from("QmBad"), content_hash),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_registry_failure_is_error() {
        let chain = FakeChain::default().failing_registry();
        let store = FakeStore::default();
        let mut resolver = IdentityResolver::new(&chain, &store);

        let err = block_on(resolver.resolve(&addr(3))).unwrap_err();
        assert!(matches!(err, Error::RegistryUnavailable { address, .. } if address == addr(3)));
        assert!(block_on(account_status(&chain, &addr(3))).is_err());
    }
}
