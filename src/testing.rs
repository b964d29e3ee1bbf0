//! In-memory fakes of the external interfaces, for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::config::WritePolicy;
use crate::error::ExternalError;
use crate::feed::FeedFilter;
use crate::interface::{ChainReader, ChainWriter, ContentStore, FantasyFeed, MintRequest};
use crate::model::*;

pub fn addr(n: u8) -> Address {
    let mut bytes = [0; 20];
    bytes[19] = n;
    Address(bytes)
}

pub fn card(id: u64, owner: Address, league: &str, is_active: bool) -> CollectibleCard {
    CollectibleCard {
        card_id: CardId(id),
        owner_address: owner,
        team: "Hodler Miami FC".to_owned(),
        position: Position::Mid,
        league: league.to_owned(),
        season: "2023_Spring".to_owned(),
        profile_picture: String::new(),
        fantasy_points: 10,
        is_active,
        sale_price: None,
    }
}

pub fn feed_entry(player_name: &str, league: &str, fantasy_points: u64) -> FantasyFeedEntry {
    FantasyFeedEntry {
        player_name: player_name.to_owned(),
        league: league.to_owned(),
        season: "2023_Spring".to_owned(),
        team: "Hodler Miami FC".to_owned(),
        fantasy_points,
        matchday_key: None,
    }
}

pub fn profile(address: Address, display_name: &str) -> PlayerProfile {
    PlayerProfile {
        address,
        display_name: display_name.to_owned(),
        nationality: "United States".to_owned(),
        date_of_birth: "1999-04-01".to_owned(),
        phone: "+15550100".to_owned(),
        selfie_content_hash: "QmSelfie".into(),
        player_number: None,
        registration_status: RegistrationStatus::Registered,
    }
}

pub fn profile_json(first: &str, last: &str) -> serde_json::Value {
    serde_json::json!({
        "name": first,
        "lastName": last,
        "nationality": "United States",
        "dob": "1999-04-01",
        "phone": "+15550100",
        "selfieHash": "QmSelfie",
    })
}

#[derive(Default)]
pub struct FakeChain {
    records: HashMap<Address, RegistrationRecord>,
    cards: Vec<CollectibleCard>,
    failing_cards: HashSet<CardId>,
    failing_card_ids: bool,
    failing_registry: bool,
    record_reads: Cell<usize>,
}
impl FakeChain {
    pub fn with_player(mut self, address: Address, hash: &str, status: RegistrationStatus) -> Self {
        let player_number = Some(self.records.len() as u64 + 1);
        self.records.insert(
            address,
            RegistrationRecord {
                status,
                content_hash: hash.into(),
                player_number,
            },
        );
        self
    }

    pub fn with_card(mut self, card: CollectibleCard) -> Self {
        self.cards.push(card);
        self
    }

    pub fn failing_card(mut self, card_id: CardId) -> Self {
        self.failing_cards.insert(card_id);
        self
    }

    pub fn failing_card_ids(mut self) -> Self {
        self.failing_card_ids = true;
        self
    }

    pub fn failing_registry(mut self) -> Self {
        self.failing_registry = true;
        self
    }

    pub fn record_reads(&self) -> usize {
        self.record_reads.get()
    }
}
#[async_trait(?Send)]
impl ChainReader for FakeChain {
    async fn registration_record(
        &self,
        address: &Address,
    ) -> Result<RegistrationRecord, ExternalError> {
        self.record_reads.set(self.record_reads.get() + 1);
        if self.failing_registry {
            return Err("connection refused".into());
        }
        Ok(self.records.get(address).cloned().unwrap_or_default())
    }

    async fn card_ids(&self) -> Result<Vec<CardId>, ExternalError> {
        if self.failing_card_ids {
            return Err("connection refused".into());
        }
        let mut ids = self.cards.iter().map(|c| c.card_id).collect::<Vec<_>>();
        ids.extend(self.failing_cards.iter().copied());
        ids.sort();
        Ok(ids)
    }

    async fn card(&self, card_id: CardId) -> Result<CollectibleCard, ExternalError> {
        if self.failing_cards.contains(&card_id) {
            return Err(format!("execution reverted reading {}", card_id).into());
        }
        self.cards
            .iter()
            .find(|c| c.card_id == card_id)
            .cloned()
            .ok_or_else(|| "no such card".into())
    }
}

#[derive(Default)]
pub struct FakeStore {
    blobs: HashMap<ContentHash, serde_json::Value>,
    failing_pins: bool,
    fetches: Cell<usize>,
    pins: Cell<usize>,
    pinned_blobs: RefCell<Vec<serde_json::Value>>,
}
impl FakeStore {
    pub fn with_blob(mut self, hash: &str, blob: serde_json::Value) -> Self {
        self.blobs.insert(hash.into(), blob);
        self
    }

    pub fn failing_pins(mut self) -> Self {
        self.failing_pins = true;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    pub fn pinned_blobs(&self) -> Vec<serde_json::Value> {
        self.pinned_blobs.borrow().clone()
    }

    fn next_pin(&self) -> usize {
        let n = self.pins.get();
        self.pins.set(n + 1);
        n
    }
}
#[async_trait(?Send)]
impl ContentStore for FakeStore {
    async fn fetch_blob(
        &self,
        content_hash: &ContentHash,
    ) -> Result<serde_json::Value, ExternalError> {
        self.fetches.set(self.fetches.get() + 1);
        self.blobs
            .get(content_hash)
            .cloned()
            .ok_or_else(|| format!("404 Not Found: {}", content_hash).into())
    }

    async fn pin_blob(&self, blob: &serde_json::Value) -> Result<ContentHash, ExternalError> {
        if self.failing_pins {
            return Err("401 Unauthorized".into());
        }
        self.pinned_blobs.borrow_mut().push(blob.clone());
        Ok(ContentHash(format!("QmJson{}", self.next_pin())))
    }

    async fn pin_file(&self, _upload: &Upload) -> Result<ContentHash, ExternalError> {
        if self.failing_pins {
            return Err("401 Unauthorized".into());
        }
        Ok(ContentHash(format!("QmFile{}", self.next_pin())))
    }
}

#[derive(Default)]
pub struct FakeWriter {
    failing_cards: HashSet<CardId>,
    reverting_cards: HashSet<CardId>,
    submitted: RefCell<Vec<CardId>>,
    registrations: RefCell<Vec<(Address, ContentHash)>>,
    mints: RefCell<Vec<(Address, MintRequest)>>,
}
impl FakeWriter {
    pub fn failing_card(mut self, card_id: CardId) -> Self {
        self.failing_cards.insert(card_id);
        self
    }

    pub fn reverting_card(mut self, card_id: CardId) -> Self {
        self.reverting_cards.insert(card_id);
        self
    }

    pub fn submitted_cards(&self) -> Vec<CardId> {
        self.submitted.borrow().clone()
    }

    pub fn registrations(&self) -> Vec<(Address, ContentHash)> {
        self.registrations.borrow().clone()
    }

    pub fn mints(&self) -> Vec<(Address, MintRequest)> {
        self.mints.borrow().clone()
    }

    fn receipt(&self, success: bool) -> TransactionReceipt {
        let n = self.submitted.borrow().len()
            + self.registrations.borrow().len()
            + self.mints.borrow().len();
        TransactionReceipt {
            tx_hash: format!("0x{:064x}", n),
            block_number: n as u64,
            gas_used: 21_000,
            success,
        }
    }
}
#[async_trait(?Send)]
impl ChainWriter for FakeWriter {
    async fn submit_update_points(
        &self,
        op: &UpdateOp,
        _policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError> {
        self.submitted.borrow_mut().push(op.card_id);
        if self.failing_cards.contains(&op.card_id) {
            return Err("nonce too low".into());
        }
        Ok(self.receipt(!self.reverting_cards.contains(&op.card_id)))
    }

    async fn register_player(
        &self,
        from: &Address,
        content_hash: &ContentHash,
        _policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError> {
        self.registrations
            .borrow_mut()
            .push((*from, content_hash.clone()));
        Ok(self.receipt(true))
    }

    async fn mint_card(
        &self,
        from: &Address,
        request: &MintRequest,
        _policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError> {
        self.mints.borrow_mut().push((*from, request.clone()));
        Ok(self.receipt(true))
    }
}

pub struct FakeFeed(Result<Vec<FantasyFeedEntry>, ExternalError>);
impl FakeFeed {
    pub fn new(entries: Vec<FantasyFeedEntry>) -> Self {
        Self(Ok(entries))
    }

    pub fn failing(msg: &str) -> Self {
        Self(Err(msg.into()))
    }
}
#[async_trait(?Send)]
impl FantasyFeed for FakeFeed {
    async fn fetch_fantasy_feed(
        &self,
        filter: &FeedFilter,
    ) -> Result<Vec<FantasyFeedEntry>, ExternalError> {
        self.0
            .clone()
            .map(|entries| entries.into_iter().filter(|e| filter.matches(e)).collect())
    }
}
