//! Bindings for the player registration and player card contracts.
//!
//! Registration contract:
//! - `isPlayerRegistered(address) returns (bool)`
//! - `playerInfos(address) returns (string infoHash, uint256 playerNumber, bool isWaitlisted)`
//! - `registerPlayer(string infoHash)`
//!
//! Card contract:
//! - `getAllCardIds() returns (uint256[])`
//! - `getCard(uint256) returns (address owner, string team, string position, string league,
//!   string season, string profilePicture, uint256 fantasyPoints, bool isActive, uint256 salePrice)`
//! - `updateFantasyPoints(uint256 cardId, uint256 points)`, owner only
//! - `getCurrentPrice() returns (uint256)`
//! - `calculateMintingFee() returns (uint256)`
//! - `mintCard(string team, string position, string league, string season,
//!   string profilePicture, uint256 fantasyPoints)`, payable

use async_trait::async_trait;
use hodlerfc::config::WritePolicy;
use hodlerfc::interface::{ChainReader, ChainWriter, MintRequest};
use hodlerfc::model::{
    Address, CardId, CollectibleCard, ContentHash, RegistrationRecord, RegistrationStatus,
    TransactionReceipt, UpdateOp,
};
use hodlerfc::ExternalError;
use serde_with::{serde_as, DisplayFromStr};

use crate::abi::{decode, encode_call, ParamType, Token};
use crate::eth::{CallRequest, EthClient};

const GET_CARD_RETURNS: [ParamType; 9] = [
    ParamType::Address,
    ParamType::String,
    ParamType::String,
    ParamType::String,
    ParamType::String,
    ParamType::String,
    ParamType::Uint,
    ParamType::Bool,
    ParamType::Uint,
];

/// Both contracts, reached through one node.
pub struct Contracts {
    /// Node client.
    pub eth: EthClient,
    /// Player registration contract.
    pub registration: Address,
    /// Player card contract.
    pub card: Address,
    /// Contract owner account, sends point updates.
    pub sender: Address,
}
impl Contracts {
    async fn view(
        &self,
        contract: Address,
        signature: &str,
        args: &[Token],
        returns: &[ParamType],
    ) -> Result<Vec<Token>, ExternalError> {
        let data = self
            .eth
            .call(&CallRequest::call(contract, encode_call(signature, args)))
            .await?;
        decode(returns, &data).map_err(|e| format!("`{}` returned bad data: {}", signature, e).into())
    }

    async fn card_uint(&self, signature: &str) -> Result<u128, ExternalError> {
        let tokens = self
            .view(self.card, signature, &[], &[ParamType::Uint])
            .await?;
        single_uint(signature, tokens).map_err(ExternalError::new)
    }

    async fn minting_fee(&self) -> Result<u128, ExternalError> {
        self.card_uint("calculateMintingFee()").await
    }

    /// Current price and the fee `mintCard` will be sent with.
    pub async fn minting_price(&self) -> Result<MintingPrice, ExternalError> {
        Ok(MintingPrice {
            current_price: self.card_uint("getCurrentPrice()").await?,
            minting_fee: self.minting_fee().await?,
        })
    }
}

/// Card contract pricing, as shown before minting. Amounts are decimal strings.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintingPrice {
    /// `getCurrentPrice()`.
    #[serde_as(as = "DisplayFromStr")]
    pub current_price: u128,
    /// `calculateMintingFee()`, in wei.
    #[serde_as(as = "DisplayFromStr")]
    pub minting_fee: u128,
}

/// The one `uint256` returned by `signature`.
fn single_uint(signature: &str, tokens: Vec<Token>) -> Result<u128, String> {
    let [value] = <[Token; 1]>::try_from(tokens)
        .map_err(|t| format!("`{}` returned {} values, expected 1.", signature, t.len()))?;
    value.into_uint(signature)
}

/// Fold the registration contract's answers into a [`RegistrationRecord`].
pub fn registration_record(
    is_registered: bool,
    info_hash: String,
    player_number: u128,
    is_waitlisted: bool,
) -> RegistrationRecord {
    let content_hash = ContentHash(info_hash);
    let status = if is_registered {
        RegistrationStatus::Registered
    } else if is_waitlisted || !content_hash.is_empty() {
        RegistrationStatus::Waitlisted
    } else {
        RegistrationStatus::Unregistered
    };
    RegistrationRecord {
        status,
        content_hash,
        player_number: u64::try_from(player_number).ok().filter(|&n| 0 != n),
    }
}

/// Build a [`CollectibleCard`] from `getCard` return values.
pub fn card_from_tokens(card_id: CardId, tokens: Vec<Token>) -> Result<CollectibleCard, String> {
    let [owner, team, position, league, season, profile_picture, fantasy_points, is_active, sale_price] =
        <[Token; 9]>::try_from(tokens).map_err(|t| format!("expected 9 values, got {}", t.len()))?;
    let fantasy_points = fantasy_points.into_uint("fantasyPoints")?;
    let sale_price = sale_price.into_uint("salePrice")?;
    Ok(CollectibleCard {
        card_id,
        owner_address: owner.into_address("owner")?,
        team: team.into_string("team")?,
        position: position.into_string("position")?.parse()?,
        league: league.into_string("league")?,
        season: season.into_string("season")?,
        profile_picture: profile_picture.into_string("profilePicture")?,
        fantasy_points: u64::try_from(fantasy_points)
            .map_err(|_| format!("fantasyPoints {} out of range", fantasy_points))?,
        is_active: is_active.into_bool("isActive")?,
        sale_price: (0 != sale_price).then_some(sale_price),
    })
}

#[async_trait(?Send)]
impl ChainReader for Contracts {
    async fn registration_record(
        &self,
        address: &Address,
    ) -> Result<RegistrationRecord, ExternalError> {
        let arg = [Token::Address(*address)];
        let registered = self
            .view(self.registration, "isPlayerRegistered(address)", &arg, &[ParamType::Bool])
            .await?;
        let info = self
            .view(
                self.registration,
                "playerInfos(address)",
                &arg,
                &[ParamType::String, ParamType::Uint, ParamType::Bool],
            )
            .await?;

        let parse = || -> Result<RegistrationRecord, String> {
            let [is_registered] = <[Token; 1]>::try_from(registered).map_err(|_| "arity")?;
            let [info_hash, player_number, is_waitlisted] =
                <[Token; 3]>::try_from(info).map_err(|_| "arity")?;
            Ok(registration_record(
                is_registered.into_bool("isPlayerRegistered")?,
                info_hash.into_string("infoHash")?,
                player_number.into_uint("playerNumber")?,
                is_waitlisted.into_bool("isWaitlisted")?,
            ))
        };
        parse().map_err(|e| format!("Registration record for {}: {}", address, e).into())
    }

    async fn card_ids(&self) -> Result<Vec<CardId>, ExternalError> {
        let tokens = self
            .view(self.card, "getAllCardIds()", &[], &[ParamType::UintArray])
            .await?;
        let ids = tokens
            .into_iter()
            .next()
            .ok_or("`getAllCardIds()` returned nothing")?
            .into_uint_array("cardIds")?;
        ids.into_iter()
            .map(|id| {
                u64::try_from(id)
                    .map(CardId)
                    .map_err(|_| ExternalError::new(format!("Card id {} out of range.", id)))
            })
            .collect()
    }

    async fn card(&self, card_id: CardId) -> Result<CollectibleCard, ExternalError> {
        let tokens = self
            .view(
                self.card,
                "getCard(uint256)",
                &[Token::Uint(card_id.0.into())],
                &GET_CARD_RETURNS,
            )
            .await?;
        card_from_tokens(card_id, tokens)
            .map_err(|e| format!("Card {} malformed: {}", card_id, e).into())
    }
}

#[async_trait(?Send)]
impl ChainWriter for Contracts {
    async fn submit_update_points(
        &self,
        op: &UpdateOp,
        policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError> {
        let data = encode_call(
            "updateFantasyPoints(uint256,uint256)",
            &[Token::Uint(op.card_id.0.into()), Token::Uint(op.new_points.into())],
        );
        let what = format!("updateFantasyPoints({}, {})", op.card_id.0, op.new_points);
        self.eth
            .transact(&what, CallRequest::transaction(self.sender, self.card, data), policy)
            .await
    }

    async fn register_player(
        &self,
        from: &Address,
        content_hash: &ContentHash,
        policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError> {
        let data = encode_call(
            "registerPlayer(string)",
            &[Token::String(content_hash.0.clone())],
        );
        self.eth
            .transact(
                "registerPlayer",
                CallRequest::transaction(*from, self.registration, data),
                policy,
            )
            .await
    }

    async fn mint_card(
        &self,
        from: &Address,
        request: &MintRequest,
        policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError> {
        let fee = self.minting_fee().await?;
        let data = encode_call(
            "mintCard(string,string,string,string,string,uint256)",
            &[
                Token::String(request.team.clone()),
                Token::String(request.position.to_string()),
                Token::String(request.league.clone()),
                Token::String(request.season.clone()),
                Token::String(request.profile_picture.clone()),
                Token::Uint(0),
            ],
        );
        let tx = CallRequest {
            value: Some(fee),
            ..CallRequest::transaction(*from, self.card, data)
        };
        self.eth.transact("mintCard", tx, policy).await
    }
}
