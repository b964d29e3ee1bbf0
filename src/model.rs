//! Model structs for chain records, pinned profile blobs and feed entries.

use std::fmt;
use std::str::FromStr;

use serde_with::{serde_as, DeserializeFromStr, SerializeDisplay};

/// A 20-byte chain account identifier. Displayed as lowercase `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Address(pub [u8; 20]);
impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| format!("Address `{}` must start with `0x`.", s))?;
        let mut bytes = [0; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| format!("Address `{}` is not 20 hex bytes: {}", s, e))?;
        Ok(Self(bytes))
    }
}
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Card identifier, assigned by the card contract at mint time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u64);
impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Content-addressed storage key (an IPFS CID).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);
impl ContentHash {
    /// An empty pointer means no profile has been pinned for the account.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}
impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl From<&str> for ContentHash {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Where an account is in the registration flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RegistrationStatus {
    /// No registration activity.
    #[default]
    Unregistered,
    /// Profile pointer stored, awaiting the registrar.
    Waitlisted,
    /// Fully registered. Terminal.
    Registered,
}
impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unregistered => "unregistered",
            Self::Waitlisted => "waitlisted",
            Self::Registered => "registered",
        })
    }
}

/// Registration contract record for one account.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegistrationRecord {
    /// Registration status.
    pub status: RegistrationStatus,
    /// Pointer to the pinned [`ProfileBlob`]. Empty if none.
    pub content_hash: ContentHash,
    /// Sequence number assigned at registration.
    pub player_number: Option<u64>,
}

/// Off-chain profile JSON, as pinned by the registration form.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBlob {
    /// First name.
    pub name: String,
    /// Last name.
    pub last_name: String,
    /// Country name.
    pub nationality: String,
    /// `YYYY-MM-DD`.
    pub dob: String,
    /// Country code + number.
    pub phone: String,
    /// CID of the pinned selfie.
    pub selfie_hash: ContentHash,
}
impl ProfileBlob {
    /// `"{first} {last}"`, used as the join key against the points feed.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name.trim(), self.last_name.trim())
            .trim()
            .to_owned()
    }
}

/// A player's canonical profile: on-chain record merged with the pinned blob.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlayerProfile {
    /// Account (unique key into the registration contract).
    pub address: Address,
    /// First + last name.
    pub display_name: String,
    /// Country name.
    pub nationality: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// Country code + number.
    pub phone: String,
    /// CID of the pinned selfie.
    pub selfie_content_hash: ContentHash,
    /// Sequence number assigned at registration.
    pub player_number: Option<u64>,
    /// On-chain status.
    pub registration_status: RegistrationStatus,
}
impl PlayerProfile {
    /// Merge an on-chain record with its pinned blob.
    pub fn merge(address: Address, record: &RegistrationRecord, blob: ProfileBlob) -> Self {
        Self {
            address,
            display_name: blob.display_name(),
            nationality: blob.nationality,
            date_of_birth: blob.dob,
            phone: blob.phone,
            selfie_content_hash: blob.selfie_hash,
            player_number: record.player_number,
            registration_status: record.status,
        }
    }
}

/// Playing position printed on a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum Position {
    /// Goalkeeper.
    Goa,
    /// Defender.
    Def,
    /// Midfielder.
    Mid,
    /// Striker.
    Stk,
}
impl Position {
    /// All positions, in form order.
    pub const ALL: [Position; 4] = [Self::Goa, Self::Def, Self::Mid, Self::Stk];
}
impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GOA" => Ok(Self::Goa),
            "DEF" => Ok(Self::Def),
            "MID" => Ok(Self::Mid),
            "STK" => Ok(Self::Stk),
            other => Err(format!(
                "Unknown position `{}`, expected one of GOA, DEF, MID, STK.",
                other
            )),
        }
    }
}
impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Goa => "GOA",
            Self::Def => "DEF",
            Self::Mid => "MID",
            Self::Stk => "STK",
        })
    }
}

/// A minted player card.
///
/// `(league, season, team)` never changes after mint; only `fantasy_points` (reconciler) and
/// `sale_price` (owner) are mutable on chain.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CollectibleCard {
    /// PK ID.
    pub card_id: CardId,
    /// Owning account.
    pub owner_address: Address,
    /// Team name.
    pub team: String,
    /// Position.
    pub position: Position,
    /// League, e.g. `UPSL_Division_1`.
    pub league: String,
    /// Season, e.g. `2023_Spring`.
    pub season: String,
    /// Profile picture URL or CID.
    pub profile_picture: String,
    /// Current points counter.
    pub fantasy_points: u64,
    /// Only active cards receive point updates.
    pub is_active: bool,
    /// Asking price in wei, `None` if not for sale (stored as `0` on chain).
    #[serde_as(as = "Option<serde_with::DisplayFromStr>")]
    pub sale_price: Option<u128>,
}

/// One player's line in the points feed, as of the feed snapshot.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FantasyFeedEntry {
    /// Full player name (join key against [`PlayerProfile::display_name`]).
    pub player_name: String,
    /// League.
    pub league: String,
    /// Season.
    pub season: String,
    /// Team.
    pub team: String,
    /// Points total.
    pub fantasy_points: u64,
    /// Matchday the total was computed at, if the feed provides one.
    pub matchday_key: Option<String>,
}

/// A staged write: overwrite `card_id`'s points with `new_points`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct UpdateOp {
    /// Target card.
    pub card_id: CardId,
    /// Value to write (overwrite, not increment).
    pub new_points: u64,
}

/// Receipt of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionReceipt {
    /// Transaction hash (`0x`-hex).
    pub tx_hash: String,
    /// Block the transaction was mined in.
    pub block_number: u64,
    /// Gas used.
    pub gas_used: u64,
    /// `true` if execution succeeded.
    pub success: bool,
}

/// An uploaded file, e.g. the registration selfie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    /// Original file name.
    pub file_name: String,
    /// Raw content.
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_address_roundtrip_lowercases() {
        let addr: Address = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01".parse().unwrap();
        assert_eq!(
            "0xabcdef0123456789abcdef0123456789abcdef01",
            addr.to_string()
        );
        assert!("abcdef0123456789abcdef0123456789abcdef01"
            .parse::<Address>()
            .is_err());
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn test_profile_blob_json() {
        let blob: ProfileBlob = serde_json::from_str(
            r#"{"name":" Jane ","lastName":"Doe","nationality":"United States","dob":"1999-04-01","phone":"+1: +15550100","selfieHash":"QmSelfie"}"#,
        )
        .unwrap();
        assert_eq!("Jane Doe", blob.display_name());
        assert_eq!(ContentHash::from("QmSelfie"), blob.selfie_hash);
    }

    #[test]
    fn test_position_parse() {
        assert_eq!(Ok(Position::Stk), "STK".parse());
        assert!("stk".parse::<Position>().is_err());
        assert_eq!("\"GOA\"", serde_json::to_string(&Position::Goa).unwrap());
    }
}
