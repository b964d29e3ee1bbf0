//! Player registration and card minting flows.

use chrono::{Datelike, NaiveDate};

use crate::config::{CardOptions, WritePolicy};
use crate::error::{Error, Result};
use crate::interface::{ChainReader, ChainWriter, ContentStore, MintRequest};
use crate::model::{Address, ContentHash, ProfileBlob, RegistrationStatus, TransactionReceipt, Upload};
use crate::pass::check_receipt;
use crate::resolver::account_status;

/// Registration form fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Country name.
    pub nationality: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// `+` and 1-3 digits.
    pub country_code: String,
    /// Digits; spaces and dashes are ignored.
    pub phone_number: String,
}
impl RegistrationForm {
    /// Validate and convert into the blob to pin.
    pub fn into_profile_blob(self, selfie_hash: ContentHash) -> Result<ProfileBlob> {
        let blob = self.validate()?;
        Ok(ProfileBlob {
            selfie_hash,
            ..blob
        })
    }

    fn validate(self) -> Result<ProfileBlob> {
        fn required(field: &'static str, value: String) -> Result<String> {
            let value = value.trim();
            (!value.is_empty())
                .then(|| value.to_owned())
                .ok_or_else(|| Error::invalid(field, "must not be empty"))
        }
        let name = required("firstName", self.first_name)?;
        let last_name = required("lastName", self.last_name)?;
        let nationality = required("nationality", self.nationality)?;
        let dob = self.date_of_birth.trim().to_owned();
        check_date(&dob).map_err(|reason| Error::invalid("dateOfBirth", reason))?;

        let country_code = self.country_code.trim();
        let code_digits = country_code
            .strip_prefix('+')
            .ok_or_else(|| Error::invalid("countryCode", "must start with `+`"))?;
        if !(1..=3).contains(&code_digits.len()) || !code_digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::invalid("countryCode", "expected `+` and 1-3 digits"));
        }
        let phone = self
            .phone_number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect::<String>();
        if phone.is_empty() || !phone.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid("phoneNumber", "expected digits"));
        }

        Ok(ProfileBlob {
            name,
            last_name,
            nationality,
            dob,
            phone: format!("{}{}", country_code, phone),
            selfie_hash: ContentHash::default(),
        })
    }
}

/// Earliest accepted birth year.
const MIN_BIRTH_YEAR: i32 = 1900;

/// Check a `YYYY-MM-DD` calendar date.
fn check_date(s: &str) -> Result<NaiveDate, String> {
    if s.len() != "YYYY-MM-DD".len() {
        return Err(format!("`{}` is not `YYYY-MM-DD`", s));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("`{}` is not a valid `YYYY-MM-DD` date: {}", s, e))?;
    if date.year() < MIN_BIRTH_YEAR {
        return Err(format!("`{}` is before {}", s, MIN_BIRTH_YEAR));
    }
    Ok(date)
}

/// Result of [`register_player`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// CID of the pinned profile blob (stored on chain).
    pub profile_hash: ContentHash,
    /// CID of the pinned selfie.
    pub selfie_hash: ContentHash,
    /// `registerPlayer` receipt.
    pub receipt: TransactionReceipt,
}

/// Pin the selfie and profile blob, then register `account` pointing at the blob.
///
/// Already-registered accounts are rejected. Waitlisted accounts may re-register.
pub async fn register_player<C, S, W>(
    chain: &C,
    store: &S,
    writer: &W,
    account: &Address,
    form: RegistrationForm,
    selfie: &Upload,
    policy: &WritePolicy,
) -> Result<Registration>
where
    C: ChainReader + ?Sized,
    S: ContentStore + ?Sized,
    W: ChainWriter + ?Sized,
{
    if selfie.bytes.is_empty() {
        return Err(Error::invalid("selfie", "please upload a selfie"));
    }
    // Validate before pinning anything.
    form.clone().validate()?;
    if account_status(chain, account).await? == RegistrationStatus::Registered {
        return Err(Error::invalid(
            "account",
            format!("{} is already registered", account),
        ));
    }

    let selfie_hash = store
        .pin_file(selfie)
        .await
        .map_err(|source| Error::PinFailed {
            what: format!("selfie `{}`", selfie.file_name),
            source,
        })?;
    let blob = form.into_profile_blob(selfie_hash.clone())?;
    let blob = serde_json::to_value(&blob).map_err(|e| Error::PinFailed {
        what: "profile".to_owned(),
        source: format!("Failed to serialize profile: {}", e).into(),
    })?;
    let profile_hash = store
        .pin_blob(&blob)
        .await
        .map_err(|source| Error::PinFailed {
            what: "profile".to_owned(),
            source,
        })?;
    log::info!(
        "Pinned profile {} (selfie {}) for {}.",
        profile_hash,
        selfie_hash,
        account
    );

    let what = format!("registerPlayer({})", profile_hash);
    let receipt = writer
        .register_player(account, &profile_hash, policy)
        .await
        .map_err(|source| Error::TransactionFailed {
            what: what.clone(),
            source,
        })
        .and_then(|receipt| check_receipt(what, receipt))?;
    log::info!("Registered {} in {}.", account, receipt.tx_hash);
    Ok(Registration {
        profile_hash,
        selfie_hash,
        receipt,
    })
}

/// Card mint form fields.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintCardForm {
    /// Team.
    pub team: String,
    /// `GOA`, `DEF`, `MID` or `STK`.
    pub position: String,
    /// League.
    pub league: String,
    /// Season.
    pub season: String,
    /// Profile picture URL or CID.
    #[serde(default)]
    pub profile_picture: String,
}
impl MintCardForm {
    /// Validate against the allowed `options`.
    pub fn validate(self, options: &CardOptions) -> Result<MintRequest> {
        fn one_of(field: &'static str, value: String, allowed: &[String]) -> Result<String> {
            if allowed.contains(&value) {
                Ok(value)
            } else {
                Err(Error::invalid(
                    field,
                    format!("`{}` is not one of {:?}", value, allowed),
                ))
            }
        }
        Ok(MintRequest {
            team: one_of("team", self.team, &options.teams)?,
            position: self
                .position
                .parse()
                .map_err(|reason| Error::invalid("position", reason))?,
            league: one_of("league", self.league, &options.leagues)?,
            season: one_of("season", self.season, &options.seasons)?,
            profile_picture: self.profile_picture.trim().to_owned(),
        })
    }
}

/// Mint a card for `account`, which must be registered. New cards start at 0 points.
pub async fn mint_card<C, W>(
    chain: &C,
    writer: &W,
    account: &Address,
    form: MintCardForm,
    options: &CardOptions,
    policy: &WritePolicy,
) -> Result<TransactionReceipt>
where
    C: ChainReader + ?Sized,
    W: ChainWriter + ?Sized,
{
    let request = form.validate(options)?;
    let status = account_status(chain, account).await?;
    if status != RegistrationStatus::Registered {
        return Err(Error::NotRegistered {
            address: *account,
            status,
        });
    }

    let what = format!(
        "mintCard({}, {}, {}, {})",
        request.team, request.position, request.league, request.season
    );
    let receipt = writer
        .mint_card(account, &request, policy)
        .await
        .map_err(|source| Error::TransactionFailed {
            what: what.clone(),
            source,
        })
        .and_then(|receipt| check_receipt(what, receipt))?;
    log::info!("Minted card for {} in {}.", account, receipt.tx_hash);
    Ok(receipt)
}

#[cfg(test)]
mod test {
    use futures::executor::block_on;

    use super::*;
    use crate::model::Position;
    use crate::testing::{addr, FakeChain, FakeStore, FakeWriter};

    fn form() -> RegistrationForm {
        RegistrationForm {
            first_name: " Jane ".to_owned(),
            last_name: "Doe".to_owned(),
            nationality: "United States".to_owned(),
            date_of_birth: "1999-04-01".to_owned(),
            country_code: "+1".to_owned(),
            phone_number: "555-010 0".to_owned(),
        }
    }

    fn selfie() -> Upload {
        Upload {
            file_name: "me.jpg".to_owned(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        }
    }

    #[test]
    fn test_form_validation() {
        let blob = form().into_profile_blob("QmS".into()).unwrap();
        assert_eq!("Jane", blob.name);
        assert_eq!("+15550100", blob.phone);
        assert_eq!(ContentHash::from("QmS"), blob.selfie_hash);

        let bad = |f: fn(&mut RegistrationForm)| {
            let mut form = form();
            f(&mut form);
            match form.into_profile_blob("QmS".into()).unwrap_err() {
                Error::InvalidInput { field, .. } => field,
                other => panic!("unexpected: {:?}", other),
            }
        };
        assert_eq!("lastName", bad(|f| f.last_name = "  ".to_owned()));
        assert_eq!("dateOfBirth", bad(|f| f.date_of_birth = "01/04/1999".to_owned()));
        assert_eq!("dateOfBirth", bad(|f| f.date_of_birth = "1999-13-01".to_owned()));
        assert_eq!("dateOfBirth", bad(|f| f.date_of_birth = "1999-02-31".to_owned()));
        assert_eq!("dateOfBirth", bad(|f| f.date_of_birth = "2023-04-31".to_owned()));
        assert_eq!("dateOfBirth", bad(|f| f.date_of_birth = "0000-01-01".to_owned()));
        assert_eq!("dateOfBirth", bad(|f| f.date_of_birth = "1999-4-1".to_owned()));
        assert_eq!("countryCode", bad(|f| f.country_code = "1".to_owned()));
        assert_eq!("countryCode", bad(|f| f.country_code = "+1234".to_owned()));
        assert_eq!("phoneNumber", bad(|f| f.phone_number = "call me".to_owned()));
    }

    #[test]
    fn test_check_date() {
        assert_eq!(NaiveDate::from_ymd_opt(2000, 2, 29), check_date("2000-02-29").ok());
        assert!(check_date("1900-02-29").is_err());
        assert!(check_date("1899-12-31").is_err());
    }

    #[test]
    fn test_register_player_pins_then_registers() {
        let chain = FakeChain::default();
        let store = FakeStore::default();
        let writer = FakeWriter::default();

        let registration = block_on(register_player(
            &chain,
            &store,
            &writer,
            &addr(1),
            form(),
            &selfie(),
            &WritePolicy::default(),
        ))
        .unwrap();
        assert_eq!(ContentHash::from("QmFile0"), registration.selfie_hash);
        assert_eq!(ContentHash::from("QmJson1"), registration.profile_hash);

        let pinned = store.pinned_blobs();
        assert_eq!(1, pinned.len());
        assert_eq!("QmFile0", pinned[0]["selfieHash"]);
        assert_eq!("Doe", pinned[0]["lastName"]);
        assert_eq!(
            vec![(addr(1), ContentHash::from("QmJson1"))],
            writer.registrations()
        );
    }

    #[test]
    fn test_register_player_rejects() {
        let chain = FakeChain::default().with_player(addr(1), "QmA", RegistrationStatus::Registered);
        let store = FakeStore::default();
        let writer = FakeWriter::default();
        let register = |account: Address, form: RegistrationForm, selfie: Upload| {
            block_on(register_player(
                &chain,
                &store,
                &writer,
                &account,
                form,
                &selfie,
                &WritePolicy::default(),
            ))
            .unwrap_err()
        };

        let empty = Upload {
            bytes: Vec::new(),
            ..selfie()
        };
        assert!(matches!(
            register(addr(2), form(), empty),
            Error::InvalidInput { field: "selfie", .. }
        ));
        assert!(matches!(
            register(addr(1), form(), selfie()),
            Error::InvalidInput { field: "account", .. }
        ));
        assert!(store.pinned_blobs().is_empty());
        assert!(writer.registrations().is_empty());
    }

    #[test]
    fn test_register_player_pin_failure() {
        let chain = FakeChain::default();
        let store = FakeStore::default().failing_pins();
        let writer = FakeWriter::default();
        let err = block_on(register_player(
            &chain,
            &store,
            &writer,
            &addr(1),
            form(),
            &selfie(),
            &WritePolicy::default(),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::PinFailed { .. }));
        assert!(err.to_string().contains("me.jpg"), "{}", err);
    }

    fn mint_form() -> MintCardForm {
        MintCardForm {
            team: "Hodler Miami FC".to_owned(),
            position: "MID".to_owned(),
            league: "USSL_Elite".to_owned(),
            season: "2023_Fall".to_owned(),
            profile_picture: " QmPic ".to_owned(),
        }
    }

    #[test]
    fn test_mint_card() {
        let chain = FakeChain::default().with_player(addr(1), "QmA", RegistrationStatus::Registered);
        let writer = FakeWriter::default();
        let receipt = block_on(mint_card(
            &chain,
            &writer,
            &addr(1),
            mint_form(),
            &CardOptions::default(),
            &WritePolicy::default(),
        ))
        .unwrap();
        assert!(receipt.success);

        let mints = writer.mints();
        assert_eq!(1, mints.len());
        assert_eq!(addr(1), mints[0].0);
        assert_eq!(Position::Mid, mints[0].1.position);
        assert_eq!("QmPic", mints[0].1.profile_picture);
    }

    #[test]
    fn test_mint_card_rejects() {
        let chain = FakeChain::default().with_player(addr(2), "QmB", RegistrationStatus::Waitlisted);
        let writer = FakeWriter::default();
        let mint = |account: Address, form: MintCardForm| {
            block_on(mint_card(
                &chain,
                &writer,
                &account,
                form,
                &CardOptions::default(),
                &WritePolicy::default(),
            ))
            .unwrap_err()
        };

        assert!(matches!(
            mint(addr(2), mint_form()),
            Error::NotRegistered {
                status: RegistrationStatus::Waitlisted,
                ..
            }
        ));
        let form = MintCardForm {
            league: "Premier League".to_owned(),
            ..mint_form()
        };
        assert!(matches!(
            mint(addr(2), form),
            Error::InvalidInput { field: "league", .. }
        ));
        let form = MintCardForm {
            position: "GK".to_owned(),
            ..mint_form()
        };
        assert!(matches!(
            mint(addr(2), form),
            Error::InvalidInput {
                field: "position",
                ..
            }
        ));
        assert!(writer.mints().is_empty());
    }
}
