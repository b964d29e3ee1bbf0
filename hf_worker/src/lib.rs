#![warn(missing_docs)]

//! Cloudflare worker.

use futures::future::join_all;
use hodlerfc::feed::FeedFilter;
use hodlerfc::interface::ContentStore;
use hodlerfc::model::{Address, Upload};
use hodlerfc::registration::{mint_card, register_player, MintCardForm, RegistrationForm};
use hodlerfc::resolver::{IdentityResolver, NotFoundReason, Resolution};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use worker::{
    event, Context, Env, Error, FormData, FormEntry, MessageBatch, MessageExt, Request, Response,
    Result, RouteContext, Router, ScheduleContext, ScheduledEvent,
};

use crate::error::HfError;
use crate::init::{get_appstate, init_logging, AppState, BINDING_QUEUE_WEBJOB};
use crate::webjob::Task;

pub mod abi;
pub mod contracts;
pub mod db;
pub mod error;
pub mod eth;
pub mod feed;
pub mod init;
pub mod pinata;
pub mod signer;
pub mod webjob;
pub mod with;

/// Cloudflare queue handler.
#[event(queue)]
pub async fn queue(message_batch: MessageBatch<Task>, env: Env, _ctx: Context) -> Result<()> {
    init_logging(&env);

    let futures = message_batch.messages()?.into_iter().map(|msg| {
        log::info!("Handling webjob task: `{:?}`.", msg.body());
        webjob::handle(&env, msg)
    });
    let results = join_all(futures).await;
    let errors = results
        .into_iter()
        .filter_map(|result| result.map(|msg| msg.ack()).err())
        .collect::<Vec<_>>();

    log::info!("Handling webjob task complete. Errors: {:?}", errors);
    errors
        .is_empty()
        .then_some(())
        .ok_or(Error::RustError(format!("{:?}", errors)))
}

/// Cloudflare cron handler: queue a full reconciliation pass.
#[event(scheduled)]
pub async fn scheduled(event: ScheduledEvent, env: Env, _ctx: ScheduleContext) {
    init_logging(&env);

    log::info!("Cron `{}` triggered.", event.cron());
    if let Err(e) = enqueue(&env, Task::Reconcile(FeedFilter::default())).await {
        log::error!("Failed to queue reconciliation: {}", e);
    }
}

/// Cloudflare fetch request handler.
///
/// `POST` routes send transactions or pin content and require `Authorization: Bearer <API_TOKEN>`
/// when `API_TOKEN` is set. Deployments without it must be behind other access control.
#[event(fetch, respond_with_errors)]
pub async fn fetch(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    init_logging(&env);

    let router = Router::new();
    router
        .get("/", index_get)
        .get_async("/players/:address", player_get)
        .post_async("/players/:address/register", player_register_post)
        .post_async("/cards", cards_post)
        .get_async("/cards/fee", cards_fee_get)
        .post_async("/pin/json", pin_json_post)
        .post_async("/pin/file", pin_file_post)
        .post_async("/reconcile", reconcile_post)
        .run(req, env)
        .await
}

async fn enqueue(env: &Env, task: Task) -> Result<()> {
    env.queue(BINDING_QUEUE_WEBJOB)?.send(task).await
}

fn respond(result: std::result::Result<Response, HfError>) -> Result<Response> {
    result.or_else(HfError::into_response)
}

/// If the `Authorization` header carries the bearer `token`. No `token` allows everything.
pub fn authorized(token: Option<&SecretString>, authorization: Option<&str>) -> bool {
    let Some(token) = token else {
        return true;
    };
    let Some(given) = authorization.and_then(|value| value.strip_prefix("Bearer ")) else {
        return false;
    };
    let expected = token.expose_secret().as_bytes();
    let given = given.trim().as_bytes();
    expected.len() == given.len()
        && 0 == expected
            .iter()
            .zip(given)
            .fold(0, |diff, (a, b)| diff | (a ^ b))
}

fn require_token(req: &Request, state: AppState) -> std::result::Result<(), HfError> {
    let authorization = req.headers().get("Authorization")?;
    authorized(state.api_token.as_ref(), authorization.as_deref())
        .then_some(())
        .ok_or(HfError::Unauthorized)
}

fn address_param(ctx: &RouteContext<()>) -> std::result::Result<Address, HfError> {
    let address = ctx
        .param("address")
        .ok_or_else(|| HfError::BadRequest("Missing address.".to_owned()))?;
    address.parse().map_err(HfError::BadRequest)
}

fn form_field(form: &FormData, name: &str) -> std::result::Result<String, HfError> {
    match form.get(name) {
        Some(FormEntry::Field(value)) => Ok(value),
        _ => Err(HfError::BadRequest(format!("Missing form field `{}`.", name))),
    }
}

/// Read file field `name`. A missing file reads as an empty upload.
async fn form_file(form: &FormData, name: &str) -> Result<Upload> {
    match form.get(name) {
        Some(FormEntry::File(file)) => Ok(Upload {
            file_name: file.name(),
            bytes: file.bytes().await?,
        }),
        _ => Ok(Upload {
            file_name: name.to_owned(),
            bytes: Vec::new(),
        }),
    }
}

/// `GET /`
pub fn index_get(_req: Request, _ctx: RouteContext<()>) -> Result<Response> {
    Response::ok("Hodler FC registry worker.")
}

/// `GET /players/:address`
pub async fn player_get(_req: Request, ctx: RouteContext<()>) -> Result<Response> {
    async fn inner(ctx: &RouteContext<()>) -> std::result::Result<Response, HfError> {
        let state = get_appstate(&ctx.env)?;
        let address = address_param(ctx)?;
        let mut resolver = IdentityResolver::new(&state.contracts, &state.pinata);
        match resolver.resolve(&address).await? {
            Resolution::Found(profile) => Ok(Response::from_json(&profile)?),
            Resolution::NotFound(NotFoundReason::NoProfilePointer) => Err(HfError::NotFound(
                format!("No profile registered for {}.", address),
            )),
            Resolution::NotFound(NotFoundReason::ProfileUnavailable(e)) => Err(e.into()),
        }
    }
    respond(inner(&ctx).await)
}

/// `POST /players/:address/register`, multipart: [`RegistrationForm`] fields and a `selfie` file.
pub async fn player_register_post(mut req: Request, ctx: RouteContext<()>) -> Result<Response> {
    async fn inner(
        req: &mut Request,
        ctx: &RouteContext<()>,
    ) -> std::result::Result<Response, HfError> {
        let state = get_appstate(&ctx.env)?;
        require_token(req, state)?;
        let address = address_param(ctx)?;
        let form_data = req.form_data().await?;
        let form = RegistrationForm {
            first_name: form_field(&form_data, "firstName")?,
            last_name: form_field(&form_data, "lastName")?,
            nationality: form_field(&form_data, "nationality")?,
            date_of_birth: form_field(&form_data, "dateOfBirth")?,
            country_code: form_field(&form_data, "countryCode")?,
            phone_number: form_field(&form_data, "phoneNumber")?,
        };
        let selfie = form_file(&form_data, "selfie").await?;

        let registration = register_player(
            &state.contracts,
            &state.pinata,
            &state.contracts,
            &address,
            form,
            &selfie,
            &state.config.write_policy,
        )
        .await?;
        Ok(Response::from_json(&json!({
            "profileHash": registration.profile_hash,
            "selfieHash": registration.selfie_hash,
            "receipt": registration.receipt,
        }))?)
    }
    respond(inner(&mut req, &ctx).await)
}

/// `POST /cards` body.
#[derive(Debug, serde::Deserialize)]
pub struct MintCardBody {
    /// Minting account.
    pub account: Address,
    /// Card fields.
    #[serde(flatten)]
    pub form: MintCardForm,
}

/// `POST /cards`, JSON [`MintCardBody`].
pub async fn cards_post(mut req: Request, ctx: RouteContext<()>) -> Result<Response> {
    async fn inner(
        req: &mut Request,
        ctx: &RouteContext<()>,
    ) -> std::result::Result<Response, HfError> {
        let state = get_appstate(&ctx.env)?;
        require_token(req, state)?;
        let body: MintCardBody = req
            .json()
            .await
            .map_err(|e| HfError::BadRequest(format!("Invalid mint request: {}", e)))?;
        let receipt = mint_card(
            &state.contracts,
            &state.contracts,
            &body.account,
            body.form,
            &state.config.card_options,
            &state.config.write_policy,
        )
        .await?;
        Ok(Response::from_json(&receipt)?.with_status(201))
    }
    respond(inner(&mut req, &ctx).await)
}

/// `GET /cards/fee`: current price and the minting fee, see [`contracts::MintingPrice`].
pub async fn cards_fee_get(_req: Request, ctx: RouteContext<()>) -> Result<Response> {
    async fn inner(ctx: &RouteContext<()>) -> std::result::Result<Response, HfError> {
        let state = get_appstate(&ctx.env)?;
        let price = state
            .contracts
            .minting_price()
            .await
            .map_err(|e| HfError::Upstream(format!("Card contract pricing unavailable: {}", e)))?;
        Ok(Response::from_json(&price)?)
    }
    respond(inner(&ctx).await)
}

/// `POST /pin/json`, any JSON body.
pub async fn pin_json_post(mut req: Request, ctx: RouteContext<()>) -> Result<Response> {
    async fn inner(
        req: &mut Request,
        ctx: &RouteContext<()>,
    ) -> std::result::Result<Response, HfError> {
        let state = get_appstate(&ctx.env)?;
        require_token(req, state)?;
        let blob: serde_json::Value = req
            .json()
            .await
            .map_err(|e| HfError::BadRequest(format!("Body is not JSON: {}", e)))?;
        let content_hash =
            state
                .pinata
                .pin_blob(&blob)
                .await
                .map_err(|source| hodlerfc::Error::PinFailed {
                    what: "JSON blob".to_owned(),
                    source,
                })?;
        Ok(Response::from_json(&json!({ "contentHash": content_hash }))?)
    }
    respond(inner(&mut req, &ctx).await)
}

/// `POST /pin/file`, multipart with a `file` field.
pub async fn pin_file_post(mut req: Request, ctx: RouteContext<()>) -> Result<Response> {
    async fn inner(
        req: &mut Request,
        ctx: &RouteContext<()>,
    ) -> std::result::Result<Response, HfError> {
        let state = get_appstate(&ctx.env)?;
        require_token(req, state)?;
        let form_data = req.form_data().await?;
        let upload = form_file(&form_data, "file").await?;
        if upload.bytes.is_empty() {
            return Err(HfError::BadRequest("Missing or empty `file`.".to_owned()));
        }
        let content_hash = state.pinata.pin_file(&upload).await.map_err(|source| {
            hodlerfc::Error::PinFailed {
                what: format!("file `{}`", upload.file_name),
                source,
            }
        })?;
        Ok(Response::from_json(&json!({ "contentHash": content_hash }))?)
    }
    respond(inner(&mut req, &ctx).await)
}

/// `POST /reconcile`, optional JSON [`FeedFilter`] body. Queues a reconciliation pass.
pub async fn reconcile_post(mut req: Request, ctx: RouteContext<()>) -> Result<Response> {
    async fn inner(
        req: &mut Request,
        ctx: &RouteContext<()>,
    ) -> std::result::Result<Response, HfError> {
        require_token(req, get_appstate(&ctx.env)?)?;
        let body = req.text().await?;
        let filter = if body.trim().is_empty() {
            FeedFilter::default()
        } else {
            serde_json::from_str(&body)
                .map_err(|e| HfError::BadRequest(format!("Invalid feed filter: {}", e)))?
        };
        log::info!("Queueing reconciliation, filter: {:?}", filter);
        enqueue(&ctx.env, Task::Reconcile(filter)).await?;
        Ok(Response::ok("Reconciliation queued.")?.with_status(202))
    }
    respond(inner(&mut req, &ctx).await)
}
