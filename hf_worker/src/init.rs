//! Logging and application state setup.

use std::str::FromStr;
use std::sync::{Once, OnceLock};

use hodlerfc::model::Address;
use hodlerfc::Config;
use reqwest::Client;
use secrecy::SecretString;
use url::Url;
use web_sys::console;
use worker::{console_error, console_log, Env, Error, Result};

use crate::contracts::Contracts;
use crate::eth::EthClient;
use crate::feed::HttpFeed;
use crate::pinata::PinataClient;
use crate::signer::LocalSigner;

/// D1 database binding.
pub const BINDING_D1_DB: &str = "BINDING_D1_DB";
/// Webjob queue binding.
pub const BINDING_QUEUE_WEBJOB: &str = "BINDING_QUEUE_WEBJOB";

/// Initialize [`log`] logging into Cloudflare's [`console`] logging system, if not already
/// initialized. The level is read from `LOG_LEVEL` (default `info`).
pub fn init_logging(env: &Env) {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        {
            fn hook(info: &std::panic::PanicInfo) {
                console_error!("{}", info);
            }
            std::panic::set_hook(Box::new(hook));
            console_log!("[panic hook set]");
        }
        {
            struct ConsoleLog;
            static LOG: ConsoleLog = ConsoleLog;
            impl log::Log for ConsoleLog {
                fn enabled(&self, metadata: &log::Metadata) -> bool {
                    metadata.level() <= log::max_level()
                }

                fn log(&self, record: &log::Record) {
                    if !self.enabled(record.metadata()) {
                        return;
                    }
                    let method = match record.level() {
                        log::Level::Error => console::error_1,
                        log::Level::Warn => console::warn_1,
                        log::Level::Info => console::info_1,
                        log::Level::Debug => console::debug_1,
                        log::Level::Trace => console::trace_1,
                    };
                    (method)(
                        &format!(
                            "[{} {}] {}",
                            record.level(),
                            record.module_path().unwrap_or("?"),
                            record.args()
                        )
                        .into(),
                    );
                }

                fn flush(&self) {}
            }
            let level = env
                .var("LOG_LEVEL")
                .ok()
                .map(|v| v.to_string())
                .and_then(|v| match log::LevelFilter::from_str(&v) {
                    Ok(level) => Some(level),
                    Err(_) => {
                        console_error!("Ignoring invalid `LOG_LEVEL`: {:?}", v);
                        None
                    }
                })
                .unwrap_or(log::LevelFilter::Info);
            if let Err(e) = log::set_logger(&LOG) {
                console_error!("Failed to set logger: {}", e);
                return;
            }
            log::set_max_level(level);

            log::info!("logger set, level: {}", level);
        }
    });
}

/// `AppState`. Static reference to [`AppStateOwned`].
pub type AppState = &'static AppStateOwned;
/// State for the application, built once per isolate from env vars and secrets.
pub struct AppStateOwned {
    /// Core configuration (`HODLER_CONFIG`, defaults otherwise).
    pub config: Config,
    /// Registration and card contracts.
    pub contracts: Contracts,
    /// Pinning service.
    pub pinata: PinataClient,
    /// Fantasy points feed.
    pub feed: HttpFeed,
    /// Bearer token required by the write endpoints (`API_TOKEN`). `None` leaves them open.
    pub api_token: Option<SecretString>,
}
impl AppStateOwned {
    /// Read everything from `env`.
    pub fn from_env(env: &Env) -> Result<Self> {
        let config = match env.var("HODLER_CONFIG") {
            Ok(json) => serde_json::from_str(&json.to_string())
                .map_err(|e| format!("Invalid `HODLER_CONFIG`: {}", e))?,
            Err(_) => Config::default(),
        };
        log::info!("Config: {:?}", config);

        let client = Client::new();
        let sender = envvar_parse::<Address>(env, "SENDER_ADDRESS")?;
        let mut eth = EthClient::new(client.clone(), envvar_parse(env, "WEB3_PROVIDER_URI")?);
        if let Ok(private_key) = secret(env, "PRIVATE_KEY") {
            let signer = LocalSigner::from_hex(&private_key)
                .map_err(|e| Error::RustError(format!("Invalid `PRIVATE_KEY`: {}", e)))?;
            if signer.address() != sender {
                return Err(Error::RustError(format!(
                    "`PRIVATE_KEY` is for {}, not `SENDER_ADDRESS` {}.",
                    signer.address(),
                    sender
                )));
            }
            log::info!("Signing transactions from {} locally.", sender);
            eth = eth.with_signer(signer);
        }
        let contracts = Contracts {
            eth,
            registration: envvar_parse::<Address>(env, "PLAYER_REGISTRATION_CONTRACT_ADDRESS")?,
            card: envvar_parse::<Address>(env, "PLAYER_CARD_CONTRACT_ADDRESS")?,
            sender,
        };
        let pinata = PinataClient {
            client: client.clone(),
            api_url: envvar_parse(env, "PINATA_API_URL")?,
            gateway_url: envvar_parse(env, "PINATA_GATEWAY_URL")?,
            api_key: secret(env, "PINATA_API_KEY")?,
            secret_api_key: secret(env, "PINATA_SECRET_API_KEY")?,
        };
        let feed = HttpFeed {
            client,
            url: envvar_parse::<Url>(env, "FANTASY_FEED_URL")?,
        };
        let api_token = secret(env, "API_TOKEN").ok();
        if api_token.is_none() {
            log::warn!("`API_TOKEN` not set, write endpoints are unauthenticated.");
        }
        Ok(Self {
            config,
            contracts,
            pinata,
            feed,
            api_token,
        })
    }
}

/// Get the AppState, initializing it if needed.
pub fn get_appstate(env: &Env) -> Result<AppState> {
    static STATE: OnceLock<AppStateOwned> = OnceLock::new();
    if let Some(state) = STATE.get() {
        return Ok(state);
    }
    let state = AppStateOwned::from_env(env)?;
    Ok(STATE.get_or_init(|| state))
}

/// Get an env var.
pub fn envvar(env: &Env, name: &str) -> Result<String> {
    env.var(name).map(|v| v.to_string())
}
/// Get and parse an env var.
pub fn envvar_parse<T>(env: &Env, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    envvar(env, name)?
        .parse()
        .map_err(|e| Error::RustError(format!("Invalid env var `{}`: {}", name, e)))
}
/// Get an env secret.
pub fn secret(env: &Env, name: &str) -> Result<SecretString> {
    env.secret(name).map(|v| v.to_string().into())
}
