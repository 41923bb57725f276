use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use lettre::message::Mailbox;
use once_cell::sync::Lazy;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use zeroize::{Zeroize, Zeroizing};

pub static CONF: Lazy<Config> = Lazy::new(|| Config::from_env().expect("Failed to load config"));

const DB_USERNAME_VAR: &str = "BALLOT_DB_USERNAME";
const DB_PASSWORD_VAR: &str = "BALLOT_DB_PASSWORD";
const DB_HOSTNAME_VAR: &str = "BALLOT_DB_HOSTNAME";
const DB_PORT_VAR: &str = "BALLOT_DB_PORT";
const DB_NAME_VAR: &str = "BALLOT_DB_NAME";
const DB_MAX_CONNECTIONS_VAR: &str = "BALLOT_DB_MAX_CONNECTIONS";
const DB_IDLE_TIMEOUT_SECS_VAR: &str = "BALLOT_DB_IDLE_TIMEOUT_SECS";

const HASHING_KEY_VAR: &str = "BALLOT_HASHING_KEY_B64";

const EMAIL_ENABLED_VAR: &str = "BALLOT_EMAIL_ENABLED";
const EMAIL_FROM_ADDR_VAR: &str = "BALLOT_EMAIL_FROM_ADDR";
const EMAIL_REPLY_TO_ADDR_VAR: &str = "BALLOT_EMAIL_REPLY_TO_ADDR";
const SMTP_ADDRESS_VAR: &str = "BALLOT_SMTP_ADDRESS";
const SMTP_USERNAME_VAR: &str = "BALLOT_SMTP_USERNAME";
const SMTP_KEY_VAR: &str = "BALLOT_SMTP_KEY";
const SMTP_FALLBACK_ADDRESS_VAR: &str = "BALLOT_SMTP_FALLBACK_ADDRESS";
const SMTP_FALLBACK_USERNAME_VAR: &str = "BALLOT_SMTP_FALLBACK_USERNAME";
const SMTP_FALLBACK_KEY_VAR: &str = "BALLOT_SMTP_FALLBACK_KEY";
const MAX_SMTP_CONNECTIONS_VAR: &str = "BALLOT_MAX_SMTP_CONNECTIONS";
const SMTP_IDLE_TIMEOUT_SECS_VAR: &str = "BALLOT_SMTP_IDLE_TIMEOUT_SECS";

const GATEWAY_ENABLED_VAR: &str = "BALLOT_GATEWAY_ENABLED";
const GATEWAY_BASE_URL_VAR: &str = "BALLOT_GATEWAY_BASE_URL";
const GATEWAY_SECRET_KEY_VAR: &str = "BALLOT_GATEWAY_SECRET_KEY";
const GATEWAY_CALLBACK_URL_VAR: &str = "BALLOT_GATEWAY_CALLBACK_URL";
const GATEWAY_TIMEOUT_SECS_VAR: &str = "BALLOT_GATEWAY_TIMEOUT_SECS";

const VOTE_UNIT_PRICE_VAR: &str = "BALLOT_VOTE_UNIT_PRICE";

const OTP_LIFETIME_MINS_VAR: &str = "BALLOT_OTP_LIFETIME_MINS";
const OTP_MAX_ATTEMPTS_VAR: &str = "BALLOT_OTP_MAX_ATTEMPTS";
const SESSION_LIFETIME_HOURS_VAR: &str = "BALLOT_SESSION_LIFETIME_HOURS";

const PRODUCTION_VAR: &str = "BALLOT_PRODUCTION";
const ACTIX_WORKER_COUNT_VAR: &str = "BALLOT_ACTIX_WORKER_COUNT";
const LOG_LEVEL_VAR: &str = "BALLOT_LOG_LEVEL";

const HASHING_KEY_SIZE: usize = 32;

#[derive(Zeroize)]
pub struct ConfigInner {
    pub db_username: String,
    pub db_password: String,
    pub db_hostname: String,
    pub db_port: u16,
    pub db_name: String,
    #[zeroize(skip)]
    pub db_max_connections: u32,
    #[zeroize(skip)]
    pub db_idle_timeout: Duration,

    pub hashing_key: [u8; HASHING_KEY_SIZE],

    #[zeroize(skip)]
    pub email_enabled: bool,
    #[zeroize(skip)]
    pub email_from_address: Mailbox,
    #[zeroize(skip)]
    pub email_reply_to_address: Mailbox,
    pub smtp_address: String,
    pub smtp_username: String,
    pub smtp_key: String,
    pub smtp_fallback_address: Option<String>,
    pub smtp_fallback_username: Option<String>,
    pub smtp_fallback_key: Option<String>,
    #[zeroize(skip)]
    pub max_smtp_connections: u32,
    #[zeroize(skip)]
    pub smtp_idle_timeout: Duration,

    #[zeroize(skip)]
    pub gateway_enabled: bool,
    #[zeroize(skip)]
    pub gateway_base_url: String,
    pub gateway_secret_key: String,
    #[zeroize(skip)]
    pub gateway_callback_url: Option<String>,
    #[zeroize(skip)]
    pub gateway_timeout: Duration,

    #[zeroize(skip)]
    pub vote_unit_price: i64,

    #[zeroize(skip)]
    pub otp_lifetime: Duration,
    #[zeroize(skip)]
    pub otp_max_attempts: i16,
    #[zeroize(skip)]
    pub session_lifetime: Duration,

    #[zeroize(skip)]
    pub production: bool,
    #[zeroize(skip)]
    pub actix_worker_count: usize,
    #[zeroize(skip)]
    pub log_level: String,
}

pub struct Config {
    inner: UnsafeCell<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        // Safe as long as `unsafe Config::zeroize()` hasn't been called
        unsafe { &*self.inner.get() }
    }
}

// Safe to be shared across threads as long as `unsafe Config::zeroize()` hasn't been called
unsafe impl Sync for Config {}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let hashing_key = Zeroizing::new(
            b64.decode(env_var::<String>(HASHING_KEY_VAR)?.as_bytes())
                .map_err(|_| ConfigError::InvalidVar(HASHING_KEY_VAR))?,
        );
        let hashing_key = hashing_key[..]
            .try_into()
            .map_err(|_| ConfigError::InvalidVar(HASHING_KEY_VAR))?;

        let email_from_address: Mailbox = env_var::<String>(EMAIL_FROM_ADDR_VAR)?
            .parse()
            .map_err(|_| ConfigError::InvalidVar(EMAIL_FROM_ADDR_VAR))?;
        let email_reply_to_address: Mailbox = env_var::<String>(EMAIL_REPLY_TO_ADDR_VAR)?
            .parse()
            .map_err(|_| ConfigError::InvalidVar(EMAIL_REPLY_TO_ADDR_VAR))?;

        let otp_max_attempts = env_var_or(OTP_MAX_ATTEMPTS_VAR, 3);

        if otp_max_attempts < 1 {
            return Err(ConfigError::InvalidVar(OTP_MAX_ATTEMPTS_VAR));
        }

        let vote_unit_price = env_var::<i64>(VOTE_UNIT_PRICE_VAR)?;

        if vote_unit_price < 1 {
            return Err(ConfigError::InvalidVar(VOTE_UNIT_PRICE_VAR));
        }

        let inner = ConfigInner {
            db_username: env_var(DB_USERNAME_VAR)?,
            db_password: env_var(DB_PASSWORD_VAR)?,
            db_hostname: env_var(DB_HOSTNAME_VAR)?,
            db_port: env_var(DB_PORT_VAR)?,
            db_name: env_var(DB_NAME_VAR)?,
            db_max_connections: env_var_or(DB_MAX_CONNECTIONS_VAR, 48),
            db_idle_timeout: Duration::from_secs(env_var_or(DB_IDLE_TIMEOUT_SECS_VAR, 30)),

            hashing_key,

            email_enabled: env_var_or(EMAIL_ENABLED_VAR, false),
            email_from_address,
            email_reply_to_address,
            smtp_address: env_var(SMTP_ADDRESS_VAR)?,
            smtp_username: env_var(SMTP_USERNAME_VAR)?,
            smtp_key: env_var(SMTP_KEY_VAR)?,
            smtp_fallback_address: env_var_opt(SMTP_FALLBACK_ADDRESS_VAR),
            smtp_fallback_username: env_var_opt(SMTP_FALLBACK_USERNAME_VAR),
            smtp_fallback_key: env_var_opt(SMTP_FALLBACK_KEY_VAR),
            max_smtp_connections: env_var_or(MAX_SMTP_CONNECTIONS_VAR, 24),
            smtp_idle_timeout: Duration::from_secs(env_var_or(SMTP_IDLE_TIMEOUT_SECS_VAR, 60)),

            gateway_enabled: env_var_or(GATEWAY_ENABLED_VAR, true),
            gateway_base_url: env_var_or(
                GATEWAY_BASE_URL_VAR,
                String::from("https://api.paystack.co"),
            ),
            gateway_secret_key: env_var(GATEWAY_SECRET_KEY_VAR)?,
            gateway_callback_url: env_var_opt(GATEWAY_CALLBACK_URL_VAR),
            gateway_timeout: Duration::from_secs(env_var_or(GATEWAY_TIMEOUT_SECS_VAR, 20)),

            vote_unit_price,

            otp_lifetime: Duration::from_secs(env_var_or(OTP_LIFETIME_MINS_VAR, 5) * 60),
            otp_max_attempts,
            session_lifetime: Duration::from_secs(
                env_var_or(SESSION_LIFETIME_HOURS_VAR, 12) * 3600,
            ),

            production: env_var_or(PRODUCTION_VAR, true),
            actix_worker_count: env_var_or(ACTIX_WORKER_COUNT_VAR, num_cpus::get()),
            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info")),
        };

        Ok(Config {
            inner: UnsafeCell::new(inner),
        })
    }

    /// # Safety
    ///
    /// Safe only if the Config isn't being used by other threads or across an async
    /// boundary. Generally, this should only be used at the end of the main function once
    /// all threads have been joined.
    pub unsafe fn zeroize(&self) {
        unsafe {
            (*self.inner.get()).zeroize();
        }
    }
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = std::env::var(key).map_err(|_| ConfigError::MissingVar(key))?;
    let var: T = var.parse().map_err(|_| ConfigError::InvalidVar(key))?;
    Ok(var)
}

fn env_var_or<T: FromStr>(key: &'static str, default: T) -> T {
    let Ok(var) = std::env::var(key) else {
        return default;
    };

    var.parse().unwrap_or(default)
}

fn env_var_opt(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[derive(Clone, Copy, Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(key) => write!(f, "Missing environment variable '{}'", key),
            Self::InvalidVar(key) => write!(f, "Environment variable '{}' is invalid", key),
        }
    }
}
