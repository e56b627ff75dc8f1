//! Verification of Telegram Web App `initData` credentials.
//!
//! The panel sends the raw `initData` query string in the `X-Init-Data`
//! header. Telegram signs it as follows: every field except `hash` is
//! rendered as `key=value`, sorted by key and joined with `\n`; the result
//! is HMAC-SHA256'd with a secret key that is itself
//! `HMAC-SHA256(key = "WebAppData", msg = bot_token)`.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";
const DEFAULT_MODERATOR_NAME: &str = "Moderator";

/// A roster member resolved from verified credentials. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Moderator {
    pub id: i64,
    pub name: String,
}

/// Why a credential was refused. Callers only ever see "unauthorized"; the
/// distinction is kept for logs and tests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthRejection {
    #[error("no credential supplied")]
    Missing,
    #[error("credential has no hash field")]
    MissingHash,
    #[error("hash field is not hex")]
    MalformedHash,
    #[error("signature mismatch")]
    BadSignature,
    #[error("user field missing or unparsable")]
    BadUser,
    #[error("user {0} is not on the moderator roster")]
    NotModerator(i64),
}

#[derive(Debug, Deserialize)]
struct WebAppUser {
    id: i64,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

pub struct InitDataVerifier {
    secret_key: Vec<u8>,
    roster: HashSet<i64>,
}

impl fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitDataVerifier")
            .field("roster", &self.roster)
            .finish_non_exhaustive()
    }
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length")
}

fn derive_secret_key(bot_token: &str) -> Vec<u8> {
    let mut mac = new_mac(WEB_APP_DATA_KEY);
    mac.update(bot_token.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

impl InitDataVerifier {
    pub fn new(bot_token: &str, roster: impl IntoIterator<Item = i64>) -> Self {
        Self {
            secret_key: derive_secret_key(bot_token),
            roster: roster.into_iter().collect(),
        }
    }

    pub fn is_moderator(&self, user_id: i64) -> bool {
        self.roster.contains(&user_id)
    }

    /// Check the signature and roster membership of a raw `initData` string.
    pub fn verify(&self, init_data: &str) -> Result<Moderator, AuthRejection> {
        if init_data.trim().is_empty() {
            return Err(AuthRejection::Missing);
        }
        let mut fields: BTreeMap<String, String> = form_urlencoded::parse(init_data.as_bytes())
            .into_owned()
            .collect();
        let hash = fields.remove("hash").ok_or(AuthRejection::MissingHash)?;
        let supplied = hex::decode(hash.trim()).map_err(|_| AuthRejection::MalformedHash)?;

        let mut mac = new_mac(&self.secret_key);
        mac.update(data_check_string(&fields).as_bytes());
        // verify_slice compares in constant time
        mac.verify_slice(&supplied)
            .map_err(|_| AuthRejection::BadSignature)?;

        let user: WebAppUser = fields
            .get("user")
            .and_then(|raw| serde_json::from_str(raw).ok())
            .ok_or(AuthRejection::BadUser)?;
        if !self.is_moderator(user.id) {
            return Err(AuthRejection::NotModerator(user.id));
        }

        let name = user
            .first_name
            .filter(|n| !n.trim().is_empty())
            .or(user.username)
            .unwrap_or_else(|| DEFAULT_MODERATOR_NAME.to_string());
        Ok(Moderator { id: user.id, name })
    }

    /// Boundary form of [`verify`](Self::verify): never fails, logs the reason.
    pub fn authenticate(&self, init_data: Option<&str>) -> Option<Moderator> {
        match self.verify(init_data.unwrap_or_default()) {
            Ok(moderator) => Some(moderator),
            Err(AuthRejection::Missing) => {
                debug!("request without credentials");
                None
            }
            Err(AuthRejection::NotModerator(user_id)) => {
                warn!(user_id, "valid credentials for a user outside the roster");
                None
            }
            Err(reason) => {
                warn!(%reason, "rejected panel credentials");
                None
            }
        }
    }
}

/// Hex signature Telegram would attach to `fields` for this bot token.
pub fn compute_hash(bot_token: &str, fields: &[(&str, &str)]) -> String {
    let sorted: BTreeMap<String, String> = fields
        .iter()
        .filter(|(k, _)| *k != "hash")
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut mac = new_mac(&derive_secret_key(bot_token));
    mac.update(data_check_string(&sorted).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Build a signed `initData` query string, as the Telegram client would.
pub fn sign_init_data(bot_token: &str, fields: &[(&str, &str)]) -> String {
    let hash = compute_hash(bot_token, fields);
    let mut ser = form_urlencoded::Serializer::new(String::new());
    for (k, v) in fields {
        ser.append_pair(k, v);
    }
    ser.append_pair("hash", &hash);
    ser.finish()
}
