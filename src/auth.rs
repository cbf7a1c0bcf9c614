use actix_web::{dev::Payload, http::header::HeaderValue, web, FromRequest, HttpRequest};
use chrono::{DateTime, Duration, Utc};
use futures::future::{ready, Ready};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::num::ParseIntError;

use crate::routes::ServerError;

type HmacSha256 = Hmac<Sha256>;

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// A trusted client holding the service token (e.g. a chat bot).
    Service,
    /// A user signed in through the Telegram login widget.
    User(String),
}

impl Identity {
    /// `None` for the service, which may see every group.
    pub fn owner(&self) -> Option<&str> {
        match self {
            Identity::Service => None,
            Identity::User(user) => Some(user),
        }
    }

    pub fn can_access(&self, owner: Option<&str>) -> bool {
        match self {
            Identity::Service => true,
            Identity::User(user) => owner == Some(user.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub bot_token: String,
    pub max_age: Duration,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TelegramAuthData {
    pub auth_date: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub id: String,
    pub photo_url: Option<String>,
    pub username: String,
    pub hash: String,
}

impl FromRequest for Identity {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(identify(req))
    }
}

fn identify(request: &HttpRequest) -> Result<Identity, ServerError> {
    let settings = request
        .app_data::<web::Data<AuthSettings>>()
        .ok_or_else(|| ServerError::Internal("authentication is not configured".to_string()))?;
    let authorization = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)
        .and_then(Result::ok)
        .ok_or(ServerError::Unauthorized)?;
    check_authorization(authorization, settings, Utc::now()).ok_or(ServerError::Unauthorized)
}

/// Resolves an `Authorization` header value into an [`Identity`].
pub fn check_authorization(
    authorization: &str,
    settings: &AuthSettings,
    now: DateTime<Utc>,
) -> Option<Identity> {
    if authorization == settings.bot_token {
        return Some(Identity::Service);
    }
    let auth_data: TelegramAuthData = serde_json::from_str(authorization).ok()?;

    let auth_date = auth_data.auth_date.parse::<i64>().ok()?;
    let issued = DateTime::<Utc>::from_timestamp(auth_date, 0)?;
    if now - issued > settings.max_age {
        tracing::debug!("rejecting stale login for {}", auth_data.username);
        return None;
    }

    let hash = parse_hex(&auth_data.hash)?;
    let mac = login_mac(&auth_data, &settings.bot_token)?;
    if mac.verify_slice(&hash).is_ok() {
        Some(Identity::User(auth_data.username))
    } else {
        tracing::debug!("rejecting login with a bad hash for {}", auth_data.username);
        None
    }
}

fn parse_hex(hash: &str) -> Option<Vec<u8>> {
    if hash.len() % 2 != 0 {
        return None;
    }
    hash.chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|n| u8::from_str_radix(&String::from_iter(n), 16))
        .collect::<Result<Vec<u8>, ParseIntError>>()
        .ok()
}

/// HMAC-SHA256 of the login fields as Telegram signs them: sorted
/// `key=value` lines keyed with SHA-256 of the bot token.
pub fn compute_hash(auth_data: &TelegramAuthData, bot_token: &str) -> Option<Vec<u8>> {
    Some(login_mac(auth_data, bot_token)?.finalize().into_bytes().to_vec())
}

fn login_mac(auth_data: &TelegramAuthData, bot_token: &str) -> Option<HmacSha256> {
    let hash_content = [
        ("auth_date", Some(&auth_data.auth_date)),
        ("first_name", auth_data.first_name.as_ref()),
        ("id", Some(&auth_data.id)),
        ("last_name", auth_data.last_name.as_ref()),
        ("photo_url", auth_data.photo_url.as_ref()),
        ("username", Some(&auth_data.username)),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|value| format!("{key}={value}")))
    .collect::<Vec<_>>()
    .join("\n");

    let bot_hash = Sha256::digest(bot_token.as_bytes());
    let mut hmac_hasher = HmacSha256::new_from_slice(&bot_hash).ok()?;
    hmac_hasher.update(hash_content.as_bytes());
    Some(hmac_hasher)
}
