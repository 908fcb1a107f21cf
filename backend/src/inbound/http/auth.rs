//! Request authentication.
//!
//! Credentials arrive either as an `Authorization: Basic` header or as a
//! `token` query parameter carrying the same Base64-encoded pair. The
//! password is verified against its stored SHA-512 digest. Routes that must
//! stay open (registration, activation, password reset, preflight) simply
//! do not take the extractor.

use actix_web::dev::Payload;
use actix_web::error::ErrorUnauthorized;
use actix_web::{web, Error, FromRequest, HttpRequest};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::future::LocalBoxFuture;
use sha2::{Digest, Sha512};
use tracing::warn;

use crate::domain::record::{Record, Rid};

use super::state::AppState;

/// Hex-encoded SHA-512 digest used for stored passwords.
pub fn hash_password(raw: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// The authenticated user record, resolved per request.
pub struct Authenticated {
    pub user: Record,
}

impl Authenticated {
    pub fn uid(&self) -> Option<Rid> {
        self.user.uid()
    }

    pub fn email(&self) -> Option<String> {
        self.user.text("email")
    }
}

fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_owned())
    })
}

/// Base64 credential pair from the header or the `token` parameter.
fn credentials(req: &HttpRequest) -> Option<(String, String)> {
    let encoded = match token_from_query(req.query_string()) {
        Some(token) => token,
        None => req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Basic ")?
            .to_owned(),
    };
    let decoded = BASE64.decode(encoded.as_bytes()).ok()?;
    let pair = String::from_utf8(decoded).ok()?;
    let (name, password) = pair.split_once(':')?;
    Some((name.to_owned(), password.to_owned()))
}

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let credentials = credentials(req);
        Box::pin(async move {
            let state = state.ok_or_else(|| ErrorUnauthorized("authentication unavailable"))?;
            let (name, password) =
                credentials.ok_or_else(|| ErrorUnauthorized("credentials required"))?;
            let digest = hash_password(&password);
            match state.store.authenticate(&name, &digest).await {
                Ok(Some(user)) => Ok(Self { user }),
                Ok(None) => Err(ErrorUnauthorized("invalid credentials")),
                Err(err) => {
                    warn!(error = %err, "credential check failed");
                    Err(ErrorUnauthorized("invalid credentials"))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_digest_is_hex_sha512() {
        let digest = hash_password("secret");
        assert_eq!(digest.len(), 128);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, hash_password("secret"));
        assert_ne!(digest, hash_password("Secret"));
    }

    #[test]
    fn token_parameter_is_found_among_others() {
        assert_eq!(
            token_from_query("limit=5&token=YWJjOmRlZg==&skip=0").as_deref(),
            Some("YWJjOmRlZg==")
        );
        assert!(token_from_query("limit=5").is_none());
        assert!(token_from_query("token=").is_none());
    }
}
