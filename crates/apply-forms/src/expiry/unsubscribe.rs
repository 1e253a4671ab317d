//! Signed, time-limited unsubscribe tokens for reminder emails.
//!
//! Verification is uniform: one operation returning claims or an error, with
//! an explicit action tag checked by the caller. A token with the wrong
//! action, a bad signature or an elapsed expiry fails closed: nothing is
//! deleted.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::applications::domain::ApplicationId;
use crate::applications::store::{EmailQueueStore, StoreError};

pub const UNSUBSCRIBE_ACTION: &str = "unsubscribe";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeClaims {
    pub application_id: String,
    pub action: String,
    pub exp: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
}

pub trait TokenSigner: Send + Sync {
    fn sign(
        &self,
        application_id: &ApplicationId,
        action: &str,
        ttl: Duration,
    ) -> Result<String, TokenError>;

    fn verify(&self, token: &str) -> Result<UnsubscribeClaims, TokenError>;
}

/// HS256 signer backed by a shared secret.
pub struct JwtTokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtTokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl TokenSigner for JwtTokenSigner {
    fn sign(
        &self,
        application_id: &ApplicationId,
        action: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = UnsubscribeClaims {
            application_id: application_id.to_string(),
            action: action.to_string(),
            exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    fn verify(&self, token: &str) -> Result<UnsubscribeClaims, TokenError> {
        decode::<UnsubscribeClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UnsubscribeError {
    #[error(transparent)]
    Token(TokenError),
    #[error("token action '{0}' is not an unsubscribe action")]
    WrongAction(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cancel future reminders for the application named by a valid unsubscribe
/// token. Returns how many queue entries were removed.
pub fn cancel_reminders(
    queue: &dyn EmailQueueStore,
    signer: &dyn TokenSigner,
    token: &str,
) -> Result<usize, UnsubscribeError> {
    let claims = signer.verify(token).map_err(UnsubscribeError::Token)?;
    if claims.action != UNSUBSCRIBE_ACTION {
        return Err(UnsubscribeError::WrongAction(claims.action));
    }
    let id = Uuid::parse_str(&claims.application_id)
        .map(ApplicationId)
        .map_err(|_| UnsubscribeError::Token(TokenError::Invalid))?;
    Ok(queue.delete_for_application(&id)?)
}
