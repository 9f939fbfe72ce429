//! Channel access token (v2.1) issuance
//!
//! Builds a client-assertion JWT signed with the channel's RSA private key and
//! exchanges it at the messaging platform's OAuth endpoint. One request, no
//! retry, no caching.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use carlot_types::ChannelToken;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_TOKEN_URL: &str = "https://api.line.me/oauth2/v2.1/token";
pub const DEFAULT_AUDIENCE: &str = "https://api.line.me/";

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Failed to read key file {}: {source}", .path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign assertion: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),

    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("Failed to decode token response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TokenError>;

/// Everything needed to request a channel access token
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub key_path: PathBuf,
    pub channel_id: String,
    pub jwt_ttl_minutes: i64,
    pub access_token_ttl_days: i64,
    pub endpoint: String,
    pub audience: String,
}

/// Claim set of the client assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub exp: i64,
    /// Requested access token lifetime in seconds
    pub token_exp: i64,
}

/// RSA private key ready for RS256, plus the key id to advertise in the header
#[derive(Clone)]
pub struct SigningKey {
    key: EncodingKey,
    kid: Option<String>,
}

impl SigningKey {
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

/// Private RSA key in JWK form
#[derive(Deserialize)]
struct RsaJwk {
    kty: String,
    n: String,
    e: String,
    d: String,
    p: Option<String>,
    q: Option<String>,
    kid: Option<String>,
}

pub async fn load_signing_key(path: &Path) -> Result<SigningKey> {
    let bytes = tokio::fs::read(path).await.map_err(|source| TokenError::KeyFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_signing_key(&bytes)
}

/// Accepts an RSA private JWK or a PEM encoded RSA private key.
pub fn parse_signing_key(bytes: &[u8]) -> Result<SigningKey> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| TokenError::InvalidKey("key file is not UTF-8".to_string()))?
        .trim();

    if text.starts_with('{') {
        let jwk: RsaJwk = serde_json::from_str(text)
            .map_err(|e| TokenError::InvalidKey(format!("malformed JWK: {}", e)))?;
        return signing_key_from_jwk(jwk);
    }

    if text.starts_with("-----BEGIN") {
        let key = EncodingKey::from_rsa_pem(text.as_bytes())
            .map_err(|e| TokenError::InvalidKey(format!("malformed PEM: {}", e)))?;
        return Ok(SigningKey { key, kid: None });
    }

    Err(TokenError::InvalidKey(
        "expected an RSA JWK or a PEM private key".to_string(),
    ))
}

fn signing_key_from_jwk(jwk: RsaJwk) -> Result<SigningKey> {
    if jwk.kty != "RSA" {
        return Err(TokenError::InvalidKey(format!(
            "unsupported key type: {}",
            jwk.kty
        )));
    }

    let mut primes = Vec::new();
    if let (Some(p), Some(q)) = (&jwk.p, &jwk.q) {
        primes.push(decode_uint("p", p)?);
        primes.push(decode_uint("q", q)?);
    }

    let private = RsaPrivateKey::from_components(
        decode_uint("n", &jwk.n)?,
        decode_uint("e", &jwk.e)?,
        decode_uint("d", &jwk.d)?,
        primes,
    )
    .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
    private
        .validate()
        .map_err(|e| TokenError::InvalidKey(e.to_string()))?;

    let der = private
        .to_pkcs1_der()
        .map_err(|e| TokenError::InvalidKey(e.to_string()))?;

    Ok(SigningKey {
        key: EncodingKey::from_rsa_der(der.as_bytes()),
        kid: jwk.kid,
    })
}

fn decode_uint(field: &str, value: &str) -> Result<BigUint> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| TokenError::InvalidKey(format!("JWK field {}: {}", field, e)))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// RS256-sign a claim set, carrying the key id when there is one.
pub fn sign_assertion(claims: &AssertionClaims, key: &SigningKey) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.kid.clone();
    Ok(encode(&header, claims, &key.key)?)
}

pub struct ChannelTokenService {
    http: reqwest::Client,
    settings: TokenSettings,
}

impl ChannelTokenService {
    pub fn new(settings: TokenSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub fn assertion_claims(&self, now: DateTime<Utc>) -> AssertionClaims {
        let exp = now + Duration::minutes(self.settings.jwt_ttl_minutes);

        AssertionClaims {
            iss: self.settings.channel_id.clone(),
            sub: self.settings.channel_id.clone(),
            aud: vec![self.settings.audience.clone()],
            exp: exp.timestamp(),
            token_exp: 60 * 60 * 24 * self.settings.access_token_ttl_days,
        }
    }

    /// Load the key file and produce a freshly signed client assertion.
    pub async fn build_assertion(&self) -> Result<String> {
        let key = load_signing_key(&self.settings.key_path).await?;
        let claims = self.assertion_claims(Utc::now());
        debug!(
            "Signing assertion: iss={}, exp={}, token_exp={}, kid={:?}",
            claims.iss,
            claims.exp,
            claims.token_exp,
            key.kid()
        );
        sign_assertion(&claims, &key)
    }

    pub async fn fetch_access_token(&self) -> Result<ChannelToken> {
        let assertion = self.build_assertion().await?;

        info!("Requesting channel access token from {}", self.settings.endpoint);

        let response = self
            .http
            .post(&self.settings.endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                ("client_assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TokenError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
