use crate::error::StoreError;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use rsa::{
    RsaPrivateKey,
    pkcs1v15::SigningKey,
    pkcs8::DecodePrivateKey,
    signature::{SignatureEncoding, Signer},
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::Mutex;

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// Google service-account credentials exchanged for short-lived bearer tokens.
pub struct ServiceAccount {
    client_email: String,
    token_uri: String,
    key: SigningKey<Sha256>,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

impl ServiceAccount {
    /// `private_key` may carry literal `\n` sequences as found in env vars.
    pub fn new(client_email: &str, private_key: &str, token_uri: &str) -> Result<Self, StoreError> {
        let pem = private_key.replace("\\n", "\n");
        let key = RsaPrivateKey::from_pkcs8_pem(pem.trim())
            .map_err(|err| StoreError::Auth(format!("invalid private key: {err}")))?;
        Ok(Self {
            client_email: client_email.to_string(),
            token_uri: token_uri.to_string(),
            key: SigningKey::<Sha256>::new(key),
            cached: Mutex::new(None),
        })
    }

    pub async fn access_token(&self, client: &Client) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - TimeDelta::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.assertion(now)?;
        let response = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("token endpoint returned {status}: {body}")));
        }
        let token: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = token.expires_in, "obtained firestore access token");

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + TimeDelta::seconds(token.expires_in),
        });
        Ok(token.access_token)
    }

    /// Signed RS256 JWT asserting this account for the datastore scope.
    fn assertion(&self, now: DateTime<Utc>) -> Result<String, StoreError> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let claims = Claims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header}.{claims}");
        let signature = self.key.sign(signing_input.as_bytes());
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}
