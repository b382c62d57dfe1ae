// src/oauth2.rs

use base64::{engine::general_purpose::STANDARD, Engine};
use eyre::{eyre, Result};
use log::{debug, info};
use secure_string::SecureString;
use serde::Deserialize;

pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Refresh-token credentials for Gmail's XOAUTH2 login. Secrets stay wrapped until sent.
#[derive(Debug, Clone)]
pub struct OAuth2Credentials {
    pub client_id: SecureString,
    pub client_secret: SecureString,
    pub refresh_token: SecureString,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Body Google sends with a 4xx, e.g. `{"error": "invalid_grant", ...}`.
#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuth2Credentials {
    /// Exchange the refresh token for a short-lived access token at `endpoint`.
    pub fn access_token(&self, endpoint: &str) -> Result<String> {
        info!("Requesting OAuth2 access token");

        let response = ureq::post(endpoint).send_form(&[
            ("client_id", self.client_id.unsecure()),
            ("client_secret", self.client_secret.unsecure()),
            ("refresh_token", self.refresh_token.unsecure()),
            ("grant_type", "refresh_token"),
        ]);

        let token: TokenResponse = match response {
            Ok(resp) => resp
                .into_json()
                .map_err(|e| eyre!("Unreadable OAuth2 token response: {}", e))?,
            Err(ureq::Error::Status(code, resp)) => {
                let detail = resp
                    .into_json::<TokenError>()
                    .map(describe_token_error)
                    .unwrap_or_else(|_| "no error body".to_string());
                return Err(eyre!("OAuth2 token request rejected ({}): {}", code, detail));
            }
            Err(e) => return Err(eyre!("OAuth2 token request failed: {}", e)),
        };

        debug!("Access token valid for {} seconds", token.expires_in);
        Ok(token.access_token)
    }

    /// Fetch an access token from Google and wrap it for `Client::authenticate`.
    pub fn authenticator(&self, email: &str) -> Result<XOAuth2Authenticator> {
        let token = self.access_token(GOOGLE_TOKEN_ENDPOINT)?;
        Ok(XOAuth2Authenticator::new(email, &token))
    }
}

fn describe_token_error(err: TokenError) -> String {
    match err.error_description {
        Some(desc) => format!("{}: {}", err.error, desc),
        None => err.error,
    }
}

/// base64("user=" + email + "\x01auth=Bearer " + token + "\x01\x01")
pub fn xoauth2_response(email: &str, access_token: &str) -> String {
    STANDARD.encode(format!("user={}\x01auth=Bearer {}\x01\x01", email, access_token))
}

pub struct XOAuth2Authenticator {
    response: String,
}

impl XOAuth2Authenticator {
    pub fn new(email: &str, access_token: &str) -> Self {
        Self {
            response: xoauth2_response(email, access_token),
        }
    }
}

impl imap::Authenticator for XOAuth2Authenticator {
    type Response = String;

    fn process(&self, _challenge: &[u8]) -> Self::Response {
        self.response.clone()
    }
}
