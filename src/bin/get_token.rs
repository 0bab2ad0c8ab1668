// One-shot OAuth bootstrap for the proxy.
//
// The server authenticates with a long-lived refresh token (REFRESH_TOKEN);
// this tool is how you obtain one. It prints a Google consent URL, waits for
// you to paste the authorization code from the redirect, exchanges the code,
// and prints the refresh token.
//
// Run it once per credential:
//
//     CLIENT_ID=... CLIENT_SECRET=... cargo run --bin get-token

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context};
use serde::Deserialize;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000";

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/drive.file",
];

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    refresh_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let client_id = std::env::var("CLIENT_ID").context("CLIENT_ID must be set")?;
    let client_secret = std::env::var("CLIENT_SECRET").context("CLIENT_SECRET must be set")?;
    let redirect_uri =
        std::env::var("REDIRECT_URI").unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string());

    // access_type=offline + prompt=consent is what makes Google hand back a
    // refresh token instead of only a short-lived access token.
    let mut consent_url = reqwest::Url::parse(AUTH_URL).context("bad auth URL")?;
    consent_url
        .query_pairs_mut()
        .append_pair("client_id", &client_id)
        .append_pair("redirect_uri", &redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("scope", &SCOPES.join(" "));

    println!("Authorize this app by visiting this URL:\n\n{consent_url}\n");
    print!("Paste the code from the redirect URL here: ");
    io::stdout().flush()?;

    let mut code = String::new();
    io::stdin().lock().read_line(&mut code)?;
    let code = code.trim();
    if code.is_empty() {
        bail!("no authorization code provided");
    }

    let client = reqwest::Client::new();
    let response = client
        .post(TOKEN_URL)
        .form(&[
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .context("token exchange request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("token exchange failed ({status}): {body}");
    }

    let tokens: TokenExchangeResponse = response
        .json()
        .await
        .context("unexpected token endpoint response")?;

    let Some(refresh_token) = tokens.refresh_token else {
        bail!(
            "Google did not return a refresh token; revoke the app's access \
             at https://myaccount.google.com/permissions and run this again"
        );
    };

    println!("\n✅ Your refresh token is:\n\n{refresh_token}\n");
    println!("Set it as REFRESH_TOKEN in the server's environment.");
    Ok(())
}
