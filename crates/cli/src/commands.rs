//! CLI commands

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::Subcommand;
use salon_client::{ApiClient, ApiRequest, Method, PermissionSet, decode_claims};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use crate::config::{self, Overrides};

#[derive(Subcommand)]
pub enum Commands {
    /// Configuration file operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    #[command(flatten)]
    Api(ApiCommands),
}

/// Commands that talk to the API
#[derive(Subcommand)]
pub enum ApiCommands {
    /// Log in and store the access token
    Login {
        #[arg(long)]
        email: String,

        /// Password; read from SALON_PASSWORD when omitted
        #[arg(long, env = "SALON_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored access token, role and cookies
    Logout,

    /// Show role, permissions and expiry of the stored token
    Whoami,

    /// Renew the stored access token
    Refresh,

    /// Send an authenticated request and print the JSON response
    Request {
        /// HTTP method, e.g. GET or post
        method: String,

        /// Path relative to the base URL
        path: String,

        /// JSON request body
        #[arg(long)]
        data: Option<String>,

        /// Query parameter as KEY=VALUE; repeatable
        #[arg(short = 'q', long = "query")]
        query: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with every default spelled out
    Init {
        /// Output file path
        #[arg(default_value = "salon.json")]
        output: PathBuf,
    },

    /// Print the effective configuration
    Show,
}

impl ApiCommands {
    pub async fn execute(self, client: &ApiClient) -> Result<()> {
        match self {
            Self::Login { email, password } => {
                let response = client.auth().login(&email, &password).await?;
                println!("Logged in as {email}");
                if let Some(role) = response.role {
                    println!("Role: {role}");
                }
            }
            Self::Logout => {
                client.auth().logout()?;
                println!("Logged out");
            }
            Self::Whoami => whoami(client)?,
            Self::Refresh => {
                client.refresh_token().await?;
                println!("Access token refreshed");
            }
            Self::Request {
                method,
                path,
                data,
                query,
            } => {
                let request = build_request(&method, path, data.as_deref(), &query)?;
                info!(method = %request.method, path = %request.path, "Sending request");
                let body: Value = client.execute(request).await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        }
        Ok(())
    }
}

impl ConfigCommands {
    pub fn execute(&self, overrides: &Overrides) -> Result<()> {
        match self {
            Self::Init { output } => {
                if output.exists() {
                    bail!("{} already exists", output.display());
                }
                config::generate_default_config(output)?;
                println!("Wrote {}", output.display());
            }
            Self::Show => {
                let config = config::load_config(overrides)?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        Ok(())
    }
}

fn whoami(client: &ApiClient) -> Result<()> {
    let token = client
        .token_store()
        .access_token()
        .ok_or_else(|| anyhow!("Not logged in"))?;
    let claims = decode_claims(&token).context("decoding stored token")?;
    let permissions = PermissionSet::from_claims(&claims);

    println!("Subject: {}", claims.sub.as_deref().unwrap_or("-"));
    println!(
        "Role: {}",
        permissions
            .role()
            .map(str::to_string)
            .or_else(|| client.token_store().role())
            .unwrap_or_else(|| "-".to_string())
    );

    let codes: Vec<&str> = permissions.codes().collect();
    if codes.is_empty() {
        println!("Permissions: -");
    } else {
        println!("Permissions: {}", codes.join(", "));
    }

    match claims.expires_at() {
        Some(at) if claims.is_expired(Utc::now()) => println!("Expires: {at} (expired)"),
        Some(at) => println!("Expires: {at}"),
        None => println!("Expires: never"),
    }
    Ok(())
}

fn build_request(
    method: &str,
    path: String,
    data: Option<&str>,
    query: &[String],
) -> Result<ApiRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{method}'"))?;
    let mut request = ApiRequest::new(method, path);

    for pair in query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("query parameter '{pair}' is not KEY=VALUE"))?;
        request = request.query(key, value);
    }

    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.json_value(body);
    }

    Ok(request)
}
