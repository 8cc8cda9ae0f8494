//! Login and logout

use super::Envelope;
use crate::access::role_from_token;
use crate::error::ClientError;
use crate::request::ApiRequest;
use crate::ApiClient;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub role: Option<String>,
}

pub struct AuthService<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthService<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Exchange credentials for an access token and persist it
    ///
    /// The role is taken from the response when present, otherwise decoded
    /// from the token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        if email.trim().is_empty() {
            return Err(ClientError::missing_field("email"));
        }
        if password.is_empty() {
            return Err(ClientError::missing_field("password"));
        }

        let request = ApiRequest::post(self.client.config().login_path.clone())
            .json(&Credentials {
                email: email.to_string(),
                password: password.to_string(),
            })?
            .without_refresh();
        let mut response = self
            .client
            .execute::<Envelope<LoginResponse>>(request)
            .await?
            .into_inner();

        let tokens = self.client.token_store();
        tokens.set_access_token(&response.token)?;
        if response.role.is_none() {
            response.role = role_from_token(&response.token);
        }
        if let Some(role) = &response.role {
            tokens.set_role(role)?;
        }

        info!(email, role = response.role.as_deref().unwrap_or("-"), "Logged in");
        Ok(response)
    }

    /// Forget the stored token, role and cookies
    pub fn logout(&self) -> Result<(), ClientError> {
        self.client.token_store().clear()?;
        self.client.cookies().clear()?;
        info!("Logged out");
        Ok(())
    }
}
