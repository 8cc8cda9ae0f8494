//! User administration

use super::Envelope;
use crate::error::ClientError;
use crate::request::ApiRequest;
use crate::ApiClient;
use serde::{Deserialize, Serialize};
use serde_json::json;

const USERS_PATH: &str = "/api/v1/users";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

pub struct UserService<'a> {
    client: &'a ApiClient,
}

impl<'a> UserService<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<User>, ClientError> {
        let users: Envelope<Vec<User>> = self.client.get(USERS_PATH).await?;
        Ok(users.into_inner())
    }

    pub async fn get(&self, id: u64) -> Result<User, ClientError> {
        let user: Envelope<User> = self.client.get(&format!("{USERS_PATH}/{id}")).await?;
        Ok(user.into_inner())
    }

    /// Assign a new role; uses the longer admin timeout
    pub async fn update_role(&self, id: u64, role: &str) -> Result<User, ClientError> {
        if role.trim().is_empty() {
            return Err(ClientError::missing_field("role"));
        }

        let request = ApiRequest::put(format!("{USERS_PATH}/{id}/role"))
            .json_value(json!({ "role": role }))
            .timeout(self.client.config().admin_timeout());
        let user = self.client.execute::<Envelope<User>>(request).await?;
        Ok(user.into_inner())
    }
}
