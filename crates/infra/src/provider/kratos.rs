//! Ory Kratos REST client.
//!
//! Admin API (identity management) and public API (self-service login) are
//! separate base URLs, as in a typical Kratos deployment:
//!
//! | Operation | Request |
//! |---|---|
//! | create identity | `POST {admin}/admin/identities` |
//! | get identity | `GET {admin}/admin/identities/{id}` |
//! | update identity | `PUT {admin}/admin/identities/{id}` |
//! | create login flow | `GET {public}/self-service/login/api` |
//! | submit login flow | `POST {public}/self-service/login?flow={id}` |
//!
//! Any non-2xx response becomes [`ProviderError::Status`] carrying the status
//! code and (truncated) body.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use payd_auth::{IdentityState, Traits};
use payd_core::IdentityId;

use super::{IdentityProvider, LoginFlow, ProviderError, ProviderIdentity};

const SCHEMA_ID: &str = "default";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct KratosClient {
    http: reqwest::Client,
    admin_url: String,
    public_url: String,
}

impl KratosClient {
    pub fn new(admin_url: impl Into<String>, public_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), admin_url, public_url)
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, TLS roots).
    pub fn with_client(
        http: reqwest::Client,
        admin_url: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            admin_url: trim_base(admin_url.into()),
            public_url: trim_base(public_url.into()),
        }
    }

    fn admin(&self, path: &str) -> String {
        format!("{}{}", self.admin_url, path)
    }

    fn public(&self, path: &str) -> String {
        format!("{}{}", self.public_url, path)
    }
}

fn trim_base(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct IdentityBody<'a> {
    schema_id: &'static str,
    traits: Value,
    credentials: CredentialsBody<'a>,
    state: IdentityState,
}

#[derive(Debug, Serialize)]
struct CredentialsBody<'a> {
    password: PasswordCredentials<'a>,
}

#[derive(Debug, Serialize)]
struct PasswordCredentials<'a> {
    config: PasswordConfig<'a>,
}

#[derive(Debug, Serialize)]
struct PasswordConfig<'a> {
    password: &'a str,
}

impl<'a> IdentityBody<'a> {
    fn new(traits: &Traits, password: &'a str, state: IdentityState) -> Self {
        Self {
            schema_id: SCHEMA_ID,
            traits: traits.to_json(),
            credentials: CredentialsBody {
                password: PasswordCredentials {
                    config: PasswordConfig { password },
                },
            },
            state,
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    method: &'static str,
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    id: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    traits: Value,
}

#[derive(Debug, Deserialize)]
struct LoginFlowResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: SessionResponse,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    identity: Option<IdentityResponse>,
}

impl IdentityResponse {
    fn into_identity(self) -> Result<ProviderIdentity, ProviderError> {
        let id = self
            .id
            .parse::<IdentityId>()
            .map_err(|e| ProviderError::Payload(e.to_string()))?;
        // Kratos omits `state` on some endpoints; only an explicit "active" counts.
        let state = match self.state.as_deref() {
            Some("active") => IdentityState::Active,
            _ => IdentityState::Inactive,
        };
        Ok(ProviderIdentity {
            id,
            state,
            traits: self.traits,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(ProviderError::status(status.as_u16(), body))
}

async fn json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Payload(e.to_string()))
}

#[async_trait]
impl IdentityProvider for KratosClient {
    #[instrument(skip(self, traits, password), fields(email = %traits.email))]
    async fn create_identity(
        &self,
        traits: &Traits,
        password: &str,
        state: IdentityState,
    ) -> Result<IdentityId, ProviderError> {
        let response = send(
            self.http
                .post(self.admin("/admin/identities"))
                .json(&IdentityBody::new(traits, password, state)),
        )
        .await?;
        let created: IdentityResponse = json(response).await?;
        let identity = created.into_identity()?;
        debug!(identity_id = %identity.id, "identity created");
        Ok(identity.id)
    }

    #[instrument(skip(self))]
    async fn get_identity(&self, id: IdentityId) -> Result<ProviderIdentity, ProviderError> {
        let response = send(self.http.get(self.admin(&format!("/admin/identities/{id}")))).await?;
        json::<IdentityResponse>(response).await?.into_identity()
    }

    #[instrument(skip(self, traits, password))]
    async fn update_identity(
        &self,
        id: IdentityId,
        traits: &Traits,
        password: &str,
        state: IdentityState,
    ) -> Result<(), ProviderError> {
        send(
            self.http
                .put(self.admin(&format!("/admin/identities/{id}")))
                .json(&IdentityBody::new(traits, password, state)),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_login_flow(&self) -> Result<LoginFlow, ProviderError> {
        let response = send(self.http.get(self.public("/self-service/login/api"))).await?;
        let flow: LoginFlowResponse = json(response).await?;
        Ok(LoginFlow { id: flow.id })
    }

    #[instrument(skip(self, flow, password), fields(flow_id = %flow.id))]
    async fn submit_login_flow(
        &self,
        flow: &LoginFlow,
        identifier: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let response = send(
            self.http
                .post(self.public("/self-service/login"))
                .query(&[("flow", flow.id.as_str())])
                .json(&LoginBody {
                    method: "password",
                    identifier,
                    password,
                }),
        )
        .await?;
        let login: LoginResponse = json(response).await?;
        login
            .session
            .identity
            .ok_or_else(|| ProviderError::Payload("login session has no identity".to_string()))?
            .into_identity()
    }
}
