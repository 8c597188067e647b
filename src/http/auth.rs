use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::config::{AuthConfig, RuntimeConfig};
use crate::error::Error;

/// Principal attached to every request after token verification. `None`
/// means the request is anonymous; documents it creates carry no owner.
#[derive(Clone)]
pub(crate) struct Principal(pub(crate) Option<String>);

/// Token verification capability, chosen once at startup. With no identity
/// provider configured every request stays anonymous.
#[derive(Clone)]
pub(crate) enum Verifier {
    Disabled,
    Verifying(TokenProvider),
}

impl Verifier {
    pub(crate) fn from_config(auth: &AuthConfig) -> Verifier {
        match &auth.verify_url {
            Some(verify_url) => Verifier::Verifying(TokenProvider::new(
                verify_url.clone(),
                auth.credential.clone(),
            )),
            None => Verifier::Disabled,
        }
    }
}

#[derive(Clone)]
pub(crate) struct TokenProvider {
    client: Client,
    verify_url: String,
    credential: Option<SecretString>,
}

impl TokenProvider {
    fn new(verify_url: String, credential: Option<SecretString>) -> TokenProvider {
        TokenProvider {
            client: Client::builder()
                .http1_only()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap(),
            verify_url,
            credential,
        }
    }

    /// Ask the identity provider about a bearer token. Any failure on the
    /// way, transport included, reads as Unauthorized.
    pub(crate) async fn verify(&self, token: &str) -> Result<String, Error> {
        let mut request = self
            .client
            .post(&self.verify_url)
            .json(&json!({ "token": token }));
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential.expose_secret());
        }
        let response = request.send().await.map_err(|_| Error::Unauthorized)?;
        if !response.status().is_success() {
            return Err(Error::Unauthorized);
        }
        let body: Value = response.json().await.map_err(|_| Error::Unauthorized)?;
        body.get("sub")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(Error::Unauthorized)
    }
}

pub(super) async fn attach_principal(
    State(config): State<RuntimeConfig>,
    mut req: Request,
    next: Next,
) -> Response {
    fn rejected() -> Response {
        let body = Json(json!({ "message": "unauthorized" }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }

    let mut principal = None;
    if let Verifier::Verifying(provider) = &config.verifier {
        if let Some(authz) = req.headers().get("authorization") {
            let Ok(cred) = authz.to_str() else {
                return rejected();
            };
            let Some(token) = cred.strip_prefix("Bearer ").map(str::trim) else {
                return rejected();
            };
            match provider.verify(token).await {
                Ok(sub) => principal = Some(sub),
                Err(_) => return rejected(),
            }
        }
    }
    req.extensions_mut().insert(Principal(principal));
    next.run(req).await
}
