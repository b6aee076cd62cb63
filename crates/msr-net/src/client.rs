//! ---
//! msr_section: "04-control-plane-client"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "reqwest implementation of the control plane contract."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use msr_common::config::ApiConfig;
use msr_core::{
    ApiError, CreatedService, ManagedServiceState, PasswordUpdate, PasswordUpdated, ScalingUpdate,
    ServiceApi, ServiceCreate, ServiceUpdate,
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::wire::{
    CreateServiceBody, CreateServiceResult, Envelope, ErrorBody, PasswordPatch, PasswordResult,
    ScalingPatch, ServicePatch, ServiceResource,
};

/// HTTP client for the control plane, scoped to one organization.
#[derive(Clone)]
pub struct HttpServiceApi {
    client: Client,
    base_url: Url,
    organization_id: String,
    key_id: String,
    key_secret: String,
}

impl std::fmt::Debug for HttpServiceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServiceApi")
            .field("base_url", &self.base_url.as_str())
            .field("organization_id", &self.organization_id)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl HttpServiceApi {
    pub fn new(
        base_url: Url,
        organization_id: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Transport(format!(
                "base url {base_url} cannot carry a path"
            )));
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("msrctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            organization_id: organization_id.into(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }

    /// Build a client from configuration, reading the API key from the environment.
    pub fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let (key_id, key_secret) = config.credentials()?;
        Self::new(
            config.base_url.clone(),
            config.organization_id.clone(),
            key_id,
            key_secret,
            config.request_timeout,
        )
        .context("unable to build control plane client")
    }

    /// `{base}/organizations/{organization}/services[/segments...]`
    fn services_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push("organizations")
                .push(&self.organization_id)
                .push("services")
                .extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "control plane request");
        self.client
            .request(method, url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send_raw(request).await?;
        serde_json::from_str::<Envelope<T>>(&body)
            .map(|envelope| envelope.result)
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    /// Send `request` and return the body of a successful response.
    async fn send_raw(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| {
                    if body.trim().is_empty() {
                        status.canonical_reason().unwrap_or("unknown error").to_owned()
                    } else {
                        body.clone()
                    }
                });
            warn!(status = status.as_u16(), %message, "control plane rejected request");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl ServiceApi for HttpServiceApi {
    async fn create_service(&self, request: &ServiceCreate) -> Result<CreatedService, ApiError> {
        let body = CreateServiceBody::from(request);
        let result: CreateServiceResult = self
            .send(self.request(Method::POST, self.services_url(&[])).json(&body))
            .await?;
        Ok(result.into())
    }

    async fn get_service(&self, id: &str) -> Result<ManagedServiceState, ApiError> {
        let resource: ServiceResource = self
            .send(self.request(Method::GET, self.services_url(&[id])))
            .await?;
        Ok(resource.into())
    }

    async fn update_service(
        &self,
        id: &str,
        update: &ServiceUpdate,
    ) -> Result<ManagedServiceState, ApiError> {
        let body = ServicePatch::from(update);
        let resource: ServiceResource = self
            .send(self.request(Method::PATCH, self.services_url(&[id])).json(&body))
            .await?;
        Ok(resource.into())
    }

    async fn update_service_scaling(
        &self,
        id: &str,
        update: &ScalingUpdate,
    ) -> Result<ManagedServiceState, ApiError> {
        let body = ScalingPatch::from(update);
        let resource: ServiceResource = self
            .send(
                self.request(Method::PATCH, self.services_url(&[id, "scaling"]))
                    .json(&body),
            )
            .await?;
        Ok(resource.into())
    }

    async fn update_service_password(
        &self,
        id: &str,
        update: &PasswordUpdate,
    ) -> Result<PasswordUpdated, ApiError> {
        let body = PasswordPatch::from(update);
        let result: PasswordResult = self
            .send(
                self.request(Method::PATCH, self.services_url(&[id, "password"]))
                    .json(&body),
            )
            .await?;
        Ok(result.into())
    }

    async fn delete_service(&self, id: &str) -> Result<(), ApiError> {
        // Any success body, including an empty 204, means the service is gone.
        self.send_raw(self.request(Method::DELETE, self.services_url(&[id])))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpServiceApi {
        HttpServiceApi::new(
            Url::parse(base).expect("valid url"),
            "org-1",
            "key-id",
            "key-secret",
            Duration::from_secs(5),
        )
        .expect("client builds")
    }

    #[test]
    fn service_urls_are_scoped_to_the_organization() {
        let api = client("https://control.example.test/v1");
        assert_eq!(
            api.services_url(&[]).as_str(),
            "https://control.example.test/v1/organizations/org-1/services"
        );
        assert_eq!(
            api.services_url(&["svc-1", "scaling"]).as_str(),
            "https://control.example.test/v1/organizations/org-1/services/svc-1/scaling"
        );

        let trailing = client("https://control.example.test/v1/");
        assert_eq!(
            trailing.services_url(&["svc-1"]).as_str(),
            "https://control.example.test/v1/organizations/org-1/services/svc-1"
        );
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let rendered = format!("{:?}", client("https://control.example.test/v1"));
        assert!(!rendered.contains("key-secret"));
    }

    #[test]
    fn rejects_non_base_urls() {
        let err = HttpServiceApi::new(
            Url::parse("mailto:ops@example.test").expect("valid url"),
            "org-1",
            "id",
            "secret",
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
