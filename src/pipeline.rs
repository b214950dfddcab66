//! Request Pipeline Module
//!
//! Every call passes through the same steps: request stages (credentials
//! first), transport, then normalization or error dispatch. Callers get the
//! unwrapped payload or an [`ApiError`]; nothing fails silently.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::auth::SessionStore;
use crate::dispatch::{ErrorDispatcher, Failure};
use crate::envelope::ResponseNormalizer;
use crate::error::{ApiError, NormalizedResult};
use crate::transport::{ApiRequest, Transport};

/// One step applied to every outgoing request, in registration order
pub trait RequestStage: Send + Sync {
    fn apply(&self, request: ApiRequest) -> ApiRequest;
}

impl<F> RequestStage for F
where
    F: Fn(ApiRequest) -> ApiRequest + Send + Sync,
{
    fn apply(&self, request: ApiRequest) -> ApiRequest {
        self(request)
    }
}

/// Attaches `Authorization: Bearer <token>` when a token is stored
pub struct BearerAuth {
    session: Arc<SessionStore>,
}

impl BearerAuth {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }
}

impl RequestStage for BearerAuth {
    fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(token) = self.session.access_token().filter(|t| !t.is_empty()) {
            request.set_header("Authorization", format!("Bearer {}", token));
        }
        request
    }
}

#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    stages: Vec<Arc<dyn RequestStage>>,
    normalizer: ResponseNormalizer,
    dispatcher: Arc<ErrorDispatcher>,
}

impl RequestPipeline {
    /// Build a pipeline whose first stage attaches the session's credentials
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
        normalizer: ResponseNormalizer,
        dispatcher: Arc<ErrorDispatcher>,
    ) -> Self {
        Self {
            transport,
            stages: vec![Arc::new(BearerAuth::new(session))],
            normalizer,
            dispatcher,
        }
    }

    /// Append a request stage after the existing ones
    pub fn with_stage(mut self, stage: impl RequestStage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Run every request stage over `request`
    pub fn prepare(&self, request: ApiRequest) -> ApiRequest {
        self.stages
            .iter()
            .fold(request, |request, stage| stage.apply(request))
    }

    /// Issue a call and return the unwrapped payload
    #[instrument(skip(self, body))]
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> NormalizedResult<Value> {
        let request = self.prepare(ApiRequest::new(method, path, body));
        let credential = bearer_token(&request);
        let credential = credential.as_deref();

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.dispatcher.dispatch(Failure::NoResponse(e), credential)),
        };

        if response.is_failure() {
            return Err(self
                .dispatcher
                .dispatch(Failure::Status(response), credential));
        }

        match self.normalizer.normalize(&response) {
            Ok(data) => {
                debug!(status = response.status, "Call succeeded");
                Ok(data)
            }
            Err(e) => Err(self.dispatcher.dispatch(Failure::Rejected(e), credential)),
        }
    }

    /// Issue a call and decode the payload into `T`
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> NormalizedResult<T> {
        let data = self.call(method, path, body).await?;

        serde_json::from_value(data).map_err(|e| {
            self.dispatcher.dispatch(
                Failure::Rejected(ApiError::application(
                    Some("INVALID_PAYLOAD".to_string()),
                    format!("Unexpected response payload: {}", e),
                )),
                None,
            )
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> NormalizedResult<T> {
        self.call_as(Method::GET, path, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> NormalizedResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| {
            self.dispatcher.dispatch(
                Failure::Rejected(ApiError::application(
                    Some("INVALID_REQUEST".to_string()),
                    format!("Could not encode request body: {}", e),
                )),
                None,
            )
        })?;
        self.call_as(Method::POST, path, Some(body)).await
    }
}

/// Token the request is about to be sent with, as attached by [`BearerAuth`]
fn bearer_token(request: &ApiRequest) -> Option<String> {
    request
        .header("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}
