//! Typed wrappers over the backend's REST resources.

use std::future::Future;

use iotwatch_protocol::{
    AuthResponse, Credentials, JsonCodec, NewThreshold, Page, ReadingRecord, Registration,
    RequestOutcome, Threshold, UserProfile,
};
use iotwatch_session::{AuthBackend, CredentialStore};
use iotwatch_transport::HttpTransport;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ApiRequest, RequestPipeline};

/// Default history page size.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// The backend API, one method per endpoint.
///
/// Every method goes through [`RequestPipeline::execute`], so a 401 from
/// any of them demotes the session.
pub struct Api<H, S> {
    pipeline: RequestPipeline<H, S>,
    codec: JsonCodec,
}

impl<H, S> Clone for Api<H, S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            codec: self.codec,
        }
    }
}

impl<H: HttpTransport, S: CredentialStore> Api<H, S> {
    pub fn new(pipeline: RequestPipeline<H, S>) -> Self {
        Self {
            pipeline,
            codec: JsonCodec,
        }
    }

    pub fn pipeline(&self) -> &RequestPipeline<H, S> {
        &self.pipeline
    }

    /// Runs an arbitrary request and returns the raw JSON payload.
    pub async fn execute(&self, request: ApiRequest) -> RequestOutcome<Option<Value>> {
        self.pipeline.execute(request).await
    }

    /// `POST /api/auth/login`, sent without a bearer token.
    pub async fn login(&self, credentials: &Credentials) -> RequestOutcome<AuthResponse> {
        self.send_json(ApiRequest::post("/api/auth/login").anonymous(), credentials)
            .await
    }

    /// `POST /api/auth/register`, sent without a bearer token.
    pub async fn register(&self, registration: &Registration) -> RequestOutcome<AuthResponse> {
        self.send_json(ApiRequest::post("/api/auth/register").anonymous(), registration)
            .await
    }

    /// `GET /api/auth/profile`.
    pub async fn profile(&self) -> RequestOutcome<UserProfile> {
        self.fetch(ApiRequest::get("/api/auth/profile")).await
    }

    /// `GET /api/readings?page=&limit=`. Pages are 1-based.
    ///
    /// Only the paged object shape is accepted; a bare array is reported
    /// as a `TransportError`.
    pub async fn readings(&self, page: u32, limit: u32) -> RequestOutcome<Page<ReadingRecord>> {
        let path = format!("/api/readings?page={}&limit={}", page.max(1), limit.max(1));
        self.execute(ApiRequest::get(path))
            .await
            .and_then(|payload| match payload {
                Some(Value::Array(_)) => RequestOutcome::TransportError(
                    "invalid response body: expected a paged object, got an array".into(),
                ),
                other => RequestOutcome::Success(other),
            })
            .decode(&self.codec)
    }

    /// `GET /api/thresholds`.
    pub async fn thresholds(&self) -> RequestOutcome<Vec<Threshold>> {
        self.fetch(ApiRequest::get("/api/thresholds")).await
    }

    /// `POST /api/thresholds`.
    pub async fn create_threshold(&self, threshold: &NewThreshold) -> RequestOutcome<Threshold> {
        self.send_json(ApiRequest::post("/api/thresholds"), threshold)
            .await
    }

    /// `PUT /api/thresholds/{id}`.
    pub async fn update_threshold(
        &self,
        id: u64,
        threshold: &NewThreshold,
    ) -> RequestOutcome<Threshold> {
        self.send_json(ApiRequest::put(format!("/api/thresholds/{id}")), threshold)
            .await
    }

    /// `DELETE /api/thresholds/{id}`. Any 2xx counts as success.
    pub async fn delete_threshold(&self, id: u64) -> RequestOutcome<()> {
        self.execute(ApiRequest::delete(format!("/api/thresholds/{id}")))
            .await
            .map(|_| ())
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> RequestOutcome<T> {
        self.execute(request).await.decode(&self.codec)
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        body: &B,
    ) -> RequestOutcome<T> {
        match request.json(body) {
            Ok(request) => self.fetch(request).await,
            Err(e) => RequestOutcome::TransportError(e.to_string()),
        }
    }
}

impl<H: HttpTransport, S: CredentialStore> AuthBackend for Api<H, S> {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = RequestOutcome<AuthResponse>> + Send {
        Api::login(self, credentials)
    }

    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = RequestOutcome<AuthResponse>> + Send {
        Api::register(self, registration)
    }

    fn profile(&self) -> impl Future<Output = RequestOutcome<UserProfile>> + Send {
        Api::profile(self)
    }
}
