use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::RadioError;
use crate::models::{NowPlaying, Track};
use crate::settings::Settings;

/// The request/response contract with the radio backend. Everything the
/// client knows about playback, the queue, the catalog and the session comes
/// through here.
pub trait RadioService: Send + Sync + 'static {
    /// `None` when the server reports nothing on air.
    fn now_playing(&self) -> BoxFuture<'_, Result<Option<NowPlaying>, RadioError>>;

    fn queue(&self) -> BoxFuture<'_, Result<Vec<Track>, RadioError>>;

    /// Tracks requested by the signed-in listener. Privileged.
    fn my_requests(&self) -> BoxFuture<'_, Result<Vec<Track>, RadioError>>;

    /// Privileged. `None` when the server acknowledged without a body.
    fn submit_request<'a>(
        &'a self,
        track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Track>, RadioError>>;

    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Track>, RadioError>>;

    fn is_authenticated(&self) -> BoxFuture<'_, Result<bool, RadioError>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    track_id: &'a str,
}

/// `RadioService` over HTTP with cookie-based credentials.
#[derive(Debug, Clone)]
pub struct HttpRadioService {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
}

impl HttpRadioService {
    /// Builds a service from settings. Optionally accepts a custom reqwest
    /// client for connection reuse and shared configuration.
    pub fn new(settings: &Settings, custom_client: Option<Client>) -> Result<Self, RadioError> {
        let client = match custom_client {
            Some(client) => client,
            None => Client::builder()
                .cookie_store(true)
                .pool_idle_timeout(Some(Duration::from_secs(90)))
                .timeout(settings.request_timeout)
                .connect_timeout(settings.request_timeout)
                .build()?,
        };
        Ok(Self {
            client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            session_cookie: settings.session_cookie.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_credentials(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => builder.header(reqwest::header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RadioError> {
        let response = self.with_credentials(builder).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(%status, url = %response.url(), "Radio API returned an error status");
            return Err(RadioError::from_status(status));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RadioError> {
        let response = self.send(self.client.get(self.url(path))).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl RadioService for HttpRadioService {
    fn now_playing(&self) -> BoxFuture<'_, Result<Option<NowPlaying>, RadioError>> {
        async move {
            let response = self.send(self.client.get(self.url("/playing"))).await?;
            let body = response.bytes().await?;
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            Ok(serde_json::from_slice::<Option<NowPlaying>>(&body)?)
        }
        .boxed()
    }

    fn queue(&self) -> BoxFuture<'_, Result<Vec<Track>, RadioError>> {
        self.get_json("/queue").boxed()
    }

    fn my_requests(&self) -> BoxFuture<'_, Result<Vec<Track>, RadioError>> {
        self.get_json("/request").boxed()
    }

    fn submit_request<'a>(
        &'a self,
        track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Track>, RadioError>> {
        async move {
            let builder = self
                .client
                .post(self.url("/request"))
                .json(&SubmitBody { track_id });
            let response = self.send(builder).await?;
            let body = response.bytes().await?;
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            match serde_json::from_slice::<Track>(&body) {
                Ok(track) => Ok(Some(track)),
                Err(e) => {
                    warn!(error = %e, "Request accepted but response body was not a track");
                    Ok(None)
                }
            }
        }
        .boxed()
    }

    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Track>, RadioError>> {
        async move {
            let builder = self
                .client
                .get(self.url("/search"))
                .query(&[("query", query)]);
            let response = self.send(builder).await?;
            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        }
        .boxed()
    }

    fn is_authenticated(&self) -> BoxFuture<'_, Result<bool, RadioError>> {
        async move {
            match self.get_json::<bool>("/is_authenticated").await {
                Err(RadioError::Unauthorized) => Ok(false),
                other => other,
            }
        }
        .boxed()
    }
}

/// Backend that is never reachable, for unit tests that drive state directly.
#[cfg(test)]
pub(crate) struct OfflineService;

#[cfg(test)]
impl RadioService for OfflineService {
    fn now_playing(&self) -> BoxFuture<'_, Result<Option<NowPlaying>, RadioError>> {
        async { Err(RadioError::HttpStatus(503)) }.boxed()
    }

    fn queue(&self) -> BoxFuture<'_, Result<Vec<Track>, RadioError>> {
        async { Err(RadioError::HttpStatus(503)) }.boxed()
    }

    fn my_requests(&self) -> BoxFuture<'_, Result<Vec<Track>, RadioError>> {
        async { Err(RadioError::HttpStatus(503)) }.boxed()
    }

    fn submit_request<'a>(
        &'a self,
        _track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Track>, RadioError>> {
        async { Err(RadioError::HttpStatus(503)) }.boxed()
    }

    fn search<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, Result<Vec<Track>, RadioError>> {
        async { Err(RadioError::HttpStatus(503)) }.boxed()
    }

    fn is_authenticated(&self) -> BoxFuture<'_, Result<bool, RadioError>> {
        async { Err(RadioError::HttpStatus(503)) }.boxed()
    }
}
