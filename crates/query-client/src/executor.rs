//! Request executor: sign, send, classify, retry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use aws_query_xml::{parse_response, ResponseParser, SimpleOptions, SimpleParser, SimpleResult};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheCheck, Fetched, ResponseCache};
use crate::classify::Verdict;
use crate::config::{ClientConfig, ServiceDescriptor};
use crate::credentials::Credentials;
use crate::error::{Error, ErrorKind, ErrorRecord, Result};
use crate::pool::{slot_for, ConnectionPool, SlotKey, WorkerKey};
use crate::request::{Endpoint, Params, SeekableBody, ServiceRequest};
use crate::response::HttpResponse;
use crate::retry::{RetryGate, RetryState};
use crate::transport::{ReqwestTransport, Transport};

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Cap on retries of transient errors, on top of the time window.
    pub retries: Option<u32>,
    /// Request timeout for each attempt; the client default when unset.
    pub timeout: Option<Duration>,
    /// Worker whose pooled connection to use; the calling thread when unset.
    pub worker: Option<WorkerKey>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_worker(mut self, worker: WorkerKey) -> Self {
        self.worker = Some(worker);
        self
    }
}

/// What to do after one attempt.
#[derive(Debug)]
enum Outcome {
    Done(HttpResponse),
    Redirected,
    Retry(Duration),
    Failed(Error),
}

/// Client for one query-protocol service.
///
/// Cloning is cheap; clones share configuration, connections and the
/// response cache.
pub struct QueryClient<T: Transport = ReqwestTransport> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: Transport> {
    config: ClientConfig,
    credentials: Credentials,
    endpoint: Endpoint,
    api_version: Option<String>,
    transport: T,
    pool: ConnectionPool<T::Connection>,
    cache: ResponseCache,
}

impl<T: Transport> Clone for QueryClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> fmt::Debug for QueryClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("endpoint", &self.inner.endpoint)
            .field("api_version", &self.inner.api_version)
            .field("connection_mode", &self.inner.config.connection_mode)
            .field("credentials", &self.inner.credentials)
            .finish_non_exhaustive()
    }
}

impl QueryClient<ReqwestTransport> {
    /// Create a client for `service` over reqwest.
    pub fn new(
        service: &ServiceDescriptor,
        credentials: Credentials,
        config: ClientConfig,
    ) -> Result<Self> {
        let transport = ReqwestTransport::new(config.transport_config());
        Self::with_transport(service, credentials, config, transport)
    }
}

impl<T: Transport> QueryClient<T> {
    /// Create a client for `service` over a custom transport.
    pub fn with_transport(
        service: &ServiceDescriptor,
        credentials: Credentials,
        config: ClientConfig,
        transport: T,
    ) -> Result<Self> {
        let endpoint = config.resolve_endpoint(service)?;
        let api_version = config.resolve_api_version(service);

        info!(
            endpoint = %endpoint,
            api_version = api_version.as_deref().unwrap_or("none"),
            "New {} client using {} connection mode",
            service.name.to_uppercase(),
            config.connection_mode
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                credentials,
                endpoint,
                api_version,
                transport,
                pool: ConnectionPool::new(),
                cache: ResponseCache::new(),
            }),
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Endpoint new requests are addressed to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn api_version(&self) -> Option<&str> {
        self.inner.api_version.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Number of pooled connections currently open.
    pub fn open_connections(&self) -> usize {
        self.inner.pool.open_count()
    }

    /// Build a request for `action` against this client's endpoint.
    pub fn request(&self, action: impl Into<String>, params: Params) -> ServiceRequest {
        let request = ServiceRequest::new(action, params, self.inner.endpoint.clone());
        match &self.inner.api_version {
            Some(version) => request.with_api_version(version.as_str()),
            None => request,
        }
    }

    /// Call `action` and feed the response body to `parser`.
    pub async fn execute<P: ResponseParser>(
        &self,
        action: &str,
        params: Params,
        parser: P,
        options: &ExecuteOptions,
    ) -> Result<P::Output> {
        self.execute_request(self.request(action, params), parser, options)
            .await
    }

    /// Send a prepared request and feed the response body to `parser`.
    pub async fn execute_request<P: ResponseParser>(
        &self,
        request: ServiceRequest,
        parser: P,
        options: &ExecuteOptions,
    ) -> Result<P::Output> {
        let response = self.execute_raw(request, options).await?;
        Ok(parse_response(&response.text(), parser)?)
    }

    /// Call `action` and shape the response with `simple`.
    pub async fn execute_simple(
        &self,
        action: &str,
        params: Params,
        simple: &SimpleOptions,
        options: &ExecuteOptions,
    ) -> Result<SimpleResult> {
        self.execute(action, params, SimpleParser::new(simple.clone()), options)
            .await
    }

    /// Call `action`, skipping the parse when the response is identical to
    /// the previous one for the same action. Without caching enabled every
    /// response is fresh.
    pub async fn execute_cached<P: ResponseParser>(
        &self,
        action: &str,
        params: Params,
        parser: P,
        options: &ExecuteOptions,
    ) -> Result<Fetched<P::Output>> {
        let response = self
            .execute_raw(self.request(action, params), options)
            .await?;
        let body = response.text();

        if self.inner.config.caching {
            let check = self.inner.cache.check(action, &body);
            if let CacheCheck::Unchanged { hits, since } = check {
                info!(action, hits, since = %since, "Response has not changed");
                return Ok(Fetched::Unchanged { hits, since });
            }
        }

        match parse_response(&body, parser) {
            Ok(output) => Ok(Fetched::Fresh(output)),
            Err(err) => {
                // The caller never saw this body, so it must not count as seen.
                self.inner.cache.invalidate(action);
                Err(err.into())
            }
        }
    }

    /// Send a request, following redirects and retrying transient errors,
    /// and return the successful response unparsed.
    #[instrument(
        skip(self, request, options),
        fields(action = %request.action, worker = ?options.worker)
    )]
    pub async fn execute_raw(
        &self,
        mut request: ServiceRequest,
        options: &ExecuteOptions,
    ) -> Result<HttpResponse> {
        let config = &self.inner.config;
        let worker = options.worker.clone().unwrap_or_else(WorkerKey::current);
        let slot = slot_for(config.connection_mode, &worker);
        let timeout = options.timeout.unwrap_or(config.timeout);
        let mut state: Option<RetryState> = None;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let response = self
                .send_once(&request, slot.as_ref(), timeout, attempts)
                .await?;

            let outcome = self.assess(
                response,
                &mut request,
                &mut state,
                options.retries,
                attempts,
                slot.as_ref(),
            );
            match outcome {
                Outcome::Done(response) => return Ok(response),
                Outcome::Failed(err) => return Err(err),
                Outcome::Redirected => {}
                Outcome::Retry(delay) => tokio::time::sleep(delay).await,
            }

            if let Some(body) = &request.upload {
                if let Err(err) = body.rewind() {
                    warn!(error = %err, "Failed to rewind upload body");
                }
            }
        }
    }

    /// Drop the pooled connection of `worker` (the calling thread when
    /// `None`). Returns whether one was open.
    pub fn close_connection(&self, worker: Option<&WorkerKey>) -> bool {
        let worker = worker.cloned().unwrap_or_else(WorkerKey::current);
        match slot_for(self.inner.config.connection_mode, &worker) {
            Some(slot) => self.inner.pool.close(&slot),
            None => false,
        }
    }

    /// Drop every pooled connection.
    pub fn close_all_connections(&self) {
        self.inner.pool.close_all();
    }

    fn connection(&self, slot: Option<&SlotKey>) -> Result<Arc<T::Connection>> {
        let inner = &*self.inner;
        match slot {
            Some(slot) => inner.pool.acquire(slot, || inner.transport.connect()),
            None => inner.transport.connect().map(Arc::new),
        }
    }

    async fn send_once(
        &self,
        request: &ServiceRequest,
        slot: Option<&SlotKey>,
        timeout: Duration,
        attempt: u32,
    ) -> Result<HttpResponse> {
        let inner = &*self.inner;
        let signed = request.sign(
            &inner.credentials,
            inner.config.signature_version,
            inner.config.post_threshold,
            Utc::now(),
        )?;
        let upload = request
            .upload
            .as_ref()
            .map(SeekableBody::read_to_bytes)
            .transpose()?;
        let method = signed.method;
        let http = signed.into_http(upload);
        let connection = self.connection(slot)?;

        if inner.config.enable_tracing {
            debug!(
                attempt,
                method = method.as_str(),
                endpoint = %request.endpoint,
                "Sending request"
            );
        }

        match inner.transport.send(&connection, http, Some(timeout)).await {
            Ok(response) => {
                if inner.config.enable_tracing {
                    debug!(
                        status = response.status,
                        content_length = response.body.len(),
                        "Response received"
                    );
                }
                Ok(response)
            }
            Err(err) => {
                warn!(attempt, error = %err, "Request failed in transport");
                if let Some(slot) = slot {
                    inner.pool.close(slot);
                }
                Err(err)
            }
        }
    }

    fn assess(
        &self,
        response: HttpResponse,
        request: &mut ServiceRequest,
        state: &mut Option<RetryState>,
        max_retries: Option<u32>,
        attempts: u32,
        slot: Option<&SlotKey>,
    ) -> Outcome {
        if response.is_success() {
            return Outcome::Done(response);
        }

        let inner = &*self.inner;
        let classifier = &inner.config.classifier;
        let verdict = classifier.classify(&response, &request.endpoint.to_string());

        let roll = rand::random_range(0..100u8);
        if classifier.should_close(&verdict, response.status, roll) {
            if let Some(slot) = slot {
                if inner.pool.close(slot) {
                    debug!(status = response.status, "Closed connection after error response");
                }
            }
        }

        let state =
            state.get_or_insert_with(|| RetryState::start(&inner.config.retry, max_retries));
        let service_error =
            |record: ErrorRecord| Error::new(ErrorKind::Service { record, attempts });

        match verdict {
            Verdict::Redirect { location, record } => match state.check_redirect() {
                RetryGate::Allowed => match request.endpoint.apply_redirect(&location) {
                    Ok(()) => {
                        state.record_redirect();
                        info!(
                            status = response.status,
                            location = %location,
                            redirects = state.redirects(),
                            "Following redirect"
                        );
                        Outcome::Redirected
                    }
                    Err(err) => Outcome::Failed(err),
                },
                gate => {
                    warn!(
                        ?gate,
                        location = %location,
                        redirects = state.redirects(),
                        "Not following redirect"
                    );
                    Outcome::Failed(service_error(record))
                }
            },
            Verdict::Transient { record, pattern } => {
                warn!(
                    status = response.status,
                    pattern = %pattern,
                    error = %record,
                    "Transient error response"
                );
                match state.check_retry() {
                    RetryGate::Allowed => {
                        let delay = state.next_backoff();
                        warn!(
                            retry = state.retries(),
                            delay_ms = delay.as_millis() as u64,
                            elapsed_ms = state.elapsed().as_millis() as u64,
                            "Request failed, retrying"
                        );
                        Outcome::Retry(delay)
                    }
                    gate => {
                        warn!(
                            ?gate,
                            retries = state.retries(),
                            elapsed_ms = state.elapsed().as_millis() as u64,
                            "Giving up on transient error"
                        );
                        Outcome::Failed(service_error(record))
                    }
                }
            }
            Verdict::Fatal(record) => {
                warn!(status = response.status, error = %record, "Service returned an error");
                Outcome::Failed(service_error(record))
            }
        }
    }
}
