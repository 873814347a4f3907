use crate::error::{EnvError, Result};
use crate::metrics::Metrics;
use crate::state::ShutdownSignal;
use arc_swap::ArcSwapOption;
use reqwest::cookie::Jar;
use reqwest::{Client, IntoUrl, Method, RequestBuilder, Response};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Settings the shared client is built with.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    /// Honor the system/environment proxy configuration
    pub use_system_proxy: bool,
    pub product: String,
    pub version: String,
}

impl ClientConfig {
    pub fn new(product: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            timeout: crate::HTTP_TIMEOUT,
            use_system_proxy: true,
            product: product.into(),
            version: version.into(),
        }
    }

    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.product, self.version)
    }
}

/// The process-wide outbound HTTP client.
///
/// Built once and handed out as the same `Arc` to every caller. The timeout
/// can be changed while running without rebuilding the client; it is applied
/// to each request created through [`request`](Self::request).
///
/// [`shutdown_now`](Self::shutdown_now) is terminal: in-flight
/// [`send`](Self::send) calls resolve with [`EnvError::Cancelled`] and later
/// [`get`](Self::get) calls fail with [`EnvError::ClientShutDown`].
///
/// Retry and backoff are up to callers; see
/// [`HTTP_REQUEST_MAX_RETRY`](crate::HTTP_REQUEST_MAX_RETRY).
#[derive(Clone)]
pub struct SharedClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    client: ArcSwapOption<Client>,
    cookies: Arc<Jar>,
    timeout_ms: AtomicU64,
    user_agent: String,
    in_flight: ShutdownSignal,
    metrics: Arc<Metrics>,
}

impl SharedClient {
    pub fn new(config: &ClientConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let user_agent = config.user_agent();

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .cookie_provider(cookies.clone())
            .user_agent(user_agent.clone());
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(EnvError::ClientBuild)?;

        tracing::info!(
            "HTTP client ready: user_agent={}, timeout={}ms, system_proxy={}",
            user_agent,
            config.timeout.as_millis(),
            config.use_system_proxy
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                client: ArcSwapOption::from_pointee(client),
                cookies,
                timeout_ms: AtomicU64::new(saturating_millis(config.timeout)),
                user_agent,
                in_flight: ShutdownSignal::new(),
                metrics,
            }),
        })
    }

    /// The shared client instance
    pub fn get(&self) -> Result<Arc<Client>> {
        self.inner.client.load_full().ok_or(EnvError::ClientShutDown)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.inner.timeout_ms.load(Ordering::Acquire))
    }

    /// Change the timeout for requests created from now on
    pub fn reconfigure(&self, timeout: Duration) {
        let previous = self.timeout();
        self.inner
            .timeout_ms
            .store(saturating_millis(timeout), Ordering::Release);
        if previous != timeout {
            tracing::info!(
                "HTTP timeout changed: {}ms -> {}ms",
                previous.as_millis(),
                timeout.as_millis()
            );
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    pub fn cookies(&self) -> Arc<Jar> {
        self.inner.cookies.clone()
    }

    /// Start a request carrying the current timeout
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> Result<RequestBuilder> {
        Ok(self.get()?.request(method, url).timeout(self.timeout()))
    }

    /// Send a request, giving up early if the client is shut down meanwhile.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.inner.in_flight.token();
        if token.is_cancelled() {
            return Err(EnvError::ClientShutDown);
        }

        self.inner.metrics.record_request_sent();
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.inner.metrics.record_request_cancelled();
                Err(EnvError::Cancelled)
            }
            response = request.send() => response.map_err(|e| {
                self.inner.metrics.record_request_failed();
                EnvError::Request(e)
            }),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.in_flight.is_cancelled()
    }

    /// Cancel in-flight requests and release the client.
    ///
    /// # Returns
    /// `false` if the client had already been shut down
    pub fn shutdown_now(&self) -> bool {
        let first = self.inner.in_flight.cancel();
        self.inner.client.store(None);
        if first {
            tracing::info!("HTTP client shut down");
        }
        first
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for SharedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedClient")
            .field("user_agent", &self.inner.user_agent)
            .field("timeout", &self.timeout())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> SharedClient {
        let config = ClientConfig::new("StageTest", "1.2.3");
        SharedClient::new(&config, Arc::new(Metrics::new())).unwrap()
    }

    #[test]
    fn test_user_agent_format() {
        let client = test_client();
        assert_eq!(client.user_agent(), "StageTest/1.2.3");
    }

    #[test]
    fn test_get_returns_same_instance() {
        let client = test_client();
        let a = client.get().unwrap();
        let b = client.clone().get().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_reconfigure_keeps_instance() {
        let client = test_client();
        let before = client.get().unwrap();
        assert_eq!(client.timeout(), crate::HTTP_TIMEOUT);

        client.reconfigure(Duration::from_millis(1500));

        assert_eq!(client.timeout(), Duration::from_millis(1500));
        assert!(Arc::ptr_eq(&before, &client.get().unwrap()));
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let client = test_client();
        client.reconfigure(Duration::MAX);
        assert_eq!(client.timeout(), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_request_carries_timeout() {
        let client = test_client();
        client.reconfigure(Duration::from_millis(1234));

        let request = client
            .request(Method::GET, "http://localhost/ping")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.timeout(), Some(&Duration::from_millis(1234)));
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let client = test_client();
        let held = client.get().unwrap();

        assert!(client.shutdown_now());
        assert!(!client.shutdown_now());

        assert!(client.is_shut_down());
        assert!(matches!(client.get(), Err(EnvError::ClientShutDown)));
        assert!(client.request(Method::GET, "http://localhost/").is_err());
        // Handles taken before shutdown stay valid until dropped
        drop(held);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_send() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let client = test_client();
        let request = client
            .request(Method::GET, format!("http://{}/slow", addr))
            .unwrap();
        let sender = client.clone();
        let in_flight = tokio::spawn(async move { sender.send(request).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        client.shutdown_now();

        let result = tokio::time::timeout(Duration::from_secs(2), in_flight)
            .await
            .expect("send did not observe shutdown")
            .unwrap();
        assert!(matches!(result, Err(EnvError::Cancelled)));
        server.abort();
    }
}
