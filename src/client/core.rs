use crate::client::policy::RetryPolicy;
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::transport::{HttpTransport, TransportConfig};
use crate::Result;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Shared HTTP client every Dify domain client goes through.
///
/// Cheap to clone: clones share the configuration, the connection pool and
/// the telemetry sink. See [`Client::execute`] and [`Client::stream`].
#[derive(Clone)]
pub struct Client {
    pub(crate) config: Arc<TransportConfig>,
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) policy: RetryPolicy,
    pub(crate) telemetry: Arc<dyn TelemetrySink>,
}

impl Client {
    /// Create a client with the default (no-op) telemetry sink.
    pub fn new(config: TransportConfig) -> Result<Self> {
        crate::client::builder::ClientBuilder::new(config).build()
    }

    pub fn builder(config: TransportConfig) -> crate::client::builder::ClientBuilder {
        crate::client::builder::ClientBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: Arc<TransportConfig>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.clone())?);
        let policy = RetryPolicy::from_config(&config);
        Ok(Self {
            config,
            transport,
            policy,
            telemetry,
        })
    }

    /// The immutable configuration this client was built with.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Telemetry is best-effort: a failing sink never fails the call.
    pub(crate) async fn report(&self, event: TelemetryEvent) {
        if let Err(e) = self.telemetry.report(event).await {
            debug!(error = %e, "telemetry sink rejected event");
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::AuthMode;

    #[test]
    fn client_is_cheap_to_share() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<Client>();
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let client = Client::new(
            TransportConfig::new("https://api.dify.ai/v1")
                .with_auth(AuthMode::bearer("app-secret-token")),
        )
        .unwrap();
        let rendered = format!("{:?}", client);
        assert!(rendered.contains("api.dify.ai"));
        assert!(!rendered.contains("app-secret-token"));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let err = Client::new(TransportConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, crate::Error::Configuration { .. }));
    }
}
