use crate::client::core::Client;
use crate::config::ClientSettings;
use crate::telemetry::TelemetrySink;
use crate::transport::TransportConfig;
use crate::Result;
use std::sync::Arc;

/// Builder for creating clients with custom configuration.
///
/// Keep this surface area small: connection settings live in
/// [`TransportConfig`], the builder only adds the injected collaborators.
pub struct ClientBuilder {
    config: TransportConfig,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ClientBuilder {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            telemetry: crate::telemetry::noop_sink(),
        }
    }

    /// Start from loaded settings (YAML file or environment).
    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        Ok(Self::new(settings.to_transport_config()?))
    }

    /// Inject a telemetry sink. Default is a no-op sink.
    pub fn telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    /// Adjust the configuration before building.
    pub fn configure(mut self, f: impl FnOnce(TransportConfig) -> TransportConfig) -> Self {
        self.config = f(self.config);
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<Client> {
        Client::from_parts(Arc::new(self.config), self.telemetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::InMemoryTelemetrySink;
    use std::time::Duration;

    #[test]
    fn configure_adjusts_the_transport_config() {
        let client = ClientBuilder::new(TransportConfig::new("http://localhost:5001/v1"))
            .configure(|c| c.with_max_retries(0).with_timeout(Duration::from_secs(2)))
            .telemetry_sink(Arc::new(InMemoryTelemetrySink::new(8)))
            .build()
            .unwrap();
        assert_eq!(client.config().max_retries, 0);
        assert_eq!(client.config().timeout, Duration::from_secs(2));
    }

    #[test]
    fn builds_from_settings() {
        let settings = ClientSettings::from_yaml_str(
            "base_url: https://api.dify.ai/v1\napi_key: app-123\nmax_retries: 5\n",
        )
        .unwrap();
        let client = ClientBuilder::from_settings(&settings)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(client.config().max_retries, 5);
        assert_eq!(client.config().auth.name(), "bearer");
    }
}
