use clap::Parser;
use std::time::Duration;

#[derive(Parser, Clone, Debug)]
pub struct EdcConfig {
    /// Base url of the consumer connector management api
    #[clap(
        long = "edc-hostname",
        env = "EDC_HOSTNAME",
        default_value = "http://localhost:8181/management"
    )]
    pub hostname: String,
    #[clap(long = "edc-api-key-header", env = "EDC_API_KEY_HEADER", default_value = "x-api-key")]
    pub api_key_header: String,
    #[clap(long = "edc-api-key", env = "EDC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Suffix appended to provider connector urls missing the protocol path
    #[clap(long = "edc-protocol-path", env = "EDC_PROTOCOL_PATH", default_value = "/api/v1/dsp")]
    pub protocol_path: String,
    #[clap(flatten)]
    pub negotiation: NegotiationConfig,
    /// Maximum number of offers processed at the same time in one batch
    #[clap(long = "edc-batch-concurrency", env = "EDC_BATCH_CONCURRENCY", default_value = "8")]
    pub batch_concurrency: usize,
    /// Cached tokens are treated as expired this long before their real expiry
    #[clap(
        long = "edc-token-expiry-margin",
        env = "EDC_TOKEN_EXPIRY_MARGIN",
        value_parser = humantime::parse_duration,
        default_value = "5s"
    )]
    pub token_expiry_margin: Duration,
}

#[derive(Parser, Clone, Debug)]
pub struct NegotiationConfig {
    /// Interval between negotiation state checks
    #[clap(
        long = "edc-negotiation-poll-interval",
        env = "EDC_NEGOTIATION_POLL_INTERVAL",
        value_parser = humantime::parse_duration,
        default_value = "3s"
    )]
    pub poll_interval: Duration,
    /// Number of state checks before the negotiation is recorded as timed out
    #[clap(long = "edc-negotiation-max-checks", env = "EDC_NEGOTIATION_MAX_CHECKS", default_value = "3")]
    pub max_checks: u32,
}

#[derive(Parser, Clone, Debug)]
pub struct DiscoveryConfig {
    #[clap(long = "bpn-discovery-url", env = "BPN_DISCOVERY_URL")]
    pub bpn_discovery_url: Option<String>,
    #[clap(long = "connector-discovery-url", env = "CONNECTOR_DISCOVERY_URL")]
    pub connector_discovery_url: Option<String>,
}

impl EdcConfig {
    pub fn from_env() -> Result<EdcConfig, clap::Error> {
        // Empty command line arguments, because we want to use ENV fallback
        // or default values if ENV variables are not set.
        EdcConfig::try_parse_from([""])
    }

    /// Provider protocol url, with the protocol path appended when missing.
    pub fn provider_protocol_url(&self, provider_url: &str) -> String {
        let provider_url = dsx_model::offer::remove_last_slash(provider_url);
        if provider_url.ends_with(self.protocol_path.as_str()) {
            provider_url.to_string()
        } else {
            format!("{}{}", provider_url, self.protocol_path)
        }
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        NegotiationConfig {
            poll_interval: Duration::from_secs(3),
            max_checks: 3,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_clap_negotiation() {
        let c = EdcConfig::from_env().unwrap();
        assert_eq!(3, c.negotiation.poll_interval.as_secs());
        assert_eq!(3, c.negotiation.max_checks);
    }

    #[test]
    fn test_default_clap_batch() {
        let c = EdcConfig::from_env().unwrap();
        assert_eq!(8, c.batch_concurrency);
        assert_eq!(5, c.token_expiry_margin.as_secs());
        assert_eq!("x-api-key", c.api_key_header);
    }

    #[test]
    fn test_cli_overrides() {
        let c = EdcConfig::try_parse_from([
            "",
            "--edc-negotiation-poll-interval",
            "500ms",
            "--edc-negotiation-max-checks",
            "10",
        ])
        .unwrap();
        assert_eq!(500, c.negotiation.poll_interval.as_millis());
        assert_eq!(10, c.negotiation.max_checks);
    }

    #[test]
    fn test_provider_protocol_url() {
        let c = EdcConfig::from_env().unwrap();
        assert_eq!(
            c.provider_protocol_url("https://p.example/"),
            format!("https://p.example{}", c.protocol_path)
        );
        assert_eq!(
            c.provider_protocol_url(&format!("https://p.example{}", c.protocol_path)),
            format!("https://p.example{}", c.protocol_path)
        );
    }
}
