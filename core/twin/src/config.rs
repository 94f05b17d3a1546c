use clap::Parser;

use dsx_client::registry::HttpTwinRegistry;
use dsx_client::web::WebAuth;

#[derive(Parser, Clone, Debug)]
pub struct TwinConfig {
    /// Base url of the digital twin registry
    #[clap(
        long = "digital-twins-hostname",
        env = "DIGITAL_TWINS_HOSTNAME",
        default_value = "http://localhost:4243"
    )]
    pub hostname: String,
    #[clap(long = "digital-twins-api", env = "DIGITAL_TWINS_API", default_value = "/api/v3.0")]
    pub api_root: String,
    /// Bearer token sent to the registry
    #[clap(long = "digital-twins-token", env = "DIGITAL_TWINS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// BPN of the manufacturer publishing the twins
    #[clap(long = "manufacturer-id", env = "MANUFACTURER_ID")]
    pub manufacturer_id: String,
    /// Public data address prefix used in submodel endpoints
    #[clap(long = "edc-endpoint-base", env = "EDC_ENDPOINT_BASE")]
    pub edc_endpoint_base: String,
    #[clap(long = "twin-batch-concurrency", env = "TWIN_BATCH_CONCURRENCY", default_value = "8")]
    pub batch_concurrency: usize,
}

impl TwinConfig {
    pub fn from_env() -> Result<TwinConfig, clap::Error> {
        TwinConfig::try_parse_from([""])
    }

    pub fn registry(&self) -> dsx_client::Result<HttpTwinRegistry> {
        HttpTwinRegistry::connect(
            &self.hostname,
            &self.api_root,
            self.token.clone().map(WebAuth::Bearer),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = TwinConfig::try_parse_from([
            "",
            "--manufacturer-id",
            "BPNL000000000001",
            "--edc-endpoint-base",
            "https://edc.example/api/public/data/",
        ])
        .unwrap();
        assert_eq!("/api/v3.0", c.api_root);
        assert_eq!(8, c.batch_concurrency);
        assert!(c.token.is_none());
        assert!(c.registry().is_ok());
    }
}
