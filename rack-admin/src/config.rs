//! Admin service configuration

use rack_client::ClientConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port (env: HTTP_PORT)
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Allowed browser origin; `None` or `*` allows any (env: CORS_ORIGIN)
    pub cors_origin: Option<String>,
    pub client: ClientConfig,
}

impl Config {
    /// Load from env. Outside development the service-role key is required.
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let client = ClientConfig::from_env();

        if client.service_role_key.is_none() && !is_development(&environment) {
            return Err(
                format!("SUPABASE_SERVICE_ROLE_KEY must be set in {environment} environment").into(),
            );
        }

        Ok(Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment,
            cors_origin: std::env::var("CORS_ORIGIN")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty() && s != "*"),
            client,
        })
    }

    pub fn is_development(&self) -> bool {
        is_development(&self.environment)
    }
}

fn is_development(environment: &str) -> bool {
    environment.eq_ignore_ascii_case("development")
}
