use crate::auth::jwt::JwtConfig;

/// Default location of the workflow definition, relative to the working
/// directory.
pub const DEFAULT_WORKFLOW_CONFIG_PATH: &str = "config/workflow.json";

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the JWT
/// secret.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on draining background services at shutdown.
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Path of the workflow definition JSON.
    pub workflow_config_path: String,
    /// Interval between notification outbox polls (default: `30`).
    pub notification_poll_secs: u64,
    /// Domain appended to usernames that have no configured address.
    pub email_domain: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                    |
    /// | `WORKFLOW_CONFIG_PATH`   | `config/workflow.json`  |
    /// | `NOTIFICATION_POLL_SECS` | `30`                    |
    /// | `EMAIL_DOMAIN`           | `school.local`          |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let workflow_config_path = std::env::var("WORKFLOW_CONFIG_PATH")
            .unwrap_or_else(|_| DEFAULT_WORKFLOW_CONFIG_PATH.into());

        let notification_poll_secs: u64 = std::env::var("NOTIFICATION_POLL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("NOTIFICATION_POLL_SECS must be a valid u64");

        let email_domain = std::env::var("EMAIL_DOMAIN").unwrap_or_else(|_| "school.local".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            workflow_config_path,
            notification_poll_secs,
            email_domain,
        }
    }
}
