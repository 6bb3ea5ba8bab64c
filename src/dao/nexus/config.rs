use super::error::{NexusDaoError, NexusResult};

const DEFAULT_DATABASE_URL: &str = "https://nexus-fll-prod-default-rtdb.firebaseio.com";
const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";
const DEFAULT_LOGIN_FUNCTION_URL: &str =
    "https://us-central1-nexus-fll-prod.cloudfunctions.net/sendLoginEmail";
const DEFAULT_LOGIN_REDIRECT_URL: &str = "https://fll.nexus/login?logout=true&redirect=%2Fprofile";

/// Runtime configuration describing how to reach the remote database and identity provider.
#[derive(Debug, Clone)]
pub struct NexusConfig {
    /// Web API key sent to the identity endpoints.
    pub api_key: String,
    /// Root URL of the realtime database.
    pub database_url: String,
    /// Base URL of the identity toolkit (`accounts:*` endpoints).
    pub identity_url: String,
    /// Secure token endpoint used for refreshes.
    pub token_url: String,
    /// Cloud function that emails magic links.
    pub login_function_url: String,
    /// Page the magic link redirects to.
    pub login_redirect_url: String,
}

impl NexusConfig {
    /// Configuration targeting the production endpoints with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            login_function_url: DEFAULT_LOGIN_FUNCTION_URL.to_string(),
            login_redirect_url: DEFAULT_LOGIN_REDIRECT_URL.to_string(),
        }
    }

    /// Point every endpoint under a single base URL (used against mock servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.database_url = format!("{base}/db");
        self.identity_url = format!("{base}/identity");
        self.token_url = format!("{base}/token");
        self.login_function_url = format!("{base}/sendLoginEmail");
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> NexusResult<Self> {
        let api_key = std::env::var("NEXUS_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(NexusDaoError::MissingEnvVar {
                var: "NEXUS_API_KEY",
            })?;

        let mut config = Self::new(api_key);
        let overrides = [
            ("NEXUS_DATABASE_URL", &mut config.database_url),
            ("NEXUS_IDENTITY_URL", &mut config.identity_url),
            ("NEXUS_TOKEN_URL", &mut config.token_url),
            ("NEXUS_LOGIN_FUNCTION_URL", &mut config.login_function_url),
            ("NEXUS_LOGIN_REDIRECT_URL", &mut config.login_redirect_url),
        ];
        for (var, slot) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    *slot = value;
                }
            }
        }

        Ok(config)
    }
}
