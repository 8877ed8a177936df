use anyhow::Context;
use secrecy::SecretString;
use tracing::warn;

pub const INSECURE_DEV_SECRET: &str = "dev_secret_key_not_secure";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug)]
pub struct StreamConfig {
    pub api_key: String,
    pub api_secret: SecretString,
    pub base_url: String,
}

#[derive(Debug)]
pub struct OpenRouterConfig {
    /// Optional at startup; the chat route reports its absence per request.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub app_url: String,
}

#[derive(Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub stream: StreamConfig,
    pub openrouter: OpenRouterConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).with_context(|| format!("{key} must be set"));

        let secret = match get("JWT_SECRET") {
            Some(s) => s,
            None => {
                warn!("JWT_SECRET is not set; falling back to an insecure development secret");
                INSECURE_DEV_SECRET.to_string()
            }
        };

        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "chat-relay".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "chat-relay-users".into()),
            ttl_minutes: get("JWT_TTL_MINUTES")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24 * 60),
        };

        let stream = StreamConfig {
            api_key: require("STREAM_API_KEY")?,
            api_secret: SecretString::from(require("STREAM_API_SECRET")?),
            base_url: get("STREAM_BASE_URL")
                .unwrap_or_else(|| "https://chat.stream-io-api.com".into()),
        };

        let openrouter = OpenRouterConfig {
            api_key: get("OPENROUTER_API_KEY").map(SecretString::from),
            model: get("OPENROUTER_MODEL")
                .unwrap_or_else(|| "tngtech/deepseek-r1t2-chimera:free".into()),
            app_url: get("APP_URL").unwrap_or_else(|| "http://localhost:5000".into()),
        };

        let port = get("PORT")
            .or_else(|| get("APP_PORT"))
            .map(|v| v.parse::<u16>().with_context(|| format!("invalid port {v:?}")))
            .transpose()?
            .unwrap_or(5000);

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            jwt,
            stream,
            openrouter,
        })
    }
}
