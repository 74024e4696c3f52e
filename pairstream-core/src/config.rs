use std::env;

use tracing::warn;

/// Runtime configuration, loaded from the environment.
///
/// Every key has a default so the service can boot from a bare shell;
/// missing keys are logged once at load time.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub version: String,
    /// `SERVICE_HTTPS=1`. TLS termination itself is delegated to the
    /// deployment; the flag only produces a startup warning here.
    pub https: bool,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    /// Target of the `GET /` redirect, when set.
    pub frontend_url: Option<String>,
    /// Shell script executed by the `POST /event` webhook.
    pub event_script: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = match lookup("SERVICE_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "SERVICE_PORT is not a valid port, using 8080");
                8080
            }),
            None => {
                warn!("SERVICE_PORT not set, using 8080");
                8080
            }
        };

        Config {
            service_name: env_or(&lookup, "SERVICE_NAME", "pairstream"),
            host: env_or(&lookup, "SERVICE_HOST", "0.0.0.0"),
            port,
            version: env_or(&lookup, "VERSION", "1.0.0"),
            https: lookup("SERVICE_HTTPS").as_deref() == Some("1"),
            cert_file: lookup("SERVICE_CERT"),
            key_file: lookup("SERVICE_KEY"),
            frontend_url: lookup("FRONTEND_URL"),
            event_script: env_or(&lookup, "EVENT_SCRIPT", "./bin/redeploy.sh"),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| {
        warn!(key, default, "environment variable not set, using default");
        default.to_string()
    })
}
