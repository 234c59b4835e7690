use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which document store backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StoreBackend::Memory),
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Whether a patient may withdraw an appointment the doctor already approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalPolicy {
    #[default]
    RequestedOnly,
    RequestedOrApproved,
}

impl FromStr for WithdrawalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requested_only" => Ok(WithdrawalPolicy::RequestedOnly),
            "requested_or_approved" => Ok(WithdrawalPolicy::RequestedOrApproved),
            other => Err(format!("unknown withdrawal policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub withdrawal_policy: WithdrawalPolicy,
    pub subscription_poll_interval_ms: u64,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            withdrawal_policy: WithdrawalPolicy::default(),
            subscription_poll_interval_ms: 2000,
            server_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            store_backend: parse_var("STORE_BACKEND", defaults.store_backend),
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            withdrawal_policy: parse_var("APPOINTMENT_WITHDRAWAL_POLICY", defaults.withdrawal_policy),
            subscription_poll_interval_ms: parse_var(
                "SUBSCRIPTION_POLL_INTERVAL_MS",
                defaults.subscription_poll_interval_ms,
            ),
            server_port: parse_var("SERVER_PORT", defaults.server_port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let store_ready = match self.store_backend {
            StoreBackend::Memory => true,
            StoreBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
            }
        };

        store_ready && !self.supabase_jwt_secret.is_empty()
    }

    pub fn subscription_poll_interval(&self) -> Duration {
        Duration::from_millis(self.subscription_poll_interval_ms.max(50))
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("{} is invalid ({}), using default {:?}", name, e, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {:?}", name, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_backend_names() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("Supabase".parse::<StoreBackend>(), Ok(StoreBackend::Supabase));
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn parses_withdrawal_policy() {
        assert_eq!(
            "requested_or_approved".parse::<WithdrawalPolicy>(),
            Ok(WithdrawalPolicy::RequestedOrApproved)
        );
        assert_eq!(WithdrawalPolicy::default(), WithdrawalPolicy::RequestedOnly);
    }

    #[test]
    fn memory_backend_only_needs_jwt_secret() {
        let mut config = AppConfig::default();
        assert!(!config.is_configured());

        config.supabase_jwt_secret = "secret".to_string();
        assert!(config.is_configured());

        config.store_backend = StoreBackend::Supabase;
        assert!(!config.is_configured());
    }
}
