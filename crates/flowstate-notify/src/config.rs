use std::time::Duration;

use clap::Parser;
use flowstate_service::HttpService;

use crate::transport::ReconnectPolicy;

#[derive(Debug, Parser)]
#[command(name = "flowstate-notify", about = "Desktop notifications for flowstate task runs")]
pub struct NotifyConfig {
    /// Server URL
    #[arg(long, env = "FLOWSTATE_SERVER_URL", default_value = "http://127.0.0.1:3710")]
    pub server_url: String,

    /// API key for authenticating with the server
    #[arg(long, env = "FLOWSTATE_API_KEY")]
    pub api_key: Option<String>,

    /// Show notifications without asking first
    #[arg(long, env = "FLOWSTATE_ALLOW_NOTIFICATIONS")]
    pub allow_notifications: bool,

    /// How long a notification stays on screen (milliseconds).
    /// Ignored on macOS, where the OS decides.
    #[arg(long, default_value = "5000")]
    pub notification_timeout_ms: u32,

    /// Stay disconnected after the stream drops instead of reconnecting
    #[arg(long)]
    pub no_reconnect: bool,

    /// First reconnect delay in seconds; doubles on each failed attempt
    #[arg(long, default_value = "1")]
    pub reconnect_initial: u64,

    /// Upper bound for the reconnect delay in seconds
    #[arg(long, default_value = "30")]
    pub reconnect_max: u64,
}

impl NotifyConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: !self.no_reconnect,
            initial_delay: Duration::from_secs(self.reconnect_initial.max(1)),
            max_delay: Duration::from_secs(self.reconnect_max.max(self.reconnect_initial)),
        }
    }

    pub fn service(&self) -> HttpService {
        match &self.api_key {
            Some(key) => HttpService::with_api_key(&self.server_url, key.clone()),
            None => HttpService::new(&self.server_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = NotifyConfig::try_parse_from(["flowstate-notify"]).unwrap();
        assert_eq!(config.notification_timeout_ms, 5000);
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
    }

    #[test]
    fn no_reconnect_flag() {
        let config =
            NotifyConfig::try_parse_from(["flowstate-notify", "--no-reconnect"]).unwrap();
        assert!(!config.reconnect_policy().enabled);
    }

    #[test]
    fn reconnect_max_never_below_initial() {
        let config = NotifyConfig::try_parse_from([
            "flowstate-notify",
            "--reconnect-initial",
            "10",
            "--reconnect-max",
            "2",
        ])
        .unwrap();
        let policy = config.reconnect_policy();
        assert_eq!(policy.initial_delay, Duration::from_secs(10));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn trailing_slash_trimmed_from_server_url() {
        let config = NotifyConfig::try_parse_from([
            "flowstate-notify",
            "--server-url",
            "http://flowstate.local:3710/",
        ])
        .unwrap();
        assert_eq!(config.service().base_url(), "http://flowstate.local:3710");
    }
}
