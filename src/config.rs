use std::time::Duration;

use clap::Parser;
use tracing::warn;

use crate::error::ConfigError;
use crate::listener::Transport;
use crate::sinks::librato::DEFAULT_URL;

/// Aggregates statsd packets and ships them to Librato or another statsd.
#[derive(Debug, Clone, Parser)]
#[command(name = "statsd-relay", version, about)]
pub struct Args {
    /// Listen address for inbound metrics
    #[arg(long, env = "STATSD_ADDRESS", default_value = "0.0.0.0:8125")]
    pub address: String,

    /// Inbound transport
    #[arg(long, value_enum, default_value = "udp")]
    pub transport: Transport,

    /// Listen address for the admin HTTP interface
    #[arg(long = "admin-address", default_value = "127.0.0.1:8126")]
    pub admin_address: String,

    /// Disable the admin HTTP interface
    #[arg(long = "no-admin")]
    pub no_admin: bool,

    /// Interval at which data is sent, in seconds
    #[arg(long = "flush", env = "STATSD_FLUSH", default_value_t = 60)]
    pub flush_secs: u64,

    /// Comma separated percentiles to calculate for timers (eg. "95,99.5")
    #[arg(long, env = "STATSD_PERCENTILES", default_value = "")]
    pub percentiles: String,

    /// Forward raw samples to this statsd (host:port) instead of Librato
    #[arg(long, env = "STATSD_PROXY")]
    pub proxy: Option<String>,

    /// Librato API user
    #[arg(long, env = "LIBRATO_USER")]
    pub user: Option<String>,

    /// Librato API token
    #[arg(long, env = "LIBRATO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Source attached to every submission
    #[arg(long, env = "LIBRATO_SOURCE")]
    pub source: Option<String>,

    /// Librato metrics endpoint
    #[arg(long = "librato-url", default_value = DEFAULT_URL)]
    pub librato_url: String,

    /// Include a median in timer summaries
    #[arg(long)]
    pub median: bool,

    /// Log inputs and submissions
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    Librato {
        url: String,
        user: String,
        token: String,
    },
    Proxy {
        addr: String,
    },
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub address: String,
    pub transport: Transport,
    pub admin_address: Option<String>,
    pub flush_interval: Duration,
    pub percentiles: Vec<f64>,
    pub sink: SinkConfig,
    pub source: Option<String>,
    pub median: bool,
}

impl TryFrom<Args> for RelayConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if args.flush_secs == 0 {
            return Err(ConfigError::ZeroFlushInterval);
        }

        let sink = match args.proxy {
            Some(addr) => SinkConfig::Proxy { addr },
            None => SinkConfig::Librato {
                url: args.librato_url,
                user: non_empty(args.user).ok_or(ConfigError::MissingLibratoUser)?,
                token: non_empty(args.token).ok_or(ConfigError::MissingLibratoToken)?,
            },
        };

        Ok(Self {
            address: args.address,
            transport: args.transport,
            admin_address: (!args.no_admin).then_some(args.admin_address),
            flush_interval: Duration::from_secs(args.flush_secs),
            percentiles: parse_percentiles(&args.percentiles),
            sink,
            source: non_empty(args.source),
            median: args.median,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Parse `"95,99.5"`. Entries that are not numbers strictly between 0 and
/// 100 are logged and skipped.
pub fn parse_percentiles(raw: &str) -> Vec<f64> {
    let mut out = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match entry.parse::<f64>() {
            Ok(p) if p > 0.0 && p < 100.0 => {
                if !out.contains(&p) {
                    out.push(p);
                }
            }
            Ok(p) => warn!(percentile = p, "Ignoring percentile outside (0, 100)."),
            Err(e) => warn!(entry, error = %e, "Error parsing percentile as float."),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<RelayConfig, ConfigError> {
        let mut argv = vec!["statsd-relay"];
        argv.extend_from_slice(args);
        RelayConfig::try_from(Args::try_parse_from(argv).expect("valid cli"))
    }

    #[test]
    fn proxy_mode_needs_no_credentials() {
        let cfg = parse(&["--proxy", "10.0.0.1:8125", "--flush", "10"]).unwrap();
        assert_eq!(
            cfg.sink,
            SinkConfig::Proxy {
                addr: "10.0.0.1:8125".into()
            }
        );
        assert_eq!(cfg.flush_interval, Duration::from_secs(10));
        assert_eq!(cfg.transport, Transport::Udp);
        assert_eq!(cfg.admin_address.as_deref(), Some("127.0.0.1:8126"));
    }

    #[test]
    fn librato_mode_requires_user_and_token() {
        assert!(matches!(
            parse(&["--token", "t", "--user", ""]),
            Err(ConfigError::MissingLibratoUser)
        ));
        assert!(matches!(
            parse(&["--user", "u", "--token", ""]),
            Err(ConfigError::MissingLibratoToken)
        ));

        let cfg = parse(&["--user", "u", "--token", "t", "--source", "app01"]).unwrap();
        assert_eq!(
            cfg.sink,
            SinkConfig::Librato {
                url: DEFAULT_URL.into(),
                user: "u".into(),
                token: "t".into(),
            }
        );
        assert_eq!(cfg.source.as_deref(), Some("app01"));
    }

    #[test]
    fn zero_flush_interval_is_rejected() {
        assert!(matches!(
            parse(&["--proxy", "x:1", "--flush", "0"]),
            Err(ConfigError::ZeroFlushInterval)
        ));
    }

    #[test]
    fn debug_flag_is_accepted_in_proxy_mode() {
        let args = Args::try_parse_from(["statsd-relay", "--proxy", "x:1", "--debug"]).unwrap();
        assert!(args.debug);
        let cfg = RelayConfig::try_from(args).unwrap();
        assert_eq!(cfg.sink, SinkConfig::Proxy { addr: "x:1".into() });
    }

    #[test]
    fn tcp_transport_and_disabled_admin() {
        let cfg = parse(&["--proxy", "x:1", "--transport", "tcp", "--no-admin"]).unwrap();
        assert_eq!(cfg.transport, Transport::Tcp);
        assert!(cfg.admin_address.is_none());
    }

    #[test]
    fn percentile_list_skips_bad_entries() {
        assert_eq!(parse_percentiles(""), Vec::<f64>::new());
        assert_eq!(parse_percentiles("95,99.5"), vec![95.0, 99.5]);
        assert_eq!(parse_percentiles(" 90 , abc, 100, 0, -5, 90, 50"), vec![90.0, 50.0]);
    }
}
