//! Command-line surface.

use crate::error::{Result, V2hError};
use crate::protocol::{ECHONET_PORT, Eoj};
use clap::{Parser, Subcommand};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

/// Control and monitor a Vehicle-to-Home unit over ECHONET Lite.
#[derive(Parser, Debug, Clone)]
#[command(name = "v2h", version, about)]
pub struct Cli {
    /// Config file [default: ~/.v2h.config.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Property catalog to use instead of the built-in one
    #[arg(long, global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Local UDP address to send from and listen on
    #[arg(long, global = true, value_name = "ADDR", default_value_t = default_bind())]
    pub bind: SocketAddr,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), ECHONET_PORT)
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Turn the V2H unit on
    On,
    /// Turn the V2H unit off
    Off,
    /// Send a single ECHONET Lite request
    SendEl {
        /// Destination object code, 6 hex digits (e.g. 027e01)
        deoj: Eoj,
        /// Service name (GET, SETC, INF_REQ, ...); unknown names fall back to GET
        esv: String,
        /// Property code, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_byte)]
        property: u8,
        /// Property data: decimal byte or 0x-prefixed hex bytes
        value: Option<Edt>,
    },
    /// Show charge/discharge status and other current values
    Status {
        /// How long to wait for all responses
        #[arg(long, value_name = "MS", default_value_t = 3000)]
        timeout_ms: u64,
    },
    /// Print every received message until interrupted
    Watch {
        /// Log raw CSV lines and save them to <launch timestamp>.csv
        #[arg(long)]
        csv: bool,
        /// Directory for the CSV log
        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
}

/// Property data given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edt(pub Vec<u8>);

impl FromStr for Edt {
    type Err = V2hError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(digits) = hex_digits(s) {
            if digits.is_empty() || digits.len() % 2 != 0 {
                return Err(V2hError::usage(format!(
                    "hex value must have an even number of digits: '{}'",
                    s
                )));
            }
            let bytes = hex::decode(digits)
                .map_err(|e| V2hError::usage(format!("invalid hex value '{}': {}", s, e)))?;
            return Ok(Edt(bytes));
        }
        Ok(Edt(vec![parse_byte(s)?]))
    }
}

/// Parse a byte written in decimal or with a `0x` prefix.
pub fn parse_byte(s: &str) -> Result<u8> {
    let parsed = match hex_digits(s) {
        Some(digits) => u8::from_str_radix(digits, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|_| V2hError::usage(format!("expected a value in 0..=255, got '{}'", s)))
}

fn hex_digits(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::V2H_EOJ;

    #[test]
    fn parses_send_el() {
        let cli = Cli::try_parse_from(["v2h", "send-el", "027e01", "SETC", "128", "0x31"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::SendEl {
                deoj: V2H_EOJ,
                esv: "SETC".into(),
                property: 0x80,
                value: Some(Edt(vec![0x31])),
            })
        );
    }

    #[test]
    fn send_el_value_is_optional() {
        let cli = Cli::try_parse_from(["v2h", "send-el", "027e01", "GET", "0xE6"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::SendEl { property: 0xe6, value: None, .. })
        ));
    }

    #[test]
    fn malformed_arguments_are_usage_errors() {
        assert!(Cli::try_parse_from(["v2h", "send-el", "27e01", "GET", "128"]).is_err());
        assert!(Cli::try_parse_from(["v2h", "send-el", "027e01", "GET", "256"]).is_err());
        assert!(Cli::try_parse_from(["v2h", "send-el", "027e01", "GET", "128", "0x3"]).is_err());
        assert!(Cli::try_parse_from(["v2h", "send-el", "027e01", "GET", "128", "-1"]).is_err());
    }

    #[test]
    fn watch_flags_and_globals() {
        let cli = Cli::try_parse_from([
            "v2h",
            "watch",
            "--csv",
            "--no-color",
            "--bind",
            "127.0.0.1:0",
        ])
        .unwrap();
        assert!(cli.no_color);
        assert_eq!(cli.bind, "127.0.0.1:0".parse().unwrap());
        assert!(matches!(cli.command, Some(Command::Watch { csv: true, .. })));
    }

    #[test]
    fn no_command_is_allowed() {
        let cli = Cli::try_parse_from(["v2h"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.bind.port(), ECHONET_PORT);
    }

    #[test]
    fn edt_accepts_multi_byte_hex() {
        assert_eq!("0x00001f40".parse::<Edt>().unwrap(), Edt(vec![0, 0, 0x1f, 0x40]));
        assert_eq!("48".parse::<Edt>().unwrap(), Edt(vec![0x30]));
        assert!("0x".parse::<Edt>().is_err());
    }
}
