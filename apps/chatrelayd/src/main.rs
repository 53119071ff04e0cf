use std::path::PathBuf;

use chatrelay::prelude::*;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

/// Multi-room chat relay: TCP handshake, UDP fan-out.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file. Flags below override its values.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Address for the handshake listener.
    #[arg(long)]
    handshake_addr: Option<String>,

    /// Address for the relay socket.
    #[arg(long)]
    relay_addr: Option<String>,

    /// How replies are framed on both channels.
    #[arg(long, value_enum)]
    reply_framing: Option<FramingArg>,

    /// Time a client gets to send its handshake, in milliseconds. 0 disables it.
    #[arg(long)]
    handshake_timeout_ms: Option<u64>,

    /// Reject relay frames naming a room other than the token's own.
    #[arg(long)]
    enforce_room_binding: bool,

    /// Don't send posters their own messages back.
    #[arg(long)]
    no_echo: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FramingArg {
    Raw,
    Tagged,
}

impl From<FramingArg> for ReplyFraming {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Raw => ReplyFraming::Raw,
            FramingArg::Tagged => ReplyFraming::Tagged,
        }
    }
}

impl Cli {
    /// Loads the config file (or defaults) and applies the flags on top.
    fn into_config(self) -> Result<RelayConfig, ChatRelayError> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::from_json_file(path)?,
            None => RelayConfig::default(),
        };

        if let Some(addr) = self.handshake_addr {
            config.handshake_addr = addr;
        }
        if let Some(addr) = self.relay_addr {
            config.relay_addr = addr;
        }
        if let Some(framing) = self.reply_framing {
            config.reply_framing = framing.into();
        }
        if let Some(ms) = self.handshake_timeout_ms {
            config.handshake_timeout_ms = ms;
        }
        if self.enforce_room_binding {
            config.enforce_room_binding = true;
        }
        if self.no_echo {
            config.echo_to_sender = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Cli::parse().into_config()?;
    let server = ChatRelayServer::builder().config(config).build().await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    server.run_until(shutdown).await?;
    info!("chatrelayd stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("chatrelayd").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_no_flags_gives_default_config() {
        let config = parse(&[]).into_config().unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--handshake-addr",
            "0.0.0.0:7001",
            "--relay-addr",
            "0.0.0.0:7002",
            "--reply-framing",
            "tagged",
            "--handshake-timeout-ms",
            "0",
            "--enforce-room-binding",
            "--no-echo",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.handshake_addr, "0.0.0.0:7001");
        assert_eq!(config.relay_addr, "0.0.0.0:7002");
        assert_eq!(config.reply_framing, ReplyFraming::Tagged);
        assert_eq!(config.handshake_timeout(), None);
        assert!(config.enforce_room_binding);
        assert!(!config.echo_to_sender);
    }

    #[test]
    fn test_unknown_framing_is_rejected() {
        let result = Cli::try_parse_from(["chatrelayd", "--reply-framing", "fancy"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let result = parse(&["--config", "/definitely/not/here.json"]).into_config();
        assert!(matches!(result, Err(ChatRelayError::Config(_))));
    }
}
