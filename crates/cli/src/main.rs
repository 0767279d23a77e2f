use clap::{Parser, Subcommand};
use lib::{bus, BusReceiver, ChannelInfo, GatewayMessage, DEFAULT_BUS_CAPACITY};
use matrix_channel::MatrixAdapter;
use std::future::Future;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "bridge")]
#[command(about = "Bridge CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Connect the configured Matrix account, join its channels, and print bridged messages as JSON lines.
    /// Lines typed on stdin are sent to --channel.
    Run {
        /// Config file path (default: BRIDGE_CONFIG_PATH or ~/.bridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Channel that stdin lines are sent to (must be one of the configured channels).
        #[arg(long, value_name = "NAME")]
        channel: Option<String>,

        /// Username prefixed to relayed stdin lines.
        #[arg(long, default_value = "")]
        nick: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("bridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run {
            config,
            channel,
            nick,
        }) => {
            if let Err(e) = run(config, channel, nick).await {
                log::error!("bridge failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run(
    config_path: Option<PathBuf>,
    channel: Option<String>,
    nick: String,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    log::info!("loaded config from {}", path.display());
    config.matrix.password = lib::config::resolve_matrix_password(&config);
    if config.matrix.server.trim().is_empty() {
        anyhow::bail!("matrix.server is not configured in {}", path.display());
    }

    let (bus_tx, mut bus_rx) = bus(DEFAULT_BUS_CAPACITY);
    let channels = config.matrix.channels.clone();
    let adapter = MatrixAdapter::new(config.matrix, bus_tx);
    adapter.connect().await?;
    for ch in &channels {
        if let Err(e) = adapter.join_channel(ch).await {
            log::warn!("could not join {}: {}", ch.name, e);
        }
    }
    if let Some(ref name) = channel {
        if !channels.iter().any(|c| &c.name == name) {
            log::warn!("--channel {} is not in the configured channels", name);
        }
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("could not listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let stop = pump(&adapter, &mut bus_rx, stdin, interrupted, channel.as_deref(), &nick).await?;
    log::info!("{}, shutting down", stop);

    adapter.disconnect().await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Interrupted,
    InputClosed,
    BusClosed,
}

impl std::fmt::Display for Stop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stop::Interrupted => write!(f, "interrupted"),
            Stop::InputClosed => write!(f, "stdin closed"),
            Stop::BusClosed => write!(f, "bus closed"),
        }
    }
}

/// Print bus messages and relay input lines until `shutdown` resolves or either side closes.
/// `shutdown` is polled by reference across iterations so a signal is never missed.
async fn pump<R, S>(
    adapter: &MatrixAdapter,
    bus_rx: &mut BusReceiver,
    input: R,
    shutdown: S,
    channel: Option<&str>,
    nick: &str,
) -> anyhow::Result<Stop>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(Stop::Interrupted),
            msg = bus_rx.recv() => {
                let Some(msg) = msg else { return Ok(Stop::BusClosed) };
                println!("{}", serde_json::to_string(&msg)?);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(Stop::InputClosed) };
                relay_line(adapter, channel, nick, &line).await;
            }
        }
    }
}

/// Send one stdin line to the relay channel; failures are logged, not fatal.
async fn relay_line(adapter: &MatrixAdapter, channel: Option<&str>, nick: &str, line: &str) {
    let line = line.trim_end();
    if line.is_empty() {
        return;
    }
    let Some(channel) = channel else {
        log::warn!("no --channel given, dropping input line");
        return;
    };
    let msg = GatewayMessage::new(nick, line, channel).from_account(adapter.account(), "");
    if let Err(e) = adapter.send(&msg).await {
        log::warn!("send to {} failed: {}", channel, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib::config::MatrixConfig;

    fn adapter() -> (MatrixAdapter, BusReceiver) {
        let (tx, rx) = bus(DEFAULT_BUS_CAPACITY);
        (MatrixAdapter::new(MatrixConfig::default(), tx), rx)
    }

    #[tokio::test]
    async fn shutdown_wins_over_busy_input() {
        let (adapter, mut rx) = adapter();
        let input = "line\n".repeat(2000);
        let stop = pump(&adapter, &mut rx, input.as_bytes(), async {}, None, "")
            .await
            .unwrap();
        assert_eq!(stop, Stop::Interrupted);
    }

    #[tokio::test]
    async fn shutdown_signalled_mid_loop_is_observed() {
        let (adapter, mut rx) = adapter();
        let (_writer, reader) = tokio::io::duplex(64);
        let (fire, fired) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async {
            let _ = fired.await;
        };
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let _ = fire.send(());
        });
        let stop = pump(&adapter, &mut rx, BufReader::new(reader), shutdown, None, "")
            .await
            .unwrap();
        assert_eq!(stop, Stop::Interrupted);
    }

    #[tokio::test]
    async fn closed_input_ends_the_loop() {
        let (adapter, mut rx) = adapter();
        let stop = pump(&adapter, &mut rx, &b""[..], std::future::pending(), None, "")
            .await
            .unwrap();
        assert_eq!(stop, Stop::InputClosed);
    }
}
