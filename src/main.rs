// Main binary that runs the lease agent
use clap::Parser;
use color_eyre::eyre::Result;
use leasehold_agent::{AgentConfig, Supervisor, DEFAULT_METRICS_ADDR};
use std::io::stderr;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

// Define the command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Keeps DHCP leases alive for a set of target addresses", long_about = None)]
struct Cli {
    /// Comma-separated IPv4 addresses to hold leases for
    #[arg(long, env = "TARGET_ADDRS")]
    targets: Option<String>,

    /// Address the Prometheus metrics endpoint listens on
    #[arg(long, env = "METRICS_ADDR", default_value_t = DEFAULT_METRICS_ADDR)]
    metrics_addr: SocketAddr,

    /// Run without the metrics endpoint
    #[arg(long, default_value_t = false)]
    no_metrics: bool,

    /// Seconds to wait for each DHCP reply
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Seconds between failed acquisition attempts
    #[arg(long, default_value_t = 10)]
    retry_delay_secs: u64,

    /// Hostname to announce in DHCP requests
    #[arg(long, env = "DHCP_HOSTNAME")]
    hostname: Option<String>,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn agent_config(&self) -> AgentConfig {
        let metrics_addr = (!self.no_metrics).then_some(self.metrics_addr);
        AgentConfig::new(self.targets.clone())
            .with_metrics_addr(metrics_addr)
            .with_client_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
            .with_hostname(self.hostname.clone())
    }
}

fn init_logging(verbose: bool) {
    // Respect RUST_LOG, fall back to verbose/info for our crates
    let level = if verbose { "debug" } else { "info" };
    let default_directives = format!(
        "leasehold={level},leasehold_agent={level},leasehold_dhcp={level},tower=warn,hyper=warn,axum=warn",
        level = level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match Supervisor::new(cli.agent_config()).run().await {
        Ok(reason) => {
            info!(?reason, "Leasehold stopped");
            let code = reason.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Err(e) => {
            error!("Leasehold failed to start: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
