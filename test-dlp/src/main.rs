mod scenarios;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use dlp_e2e::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Name of the scenario to run (`inspect` or `serve`)
    #[arg(short, long)]
    pub name: String,

    /// Proxy binary to start
    #[arg(long, env = "PROXY_BIN", default_value = "envoy")]
    pub proxy_bin: String,

    /// Extra arguments passed to the proxy after `-c <bootstrap>`
    #[arg(long = "proxy-arg", allow_hyphen_values = true)]
    pub proxy_args: Vec<String>,

    /// Bootstrap template with `{{admin_port}}`, `{{listener_port}}`,
    /// `{{backend_port}}` and `{{dlp_port}}` placeholders
    #[arg(short, long, env = "PROXY_BOOTSTRAP")]
    pub bootstrap: Option<PathBuf>,

    /// First port of the scenario's port range
    #[arg(
        long,
        default_value_t = dlp_e2e::driver::DEFAULT_BASE_PORT,
        value_parser = clap::value_parser!(u16).range(1..=Ports::MAX_BASE as i64),
    )]
    pub base_port: u16,

    /// Port the fake DLP server listens on; defaults to the port range
    #[arg(long)]
    pub dlp_port: Option<u16>,

    /// Number of probe requests
    #[arg(short, long, default_value_t = 10)]
    pub repeat: usize,

    /// Artificial latency of the fake DLP server, in milliseconds
    #[arg(short, long, default_value_t = 0)]
    pub delay_ms: u64,

    /// Capacity of each capture queue
    #[arg(long, default_value_t = dlp_e2e::core::DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

impl Args {
    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    fn ports(&self) -> E2eResult<Ports> {
        let mut ports = Ports::from_base(self.base_port)?;
        if let Some(dlp) = self.dlp_port {
            ports.dlp = dlp;
        }
        Ok(ports)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.name.as_str() {
        "inspect" => {
            let Some(path) = &args.bootstrap else {
                bail!("scenario `inspect` needs --bootstrap");
            };
            let bootstrap = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading bootstrap template {}", path.display()))?;
            let mut params = Params::new(args.ports()?);
            let mut scenario = scenarios::inspect::scenario(&args, bootstrap);
            scenario.run(&mut params).await?;
        }
        "serve" => scenarios::serve::run(&args).await?,
        _ => bail!("unknown scenario name {}", args.name),
    }
    Ok(())
}
