//! elasticache-sg: idempotent ElastiCache cache security group management
//!
//! Reconciles one cache security group against the desired state given on
//! the command line and prints a JSON result record (changed flag plus the
//! final group snapshot) on stdout. Logs go to stderr.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use elasticache_sg::aws::ElastiCacheClient;
use elasticache_sg::config::{AwsSettings, GroupSpec};
use elasticache_sg::reconciler::GroupReconciler;
use elasticache_sg::wait::WaitConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Desired lifecycle state of the group
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DesiredState {
    /// Group exists with the requested ingress authorizations
    Present,
    /// Group does not exist
    Absent,
}

#[derive(Parser, Debug)]
#[command(name = "elasticache-sg")]
#[command(about = "Idempotent management of an ElastiCache cache security group")]
#[command(version)]
struct Args {
    /// Cache security group name
    #[arg(long)]
    name: String,

    /// Group description (set at creation, immutable afterwards)
    #[arg(long)]
    description: String,

    /// Comma-separated EC2 security group names to authorize ingress from
    #[arg(long)]
    peers: Option<String>,

    /// Desired state of the group
    #[arg(long, value_enum, default_value_t = DesiredState::Present)]
    state: DesiredState,

    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,

    /// Static AWS access key id (default: SDK credential chain)
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    access_key_id: Option<String>,

    /// Static AWS secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,

    /// Maximum seconds to wait for an in-progress ingress revocation
    /// (0 = wait indefinitely)
    #[arg(long, default_value = "300")]
    wait_timeout: u64,

    /// Seconds between polls while waiting for a revocation
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    // Print main error message
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    // Print error chain (causes)
    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    }
}

async fn run() -> Result<()> {
    // Logs on stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let peers = args
        .peers
        .as_deref()
        .map(GroupSpec::parse_peer_groups)
        .unwrap_or_default();
    let spec = GroupSpec::new(args.name, args.description, peers)?;

    let settings = AwsSettings {
        region: args.region,
        profile: args.aws_profile,
        access_key_id: args.access_key_id,
        secret_access_key: args.secret_access_key,
    };

    info!(
        group = %spec.name,
        region = %settings.region,
        state = ?args.state,
        peers = spec.peer_groups.len(),
        "Starting reconciliation"
    );

    let wait = WaitConfig {
        interval: Duration::from_secs(args.poll_interval),
        timeout: (args.wait_timeout > 0).then(|| Duration::from_secs(args.wait_timeout)),
    };

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let client = ElastiCacheClient::new(&settings).await;
    let mut reconciler = GroupReconciler::new(client, spec)
        .with_wait_config(wait)
        .with_cancellation(cancel);

    match args.state {
        DesiredState::Present => reconciler.ensure_present().await?,
        DesiredState::Absent => reconciler.ensure_absent().await?,
    }

    let report = reconciler.into_report();
    info!(changed = report.changed, "Reconciliation finished");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
