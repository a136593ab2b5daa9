use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use perf_analyzer_client::{
    cli::{BATCH_WINDOW, Cli, Command, batch_window},
    feature::Feature,
    host::{Host, Scope, pretty_json},
    settle::Settle,
    state::FeatureState,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    // Logs go to stderr so stdout only carries command output.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        return Ok(());
    };

    let settle = cli.target.settle()?;
    let host = Host::new(cli.target.host_config(), cli.target.cluster_config())
        .context("failed to build HTTP client")?;
    info!(%host, ?command, "running command");

    match command {
        Command::Verify => {
            let pretty = host
                .get_pretty_cluster_config()
                .await
                .with_context(|| format!("failed to read cluster config from {host}"))?;
            println!("{pretty}");
            host.verify_cluster_config()
                .await
                .context("cluster verification failed")?;
            println!("cluster config verified");
        }
        Command::GetState => {
            println!("{}", host.get_cluster_state().await?);
            println!("{}", host.get_node_state().await?);
        }
        Command::EnableMetrics => {
            enable_and_report(&host, Feature::Pa, &settle).await?;
        }
        Command::EnableBatch => {
            enable_and_report(&host, Feature::Batch, &settle).await?;
        }
        Command::GetMetrics => {
            let metrics = host.get_metrics().await.context("failed to fetch metrics")?;
            println!("{}", pretty_json(&metrics));
        }
        Command::GetBatch(args) => {
            let options = args.batch_options()?;
            let (start, end) = batch_window(SystemTime::now(), BATCH_WINDOW);
            let metrics = host
                .get_batch_metrics(start, end, options)
                .await
                .context("failed to fetch batch metrics")?;
            println!("{}", pretty_json(&metrics));
        }
        Command::Reset => {
            host.reset_state().await.context("failed to reset state")?;
            report_settled(&host, &settle, |state| !state.feature(Feature::Pa)).await?;
        }
    }

    Ok(())
}

/// Enables `feature` cluster-wide, waits for it to settle and prints both states.
async fn enable_and_report(host: &Host, feature: Feature, settle: &Settle) -> Result<()> {
    host.toggle(feature, true, Scope::Cluster)
        .await
        .with_context(|| format!("failed to enable {feature}"))?;

    // Secondary features only stick while the primary one is on.
    report_settled(host, settle, |state| {
        state.feature(feature) || (feature != Feature::Pa && !state.feature(Feature::Pa))
    })
    .await
}

/// Reads both scopes once `settle` allows and prints cluster then node state.
async fn report_settled<A>(host: &Host, settle: &Settle, settled: A) -> Result<()>
where
    A: Fn(&FeatureState) -> bool,
{
    let cluster = host.await_cluster_state(settle, &settled).await?;
    // A fixed delay has already elapsed; only polling needs to wait again.
    let node_settle = match settle {
        Settle::Poll { .. } => *settle,
        _ => Settle::Immediate,
    };
    let node = host.await_node_state(&node_settle, &settled).await?;

    println!("{cluster}");
    println!("{node}");
    Ok(())
}
