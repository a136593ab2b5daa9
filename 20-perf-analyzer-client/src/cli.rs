use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};

use crate::config::{
    ClusterConfig, DEFAULT_HOSTNAME, DEFAULT_METRICS_PORT, DEFAULT_NODES, DEFAULT_PORT,
    DEFAULT_SCHEME, DEFAULT_VERSION, HostConfig,
};
use crate::host::BatchOptions;
use crate::settle::Settle;

/// How far back `get_batch` looks.
pub const BATCH_WINDOW: Duration = Duration::from_secs(3 * 60);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
#[command(rename_all = "snake_case")]
pub enum Command {
    /// Print root info, nodes and plugins, then check them against the expected topology.
    Verify,
    /// Print the cluster state followed by the node state.
    GetState,
    /// Enable the performance analyzer cluster-wide and print the resulting states.
    EnableMetrics,
    /// Fetch current latency and CPU metrics from the metrics port.
    GetMetrics,
    /// Enable batch metrics cluster-wide and print the resulting states.
    EnableBatch,
    /// Fetch batch metrics for the last three minutes.
    GetBatch(GetBatchArgs),
    /// Disable the performance analyzer at cluster and node scope.
    Reset,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GetBatchArgs {
    /// Optional `period=N` and `maxdatapoints=N`, in any order.
    #[arg(num_args = 0..=2, value_parser = parse_batch_arg)]
    pub options: Vec<BatchArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchArg {
    Period(u64),
    MaxDatapoints(u64),
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Protocol used to reach the cluster.
    #[arg(long, global = true, default_value = DEFAULT_SCHEME)]
    pub scheme: String,

    /// Hostname of the node to talk to.
    #[arg(long, global = true, default_value = DEFAULT_HOSTNAME)]
    pub host: String,

    /// REST port of the node.
    #[arg(long, global = true, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Port the performance analyzer serves metrics on.
    #[arg(long, global = true, default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 1000)]
    pub timeout_ms: u64,

    /// Version the cluster must report for `verify` to pass.
    #[arg(long, global = true, default_value = DEFAULT_VERSION)]
    pub expected_version: String,

    /// Node expected in the cluster. Repeat for each node; defaults to the
    /// two-node test cluster.
    #[arg(long = "expected-node", global = true)]
    pub expected_nodes: Vec<String>,

    /// Delay between a toggle and the read that reports it, in milliseconds.
    #[arg(long, global = true, default_value_t = 100)]
    pub settle_ms: u64,

    /// Poll every `--settle-ms` until the toggle is visible instead of sleeping once.
    #[arg(long, global = true)]
    pub poll: bool,

    /// Give up polling after this many milliseconds.
    #[arg(long, global = true, default_value_t = 5000)]
    pub poll_timeout_ms: u64,
}

impl TargetArgs {
    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            scheme: self.scheme.clone(),
            hostname: self.host.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        let nodes = if self.expected_nodes.is_empty() {
            DEFAULT_NODES.iter().map(|node| node.to_string()).collect()
        } else {
            self.expected_nodes.clone()
        };
        ClusterConfig::new(self.expected_version.clone(), nodes)
    }

    /// A zero `--settle-ms` is allowed as a fixed delay but not as a poll interval.
    pub fn settle(&self) -> Result<Settle> {
        let interval = Duration::from_millis(self.settle_ms);
        if !self.poll {
            return Ok(Settle::Fixed(interval));
        }
        if interval.is_zero() {
            bail!("--poll needs a non-zero --settle-ms interval");
        }
        Ok(Settle::Poll {
            interval,
            timeout: Duration::from_millis(self.poll_timeout_ms),
        })
    }
}

impl GetBatchArgs {
    /// Folds the parsed tokens into request options. Each knob may appear once.
    pub fn batch_options(&self) -> Result<BatchOptions> {
        let mut options = BatchOptions::default();
        for arg in &self.options {
            match *arg {
                BatchArg::Period(_) if options.period.is_some() => {
                    bail!("period given more than once")
                }
                BatchArg::MaxDatapoints(_) if options.max_datapoints.is_some() => {
                    bail!("maxdatapoints given more than once")
                }
                BatchArg::Period(period) => options.period = Some(period),
                BatchArg::MaxDatapoints(max) => options.max_datapoints = Some(max),
            }
        }
        Ok(options)
    }
}

fn parse_batch_arg(token: &str) -> Result<BatchArg, String> {
    let (name, value) = token
        .split_once('=')
        .ok_or_else(|| format!("expected period=N or maxdatapoints=N, got '{token}'"))?;
    let value: u64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a non-negative integer"))?;
    match name {
        "period" => Ok(BatchArg::Period(value)),
        "maxdatapoints" => Ok(BatchArg::MaxDatapoints(value)),
        other => Err(format!("unknown batch option '{other}'")),
    }
}

/// Start and end of the batch window ending at `now`, in epoch milliseconds.
pub fn batch_window(now: SystemTime, span: Duration) -> (u64, u64) {
    let end = now
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_millis() as u64)
        .unwrap_or(0);
    let start = end.saturating_sub(span.as_millis() as u64);
    (start, end)
}
