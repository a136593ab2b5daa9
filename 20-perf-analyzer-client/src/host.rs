//! HTTP operations against the cluster's admin API.
//!
//! Every method issues its requests one after another and stops at the
//! first failure. Non-2xx responses and timeouts both surface as
//! [`ClientError::Http`].

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{ClusterConfig, HostConfig};
use crate::error::{ClientError, ConfigMismatch, DecodeError, Result};
use crate::feature::Feature;
use crate::settle::Settle;
use crate::state::FeatureState;

const ANALYZER_PATH: &str = "/_opendistro/_performanceanalyzer";
pub const CLUSTER_CONFIG_PATH: &str = "/_opendistro/_performanceanalyzer/cluster/config";
pub const NODE_CONFIG_PATH: &str = "/_opendistro/_performanceanalyzer/config";
pub const NODES_PATH: &str = "/_cat/nodes?v";
pub const PLUGINS_PATH: &str = "/_cat/plugins?v";
pub const PLUGIN_NAME: &str = "opendistro_performance_analyzer";

const METRICS_PATH: &str = "/_opendistro/_performanceanalyzer/metrics\
    ?metrics=Latency,CPU_Utilization&agg=avg,max&dim=ShardID&nodes=all";
const BATCH_PATH: &str = "/_opendistro/_performanceanalyzer/batch?metrics=Latency,CPU_Utilization";

/// Which config store a toggle or read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Cluster,
    Node,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Cluster => f.write_str("cluster"),
            Scope::Node => f.write_str("node"),
        }
    }
}

/// Optional knobs for the batch metrics request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub period: Option<u64>,
    pub max_datapoints: Option<u64>,
}

/// Path of the toggle endpoint for `feature` at `scope`.
///
/// The primary feature is toggled at the bare config path, every other
/// feature under its own segment, e.g. `.../batch/cluster/config`.
pub fn toggle_path(feature: Feature, scope: Scope) -> String {
    let segment = feature
        .spec()
        .path_segment
        .map(|segment| format!("/{segment}"))
        .unwrap_or_default();
    match scope {
        Scope::Cluster => format!("{ANALYZER_PATH}{segment}/cluster/config"),
        Scope::Node => format!("{ANALYZER_PATH}{segment}/config"),
    }
}

/// Renders JSON with four-space indentation.
pub fn pretty_json(value: &Value) -> String {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => value.to_string(),
    }
}

pub struct Host {
    config: HostConfig,
    cluster: ClusterConfig,
    client: reqwest::Client,
}

impl Host {
    pub fn new(config: HostConfig, cluster: ClusterConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            cluster,
            client,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn cluster_config(&self) -> &ClusterConfig {
        &self.cluster
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    fn metrics_url(&self, path: &str) -> String {
        format!("{}{}", self.config.metrics_base_url(), path)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|err| DecodeError::Json(err).into())
    }

    /// Root info, node listing and plugin listing, concatenated for display.
    pub async fn get_pretty_cluster_config(&self) -> Result<String> {
        let root = self.get_json(&self.url("/")).await?;
        let nodes = self.get_text(&self.url(NODES_PATH)).await?;
        let plugins = self.get_text(&self.url(PLUGINS_PATH)).await?;
        Ok(format!("{}\n\n{nodes}\n{plugins}", pretty_json(&root)))
    }

    /// Checks the cluster against the expected [`ClusterConfig`].
    ///
    /// The node and plugin checks are plain substring matches on the
    /// `_cat` listings, not a parse of their columns.
    pub async fn verify_cluster_config(&self) -> Result<()> {
        let root = self.get_json(&self.url("/")).await?;
        let version = root
            .pointer("/version/number")
            .ok_or(DecodeError::MissingField("version.number"))?
            .as_str()
            .ok_or_else(|| DecodeError::WrongType {
                field: "version.number".into(),
                expected: "a string",
            })?;
        if version != self.cluster.version() {
            return Err(mismatch(ConfigMismatch::Version {
                expected: self.cluster.version().to_string(),
                actual: version.to_string(),
            }));
        }
        let name = root
            .get("name")
            .ok_or(DecodeError::MissingField("name"))?
            .as_str()
            .ok_or_else(|| DecodeError::WrongType {
                field: "name".into(),
                expected: "a string",
            })?;
        if !self.cluster.expects_node(name) {
            return Err(mismatch(ConfigMismatch::UnexpectedNode(name.to_string())));
        }

        let nodes = self.get_text(&self.url(NODES_PATH)).await?;
        if let Some(node) = self.cluster.nodes().iter().find(|n| !nodes.contains(n.as_str())) {
            return Err(mismatch(ConfigMismatch::MissingNode(node.clone())));
        }

        let plugins = self.get_text(&self.url(PLUGINS_PATH)).await?;
        if let Some(node) = self
            .cluster
            .nodes()
            .iter()
            .find(|n| !plugins.contains(&format!("{n} {PLUGIN_NAME}")))
        {
            return Err(mismatch(ConfigMismatch::MissingPlugin(node.clone())));
        }

        info!(version, nodes = ?self.cluster.nodes(), "cluster config verified");
        Ok(())
    }

    pub async fn get_cluster_state(&self) -> Result<FeatureState> {
        let body = self.get_json(&self.url(CLUSTER_CONFIG_PATH)).await?;
        let state = codec::decode_cluster(&body)?;
        info!(scope = %Scope::Cluster, %state, "read state");
        Ok(state)
    }

    pub async fn get_node_state(&self) -> Result<FeatureState> {
        let body = self.get_json(&self.url(NODE_CONFIG_PATH)).await?;
        let state = codec::decode_node(&body)?;
        info!(scope = %Scope::Node, %state, "read state");
        Ok(state)
    }

    pub async fn get_state(&self, scope: Scope) -> Result<FeatureState> {
        match scope {
            Scope::Cluster => self.get_cluster_state().await,
            Scope::Node => self.get_node_state().await,
        }
    }

    /// Reads the state at `scope` using `settle` until `accept` holds.
    pub async fn await_state<A>(
        &self,
        scope: Scope,
        settle: &Settle,
        accept: A,
    ) -> Result<FeatureState>
    where
        A: Fn(&FeatureState) -> bool,
    {
        settle.wait_for(|| self.get_state(scope), accept).await
    }

    pub async fn await_cluster_state<A>(&self, settle: &Settle, accept: A) -> Result<FeatureState>
    where
        A: Fn(&FeatureState) -> bool,
    {
        self.await_state(Scope::Cluster, settle, accept).await
    }

    pub async fn await_node_state<A>(&self, settle: &Settle, accept: A) -> Result<FeatureState>
    where
        A: Fn(&FeatureState) -> bool,
    {
        self.await_state(Scope::Node, settle, accept).await
    }

    /// Turns a feature on or off by key.
    ///
    /// Unknown keys fail before any request is sent. Some feature and scope
    /// combinations are rejected by the plugin; those come back as
    /// [`ClientError::Http`].
    pub async fn enable_feature(&self, feature: &str, enable: bool, scope: Scope) -> Result<()> {
        let feature: Feature = feature.parse()?;
        self.toggle(feature, enable, scope).await
    }

    pub async fn toggle(&self, feature: Feature, enable: bool, scope: Scope) -> Result<()> {
        let url = self.url(&toggle_path(feature, scope));
        debug!(%url, enable, "POST");
        self.client
            .post(&url)
            .json(&json!({ "enabled": enable }))
            .send()
            .await?
            .error_for_status()?;
        info!(%feature, %scope, enable, "toggled feature");
        Ok(())
    }

    pub async fn get_metrics(&self) -> Result<Value> {
        let metrics = self.get_json(&self.metrics_url(METRICS_PATH)).await?;
        debug!(%metrics, "metrics");
        Ok(metrics)
    }

    /// Batch metrics between `start` and `end`, both in epoch milliseconds.
    pub async fn get_batch_metrics(
        &self,
        start: u64,
        end: u64,
        options: BatchOptions,
    ) -> Result<Value> {
        let mut path = format!("{BATCH_PATH}&starttime={start}&endtime={end}");
        if let Some(period) = options.period {
            path.push_str(&format!("&period={period}"));
        }
        if let Some(max_datapoints) = options.max_datapoints {
            path.push_str(&format!("&maxdatapoints={max_datapoints}"));
        }
        let metrics = self.get_json(&self.metrics_url(&path)).await?;
        debug!(%metrics, "batch metrics");
        Ok(metrics)
    }

    pub async fn reset_cluster_state(&self) -> Result<()> {
        self.toggle(Feature::Pa, false, Scope::Cluster).await
    }

    pub async fn reset_node_state(&self) -> Result<()> {
        self.toggle(Feature::Pa, false, Scope::Node).await
    }

    /// Disables the primary feature at both scopes, which turns the
    /// dependent features off with it.
    pub async fn reset_state(&self) -> Result<()> {
        self.reset_cluster_state().await?;
        self.reset_node_state().await
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.config.base_url())
    }
}

fn mismatch(check: ConfigMismatch) -> ClientError {
    warn!(%check, "cluster verification failed");
    ClientError::ConfigMismatch(check)
}
