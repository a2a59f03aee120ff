//! Node label lookup
//!
//! Resolves the telemetry identifier of a node from one of its labels. The
//! [`NodeLabelSource`] trait keeps the scorer independent of the Kubernetes
//! API so tests can supply labels directly.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Label lookup outcome other than a value
#[derive(Debug, Error)]
pub enum LabelLookupError {
    #[error("node not found")]
    NodeNotFound,

    #[error("label not found on node")]
    LabelNotFound,

    #[error("failed to get node {node}: {message}")]
    Api { node: String, message: String },
}

impl LabelLookupError {
    /// Missing nodes and labels are expected for unlabelled hardware
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LabelLookupError::NodeNotFound | LabelLookupError::LabelNotFound
        )
    }
}

/// Source of node labels
#[async_trait]
pub trait NodeLabelSource: Send + Sync {
    /// All labels of a node
    async fn node_labels(&self, node: &str) -> Result<BTreeMap<String, String>, LabelLookupError>;

    /// Value of a single label
    async fn node_label(&self, node: &str, key: &str) -> Result<String, LabelLookupError> {
        let labels = self.node_labels(node).await?;
        labels
            .get(key)
            .cloned()
            .ok_or(LabelLookupError::LabelNotFound)
    }
}

/// Reads node labels from the Kubernetes API
#[derive(Clone)]
pub struct KubeNodeLabels {
    nodes: Api<Node>,
}

impl KubeNodeLabels {
    pub fn new(client: Client) -> Self {
        Self {
            nodes: Api::all(client),
        }
    }

    /// Connect using in-cluster configuration, falling back to kubeconfig
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }
}

#[async_trait]
impl NodeLabelSource for KubeNodeLabels {
    async fn node_labels(&self, node: &str) -> Result<BTreeMap<String, String>, LabelLookupError> {
        debug!(node = %node, "Fetching node labels");

        let found = self
            .nodes
            .get_opt(node)
            .await
            .map_err(|e| LabelLookupError::Api {
                node: node.to_string(),
                message: e.to_string(),
            })?;

        match found {
            Some(node) => Ok(node.metadata.labels.unwrap_or_default()),
            None => Err(LabelLookupError::NodeNotFound),
        }
    }
}

/// In-memory label source
///
/// Used by tests and by the CLI when labels are supplied on the command line.
#[derive(Debug, Default)]
pub struct StaticNodeLabels {
    nodes: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl StaticNodeLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node (replacing any previous labels)
    pub async fn insert_node(&self, node: impl Into<String>, labels: BTreeMap<String, String>) {
        self.nodes.write().await.insert(node.into(), labels);
    }

    /// Register a node carrying a single label
    pub async fn insert_label(
        &self,
        node: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        let mut nodes = self.nodes.write().await;
        nodes
            .entry(node.into())
            .or_default()
            .insert(key.into(), value.into());
    }
}

#[async_trait]
impl NodeLabelSource for StaticNodeLabels {
    async fn node_labels(&self, node: &str) -> Result<BTreeMap<String, String>, LabelLookupError> {
        self.nodes
            .read()
            .await
            .get(node)
            .cloned()
            .ok_or(LabelLookupError::NodeNotFound)
    }
}
