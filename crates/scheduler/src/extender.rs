//! Wire types of the kube-scheduler extender protocol

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use scheduler_lib::NodeScore;
use serde::{Deserialize, Serialize};

/// Object carrying only metadata; the rest of the pod or node is ignored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataOnly {
    #[serde(default)]
    pub metadata: ObjectMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeList {
    #[serde(default)]
    pub items: Vec<MetadataOnly>,
}

/// Request body of the prioritize verb
///
/// Depending on `nodeCacheCapable`, kube-scheduler sends either full node
/// objects or just their names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtenderArgs {
    #[serde(default)]
    pub pod: Option<MetadataOnly>,
    #[serde(default)]
    pub nodes: Option<NodeList>,
    #[serde(default, rename = "nodenames")]
    pub node_names: Option<Vec<String>>,
}

impl ExtenderArgs {
    /// Candidate node names, preferring full node objects when present
    pub fn candidate_nodes(&self) -> Vec<String> {
        match (&self.nodes, &self.node_names) {
            (Some(nodes), _) if !nodes.items.is_empty() => nodes
                .items
                .iter()
                .filter_map(|node| node.metadata.name.clone())
                .collect(),
            (_, Some(names)) => names.clone(),
            _ => Vec::new(),
        }
    }

    /// `namespace/name` of the pod being scheduled, for logging
    pub fn pod_key(&self) -> String {
        let meta = self.pod.as_ref().map(|pod| &pod.metadata);
        let namespace = meta
            .and_then(|m| m.namespace.as_deref())
            .unwrap_or("default");
        let name = meta.and_then(|m| m.name.as_deref()).unwrap_or("<unknown>");
        format!("{}/{}", namespace, name)
    }
}

/// One entry of the prioritize response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPriority {
    pub host: String,
    pub score: i64,
}

impl From<NodeScore> for HostPriority {
    fn from(node: NodeScore) -> Self {
        Self {
            host: node.name,
            score: node.score,
        }
    }
}

pub type HostPriorityList = Vec<HostPriority>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_from_node_objects() {
        let args: ExtenderArgs = serde_json::from_str(
            r#"{
                "pod": {"metadata": {"name": "web-0", "namespace": "shop"}},
                "nodes": {"items": [
                    {"metadata": {"name": "worker-1", "labels": {"zone": "a"}}, "status": {}},
                    {"metadata": {"name": "worker-2"}}
                ]}
            }"#,
        )
        .unwrap();

        assert_eq!(args.candidate_nodes(), vec!["worker-1", "worker-2"]);
        assert_eq!(args.pod_key(), "shop/web-0");
    }

    #[test]
    fn test_candidates_from_node_names() {
        let args: ExtenderArgs =
            serde_json::from_str(r#"{"pod": {"metadata": {}}, "nodenames": ["a", "b"]}"#).unwrap();

        assert_eq!(args.candidate_nodes(), vec!["a", "b"]);
        assert_eq!(args.pod_key(), "default/<unknown>");
    }

    #[test]
    fn test_empty_request_has_no_candidates() {
        let args: ExtenderArgs = serde_json::from_str("{}").unwrap();
        assert!(args.candidate_nodes().is_empty());
    }

    #[test]
    fn test_host_priority_wire_format() {
        let priority = HostPriority::from(NodeScore::new("worker-1", 7));
        assert_eq!(
            serde_json::to_value(&priority).unwrap(),
            serde_json::json!({"host": "worker-1", "score": 7})
        );
    }
}
