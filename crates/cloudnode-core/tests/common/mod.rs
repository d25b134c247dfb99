//! Test doubles shared by the core contract tests

use async_trait::async_trait;
use cloudnode_core::error::Result;
use cloudnode_core::{Node, NodeDriver, NodeImage, NodeLocation, NodeSize, NodeState};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A driver that serves a fixed set of nodes and counts listing calls
pub struct StaticDriver {
    nodes: Vec<Node>,
    list_call_count: Arc<AtomicUsize>,
}

impl StaticDriver {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            list_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared handle to the list_nodes() counter
    pub fn list_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.list_call_count)
    }
}

#[async_trait]
impl NodeDriver for StaticDriver {
    async fn list_images(&self, _location: Option<&NodeLocation>) -> Result<Vec<NodeImage>> {
        Ok(Vec::new())
    }

    async fn list_locations(&self) -> Result<Vec<NodeLocation>> {
        Ok(Vec::new())
    }

    async fn list_sizes(&self, _location: Option<&NodeLocation>) -> Result<Vec<NodeSize>> {
        Ok(Vec::new())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.nodes.clone())
    }

    async fn create_node(
        &self,
        name: &str,
        _size: &NodeSize,
        _image: &NodeImage,
        location: Option<&NodeLocation>,
    ) -> Result<Node> {
        let zone = location.map(|l| l.id.clone()).unwrap_or_default();
        Ok(Node::new("new", Some(name.to_string()), NodeState::Pending, Vec::new(), zone))
    }

    async fn destroy_node(&self, _node: &Node) -> Result<bool> {
        Ok(true)
    }

    async fn reboot_node(&self, _node: &Node) -> Result<bool> {
        Ok(true)
    }

    fn driver_name(&self) -> &'static str {
        "static"
    }
}

/// A running node in zone `z1`
pub fn running_node(id: &str) -> Node {
    Node::new(id, Some(format!("node-{}", id)), NodeState::Running, Vec::new(), "z1")
}
