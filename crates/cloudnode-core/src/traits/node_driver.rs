// # Node Driver Trait
//
// Defines the interface for listing, creating and destroying compute
// resources through a provider API.
//
// ## Implementations
//
// - CloudStack: `cloudnode-provider-cloudstack` crate
//
// ## Usage
//
// ```rust,ignore
// use cloudnode_core::NodeDriver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let driver = /* NodeDriver implementation */;
//
//     for node in driver.list_nodes().await? {
//         println!("{} {:?} {}", node.id, node.name, node.state);
//     }
//
//     Ok(())
// }
// ```

use crate::model::{Node, NodeImage, NodeLocation, NodeSize};
use async_trait::async_trait;

/// Trait for compute driver implementations
///
/// Each method issues one or more API calls and translates the provider's
/// response into the resource model. Drivers never retry; transport and
/// format failures are returned to the caller as errors.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
/// Mutating a [`Node`] goes through provider-specific methods that take
/// `&mut Node`; the methods here only read nodes.
#[async_trait]
pub trait NodeDriver: Send + Sync {
    /// List deployable images, optionally restricted to one location
    async fn list_images(
        &self,
        location: Option<&NodeLocation>,
    ) -> Result<Vec<NodeImage>, crate::Error>;

    /// List locations (zones)
    async fn list_locations(&self) -> Result<Vec<NodeLocation>, crate::Error>;

    /// List sizes (service offerings)
    async fn list_sizes(
        &self,
        location: Option<&NodeLocation>,
    ) -> Result<Vec<NodeSize>, crate::Error>;

    /// List nodes with their public addresses and forwarding rules
    async fn list_nodes(&self) -> Result<Vec<Node>, crate::Error>;

    /// Deploy a node
    ///
    /// # Parameters
    ///
    /// - `name`: Name and display name of the new node
    /// - `size`: Size to deploy
    /// - `image`: Image to deploy
    /// - `location`: Location to deploy into; the driver picks one when `None`
    ///
    /// # Returns
    ///
    /// - `Ok(Node)`: The deployed node, with no public addresses yet
    /// - `Err(Error)`: If the request failed or the deployment job failed
    async fn create_node(
        &self,
        name: &str,
        size: &NodeSize,
        image: &NodeImage,
        location: Option<&NodeLocation>,
    ) -> Result<Node, crate::Error>;

    /// Destroy a node
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The destroy job succeeded
    /// - `Ok(false)`: The destroy job reached its failure state
    async fn destroy_node(&self, node: &Node) -> Result<bool, crate::Error>;

    /// Reboot a node
    ///
    /// Same return convention as [`NodeDriver::destroy_node`].
    async fn reboot_node(&self, node: &Node) -> Result<bool, crate::Error>;

    /// Find a node by id
    ///
    /// The default implementation lists all nodes and filters locally.
    async fn get_node(&self, id: &str) -> Result<Option<Node>, crate::Error> {
        Ok(self.list_nodes().await?.into_iter().find(|n| n.id == id))
    }

    /// Get the driver name (for logging/debugging)
    fn driver_name(&self) -> &'static str;
}
