//! Resource model
//!
//! Plain data records for compute nodes, their leased public addresses and
//! forwarding rules, plus the read-only catalog (images, locations, sizes).
//!
//! ## Ownership
//!
//! ```text
//! Node ──owns──> Vec<PublicAddress>     (node_id points back)
//!      └─owns──> Vec<ForwardingRule>    (node_id points back,
//!                                        address is a copy of the bound PublicAddress)
//! ```
//!
//! Back-references are ids, never pointers. A Node is only mutated through
//! driver operations that take `&mut Node`, so the two address views
//! (`public_ips` and `ip_addresses`) are always updated together.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Extras key holding the zone a node was deployed into
pub const EXTRA_ZONE_ID: &str = "zoneid";

/// Abstract lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Node is up
    Running,
    /// Node is (re)starting
    Rebooting,
    /// Node is stopped or stopping
    Terminated,
    /// Node is being provisioned
    ///
    /// Not produced by the CloudStack driver: its VM states have no
    /// provisioning phase (`Starting` maps to `Rebooting`). Kept for drivers
    /// whose APIs report one.
    Pending,
    /// Remote state had no known mapping
    Unknown,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Running => "running",
            NodeState::Rebooting => "rebooting",
            NodeState::Terminated => "terminated",
            NodeState::Pending => "pending",
            NodeState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Transport protocol of a forwarding rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Wire name (`TCP` / `UDP`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = crate::Error;

    /// Case-insensitive; anything but TCP or UDP is rejected
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            other => Err(crate::Error::invalid_input(format!(
                "Unsupported forwarding protocol: {}",
                other
            ))),
        }
    }
}

/// A leased public IP address attached to a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicAddress {
    /// Id of the node holding this address
    pub node_id: String,
    /// Provider-assigned address id
    pub id: String,
    /// Dotted address, e.g. `203.0.113.10`
    pub address: String,
}

impl PublicAddress {
    pub fn new(
        node_id: impl Into<String>,
        id: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            id: id.into(),
            address: address.into(),
        }
    }
}

impl PartialEq for PublicAddress {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PublicAddress {}

impl fmt::Display for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// A NAT/port-forwarding binding on a public address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingRule {
    /// Id of the node the traffic is forwarded to
    pub node_id: String,
    /// Provider-assigned rule id
    pub id: String,
    /// Address the rule is bound to
    pub address: PublicAddress,
    pub protocol: Protocol,
    pub start_port: u16,
    pub end_port: Option<u16>,
}

impl PartialEq for ForwardingRule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ForwardingRule {}

/// A compute instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Provider-assigned id
    pub id: String,
    /// Display name
    pub name: Option<String>,
    pub state: NodeState,
    /// Public addresses as plain strings
    pub public_ips: Vec<String>,
    /// Private addresses as plain strings
    pub private_ips: Vec<String>,
    /// Provider-specific extras (always includes `zoneid`)
    pub extra: HashMap<String, serde_json::Value>,
    /// Leased public addresses
    pub ip_addresses: Vec<PublicAddress>,
    /// Forwarding rules on this node's addresses
    pub ip_forwarding_rules: Vec<ForwardingRule>,
}

impl Node {
    /// Create a node with no public addresses or rules
    pub fn new(
        id: impl Into<String>,
        name: Option<String>,
        state: NodeState,
        private_ips: Vec<String>,
        zone_id: impl Into<String>,
    ) -> Self {
        let mut extra = HashMap::new();
        extra.insert(
            EXTRA_ZONE_ID.to_string(),
            serde_json::Value::String(zone_id.into()),
        );

        Self {
            id: id.into(),
            name,
            state,
            public_ips: Vec::new(),
            private_ips,
            extra,
            ip_addresses: Vec::new(),
            ip_forwarding_rules: Vec::new(),
        }
    }

    /// Zone the node lives in
    pub fn zone_id(&self) -> Option<&str> {
        self.extra.get(EXTRA_ZONE_ID).and_then(|v| v.as_str())
    }

    /// Whether `address` is currently attached to this node
    pub fn has_address(&self, address: &PublicAddress) -> bool {
        address.node_id == self.id && self.ip_addresses.contains(address)
    }

    /// Attach a leased address, keeping both address views in step
    pub fn attach_address(&mut self, address: PublicAddress) {
        self.public_ips.push(address.address.clone());
        self.ip_addresses.push(address);
    }

    /// Detach an address from both address views
    ///
    /// Rules bound to the address are dropped too. Returns false when the
    /// address was not attached.
    pub fn detach_address(&mut self, address: &PublicAddress) -> bool {
        let Some(pos) = self.ip_addresses.iter().position(|a| a == address) else {
            return false;
        };
        let removed = self.ip_addresses.remove(pos);

        if let Some(ip_pos) = self.public_ips.iter().position(|ip| *ip == removed.address) {
            self.public_ips.remove(ip_pos);
        }

        let before = self.ip_forwarding_rules.len();
        self.ip_forwarding_rules.retain(|r| r.address != removed);
        let dropped = before - self.ip_forwarding_rules.len();
        if dropped > 0 {
            tracing::debug!(
                "Dropped {} forwarding rule(s) bound to released address {}",
                dropped,
                removed.address
            );
        }

        true
    }

    /// Record a forwarding rule
    pub fn add_rule(&mut self, rule: ForwardingRule) {
        self.ip_forwarding_rules.push(rule);
    }

    /// Remove a forwarding rule by id; returns false when it was not present
    pub fn remove_rule(&mut self, rule: &ForwardingRule) -> bool {
        let before = self.ip_forwarding_rules.len();
        self.ip_forwarding_rules.retain(|r| r != rule);
        before != self.ip_forwarding_rules.len()
    }
}

/// A deployable template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeImage {
    pub id: String,
    pub name: String,
    /// `hypervisor`, `format` and `os`
    pub extra: HashMap<String, String>,
}

/// A zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLocation {
    pub id: String,
    pub name: String,
    /// ISO country code
    pub country: String,
}

/// A service offering
///
/// Only memory is reported by the API listing; the remaining figures are
/// `None` rather than guessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSize {
    pub id: String,
    pub name: String,
    /// Memory in MB
    pub ram: u64,
    /// Disk in GB
    pub disk: Option<u64>,
    pub bandwidth: Option<u64>,
    pub price: Option<f64>,
}
