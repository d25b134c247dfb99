//! CloudStack compute driver
//!
//! Translates the resource model into CloudStack commands and back.
//!
//! ## Commands
//!
//! | Operation | Commands |
//! |---|---|
//! | `list_images` | `listTemplates` |
//! | `list_locations` | `listZones` |
//! | `list_sizes` | `listServiceOfferings` |
//! | `list_nodes` | `listVirtualMachines`, `listPublicIpAddresses`, `listIpForwardingRules` × addresses |
//! | `create_node` | (`listZones`), `listNetworks`, `deployVirtualMachine`* |
//! | `destroy_node` | `destroyVirtualMachine`* |
//! | `reboot_node` | `rebootVirtualMachine`* |
//! | `ex_allocate_public_ip` | `associateIpAddress`*, `enableStaticNat` |
//! | `ex_release_public_ip` | `disableStaticNat`*, `disassociateIpAddress`* |
//! | `ex_add_ip_forwarding_rule` | `createIpForwardingRule`* |
//! | `ex_delete_ip_forwarding_rule` | `deleteIpForwardingRule`* |
//!
//! `*` = asynchronous job.

use crate::connection::Connection;
use crate::protocol::{JobOutcome, PollPolicy, RequestProtocol};
use crate::schema::{
    self, AssociateResult, CreatedRule, DeployResult, IpForwardingRuleList, NetworkList,
    PublicIpAddressList, ServiceOfferingList, SuccessFlag, TemplateList, VirtualMachineList,
    ZoneList,
};
use crate::signer::Signer;
use crate::transport::ReqwestTransport;
use async_trait::async_trait;
use cloudnode_core::{
    CloudStackConfig, Error, ForwardingRule, HttpTransport, Node, NodeDriver, NodeImage,
    NodeLocation, NodeSize, NodeState, Params, Protocol, PublicAddress, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Country reported for every zone; the API does not expose one
pub const DEFAULT_COUNTRY: &str = "AU";

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

/// CloudStack compute driver
///
/// Nodes returned by this driver are plain data. Operations that change a
/// node's addresses or rules take `&mut Node` and update it in place.
#[derive(Debug, Clone)]
pub struct CloudStackDriver {
    protocol: RequestProtocol,
}

impl CloudStackDriver {
    /// Remote VM state → abstract node state
    pub const NODE_STATE_MAP: &'static [(&'static str, NodeState)] = &[
        ("Running", NodeState::Running),
        ("Starting", NodeState::Rebooting),
        ("Stopped", NodeState::Terminated),
        ("Stopping", NodeState::Terminated),
    ];

    /// Create a driver talking to the endpoint in `config` over HTTPS/HTTP
    pub fn new(config: &CloudStackConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::from_config(config)?;
        Ok(Self::assemble(config, Arc::new(transport)))
    }

    /// Create a driver on top of an existing transport
    pub fn with_transport(
        config: &CloudStackConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, transport))
    }

    /// Wire a validated config to `transport`
    fn assemble(config: &CloudStackConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let signer = Signer::new(config.api_key.clone(), config.secret_key.clone());
        let protocol = RequestProtocol::new(
            Connection::new(signer, transport),
            PollPolicy::from(&config.poll),
        );
        Self { protocol }
    }

    /// Replace the job polling policy
    pub fn with_poll_policy(self, poll: PollPolicy) -> Self {
        Self {
            protocol: self.protocol.with_poll_policy(poll),
        }
    }

    /// Request protocol this driver issues commands through
    pub fn protocol(&self) -> &RequestProtocol {
        &self.protocol
    }

    /// Abstract state for a remote VM state; unmapped states are `Unknown`
    pub fn node_state(remote: &str) -> NodeState {
        Self::NODE_STATE_MAP
            .iter()
            .find(|(name, _)| *name == remote)
            .map(|(_, state)| *state)
            .unwrap_or_else(|| {
                warn!("Unmapped CloudStack VM state: {}", remote);
                NodeState::Unknown
            })
    }

    async fn rules_for_address(
        &self,
        node_id: &str,
        address: &PublicAddress,
    ) -> Result<Vec<ForwardingRule>> {
        let list: IpForwardingRuleList = self
            .protocol
            .sync_call(
                "listIpForwardingRules",
                vec![param("ipaddressid", address.id.clone())],
            )
            .await?;

        let mut rules = Vec::with_capacity(list.ipforwardingrule.len());
        for r in list.ipforwardingrule {
            let Ok(protocol) = r.protocol.parse::<Protocol>() else {
                warn!(
                    "Skipping forwarding rule {} with unsupported protocol {}",
                    r.id, r.protocol
                );
                continue;
            };
            rules.push(ForwardingRule {
                node_id: node_id.to_string(),
                id: r.id,
                address: address.clone(),
                protocol,
                start_port: r.startport,
                end_port: r.endport,
            });
        }
        Ok(rules)
    }

    /// Allocate a public IP in the node's zone and bind it with static NAT
    ///
    /// # Returns
    ///
    /// - `Ok(Some(address))`: The address, also appended to the node
    /// - `Ok(None)`: The association job failed or static NAT was refused
    /// - `Err(Error)`: Transport or format failure
    pub async fn ex_allocate_public_ip(&self, node: &mut Node) -> Result<Option<PublicAddress>> {
        let zone_id = node
            .zone_id()
            .ok_or_else(|| Error::invalid_input(format!("Node {} has no zoneid", node.id)))?
            .to_string();

        let outcome = self
            .protocol
            .async_request("associateIpAddress", vec![param("zoneid", zone_id)])
            .await?;
        let JobOutcome::Succeeded { result, .. } = outcome else {
            warn!("Public IP association for node {} failed", node.id);
            return Ok(None);
        };
        let associated: AssociateResult = schema::decode("associateIpAddress", result)?;
        let ip = associated.ipaddress;

        let nat: SuccessFlag = self
            .protocol
            .sync_call(
                "enableStaticNat",
                vec![
                    param("virtualmachineid", node.id.clone()),
                    param("ipaddressid", ip.id.clone()),
                ],
            )
            .await?;
        if !nat.success {
            warn!(
                "Static NAT for {} ({}) on node {} was refused; address stays associated",
                ip.ipaddress, ip.id, node.id
            );
            return Ok(None);
        }

        let address = PublicAddress::new(node.id.clone(), ip.id, ip.ipaddress);
        node.attach_address(address.clone());
        info!("Allocated public IP {} to node {}", address, node.id);
        Ok(Some(address))
    }

    /// Release a public IP held by `node`
    ///
    /// The address (and any rules bound to it) is removed from the node
    /// before the remote calls are made. The outcome of `disableStaticNat`
    /// is ignored; the return value is whether `disassociateIpAddress`
    /// succeeded.
    pub async fn ex_release_public_ip(
        &self,
        node: &mut Node,
        address: &PublicAddress,
    ) -> Result<bool> {
        if !node.detach_address(address) {
            return Err(Error::invalid_input(format!(
                "Address {} is not attached to node {}",
                address, node.id
            )));
        }

        let nat = self
            .protocol
            .async_request("disableStaticNat", vec![param("ipaddressid", address.id.clone())])
            .await?;
        if !nat.is_success() {
            warn!("disableStaticNat for {} failed; disassociating anyway", address);
        }

        let released = self
            .protocol
            .async_request("disassociateIpAddress", vec![param("id", address.id.clone())])
            .await?
            .is_success();

        info!(
            "Released public IP {} from node {} (remote success: {})",
            address, node.id, released
        );
        Ok(released)
    }

    /// Forward `start_port[..end_port]` on `address` to `node`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(rule))`: The rule, also appended to the node
    /// - `Ok(None)`: `protocol` is not TCP or UDP; no request was made
    /// - `Err(Error::InvalidInput)`: `address` is not attached to `node`
    /// - `Err(Error::JobFailed)`: The create job failed
    pub async fn ex_add_ip_forwarding_rule(
        &self,
        node: &mut Node,
        address: &PublicAddress,
        protocol: &str,
        start_port: u16,
        end_port: Option<u16>,
    ) -> Result<Option<ForwardingRule>> {
        let Ok(protocol) = protocol.parse::<Protocol>() else {
            debug!("Rejecting forwarding rule with protocol {}", protocol);
            return Ok(None);
        };

        if !node.has_address(address) {
            return Err(Error::invalid_input(format!(
                "Address {} is not attached to node {}",
                address, node.id
            )));
        }

        let mut params: Params = vec![
            param("ipaddressid", address.id.clone()),
            param("protocol", protocol.as_str()),
            param("startport", start_port.to_string()),
        ];
        if let Some(end) = end_port {
            params.push(param("endport", end.to_string()));
        }

        let result = self
            .protocol
            .async_request("createIpForwardingRule", params)
            .await?
            .into_result("createIpForwardingRule")?;
        let created: CreatedRule = schema::decode("createIpForwardingRule", result)?;

        let rule = ForwardingRule {
            node_id: node.id.clone(),
            id: created.ipforwardingrule.id,
            address: address.clone(),
            protocol,
            start_port,
            end_port,
        };
        node.add_rule(rule.clone());
        info!(
            "Added {} forwarding rule {} on {} for node {}",
            protocol, rule.id, address, node.id
        );
        Ok(Some(rule))
    }

    /// Delete a forwarding rule
    ///
    /// The rule is removed from the node before the remote call is made.
    pub async fn ex_delete_ip_forwarding_rule(
        &self,
        node: &mut Node,
        rule: &ForwardingRule,
    ) -> Result<bool> {
        if !node.remove_rule(rule) {
            return Err(Error::invalid_input(format!(
                "Forwarding rule {} does not belong to node {}",
                rule.id, node.id
            )));
        }

        let deleted = self
            .protocol
            .async_request("deleteIpForwardingRule", vec![param("id", rule.id.clone())])
            .await?
            .is_success();

        info!(
            "Deleted forwarding rule {} from node {} (remote success: {})",
            rule.id, node.id, deleted
        );
        Ok(deleted)
    }
}

#[async_trait]
impl NodeDriver for CloudStackDriver {
    async fn list_images(&self, location: Option<&NodeLocation>) -> Result<Vec<NodeImage>> {
        let mut params = vec![param("templatefilter", "executable")];
        if let Some(location) = location {
            params.push(param("zoneid", location.id.clone()));
        }

        let list: TemplateList = self.protocol.sync_call("listTemplates", params).await?;
        Ok(list
            .template
            .into_iter()
            .map(|t| NodeImage {
                id: t.id,
                name: t.name,
                extra: HashMap::from([
                    ("hypervisor".to_string(), t.hypervisor),
                    ("format".to_string(), t.format),
                    ("os".to_string(), t.ostypename),
                ]),
            })
            .collect())
    }

    async fn list_locations(&self) -> Result<Vec<NodeLocation>> {
        let list: ZoneList = self.protocol.sync_call("listZones", Vec::new()).await?;
        Ok(list
            .zone
            .into_iter()
            .map(|z| NodeLocation {
                id: z.id,
                name: z.name,
                country: DEFAULT_COUNTRY.to_string(),
            })
            .collect())
    }

    async fn list_sizes(&self, _location: Option<&NodeLocation>) -> Result<Vec<NodeSize>> {
        let list: ServiceOfferingList = self
            .protocol
            .sync_call("listServiceOfferings", Vec::new())
            .await?;
        Ok(list
            .serviceoffering
            .into_iter()
            .map(|s| NodeSize {
                id: s.id,
                name: s.name,
                ram: s.memory,
                disk: None,
                bandwidth: None,
                price: None,
            })
            .collect())
    }

    /// One `listIpForwardingRules` call is made per attached address, so a
    /// listing costs 2 + (total addresses) round-trips.
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let vms: VirtualMachineList = self
            .protocol
            .sync_call("listVirtualMachines", Vec::new())
            .await?;
        let addrs: PublicIpAddressList = self
            .protocol
            .sync_call("listPublicIpAddresses", Vec::new())
            .await?;

        let mut public_ips: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for addr in addrs.publicipaddress {
            let Some(vm_id) = addr.virtualmachineid else {
                continue;
            };
            public_ips
                .entry(vm_id)
                .or_default()
                .push((addr.id, addr.ipaddress));
        }

        let mut nodes = Vec::with_capacity(vms.virtualmachine.len());
        for vm in vms.virtualmachine {
            let private_ips = vm.private_ips();
            let mut node = Node::new(
                vm.id,
                vm.displayname,
                Self::node_state(&vm.state),
                private_ips,
                vm.zoneid,
            );

            for (id, ip) in public_ips.remove(&node.id).unwrap_or_default() {
                node.attach_address(PublicAddress::new(node.id.clone(), id, ip));
            }

            for address in node.ip_addresses.clone() {
                for rule in self.rules_for_address(&node.id, &address).await? {
                    node.add_rule(rule);
                }
            }

            debug!(
                "Node {}: {} address(es), {} rule(s)",
                node.id,
                node.ip_addresses.len(),
                node.ip_forwarding_rules.len()
            );
            nodes.push(node);
        }

        Ok(nodes)
    }

    async fn create_node(
        &self,
        name: &str,
        size: &NodeSize,
        image: &NodeImage,
        location: Option<&NodeLocation>,
    ) -> Result<Node> {
        let location = match location {
            Some(location) => location.clone(),
            None => self
                .list_locations()
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::not_found("No locations available for deployment"))?,
        };

        let networks: NetworkList = self.protocol.sync_call("listNetworks", Vec::new()).await?;
        let network = networks
            .network
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("No networks available for deployment"))?;

        info!(
            "Deploying node {} (size {}, image {}) in zone {}",
            name, size.id, image.id, location.id
        );

        let result = self
            .protocol
            .async_request(
                "deployVirtualMachine",
                vec![
                    param("name", name),
                    param("displayname", name),
                    param("serviceofferingid", size.id.clone()),
                    param("templateid", image.id.clone()),
                    param("zoneid", location.id.clone()),
                    param("networkids", network.id),
                ],
            )
            .await?
            .into_result("deployVirtualMachine")?;
        let deployed: DeployResult = schema::decode("deployVirtualMachine", result)?;
        let vm = deployed.virtualmachine;

        let private_ips = vm.private_ips();
        let node = Node::new(
            vm.id,
            vm.displayname,
            Self::node_state(&vm.state),
            private_ips,
            location.id,
        );
        info!("Deployed node {}", node.id);
        Ok(node)
    }

    async fn destroy_node(&self, node: &Node) -> Result<bool> {
        let outcome = self
            .protocol
            .async_request("destroyVirtualMachine", vec![param("id", node.id.clone())])
            .await?;
        info!("Destroy node {}: success={}", node.id, outcome.is_success());
        Ok(outcome.is_success())
    }

    async fn reboot_node(&self, node: &Node) -> Result<bool> {
        let outcome = self
            .protocol
            .async_request("rebootVirtualMachine", vec![param("id", node.id.clone())])
            .await?;
        info!("Reboot node {}: success={}", node.id, outcome.is_success());
        Ok(outcome.is_success())
    }

    fn driver_name(&self) -> &'static str {
        crate::connection::DRIVER_NAME
    }
}
