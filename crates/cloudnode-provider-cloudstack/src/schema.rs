//! Response schemas
//!
//! One struct per response shape the driver reads. Required fields are
//! required here too, so a response missing them fails to decode and is
//! reported as a malformed response instead of surfacing later.
//!
//! CloudStack is loose with scalar types: ids are UUID strings on current
//! releases and integers on old ones, ports and flags are often strings.
//! The `de` helpers normalize those.

use crate::connection::DRIVER_NAME;
use cloudnode_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode the payload of `command` into `T`
pub fn decode<T: DeserializeOwned>(command: &str, value: Value) -> Result<T> {
    T::deserialize(&value).map_err(|e| {
        Error::malformed(
            format!("Unexpected {} response: {}", command, e),
            value.to_string(),
            DRIVER_NAME,
        )
    })
}

/// Immediate response of an asynchronous command
#[derive(Debug, Deserialize)]
pub struct JobSubmission {
    #[serde(deserialize_with = "de::id")]
    pub jobid: String,
}

#[derive(Debug, Deserialize)]
pub struct TemplateList {
    #[serde(default)]
    pub template: Vec<Template>,
}

#[derive(Debug, Deserialize)]
pub struct Template {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub name: String,
    pub hypervisor: String,
    pub format: String,
    pub ostypename: String,
}

#[derive(Debug, Deserialize)]
pub struct ZoneList {
    #[serde(default)]
    pub zone: Vec<Zone>,
}

#[derive(Debug, Deserialize)]
pub struct Zone {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ServiceOfferingList {
    #[serde(default)]
    pub serviceoffering: Vec<ServiceOffering>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceOffering {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub name: String,
    /// MB
    pub memory: u64,
}

#[derive(Debug, Deserialize)]
pub struct NetworkList {
    #[serde(default)]
    pub network: Vec<Network>,
}

#[derive(Debug, Deserialize)]
pub struct Network {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct VirtualMachineList {
    #[serde(default)]
    pub virtualmachine: Vec<VirtualMachine>,
}

#[derive(Debug, Deserialize)]
pub struct VirtualMachine {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub displayname: Option<String>,
    pub state: String,
    #[serde(deserialize_with = "de::id")]
    pub zoneid: String,
    #[serde(default)]
    pub nic: Vec<Nic>,
}

impl VirtualMachine {
    /// Private addresses of all NICs that have one
    pub fn private_ips(&self) -> Vec<String> {
        self.nic.iter().filter_map(|n| n.ipaddress.clone()).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct Nic {
    #[serde(default)]
    pub ipaddress: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublicIpAddressList {
    #[serde(default)]
    pub publicipaddress: Vec<PublicIpAddress>,
}

#[derive(Debug, Deserialize)]
pub struct PublicIpAddress {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub ipaddress: String,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub virtualmachineid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IpForwardingRuleList {
    #[serde(default)]
    pub ipforwardingrule: Vec<IpForwardingRule>,
}

#[derive(Debug, Deserialize)]
pub struct IpForwardingRule {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    pub protocol: String,
    #[serde(deserialize_with = "de::port")]
    pub startport: u16,
    #[serde(default, deserialize_with = "de::opt_port")]
    pub endport: Option<u16>,
}

/// `jobresult` of `deployVirtualMachine`
#[derive(Debug, Deserialize)]
pub struct DeployResult {
    pub virtualmachine: VirtualMachine,
}

/// `jobresult` of `associateIpAddress`
#[derive(Debug, Deserialize)]
pub struct AssociateResult {
    pub ipaddress: PublicIpAddress,
}

/// Response of `enableStaticNat`
#[derive(Debug, Deserialize)]
pub struct SuccessFlag {
    #[serde(default, deserialize_with = "de::flag")]
    pub success: bool,
}

/// `jobresult` of `createIpForwardingRule`
#[derive(Debug, Deserialize)]
pub struct CreatedRule {
    pub ipforwardingrule: CreatedRuleId,
}

#[derive(Debug, Deserialize)]
pub struct CreatedRuleId {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
}

/// Poll response of `queryAsyncJobResult`
#[derive(Debug, Deserialize)]
pub struct JobStatusCode {
    #[serde(default, deserialize_with = "de::opt_code")]
    pub jobstatus: Option<i64>,
}

pub(crate) mod de {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;

    fn scalar_to_string(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let value = Value::deserialize(d)?;
        scalar_to_string(value.clone())
            .ok_or_else(|| D::Error::custom(format!("expected string or integer id, got {}", value)))
    }

    pub fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            value => scalar_to_string(value.clone()).map(Some).ok_or_else(|| {
                D::Error::custom(format!("expected string or integer id, got {}", value))
            }),
        }
    }

    fn to_port<E: Error>(value: &Value) -> Result<u16, E> {
        let parsed = match value {
            Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| E::custom(format!("expected port number, got {}", value)))
    }

    pub fn port<'de, D: Deserializer<'de>>(d: D) -> Result<u16, D::Error> {
        to_port(&Value::deserialize(d)?)
    }

    pub fn opt_port<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u16>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            value => to_port(&value).map(Some),
        }
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Value::deserialize(d)? {
            Value::Bool(b) => Ok(b),
            Value::String(s) => Ok(s.eq_ignore_ascii_case("true")),
            Value::Null => Ok(false),
            other => Err(D::Error::custom(format!("expected boolean flag, got {}", other))),
        }
    }

    pub fn opt_code<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("expected integer status, got {}", n))),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected integer status, got {}", s))),
            other => Err(D::Error::custom(format!("expected integer status, got {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_accept_strings_and_integers() {
        let zones: ZoneList = decode(
            "listZones",
            json!({"zone": [{"id": 1, "name": "a"}, {"id": "uuid-2", "name": "b"}]}),
        )
        .unwrap();

        assert_eq!(zones.zone[0].id, "1");
        assert_eq!(zones.zone[1].id, "uuid-2");
    }

    #[test]
    fn test_missing_list_defaults_to_empty() {
        let vms: VirtualMachineList = decode("listVirtualMachines", json!({})).unwrap();
        assert!(vms.virtualmachine.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let err = decode::<TemplateList>(
            "listTemplates",
            json!({"template": [{"id": "t1", "name": "CentOS"}]}),
        )
        .unwrap_err();

        match err {
            Error::MalformedResponse { message, body, .. } => {
                assert!(message.contains("listTemplates"));
                assert!(body.contains("CentOS"));
            }
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[test]
    fn test_ports_from_strings() {
        let rules: IpForwardingRuleList = decode(
            "listIpForwardingRules",
            json!({"ipforwardingrule": [
                {"id": "r1", "protocol": "tcp", "startport": "22", "endport": "22"},
                {"id": "r2", "protocol": "udp", "startport": 5000}
            ]}),
        )
        .unwrap();

        assert_eq!(rules.ipforwardingrule[0].startport, 22);
        assert_eq!(rules.ipforwardingrule[0].endport, Some(22));
        assert_eq!(rules.ipforwardingrule[1].endport, None);
    }

    #[test]
    fn test_out_of_range_port_rejected() {
        let result = decode::<IpForwardingRuleList>(
            "listIpForwardingRules",
            json!({"ipforwardingrule": [{"id": "r1", "protocol": "tcp", "startport": 70000}]}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_success_flag_variants() {
        let yes: SuccessFlag = decode("enableStaticNat", json!({"success": "TRUE"})).unwrap();
        let no: SuccessFlag = decode("enableStaticNat", json!({"success": "false"})).unwrap();
        let boolean: SuccessFlag = decode("enableStaticNat", json!({"success": true})).unwrap();
        let missing: SuccessFlag = decode("enableStaticNat", json!({})).unwrap();

        assert!(yes.success);
        assert!(!no.success);
        assert!(boolean.success);
        assert!(!missing.success);
    }

    #[test]
    fn test_nics_without_address_skipped() {
        let vm: VirtualMachine = decode(
            "listVirtualMachines",
            json!({
                "id": "vm-1", "state": "Running", "zoneid": "z1",
                "nic": [{"ipaddress": "10.0.0.4"}, {"ip6address": "fe80::1"}]
            }),
        )
        .unwrap();

        assert_eq!(vm.private_ips(), vec!["10.0.0.4"]);
        assert_eq!(vm.displayname, None);
    }
}
