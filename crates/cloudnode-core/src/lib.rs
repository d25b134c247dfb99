// # cloudnode-core
//
// Core library for the CloudNode compute client.
//
// ## Architecture Overview
//
// This library provides the provider-independent pieces:
// - **Resource model**: Node, PublicAddress, ForwardingRule and the
//   read-only catalog (NodeImage, NodeLocation, NodeSize)
// - **NodeDriver**: Trait every compute driver implements
// - **HttpTransport**: Trait for the HTTP connection drivers send requests through
// - **CloudStackConfig**: Connection and job-polling settings
// - **Error**: One error type shared by every crate in the workspace
//
// Provider crates (e.g. `cloudnode-provider-cloudstack`) own signing, the
// request protocol and the JSON translation.

pub mod config;
pub mod error;
pub mod model;
pub mod traits;

// Re-export core types for convenience
pub use config::{CloudStackConfig, PollConfig};
pub use error::{Error, Result};
pub use model::{
    ForwardingRule, Node, NodeImage, NodeLocation, NodeSize, NodeState, Protocol, PublicAddress,
};
pub use traits::{HttpResponse, HttpTransport, NodeDriver, Params};
