// # CloudStack Compute Driver
//
// This crate implements the CloudNode `NodeDriver` for Apache CloudStack.
//
// ## Layers
//
// - `signer`: HMAC-SHA1 request signing (apiKey, response=json, signature)
// - `transport`: reqwest GET against the configured endpoint
// - `connection`: signing + transport + status mapping + JSON decoding
// - `protocol`: synchronous commands and asynchronous job polling
// - `schema`: typed views of the response payloads
// - `driver`: the `NodeDriver` impl and the `ex_*` address/NAT extensions
//
// ## Behavior
//
// - ✅ Every request is signed; the secret key NEVER appears in logs
// - ✅ Asynchronous jobs are polled until terminal, with optional timeout
// - ✅ Job waits can be cancelled and independent jobs polled concurrently
// - ✅ Unexpected response shapes surface as `Error::MalformedResponse`
// - ❌ NO retries at any layer; transport errors propagate to the caller
// - ❌ NO caching; every listing goes to the API
//
// ## Mutation
//
// Nodes are plain values. Operations that change a node's addresses or
// forwarding rules take `&mut Node`; addresses and rules refer back to their
// node by id only.
//
// ## API Reference
//
// - CloudStack API: https://cloudstack.apache.org/api.html
// - Signing: https://docs.cloudstack.apache.org/en/latest/developersguide/dev.html#signing-api-requests

pub mod connection;
pub mod driver;
pub mod protocol;
pub mod schema;
pub mod signer;
pub mod transport;

pub use connection::{ApiReply, Connection, DRIVER_NAME};
pub use driver::CloudStackDriver;
pub use protocol::{JobOutcome, JobStatus, PollPolicy, RequestProtocol, QUERY_JOB_COMMAND};
pub use signer::Signer;
pub use transport::ReqwestTransport;
