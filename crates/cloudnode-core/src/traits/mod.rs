//! Core traits for the CloudNode client
//!
//! This module defines the abstract interfaces that drivers consume and implement.
//!
//! - [`HttpTransport`]: Send a request to a fixed API endpoint
//! - [`NodeDriver`]: List, create and destroy compute resources

pub mod node_driver;
pub mod transport;

pub use node_driver::NodeDriver;
pub use transport::{HttpResponse, HttpTransport, Params};
