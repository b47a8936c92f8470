//! # couchify-client
//!
//! Delivers bundled design documents to a CouchDB server.

pub mod client;
pub mod remote;

pub use client::{ClientError, CouchClient, DeployResponse};
pub use remote::{Remote, RemoteError};
