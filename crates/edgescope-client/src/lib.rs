//! Endpoint client for the edgescope backend.
//!
//! The core only depends on the [`EndpointClient`] contract: one call per
//! logical operation, answered with a normalized `{success, data, error}`
//! envelope. This crate provides:
//! - [`EndpointClient`]: dyn-compatible transport trait
//! - [`HttpEndpointClient`]: reqwest implementation tolerant of empty or non-JSON bodies
//! - [`Api`]: typed operations (collection lists, summary sources, edge actions)
//! - [`MockEndpointClient`]: scripted implementation for tests

pub mod api;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod mock;

pub use api::{decode_list, decode_one, Api};
pub use endpoint::{paths, BoxFuture, DynEndpointClient, EndpointClient};
pub use error::{ClientError, ClientResult};
pub use http::{normalize_body, HttpEndpointClient};
pub use mock::{MockCall, MockEndpointClient, MockResponse};
