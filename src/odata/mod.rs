//! OData module
//!
//! HTTP client and query assembly for the Dataverse Web API

pub mod client;

pub use client::{Expand, GatewayError, ODataClient, ODataResponse, QueryOptions};
