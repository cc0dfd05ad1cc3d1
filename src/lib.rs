//! Dataverse Events Gateway
//!
//! Read-only HTTP gateway over a Dataverse CRM event calendar: acquires
//! client-credentials tokens, queries the OData Web API with server-side
//! filtering and expansion, and flattens the nested responses into a flat
//! contract for downstream automation.

pub mod auth;
pub mod config;
pub mod gateway;
pub mod http;
pub mod odata;

pub use auth::{AccessToken, AuthError, TokenProvider};
pub use config::{Config, RuntimeConfig};
pub use gateway::EventsGateway;
pub use odata::{GatewayError, ODataClient, QueryOptions};
