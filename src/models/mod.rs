//! Request and Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{CounterRequest, DeleteMatchedRequest, PruneRequest, SetRequest};
pub use responses::{
    CounterResponse, DeleteResponse, GetResponse, HealthResponse, InspectResponse,
    RemovedResponse, SetResponse, StatsResponse,
};
