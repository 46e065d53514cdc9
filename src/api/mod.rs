//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value with optional TTL
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `POST /incr/:key`, `POST /decr/:key` - Adjust an integer value
//! - `POST /delete_matched` - Delete keys matching a glob
//! - `POST /clear` - Remove every entry
//! - `POST /cleanup` - Sweep expired entries
//! - `POST /prune` - Reclaim space down to a target size
//! - `GET /stats` - Counters and space usage
//! - `GET /inspect` - Entry count, space and options
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
