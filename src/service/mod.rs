//! Resident matching service over a Unix domain socket.
//!
//! - [`protocol`]: length-prefixed JSON frames and the request/response types
//! - [`server`]: the long-lived process that owns the model and cache
//! - [`client`]: connects, starting the service on demand

pub mod client;
pub mod protocol;
pub mod server;

pub use client::ServiceClient;
pub use protocol::{Op, Request, Response};
pub use server::{serve, ResidentService, ServiceContext};
