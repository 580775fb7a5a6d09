//! Statiq HTTP Server
//!
//! The outer layer around the static file core: basic authentication, access
//! logging, the ordered request pipeline and the hyper accept loop.

mod auth;
mod body;
mod logger;
pub mod pipeline;
pub mod server;

pub use auth::{AccessGate, REALM};
pub use body::ResponseBody;
pub use logger::{RequestLog, RequestRecord};
pub use pipeline::Pipeline;
pub use server::{run, serve};
