//! Proxy core: accept loop, per-connection context, interception, relay

pub mod context;
pub mod hook;
pub mod intercept;
pub mod relay;
pub mod server;

pub use context::ConnectionContext;
pub use hook::{Direction, MessageHook, NoopHook};
pub use intercept::{InterceptSession, InterceptState, InterceptedTunnel, TUNNEL_ESTABLISHED};
pub use server::ProxyServer;
