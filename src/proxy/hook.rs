//! Hook boundary toward the (external) transformation subsystem
//!
//! Request and response messages cross this boundary as opaque byte buffers
//! together with the fully-qualified URI of the target. The plugin subsystem
//! behind the trait (interpreters, per-interpreter locking) is out of scope
//! here; the proxy only promises to call `transform` with the whole message
//! and to forward whatever comes back.

/// Which way a message is travelling through the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → server
    Request,
    /// Server → client
    Response,
}

/// Message transformation hook
pub trait MessageHook: Send + Sync {
    /// Transform one full message, returning the replacement bytes
    fn transform(&self, data: Vec<u8>, uri: &str, direction: Direction) -> Vec<u8>;
}

/// Hook that forwards every message unchanged
pub struct NoopHook;

impl MessageHook for NoopHook {
    fn transform(&self, data: Vec<u8>, _uri: &str, _direction: Direction) -> Vec<u8> {
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_hook_passes_bytes_through() {
        let hook = NoopHook;
        let data = b"GET / HTTP/1.1\r\n\r\n".to_vec();
        let out = hook.transform(data.clone(), "http://example.com:80/", Direction::Request);
        assert_eq!(out, data);
    }
}
