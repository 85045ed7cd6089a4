//! Proxy-style request line parsing and rewriting
//!
//! A proxy request line looks like
//! `METHOD proto://hostname[:port][/location] HTTP/X.Y\r\n` (RFC 2616), or
//! `CONNECT host:port HTTP/X.Y\r\n` for tunnel requests. This module extracts
//! the routing target from that single line and, for direct forwarding,
//! rewrites the absolute URI into origin-form inside the raw request buffer.
//! Nothing past the request line is interpreted.

use crate::error::{Error, Result};

/// URL scheme of a parsed target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Scheme name as it appears in a URI
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Default port when the URI carries none
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Routing target extracted from one raw request line
///
/// Owned by the connection that parsed it and never mutated afterwards; the
/// normalizer rewrites the raw buffer, not this structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    pub method: String,
    pub scheme: Scheme,
    pub is_tls: bool,
    pub hostname: String,
    pub port: u16,
    pub path: String,
}

impl ParsedTarget {
    /// Rebuild the fully-qualified URI for the hook boundary
    pub fn full_uri(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.hostname,
            self.port,
            self.path
        )
    }
}

/// Parse the request line at the start of a raw request buffer
///
/// The buffer must begin with `METHOD SP TARGET SP ...`; both separating
/// spaces are mandatory. TARGET is an absolute URI, or a bare `host:port`
/// when the method is `CONNECT` (browsers send CONNECT without a scheme, in
/// which case https/443 is assumed). An explicit but non-numeric port parses
/// to 0 and is rejected later by the connect path.
pub fn parse(raw: &[u8]) -> Result<ParsedTarget> {
    let method_end = find_byte(raw, b' ').ok_or(Error::MalformedRequest)?;
    let target_start = method_end + 1;
    let target_end = find_byte(&raw[target_start..], b' ')
        .map(|i| target_start + i)
        .ok_or(Error::MalformedRequest)?;

    let method = String::from_utf8_lossy(&raw[..method_end]).into_owned();
    let target = &raw[target_start..target_end];

    let (scheme, rest) = if let Some(rest) = target.strip_prefix(b"http://".as_slice()) {
        (Scheme::Http, rest)
    } else if let Some(rest) = target.strip_prefix(b"https://".as_slice()) {
        (Scheme::Https, rest)
    } else if method == "CONNECT" {
        // bare host:port target
        (Scheme::Https, target)
    } else {
        return Err(Error::MalformedProtocol);
    };

    let mut port = scheme.default_port();
    let is_tls = scheme == Scheme::Https || method == "CONNECT";

    let host_end = rest
        .iter()
        .position(|&b| b == b':' || b == b'/')
        .unwrap_or(rest.len());
    let hostname = String::from_utf8_lossy(&rest[..host_end]).into_owned();

    let mut cursor = host_end;
    if rest.get(cursor) == Some(&b':') {
        cursor += 1;
        port = parse_leading_port(&rest[cursor..]);
        while cursor < rest.len() && rest[cursor] != b'/' {
            cursor += 1;
        }
    }

    let path = if cursor < rest.len() {
        String::from_utf8_lossy(&rest[cursor..]).into_owned()
    } else {
        "/".to_string()
    };

    Ok(ParsedTarget {
        method,
        scheme,
        is_tls,
        hostname,
        port,
        path,
    })
}

/// Rewrite an absolute-URI request line into origin-form, in place
///
/// `GET http://example.com/foo HTTP/1.1` becomes `GET /foo HTTP/1.1`; every
/// byte after the excised scheme+authority span is preserved and the buffer
/// shrinks to the new length. An absolute URI with no explicit path is an
/// error here: direct servers expect origin-form, and an implicit root is not
/// synthesized by this step. Must not be called when forwarding through a
/// chained upstream proxy, which expects the absolute URI intact.
pub fn normalize_in_place(buf: &mut Vec<u8>) -> Result<()> {
    let (scheme_start, authority_start) = if let Some(pos) = find_subslice(buf, b"http://") {
        (pos, pos + 7)
    } else if let Some(pos) = find_subslice(buf, b"https://") {
        (pos, pos + 8)
    } else {
        return Err(Error::MissingScheme);
    };

    // The slash must belong to the request target itself; a '/' later in the
    // line (the HTTP version token) or in the headers does not count.
    let target_end = buf[authority_start..]
        .iter()
        .position(|&b| b == b' ' || b == b'\r')
        .map(|i| authority_start + i)
        .unwrap_or(buf.len());
    let slash = find_byte(&buf[authority_start..target_end], b'/')
        .map(|i| authority_start + i)
        .ok_or(Error::MissingPath)?;

    buf.drain(scheme_start..slash);
    Ok(())
}

/// atoi-style port parse: leading decimal digits, anything else yields 0
fn parse_leading_port(bytes: &[u8]) -> u16 {
    let mut value: u32 = 0;
    let mut seen = false;
    for &b in bytes {
        if b.is_ascii_digit() {
            seen = true;
            value = value.wrapping_mul(10).wrapping_add((b - b'0') as u32);
        } else {
            break;
        }
    }
    if seen {
        value as u16
    } else {
        0
    }
}

fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
