//! Normalizer: turns scraped free text into canonical endpoints, and reads
//! and writes the flat artifact format

use crate::error::ProxyError;
use crate::proxy::models::{Endpoint, EndpointSet, RawProxySet};
use crate::Result;
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::debug;

/// Regex pattern to match IPv4:PORT patterns in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:\d{1,3}\.){3}\d{1,3}:\d{1,5})").expect("Invalid IP:PORT regex")
});

/// Hosts are limited to IPv4 literals and DNS names
static HOST_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?$").expect("Invalid host regex")
});

/// Stateless parser for proxy lists
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single raw entry into an endpoint
    ///
    /// Accepts:
    /// - HOST:PORT
    /// - http://HOST:PORT or https://HOST:PORT, optionally with a trailing `/`
    ///
    /// The port must be all digits and lie strictly between 0 and 65535.
    pub fn parse_line(line: &str) -> std::result::Result<Endpoint, ProxyError> {
        let invalid = || ProxyError::InvalidEndpoint(line.to_string());

        let trimmed = line.trim();
        let rest = strip_scheme(trimmed);
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if !HOST_REGEX.is_match(host) {
            return Err(invalid());
        }
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        // Overlong digit strings fail to parse and are rejected like any other
        // out-of-range port.
        let port: u32 = port.parse().map_err(|_| invalid())?;
        let port = u16::try_from(port).map_err(|_| invalid())?;
        Endpoint::new(host, port).map_err(|_| invalid())
    }

    /// Normalize a batch of raw entries, dropping anything invalid
    pub fn normalize<I, S>(raw: I) -> EndpointSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .filter_map(|entry| match Self::parse_line(entry.as_ref()) {
                Ok(endpoint) => Some(endpoint),
                Err(e) => {
                    debug!(error = %e, "Dropping entry");
                    None
                }
            })
            .collect()
    }

    /// Pull every IPv4:PORT occurrence out of arbitrary text
    pub fn extract(content: &str) -> RawProxySet {
        IP_PORT_REGEX
            .find_iter(content)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Parse an artifact (or any list with one entry per line)
    ///
    /// Blank lines and `#` comments are skipped silently.
    pub fn parse_string(content: &str) -> EndpointSet {
        Self::normalize(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Parse an artifact file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<EndpointSet> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read proxy list {}", path.display()))?;
        Ok(Self::parse_string(&content))
    }

    /// Render endpoints in artifact format, one canonical URL per line
    pub fn to_artifact(endpoints: &EndpointSet) -> String {
        endpoints
            .iter()
            .map(|endpoint| format!("{}\n", endpoint.url()))
            .collect()
    }

    /// Replace the artifact at `path` with `endpoints`
    pub fn save_to_file<P: AsRef<Path>>(endpoints: &EndpointSet, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, Self::to_artifact(endpoints))
            .with_context(|| format!("cannot write proxy list {}", path.display()))?;
        Ok(())
    }

    /// Fail early if `path` cannot be opened for writing
    ///
    /// An existing artifact is never truncated, and a file created only to
    /// test the path is removed again.
    pub fn ensure_writable<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let existed = path.exists();
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("output file {} is not writable", path.display()))?;
        if !existed {
            fs::remove_file(path)
                .with_context(|| format!("cannot clean up output file {}", path.display()))?;
        }
        Ok(())
    }
}

fn strip_scheme(s: &str) -> &str {
    for scheme in ["http://", "https://"] {
        match s.get(..scheme.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(scheme) => return &s[scheme.len()..],
            _ => {}
        }
    }
    s
}
