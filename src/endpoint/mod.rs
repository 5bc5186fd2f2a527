//! Broker endpoint addresses.
//!
//! # Responsibilities
//! - Normalize the configured comma-separated address list
//! - Drop blanks and duplicates, keeping first-seen order
//! - Provide the fixed visiting order used by a failover cycle
//!
//! # Design Decisions
//! - Addresses are opaque; only the transport interprets them
//! - The list is immutable after construction and shared without locking

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::failover::FailoverError;

/// A single broker endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    /// Create an endpoint from an address string.
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(Arc::from(address.as_ref().trim()))
    }

    /// Get the raw address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Ordered, deduplicated, non-empty list of endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointList {
    endpoints: Arc<[Endpoint]>,
}

impl EndpointList {
    /// Parse a comma-separated address list.
    ///
    /// Surrounding whitespace is trimmed and blank entries are ignored.
    pub fn parse(csv: &str) -> Result<Self, FailoverError> {
        Self::new(csv.split(','))
    }

    /// Build a list from individual addresses.
    pub fn new<I, S>(addresses: I) -> Result<Self, FailoverError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let endpoints: Vec<Endpoint> = addresses
            .into_iter()
            .map(Endpoint::new)
            .filter(|ep| !ep.as_str().is_empty())
            .filter(|ep| seen.insert(ep.clone()))
            .collect();

        if endpoints.is_empty() {
            return Err(FailoverError::Configuration(
                "no broker endpoints configured".to_string(),
            ));
        }

        Ok(Self {
            endpoints: endpoints.into(),
        })
    }

    /// Number of endpoints (always at least one).
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Get the endpoint at `index`.
    pub fn get(&self, index: usize) -> Option<&Endpoint> {
        self.endpoints.get(index)
    }

    /// Iterate endpoints in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    /// Indices of one full cycle around the list beginning at `start`.
    pub fn cycle_from(&self, start: usize) -> impl Iterator<Item = usize> {
        let len = self.len();
        let start = start % len;
        (0..len).map(move |offset| (start + offset) % len)
    }
}

impl std::ops::Index<usize> for EndpointList {
    type Output = Endpoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.endpoints[index]
    }
}

impl fmt::Display for EndpointList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, ep) in self.endpoints.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ep)?;
        }
        write!(f, "]")
    }
}
