//! Metrics exposure: a registry of read/write endpoints keyed by path.
//!
//! Transport is deliberately out of contract. Anything that can call
//! [`EndpointRegistry::read`] and [`EndpointRegistry::write`] with a path
//! string can publish the namespace: the bundled TCP server, the CLI, or an
//! embedding process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::engine::CoreTimes;

/// Read handler: renders an endpoint's payload.
pub type ReadHandler = Arc<dyn Fn() -> String + Send + Sync>;

/// Write handler: consumes a payload and returns the accepted length.
pub type WriteHandler = Arc<dyn Fn(&[u8]) -> usize + Send + Sync>;

/// A single registered endpoint.
#[derive(Clone)]
pub enum Endpoint {
    Read(ReadHandler),
    Write(WriteHandler),
}

/// Errors surfaced by endpoint registration and dispatch.
#[derive(Error, Debug)]
pub enum ExposureError {
    #[error("no endpoint registered at {0:?}")]
    UnknownPath(String),

    #[error("endpoint already registered at {0:?}")]
    DuplicatePath(String),

    #[error("endpoint at {0:?} does not support {1}")]
    KindMismatch(String, &'static str),
}

/// Path-addressed endpoint table.
///
/// Handlers run outside the table lock, so a handler may re-enter the
/// registry (and will take the per-core record locks it needs).
#[derive(Default)]
pub struct EndpointRegistry {
    entries: Mutex<HashMap<String, Endpoint>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `endpoint` at `path`. Fails if the path is taken.
    pub fn register(&self, path: &str, endpoint: Endpoint) -> Result<(), ExposureError> {
        let mut entries = self.entries();
        if entries.contains_key(path) {
            return Err(ExposureError::DuplicatePath(path.to_string()));
        }
        entries.insert(path.to_string(), endpoint);
        Ok(())
    }

    /// Remove the endpoint at `path`.
    pub fn unregister(&self, path: &str) -> Result<(), ExposureError> {
        self.entries()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ExposureError::UnknownPath(path.to_string()))
    }

    /// Invoke the read handler registered at `path`.
    pub fn read(&self, path: &str) -> Result<String, ExposureError> {
        let handler = match self.entries().get(path) {
            Some(Endpoint::Read(handler)) => Arc::clone(handler),
            Some(Endpoint::Write(_)) => {
                return Err(ExposureError::KindMismatch(path.to_string(), "read"))
            }
            None => return Err(ExposureError::UnknownPath(path.to_string())),
        };
        Ok(handler())
    }

    /// Invoke the write handler registered at `path` with `payload`,
    /// returning the accepted length.
    pub fn write(&self, path: &str, payload: &[u8]) -> Result<usize, ExposureError> {
        let handler = match self.entries().get(path) {
            Some(Endpoint::Write(handler)) => Arc::clone(handler),
            Some(Endpoint::Read(_)) => {
                return Err(ExposureError::KindMismatch(path.to_string(), "write"))
            }
            None => return Err(ExposureError::UnknownPath(path.to_string())),
        };
        Ok(handler(payload))
    }

    /// Whether any endpoint is registered at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.entries().contains_key(path)
    }

    /// Registered paths, sorted for stable listings.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Endpoint>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wire format shared by every data endpoint: two space-separated unsigned
/// decimals and a newline.
pub fn format_times(times: CoreTimes) -> String {
    format!("{} {}\n", times.idle, times.run)
}
