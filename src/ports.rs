// ABOUTME: Host port allocation for new releases.
// ABOUTME: Scans a fixed range and returns the first port nothing is listening on.

use std::net::{Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;
use thiserror::Error;

pub const PORT_RANGE: RangeInclusive<u16> = 8000..=9000;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("no free port in {start}-{end}")]
    Exhausted { start: u16, end: u16 },
}

/// Answers whether a host port is currently free.
pub trait PortProbe: Send + Sync {
    fn is_free(&self, port: u16) -> bool;
}

/// Probes by binding the port on all interfaces and dropping the listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindProbe;

impl PortProbe for BindProbe {
    fn is_free(&self, port: u16) -> bool {
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
    }
}

/// First-free-port allocator.
///
/// The scan only observes listeners at the moment it runs. Two allocations
/// racing each other can return the same port; the per-app deploy lock
/// serializes allocations for one app but not across apps.
pub struct PortAllocator {
    probe: Box<dyn PortProbe>,
    range: RangeInclusive<u16>,
}

impl PortAllocator {
    pub fn new(probe: Box<dyn PortProbe>) -> Self {
        Self {
            probe,
            range: PORT_RANGE,
        }
    }

    pub fn system() -> Self {
        Self::new(Box::new(BindProbe))
    }

    pub fn with_range(mut self, range: RangeInclusive<u16>) -> Self {
        self.range = range;
        self
    }

    pub fn allocate(&self) -> Result<u16, PortError> {
        let port = self
            .range
            .clone()
            .find(|port| self.probe.is_free(*port))
            .ok_or(PortError::Exhausted {
                start: *self.range.start(),
                end: *self.range.end(),
            })?;
        tracing::debug!(port, "allocated host port");
        Ok(port)
    }
}
