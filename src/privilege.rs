//! Privilege detection and self-elevation.
//!
//! Mutators that touch machine-wide state call [`require_elevation`] before
//! doing anything privileged. An unelevated process asks the OS to start an
//! elevated copy of itself with the same arguments and then exits; nothing
//! after that call runs in the original process.

use std::fmt;

use tracing::{info, warn};

use crate::error::Error;
use crate::gateway::SystemGateway;

/// Result of a privilege probe. Queried fresh every time, never cached.
#[derive(Debug)]
pub struct PrivilegeStatus {
    pub is_admin: bool,
    pub error: Option<Error>,
}

/// Check whether the current process holds administrative rights.
///
/// A failed query reports `is_admin = false` with the error attached.
pub fn check_privilege(gateway: &dyn SystemGateway) -> PrivilegeStatus {
    match gateway.is_elevated() {
        Ok(is_admin) => PrivilegeStatus {
            is_admin,
            error: None,
        },
        Err(e) => {
            warn!("Privilege query failed, assuming not elevated: {e}");
            PrivilegeStatus {
                is_admin: false,
                error: Some(e),
            }
        }
    }
}

/// Stages an unelevated process passes through on its way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationState {
    Unprivileged,
    ElevationRequested,
    Terminated,
}

impl fmt::Display for ElevationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElevationState::Unprivileged => write!(f, "unprivileged"),
            ElevationState::ElevationRequested => write!(f, "elevation requested"),
            ElevationState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Re-launch the current process elevated, then exit with code 0.
///
/// The elevation request is fire-and-forget: its failure is logged but not
/// acted on, and the caller must not assume an elevated copy is running.
pub fn elevate(gateway: &dyn SystemGateway) -> ! {
    info!("Process is {}, requesting elevation", ElevationState::Unprivileged);

    match gateway.invocation() {
        Ok(invocation) => {
            if let Err(e) = gateway.request_elevation(&invocation) {
                warn!("Elevation request for {} failed: {e}", invocation.executable.display());
            }
        }
        Err(e) => warn!("Could not determine how to re-launch this process: {e}"),
    }
    info!("State: {}", ElevationState::ElevationRequested);

    info!("State: {}, exiting unelevated process", ElevationState::Terminated);
    gateway.terminate(0)
}

/// Return only when the process is elevated; otherwise elevate and exit.
pub fn require_elevation(gateway: &dyn SystemGateway) {
    if !check_privilege(gateway).is_admin {
        elevate(gateway);
    }
}
