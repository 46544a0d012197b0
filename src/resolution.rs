//! Primary display resolution: read it, and change it when it differs.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::error::Result;
use crate::gateway::SystemGateway;
use crate::outcome::Outcome;
use crate::privilege::require_elevation;

/// Display dimensions in pixels. Both sides are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `1920x1080`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(|c: char| c == 'x' || c == 'X')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;

        let parse = |part: &str, name: &str| -> std::result::Result<u32, String> {
            match part.trim().parse::<u32>() {
                Ok(0) => Err(format!("{name} must be positive")),
                Ok(v) => Ok(v),
                Err(e) => Err(format!("invalid {name} '{part}': {e}")),
            }
        };

        Ok(Resolution::new(parse(w, "width")?, parse(h, "height")?))
    }
}

/// Current resolution of the primary display.
pub fn get_resolution(gateway: &dyn SystemGateway) -> Result<Resolution> {
    gateway.screen_resolution()
}

/// Switch the primary display to `target`.
///
/// Returns success without touching privilege or the display when the
/// current resolution already matches. Otherwise the process must be
/// elevated; an unelevated process is re-launched and does not return.
pub fn set_resolution(gateway: &dyn SystemGateway, target: Resolution) -> Outcome {
    Outcome::from(apply_resolution(gateway, target))
}

fn apply_resolution(gateway: &dyn SystemGateway, target: Resolution) -> Result<()> {
    let current = get_resolution(gateway)?;
    if current == target {
        info!("Display already at {target}");
        return Ok(());
    }

    require_elevation(gateway);

    info!("Changing display resolution from {current} to {target}");
    gateway.change_resolution(target)
}
