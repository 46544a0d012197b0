//! Console host font, stored per user under `HKCU\Console`.
//!
//! This affects classic console windows (cmd.exe), not the terminal app.

use tracing::info;

use crate::error::Result;
use crate::gateway::{Hive, KeyDisposition, RegValue, SystemGateway};
use crate::outcome::Outcome;
use crate::privilege::require_elevation;

pub const CONSOLE_KEY: &str = "Console";

/// Raster-compatible font settings written to the console key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleFont {
    /// Glyph height in pixels.
    pub height: u16,
    /// Glyph width in pixels; 0 lets the console pick.
    pub width: u16,
    pub family: u32,
    pub weight: u32,
}

impl Default for ConsoleFont {
    fn default() -> Self {
        Self {
            height: 14,
            width: 0,
            family: 0x36,
            weight: 400,
        }
    }
}

impl ConsoleFont {
    /// `FontSize` DWORD: height in the high word, width in the low word.
    pub fn packed_size(&self) -> u32 {
        (u32::from(self.height) << 16) | u32::from(self.width)
    }
}

/// Write `font` to the console key, creating the key if needed.
pub fn set_console_font(gateway: &dyn SystemGateway, font: ConsoleFont) -> Outcome {
    Outcome::from(write_console_font(gateway, font))
}

fn write_console_font(gateway: &dyn SystemGateway, font: ConsoleFont) -> Result<()> {
    require_elevation(gateway);

    let mut key = gateway.open_key(Hive::CurrentUser, CONSOLE_KEY, KeyDisposition::OpenOrCreate)?;
    key.set_value("FontSize", &RegValue::Dword(font.packed_size()))?;
    key.set_value("FontFamily", &RegValue::Dword(font.family))?;
    key.set_value("FontWeight", &RegValue::Dword(font.weight))?;

    info!(
        "Console font set to {}px (family {:#x}, weight {})",
        font.height, font.family, font.weight
    );
    Ok(())
}
