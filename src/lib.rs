//! Idempotent, elevation-aware tweaks for a single Windows workstation.
//!
//! Each mutator follows the same contract: check whether the change is
//! already in place, make sure the process is elevated when the change needs
//! it (re-launching itself elevated otherwise), apply a single change, and
//! report an [`Outcome`].
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`gateway`] | `SystemGateway` trait, Win32 binding, in-memory binding |
//! | [`privilege`] | Privilege probe and self-elevation |
//! | [`resolution`] | Primary display resolution |
//! | [`path`] | Machine-wide `PATH` |
//! | [`settings`] | Shallow merge into the terminal `settings.json` |
//! | [`terminal`] | Typed `settings.json` schema |
//! | [`console_font`] | Console host font registry values |
//! | [`report`] | PATH listing output and export |

pub mod console_font;
pub mod error;
pub mod gateway;
pub mod outcome;
pub mod path;
pub mod privilege;
pub mod report;
pub mod resolution;
pub mod settings;
pub mod terminal;

pub use error::{Error, ErrorKind, Result};
pub use outcome::Outcome;
