//! Window host
//!
//! Owns the three capture surfaces and everything that talks to the OS:
//! - Surface creation and visibility (control panel, camera bubble, cursor overlay)
//! - Cursor polling while the overlay is shown
//! - Global shortcuts forwarded as UI events
//! - Saving and converting finished captures
//!
//! The host runs as a single task; callers talk to it through `HostHandle`.

mod cursor;
mod desktop;
mod hotkeys;
mod surface;
mod window_host;

pub use cursor::{CursorBroadcaster, DEFAULT_POLL_INTERVAL};
pub use desktop::{privacy_settings_uri, Desktop, HeadlessDesktop};
pub use hotkeys::{HotkeyAction, HotkeyRegistry, DEFAULT_PAUSE_RESUME, DEFAULT_START_STOP};
pub use surface::{Bounds, DisplayInfo, Point, Surface, SurfaceSpec};
pub use window_host::{HostCommand, HostHandle, HostSettings, WindowHost};
