//! The seam towards user-visible signals. Tray icons and blink(1)-style USB
//! devices plug in here; their failures must never reach protocol state, so
//! implementations handle errors internally.

use tracing::info;

pub trait Notifier {
    /// A watch fired. Light up.
    fn notify(&mut self, watch: u32);

    /// The user acknowledged; return to the idle indication.
    fn reset(&mut self);
}

/// Default notifier: surfaces attention flags through the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, watch: u32) {
        info!(watch, "attention");
    }

    fn reset(&mut self) {
        info!("attention cleared");
    }
}
