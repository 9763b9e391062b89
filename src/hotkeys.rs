//! Global quit key.
//!
//! In headless mode there is no preview window to press `q` in, so a global
//! keyboard listener (rdev) watches for it instead and raises the shared
//! [`StopSignal`]. The loop notices at its next iteration boundary.

use rdev::{listen, Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::preview::StopSignal;

/// Key that ends the capture session.
pub const QUIT_KEY: Key = Key::KeyQ;

/// Returns true if `event` is a press of the quit key.
pub fn is_quit_event(event: &Event) -> bool {
    matches!(event.event_type, EventType::KeyPress(key) if key == QUIT_KEY)
}

/// Listens for the quit key on a background thread.
pub struct QuitKeyListener {
    stop: StopSignal,
    /// Set when the listener should ignore further events
    disarmed: Arc<AtomicBool>,
    listener_thread: Option<JoinHandle<()>>,
}

impl QuitKeyListener {
    pub fn new(stop: StopSignal) -> Self {
        QuitKeyListener {
            stop,
            disarmed: Arc::new(AtomicBool::new(false)),
            listener_thread: None,
        }
    }

    /// Start listening for the quit key.
    ///
    /// Returns an error if the listener is already running.
    pub fn start(&mut self) -> Result<(), String> {
        if self.listener_thread.is_some() {
            return Err("Quit key listener already running".to_string());
        }

        let stop = self.stop.clone();
        let disarmed = self.disarmed.clone();

        let handle = thread::spawn(move || {
            let callback = move |event: Event| {
                if disarmed.load(Ordering::SeqCst) {
                    return;
                }
                if is_quit_event(&event) {
                    log::info!("Quit key pressed");
                    stop.request_stop();
                }
            };

            // Blocks for the life of the process. Needs an X11 session on Linux.
            if let Err(e) = listen(callback) {
                log::warn!("Quit key listener unavailable ({:?}); use Ctrl+C to stop", e);
            }
        });

        self.listener_thread = Some(handle);
        Ok(())
    }

    /// Stop reacting to key presses.
    pub fn stop(&mut self) {
        self.disarmed.store(true, Ordering::SeqCst);
        // rdev's listen() can't be interrupted, so the thread is detached
        // and lives until the process exits.
        self.listener_thread = None;
    }
}

impl Drop for QuitKeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}
