use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::desktop::Desktop;
use super::surface::Surface;
use crate::events::{EventBus, UiEvent};

/// ~60 samples per second
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Samples the global pointer and pushes it to the cursor overlay
///
/// At most one sampling task exists; starting again replaces it.
pub struct CursorBroadcaster {
    desktop: Arc<dyn Desktop>,
    events: EventBus,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl CursorBroadcaster {
    pub fn new(desktop: Arc<dyn Desktop>, events: EventBus, interval: Duration) -> Self {
        Self {
            desktop,
            events,
            interval,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start sampling, cancelling any previous loop first
    pub async fn start(&mut self) {
        self.stop().await;

        let desktop = Arc::clone(&self.desktop);
        let events = self.events.clone();
        let period = self.interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if desktop.is_visible(Surface::CursorOverlay) {
                    let point = desktop.pointer_position();
                    events.publish(UiEvent::CursorMove {
                        x: point.x,
                        y: point.y,
                    });
                }
            }
        }));

        info!("Cursor polling started ({}ms)", period.as_millis());
    }

    /// Stop sampling; no position is published after this returns
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Wait for the cancellation to land so a tick in flight cannot publish late
            let _ = task.await;
            debug!("Cursor polling stopped");
        }
    }
}

impl Drop for CursorBroadcaster {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessDesktop, Point, SurfaceSpec};

    fn overlay_desktop() -> Arc<HeadlessDesktop> {
        let desktop = Arc::new(HeadlessDesktop::new(std::env::temp_dir()));
        let spec = SurfaceSpec::for_surface(Surface::CursorOverlay, &desktop.primary_display());
        desktop.create_surface(&spec).unwrap();
        desktop.set_visible(Surface::CursorOverlay, true).unwrap();
        desktop
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_single_loop() {
        let desktop = overlay_desktop();
        desktop.set_pointer(Point { x: 5, y: 6 });
        let events = EventBus::default();
        let mut rx = events.subscribe();

        let mut cursor = CursorBroadcaster::new(desktop.clone(), events, DEFAULT_POLL_INTERVAL);
        cursor.start().await;
        cursor.start().await;
        assert!(cursor.is_running());

        tokio::time::sleep(Duration::from_millis(16 * 10 + 8)).await;
        cursor.stop().await;

        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event, UiEvent::CursorMove { x: 5, y: 6 });
            count += 1;
        }
        // One immediate tick plus ten periods from a single loop
        assert_eq!(count, 11);
        assert!(!cursor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_overlay_receives_nothing() {
        let desktop = overlay_desktop();
        desktop.set_visible(Surface::CursorOverlay, false).unwrap();
        let events = EventBus::default();
        let mut rx = events.subscribe();

        let mut cursor = CursorBroadcaster::new(desktop, events, DEFAULT_POLL_INTERVAL);
        cursor.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        cursor.stop().await;

        assert!(rx.try_recv().is_err());
    }
}
