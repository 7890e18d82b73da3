// crates/snapreel-media/src/countdown.rs
//
// Delayed-start timer for hands-free recording.
//
// Driven by the same per-frame `tick(dt)` as the capture controller. The
// countdown itself never touches the controller: it reports `Fire` and the
// session calls `start()`. Cancelling therefore has no side effects beyond
// disarming. Only one countdown exists per session; arming while another is
// pending replaces it.

pub use snapreel_core::config::CountdownPreset;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Whole seconds left, emitted once per second boundary crossed.
    Tick(u32),
    /// Zero reached; start recording now.
    Fire,
}

#[derive(Debug, Default)]
pub struct Countdown {
    remaining: Option<f64>,
}

impl Countdown {
    pub fn new() -> Self { Self::default() }

    /// Arm for `secs` seconds. Returns `true` if a pending countdown was replaced.
    pub fn arm(&mut self, secs: u32) -> bool {
        let replaced = self.remaining.is_some();
        if replaced {
            tracing::debug!("[countdown] re-armed, previous countdown cancelled");
        }
        self.remaining = Some(secs as f64);
        replaced
    }

    /// Disarm. Returns `true` if a countdown was pending.
    pub fn cancel(&mut self) -> bool {
        self.remaining.take().is_some()
    }

    pub fn is_armed(&self) -> bool { self.remaining.is_some() }

    /// Whole seconds shown on the overlay, rounded up.
    pub fn display_secs(&self) -> Option<u32> {
        self.remaining.map(|r| r.max(0.0).ceil() as u32)
    }

    /// Advance by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> Vec<CountdownEvent> {
        let Some(before) = self.remaining else { return Vec::new() };
        let after = before - dt.max(0.0);

        let shown_before = before.max(0.0).ceil() as u32;
        let shown_after  = after.max(0.0).ceil() as u32;
        let mut events: Vec<CountdownEvent> = (shown_after.max(1)..shown_before)
            .rev()
            .map(CountdownEvent::Tick)
            .collect();

        if after <= 1e-9 {
            self.remaining = None;
            events.push(CountdownEvent::Fire);
        } else {
            self.remaining = Some(after);
        }
        events
    }
}
