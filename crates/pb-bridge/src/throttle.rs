//! Leading+trailing edge throttle for viewport property writes

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{sleep_until, Instant};

use pb_core::Viewport;

/// Delivery callback for a coalesced viewport write
pub(crate) type Deliver = Arc<dyn Fn(Viewport) + Send + Sync>;

struct ThrottleState {
    last_fire: Option<Instant>,
    pending: Option<Viewport>,
    trailing_scheduled: bool,
}

/// Coalesces rapid viewport updates into at most one leading and one
/// trailing delivery per period.
pub(crate) struct Throttle {
    period: Duration,
    deliver: Deliver,
    state: Arc<Mutex<ThrottleState>>,
}

impl Throttle {
    pub fn new(period_ms: u64, deliver: Deliver) -> Self {
        Self {
            period: Duration::from_millis(period_ms),
            deliver,
            state: Arc::new(Mutex::new(ThrottleState {
                last_fire: None,
                pending: None,
                trailing_scheduled: false,
            })),
        }
    }

    /// Deliver now if outside the period, otherwise stash the value and
    /// schedule one trailing delivery for the period's end.
    pub fn call(&self, runtime: &Handle, viewport: Viewport) {
        let now = Instant::now();
        let mut state = self.state.lock();

        let elapsed = state.last_fire.map(|t| now.duration_since(t));
        let within_period = matches!(elapsed, Some(e) if e < self.period);

        if !within_period {
            state.last_fire = Some(now);
            drop(state);
            (self.deliver)(viewport);
            return;
        }

        state.pending = Some(viewport);
        if !state.trailing_scheduled {
            state.trailing_scheduled = true;
            let wait = elapsed.map(|e| self.period - e).unwrap_or(self.period);
            // Anchor the deadline to the call time, not the task's first
            // poll, so a paused test clock advanced before the spawn runs
            // still reaches it.
            let deadline = now + wait;
            let shared = self.state.clone();
            let deliver = self.deliver.clone();
            runtime.spawn(async move {
                sleep_until(deadline).await;
                let pending = {
                    let mut state = shared.lock();
                    state.trailing_scheduled = false;
                    state.last_fire = Some(Instant::now());
                    state.pending.take()
                };
                if let Some(viewport) = pending {
                    deliver(viewport);
                }
            });
        }
    }
}
