//! Global pacing of page-request starts.
//!
//! [`RateGate`] issues at most `burst` permits per `interval`. A permit only
//! licenses *starting* a request; nothing here tracks how many requests are in
//! flight once released.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use archiver_core::download::RateGate;
//!
//! # async fn example() {
//! let gate = Arc::new(RateGate::new(Duration::from_millis(1000), 1));
//!
//! // First permit is immediate (the bucket starts full)
//! gate.acquire().await;
//!
//! // Second permit waits for the next tick
//! gate.acquire().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

/// Token-bucket gate shared by every chapter of every work in the process.
///
/// Waiters queue on a fair `tokio::sync::Mutex`, so permits are handed out in
/// the order `acquire` was called. The waiter at the head of the queue holds
/// the lock while it sleeps until the next refill, which keeps everyone behind
/// it in line.
#[derive(Debug)]
pub struct RateGate {
    interval: Duration,
    burst: u32,
    disabled: bool,
    state: Mutex<GateState>,
    issued: AtomicU64,
}

#[derive(Debug)]
struct GateState {
    /// Permits available right now.
    tokens: u32,
    /// Tick the bucket was last topped up at.
    last_refill: Instant,
}

impl RateGate {
    /// Creates a gate releasing `burst` permits per `interval`.
    ///
    /// A zero interval yields a disabled gate; a zero burst is raised to one.
    #[must_use]
    #[instrument(fields(interval_ms = interval.as_millis()))]
    pub fn new(interval: Duration, burst: u32) -> Self {
        if interval.is_zero() {
            return Self::disabled();
        }
        let burst = burst.max(1);
        debug!("creating rate gate");
        Self {
            interval,
            burst,
            disabled: false,
            state: Mutex::new(GateState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            issued: AtomicU64::new(0),
        }
    }

    /// Creates a gate that never waits.
    #[must_use]
    #[instrument]
    pub fn disabled() -> Self {
        debug!("creating disabled rate gate");
        Self {
            interval: Duration::ZERO,
            burst: u32::MAX,
            disabled: true,
            state: Mutex::new(GateState {
                tokens: 0,
                last_refill: Instant::now(),
            }),
            issued: AtomicU64::new(0),
        }
    }

    /// Returns whether the gate is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the refill interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the bucket capacity.
    #[must_use]
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Returns how many permits have been issued so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Waits for a permit.
    ///
    /// Never fails. Callers that never call this never block.
    #[instrument(level = "trace", skip(self))]
    pub async fn acquire(&self) {
        if self.disabled {
            self.issued.fetch_add(1, Ordering::SeqCst);
            return;
        }

        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens == 0 {
            let next_tick = state.last_refill + self.interval;
            debug!(
                wait_ms = next_tick
                    .saturating_duration_since(Instant::now())
                    .as_millis(),
                "waiting for rate gate permit"
            );
            tokio::time::sleep_until(next_tick).await;
            self.refill(&mut state);
        }

        state.tokens = state.tokens.saturating_sub(1);
        let issued = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(issued, remaining = state.tokens, "rate gate permit issued");
    }

    fn refill(&self, state: &mut GateState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        let ticks = elapsed.as_nanos() / self.interval.as_nanos();
        if ticks == 0 {
            return;
        }

        if ticks >= u128::from(self.burst) {
            state.tokens = self.burst;
            state.last_refill = now;
        } else {
            // ticks < burst, so it fits in u32
            #[allow(clippy::cast_possible_truncation)]
            let ticks = ticks as u32;
            state.tokens = state.tokens.saturating_add(ticks).min(self.burst);
            state.last_refill += self.interval * ticks;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_rate_gate_new_stores_settings() {
        let gate = RateGate::new(Duration::from_millis(500), 3);
        assert_eq!(gate.interval(), Duration::from_millis(500));
        assert_eq!(gate.burst(), 3);
        assert!(!gate.is_disabled());
    }

    #[test]
    fn test_rate_gate_zero_interval_is_disabled() {
        let gate = RateGate::new(Duration::ZERO, 1);
        assert!(gate.is_disabled());
    }

    #[test]
    fn test_rate_gate_zero_burst_raised_to_one() {
        let gate = RateGate::new(Duration::from_secs(1), 0);
        assert_eq!(gate.burst(), 1);
    }

    #[tokio::test]
    async fn test_rate_gate_disabled_no_delay() {
        tokio::time::pause();

        let gate = RateGate::disabled();
        let start = Instant::now();

        for _ in 0..5 {
            gate.acquire().await;
        }

        assert!(start.elapsed() < Duration::from_millis(10));
        assert_eq!(gate.issued(), 5);
    }

    #[tokio::test]
    async fn test_rate_gate_first_permit_immediate() {
        tokio::time::pause();

        let gate = RateGate::new(Duration::from_secs(1), 1);
        let start = Instant::now();

        gate.acquire().await;

        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_rate_gate_paces_at_interval() {
        tokio::time::pause();

        let gate = RateGate::new(Duration::from_secs(1), 1);
        let start = Instant::now();

        gate.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1100));

        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_millis(2100));
    }

    #[tokio::test]
    async fn test_rate_gate_burst_released_together() {
        tokio::time::pause();

        let gate = RateGate::new(Duration::from_secs(1), 3);
        let start = Instant::now();

        gate.acquire().await;
        gate.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        // Bucket drained: fourth permit waits one tick
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_rate_gate_refills_after_idle_but_caps_at_burst() {
        tokio::time::pause();

        let gate = RateGate::new(Duration::from_secs(1), 2);
        gate.acquire().await;
        gate.acquire().await;

        tokio::time::advance(Duration::from_secs(10)).await;

        let start = Instant::now();
        gate.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_rate_gate_issues_permits_fifo() {
        tokio::time::pause();

        let gate = Arc::new(RateGate::new(Duration::from_millis(100), 1));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        for id in 0..5 {
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                gate.acquire().await;
                order.lock().unwrap().push(id);
            }));
            // Let the task reach the gate before spawning the next one
            tokio::task::yield_now().await;
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(gate.issued(), 5);
    }

    #[tokio::test]
    async fn test_rate_gate_shared_waiters_spaced_by_interval() {
        tokio::time::pause();

        let gate = Arc::new(RateGate::new(Duration::from_secs(1), 1));
        let start = Instant::now();
        let mut handles = Vec::new();

        for _ in 0..3 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                gate.acquire().await;
                Instant::now()
            }));
        }

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap().duration_since(start));
        }
        times.sort();

        assert!(times[0] < Duration::from_millis(10));
        assert!(times[1] >= Duration::from_secs(1));
        assert!(times[2] >= Duration::from_secs(2));
    }
}
