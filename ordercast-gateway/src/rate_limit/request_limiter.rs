/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Limiter variants behind one `try_acquire` interface.

use ordercast_core::conf::QueueProcessingOrder;
use ordercast_core::conf::RateLimitPolicyConfig;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use tokio::sync::Mutex;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio::sync::oneshot;
use tokio::time::Duration;
use tokio::time::Instant;

/// Plain value copy of one policy's limiter parameters.
#[derive(Clone, Debug)]
pub struct LimiterParams {
    permit_limit: u32,
    window: Duration,
    queue_limit: u32,
    queue_processing_order: QueueProcessingOrder,
    concurrency: bool,
}

impl LimiterParams {
    /// Fixed window parameters from a policy configuration.
    pub fn fixed_window(policy: &RateLimitPolicyConfig) -> Self {
        Self {
            permit_limit: policy.permit_limit(),
            window: Duration::from_secs(policy.window_secs()),
            queue_limit: policy.queue_limit(),
            queue_processing_order: policy.queue_processing_order(),
            concurrency: false,
        }
    }

    /// Concurrency parameters from a policy configuration.
    pub fn concurrency(policy: &RateLimitPolicyConfig) -> Self {
        Self {
            permit_limit: policy.permit_limit(),
            window: Duration::ZERO,
            queue_limit: policy.queue_limit(),
            queue_processing_order: policy.queue_processing_order(),
            concurrency: true,
        }
    }
}

/** Permit lease held for the duration of request processing.

For the concurrency variant, dropping the lease returns the permit. Fixed
window permits are not returnable: they are implicitly freed when the window
rolls.
*/
pub struct Lease {
    _permit: Option<OwnedSemaphorePermit>,
}

impl Lease {
    fn window() -> Self {
        Self { _permit: None }
    }

    fn concurrency(permit: OwnedSemaphorePermit) -> Self {
        Self {
            _permit: Some(permit),
        }
    }
}

/// Tagged limiter variant. All variants admit through the same
/// [Self::try_acquire] call.
pub enum RequestLimiter {
    /// `permit_limit` admissions per wall-clock window, queueing excess.
    FixedWindow(FixedWindowLimiter),
    /// Cap on simultaneous in-flight requests, queueing excess.
    Concurrency(ConcurrencyLimiter),
    /// Admits everything. Used when limiting is globally disabled.
    NoOp,
}

impl RequestLimiter {
    /// Build the variant the parameters describe.
    pub fn from_params(params: &LimiterParams) -> Self {
        if params.concurrency {
            Self::Concurrency(ConcurrencyLimiter::new(params))
        } else {
            Self::FixedWindow(FixedWindowLimiter::new(params))
        }
    }

    /// Attempt one permit. `None` is a rejection.
    pub async fn try_acquire(&self) -> Option<Lease> {
        match self {
            Self::FixedWindow(limiter) => limiter.try_acquire().await,
            Self::Concurrency(limiter) => limiter.try_acquire().await,
            Self::NoOp => Some(Lease::window()),
        }
    }
}

struct FixedWindowState {
    window_start: Instant,
    used: u32,
    queue: VecDeque<oneshot::Sender<()>>,
}

/** Fixed window limiter.

Admits up to `permit_limit` requests per window. Excess requests queue up to
`queue_limit` and are admitted when the window rolls, in the configured
queue order; beyond that, requests are rejected outright. A queued waiter
that is cancelled (client went away) is skipped at roll time.
*/
pub struct FixedWindowLimiter {
    permit_limit: u32,
    window: Duration,
    queue_limit: u32,
    queue_processing_order: QueueProcessingOrder,
    state: Mutex<FixedWindowState>,
}

impl FixedWindowLimiter {
    fn new(params: &LimiterParams) -> Self {
        Self {
            permit_limit: params.permit_limit,
            // A zero window would make the roll loop spin.
            window: params.window.max(Duration::from_millis(1)),
            queue_limit: params.queue_limit,
            queue_processing_order: params.queue_processing_order,
            state: Mutex::new(FixedWindowState {
                window_start: Instant::now(),
                used: 0,
                queue: VecDeque::new(),
            }),
        }
    }

    /// Roll the window forward if its end passed and hand freed permits to
    /// queued waiters in the configured order.
    fn roll_window(&self, state: &mut FixedWindowState, now: Instant) {
        while now.duration_since(state.window_start) >= self.window {
            state.window_start += self.window;
            state.used = 0;
            while state.used < self.permit_limit {
                let waiter = match self.queue_processing_order {
                    QueueProcessingOrder::OldestFirst => state.queue.pop_front(),
                    QueueProcessingOrder::NewestFirst => state.queue.pop_back(),
                };
                let Some(waiter) = waiter else {
                    break;
                };
                if waiter.send(()).is_ok() {
                    state.used += 1;
                }
            }
        }
    }

    async fn try_acquire(&self) -> Option<Lease> {
        let admitted_rx = {
            let mut state = self.state.lock().await;
            self.roll_window(&mut state, Instant::now());
            if state.used < self.permit_limit {
                state.used += 1;
                return Some(Lease::window());
            }
            if state.queue.len() >= self.queue_limit as usize {
                return None;
            }
            let (admitted_tx, admitted_rx) = oneshot::channel();
            state.queue.push_back(admitted_tx);
            admitted_rx
        };
        self.await_queued_admission(admitted_rx).await
    }

    /// Wait until a window roll hands this waiter a permit. The waiter
    /// itself drives the roll when its sleep passes the window end, so no
    /// background task is needed.
    async fn await_queued_admission(&self, mut admitted_rx: oneshot::Receiver<()>) -> Option<Lease> {
        loop {
            let window_end = {
                let state = self.state.lock().await;
                state.window_start + self.window
            };
            tokio::select! {
                admitted = &mut admitted_rx => {
                    // The sender is only dropped together with the whole
                    // limiter state, so a closed channel means shutdown.
                    return admitted.ok().map(|()| Lease::window());
                }
                _ = tokio::time::sleep_until(window_end) => {
                    let mut state = self.state.lock().await;
                    self.roll_window(&mut state, Instant::now());
                }
            }
        }
    }
}

/** Concurrency limiter.

Caps simultaneous in-flight requests at `permit_limit`. Up to `queue_limit`
requests wait for a permit to be released; the rest is rejected. Permits
are released by dropping the [Lease] when the response completes. Waiters
are served longest-waiting first.
*/
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    queue_limit: u32,
    waiting: Arc<AtomicU32>,
}

impl ConcurrencyLimiter {
    fn new(params: &LimiterParams) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(params.permit_limit as usize)),
            queue_limit: params.queue_limit,
            waiting: Arc::new(AtomicU32::new(0)),
        }
    }

    async fn try_acquire(&self) -> Option<Lease> {
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Some(Lease::concurrency(permit));
        }
        if self.waiting.fetch_add(1, Ordering::SeqCst) >= self.queue_limit {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        let _waiting_guard = DecrementOnDrop(Arc::clone(&self.waiting));
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .ok()
            .map(Lease::concurrency)
    }
}

/// Keeps the waiter count honest also when a queued request is cancelled.
struct DecrementOnDrop(Arc<AtomicU32>);

impl Drop for DecrementOnDrop {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixed_window_params(
        permit_limit: u32,
        window: Duration,
        queue_limit: u32,
    ) -> LimiterParams {
        LimiterParams {
            permit_limit,
            window,
            queue_limit,
            queue_processing_order: QueueProcessingOrder::OldestFirst,
            concurrency: false,
        }
    }

    fn concurrency_params(permit_limit: u32, queue_limit: u32) -> LimiterParams {
        LimiterParams {
            permit_limit,
            window: Duration::ZERO,
            queue_limit,
            queue_processing_order: QueueProcessingOrder::OldestFirst,
            concurrency: true,
        }
    }

    #[tokio::test]
    async fn fixed_window_admits_permit_limit_then_rejects() {
        let limiter = RequestLimiter::from_params(&fixed_window_params(
            2,
            Duration::from_secs(60),
            0,
        ));
        assert!(limiter.try_acquire().await.is_some());
        assert!(limiter.try_acquire().await.is_some());
        // Third request within the same window is rejected.
        assert!(limiter.try_acquire().await.is_none());
    }

    #[tokio::test]
    async fn fixed_window_queued_request_is_admitted_next_window() {
        let limiter = Arc::new(RequestLimiter::from_params(&fixed_window_params(
            1,
            Duration::from_millis(50),
            1,
        )));
        assert!(limiter.try_acquire().await.is_some());
        // Queue slot available: this waits for the window to roll.
        let queued = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.try_acquire().await })
        };
        // Queue full: immediate rejection.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(limiter.try_acquire().await.is_none());
        assert!(queued.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn fixed_window_permits_reset_at_window_boundary() {
        let limiter =
            RequestLimiter::from_params(&fixed_window_params(1, Duration::from_millis(20), 0));
        assert!(limiter.try_acquire().await.is_some());
        assert!(limiter.try_acquire().await.is_none());
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(limiter.try_acquire().await.is_some());
    }

    #[tokio::test]
    async fn concurrency_permits_return_on_lease_drop() {
        let limiter = RequestLimiter::from_params(&concurrency_params(1, 0));
        let lease = limiter.try_acquire().await.unwrap();
        assert!(limiter.try_acquire().await.is_none());
        drop(lease);
        assert!(limiter.try_acquire().await.is_some());
    }

    #[tokio::test]
    async fn concurrency_queue_admits_when_permit_frees() {
        let limiter = Arc::new(RequestLimiter::from_params(&concurrency_params(1, 1)));
        let lease = limiter.try_acquire().await.unwrap();
        let queued = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.try_acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        // Queue is full now, further requests bounce.
        assert!(limiter.try_acquire().await.is_none());
        drop(lease);
        assert!(queued.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn noop_always_admits() {
        let limiter = RequestLimiter::NoOp;
        for _ in 0..1000 {
            assert!(limiter.try_acquire().await.is_some());
        }
    }
}
