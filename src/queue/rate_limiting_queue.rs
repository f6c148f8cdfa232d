//! # Rate-limited, de-duplicating work queue.
//!
//! [`RateLimitingQueue`] is the default [`Queue`] a controller builds at start.
//!
//! ## Item states
//! ```text
//!            add()                     get()                    done()
//!   ───────────────► dirty + queue ───────────► processing ───────────► gone
//!                         ▲                          │
//!                         │ add() while processing   │
//!                         └──── dirty (re-queued on done) ◄┘
//! ```
//!
//! ## Rules
//! - An item is never queued twice and never handed to two workers at once.
//! - `add_after` goes through the delay loop; the earliest ready time per item wins.
//! - After `shutdown`, adds are dropped; items already queued are still handed
//!   out, then `get` returns `None`.
//!
//! ## Background work
//! The delay loop is spawned by [`RateLimitingQueue::new`], which therefore
//! requires a tokio runtime. It exits on `shutdown` or when the queue is dropped.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::interface::{Key, Queue};
use super::rate_limiter::RateLimiterRef;

/// Ready time used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

struct State<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    shutting_down: bool,
}

/// Default work queue implementation.
pub struct RateLimitingQueue<K: Key> {
    name: Arc<str>,
    limiter: RateLimiterRef<K>,
    state: Mutex<State<K>>,
    ready: Notify,
    delayed: mpsc::UnboundedSender<Delayed<K>>,
    stop: CancellationToken,
}

impl<K: Key> RateLimitingQueue<K> {
    /// Creates the queue and spawns its delay loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(name: &str, limiter: RateLimiterRef<K>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        Arc::new_cyclic(|weak: &Weak<Self>| {
            tokio::spawn(run_delay_loop(weak.clone(), rx, stop.clone()));
            Self {
                name: name.into(),
                limiter,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                ready: Notify::new(),
                delayed: tx,
                stop,
            }
        })
    }

    /// Name the queue was created with (the controller name).
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, State<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pops the next item, or reports whether the caller should stop waiting.
    fn try_pop(&self) -> Result<K, bool> {
        let mut st = self.lock();
        match st.queue.pop_front() {
            Some(item) => {
                st.dirty.remove(&item);
                st.processing.insert(item.clone());
                Ok(item)
            }
            None => Err(st.shutting_down),
        }
    }
}

#[async_trait]
impl<K: Key> Queue<K> for RateLimitingQueue<K> {
    fn add(&self, item: K) {
        {
            let mut st = self.lock();
            if st.shutting_down || st.dirty.contains(&item) {
                return;
            }
            st.dirty.insert(item.clone());
            if st.processing.contains(&item) {
                return;
            }
            st.queue.push_back(item);
        }
        self.ready.notify_one();
    }

    fn add_after(&self, item: K, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(item);
            return;
        }
        let now = Instant::now();
        let ready_at = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let _ = self.delayed.send(Delayed { item, ready_at });
    }

    fn add_rate_limited(&self, item: K) {
        let delay = self.limiter.when(&item);
        self.add_after(item, delay);
    }

    fn forget(&self, item: &K) {
        self.limiter.forget(item);
    }

    fn num_requeues(&self, item: &K) -> u32 {
        self.limiter.num_requeues(item)
    }

    async fn get(&self) -> Option<K> {
        loop {
            // Register interest before checking so a concurrent add/shutdown is not missed.
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_pop() {
                Ok(item) => return Some(item),
                Err(true) => return None,
                Err(false) => notified.await,
            }
        }
    }

    fn done(&self, item: &K) {
        let requeued = {
            let mut st = self.lock();
            st.processing.remove(item);
            if st.dirty.contains(item) {
                st.queue.push_back(item.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            self.ready.notify_one();
        }
    }

    fn len(&self) -> usize {
        self.lock().queue.len()
    }

    fn shutdown(&self) {
        self.lock().shutting_down = true;
        self.stop.cancel();
        self.ready.notify_waiters();
    }

    fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }
}

impl<K: Key> Drop for RateLimitingQueue<K> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// An item waiting in the delay loop.
struct Delayed<K> {
    item: K,
    ready_at: Instant,
}

/// Heap entry ordered by ready time only.
struct Entry<K> {
    ready_at: Instant,
    item: K,
}

impl<K> PartialEq for Entry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at
    }
}

impl<K> Eq for Entry<K> {}

impl<K> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Entry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ready_at.cmp(&other.ready_at)
    }
}

/// Holds delayed items until they are ready, then adds them to the queue.
///
/// `waiting` maps each item to the ready time that counts; heap entries whose
/// time no longer matches are stale and skipped.
async fn run_delay_loop<K: Key>(
    queue: Weak<RateLimitingQueue<K>>,
    mut rx: mpsc::UnboundedReceiver<Delayed<K>>,
    stop: CancellationToken,
) {
    let mut heap: BinaryHeap<Reverse<Entry<K>>> = BinaryHeap::new();
    let mut waiting: HashMap<K, Instant> = HashMap::new();

    loop {
        let now = Instant::now();
        while heap.peek().is_some_and(|Reverse(e)| e.ready_at <= now) {
            let Some(Reverse(entry)) = heap.pop() else { break };
            if waiting.get(&entry.item) != Some(&entry.ready_at) {
                continue;
            }
            waiting.remove(&entry.item);
            match queue.upgrade() {
                Some(q) => q.add(entry.item),
                None => return,
            }
        }

        let next = heap.peek().map(|Reverse(e)| e.ready_at);
        let wake = async {
            match next {
                Some(at) => time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = stop.cancelled() => return,
            _ = wake => {}
            msg = rx.recv() => {
                let Some(Delayed { item, ready_at }) = msg else { return };
                let earlier = waiting.get(&item).is_none_or(|current| ready_at < *current);
                if earlier {
                    waiting.insert(item.clone(), ready_at);
                    heap.push(Reverse(Entry { ready_at, item }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::queue::BackoffRateLimiter;

    fn queue() -> Arc<RateLimitingQueue<&'static str>> {
        let limiter: RateLimiterRef<&'static str> = Arc::new(BackoffRateLimiter::new(BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }));
        RateLimitingQueue::new("test", limiter)
    }

    #[tokio::test]
    async fn duplicate_adds_are_collapsed() {
        let q = queue();
        q.add("a");
        q.add("a");
        q.add("b");
        assert_eq!(q.len(), 2);
        assert_eq!(q.get().await, Some("a"));
        assert_eq!(q.get().await, Some("b"));
    }

    #[tokio::test]
    async fn item_added_while_processing_is_requeued_on_done() {
        let q = queue();
        q.add("a");
        let item = q.get().await.unwrap();

        q.add("a");
        assert!(q.is_empty(), "must not be handed out twice concurrently");

        q.done(&item);
        assert_eq!(q.len(), 1);
        assert_eq!(q.get().await, Some("a"));
    }

    #[tokio::test]
    async fn shutdown_wakes_blocked_getters_after_draining() {
        let q = queue();
        q.add("left-over");

        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move {
                let first = q.get().await;
                let second = q.get().await;
                (first, second)
            })
        };

        tokio::task::yield_now().await;
        q.shutdown();
        q.add("dropped");

        let (first, second) = waiter.await.unwrap();
        assert_eq!(first, Some("left-over"));
        assert_eq!(second, None);
        assert!(q.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_items_arrive_after_their_delay() {
        let q = queue();
        let begin = Instant::now();
        q.add_after("later", Duration::from_secs(5));
        q.add_after("later", Duration::from_secs(1));

        assert_eq!(q.get().await, Some("later"));
        let waited = begin.elapsed();
        assert!(waited >= Duration::from_secs(1), "waited {waited:?}");
        assert!(waited < Duration::from_secs(5), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_delay_is_parked_instead_of_panicking() {
        let q = queue();
        q.add_after("never", Duration::MAX);

        time::sleep(Duration::from_secs(3600)).await;
        assert!(q.is_empty());

        q.add_after("never", Duration::from_millis(10));
        assert_eq!(q.get().await, Some("never"));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_adds_back_off_per_item() {
        let q = queue();
        q.add_rate_limited("a");
        q.add_rate_limited("a");
        assert_eq!(q.num_requeues(&"a"), 2);

        assert_eq!(q.get().await, Some("a"));
        q.done(&"a");
        q.forget(&"a");
        assert_eq!(q.num_requeues(&"a"), 0);
    }
}
