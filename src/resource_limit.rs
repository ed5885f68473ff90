/*!

  Cooperative cancellation. The solver core never kills itself: the scheduler polls a
  `ResourceLimit` at the top of every propagation step, and anything with a clone of the
  underlying flag (a signal handler, a timeout thread, another thread entirely) may trip
  it. When the flag is seen the search unwinds and reports an incomplete run.

*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// The abort flag plus an optional deadline, polled between propagator invocations.
#[derive(Clone, Debug, Default)]
pub struct ResourceLimit {
  abort:    Arc<AtomicBool>,
  deadline: Option<Instant>,
}

impl ResourceLimit {
  pub fn new() -> ResourceLimit {
    Self::default()
  }

  /// A limit that also considers itself aborted once `timeout` has elapsed.
  pub fn with_timeout(timeout: Duration) -> ResourceLimit {
    ResourceLimit {
      abort:    Arc::new(AtomicBool::new(false)),
      deadline: Some(Instant::now() + timeout),
    }
  }

  /// The shared flag, for handing to signal handlers and timer threads.
  pub fn flag(&self) -> Arc<AtomicBool> {
    Arc::clone(&self.abort)
  }

  pub fn abort(&self) {
    self.abort.store(true, Ordering::Relaxed);
  }

  pub fn is_aborted(&self) -> bool {
    self.abort.load(Ordering::Relaxed)
      || self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
  }
}

/// A watcher thread that trips a limit's abort flag after a fixed duration, released when
/// dropped. The solver itself never sleeps; this is the driver-side half of `--timeout`.
pub struct ScopedTimeout {
  stop:   Arc<AtomicBool>,
  handle: Option<JoinHandle<()>>,
}

impl ScopedTimeout {
  pub fn new(limit: &ResourceLimit, timeout: Duration) -> ScopedTimeout {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_thread = Arc::clone(&stop);
    let flag = limit.flag();
    let deadline = Instant::now() + timeout;

    let handle = std::thread::spawn(move || {
      while !stop_for_thread.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
          flag.store(true, Ordering::Relaxed);
          return;
        }
        std::thread::park_timeout((deadline - now).min(Duration::from_millis(50)));
      }
    });

    ScopedTimeout { stop, handle: Some(handle) }
  }
}

impl Drop for ScopedTimeout {
  fn drop(&mut self) {
    self.stop.store(true, Ordering::Relaxed);
    if let Some(handle) = self.handle.take() {
      handle.thread().unpark();
      let _ = handle.join();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn manual_abort_is_visible() {
    let limit = ResourceLimit::new();
    assert!(!limit.is_aborted());
    limit.abort();
    assert!(limit.is_aborted());
  }

  #[test]
  fn deadline_expiry_counts_as_abort() {
    let limit = ResourceLimit::with_timeout(Duration::from_millis(0));
    assert!(limit.is_aborted());
  }

  #[test]
  fn scoped_timeout_trips_the_flag() {
    let limit = ResourceLimit::new();
    {
      let _timeout = ScopedTimeout::new(&limit, Duration::from_millis(1));
      std::thread::sleep(Duration::from_millis(30));
    }
    assert!(limit.is_aborted());
  }
}
