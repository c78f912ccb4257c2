//! Bounded worker pool with a join barrier.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Running,
    Draining,
    Joined,
}

struct State {
    mode: Mode,
    pending: usize,
    failures: Vec<Error>,
}

struct Shared {
    state: Mutex<State>,
    drained: Condvar,
}

/// Fixed-size pool of worker threads. Tasks are fallible; failures are
/// captured and surfaced at `join`, never swallowed.
///
/// The pool moves Running -> Draining -> Joined and never back; submitting
/// after `join` is a programmer error.
pub struct Pool {
    threads: rayon::ThreadPool,
    shared: Arc<Shared>,
}

impl Pool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()?;
        Ok(Self {
            threads,
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    mode: Mode::Running,
                    pending: 0,
                    failures: Vec::new(),
                }),
                drained: Condvar::new(),
            }),
        })
    }

    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        {
            let mut state = self.shared.state.lock();
            assert!(
                state.mode == Mode::Running,
                "task submitted to a joined pool"
            );
            state.pending += 1;
        }

        let shared = Arc::clone(&self.shared);
        self.threads.spawn(move || {
            let outcome = task();
            let mut state = shared.state.lock();
            if let Err(e) = outcome {
                state.failures.push(e);
            }
            state.pending -= 1;
            if state.pending == 0 {
                shared.drained.notify_all();
            }
        });
    }

    /// Block until every submitted task has finished. Returns the first
    /// captured failure; any others are logged.
    pub fn join(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock();
        assert!(state.mode == Mode::Running, "pool joined twice");
        state.mode = Mode::Draining;
        while state.pending > 0 {
            self.shared.drained.wait(&mut state);
        }
        state.mode = Mode::Joined;

        let mut failures = std::mem::take(&mut state.failures);
        if failures.is_empty() {
            return Ok(());
        }
        for extra in failures.iter().skip(1) {
            log::warn!("additional task failure: {extra}");
        }
        Err(failures.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_all_tasks_run_before_join_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = Pool::new(4).unwrap();

        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        pool.join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn test_join_surfaces_task_failure() {
        let mut pool = Pool::new(2).unwrap();
        pool.submit(|| Ok(()));
        pool.submit(|| {
            Err(Error::InvalidScale {
                path: "bad.las".into(),
            })
        });

        let err = pool.join().unwrap_err();
        assert!(matches!(err, Error::InvalidScale { .. }));
    }

    #[test]
    fn test_join_with_no_tasks() {
        let mut pool = Pool::new(1).unwrap();
        pool.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "joined pool")]
    fn test_submit_after_join_panics() {
        let mut pool = Pool::new(1).unwrap();
        pool.join().unwrap();
        pool.submit(|| Ok(()));
    }
}
