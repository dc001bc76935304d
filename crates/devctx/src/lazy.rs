//! Compute-once value
//!
//! [`Lazy`] runs its initializer on first access and hands the memoized value
//! to every later caller. Concurrent first accesses block until the single
//! initializer run completes, then observe its result. An initializer that
//! panics is memoized as an [`InitPanic`] instead of poisoning later calls.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, OnceLock};

type Init<T> = Box<dyn FnOnce() -> T + Send>;

/// Panic raised by a [`Lazy`] initializer, with its message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPanic(pub String);

impl fmt::Display for InitPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "initializer panicked: {}", self.0)
    }
}

impl InitPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());
        Self(message)
    }
}

pub struct Lazy<T> {
    cell: OnceLock<Result<T, InitPanic>>,
    init: Mutex<Option<Init<T>>>,
}

impl<T> Lazy<T> {
    /// Create a value computed by `init` on first access
    pub fn new<F>(init: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            cell: OnceLock::new(),
            init: Mutex::new(Some(Box::new(init))),
        }
    }

    /// Get the value, running the initializer if this is the first access
    pub fn get(&self) -> Result<&T, &InitPanic> {
        self.cell
            .get_or_init(|| {
                let init = self
                    .init
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .take();
                match init {
                    Some(init) => panic::catch_unwind(AssertUnwindSafe(init))
                        .map_err(InitPanic::from_payload),
                    // Only reachable if a previous run unwound past catch_unwind
                    None => Err(InitPanic("initializer already consumed".to_string())),
                }
            })
            .as_ref()
    }

    /// Get the value only if it has already been computed
    pub fn get_if_initialized(&self) -> Option<&T> {
        self.cell.get().and_then(|r| r.as_ref().ok())
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(Ok(value)) => f.debug_tuple("Lazy").field(value).finish(),
            Some(Err(panic)) => f.debug_tuple("Lazy").field(panic).finish(),
            None => f.write_str("Lazy(<uninit>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_initializes_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let lazy = Lazy::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            7
        });

        assert!(!lazy.is_initialized());
        assert_eq!(lazy.get_if_initialized(), None);
        assert_eq!(lazy.get(), Ok(&7));
        assert_eq!(lazy.get(), Ok(&7));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(lazy.is_initialized());
    }

    #[test]
    fn test_concurrent_first_access() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let lazy = Arc::new(Lazy::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Arc::new(String::from("device"))
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = lazy.clone();
                thread::spawn(move || lazy.get().unwrap().clone())
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_debug_output() {
        let lazy = Lazy::new(|| 1u8);
        assert_eq!(format!("{:?}", lazy), "Lazy(<uninit>)");
        lazy.get().unwrap();
        assert_eq!(format!("{:?}", lazy), "Lazy(1)");
    }

    #[test]
    fn test_panicking_initializer_is_memoized() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let lazy: Arc<Lazy<u8>> = Arc::new(Lazy::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("open exploded");
        }));

        let first = lazy.clone();
        let from_thread = thread::spawn(move || first.get().copied().map_err(InitPanic::clone))
            .join()
            .expect("get() must not propagate the panic");
        assert_eq!(from_thread, Err(InitPanic("open exploded".to_string())));

        assert_eq!(lazy.get(), Err(&InitPanic("open exploded".to_string())));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(lazy.is_initialized());
        assert_eq!(lazy.get_if_initialized(), None);
    }
}
