use std::{
    convert::Infallible,
    fmt::Debug,
    sync::{Mutex, OnceLock, PoisonError},
};

/// At-most-once construction guard for a lazy singleton
///
/// Concurrent first accesses construct the value exactly once. The fast path only reads the
/// [`OnceLock`]; construction runs while holding the init lock and re-checks the slot first.
pub struct LazySingleton<T> {
    once: OnceLock<T>,
    init: Mutex<()>,
}

impl<T> Default for LazySingleton<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for LazySingleton<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LazySingleton").field(&self.get()).finish()
    }
}

impl<T> LazySingleton<T> {
    pub const fn new() -> Self {
        LazySingleton {
            once: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// The value if it was already constructed
    pub fn get(&self) -> Option<&T> {
        self.once.get()
    }

    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        match self.get_or_try_init(|| Ok::<_, Infallible>(init())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Construct the value on first access.
    ///
    /// A failing initializer leaves the slot empty, so a later caller may try again.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.once.get() {
            return Ok(value);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);

        // Double check - it might have been set while we waited for the lock
        if let Some(value) = self.once.get() {
            return Ok(value);
        }

        let value = init()?;
        Ok(self.once.get_or_init(|| value))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    use super::*;

    #[test]
    fn concurrent_first_access_constructs_once() {
        let lazy = LazySingleton::<String>::new();
        let constructed = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let value = lazy.get_or_init(|| {
                        constructed.fetch_add(1, Ordering::SeqCst);
                        "index".to_string()
                    });
                    assert_eq!(value, "index");
                });
            }
        });

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.get().map(String::as_str), Some("index"));
    }

    #[test]
    fn failed_init_can_be_retried() {
        let lazy = LazySingleton::<u32>::new();

        assert_eq!(lazy.get_or_try_init(|| Err("pool unavailable")), Err("pool unavailable"));
        assert_eq!(lazy.get(), None);

        assert_eq!(lazy.get_or_try_init(|| Ok::<_, &str>(5)), Ok(&5));
        assert_eq!(lazy.get_or_try_init(|| Err("ignored")), Ok(&5));
    }
}
