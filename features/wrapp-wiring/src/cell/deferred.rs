use std::{
    any::type_name,
    fmt::Debug,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use arc_swap::ArcSwapOption;
use futures_channel::oneshot;

use crate::cell::CellError;

/// Lazily populated, swappable reference
///
/// Handed to consumers of a deferred dependency before the provider exists. The container
/// binds the provider once it is constructed; every clone of the handle sees the same value.
pub struct Deferred<T>(Arc<DeferredInner<T>>);

struct DeferredInner<T> {
    slot: ArcSwapOption<T>,
    /// Waiters for the first bind - the lock also serializes binding
    waiters: Mutex<Vec<oneshot::Sender<Arc<T>>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Deferred(self.0.clone())
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Deferred").field(&self.try_get()).finish()
    }
}

impl<T> Deferred<T> {
    pub fn new() -> Self {
        Deferred(Arc::new(DeferredInner {
            slot: ArcSwapOption::empty(),
            waiters: Mutex::new(Vec::new()),
        }))
    }

    /// Bind the provider; fails if a value is already bound
    pub fn bind(&self, value: impl Into<Arc<T>>) -> Result<(), CellError> {
        let mut waiters = self.0.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        if self.0.slot.load().is_some() {
            return Err(CellError::AlreadyBound(type_name::<T>()));
        }

        let value = value.into();
        self.0.slot.store(Some(value.clone()));
        notify(&mut waiters, &value);
        Ok(())
    }

    /// Replace the bound value, returning the previous one
    pub fn rebind(&self, value: impl Into<Arc<T>>) -> Option<Arc<T>> {
        let mut waiters = self.0.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        let value = value.into();
        let previous = self.0.slot.swap(Some(value.clone()));
        notify(&mut waiters, &value);
        previous
    }

    /// Access the bound value
    pub fn get(&self) -> Result<Arc<T>, CellError> {
        self.try_get()
            .ok_or(CellError::Unbound(type_name::<T>()))
    }

    pub fn try_get(&self) -> Option<Arc<T>> {
        self.0.slot.load_full()
    }

    pub fn is_bound(&self) -> bool {
        self.0.slot.load().is_some()
    }

    /// Resolves as soon as a value is bound
    ///
    /// Must not be awaited while constructing the provider itself.
    pub fn wait(&self) -> impl Future<Output = Result<Arc<T>, CellError>> {
        let state = {
            let mut waiters = self.0.waiters.lock().unwrap_or_else(PoisonError::into_inner);
            // Checked under the lock, so a concurrent bind can not be missed
            match self.0.slot.load_full() {
                Some(value) => Ok(value),
                None => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Err(rx)
                }
            }
        };

        async move {
            match state {
                Ok(value) => Ok(value),
                Err(rx) => rx
                    .await
                    .map_err(|_| CellError::Abandoned(type_name::<T>())),
            }
        }
    }
}

fn notify<T>(waiters: &mut Vec<oneshot::Sender<Arc<T>>>, value: &Arc<T>) {
    for waiter in waiters.drain(..) {
        // Receiver dropped - nobody is waiting anymore
        let _ = waiter.send(value.clone());
    }
}
