//! Typed object pool with guaranteed release.
//!
//! [`Pool::acquire`] hands out a [`Pooled`] guard with exclusive ownership of
//! one item. Dropping the guard recycles the item and puts it back on the
//! freelist, including when the owning future is cancelled or unwinds.
//! The freelist grows on demand and keeps at most `max_idle` items.
use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::{Mutex, PoisonError},
};

/// Clears per-use state before an item goes back to the pool.
pub trait Recycle {
    fn recycle(&mut self);
}

pub struct Pool<T> {
    idle: Mutex<Vec<Box<T>>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    max_idle: usize,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle_count())
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

impl<T: Recycle> Pool<T> {
    pub fn new(max_idle: usize, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            factory: Box::new(factory),
            max_idle,
        }
    }

    /// Take an idle item, or build a fresh one when the freelist is empty.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let item = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| Box::new((self.factory)()));
        Pooled {
            pool: self,
            item: Some(item),
        }
    }

    fn release(&self, mut item: Box<T>) {
        item.recycle();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }
}

impl<T> Pool<T> {
    pub fn idle_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive handle on a pooled item.
pub struct Pooled<'p, T: Recycle> {
    pool: &'p Pool<T>,
    item: Option<Box<T>>,
}

impl<T: Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `drop` takes the item out.
        self.item.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_deref_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}
