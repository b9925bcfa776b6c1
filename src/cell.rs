use std::sync::{Mutex, MutexGuard};

/// Mutual-exclusion container giving exclusive access to a value across
/// concurrent callers.
///
/// Every instrument in this crate keeps its mutable state behind exactly one
/// cell, and no cell is ever held while caller-supplied code runs, so no
/// deadlock is possible.
#[derive(Debug, Default)]
pub struct ConcurrentCell<T> {
  value: Mutex<T>,
}

impl<T> ConcurrentCell<T> {
  /// Clone of the contained value.
  #[must_use]
  pub fn get(&self) -> T
  where
    T: Clone,
  {
    self.lock().clone()
  }

  #[must_use]
  pub fn new(value: T) -> Self {
    Self {
      value: Mutex::new(value),
    }
  }

  /// Swap the contained value, returning the previous one.
  pub fn replace(&self, value: T) -> T {
    std::mem::replace(&mut *self.lock(), value)
  }

  /// Run `f` with exclusive access to the contained value.
  pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    let mut guard = self.lock();
    f(&mut guard)
  }

  fn lock(&self) -> MutexGuard<'_, T> {
    match self.value.lock() {
      Ok(guard) => guard,
      Err(err) => err.into_inner(),
    }
  }
}
