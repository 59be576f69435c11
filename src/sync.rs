#[cfg(feature = "loom")]
pub use loom::sync::atomic::{fence, AtomicBool, AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, Ordering};
#[cfg(not(feature = "loom"))]
pub use std::sync::atomic::{fence, AtomicBool, AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, Ordering};

#[cfg(feature = "loom")]
pub use loom::sync::Arc;
#[cfg(not(feature = "loom"))]
pub use std::sync::Arc;

#[cfg(not(feature = "loom"))]
pub use antidote::{Mutex, MutexGuard};

#[cfg(feature = "loom")]
pub type MutexGuard<'a, T> = loom::sync::MutexGuard<'a, T>;

#[cfg(feature = "loom")]
#[derive(Debug, Default)]
pub struct Mutex<T>(loom::sync::Mutex<T>);

#[cfg(feature = "loom")]
impl<T> Mutex<T> {
    pub fn new(t: T) -> Self {
        Self(loom::sync::Mutex::new(t))
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, ()> {
        self.0.try_lock().map_err(|_| ())
    }
}

/// Back off inside a retry loop.
///
/// Under loom a busy loop never lets the other modelled threads make progress,
/// so it yields to the scheduler instead.
///
/// 在重试循环中退让。
/// 在 loom 下忙等不会让其他被建模的线程前进，因此改为让出调度。
#[inline]
pub fn spin_loop() {
    #[cfg(feature = "loom")]
    loom::thread::yield_now();
    #[cfg(not(feature = "loom"))]
    std::hint::spin_loop();
}
