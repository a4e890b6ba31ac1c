//! RAII ownership of native resources.
//!
//! A [`ResourceHandle`] pairs a native handle with the subsystem call that
//! releases it. The release runs exactly once: either explicitly through
//! [`ResourceHandle::release`], which reports failure, or from `Drop`, which
//! logs it. [`ResourceHandle::disarm`] hands the value back without releasing
//! it, for resources whose lifetime ends inside another subsystem call (an
//! update consumed by submit, a packet consumed by the decoder).
//!
//! Components keep their handles in fields or locals declared in acquisition
//! order, so Rust's drop order yields reverse-acquisition release.

use std::fmt;

type Release<'a, T, E> = Box<dyn FnOnce(T) -> Result<(), E> + 'a>;

pub struct ResourceHandle<'a, T, E: fmt::Display> {
    label: &'static str,
    inner: Option<(T, Release<'a, T, E>)>,
}

impl<'a, T, E: fmt::Display> ResourceHandle<'a, T, E> {
    pub fn new(
        label: &'static str,
        value: T,
        release: impl FnOnce(T) -> Result<(), E> + 'a,
    ) -> Self {
        log::debug!("Acquired {}", label);
        Self {
            label,
            inner: Some((value, Box::new(release))),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn get(&self) -> &T {
        match &self.inner {
            Some((value, _)) => value,
            None => unreachable!("{} used after release", self.label),
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        match &mut self.inner {
            Some((value, _)) => value,
            None => unreachable!("{} used after release", self.label),
        }
    }

    /// Release now and report the outcome.
    pub fn release(mut self) -> Result<(), E> {
        self.release_inner()
    }

    /// Give up ownership without releasing.
    pub fn disarm(mut self) -> T {
        match self.inner.take() {
            Some((value, _)) => value,
            None => unreachable!("{} used after release", self.label),
        }
    }

    fn release_inner(&mut self) -> Result<(), E> {
        match self.inner.take() {
            Some((value, release)) => {
                log::debug!("Releasing {}", self.label);
                release(value)
            }
            None => Ok(()),
        }
    }
}

impl<T, E: fmt::Display> Drop for ResourceHandle<'_, T, E> {
    fn drop(&mut self) {
        let label = self.label;
        crate::log_and_continue!(self.release_inner(), format!("release {}", label));
    }
}

impl<T: fmt::Debug, E: fmt::Display> fmt::Debug for ResourceHandle<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ResourceHandle");
        s.field("label", &self.label);
        match &self.inner {
            Some((value, _)) => s.field("value", value),
            None => s.field("value", &"<released>"),
        };
        s.finish()
    }
}
