//! Handle lifetime state.
//!
//! Every wrapper in this crate carries a [`HandleState`]: a single
//! atomic disposed flag consulted before each engine call and flipped
//! exactly once when the handle is released. Release happens on two
//! paths with different duties:
//!
//! - **explicit close**: releases companion handles the wrapper manages
//!   and then the underlying engine resource;
//! - **drop**: releases only the underlying engine resource and never
//!   reaches into other managed handles, whose own drops run
//!   independently.
//!
//! Both paths funnel through [`HandleState::begin_dispose`], so a
//! resource can never be released twice no matter how close and drop
//! interleave.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Disposal flag shared by the close and drop paths of a handle.
#[derive(Debug, Default)]
pub(crate) struct HandleState {
    disposed: AtomicBool,
}

impl HandleState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails fast with [`Error::HandleDisposed`] once the handle has
    /// been released.
    pub(crate) fn check(&self, resource: &'static str) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::disposed(resource));
        }
        Ok(())
    }

    /// Claims the release. Returns true for exactly one caller; every
    /// later claim sees false and must not touch the resource.
    pub(crate) fn begin_dispose(&self) -> bool {
        !self.disposed.swap(true, Ordering::SeqCst)
    }

    /// True once the handle has been released.
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}
