//! Progress reporting and cancellation plumbing.
//!
//! The core never calls into a UI; callers hand a callback down and receive
//! `(fraction, label)` pairs from inside the session's task. Fractions are
//! clamped monotonic; a reported value never goes backwards within one
//! operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Callback invoked on every block and phase transition.
pub type ProgressFn<'a> = dyn FnMut(f32, &str) + 'a;

/// Wraps the caller's callback and enforces monotonicity.
pub struct Progress<'a> {
	callback: Option<&'a mut ProgressFn<'a>>,
	last: f32,
}

impl<'a> Progress<'a> {
	pub fn new(callback: Option<&'a mut ProgressFn<'a>>) -> Self {
		Self {
			callback,
			last: 0.0,
		}
	}

	/// A progress sink that drops everything, for `identify` and tests.
	pub fn sink() -> Self {
		Self::new(None)
	}

	pub fn report(&mut self, fraction: f32, label: &str) {
		let clamped = fraction.clamp(self.last, 1.0);
		self.last = clamped;
		if let Some(callback) = self.callback.as_mut() {
			callback(clamped, label);
		}
	}

	/// Reports `done`/`total` under a phase label.
	pub fn step(&mut self, done: usize, total: usize, label: &str) {
		let fraction = if total == 0 {
			1.0
		} else {
			done as f32 / total as f32
		};
		self.report(fraction, label);
	}
}

/// Cooperative cancellation handle. Clones share the flag; the session
/// checks it between requests and at phase boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
	cancelled: Arc<AtomicBool>,
}

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Relaxed);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::Relaxed)
	}

	pub fn check(&self) -> Result<()> {
		if self.is_cancelled() {
			Err(Error::Cancelled)
		} else {
			Ok(())
		}
	}
}
