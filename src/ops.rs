//! The public operations: identify, read, write, validate, compare.
//!
//! Every radio-facing operation opens its own TCP session and closes it
//! when done, matching the radio's expectation of single-use sessions. A
//! write with verification therefore touches the radio twice: once to
//! write, once to read everything back for comparison.

use std::time::{Duration, Instant};

use crate::clone;
use crate::codeplug::compare::ComparisonResult;
use crate::codeplug::layout;
use crate::codeplug::model::{DeviceInfo, ParsedCodeplug};
use crate::codeplug::validate::ValidationResult;
use crate::codeplug::{compare as comparison, validate as validation};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::progress::{CancelToken, Progress, ProgressFn};
use crate::programming::Programmer;

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
	/// Read the codeplug back after deploying and compare it against what
	/// was written. Discrepancies are reported, not raised: the write is
	/// already committed when verification runs.
	pub verify: bool,
}

#[derive(Debug, Clone)]
pub struct WriteReport {
	pub blocks_written: usize,
	pub duration: Duration,
	/// Comparison outcome when verification was requested.
	pub verification: Option<ComparisonResult>,
}

impl WriteReport {
	/// The non-fatal verification warning, if the read-back differed.
	pub fn verification_failure(&self) -> Option<Error> {
		match &self.verification {
			Some(result) if !result.passed() => {
				Some(Error::VerificationMismatch(result.clone()))
			}
			_ => None,
		}
	}
}

/// Opens a session, authenticates, queries the device identity and closes.
/// Does not enter program mode.
pub fn identify(config: &SessionConfig) -> Result<DeviceInfo> {
	let mut programmer = Programmer::connect(config)?;
	match programmer.read_device_info() {
		Ok(info) => {
			programmer.finish()?;
			Ok(info)
		}
		Err(err) => {
			programmer.abort();
			Err(err)
		}
	}
}

/// Reads the complete codeplug. The progress callback is invoked from the
/// session's task with `(fraction, label)` pairs.
pub fn read_codeplug<'a>(
	config: &SessionConfig,
	progress_cb: Option<&'a mut ProgressFn<'a>>,
	cancel: &CancelToken,
) -> Result<ParsedCodeplug> {
	let mut progress = Progress::new(progress_cb);
	let mut programmer = Programmer::connect(config)?;

	match read_with(&mut programmer, config, &mut progress, cancel) {
		Ok(codeplug) => {
			programmer.finish()?;
			Ok(codeplug)
		}
		Err(err) => {
			// exit program mode best-effort; the radio stays elevated
			// until power-cycle otherwise
			programmer.abort();
			Err(err)
		}
	}
}

fn read_with(
	programmer: &mut Programmer,
	config: &SessionConfig,
	progress: &mut Progress<'_>,
	cancel: &CancelToken,
) -> Result<ParsedCodeplug> {
	let device = programmer.read_device_info()?;
	let descriptor = layout::descriptor_for(&device.model_number);
	programmer.unlock_for_clone(&config.auth_key)?;

	let mut codeplug =
		clone::read_codeplug_records(programmer, descriptor, config, progress, cancel)?;
	codeplug.device = device;
	Ok(codeplug)
}

/// Validates and writes a codeplug, optionally verifying by read-back in a
/// second session. Validation errors abort before anything touches the
/// radio.
pub fn write_codeplug<'a>(
	config: &SessionConfig,
	codeplug: &ParsedCodeplug,
	options: &WriteOptions,
	progress_cb: Option<&'a mut ProgressFn<'a>>,
	cancel: &CancelToken,
) -> Result<WriteReport> {
	let validation = validation::validate(codeplug);
	if !validation.passed() {
		return Err(Error::Validation(validation));
	}

	let started = Instant::now();
	let mut progress = Progress::new(progress_cb);
	let mut programmer = Programmer::connect(config)?;

	let blocks_written = match write_with(&mut programmer, config, codeplug, &mut progress, cancel)
	{
		Ok(written) => {
			programmer.finish()?;
			written
		}
		Err(err) => {
			programmer.abort();
			return Err(err);
		}
	};

	// verification runs in a fresh session of its own, the way CPS performs
	// a second read after every write
	let verification = if options.verify {
		let read_back = read_codeplug(config, None, cancel)?;
		let result = comparison::compare(codeplug, &read_back);
		if result.passed() {
			info!("verification passed");
		} else {
			warn!(
				"verification found {} discrepancy(ies)",
				result.discrepancies.len()
			);
		}
		Some(result)
	} else {
		None
	};

	Ok(WriteReport {
		blocks_written,
		duration: started.elapsed(),
		verification,
	})
}

fn write_with(
	programmer: &mut Programmer,
	config: &SessionConfig,
	codeplug: &ParsedCodeplug,
	progress: &mut Progress<'_>,
	cancel: &CancelToken,
) -> Result<usize> {
	let device = programmer.read_device_info()?;
	let descriptor = layout::descriptor_for(&device.model_number);
	programmer.unlock_for_clone(&config.auth_key)?;

	clone::write_codeplug_records(programmer, descriptor, config, codeplug, progress, cancel)
}

/// Pre-write semantic validation; pure, touches no radio.
pub fn validate(codeplug: &ParsedCodeplug) -> ValidationResult {
	validation::validate(codeplug)
}

/// Compares two parsed codeplugs; pure, touches no radio.
pub fn compare(expected: &ParsedCodeplug, actual: &ParsedCodeplug) -> ComparisonResult {
	comparison::compare(expected, actual)
}
