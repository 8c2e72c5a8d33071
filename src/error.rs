//! The failure taxonomy shared by every layer of the stack.
//!
//! The radio's state machine is fragile, so no layer below the public
//! operations retries on its own; errors carry enough context for the caller
//! to decide whether opening a fresh session is worth it.

use std::io;

use thiserror::Error;

use crate::codeplug::compare::ComparisonResult;
use crate::codeplug::validate::ValidationResult;
use crate::xnl::frame::FrameError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// TCP connect/read/write failure, peer close or broken pipe. The
	/// session that produced this is unusable.
	#[error("transport failure while {context}: {source}")]
	Transport {
		context: &'static str,
		#[source]
		source: io::Error,
	},

	/// Malformed XNL frame or record data.
	#[error("framing: {0}")]
	Framing(#[from] FrameError),

	/// Non-success connection reply, or the verify token did not match our
	/// encryption of the authentication seed (wrong key material).
	#[error("XNL authentication failed (code {code:#04x})")]
	AuthFailed { code: u8 },

	/// The radio refused the security unlock: `0x01` wrong algorithm or key,
	/// `0x06` locked out.
	#[error("programming locked (code {code:#04x})")]
	ProgrammingLocked { code: u8 },

	/// A frame or operation deadline expired. The session is abandoned.
	#[error("timed out waiting for {phase}")]
	Timeout { phase: &'static str },

	/// An XCMP reply carried a non-zero result code.
	#[error("device reported error {code:#04x} for opcode {opcode:#06x}")]
	Device { opcode: u16, code: u8 },

	/// Pre-write validation produced at least one error.
	#[error("codeplug validation failed with {} error(s)", .0.errors.len())]
	Validation(ValidationResult),

	/// Post-write read-back did not match. The write is already committed;
	/// this is surfaced as a warning, never as a failed write.
	#[error("post-write verification found {} discrepancy(ies)", .0.discrepancies.len())]
	VerificationMismatch(ComparisonResult),

	#[error("operation cancelled")]
	Cancelled,
}

impl Error {
	pub(crate) fn transport(context: &'static str, source: io::Error) -> Self {
		Self::Transport { context, source }
	}

	/// Whether the peer went away mid-session (EPIPE, ECONNRESET, EOF).
	pub fn is_disconnect(&self) -> bool {
		match self {
			Self::Transport { source, .. } => matches!(
				source.kind(),
				io::ErrorKind::BrokenPipe
					| io::ErrorKind::ConnectionReset
					| io::ErrorKind::ConnectionAborted
					| io::ErrorKind::UnexpectedEof
			),
			_ => false,
		}
	}
}

impl From<crate::codec::CodecError> for Error {
	fn from(err: crate::codec::CodecError) -> Self {
		Self::Framing(FrameError::Codec(err))
	}
}
