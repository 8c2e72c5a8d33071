//! XNL frame encoding and decoding.
//!
//! On the wire a frame is a 16-bit length (everything after the length
//! field) followed by a 12-byte header and the payload:
//!
//! ```text
//! length u16 | opcode u16 | protocol u8 | flags u8 | dst u16 | src u16
//!            | txid u16   | payload_len u16 | payload ...
//! ```
//!
//! `flags` doubles as the per-session message id on `DataMessage` frames.

use thiserror::Error;

use crate::codec::{CodecError, Reader};
use crate::xnl::{PROTO_XCMP, PROTO_XNL, XnlOpcode};

/// Header bytes following the length field.
pub const HEADER_LEN: usize = 12;

/// Largest payload that still fits the 16-bit length field.
pub const MAX_PAYLOAD: usize = u16::MAX as usize - HEADER_LEN;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
	#[error("frame length {length} shorter than header plus payload length {payload_len}")]
	LengthMismatch { length: u16, payload_len: u16 },

	#[error("unknown XNL opcode {0:#06x}")]
	UnknownOpcode(u16),

	#[error("payload of {0} bytes exceeds the frame length field")]
	Oversize(usize),

	/// Record data that decodes but violates the layout's semantics.
	#[error("invalid record: {0}")]
	Record(String),

	#[error(transparent)]
	Codec(#[from] CodecError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	pub opcode: XnlOpcode,
	pub protocol: u8,
	pub flags: u8,
	pub dst: u16,
	pub src: u16,
	pub txid: u16,
	pub payload: Vec<u8>,
}

impl Frame {
	/// A raw XNL control frame with zeroed flags and transaction id.
	pub fn control(opcode: XnlOpcode, dst: u16, src: u16, payload: Vec<u8>) -> Self {
		Self {
			opcode,
			protocol: PROTO_XNL,
			flags: 0,
			dst,
			src,
			txid: 0,
			payload,
		}
	}

	/// An XCMP-encapsulating data message.
	pub fn data_message(dst: u16, src: u16, flags: u8, txid: u16, payload: Vec<u8>) -> Self {
		Self {
			opcode: XnlOpcode::DataMessage,
			protocol: PROTO_XCMP,
			flags,
			dst,
			src,
			txid,
			payload,
		}
	}

	pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
		if self.payload.len() > MAX_PAYLOAD {
			return Err(FrameError::Oversize(self.payload.len()));
		}
		let length = (HEADER_LEN + self.payload.len()) as u16;

		let mut out = Vec::with_capacity(2 + length as usize);
		out.extend_from_slice(&length.to_be_bytes());
		out.extend_from_slice(&u16::from(self.opcode).to_be_bytes());
		out.push(self.protocol);
		out.push(self.flags);
		out.extend_from_slice(&self.dst.to_be_bytes());
		out.extend_from_slice(&self.src.to_be_bytes());
		out.extend_from_slice(&self.txid.to_be_bytes());
		out.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
		out.extend_from_slice(&self.payload);
		Ok(out)
	}

	/// Decodes a whole frame, length field included.
	pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
		let mut r = Reader::new(buf);
		let length = r.u16().map_err(FrameError::Codec)?;
		Self::decode_body(length, r.rest())
	}

	/// Decodes the body of a frame whose length field has already been
	/// consumed (the session reads length and body separately).
	pub fn decode_body(length: u16, body: &[u8]) -> Result<Self, FrameError> {
		let mut r = Reader::new(body);
		let raw_opcode = r.u16()?;
		let opcode = XnlOpcode::try_from(raw_opcode)
			.map_err(|_| FrameError::UnknownOpcode(raw_opcode))?;
		let protocol = r.u8()?;
		let flags = r.u8()?;
		let dst = r.u16()?;
		let src = r.u16()?;
		let txid = r.u16()?;
		let payload_len = r.u16()?;

		if usize::from(length) < HEADER_LEN + usize::from(payload_len) {
			return Err(FrameError::LengthMismatch {
				length,
				payload_len,
			});
		}
		let payload = r.take(usize::from(payload_len))?.to_vec();

		Ok(Self {
			opcode,
			protocol,
			flags,
			dst,
			src,
			txid,
			payload,
		})
	}

	#[cfg(feature = "frame-trace")]
	pub(crate) fn trace(&self, direction: &str) {
		trace!(
			"{direction} {:?} proto={:#04x} flags={:#04x} dst={:#06x} src={:#06x} txid={:#06x} payload={:02x?}",
			self.opcode, self.protocol, self.flags, self.dst, self.src, self.txid, self.payload
		);
	}

	#[cfg(not(feature = "frame-trace"))]
	pub(crate) fn trace(&self, _direction: &str) {}
}
