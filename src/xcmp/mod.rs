//! XCMP application layer: opcode-based request/reply/broadcast dispatch.
//!
//! XCMP messages travel as XNL `DataMessage` payloads. A request opcode
//! turns into its reply by setting the high bit (`| 0x8000`) and into the
//! matching broadcast with `| 0xB000`. The first body byte of every reply
//! is a result code; zero means success.

pub mod dispatch;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use smallvec::SmallVec;

pub use self::dispatch::XcmpLink;

use crate::codec::Reader;
use crate::xnl::frame::FrameError;

/// Request opcodes (subscriber CPS mode).
pub mod opcode {
	pub const RADIO_STATUS: u16 = 0x000E;
	pub const VERSION_INFO: u16 = 0x000F;
	pub const MODEL_NUMBER: u16 = 0x0010;
	pub const SERIAL_NUMBER: u16 = 0x0011;
	pub const SECURITY_KEY: u16 = 0x0012;
	pub const TANAPA_NUMBER: u16 = 0x001F;
	pub const LANGUAGE_PACK_INFO: u16 = 0x002C;
	pub const CAPABILITIES: u16 = 0x003D;
	pub const PROGRAM_MODE: u16 = 0x0106;
	pub const UNLOCK_PARTITION: u16 = 0x0108;
	pub const CLONE_WRITE: u16 = 0x0109;
	pub const CLONE_READ: u16 = 0x010A;
	pub const PSDT_ACCESS: u16 = 0x010B;
	pub const COMPONENT_SESSION: u16 = 0x010F;
	pub const READ_RADIO_KEY: u16 = 0x0300;
	pub const UNLOCK_SECURITY: u16 = 0x0301;
	pub const DEVICE_INIT_STATUS: u16 = 0x0400;
}

pub const REPLY_FLAG: u16 = 0x8000;
pub const BROADCAST_FLAG: u16 = 0xB000;

pub fn reply_of(request: u16) -> u16 {
	request | REPLY_FLAG
}

pub fn broadcast_of(request: u16) -> u16 {
	request | BROADCAST_FLAG
}

pub fn is_reply(opcode: u16) -> bool {
	opcode & BROADCAST_FLAG == REPLY_FLAG
}

pub fn is_broadcast(opcode: u16) -> bool {
	opcode & BROADCAST_FLAG == BROADCAST_FLAG
}

/// Strips the reply/broadcast bits back to the request opcode.
pub fn request_of(opcode: u16) -> u16 {
	opcode & !BROADCAST_FLAG
}

/// Result codes carried in the first byte of every reply body.
#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u8)]
pub enum XcmpResult {
	Success = 0x00,
	Failure = 0x01,
	IncorrectMode = 0x02,
	/// The radio wants a full XNL reconnect before it will talk again.
	ReinitXnl = 0x03,
	InvalidParameter = 0x04,
	NotSupported = 0x05,
	SecurityLocked = 0x06,
}

/// Init-status codes of the `0xB400` device-init broadcast. The radio walks
/// through [`StatusUpdate`](InitStatus::StatusUpdate) and
/// [`DeviceReady`](InitStatus::DeviceReady) before announcing
/// [`Complete`](InitStatus::Complete); other attribute families exist but
/// their meaning is unverified and they are ignored.
#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u8)]
pub enum InitStatus {
	Complete = 0x01,
	StatusUpdate = 0x02,
	DeviceReady = 0x0F,
}

/// Entity identifiers in the device-init broadcast.
pub const ENTITY_RADIO: u8 = 0x00;
pub const ENTITY_HOST: u8 = 0x0A;

/// One XCMP message: a 16-bit opcode and its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcmpMessage {
	pub opcode: u16,
	pub body: SmallVec<[u8; 24]>,
}

impl XcmpMessage {
	pub fn new(opcode: u16, body: impl Into<SmallVec<[u8; 24]>>) -> Self {
		Self {
			opcode,
			body: body.into(),
		}
	}

	pub fn request(opcode: u16) -> Self {
		Self::new(opcode, SmallVec::new())
	}

	/// A request with a single sub-type/selector byte, the common shape of
	/// the identity queries.
	pub fn request_with(opcode: u16, selector: u8) -> Self {
		let mut body = SmallVec::new();
		body.push(selector);
		Self { opcode, body }
	}

	pub fn encode(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(2 + self.body.len());
		out.extend_from_slice(&self.opcode.to_be_bytes());
		out.extend_from_slice(&self.body);
		out
	}

	pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
		let mut r = Reader::new(payload);
		let opcode = r.u16()?;
		Ok(Self {
			opcode,
			body: SmallVec::from_slice(r.rest()),
		})
	}

	pub fn is_reply(&self) -> bool {
		is_reply(self.opcode)
	}

	pub fn is_broadcast(&self) -> bool {
		is_broadcast(self.opcode)
	}

	/// The result byte of a reply body.
	pub fn result_code(&self) -> Option<u8> {
		self.body.first().copied()
	}
}
