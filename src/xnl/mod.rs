//! XNL transport layer: framing, authentication handshake, address and
//! message-id discipline.
//!
//! XNL is the session layer the radio exposes on TCP 8002. Every frame
//! carries a 16-bit opcode; `DataMessage` frames additionally encapsulate
//! XCMP when their protocol byte is [`PROTO_XCMP`]. Addresses are 16-bit and
//! session-scoped: the radio (master) announces its own address in the
//! status broadcast, hands the host a temporary address for the connection
//! request and a permanent one in the connection reply.

pub mod frame;
pub mod session;

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub use self::frame::Frame;
pub use self::session::XnlSession;

/// Payload of a raw XNL control frame.
pub const PROTO_XNL: u8 = 0x00;
/// Payload is an encapsulated XCMP message.
pub const PROTO_XCMP: u8 = 0x01;

/// The unassigned address; used as source until the handshake completes and
/// as destination of radio broadcasts.
pub const ADDR_NONE: u16 = 0x0000;

#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u16)]
pub enum XnlOpcode {
	MasterStatusBroadcast = 0x0002,
	DeviceMasterQuery = 0x0003,
	DeviceAuthKeyRequest = 0x0004,
	/// Carries the authentication seed broadcast before the host's key
	/// request and the key reply after it; the session state decides which
	/// payload shape applies.
	DeviceAuthKey = 0x0005,
	DeviceConnectionRequest = 0x0006,
	DeviceConnectionReply = 0x0009,
	DataMessage = 0x000B,
	/// Received from the radio only. The host must never emit this; the
	/// radio relies on TCP for acknowledgement and treats a repeated
	/// message id as a retransmission to discard.
	DataMessageAck = 0x000C,
}

/// Device class advertised in the master status broadcast.
#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u16)]
pub enum DeviceType {
	Master = 0x0001,
	Subscriber = 0x0002,
}

/// Result byte of the connection reply.
pub const CONNECTION_SUCCESS: u8 = 0x01;

/// `AuthFailed` code reported when the radio's verify token does not match
/// our own encryption of the seed (wrong key material), as opposed to a
/// result code the radio itself produced.
pub const AUTH_VERIFY_MISMATCH: u8 = 0xFF;

/// `AuthFailed` code reported when the peer announces a device type other
/// than subscriber (repeater-mode endpoints use a different handshake).
pub const AUTH_WRONG_DEVICE: u8 = 0xFE;
