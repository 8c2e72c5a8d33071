//! Request/reply dispatch and the device-init gate.
//!
//! After the XNL handshake the radio walks through a sequence of `0xB400`
//! device-init broadcasts. The host answers the first one with a minimal
//! capability announcement and must then stay silent until the broadcast
//! with init status 0x01 (complete) arrives; a request sent earlier is
//! dropped by the radio and every later exchange times out. [`XcmpLink`]
//! enforces that gate: a request issued too early is held back and the link
//! finishes the init sequence first.
//!
//! Requests run strictly one at a time; the radio does not guarantee
//! pipelining. Replies are matched by transaction id, broadcasts are routed
//! out of band, and `DataMessageAck` frames from the radio are ignored.

use std::time::{Duration, Instant};

use crate::codec::{CodecError, Reader};
use crate::config::DEVICE_INIT_TIMEOUT;
use crate::error::{Error, Result};
use crate::xcmp::{
	ENTITY_HOST, InitStatus, XcmpMessage, broadcast_of, opcode, request_of,
};
use crate::xnl::{PROTO_XCMP, XnlOpcode, XnlSession};

pub struct XcmpLink {
	session: XnlSession,
	xcmp_timeout: Duration,
	init_complete: bool,
	greeted: bool,
}

impl XcmpLink {
	pub fn new(session: XnlSession, xcmp_timeout: Duration) -> Self {
		Self {
			session,
			xcmp_timeout,
			init_complete: false,
			greeted: false,
		}
	}

	pub fn session(&self) -> &XnlSession {
		&self.session
	}

	/// Pumps frames until the radio announces init completion. Answers the
	/// first init broadcast with the host capability announcement.
	pub fn await_device_init(&mut self, budget: Duration) -> Result<()> {
		if self.init_complete {
			return Ok(());
		}
		let deadline = Instant::now() + budget;

		while !self.init_complete {
			let remaining = deadline
				.checked_duration_since(Instant::now())
				.ok_or(Error::Timeout {
					phase: "device init",
				})?;
			let frame = self.session.recv_frame(remaining)?;

			match frame.opcode {
				XnlOpcode::DataMessage if frame.protocol == PROTO_XCMP => {
					let msg = XcmpMessage::decode(&frame.payload)?;
					if msg.is_broadcast() {
						self.handle_broadcast(&msg)?;
					} else {
						debug!("ignoring {:#06x} during device init", msg.opcode);
					}
				}
				XnlOpcode::DataMessageAck => {}
				other => debug!("ignoring {other:?} during device init"),
			}
		}

		info!("device init complete");
		Ok(())
	}

	/// Sends one request and blocks for its reply, matched by transaction
	/// id. A request issued before init completion first drives
	/// [`await_device_init`](Self::await_device_init); it is never put on
	/// the wire early.
	pub fn request(&mut self, msg: XcmpMessage) -> Result<XcmpMessage> {
		debug_assert!(!msg.is_reply() && !msg.is_broadcast());
		if !self.init_complete {
			debug!("request {:#06x} queued until device init completes", msg.opcode);
			self.await_device_init(DEVICE_INIT_TIMEOUT)?;
		}

		let request_opcode = msg.opcode;
		let txid = self.session.send_xcmp(msg.encode())?;
		let deadline = Instant::now() + self.xcmp_timeout;

		loop {
			let remaining = deadline
				.checked_duration_since(Instant::now())
				.ok_or(Error::Timeout {
					phase: "XCMP reply",
				})?;
			let frame = self.session.recv_frame(remaining)?;

			match frame.opcode {
				XnlOpcode::DataMessage if frame.protocol == PROTO_XCMP => {
					let reply = XcmpMessage::decode(&frame.payload)?;
					if reply.is_broadcast() {
						// broadcasts never consume the waiting request's slot
						self.handle_broadcast(&reply)?;
					} else if reply.is_reply() {
						if frame.txid != txid {
							warn!(
								"stale reply {:#06x} (txid {:#06x}, waiting for {txid:#06x})",
								reply.opcode, frame.txid
							);
						} else {
							if request_of(reply.opcode) != request_opcode {
								warn!(
									"reply opcode {:#06x} does not match request {request_opcode:#06x}",
									reply.opcode
								);
							}
							return Ok(reply);
						}
					} else {
						debug!("unexpected request-direction message {:#06x}", reply.opcode);
					}
				}
				XnlOpcode::DataMessageAck => {}
				other => debug!("ignoring {other:?} while waiting for a reply"),
			}
		}
	}

	/// [`request`](Self::request), then checks the reply's result byte and
	/// returns the body after it.
	pub fn request_ok(&mut self, msg: XcmpMessage) -> Result<Vec<u8>> {
		let request_opcode = msg.opcode;
		let reply = self.request(msg)?;
		match reply.result_code() {
			Some(0x00) => Ok(reply.body[1..].to_vec()),
			Some(code) => Err(Error::Device {
				opcode: request_opcode,
				code,
			}),
			None => Err(Error::from(CodecError::DecodeTruncated {
				bit_offset: 0,
				bit_len: 8,
			})),
		}
	}

	fn handle_broadcast(&mut self, msg: &XcmpMessage) -> Result<()> {
		if msg.opcode != broadcast_of(opcode::DEVICE_INIT_STATUS) {
			debug!("unsolicited broadcast {:#06x}", msg.opcode);
			return Ok(());
		}

		let mut r = Reader::new(&msg.body);
		let major = r.u8()?;
		let minor = r.u8()?;
		let entity = r.u8()?;
		let raw_status = r.u8()?;

		if !self.greeted {
			// first broadcast: announce ourselves with minimal capabilities
			self.greeted = true;
			let reply = XcmpMessage::new(
				broadcast_of(opcode::DEVICE_INIT_STATUS),
				[major, minor, ENTITY_HOST, InitStatus::Complete.into(), 0x00].as_slice(),
			);
			self.session.send_xcmp(reply.encode())?;
		}

		match InitStatus::try_from(raw_status) {
			Ok(InitStatus::Complete) => {
				debug!("init status: complete (entity {entity:#04x})");
				self.init_complete = true;
			}
			Ok(status) => debug!("init status: {status:?} (entity {entity:#04x})"),
			// further attribute families exist; meaning unverified
			Err(_) => debug!("init status {raw_status:#04x} ignored (entity {entity:#04x})"),
		}
		Ok(())
	}

	/// Tears the link down (TCP FIN). The session is single-use.
	pub fn close(mut self) {
		// explicit for the cancellation path
		self.session.close();
	}
}
