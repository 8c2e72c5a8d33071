//! One authenticated XNL session over one TCP connection.
//!
//! A session is single-use: it is driven to `Ready` by [`XnlSession::connect`],
//! carries exactly one logical operation, and is closed. The radio's state
//! machine does not tolerate retries or address reuse, so nothing here
//! retransmits; every failure abandons the session.
//!
//! Two counters carry the per-session discipline. The `flags` byte of every
//! outgoing `DataMessage` must increment by one (mod 256); the radio
//! silently discards a repeated value as a TCP retransmission, after which
//! every later command times out. It starts at 0x01 and is bumped before
//! use, so the first data message carries 0x02. Transaction ids compose a
//! fixed prefix, `(xnl_addr + 1) & 0xFF`, with a sequence byte bumped per
//! request; replies echo the request's txid verbatim.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use crate::codec::Reader;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::tea::TeaKey;
use crate::xnl::frame::Frame;
use crate::xnl::{
	ADDR_NONE, AUTH_VERIFY_MISMATCH, AUTH_WRONG_DEVICE, CONNECTION_SUCCESS, DeviceType, XnlOpcode,
};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum HandshakeState {
	WaitMaster,
	WaitSeed,
	WaitAuthKey,
	WaitConnection,
}

pub struct XnlSession {
	stream: TcpStream,
	frame_timeout: Duration,
	master_addr: u16,
	xnl_addr: u16,
	session_prefix: u16,
	msg_id: u8,
	txid_prefix: u8,
	txid_seq: u8,
	poisoned: bool,
}

impl XnlSession {
	/// Connects and drives the handshake to `Ready`.
	pub fn connect(config: &SessionConfig) -> Result<Self> {
		let addr = SocketAddr::new(config.addr, config.port);
		let deadline = Instant::now() + config.handshake_timeout;

		info!("connecting to {addr}");
		let stream = TcpStream::connect_timeout(&addr, config.handshake_timeout)
			.map_err(|e| Error::transport("connecting", e))?;
		stream
			.set_nodelay(true)
			.map_err(|e| Error::transport("configuring socket", e))?;
		// The Rust runtime masks SIGPIPE, so a peer close surfaces as EPIPE
		// from write rather than killing the process.

		let mut session = Self {
			stream,
			frame_timeout: config.frame_timeout,
			master_addr: ADDR_NONE,
			xnl_addr: ADDR_NONE,
			session_prefix: 0,
			msg_id: 0x01,
			txid_prefix: 0,
			txid_seq: 0,
			poisoned: false,
		};
		session.handshake(&config.auth_key, deadline)?;
		Ok(session)
	}

	fn handshake(&mut self, key: &TeaKey, deadline: Instant) -> Result<()> {
		// The master query is optional; radios broadcast their status on
		// connect anyway, but the query covers ones that already did.
		self.send_frame(&Frame::control(
			XnlOpcode::DeviceMasterQuery,
			ADDR_NONE,
			ADDR_NONE,
			Vec::new(),
		))?;

		let mut state = HandshakeState::WaitMaster;
		let mut seed_response = [0u8; 8];

		loop {
			let remaining = deadline
				.checked_duration_since(Instant::now())
				.ok_or(Error::Timeout {
					phase: "XNL handshake",
				})?;
			let frame = self.recv_frame(remaining.min(self.frame_timeout))?;

			match (state, frame.opcode) {
				(HandshakeState::WaitMaster, XnlOpcode::MasterStatusBroadcast) => {
					let mut r = Reader::new(&frame.payload);
					let _version = r.u16()?;
					let raw_type = r.u16()?;
					match DeviceType::try_from(raw_type) {
						Ok(DeviceType::Subscriber) => {}
						_ => {
							error!("peer is not a subscriber radio (device type {raw_type:#06x})");
							return Err(Error::AuthFailed {
								code: AUTH_WRONG_DEVICE,
							});
						}
					}
					self.master_addr = frame.src;
					debug!("master at {:#06x}", self.master_addr);
					state = HandshakeState::WaitSeed;
				}
				(HandshakeState::WaitSeed, XnlOpcode::DeviceAuthKey) => {
					let mut r = Reader::new(&frame.payload);
					self.session_prefix = r.u16()?;
					let mut seed = [0u8; 8];
					seed.copy_from_slice(r.take(8)?);
					seed_response = key.encrypt_block(seed);

					self.send_frame(&Frame::control(
						XnlOpcode::DeviceAuthKeyRequest,
						self.master_addr,
						ADDR_NONE,
						Vec::new(),
					))?;
					state = HandshakeState::WaitAuthKey;
				}
				(HandshakeState::WaitAuthKey, XnlOpcode::DeviceAuthKey) => {
					let mut r = Reader::new(&frame.payload);
					let temp_addr = r.u16()?;
					let addr_hint = r.u16()?;
					let verify_token = r.take(8)?;

					if verify_token != &seed_response[..] {
						error!("verify token mismatch; wrong authentication key material");
						return Err(Error::AuthFailed {
							code: AUTH_VERIFY_MISMATCH,
						});
					}

					let mut payload = Vec::with_capacity(11);
					payload.push(0x00); // auth index
					payload.extend_from_slice(&seed_response);
					payload.extend_from_slice(&addr_hint.to_be_bytes());
					self.send_frame(&Frame::control(
						XnlOpcode::DeviceConnectionRequest,
						self.master_addr,
						temp_addr,
						payload,
					))?;
					state = HandshakeState::WaitConnection;
				}
				(HandshakeState::WaitConnection, XnlOpcode::DeviceConnectionReply) => {
					let mut r = Reader::new(&frame.payload);
					let result = r.u8()?;
					if result != CONNECTION_SUCCESS {
						error!("connection refused (result {result:#04x})");
						return Err(Error::AuthFailed { code: result });
					}
					self.xnl_addr = r.u16()?;
					let prefix_echo = r.u16()?;
					if prefix_echo != self.session_prefix {
						warn!(
							"session prefix echo {prefix_echo:#06x} differs from broadcast {:#06x}",
							self.session_prefix
						);
					}
					self.txid_prefix = (self.xnl_addr.wrapping_add(1) & 0xFF) as u8;
					info!(
						"authenticated; address {:#06x}, txid prefix {:#04x}",
						self.xnl_addr, self.txid_prefix
					);
					return Ok(());
				}
				(_, XnlOpcode::MasterStatusBroadcast) => {
					// radios rebroadcast their status; not a state change
					debug!("duplicate master status broadcast");
				}
				(_, opcode) => {
					debug!("ignoring {opcode:?} during handshake (state {state:?})");
				}
			}
		}
	}

	/// Permanent address assigned in the connection reply.
	pub fn xnl_addr(&self) -> u16 {
		self.xnl_addr
	}

	/// Address the radio announced in its master status broadcast.
	pub fn master_addr(&self) -> u16 {
		self.master_addr
	}

	/// Session prefix carried through the handshake.
	pub fn session_prefix(&self) -> u16 {
		self.session_prefix
	}

	/// Wraps an XCMP payload in a `DataMessage` and sends it, returning the
	/// transaction id the reply will echo.
	pub fn send_xcmp(&mut self, payload: Vec<u8>) -> Result<u16> {
		self.msg_id = self.msg_id.wrapping_add(1);
		self.txid_seq = self.txid_seq.wrapping_add(1);
		let txid = u16::from_be_bytes([self.txid_prefix, self.txid_seq]);

		let frame = Frame::data_message(self.master_addr, self.xnl_addr, self.msg_id, txid, payload);
		self.send_frame(&frame)?;
		Ok(txid)
	}

	/// Reads one whole length-prefixed frame, blocking up to `timeout`.
	pub fn recv_frame(&mut self, timeout: Duration) -> Result<Frame> {
		self.stream
			.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))
			.map_err(|e| Error::transport("configuring socket", e))?;

		let mut len_buf = [0u8; 2];
		self.read_exact(&mut len_buf)?;
		let length = u16::from_be_bytes(len_buf);

		let mut body = vec![0u8; usize::from(length)];
		self.read_exact(&mut body)?;

		let frame = Frame::decode_body(length, &body)?;
		frame.trace("<-");
		Ok(frame)
	}

	fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
		match self.stream.read_exact(buf) {
			Ok(()) => Ok(()),
			Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
				Err(Error::Timeout { phase: "XNL frame" })
			}
			Err(e) => {
				self.poisoned = true;
				Err(Error::transport("receiving frame", e))
			}
		}
	}

	fn send_frame(&mut self, frame: &Frame) -> Result<()> {
		// The host must never acknowledge data messages; the radio relies
		// on TCP and treats our acks as protocol violations.
		debug_assert!(frame.opcode != XnlOpcode::DataMessageAck);

		if self.poisoned {
			return Err(Error::transport(
				"sending frame",
				io::Error::new(io::ErrorKind::BrokenPipe, "session already failed"),
			));
		}

		frame.trace("->");
		let bytes = frame.encode()?;
		self.stream.write_all(&bytes).map_err(|e| {
			self.poisoned = true;
			Error::transport("sending frame", e)
		})
	}

	/// Shuts the connection down. Dropping the session closes it as well;
	/// this exists for the explicit-FIN path after a cancelled operation.
	pub fn close(&mut self) {
		let _ = self.stream.shutdown(Shutdown::Both);
		self.poisoned = true;
	}
}

impl Drop for XnlSession {
	fn drop(&mut self) {
		let _ = self.stream.shutdown(Shutdown::Both);
	}
}
