//! An in-process radio: a TCP listener speaking the subscriber-mode XNL/XCMP
//! dialect from a canned codeplug, with configurable misbehaviors for the
//! regression scenarios.
//!
//! The simulator enforces the radio's quirks the way a real XPR does: a
//! repeated message id silently drops the frame, requests sent before the
//! init-complete broadcast are discarded (and counted), and every host data
//! message is acknowledged with a `DataMessageAck` the host must tolerate.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use trbolink::codeplug::layout::{ModelDescriptor, default_descriptor};
use trbolink::codeplug::model::{Channel, ParsedCodeplug, Zone};
use trbolink::codeplug::parse;
use trbolink::tea::TeaKey;
use trbolink::xcmp::{InitStatus, XcmpMessage, broadcast_of, opcode};
use trbolink::xnl::frame::Frame;
use trbolink::xnl::{PROTO_XCMP, XnlOpcode};

use super::test_key;

pub const SIM_MODEL_NUMBER: &str = "M27JQN9JA1AN";
pub const SIM_MODEL_NAME: &str = "XPR 3500e";
pub const SIM_SERIAL: &str = "037TUV1234";
pub const SIM_FIRMWARE: &str = "R02.21.01.1025";
pub const SIM_TANAPA: &str = "PMUE4468A";
pub const SIM_CODEPLUG_VERSION: u32 = 7;

const AUTH_SEED: [u8; 8] = [0x77, 0xDD, 0x37, 0xCF, 0x7F, 0xC9, 0x2E, 0x98];
const SESSION_PREFIX: u16 = 0x2222;

pub struct SimOptions {
	pub master_addr: u16,
	pub xnl_addr: u16,
	pub device_type: u16,
	/// Refuse the connection request with this result code.
	pub refuse_auth: Option<u8>,
	/// Hold the init-complete broadcast back for a while, the window in
	/// which a buggy host would leak a premature request.
	pub delay_init_complete: bool,
	/// Answer the security unlock with code 0x06.
	pub lock_security: bool,
}

impl Default for SimOptions {
	fn default() -> Self {
		Self {
			master_addr: 0x0006,
			xnl_addr: 0x001A,
			device_type: 0x0002,
			refuse_auth: None,
			delay_init_complete: false,
			lock_security: false,
		}
	}
}

/// Everything the simulator observed, for test assertions.
#[derive(Default, Clone)]
pub struct SimLog {
	/// Every frame the host sent, in order, across all sessions.
	pub host_frames: Vec<Frame>,
	/// XCMP requests the host emitted before init completion was announced.
	pub premature_requests: usize,
	/// Host data messages whose `flags` byte repeated the previous one.
	pub duplicate_msg_ids: usize,
	/// `DataMessageAck` frames received from the host.
	pub acks_from_host: usize,
	/// Program-mode action bytes in the order they arrived.
	pub program_mode_actions: Vec<u8>,
	/// Completed TCP sessions.
	pub sessions: usize,
	/// Whether a staged write was deployed.
	pub deployed: bool,
}

pub struct SimRadio {
	pub port: u16,
	stop: Arc<AtomicBool>,
	handle: Option<JoinHandle<()>>,
	log: Arc<Mutex<SimLog>>,
	codeplug: Arc<Mutex<ParsedCodeplug>>,
}

impl SimRadio {
	pub fn start(opts: SimOptions, codeplug: ParsedCodeplug) -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").expect("bind simulator");
		let port = listener.local_addr().expect("local addr").port();
		listener.set_nonblocking(true).expect("nonblocking listener");

		let stop = Arc::new(AtomicBool::new(false));
		let log = Arc::new(Mutex::new(SimLog::default()));
		let codeplug = Arc::new(Mutex::new(codeplug));

		let handle = {
			let stop = Arc::clone(&stop);
			let log = Arc::clone(&log);
			let codeplug = Arc::clone(&codeplug);
			thread::spawn(move || serve(listener, &opts, &stop, &log, &codeplug))
		};

		Self {
			port,
			stop,
			handle: Some(handle),
			log,
			codeplug,
		}
	}

	pub fn codeplug(&self) -> ParsedCodeplug {
		self.codeplug.lock().expect("codeplug lock").clone()
	}

	/// Stops the listener and returns the observation log.
	pub fn finish(mut self) -> SimLog {
		self.stop.store(true, Ordering::Relaxed);
		if let Some(handle) = self.handle.take() {
			handle.join().expect("simulator thread");
		}
		let log = self.log.lock().expect("log lock").clone();
		log
	}
}

impl Drop for SimRadio {
	fn drop(&mut self) {
		self.stop.store(true, Ordering::Relaxed);
		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
	}
}

fn serve(
	listener: TcpListener,
	opts: &SimOptions,
	stop: &AtomicBool,
	log: &Mutex<SimLog>,
	codeplug: &Mutex<ParsedCodeplug>,
) {
	let deadline = Instant::now() + Duration::from_secs(30);
	while !stop.load(Ordering::Relaxed) && Instant::now() < deadline {
		match listener.accept() {
			Ok((stream, _)) => {
				let _ = Connection::new(stream, opts, log, codeplug).and_then(Connection::run);
				log.lock().expect("log lock").sessions += 1;
			}
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
				thread::sleep(Duration::from_millis(10));
			}
			Err(_) => break,
		}
	}
}

struct Connection<'a> {
	stream: TcpStream,
	opts: &'a SimOptions,
	log: &'a Mutex<SimLog>,
	codeplug: &'a Mutex<ParsedCodeplug>,
	key: TeaKey,
	desc: &'static ModelDescriptor,
	/// The radio's own outgoing message-id counter.
	radio_flags: u8,
	last_host_flags: Option<u8>,
	init_announced: bool,
	/// Records staged by clone writes, promoted on deploy.
	staged: ParsedCodeplug,
}

impl<'a> Connection<'a> {
	fn new(
		stream: TcpStream,
		opts: &'a SimOptions,
		log: &'a Mutex<SimLog>,
		codeplug: &'a Mutex<ParsedCodeplug>,
	) -> io::Result<Self> {
		stream.set_nodelay(true)?;
		stream.set_read_timeout(Some(Duration::from_millis(100)))?;
		let staged = codeplug.lock().expect("codeplug lock").clone();
		Ok(Self {
			stream,
			opts,
			log,
			codeplug,
			key: test_key(),
			desc: default_descriptor(),
			radio_flags: 0,
			last_host_flags: None,
			init_announced: false,
			staged,
		})
	}

	fn run(mut self) -> io::Result<()> {
		self.handshake()?;
		self.device_init()?;
		self.request_loop()
	}

	fn send(&mut self, frame: &Frame) -> io::Result<()> {
		let bytes = frame
			.encode()
			.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
		self.stream.write_all(&bytes)
	}

	/// Reads one frame; `Ok(None)` on a read timeout.
	fn recv(&mut self) -> io::Result<Option<Frame>> {
		let mut len_buf = [0u8; 2];
		match self.stream.read_exact(&mut len_buf) {
			Ok(()) => {}
			Err(e)
				if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
			{
				return Ok(None);
			}
			Err(e) => return Err(e),
		}
		let length = u16::from_be_bytes(len_buf);
		let mut body = vec![0u8; usize::from(length)];
		self.stream.read_exact(&mut body)?;
		let frame = Frame::decode_body(length, &body)
			.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

		let mut log = self.log.lock().expect("log lock");
		log.host_frames.push(frame.clone());
		if frame.opcode == XnlOpcode::DataMessageAck {
			log.acks_from_host += 1;
		}
		if frame.opcode == XnlOpcode::DataMessage {
			if self.last_host_flags == Some(frame.flags) {
				// the radio treats a repeated message id as a
				// retransmission and drops it on the floor
				log.duplicate_msg_ids += 1;
				return Ok(None);
			}
			self.last_host_flags = Some(frame.flags);
			if !self.init_announced {
				let is_request = XcmpMessage::decode(&frame.payload)
					.map(|m| !m.is_broadcast() && !m.is_reply())
					.unwrap_or(false);
				if is_request {
					log.premature_requests += 1;
					return Ok(None);
				}
			}
		}
		Ok(Some(frame))
	}

	/// Blocks for the next frame, bounded by an idle budget.
	fn recv_blocking(&mut self, budget: Duration) -> io::Result<Frame> {
		let deadline = Instant::now() + budget;
		loop {
			if let Some(frame) = self.recv()? {
				return Ok(frame);
			}
			if Instant::now() >= deadline {
				return Err(io::Error::new(io::ErrorKind::TimedOut, "host went quiet"));
			}
		}
	}

	fn master_status(&self) -> Frame {
		let mut payload = vec![0x00, 0x00];
		payload.extend_from_slice(&self.opts.device_type.to_be_bytes());
		payload.extend_from_slice(&[0x01, 0x01, 0x01]);
		Frame::control(
			XnlOpcode::MasterStatusBroadcast,
			0x0000,
			self.opts.master_addr,
			payload,
		)
	}

	fn handshake(&mut self) -> io::Result<()> {
		let status = self.master_status();
		self.send(&status)?;

		let mut seed_payload = SESSION_PREFIX.to_be_bytes().to_vec();
		seed_payload.extend_from_slice(&AUTH_SEED);
		let seed = Frame::control(
			XnlOpcode::DeviceAuthKey,
			0x0000,
			self.opts.master_addr,
			seed_payload,
		);
		self.send(&seed)?;

		let expected = self.key.encrypt_block(AUTH_SEED);
		let temp_addr = self.opts.xnl_addr.wrapping_sub(1);

		loop {
			let frame = self.recv_blocking(Duration::from_secs(5))?;
			match frame.opcode {
				XnlOpcode::DeviceMasterQuery => {
					let status = self.master_status();
					self.send(&status)?;
				}
				XnlOpcode::DeviceAuthKeyRequest => {
					let mut payload = temp_addr.to_be_bytes().to_vec();
					payload.extend_from_slice(&self.opts.xnl_addr.to_be_bytes());
					payload.extend_from_slice(&expected);
					let reply = Frame::control(
						XnlOpcode::DeviceAuthKey,
						0x0000,
						self.opts.master_addr,
						payload,
					);
					self.send(&reply)?;
				}
				XnlOpcode::DeviceConnectionRequest => {
					assert_eq!(frame.src, temp_addr, "connection request source");
					assert_eq!(frame.payload[0], 0x00, "auth index");
					assert_eq!(&frame.payload[1..9], &expected[..], "encrypted seed");

					let result = self.opts.refuse_auth.unwrap_or(0x01);
					let mut payload = vec![result];
					payload.extend_from_slice(&self.opts.xnl_addr.to_be_bytes());
					payload.extend_from_slice(&SESSION_PREFIX.to_be_bytes());
					let reply = Frame::control(
						XnlOpcode::DeviceConnectionReply,
						temp_addr,
						self.opts.master_addr,
						payload,
					);
					self.send(&reply)?;

					if self.opts.refuse_auth.is_some() {
						return Err(io::Error::new(
							io::ErrorKind::ConnectionAborted,
							"auth refused",
						));
					}
					return Ok(());
				}
				_ => {}
			}
		}
	}

	fn init_broadcast(&mut self, status: InitStatus) -> io::Result<()> {
		let msg = XcmpMessage::new(
			broadcast_of(opcode::DEVICE_INIT_STATUS),
			[0x02, 0x00, 0x00, status.into(), 0x00].as_slice(),
		);
		self.radio_flags = self.radio_flags.wrapping_add(1);
		let frame = Frame::data_message(
			self.opts.xnl_addr,
			self.opts.master_addr,
			self.radio_flags,
			0x0000,
			msg.encode(),
		);
		self.send(&frame)
	}

	fn device_init(&mut self) -> io::Result<()> {
		self.init_broadcast(InitStatus::StatusUpdate)?;

		// the host announces itself in reply to the first broadcast
		loop {
			let frame = self.recv_blocking(Duration::from_secs(5))?;
			if frame.opcode == XnlOpcode::DataMessage
				&& frame.protocol == PROTO_XCMP
				&& XcmpMessage::decode(&frame.payload)
					.map(|m| m.opcode == broadcast_of(opcode::DEVICE_INIT_STATUS))
					.unwrap_or(false)
			{
				break;
			}
		}

		self.init_broadcast(InitStatus::DeviceReady)?;

		if self.opts.delay_init_complete {
			// window in which premature requests would arrive
			let deadline = Instant::now() + Duration::from_millis(300);
			while Instant::now() < deadline {
				let _ = self.recv()?;
			}
		}

		self.init_broadcast(InitStatus::Complete)?;
		self.init_announced = true;
		Ok(())
	}

	fn request_loop(&mut self) -> io::Result<()> {
		loop {
			let frame = match self.recv_blocking(Duration::from_secs(3)) {
				Ok(frame) => frame,
				Err(e)
					if matches!(
						e.kind(),
						io::ErrorKind::UnexpectedEof | io::ErrorKind::TimedOut
					) =>
				{
					return Ok(());
				}
				Err(e) => return Err(e),
			};

			if frame.opcode != XnlOpcode::DataMessage || frame.protocol != PROTO_XCMP {
				continue;
			}
			let msg = match XcmpMessage::decode(&frame.payload) {
				Ok(msg) => msg,
				Err(_) => continue,
			};
			if msg.is_broadcast() || msg.is_reply() {
				continue;
			}

			// the radio acknowledges every host data message
			let ack = Frame {
				opcode: XnlOpcode::DataMessageAck,
				protocol: 0x00,
				flags: frame.flags,
				dst: self.opts.xnl_addr,
				src: self.opts.master_addr,
				txid: frame.txid,
				payload: Vec::new(),
			};
			self.send(&ack)?;

			let body = self.answer(&msg);
			let reply = XcmpMessage::new(msg.opcode | 0x8000, body);
			self.radio_flags = self.radio_flags.wrapping_add(1);
			let reply_frame = Frame::data_message(
				self.opts.xnl_addr,
				self.opts.master_addr,
				self.radio_flags,
				frame.txid,
				reply.encode(),
			);
			self.send(&reply_frame)?;
		}
	}

	fn answer(&mut self, msg: &XcmpMessage) -> Vec<u8> {
		match msg.opcode {
			opcode::SECURITY_KEY => {
				let mut body = vec![0x00];
				body.extend_from_slice(&[0xA5; 16]);
				body
			}
			opcode::MODEL_NUMBER => ok_ascii(SIM_MODEL_NUMBER),
			opcode::SERIAL_NUMBER => ok_ascii(SIM_SERIAL),
			opcode::TANAPA_NUMBER => ok_ascii(SIM_TANAPA),
			opcode::CAPABILITIES => vec![0x00, 0x01, 0x02, 0x03],
			opcode::VERSION_INFO => {
				let sub = msg.body.first().copied().unwrap_or(0);
				let value = match sub {
					0x00 => SIM_FIRMWARE,
					0x41 => SIM_MODEL_NAME,
					_ => "",
				};
				let mut body = vec![0x00, sub];
				body.extend_from_slice(value.as_bytes());
				body
			}
			opcode::RADIO_STATUS => {
				let sub = msg.body.first().copied().unwrap_or(0);
				let cp = self.codeplug.lock().expect("codeplug lock");
				let mut body = vec![0x00, sub];
				match sub {
					0x0E => body.extend_from_slice(&cp.radio_id.to_be_bytes()),
					0x0F => {
						for unit in cp.alias.encode_utf16() {
							body.extend_from_slice(&unit.to_le_bytes());
						}
					}
					0x12 => body.extend_from_slice(&SIM_CODEPLUG_VERSION.to_be_bytes()),
					_ => return vec![0x04],
				}
				body
			}
			opcode::PROGRAM_MODE => {
				let action = msg.body.first().copied().unwrap_or(0);
				self.log
					.lock()
					.expect("log lock")
					.program_mode_actions
					.push(action);
				vec![0x00]
			}
			opcode::READ_RADIO_KEY => {
				let mut body = vec![0x00];
				let material: Vec<u8> = (0u8..32).collect();
				body.extend_from_slice(&material);
				body
			}
			opcode::UNLOCK_SECURITY => {
				if self.opts.lock_security {
					return vec![0x06];
				}
				let material: Vec<u8> = (0u8..32).collect();
				let mut expected = [0u8; 32];
				expected.copy_from_slice(&material);
				let expected = self.key.encrypt_key_material(&expected);
				if msg.body.as_slice() == &expected[..] {
					vec![0x00]
				} else {
					vec![0x01]
				}
			}
			opcode::UNLOCK_PARTITION => vec![0x00],
			opcode::CLONE_READ => self.clone_read(&msg.body),
			opcode::CLONE_WRITE => self.clone_write(&msg.body),
			opcode::PSDT_ACCESS => {
				if msg.body.first() == Some(&0x02) {
					let mut cp = self.codeplug.lock().expect("codeplug lock");
					*cp = self.staged.clone();
					self.log.lock().expect("log lock").deployed = true;
				}
				vec![0x00]
			}
			_ => vec![0x05],
		}
	}

	fn parse_selector(body: &[u8]) -> Option<(u16, u16, u8)> {
		if body.len() < 10 || body[0] != 0x80 || body[1] != 0x01 || body[4] != 0x80 || body[5] != 0x02
		{
			return None;
		}
		let zone = u16::from_be_bytes([body[2], body[3]]);
		let channel = u16::from_be_bytes([body[6], body[7]]);
		Some((zone, channel, body[9]))
	}

	fn clone_read(&mut self, body: &[u8]) -> Vec<u8> {
		let Some((zone, channel, data_type)) = Self::parse_selector(body) else {
			return vec![0x04];
		};
		let cp = self.codeplug.lock().expect("codeplug lock").clone();
		let desc = self.desc;

		let record = match data_type {
			0x00 => parse::encode_structure(
				desc,
				&parse::StructureCounts {
					zones: cp.zones.len() as u16,
					contacts: cp.contacts.len() as u16,
					scan_lists: cp.scan_lists.len() as u16,
					rx_groups: cp.rx_group_lists.len() as u16,
					codeplug_version: SIM_CODEPLUG_VERSION,
				},
			),
			0x01 => parse::encode_identity(desc, cp.radio_id, &cp.alias),
			0x02 => match cp.zones.get(usize::from(zone)) {
				Some(z) => parse::encode_zone_header(desc, z),
				None => return vec![0x04],
			},
			0x03 => match cp
				.zones
				.get(usize::from(zone))
				.and_then(|z| z.channels.get(usize::from(channel)))
			{
				Some(ch) => parse::encode_channel(desc, ch),
				None => return vec![0x04],
			},
			0x04 => match cp.contacts.get(usize::from(channel)) {
				Some(c) => parse::encode_contact(desc, c),
				None => return vec![0x04],
			},
			0x05 => match cp.scan_lists.get(usize::from(channel)) {
				Some(s) => parse::encode_scan_list(desc, s),
				None => return vec![0x04],
			},
			0x06 => match cp.rx_group_lists.get(usize::from(channel)) {
				Some(g) => parse::encode_rx_group(desc, g),
				None => return vec![0x04],
			},
			_ => return vec![0x04],
		};

		let Ok(data) = record else {
			return vec![0x01];
		};

		let mut reply = vec![0x00];
		reply.extend_from_slice(&body[..10]);
		reply.push(0x00); // reserved echo byte
		reply.extend_from_slice(&(data.len() as u16).to_be_bytes());
		reply.extend_from_slice(&data);
		reply
	}

	fn clone_write(&mut self, body: &[u8]) -> Vec<u8> {
		let Some((zone, channel, data_type)) = Self::parse_selector(body) else {
			return vec![0x04];
		};
		if body.len() < 12 {
			return vec![0x04];
		}
		let data_len = usize::from(u16::from_be_bytes([body[10], body[11]]));
		let Some(data) = body.get(12..12 + data_len) else {
			return vec![0x04];
		};
		let desc = self.desc;

		let outcome = match data_type {
			0x00 => parse::parse_structure(desc, data).map(|counts| {
				self.staged = ParsedCodeplug {
					zones: vec![Zone::default(); usize::from(counts.zones)],
					contacts: vec![Default::default(); usize::from(counts.contacts)],
					scan_lists: vec![Default::default(); usize::from(counts.scan_lists)],
					rx_group_lists: vec![Default::default(); usize::from(counts.rx_groups)],
					..ParsedCodeplug::default()
				};
			}),
			0x01 => parse::parse_identity(desc, data).map(|identity| {
				self.staged.radio_id = identity.radio_id;
				self.staged.alias = identity.alias;
			}),
			0x02 => parse::parse_zone_header(desc, data).and_then(|header| {
				let zone = self
					.staged
					.zones
					.get_mut(usize::from(zone))
					.ok_or_else(|| bad_slot())?;
				zone.name = header.name;
				zone.position = header.position;
				zone.channels = vec![Channel::default(); usize::from(header.channel_count)];
				Ok(())
			}),
			0x03 => parse::parse_channel(desc, data).and_then(|parsed| {
				let slot = self
					.staged
					.zones
					.get_mut(usize::from(zone))
					.and_then(|z| z.channels.get_mut(usize::from(channel)))
					.ok_or_else(|| bad_slot())?;
				*slot = parsed;
				Ok(())
			}),
			0x04 => parse::parse_contact(desc, data).and_then(|parsed| {
				let slot = self
					.staged
					.contacts
					.get_mut(usize::from(channel))
					.ok_or_else(|| bad_slot())?;
				*slot = parsed;
				Ok(())
			}),
			0x05 => parse::parse_scan_list(desc, data).and_then(|parsed| {
				let slot = self
					.staged
					.scan_lists
					.get_mut(usize::from(channel))
					.ok_or_else(|| bad_slot())?;
				*slot = parsed;
				Ok(())
			}),
			0x06 => parse::parse_rx_group(desc, data).and_then(|parsed| {
				let slot = self
					.staged
					.rx_group_lists
					.get_mut(usize::from(channel))
					.ok_or_else(|| bad_slot())?;
				*slot = parsed;
				Ok(())
			}),
			_ => return vec![0x04],
		};

		match outcome {
			Ok(()) => vec![0x00],
			Err(_) => vec![0x01],
		}
	}
}

fn bad_slot() -> trbolink::xnl::frame::FrameError {
	trbolink::xnl::frame::FrameError::Record("selector addresses a missing slot".into())
}

fn ok_ascii(value: &str) -> Vec<u8> {
	let mut body = vec![0x00];
	body.extend_from_slice(value.as_bytes());
	body
}
