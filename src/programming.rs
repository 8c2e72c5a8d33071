//! Programming-mode control: identity queries, program-mode entry and exit,
//! security unlock and partition unlock.
//!
//! The unlock sequence is rigid. The radio hands out 32 bytes of key
//! material; the host encrypts each 8-byte block with the same TEA key and
//! delta used for XNL authentication and returns the concatenation. A radio
//! left in program mode stays elevated until power-cycle, so every failure
//! path after entry issues a best-effort exit.

use crate::codec::{ascii_field, utf16le_field};
use crate::codeplug::model::DeviceInfo;
use crate::config::{DEVICE_INIT_TIMEOUT, SessionConfig};
use crate::error::{Error, Result};
use crate::tea::TeaKey;
use crate::xcmp::{XcmpLink, XcmpMessage, XcmpResult, opcode};
use crate::xnl::XnlSession;
use crate::xnl::frame::FrameError;

/// Sub-type selectors of the `RadioStatus` query.
pub mod status_type {
	pub const RADIO_ID: u8 = 0x0E;
	pub const RADIO_ALIAS: u8 = 0x0F;
	pub const CODEPLUG_VERSION: u8 = 0x12;
}

/// Sub-type selectors of the `VersionInfo` query.
pub mod version_type {
	pub const FIRMWARE: u8 = 0x00;
	pub const DEVICE_TYPE: u8 = 0x41;
}

/// Partition selectors of the unlock-partition command.
pub mod partition {
	pub const APPLICATION: u8 = 0x00;
	pub const CODEPLUG: u8 = 0x01;
}

const PROGRAM_MODE_ENTER: u8 = 0x01;
const PROGRAM_MODE_EXIT: u8 = 0x00;

pub struct Programmer {
	link: XcmpLink,
	in_program_mode: bool,
}

impl Programmer {
	/// Opens a session, authenticates and waits out the device-init
	/// broadcast sequence.
	pub fn connect(config: &SessionConfig) -> Result<Self> {
		let session = XnlSession::connect(config)?;
		let mut link = XcmpLink::new(session, config.xcmp_timeout);
		link.await_device_init(DEVICE_INIT_TIMEOUT)?;
		Ok(Self {
			link,
			in_program_mode: false,
		})
	}

	pub fn link(&mut self) -> &mut XcmpLink {
		&mut self.link
	}

	/// The identity query sequence. Safe outside program mode.
	pub fn read_device_info(&mut self) -> Result<DeviceInfo> {
		// the security key query primes the radio's descriptor state; its
		// token is not otherwise used in subscriber mode
		let token = self.link.request_ok(XcmpMessage::request(opcode::SECURITY_KEY))?;
		debug!("device descriptor token: {} bytes", token.len());

		let model_number = ascii_field(&self.link.request_ok(XcmpMessage::request(opcode::MODEL_NUMBER))?);
		let model_name = ascii_field(&self.versioned(version_type::DEVICE_TYPE)?);
		let serial = ascii_field(&self.link.request_ok(XcmpMessage::request(opcode::SERIAL_NUMBER))?);
		let firmware_version = ascii_field(&self.versioned(version_type::FIRMWARE)?);
		let tanapa = ascii_field(&self.link.request_ok(XcmpMessage::request(opcode::TANAPA_NUMBER))?);
		let capabilities = self.link.request_ok(XcmpMessage::request(opcode::CAPABILITIES))?;

		let radio_id = u32::from_be_bytes(
			self.status(status_type::RADIO_ID)?
				.try_into()
				.map_err(|_| FrameError::Record("radio id field is not 4 bytes".into()))?,
		);
		let alias = utf16le_field(&self.status(status_type::RADIO_ALIAS)?);
		let codeplug_version = u32::from_be_bytes(
			self.status(status_type::CODEPLUG_VERSION)?
				.try_into()
				.map_err(|_| FrameError::Record("codeplug version field is not 4 bytes".into()))?,
		);

		info!("identified {model_name} ({model_number}), serial {serial}, firmware {firmware_version}");
		Ok(DeviceInfo {
			model_number,
			model_name,
			serial,
			firmware_version,
			codeplug_version,
			tanapa,
			radio_id,
			alias,
			capabilities,
		})
	}

	/// A `RadioStatus` query; the reply echoes the sub-type before the value.
	fn status(&mut self, sub_type: u8) -> Result<Vec<u8>> {
		let body = self
			.link
			.request_ok(XcmpMessage::request_with(opcode::RADIO_STATUS, sub_type))?;
		Self::strip_echo(body, sub_type)
	}

	/// A `VersionInfo` query; same echo convention as `RadioStatus`.
	fn versioned(&mut self, sub_type: u8) -> Result<Vec<u8>> {
		let body = self
			.link
			.request_ok(XcmpMessage::request_with(opcode::VERSION_INFO, sub_type))?;
		Self::strip_echo(body, sub_type)
	}

	fn strip_echo(mut body: Vec<u8>, sub_type: u8) -> Result<Vec<u8>> {
		if body.first() != Some(&sub_type) {
			return Err(FrameError::Record(format!(
				"reply does not echo sub-type {sub_type:#04x}"
			))
			.into());
		}
		body.remove(0);
		Ok(body)
	}

	pub fn enter_program_mode(&mut self) -> Result<()> {
		self.link.request_ok(XcmpMessage::request_with(
			opcode::PROGRAM_MODE,
			PROGRAM_MODE_ENTER,
		))?;
		self.in_program_mode = true;
		info!("entered program mode");
		Ok(())
	}

	pub fn exit_program_mode(&mut self) -> Result<()> {
		if !self.in_program_mode {
			return Ok(());
		}
		self.link.request_ok(XcmpMessage::request_with(
			opcode::PROGRAM_MODE,
			PROGRAM_MODE_EXIT,
		))?;
		self.in_program_mode = false;
		info!("left program mode");
		Ok(())
	}

	/// Reads the 32-byte radio key, encrypts it block-wise and presents the
	/// unlock token.
	pub fn unlock_security(&mut self, key: &TeaKey) -> Result<()> {
		let material = self
			.link
			.request_ok(XcmpMessage::request(opcode::READ_RADIO_KEY))?;
		let material: [u8; 32] = material
			.try_into()
			.map_err(|_| FrameError::Record("radio key material is not 32 bytes".into()))?;

		let token = key.encrypt_key_material(&material);
		let reply = self
			.link
			.request(XcmpMessage::new(opcode::UNLOCK_SECURITY, token.to_vec()))?;

		match reply.result_code() {
			Some(0x00) => {
				info!("security unlocked");
				Ok(())
			}
			Some(code)
				if code == u8::from(XcmpResult::Failure)
					|| code == u8::from(XcmpResult::SecurityLocked) =>
			{
				error!("security unlock refused (code {code:#04x})");
				Err(Error::ProgrammingLocked { code })
			}
			Some(code) => Err(Error::Device {
				opcode: opcode::UNLOCK_SECURITY,
				code,
			}),
			None => Err(FrameError::Record("empty unlock reply".into()).into()),
		}
	}

	pub fn unlock_partition(&mut self, selector: u8) -> Result<()> {
		self.link.request_ok(XcmpMessage::request_with(
			opcode::UNLOCK_PARTITION,
			selector,
		))?;
		debug!("partition {selector:#04x} unlocked");
		Ok(())
	}

	/// Enter program mode and run the unlock sequence down to the codeplug
	/// partition.
	pub fn unlock_for_clone(&mut self, key: &TeaKey) -> Result<()> {
		self.enter_program_mode()?;
		self.unlock_security(key)?;
		self.unlock_partition(partition::CODEPLUG)
	}

	/// Best-effort cleanup on the failure path: exit program mode, ignoring
	/// whatever the radio answers, then drop the link.
	pub fn abort(mut self) {
		if self.in_program_mode
			&& let Err(err) = self.exit_program_mode()
		{
			warn!("program mode exit on abort failed: {err}");
		}
		self.link.close();
	}

	/// Clean finish: exit program mode if entered, then close.
	pub fn finish(mut self) -> Result<()> {
		self.exit_program_mode()?;
		self.link.close();
		Ok(())
	}
}
