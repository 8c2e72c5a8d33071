//! Bulk codeplug transfer: the clone read/write engine.
//!
//! Records are addressed with `(zone, channel, data type)` selectors. A read
//! iterates zones ascending, channels ascending within each zone, and data
//! types in a fixed order: structure and identity first, then zone headers
//! and channels, then contacts, scan lists and rx-group lists. A write
//! pushes the same records in the same order, opened by the structure
//! record as framing and closed by CRC validation and deploy.
//!
//! Progress is reported per record and on phase transitions, monotonic in
//! `[0, 1]`.

use std::time::Instant;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::Reader;
use crate::config::SessionConfig;
use crate::codeplug::layout::ModelDescriptor;
use crate::codeplug::model::{ParsedCodeplug, Zone};
use crate::codeplug::parse;
use crate::error::{Error, Result};
use crate::progress::{CancelToken, Progress};
use crate::programming::Programmer;
use crate::xcmp::{XcmpMessage, opcode};
use crate::xnl::frame::FrameError;

/// Data types a clone selector can address.
#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u8)]
pub enum CloneDataType {
	Structure = 0x00,
	Identity = 0x01,
	ZoneHeader = 0x02,
	Channel = 0x03,
	Contact = 0x04,
	ScanList = 0x05,
	RxGroupList = 0x06,
}

/// Selector bytes: tagged zone and channel indices plus the data type.
const SELECTOR_LEN: usize = 10;
/// The reply echoes the selector plus one reserved byte.
const SELECTOR_ECHO_LEN: usize = 11;

fn selector(zone: u16, channel: u16, data_type: CloneDataType) -> [u8; SELECTOR_LEN] {
	let z = zone.to_be_bytes();
	let c = channel.to_be_bytes();
	[
		0x80,
		0x01,
		z[0],
		z[1],
		0x80,
		0x02,
		c[0],
		c[1],
		0x00,
		data_type.into(),
	]
}

/// PSDT section commands issued after the block transfer.
mod psdt_action {
	pub const VALIDATE_CRC: u8 = 0x01;
	pub const DEPLOY: u8 = 0x02;
}

fn clone_read(
	programmer: &mut Programmer,
	zone: u16,
	channel: u16,
	data_type: CloneDataType,
) -> Result<Vec<u8>> {
	let msg = XcmpMessage::new(opcode::CLONE_READ, selector(zone, channel, data_type).as_slice());
	let reply = programmer.link().request(msg)?;

	let mut r = Reader::new(&reply.body);
	let result = r.u8()?;
	if result != 0 {
		return Err(Error::Device {
			opcode: opcode::CLONE_READ,
			code: result,
		});
	}
	r.skip(SELECTOR_ECHO_LEN)?;
	let data_len = r.u16()?;
	Ok(r.take(usize::from(data_len))?.to_vec())
}

fn clone_write(
	programmer: &mut Programmer,
	zone: u16,
	channel: u16,
	data_type: CloneDataType,
	data: &[u8],
) -> Result<()> {
	let mut body = Vec::with_capacity(SELECTOR_LEN + 2 + data.len());
	body.extend_from_slice(&selector(zone, channel, data_type));
	body.extend_from_slice(&(data.len() as u16).to_be_bytes());
	body.extend_from_slice(data);

	programmer
		.link()
		.request_ok(XcmpMessage::new(opcode::CLONE_WRITE, body))?;
	Ok(())
}

/// Block transfer occupies the first 90% of the write; CRC validation and
/// deploy take the rest.
fn write_fraction(written: usize, total: usize) -> f32 {
	if total == 0 {
		0.9
	} else {
		0.9 * written as f32 / total as f32
	}
}

fn psdt_command(programmer: &mut Programmer, action: u8, partition: u8) -> Result<()> {
	programmer.link().request_ok(XcmpMessage::new(
		opcode::PSDT_ACCESS,
		[action, partition].as_slice(),
	))?;
	Ok(())
}

/// Checked between requests: the whole-operation deadline and the caller's
/// cancel token.
fn guard(deadline: Instant, cancel: &CancelToken) -> Result<()> {
	cancel.check()?;
	if Instant::now() > deadline {
		return Err(Error::Timeout {
			phase: "bulk transfer",
		});
	}
	Ok(())
}

/// Reads every record off the radio into a parsed codeplug. Device info is
/// filled in by the caller.
pub fn read_codeplug_records(
	programmer: &mut Programmer,
	desc: &ModelDescriptor,
	config: &SessionConfig,
	progress: &mut Progress<'_>,
	cancel: &CancelToken,
) -> Result<ParsedCodeplug> {
	let mut done = 0usize;

	cancel.check()?;
	progress.report(0.0, "reading structure");
	let structure = parse::parse_structure(
		desc,
		&clone_read(programmer, 0, 0, CloneDataType::Structure)?,
	)?;
	done += 1;

	// worst-case channel total until the zone headers tighten it
	let mut total = 2
		+ usize::from(structure.zones) * (1 + usize::from(desc.max_channels_per_zone))
		+ usize::from(structure.contacts)
		+ usize::from(structure.scan_lists)
		+ usize::from(structure.rx_groups);

	// size is known now; the whole transfer runs against one deadline
	let deadline = Instant::now() + config.operation_timeout(total);

	cancel.check()?;
	let identity = parse::parse_identity(
		desc,
		&clone_read(programmer, 0, 0, CloneDataType::Identity)?,
	)?;
	done += 1;
	progress.step(done, total, "reading identity");

	let mut codeplug = ParsedCodeplug {
		radio_id: identity.radio_id,
		alias: identity.alias,
		..ParsedCodeplug::default()
	};

	let mut headers = Vec::with_capacity(usize::from(structure.zones));
	for z in 0..structure.zones {
		guard(deadline, cancel)?;
		let header = parse::parse_zone_header(
			desc,
			&clone_read(programmer, z, 0, CloneDataType::ZoneHeader)?,
		)?;
		done += 1;
		progress.step(done, total, "reading zones");
		headers.push(header);
	}

	// headers are in; replace the worst case with the real channel total
	let channel_total: usize = headers.iter().map(|h| usize::from(h.channel_count)).sum();
	total = 2
		+ usize::from(structure.zones)
		+ channel_total
		+ usize::from(structure.contacts)
		+ usize::from(structure.scan_lists)
		+ usize::from(structure.rx_groups);

	for (z, header) in headers.into_iter().enumerate() {
		let mut zone = Zone {
			name: header.name,
			position: header.position,
			channels: Vec::with_capacity(usize::from(header.channel_count)),
		};
		for c in 0..header.channel_count {
			guard(deadline, cancel)?;
			let record = clone_read(programmer, z as u16, c, CloneDataType::Channel)?;
			zone.channels.push(parse::parse_channel(desc, &record)?);
			done += 1;
			progress.step(done, total, "reading channels");
		}
		codeplug.zones.push(zone);
	}

	for i in 0..structure.contacts {
		guard(deadline, cancel)?;
		let record = clone_read(programmer, 0, i, CloneDataType::Contact)?;
		codeplug.contacts.push(parse::parse_contact(desc, &record)?);
		done += 1;
		progress.step(done, total, "reading contacts");
	}

	for i in 0..structure.scan_lists {
		guard(deadline, cancel)?;
		let record = clone_read(programmer, 0, i, CloneDataType::ScanList)?;
		codeplug
			.scan_lists
			.push(parse::parse_scan_list(desc, &record)?);
		done += 1;
		progress.step(done, total, "reading scan lists");
	}

	for i in 0..structure.rx_groups {
		guard(deadline, cancel)?;
		let record = clone_read(programmer, 0, i, CloneDataType::RxGroupList)?;
		codeplug
			.rx_group_lists
			.push(parse::parse_rx_group(desc, &record)?);
		done += 1;
		progress.step(done, total, "reading rx group lists");
	}

	progress.report(1.0, "read complete");
	Ok(codeplug)
}

/// Pushes a parsed codeplug back onto the radio. Returns the number of
/// blocks written, CRC/deploy commands excluded.
pub fn write_codeplug_records(
	programmer: &mut Programmer,
	desc: &ModelDescriptor,
	config: &SessionConfig,
	codeplug: &ParsedCodeplug,
	progress: &mut Progress<'_>,
	cancel: &CancelToken,
) -> Result<usize> {
	if codeplug.zones.len() > usize::from(desc.max_zones)
		|| codeplug.contacts.len() > usize::from(desc.max_contacts)
		|| codeplug.scan_lists.len() > usize::from(desc.max_scan_lists)
		|| codeplug.rx_group_lists.len() > usize::from(desc.max_rx_groups)
	{
		return Err(FrameError::Record("codeplug exceeds the family limits".into()).into());
	}

	let total = codeplug.record_count();
	let deadline = Instant::now() + config.operation_timeout(total);
	let mut written = 0usize;

	// the structure record doubles as the transfer's framing record
	cancel.check()?;
	progress.report(0.0, "starting");
	let counts = parse::StructureCounts {
		zones: codeplug.zones.len() as u16,
		contacts: codeplug.contacts.len() as u16,
		scan_lists: codeplug.scan_lists.len() as u16,
		rx_groups: codeplug.rx_group_lists.len() as u16,
		codeplug_version: codeplug.device.codeplug_version,
	};
	let framing = parse::encode_structure(desc, &counts)?;
	clone_write(programmer, 0, 0, CloneDataType::Structure, &framing)?;
	written += 1;

	cancel.check()?;
	let identity = parse::encode_identity(desc, codeplug.radio_id, &codeplug.alias)?;
	clone_write(programmer, 0, 0, CloneDataType::Identity, &identity)?;
	written += 1;
	progress.report(write_fraction(written, total), "writing");

	for (z, zone) in codeplug.zones.iter().enumerate() {
		guard(deadline, cancel)?;
		let header = parse::encode_zone_header(desc, zone)?;
		clone_write(programmer, z as u16, 0, CloneDataType::ZoneHeader, &header)?;
		written += 1;
		progress.report(write_fraction(written, total), "writing");

		for (c, channel) in zone.channels.iter().enumerate() {
			guard(deadline, cancel)?;
			let record = parse::encode_channel(desc, channel)?;
			clone_write(programmer, z as u16, c as u16, CloneDataType::Channel, &record)?;
			written += 1;
			progress.report(write_fraction(written, total), "writing");
		}
	}

	for (i, contact) in codeplug.contacts.iter().enumerate() {
		guard(deadline, cancel)?;
		let record = parse::encode_contact(desc, contact)?;
		clone_write(programmer, 0, i as u16, CloneDataType::Contact, &record)?;
		written += 1;
		progress.report(write_fraction(written, total), "writing");
	}

	for (i, scan) in codeplug.scan_lists.iter().enumerate() {
		guard(deadline, cancel)?;
		let record = parse::encode_scan_list(desc, scan)?;
		clone_write(programmer, 0, i as u16, CloneDataType::ScanList, &record)?;
		written += 1;
		progress.report(write_fraction(written, total), "writing");
	}

	for (i, group) in codeplug.rx_group_lists.iter().enumerate() {
		guard(deadline, cancel)?;
		let record = parse::encode_rx_group(desc, group)?;
		clone_write(programmer, 0, i as u16, CloneDataType::RxGroupList, &record)?;
		written += 1;
		progress.report(write_fraction(written, total), "writing");
	}

	// the radio checks its own CRC over the staged data; we only trigger it
	cancel.check()?;
	progress.report(0.95, "validating CRC");
	psdt_command(programmer, psdt_action::VALIDATE_CRC, crate::programming::partition::CODEPLUG)?;

	progress.report(1.0, "deploying");
	psdt_command(programmer, psdt_action::DEPLOY, crate::programming::partition::CODEPLUG)?;

	info!("wrote {written} blocks");
	Ok(written)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn selector_layout() {
		assert_eq!(
			selector(0x0102, 0x0304, CloneDataType::Channel),
			[0x80, 0x01, 0x01, 0x02, 0x80, 0x02, 0x03, 0x04, 0x00, 0x03]
		);
	}

	#[test]
	fn data_type_order_is_identity_before_channels_before_lists() {
		assert!(u8::from(CloneDataType::Identity) < u8::from(CloneDataType::Channel));
		assert!(u8::from(CloneDataType::Channel) < u8::from(CloneDataType::ScanList));
		assert!(u8::from(CloneDataType::ScanList) < u8::from(CloneDataType::RxGroupList));
	}
}
