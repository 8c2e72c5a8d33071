//! Packing and unpacking of bit-packed records against a model descriptor.
//!
//! [`RecordImage`] is the working form of one record: a byte buffer plus
//! the layout describing it. Reads are infallible once an image exists:
//! construction checks the buffer against the declared record size, and the
//! layout tables are statically verified to stay inside it. Writes check
//! the field's constraint and re-evaluate the constraints of its declared
//! dependents.
//!
//! Frequencies cross the wire in units of 100 Hz; the model stores hertz.

use crate::codec;
use crate::codeplug::layout::{
	Constraint, FieldDef, FieldId, FieldKind, ModelDescriptor, NO_CHANNEL, RecordLayout,
	group_member_offset, scan_member_offset,
};
use crate::codeplug::model::{
	Bandwidth, CallType, Channel, ChannelFlags, ChannelMode, ChannelRef, Contact, PowerLevel,
	PrivacyMode, RxGroupList, ScanList, SubTone, TimeSlot, Zone,
};
use crate::xnl::frame::FrameError;

/// Wire frequency unit in hertz.
pub const FREQ_UNIT_HZ: u64 = 100;

pub struct RecordImage<'l> {
	layout: &'l RecordLayout,
	bytes: Vec<u8>,
}

impl<'l> RecordImage<'l> {
	/// A zeroed record with the layout's declared defaults applied.
	pub fn new(layout: &'l RecordLayout) -> Self {
		let mut image = Self {
			layout,
			bytes: vec![0; layout.size],
		};
		for def in layout.fields {
			if def.default != 0 {
				codec::write_bits(
					&mut image.bytes,
					def.bit_offset as usize,
					usize::from(def.bit_len),
					def.default,
				)
				.expect("layout default fits its field");
			}
		}
		image
	}

	pub fn from_bytes(layout: &'l RecordLayout, bytes: &[u8]) -> Result<Self, FrameError> {
		if bytes.len() < layout.size {
			return Err(FrameError::Record(format!(
				"record is {} bytes, layout needs {}",
				bytes.len(),
				layout.size
			)));
		}
		Ok(Self {
			layout,
			bytes: bytes[..layout.size].to_vec(),
		})
	}

	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}

	fn def(&self, id: FieldId) -> &'static FieldDef {
		self.layout.field(id)
	}

	pub fn get_uint(&self, id: FieldId) -> u64 {
		let def = self.def(id);
		codec::read_bits(
			&self.bytes,
			def.bit_offset as usize,
			usize::from(def.bit_len),
		)
		.expect("layout span inside record")
	}

	pub fn get_bool(&self, id: FieldId) -> bool {
		self.get_uint(id) != 0
	}

	pub fn get_str(&self, id: FieldId) -> String {
		let def = self.def(id);
		match def.kind {
			FieldKind::Utf16 { max_units } => codec::read_utf16(
				&self.bytes,
				def.bit_offset as usize,
				usize::from(max_units),
			)
			.expect("layout span inside record"),
			FieldKind::Utf8 { max_len } => {
				codec::read_utf8(&self.bytes, def.bit_offset as usize, usize::from(max_len))
					.expect("layout span inside record")
			}
			FieldKind::Uint | FieldKind::Bool => String::new(),
		}
	}

	fn check(def: &FieldDef, value: u64) -> Result<(), FrameError> {
		if let Some(Constraint::Range { min, max }) = def.constraint
			&& !(min..=max).contains(&value)
		{
			return Err(FrameError::Record(format!(
				"{:?} value {value} outside {min}..={max}",
				def.id
			)));
		}
		Ok(())
	}

	pub fn set_uint(&mut self, id: FieldId, value: u64) -> Result<(), FrameError> {
		let def = self.def(id);
		Self::check(def, value)?;
		codec::write_bits(
			&mut self.bytes,
			def.bit_offset as usize,
			usize::from(def.bit_len),
			value,
		)?;

		// re-evaluate the constraints of whatever depends on this field
		for dep in def.depends {
			let dep_def = self.layout.field(*dep);
			Self::check(dep_def, self.get_uint(*dep))?;
		}
		Ok(())
	}

	pub fn set_bool(&mut self, id: FieldId, value: bool) -> Result<(), FrameError> {
		self.set_uint(id, u64::from(value))
	}

	pub fn set_str(&mut self, id: FieldId, value: &str) -> Result<(), FrameError> {
		let def = self.def(id);
		match def.kind {
			FieldKind::Utf16 { max_units } => Ok(codec::write_utf16(
				&mut self.bytes,
				def.bit_offset as usize,
				usize::from(max_units),
				value,
			)?),
			FieldKind::Utf8 { max_len } => Ok(codec::write_utf8(
				&mut self.bytes,
				def.bit_offset as usize,
				usize::from(max_len),
				value,
			)?),
			FieldKind::Uint | FieldKind::Bool => Err(FrameError::Record(format!(
				"{:?} is not a string field",
				def.id
			))),
		}
	}
}

fn record_err(err: impl core::fmt::Display) -> FrameError {
	FrameError::Record(err.to_string())
}

pub fn parse_channel(desc: &ModelDescriptor, bytes: &[u8]) -> Result<Channel, FrameError> {
	let img = RecordImage::from_bytes(&desc.channel, bytes)?;

	let mode = ChannelMode::try_from(img.get_uint(FieldId::Mode) as u8).map_err(record_err)?;
	let time_slot =
		TimeSlot::try_from(img.get_uint(FieldId::TimeSlot) as u8).map_err(record_err)?;
	let privacy_mode =
		PrivacyMode::try_from(img.get_uint(FieldId::PrivacyMode) as u8).map_err(record_err)?;

	let mut flags = ChannelFlags::empty();
	flags.set(ChannelFlags::RX_ONLY, img.get_bool(FieldId::RxOnly));
	flags.set(ChannelFlags::TALKAROUND, img.get_bool(FieldId::Talkaround));
	flags.set(ChannelFlags::VOX, img.get_bool(FieldId::Vox));
	flags.set(ChannelFlags::PRIVACY, img.get_bool(FieldId::PrivacyEnabled));

	let channel = Channel {
		name: img.get_str(FieldId::ChannelName),
		rx_frequency_hz: img.get_uint(FieldId::RxFrequency) * FREQ_UNIT_HZ,
		tx_frequency_hz: img.get_uint(FieldId::TxFrequency) * FREQ_UNIT_HZ,
		mode,
		bandwidth: Bandwidth::try_from(img.get_uint(FieldId::Bandwidth) as u8)
			.map_err(record_err)?,
		power: PowerLevel::try_from(img.get_uint(FieldId::Power) as u8).map_err(record_err)?,
		subtone: SubTone::from_raw(
			img.get_uint(FieldId::ToneKind) as u8,
			img.get_uint(FieldId::ToneValue) as u16,
		),
		color_code: img.get_uint(FieldId::ColorCode) as u8,
		time_slot,
		contact_id: img.get_uint(FieldId::ContactId) as u16,
		rx_group_list_id: img.get_uint(FieldId::RxGroupId) as u16,
		scan_list_id: img.get_uint(FieldId::ScanListId) as u16,
		flags,
		tot_seconds: img.get_uint(FieldId::Tot) as u16,
		privacy_mode,
		privacy_key_index: img.get_uint(FieldId::PrivacyKey) as u8,
	};

	channel.check_invariants().map_err(record_err)?;
	Ok(channel)
}

pub fn encode_channel(desc: &ModelDescriptor, channel: &Channel) -> Result<Vec<u8>, FrameError> {
	channel.check_invariants().map_err(record_err)?;

	let rx_units = channel.rx_frequency_hz / FREQ_UNIT_HZ;
	let tx_units = channel.tx_frequency_hz / FREQ_UNIT_HZ;
	if rx_units > u64::from(u32::MAX) || tx_units > u64::from(u32::MAX) {
		return Err(FrameError::Record("frequency exceeds the field width".into()));
	}

	let mut img = RecordImage::new(&desc.channel);
	img.set_str(FieldId::ChannelName, &channel.name)?;
	img.set_uint(FieldId::RxFrequency, rx_units)?;
	img.set_uint(FieldId::TxFrequency, tx_units)?;
	img.set_uint(FieldId::Mode, u64::from(u8::from(channel.mode)))?;
	img.set_uint(FieldId::Bandwidth, u64::from(u8::from(channel.bandwidth)))?;
	img.set_uint(FieldId::Power, u64::from(u8::from(channel.power)))?;
	img.set_bool(FieldId::RxOnly, channel.flags.contains(ChannelFlags::RX_ONLY))?;
	img.set_bool(
		FieldId::Talkaround,
		channel.flags.contains(ChannelFlags::TALKAROUND),
	)?;
	img.set_uint(FieldId::ColorCode, u64::from(channel.color_code))?;
	img.set_uint(FieldId::TimeSlot, u64::from(u8::from(channel.time_slot)))?;
	img.set_bool(FieldId::Vox, channel.flags.contains(ChannelFlags::VOX))?;
	img.set_bool(
		FieldId::PrivacyEnabled,
		channel.flags.contains(ChannelFlags::PRIVACY),
	)?;
	img.set_uint(FieldId::ContactId, u64::from(channel.contact_id))?;
	img.set_uint(FieldId::RxGroupId, u64::from(channel.rx_group_list_id))?;
	img.set_uint(FieldId::ScanListId, u64::from(channel.scan_list_id))?;
	img.set_uint(FieldId::Tot, u64::from(channel.tot_seconds))?;
	let (tone_kind, tone_value) = channel.subtone.to_raw();
	img.set_uint(FieldId::ToneKind, u64::from(tone_kind))?;
	img.set_uint(FieldId::ToneValue, u64::from(tone_value))?;
	img.set_uint(FieldId::PrivacyMode, u64::from(u8::from(channel.privacy_mode)))?;
	img.set_uint(FieldId::PrivacyKey, u64::from(channel.privacy_key_index))?;
	Ok(img.into_bytes())
}

/// Zone header record: the zone's own fields plus its channel count; the
/// channels follow as separate records.
pub struct ZoneHeader {
	pub name: String,
	pub position: u16,
	pub channel_count: u16,
}

pub fn parse_zone_header(desc: &ModelDescriptor, bytes: &[u8]) -> Result<ZoneHeader, FrameError> {
	let img = RecordImage::from_bytes(&desc.zone, bytes)?;
	let channel_count = img.get_uint(FieldId::ZoneChannelCount) as u16;
	if channel_count > desc.max_channels_per_zone {
		return Err(FrameError::Record(format!(
			"zone claims {channel_count} channels, family maximum is {}",
			desc.max_channels_per_zone
		)));
	}
	Ok(ZoneHeader {
		name: img.get_str(FieldId::ZoneName),
		position: img.get_uint(FieldId::ZonePosition) as u16,
		channel_count,
	})
}

pub fn encode_zone_header(desc: &ModelDescriptor, zone: &Zone) -> Result<Vec<u8>, FrameError> {
	let mut img = RecordImage::new(&desc.zone);
	img.set_str(FieldId::ZoneName, &zone.name)?;
	img.set_uint(FieldId::ZonePosition, u64::from(zone.position))?;
	img.set_uint(FieldId::ZoneChannelCount, zone.channels.len() as u64)?;
	Ok(img.into_bytes())
}

pub fn parse_contact(desc: &ModelDescriptor, bytes: &[u8]) -> Result<Contact, FrameError> {
	let img = RecordImage::from_bytes(&desc.contact, bytes)?;
	Ok(Contact {
		name: img.get_str(FieldId::ContactName),
		dmr_id: img.get_uint(FieldId::ContactDmrId) as u32,
		call_type: CallType::try_from(img.get_uint(FieldId::ContactCallType) as u8)
			.map_err(record_err)?,
	})
}

pub fn encode_contact(desc: &ModelDescriptor, contact: &Contact) -> Result<Vec<u8>, FrameError> {
	let mut img = RecordImage::new(&desc.contact);
	img.set_str(FieldId::ContactName, &contact.name)?;
	img.set_uint(FieldId::ContactDmrId, u64::from(contact.dmr_id))?;
	img.set_uint(FieldId::ContactCallType, u64::from(u8::from(contact.call_type)))?;
	Ok(img.into_bytes())
}

fn channel_ref_from_slots(zone: u64, channel: u64) -> Option<ChannelRef> {
	if zone == NO_CHANNEL || channel == NO_CHANNEL {
		return None;
	}
	Some(ChannelRef {
		zone: zone as u16,
		channel: channel as u16,
	})
}

pub fn parse_scan_list(desc: &ModelDescriptor, bytes: &[u8]) -> Result<ScanList, FrameError> {
	let img = RecordImage::from_bytes(&desc.scan_list, bytes)?;
	let count = img.get_uint(FieldId::ScanMemberCount) as u16;
	if count > desc.max_scan_members {
		return Err(FrameError::Record(format!(
			"scan list claims {count} members, family maximum is {}",
			desc.max_scan_members
		)));
	}

	let mut members = Vec::with_capacity(usize::from(count));
	for i in 0..count {
		let zone = codec::read_bits(img.bytes(), scan_member_offset(i) as usize, 16)?;
		let channel = codec::read_bits(img.bytes(), scan_member_offset(i) as usize + 16, 16)?;
		if let Some(member) = channel_ref_from_slots(zone, channel) {
			members.push(member);
		}
	}

	Ok(ScanList {
		name: img.get_str(FieldId::ScanName),
		members,
		priority1: channel_ref_from_slots(
			img.get_uint(FieldId::ScanPriority1Zone),
			img.get_uint(FieldId::ScanPriority1Channel),
		),
		priority2: channel_ref_from_slots(
			img.get_uint(FieldId::ScanPriority2Zone),
			img.get_uint(FieldId::ScanPriority2Channel),
		),
	})
}

pub fn encode_scan_list(desc: &ModelDescriptor, scan: &ScanList) -> Result<Vec<u8>, FrameError> {
	if scan.members.len() > usize::from(desc.max_scan_members) {
		return Err(FrameError::Record(format!(
			"scan list has {} members, family maximum is {}",
			scan.members.len(),
			desc.max_scan_members
		)));
	}

	let mut img = RecordImage::new(&desc.scan_list);
	img.set_str(FieldId::ScanName, &scan.name)?;
	for (slot_zone, slot_channel, value) in [
		(
			FieldId::ScanPriority1Zone,
			FieldId::ScanPriority1Channel,
			scan.priority1,
		),
		(
			FieldId::ScanPriority2Zone,
			FieldId::ScanPriority2Channel,
			scan.priority2,
		),
	] {
		let (zone, channel) = match value {
			Some(r) => (u64::from(r.zone), u64::from(r.channel)),
			None => (NO_CHANNEL, NO_CHANNEL),
		};
		img.set_uint(slot_zone, zone)?;
		img.set_uint(slot_channel, channel)?;
	}
	img.set_uint(FieldId::ScanMemberCount, scan.members.len() as u64)?;

	let mut bytes = img.into_bytes();
	for (i, member) in scan.members.iter().enumerate() {
		let base = scan_member_offset(i as u16) as usize;
		codec::write_bits(&mut bytes, base, 16, u64::from(member.zone))?;
		codec::write_bits(&mut bytes, base + 16, 16, u64::from(member.channel))?;
	}
	// unused slots read back as "no channel"
	for i in scan.members.len()..usize::from(desc.max_scan_members) {
		let base = scan_member_offset(i as u16) as usize;
		codec::write_bits(&mut bytes, base, 16, NO_CHANNEL)?;
		codec::write_bits(&mut bytes, base + 16, 16, NO_CHANNEL)?;
	}
	Ok(bytes)
}

pub fn parse_rx_group(desc: &ModelDescriptor, bytes: &[u8]) -> Result<RxGroupList, FrameError> {
	let img = RecordImage::from_bytes(&desc.rx_group, bytes)?;
	let count = img.get_uint(FieldId::GroupMemberCount) as u16;
	if count > desc.max_group_members {
		return Err(FrameError::Record(format!(
			"rx group claims {count} members, family maximum is {}",
			desc.max_group_members
		)));
	}

	let mut contact_ids = Vec::with_capacity(usize::from(count));
	for i in 0..count {
		let id = codec::read_bits(img.bytes(), group_member_offset(i) as usize, 16)?;
		if id != 0 {
			contact_ids.push(id as u16);
		}
	}

	Ok(RxGroupList {
		name: img.get_str(FieldId::GroupName),
		contact_ids,
	})
}

pub fn encode_rx_group(desc: &ModelDescriptor, group: &RxGroupList) -> Result<Vec<u8>, FrameError> {
	if group.contact_ids.len() > usize::from(desc.max_group_members) {
		return Err(FrameError::Record(format!(
			"rx group has {} members, family maximum is {}",
			group.contact_ids.len(),
			desc.max_group_members
		)));
	}

	let mut img = RecordImage::new(&desc.rx_group);
	img.set_str(FieldId::GroupName, &group.name)?;
	img.set_uint(FieldId::GroupMemberCount, group.contact_ids.len() as u64)?;

	let mut bytes = img.into_bytes();
	for (i, id) in group.contact_ids.iter().enumerate() {
		codec::write_bits(
			&mut bytes,
			group_member_offset(i as u16) as usize,
			16,
			u64::from(*id),
		)?;
	}
	Ok(bytes)
}

pub struct RadioIdentity {
	pub radio_id: u32,
	pub alias: String,
}

pub fn parse_identity(desc: &ModelDescriptor, bytes: &[u8]) -> Result<RadioIdentity, FrameError> {
	let img = RecordImage::from_bytes(&desc.identity, bytes)?;
	Ok(RadioIdentity {
		radio_id: img.get_uint(FieldId::RadioId) as u32,
		alias: img.get_str(FieldId::RadioAlias),
	})
}

pub fn encode_identity(
	desc: &ModelDescriptor,
	radio_id: u32,
	alias: &str,
) -> Result<Vec<u8>, FrameError> {
	let mut img = RecordImage::new(&desc.identity);
	img.set_uint(FieldId::RadioId, u64::from(radio_id))?;
	img.set_str(FieldId::RadioAlias, alias)?;
	Ok(img.into_bytes())
}

pub struct StructureCounts {
	pub zones: u16,
	pub contacts: u16,
	pub scan_lists: u16,
	pub rx_groups: u16,
	pub codeplug_version: u32,
}

pub fn parse_structure(desc: &ModelDescriptor, bytes: &[u8]) -> Result<StructureCounts, FrameError> {
	let img = RecordImage::from_bytes(&desc.structure, bytes)?;
	let counts = StructureCounts {
		zones: img.get_uint(FieldId::ZoneCount) as u16,
		contacts: img.get_uint(FieldId::ContactCount) as u16,
		scan_lists: img.get_uint(FieldId::ScanListCount) as u16,
		rx_groups: img.get_uint(FieldId::RxGroupCount) as u16,
		codeplug_version: img.get_uint(FieldId::CodeplugVersion) as u32,
	};
	if counts.zones > desc.max_zones
		|| counts.contacts > desc.max_contacts
		|| counts.scan_lists > desc.max_scan_lists
		|| counts.rx_groups > desc.max_rx_groups
	{
		return Err(FrameError::Record("structure counts exceed the family limits".into()));
	}
	Ok(counts)
}

pub fn encode_structure(
	desc: &ModelDescriptor,
	counts: &StructureCounts,
) -> Result<Vec<u8>, FrameError> {
	let mut img = RecordImage::new(&desc.structure);
	img.set_uint(FieldId::ZoneCount, u64::from(counts.zones))?;
	img.set_uint(FieldId::ContactCount, u64::from(counts.contacts))?;
	img.set_uint(FieldId::ScanListCount, u64::from(counts.scan_lists))?;
	img.set_uint(FieldId::RxGroupCount, u64::from(counts.rx_groups))?;
	img.set_uint(FieldId::CodeplugVersion, u64::from(counts.codeplug_version))?;
	Ok(img.into_bytes())
}
