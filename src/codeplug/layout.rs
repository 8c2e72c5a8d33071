//! Per-family record layouts.
//!
//! A [`ModelDescriptor`] declares, for one radio family, how each record
//! type is bit-packed: every scalar field carries its offset, width, value
//! kind, default and constraint, plus the ids of dependent fields whose
//! constraints must be re-evaluated when it changes. Array-shaped spans
//! (scan members, group members) are positional and addressed through the
//! slot helpers next to the tables.
//!
//! Only the XPR 3000e family is laid out here; unknown model numbers fall
//! back to it with a warning, which matches how far the wire captures go.

use std::sync::OnceLock;

use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
	// channel record
	ChannelName,
	RxFrequency,
	TxFrequency,
	Mode,
	Bandwidth,
	Power,
	RxOnly,
	Talkaround,
	ColorCode,
	TimeSlot,
	Vox,
	PrivacyEnabled,
	ContactId,
	RxGroupId,
	ScanListId,
	Tot,
	ToneKind,
	ToneValue,
	PrivacyMode,
	PrivacyKey,
	// zone header
	ZoneName,
	ZonePosition,
	ZoneChannelCount,
	// contact record
	ContactName,
	ContactDmrId,
	ContactCallType,
	// scan list record
	ScanName,
	ScanPriority1Zone,
	ScanPriority1Channel,
	ScanPriority2Zone,
	ScanPriority2Channel,
	ScanMemberCount,
	// rx group record
	GroupName,
	GroupMemberCount,
	// identity record
	RadioId,
	RadioAlias,
	// structure record
	ZoneCount,
	ContactCount,
	ScanListCount,
	RxGroupCount,
	CodeplugVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	Uint,
	Bool,
	Utf16 { max_units: u16 },
	Utf8 { max_len: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
	Range { min: u64, max: u64 },
}

pub struct FieldDef {
	pub id: FieldId,
	pub bit_offset: u32,
	pub bit_len: u16,
	pub kind: FieldKind,
	pub default: u64,
	pub constraint: Option<Constraint>,
	/// Fields whose constraints must be re-checked when this one changes.
	pub depends: &'static [FieldId],
}

const fn uint(id: FieldId, bit_offset: u32, bit_len: u16) -> FieldDef {
	FieldDef {
		id,
		bit_offset,
		bit_len,
		kind: FieldKind::Uint,
		default: 0,
		constraint: None,
		depends: &[],
	}
}

const fn boolean(id: FieldId, bit_offset: u32) -> FieldDef {
	FieldDef {
		id,
		bit_offset,
		bit_len: 1,
		kind: FieldKind::Bool,
		default: 0,
		constraint: None,
		depends: &[],
	}
}

const fn utf16(id: FieldId, bit_offset: u32, max_units: u16) -> FieldDef {
	FieldDef {
		id,
		bit_offset,
		bit_len: max_units * 16,
		kind: FieldKind::Utf16 { max_units },
		default: 0,
		constraint: None,
		depends: &[],
	}
}

const fn with_default(mut def: FieldDef, default: u64) -> FieldDef {
	def.default = default;
	def
}

const fn ranged(mut def: FieldDef, min: u64, max: u64) -> FieldDef {
	def.constraint = Some(Constraint::Range { min, max });
	def
}

const fn depending(mut def: FieldDef, depends: &'static [FieldId]) -> FieldDef {
	def.depends = depends;
	def
}

pub struct RecordLayout {
	/// Record size on the wire, in bytes.
	pub size: usize,
	pub fields: &'static [FieldDef],
	index: OnceLock<AHashMap<FieldId, usize>>,
}

impl RecordLayout {
	const fn new(size: usize, fields: &'static [FieldDef]) -> Self {
		Self {
			size,
			fields,
			index: OnceLock::new(),
		}
	}

	pub fn field(&self, id: FieldId) -> &'static FieldDef {
		let index = self.index.get_or_init(|| {
			self.fields
				.iter()
				.enumerate()
				.map(|(i, f)| (f.id, i))
				.collect()
		});
		let i = *index
			.get(&id)
			.unwrap_or_else(|| panic!("field {id:?} missing from layout"));
		&self.fields[i]
	}

	pub fn has_field(&self, id: FieldId) -> bool {
		self.fields.iter().any(|f| f.id == id)
	}
}

pub struct ModelDescriptor {
	pub family: &'static str,
	/// Model-number prefixes this descriptor covers.
	pub model_prefixes: &'static [&'static str],
	pub channel: RecordLayout,
	pub zone: RecordLayout,
	pub contact: RecordLayout,
	pub scan_list: RecordLayout,
	pub rx_group: RecordLayout,
	pub identity: RecordLayout,
	pub structure: RecordLayout,
	pub max_zones: u16,
	pub max_channels_per_zone: u16,
	pub max_contacts: u16,
	pub max_scan_lists: u16,
	pub max_rx_groups: u16,
	pub max_scan_members: u16,
	pub max_group_members: u16,
}

/// Bit offset of scan-list member slot `i` (zone u16, channel u16 pairs).
pub const SCAN_MEMBER_BASE: u32 = 336;

pub const fn scan_member_offset(i: u16) -> u32 {
	SCAN_MEMBER_BASE + i as u32 * 32
}

/// Bit offset of rx-group member slot `i` (contact id u16).
pub const GROUP_MEMBER_BASE: u32 = 272;

pub const fn group_member_offset(i: u16) -> u32 {
	GROUP_MEMBER_BASE + i as u32 * 16
}

/// Sentinel for an unset priority-channel slot.
pub const NO_CHANNEL: u64 = 0xFFFF;

static CHANNEL_FIELDS: &[FieldDef] = &[
	utf16(FieldId::ChannelName, 0, 16),
	uint(FieldId::RxFrequency, 256, 32),
	uint(FieldId::TxFrequency, 288, 32),
	depending(
		ranged(uint(FieldId::Mode, 320, 2), 0, 1),
		&[FieldId::ContactId, FieldId::ColorCode, FieldId::TimeSlot],
	),
	ranged(uint(FieldId::Bandwidth, 322, 2), 0, 1),
	with_default(ranged(uint(FieldId::Power, 324, 2), 0, 1), 1),
	boolean(FieldId::RxOnly, 326),
	boolean(FieldId::Talkaround, 327),
	ranged(uint(FieldId::ColorCode, 328, 4), 0, 15),
	with_default(ranged(uint(FieldId::TimeSlot, 332, 2), 1, 2), 1),
	boolean(FieldId::Vox, 334),
	depending(
		boolean(FieldId::PrivacyEnabled, 335),
		&[FieldId::PrivacyMode, FieldId::PrivacyKey],
	),
	uint(FieldId::ContactId, 336, 16),
	uint(FieldId::RxGroupId, 352, 16),
	uint(FieldId::ScanListId, 368, 16),
	with_default(ranged(uint(FieldId::Tot, 384, 16), 0, 1800), 60),
	depending(ranged(uint(FieldId::ToneKind, 400, 2), 0, 3), &[FieldId::ToneValue]),
	uint(FieldId::ToneValue, 402, 14),
	ranged(uint(FieldId::PrivacyMode, 416, 2), 0, 2),
	uint(FieldId::PrivacyKey, 418, 6),
];

static ZONE_FIELDS: &[FieldDef] = &[
	utf16(FieldId::ZoneName, 0, 16),
	uint(FieldId::ZonePosition, 256, 16),
	ranged(uint(FieldId::ZoneChannelCount, 272, 16), 0, 16),
];

static CONTACT_FIELDS: &[FieldDef] = &[
	utf16(FieldId::ContactName, 0, 16),
	ranged(uint(FieldId::ContactDmrId, 256, 32), 0, 16_777_215),
	ranged(uint(FieldId::ContactCallType, 288, 8), 0, 2),
];

static SCAN_FIELDS: &[FieldDef] = &[
	utf16(FieldId::ScanName, 0, 16),
	with_default(uint(FieldId::ScanPriority1Zone, 256, 16), NO_CHANNEL),
	with_default(uint(FieldId::ScanPriority1Channel, 272, 16), NO_CHANNEL),
	with_default(uint(FieldId::ScanPriority2Zone, 288, 16), NO_CHANNEL),
	with_default(uint(FieldId::ScanPriority2Channel, 304, 16), NO_CHANNEL),
	ranged(uint(FieldId::ScanMemberCount, 320, 16), 0, 16),
];

static GROUP_FIELDS: &[FieldDef] = &[
	utf16(FieldId::GroupName, 0, 16),
	ranged(uint(FieldId::GroupMemberCount, 256, 16), 0, 32),
];

static IDENTITY_FIELDS: &[FieldDef] = &[
	ranged(uint(FieldId::RadioId, 0, 32), 1, 16_777_215),
	utf16(FieldId::RadioAlias, 32, 16),
];

static STRUCTURE_FIELDS: &[FieldDef] = &[
	ranged(uint(FieldId::ZoneCount, 0, 16), 0, 250),
	ranged(uint(FieldId::ContactCount, 16, 16), 0, 1000),
	ranged(uint(FieldId::ScanListCount, 32, 16), 0, 250),
	ranged(uint(FieldId::RxGroupCount, 48, 16), 0, 250),
	uint(FieldId::CodeplugVersion, 64, 32),
];

static XPR_3000E: ModelDescriptor = ModelDescriptor {
	family: "XPR 3000e",
	model_prefixes: &["M27", "M28"],
	channel: RecordLayout::new(64, CHANNEL_FIELDS),
	zone: RecordLayout::new(40, ZONE_FIELDS),
	contact: RecordLayout::new(40, CONTACT_FIELDS),
	scan_list: RecordLayout::new(106, SCAN_FIELDS),
	rx_group: RecordLayout::new(98, GROUP_FIELDS),
	identity: RecordLayout::new(36, IDENTITY_FIELDS),
	structure: RecordLayout::new(12, STRUCTURE_FIELDS),
	max_zones: 250,
	max_channels_per_zone: 16,
	max_contacts: 1000,
	max_scan_lists: 250,
	max_rx_groups: 250,
	max_scan_members: 16,
	max_group_members: 32,
};

/// Looks up the descriptor for a model number, falling back to the XPR
/// 3000e layout for unknown families.
pub fn descriptor_for(model_number: &str) -> &'static ModelDescriptor {
	for descriptor in [&XPR_3000E] {
		if descriptor
			.model_prefixes
			.iter()
			.any(|p| model_number.starts_with(p))
		{
			return descriptor;
		}
	}
	warn!("unknown model number {model_number:?}; using the {} layout", XPR_3000E.family);
	&XPR_3000E
}

pub fn default_descriptor() -> &'static ModelDescriptor {
	&XPR_3000E
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn channel_fields_stay_inside_the_record() {
		for f in CHANNEL_FIELDS {
			assert!(
				(f.bit_offset as usize + f.bit_len as usize) <= XPR_3000E.channel.size * 8,
				"{:?} leaves the record",
				f.id
			);
		}
	}

	#[test]
	fn scalar_fields_do_not_overlap() {
		for layout in [
			&XPR_3000E.channel,
			&XPR_3000E.zone,
			&XPR_3000E.contact,
			&XPR_3000E.identity,
			&XPR_3000E.structure,
		] {
			let mut spans: Vec<(u32, u32)> = layout
				.fields
				.iter()
				.map(|f| (f.bit_offset, f.bit_offset + u32::from(f.bit_len)))
				.collect();
			spans.sort_unstable();
			for pair in spans.windows(2) {
				assert!(pair[0].1 <= pair[1].0, "overlap at bit {}", pair[1].0);
			}
		}
	}

	#[test]
	fn member_slots_stay_inside_their_records() {
		let last_scan = scan_member_offset(XPR_3000E.max_scan_members - 1) + 32;
		assert!(last_scan as usize <= XPR_3000E.scan_list.size * 8);

		let last_group = group_member_offset(XPR_3000E.max_group_members - 1) + 16;
		assert!(last_group as usize <= XPR_3000E.rx_group.size * 8);
	}

	#[test]
	fn field_lookup_hits_every_declared_field() {
		for f in CHANNEL_FIELDS {
			assert_eq!(XPR_3000E.channel.field(f.id).bit_offset, f.bit_offset);
		}
		assert!(!XPR_3000E.channel.has_field(FieldId::ZoneName));
	}

	#[test]
	fn prefix_match_selects_the_family() {
		assert_eq!(descriptor_for("M27JQN9JA1AN").family, "XPR 3000e");
		assert_eq!(descriptor_for("M28JNN9KA1AN").family, "XPR 3000e");
	}

	#[test]
	fn mode_declares_its_dependents() {
		let mode = XPR_3000E.channel.field(FieldId::Mode);
		assert!(mode.depends.contains(&FieldId::ContactId));
		assert!(mode.depends.contains(&FieldId::TimeSlot));
	}
}
