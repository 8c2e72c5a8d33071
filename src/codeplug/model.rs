//! Typed codeplug records.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Smallest assignable DMR radio id.
pub const RADIO_ID_MIN: u32 = 1;
/// Largest assignable DMR radio id (24 bit).
pub const RADIO_ID_MAX: u32 = 16_777_215;

/// Largest color code of a DMR channel.
pub const COLOR_CODE_MAX: u8 = 15;

/// Transmit timeout beyond which validation warns, in seconds.
pub const TOT_WARN_LIMIT: u16 = 600;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
	#[error("rx frequency is zero on a channel that can receive")]
	ZeroRxFrequency,

	#[error("color code {0} out of range 0..=15")]
	ColorCodeRange(u8),

	#[error("digital channel that can transmit has no contact assigned")]
	MissingContact,
}

/// Read-only device identity, filled in by the identification queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
	/// Model number, e.g. `M27JQN9JA1AN`.
	pub model_number: String,
	/// Marketing name, e.g. `XPR 3500e`.
	pub model_name: String,
	pub serial: String,
	/// Firmware version, e.g. `R02.21.01.1025`.
	pub firmware_version: String,
	pub codeplug_version: u32,
	/// Ordering code from the TANAPA query.
	pub tanapa: String,
	pub radio_id: u32,
	pub alias: String,
	/// Raw capability blob; interpreted per family, carried opaque here.
	pub capabilities: Vec<u8>,
}

/// The complete parsed configuration database of one radio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCodeplug {
	pub device: DeviceInfo,
	pub radio_id: u32,
	pub alias: String,
	pub zones: Vec<Zone>,
	pub contacts: Vec<Contact>,
	pub scan_lists: Vec<ScanList>,
	pub rx_group_lists: Vec<RxGroupList>,
}

impl ParsedCodeplug {
	pub fn channel_count(&self) -> usize {
		self.zones.iter().map(|z| z.channels.len()).sum()
	}

	/// Total records a bulk transfer of this codeplug moves.
	pub fn record_count(&self) -> usize {
		// structure + identity + one header per zone
		2 + self.zones.len()
			+ self.channel_count()
			+ self.contacts.len()
			+ self.scan_lists.len()
			+ self.rx_group_lists.len()
	}

	pub fn channel(&self, zone: u16, channel: u16) -> Option<&Channel> {
		self.zones
			.get(usize::from(zone))?
			.channels
			.get(usize::from(channel))
	}

	pub fn contact_by_id(&self, id: u16) -> Option<&Contact> {
		if id == 0 {
			return None;
		}
		self.contacts.get(usize::from(id) - 1)
	}
}

/// An ordered bank of channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zone {
	pub name: String,
	/// Position on the channel selector.
	pub position: u16,
	pub channels: Vec<Channel>,
}

bitflags! {
	/// Per-channel option bits.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct ChannelFlags: u8 {
		const RX_ONLY = 0b0000_0001;
		const TALKAROUND = 0b0000_0010;
		const VOX = 0b0000_0100;
		const PRIVACY = 0b0000_1000;
	}
}

#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[repr(u8)]
pub enum ChannelMode {
	#[default]
	Analog = 0,
	Digital = 1,
}

#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[repr(u8)]
pub enum Bandwidth {
	/// 12.5 kHz
	#[default]
	Narrow = 0,
	/// 25 kHz
	Wide = 1,
}

#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[repr(u8)]
pub enum PowerLevel {
	Low = 0,
	#[default]
	High = 1,
}

#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[repr(u8)]
pub enum TimeSlot {
	#[default]
	Slot1 = 1,
	Slot2 = 2,
}

#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[repr(u8)]
pub enum PrivacyMode {
	#[default]
	None = 0,
	Basic = 1,
	Enhanced = 2,
}

/// Analog squelch coding: none, a CTCSS tone or a DCS code.
///
/// On the wire this is a 2-bit kind plus a 14-bit value; CTCSS tones are
/// carried in tenths of hertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubTone {
	#[default]
	None,
	/// Tone frequency in tenths of hertz (e.g. 1230 for 123.0 Hz).
	Ctcss(u16),
	Dcs {
		code: u16,
		inverted: bool,
	},
}

impl SubTone {
	pub fn to_raw(self) -> (u8, u16) {
		match self {
			Self::None => (0, 0),
			Self::Ctcss(tenth_hz) => (1, tenth_hz),
			Self::Dcs {
				code,
				inverted: false,
			} => (2, code),
			Self::Dcs {
				code,
				inverted: true,
			} => (3, code),
		}
	}

	pub fn from_raw(kind: u8, value: u16) -> Self {
		match kind {
			1 => Self::Ctcss(value),
			2 => Self::Dcs {
				code: value,
				inverted: false,
			},
			3 => Self::Dcs {
				code: value,
				inverted: true,
			},
			_ => Self::None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
	pub name: String,
	pub rx_frequency_hz: u64,
	pub tx_frequency_hz: u64,
	pub mode: ChannelMode,
	pub bandwidth: Bandwidth,
	pub power: PowerLevel,
	pub subtone: SubTone,
	pub color_code: u8,
	pub time_slot: TimeSlot,
	/// 1-based index into the contact list; 0 = none.
	pub contact_id: u16,
	/// 1-based index into the rx-group lists; 0 = none.
	pub rx_group_list_id: u16,
	/// 1-based index into the scan lists; 0 = none.
	pub scan_list_id: u16,
	pub flags: ChannelFlags,
	/// Transmit timeout in seconds; 0 = infinite.
	pub tot_seconds: u16,
	pub privacy_mode: PrivacyMode,
	pub privacy_key_index: u8,
}

impl Default for Channel {
	fn default() -> Self {
		Self {
			name: String::new(),
			rx_frequency_hz: 0,
			tx_frequency_hz: 0,
			mode: ChannelMode::Analog,
			bandwidth: Bandwidth::Narrow,
			power: PowerLevel::High,
			subtone: SubTone::None,
			color_code: 0,
			time_slot: TimeSlot::Slot1,
			contact_id: 0,
			rx_group_list_id: 0,
			scan_list_id: 0,
			flags: ChannelFlags::empty(),
			tot_seconds: 60,
			privacy_mode: PrivacyMode::None,
			privacy_key_index: 0,
		}
	}
}

impl Channel {
	pub fn can_transmit(&self) -> bool {
		!self.flags.contains(ChannelFlags::RX_ONLY)
	}

	/// The construction-time invariants. Run by the parser on every record
	/// that comes off the radio and by the validator before a write.
	pub fn check_invariants(&self) -> Result<(), ModelError> {
		if self.rx_frequency_hz == 0 && !self.flags.contains(ChannelFlags::RX_ONLY) {
			// a zero rx frequency is tolerated only on a receive-only
			// placeholder slot
			return Err(ModelError::ZeroRxFrequency);
		}
		if self.color_code > COLOR_CODE_MAX {
			return Err(ModelError::ColorCodeRange(self.color_code));
		}
		if self.mode == ChannelMode::Digital && self.can_transmit() && self.contact_id == 0 {
			return Err(ModelError::MissingContact);
		}
		Ok(())
	}
}

#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[repr(u8)]
pub enum CallType {
	#[default]
	Group = 0,
	Private = 1,
	AllCall = 2,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
	pub name: String,
	pub dmr_id: u32,
	pub call_type: CallType,
}

/// A channel position, the stable identity scan lists refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelRef {
	pub zone: u16,
	pub channel: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanList {
	pub name: String,
	pub members: Vec<ChannelRef>,
	pub priority1: Option<ChannelRef>,
	pub priority2: Option<ChannelRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RxGroupList {
	pub name: String,
	/// 1-based contact ids.
	pub contact_ids: Vec<u16>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn digital_channel() -> Channel {
		Channel {
			name: "TG 91".into(),
			rx_frequency_hz: 438_800_000,
			tx_frequency_hz: 431_200_000,
			mode: ChannelMode::Digital,
			color_code: 1,
			contact_id: 1,
			..Channel::default()
		}
	}

	#[test]
	fn invariants_hold_for_a_sane_channel() {
		assert_eq!(digital_channel().check_invariants(), Ok(()));
	}

	#[test]
	fn zero_rx_frequency_rejected_unless_rx_only() {
		let mut ch = digital_channel();
		ch.rx_frequency_hz = 0;
		assert_eq!(ch.check_invariants(), Err(ModelError::ZeroRxFrequency));

		ch.flags |= ChannelFlags::RX_ONLY;
		assert_eq!(ch.check_invariants(), Ok(()));
	}

	#[test]
	fn color_code_range() {
		let mut ch = digital_channel();
		ch.color_code = 16;
		assert_eq!(ch.check_invariants(), Err(ModelError::ColorCodeRange(16)));
	}

	#[test]
	fn digital_transmit_needs_contact() {
		let mut ch = digital_channel();
		ch.contact_id = 0;
		assert_eq!(ch.check_invariants(), Err(ModelError::MissingContact));

		// receive-only digital channels may leave the contact unset
		ch.flags |= ChannelFlags::RX_ONLY;
		assert_eq!(ch.check_invariants(), Ok(()));
	}

	#[test]
	fn subtone_raw_roundtrip() {
		for tone in [
			SubTone::None,
			SubTone::Ctcss(1230),
			SubTone::Dcs {
				code: 0o023,
				inverted: false,
			},
			SubTone::Dcs {
				code: 0o754,
				inverted: true,
			},
		] {
			let (kind, value) = tone.to_raw();
			assert_eq!(SubTone::from_raw(kind, value), tone);
		}
	}

	#[test]
	fn contact_lookup_is_one_based() {
		let cp = ParsedCodeplug {
			contacts: vec![Contact {
				name: "Local".into(),
				dmr_id: 9,
				call_type: CallType::Group,
			}],
			..ParsedCodeplug::default()
		};
		assert!(cp.contact_by_id(0).is_none());
		assert_eq!(cp.contact_by_id(1).unwrap().name, "Local");
		assert!(cp.contact_by_id(2).is_none());
	}
}
