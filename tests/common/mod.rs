// shared by several test binaries; each uses a subset
#![allow(dead_code)]

pub mod simulator;

use std::net::{IpAddr, Ipv4Addr};

use trbolink::SessionConfig;
use trbolink::tea::TeaKey;

/// Key and delta from the subscriber-mode traffic capture.
pub const TEST_KEY: [u8; 16] = [
	0x1D, 0x30, 0x96, 0x5A, 0x55, 0xAA, 0xF2, 0x0C, 0xC6, 0x6C, 0x93, 0xBF, 0x5B, 0xCD, 0x5E,
	0xBD,
];
pub const TEST_DELTA: u32 = 0x790AB771;

pub fn test_key() -> TeaKey {
	TeaKey::new(&TEST_KEY, TEST_DELTA)
}

pub fn config_for(port: u16) -> SessionConfig {
	SessionConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port, test_key())
}

pub fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// A small but fully populated codeplug that passes validation: two zones,
/// three contacts, one scan list, one rx-group list.
pub fn sample_codeplug() -> trbolink::ParsedCodeplug {
	use trbolink::codeplug::model::{
		CallType, Channel, ChannelMode, ChannelRef, Contact, ParsedCodeplug, RxGroupList,
		ScanList, TimeSlot, Zone,
	};

	let channel = |name: &str, rx: u64, tx: u64, slot: TimeSlot, contact: u16| Channel {
		name: name.into(),
		rx_frequency_hz: rx,
		tx_frequency_hz: tx,
		mode: ChannelMode::Digital,
		color_code: 1,
		time_slot: slot,
		contact_id: contact,
		rx_group_list_id: 1,
		scan_list_id: 1,
		..Channel::default()
	};

	ParsedCodeplug {
		radio_id: 2_621_440,
		alias: "OE1XYZ".into(),
		zones: vec![
			Zone {
				name: "City".into(),
				position: 0,
				channels: vec![
					channel("TG 232 TS1", 438_800_000, 431_200_000, TimeSlot::Slot1, 1),
					channel("TG 8 TS2", 438_800_000, 431_200_000, TimeSlot::Slot2, 2),
				],
			},
			Zone {
				name: "Field".into(),
				position: 1,
				channels: vec![channel(
					"Simplex 438",
					438_612_500,
					438_612_500,
					TimeSlot::Slot1,
					3,
				)],
			},
		],
		contacts: vec![
			Contact {
				name: "Austria".into(),
				dmr_id: 232,
				call_type: CallType::Group,
			},
			Contact {
				name: "Regional".into(),
				dmr_id: 8,
				call_type: CallType::Group,
			},
			Contact {
				name: "Echo".into(),
				dmr_id: 262_997,
				call_type: CallType::Private,
			},
		],
		scan_lists: vec![ScanList {
			name: "Home".into(),
			members: vec![
				ChannelRef { zone: 0, channel: 0 },
				ChannelRef { zone: 0, channel: 1 },
				ChannelRef { zone: 1, channel: 0 },
			],
			priority1: Some(ChannelRef { zone: 0, channel: 0 }),
			priority2: None,
		}],
		rx_group_lists: vec![RxGroupList {
			name: "All TGs".into(),
			contact_ids: vec![1, 2],
		}],
		..ParsedCodeplug::default()
	}
}
