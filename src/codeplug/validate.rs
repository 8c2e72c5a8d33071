//! Pre-write semantic validation.
//!
//! Errors block a write; warnings are surfaced but do not. Checks that only
//! concern a single contact are warnings by design: growing the contact
//! list can never turn a previously valid codeplug invalid.

use ahash::AHashSet;

use crate::codeplug::model::{
	COLOR_CODE_MAX, ChannelMode, ParsedCodeplug, RADIO_ID_MAX, RADIO_ID_MIN, TOT_WARN_LIMIT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	Error,
	Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
	pub severity: Severity,
	/// Where the issue lives, e.g. `zone 2 channel 5 "Simplex"`.
	pub location: String,
	pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
	pub errors: Vec<ValidationIssue>,
	pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
	pub fn passed(&self) -> bool {
		self.errors.is_empty()
	}

	fn error(&mut self, location: impl Into<String>, message: impl Into<String>) {
		self.errors.push(ValidationIssue {
			severity: Severity::Error,
			location: location.into(),
			message: message.into(),
		});
	}

	fn warning(&mut self, location: impl Into<String>, message: impl Into<String>) {
		self.warnings.push(ValidationIssue {
			severity: Severity::Warning,
			location: location.into(),
			message: message.into(),
		});
	}
}

/// Frequency ranges the validator recognizes, in hertz.
const KNOWN_BANDS: &[(u64, u64, &str)] = &[
	(136_000_000, 174_000_000, "VHF commercial"),
	(144_000_000, 148_000_000, "2m amateur"),
	(403_000_000, 470_000_000, "UHF commercial"),
	(420_000_000, 450_000_000, "70cm amateur"),
	(450_000_000, 512_000_000, "UHF T-band"),
	(806_000_000, 825_000_000, "800 MHz uplink"),
	(851_000_000, 870_000_000, "800 MHz downlink"),
];

fn in_known_band(freq_hz: u64) -> bool {
	KNOWN_BANDS
		.iter()
		.any(|&(lo, hi, _)| (lo..=hi).contains(&freq_hz))
}

pub fn validate(cp: &ParsedCodeplug) -> ValidationResult {
	let mut result = ValidationResult::default();

	if !(RADIO_ID_MIN..=RADIO_ID_MAX).contains(&cp.radio_id) {
		result.error(
			"radio identity",
			format!("radio id {} outside 1..=16777215", cp.radio_id),
		);
	}

	let mut zone_names = AHashSet::new();
	for (zi, zone) in cp.zones.iter().enumerate() {
		let zone_loc = format!("zone {} {:?}", zi + 1, zone.name);

		if zone.name.trim().is_empty() {
			result.error(&zone_loc, "zone name is empty");
		} else if !zone_names.insert(zone.name.clone()) {
			result.warning(&zone_loc, "duplicate zone name");
		}

		let mut channel_names = AHashSet::new();
		for (ci, channel) in zone.channels.iter().enumerate() {
			let loc = format!("zone {} channel {} {:?}", zi + 1, ci + 1, channel.name);

			if channel.name.trim().is_empty() {
				result.error(&loc, "channel name is empty");
			} else if !channel_names.insert(channel.name.clone()) {
				result.warning(&loc, "duplicate channel name in zone");
			}

			if let Err(err) = channel.check_invariants() {
				result.error(&loc, err.to_string());
			}

			for (what, freq) in [
				("rx", channel.rx_frequency_hz),
				("tx", channel.tx_frequency_hz),
			] {
				if freq != 0 && !in_known_band(freq) {
					result.warning(
						&loc,
						format!("{what} frequency {} Hz outside known bands", freq),
					);
				}
			}

			if channel.mode == ChannelMode::Digital && channel.color_code > COLOR_CODE_MAX {
				result.error(
					&loc,
					format!("color code {} outside 0..=15", channel.color_code),
				);
			}

			if channel.tot_seconds > TOT_WARN_LIMIT {
				result.warning(
					&loc,
					format!("transmit timeout {} s beyond {TOT_WARN_LIMIT} s", channel.tot_seconds),
				);
			}

			if usize::from(channel.contact_id) > cp.contacts.len() {
				result.error(
					&loc,
					format!("contact id {} has no matching contact", channel.contact_id),
				);
			}
			if usize::from(channel.rx_group_list_id) > cp.rx_group_lists.len() {
				result.error(
					&loc,
					format!(
						"rx group list id {} has no matching list",
						channel.rx_group_list_id
					),
				);
			}
			if usize::from(channel.scan_list_id) > cp.scan_lists.len() {
				result.error(
					&loc,
					format!("scan list id {} has no matching list", channel.scan_list_id),
				);
			}
		}
	}

	let mut contact_names = AHashSet::new();
	for (i, contact) in cp.contacts.iter().enumerate() {
		let loc = format!("contact {} {:?}", i + 1, contact.name);
		// contact-scoped findings stay warnings; see the module docs
		if contact.name.trim().is_empty() {
			result.warning(&loc, "contact name is empty");
		} else if !contact_names.insert(contact.name.clone()) {
			result.warning(&loc, "duplicate contact name");
		}
		if contact.dmr_id > RADIO_ID_MAX {
			result.warning(&loc, format!("dmr id {} outside 24 bit", contact.dmr_id));
		}
	}

	for (i, group) in cp.rx_group_lists.iter().enumerate() {
		let loc = format!("rx group list {} {:?}", i + 1, group.name);
		for &id in &group.contact_ids {
			if id == 0 || usize::from(id) > cp.contacts.len() {
				result.error(&loc, format!("contact id {id} has no matching contact"));
			}
		}
	}

	for (i, scan) in cp.scan_lists.iter().enumerate() {
		let loc = format!("scan list {} {:?}", i + 1, scan.name);
		for member in scan
			.members
			.iter()
			.chain(scan.priority1.iter())
			.chain(scan.priority2.iter())
		{
			if cp.channel(member.zone, member.channel).is_none() {
				result.error(
					&loc,
					format!(
						"member zone {} channel {} does not exist",
						member.zone, member.channel
					),
				);
			}
		}
	}

	result
}
