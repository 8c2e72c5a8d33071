//! Post-write read-back comparison.

use ahash::AHashMap;

use crate::codeplug::model::{Channel, ParsedCodeplug};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
	RadioIdentity,
	Structure,
	Zone,
	Channel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
	pub category: Category,
	pub location: String,
	pub expected: String,
	pub actual: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonResult {
	pub discrepancies: Vec<Discrepancy>,
}

impl ComparisonResult {
	pub fn passed(&self) -> bool {
		self.discrepancies.is_empty()
	}

	/// Discrepancy counts per category, for log summaries.
	pub fn by_category(&self) -> AHashMap<Category, usize> {
		let mut counts = AHashMap::new();
		for d in &self.discrepancies {
			*counts.entry(d.category).or_insert(0) += 1;
		}
		counts
	}

	fn push(
		&mut self,
		category: Category,
		location: impl Into<String>,
		expected: impl core::fmt::Display,
		actual: impl core::fmt::Display,
	) {
		self.discrepancies.push(Discrepancy {
			category,
			location: location.into(),
			expected: expected.to_string(),
			actual: actual.to_string(),
		});
	}
}

/// Compares a written codeplug against its read-back. `expected` is what was
/// sent, `actual` what the radio returned.
pub fn compare(expected: &ParsedCodeplug, actual: &ParsedCodeplug) -> ComparisonResult {
	let mut result = ComparisonResult::default();

	if expected.radio_id != actual.radio_id {
		result.push(
			Category::RadioIdentity,
			"radio id",
			expected.radio_id,
			actual.radio_id,
		);
	}
	if expected.alias != actual.alias {
		result.push(
			Category::RadioIdentity,
			"alias",
			&expected.alias,
			&actual.alias,
		);
	}

	for (what, a, b) in [
		("zone count", expected.zones.len(), actual.zones.len()),
		(
			"contact count",
			expected.contacts.len(),
			actual.contacts.len(),
		),
		(
			"scan list count",
			expected.scan_lists.len(),
			actual.scan_lists.len(),
		),
		(
			"rx group list count",
			expected.rx_group_lists.len(),
			actual.rx_group_lists.len(),
		),
	] {
		if a != b {
			result.push(Category::Structure, what, a, b);
		}
	}

	for (zi, (ze, za)) in expected.zones.iter().zip(&actual.zones).enumerate() {
		let zone_loc = format!("zone {} {:?}", zi + 1, ze.name);

		if ze.name != za.name {
			result.push(Category::Zone, &zone_loc, &ze.name, &za.name);
		}
		if ze.position != za.position {
			result.push(
				Category::Zone,
				format!("{zone_loc} position"),
				ze.position,
				za.position,
			);
		}
		if ze.channels.len() != za.channels.len() {
			result.push(
				Category::Zone,
				format!("{zone_loc} channel count"),
				ze.channels.len(),
				za.channels.len(),
			);
		}

		for (ci, (ce, ca)) in ze.channels.iter().zip(&za.channels).enumerate() {
			let loc = format!("zone {} channel {} {:?}", zi + 1, ci + 1, ce.name);
			compare_channel(&mut result, &loc, ce, ca);
		}
	}

	for (i, (ce, ca)) in expected.contacts.iter().zip(&actual.contacts).enumerate() {
		if ce != ca {
			result.push(
				Category::Structure,
				format!("contact {} {:?}", i + 1, ce.name),
				format!("{ce:?}"),
				format!("{ca:?}"),
			);
		}
	}
	for (i, (se, sa)) in expected
		.scan_lists
		.iter()
		.zip(&actual.scan_lists)
		.enumerate()
	{
		if se != sa {
			result.push(
				Category::Structure,
				format!("scan list {} {:?}", i + 1, se.name),
				format!("{se:?}"),
				format!("{sa:?}"),
			);
		}
	}
	for (i, (ge, ga)) in expected
		.rx_group_lists
		.iter()
		.zip(&actual.rx_group_lists)
		.enumerate()
	{
		if ge != ga {
			result.push(
				Category::Structure,
				format!("rx group list {} {:?}", i + 1, ge.name),
				format!("{ge:?}"),
				format!("{ga:?}"),
			);
		}
	}

	result
}

fn compare_channel(result: &mut ComparisonResult, loc: &str, expected: &Channel, actual: &Channel) {
	if expected.name != actual.name {
		result.push(
			Category::Channel,
			format!("{loc} name"),
			&expected.name,
			&actual.name,
		);
	}
	if expected.rx_frequency_hz != actual.rx_frequency_hz {
		result.push(
			Category::Channel,
			format!("{loc} rx frequency"),
			expected.rx_frequency_hz,
			actual.rx_frequency_hz,
		);
	}
	if expected.tx_frequency_hz != actual.tx_frequency_hz {
		result.push(
			Category::Channel,
			format!("{loc} tx frequency"),
			expected.tx_frequency_hz,
			actual.tx_frequency_hz,
		);
	}
	if expected.mode != actual.mode {
		result.push(
			Category::Channel,
			format!("{loc} mode"),
			format!("{:?}", expected.mode),
			format!("{:?}", actual.mode),
		);
	}
	if expected.color_code != actual.color_code {
		result.push(
			Category::Channel,
			format!("{loc} color code"),
			expected.color_code,
			actual.color_code,
		);
	}
	if expected.time_slot != actual.time_slot {
		result.push(
			Category::Channel,
			format!("{loc} time slot"),
			format!("{:?}", expected.time_slot),
			format!("{:?}", actual.time_slot),
		);
	}
	if expected.contact_id != actual.contact_id {
		result.push(
			Category::Channel,
			format!("{loc} contact id"),
			expected.contact_id,
			actual.contact_id,
		);
	}

	// remaining scalar fields in one sweep
	let rest_expected = (
		expected.bandwidth,
		expected.power,
		expected.subtone,
		expected.rx_group_list_id,
		expected.scan_list_id,
		expected.flags,
		expected.tot_seconds,
		expected.privacy_mode,
		expected.privacy_key_index,
	);
	let rest_actual = (
		actual.bandwidth,
		actual.power,
		actual.subtone,
		actual.rx_group_list_id,
		actual.scan_list_id,
		actual.flags,
		actual.tot_seconds,
		actual.privacy_mode,
		actual.privacy_key_index,
	);
	if rest_expected != rest_actual {
		result.push(
			Category::Channel,
			format!("{loc} options"),
			format!("{rest_expected:?}"),
			format!("{rest_actual:?}"),
		);
	}
}
