//! Protocol constants and per-session configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::tea::TeaKey;

/// TCP port of the XNL service in subscriber CPS mode.
pub const XNL_PORT: u16 = 8002;

/// Default radio address on the CDC-ECM network.
pub const DEFAULT_RADIO_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1));

/// Receive deadline for a single XNL frame.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline for one XCMP request/reply round trip.
pub const XCMP_TIMEOUT: Duration = Duration::from_secs(2);

/// Budget for the whole XNL handshake, TCP connect included.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for the device-init broadcast sequence after the XNL handshake.
pub const DEVICE_INIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Callers should wait at least this long before reconnecting after an
/// aborted session; the radio stays in an elevated state until it observes
/// the TCP FIN.
pub const RECONNECT_GRACE: Duration = Duration::from_secs(1);

/// Lower bound for the whole-operation deadline of a bulk read or write.
pub const MIN_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for the whole-operation deadline of a bulk read or write.
pub const MAX_OPERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything one logical operation needs to reach and authenticate a radio.
///
/// The TEA key material and delta constant are opaque configuration obtained
/// by the user from authorized sources; the crate ships no key material.
#[derive(Clone, Debug)]
pub struct SessionConfig {
	pub addr: IpAddr,
	pub port: u16,
	pub auth_key: TeaKey,
	pub frame_timeout: Duration,
	pub xcmp_timeout: Duration,
	pub handshake_timeout: Duration,
}

impl SessionConfig {
	pub fn new(addr: IpAddr, port: u16, auth_key: TeaKey) -> Self {
		Self {
			addr,
			port,
			auth_key,
			frame_timeout: FRAME_TIMEOUT,
			xcmp_timeout: XCMP_TIMEOUT,
			handshake_timeout: HANDSHAKE_TIMEOUT,
		}
	}

	/// Configuration for the default CDC-ECM endpoint.
	pub fn usb_default(auth_key: TeaKey) -> Self {
		Self::new(DEFAULT_RADIO_ADDR, XNL_PORT, auth_key)
	}

	/// Whole-operation deadline derived from the number of records a bulk
	/// transfer will move, clamped to [`MIN_OPERATION_TIMEOUT`] and
	/// [`MAX_OPERATION_TIMEOUT`].
	pub fn operation_timeout(&self, record_count: usize) -> Duration {
		let per_record = self.xcmp_timeout / 4;
		let derived = u32::try_from(record_count)
			.ok()
			.and_then(|n| per_record.checked_mul(n))
			.unwrap_or(MAX_OPERATION_TIMEOUT);
		derived.clamp(MIN_OPERATION_TIMEOUT, MAX_OPERATION_TIMEOUT)
	}
}
