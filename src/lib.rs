//! Programming core for MOTOTRBO subscriber radios.
//!
//! The crate speaks the layered XNL/XCMP protocol over a local TCP channel
//! (USB CDC-ECM network, `192.168.10.1:8002` by default): it authenticates
//! against the radio with a TEA-variant challenge/response, enters
//! programming mode, and performs bulk reads and writes of the codeplug.
//!
//! The layers, bottom up:
//!
//! - [`codec`]: big-endian primitives and bit-packed record I/O.
//! - [`tea`]: the block cipher used for session authentication and the
//!   security unlock token.
//! - [`xnl`]: transport framing, the authentication handshake, address and
//!   message-id discipline.
//! - [`xcmp`]: opcode dispatch, transaction matching and the device-init
//!   gate.
//! - [`programming`]: program-mode entry/exit and the security unlock
//!   sequence.
//! - [`clone`]: the bulk codeplug transfer engine.
//! - [`codeplug`]: the typed model, per-family bit layouts, validation and
//!   read-back comparison.
//!
//! The entry points [`identify`], [`read_codeplug`] and [`write_codeplug`]
//! each open a fresh TCP session, run one logical operation and close the
//! connection; a session is never reused.

#[macro_use]
extern crate log;

pub mod clone;
pub mod codec;
pub mod codeplug;
pub mod config;
mod error;
pub mod ops;
pub mod progress;
pub mod programming;
pub mod tea;
pub mod xcmp;
pub mod xnl;

pub use crate::codeplug::compare::ComparisonResult;
pub use crate::codeplug::model::{DeviceInfo, ParsedCodeplug};
pub use crate::codeplug::validate::ValidationResult;
pub use crate::config::SessionConfig;
pub use crate::error::{Error, Result};
pub use crate::ops::{
	WriteOptions, WriteReport, compare, identify, read_codeplug, validate, write_codeplug,
};
pub use crate::progress::CancelToken;
