//! The codeplug domain model: typed zones, channels, contacts, scan lists
//! and rx-group lists, the per-family bit layouts they are packed with, and
//! the validation/comparison passes run around a write.
//!
//! References between records are by index, never by pointer: a channel
//! names its contact, rx-group list and scan list by 1-based id (0 = none),
//! and scan lists name their members by `(zone, channel)` position. The
//! parsed model therefore has no cycles and is exclusively owned by the
//! caller.

pub mod compare;
pub mod layout;
pub mod model;
pub mod parse;
pub mod validate;
