//! GSM 03.40 SMS PDU codec and SIM message-box engine.
//!
//! This crate implements the wire-level half of an SMS-capable device
//! client:
//! - the GSM 03.38 default-alphabet transcoder and the packed 7-bit
//!   user-data bitstream,
//! - semi-octet BCD address and timestamp fields,
//! - SMS-SUBMIT / SMS-DELIVER PDU assembly and parsing,
//! - multi-part concatenation (split and reassembly),
//! - reconciliation of the device's occupied-slot bitmap into raw-PDU and
//!   logical-message views.
//!
//! Device I/O stays behind the [`DeviceLink`] trait; everything else is
//! pure, synchronous byte-buffer work.

pub mod common;
pub mod messagebox;
pub mod pdu;

pub use common::errors::{EncodeErr, PduParseErr};
pub use messagebox::{DeviceLink, MessageBox, MsgBoxErr};
pub use pdu::concat::{reassemble, split_into_parts, ConcatInfo};
pub use pdu::sms::{Alphabet, Encoded, Sms, SmsSummary};
pub use pdu::user_data::MAX_UD_OCTETS;
