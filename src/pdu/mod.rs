//! GSM 03.40 TPDU codecs: addresses, timestamps, user data, the `Sms`
//! message object itself, and multi-part concatenation.

pub mod address;
pub mod concat;
pub mod sms;
pub mod timestamp;
pub mod user_data;
