//! The SMS message object and its GSM 03.40 TPDU builder/parser.
//!
//! An [`Sms`] is a plain value: header fields plus user data in the selected
//! alphabet's unpacked form. Encoding is a pure function producing either a
//! single PDU or a list of concatenated parts ([`Encoded`]); there is no
//! cached wire form to invalidate.

use serde::Serialize;

use crate::common::errors::{EncodeErr, PduParseErr};
use crate::common::gsm7;
use crate::common::octets::OctetReader;
use crate::pdu::concat::{self, ConcatInfo};
use crate::pdu::user_data::{self, MAX_UD_OCTETS};
use crate::pdu::{address, timestamp};

/// TP-DCS character alphabet, bits 2-3 of the data coding scheme octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    /// Packed GSM 7-bit default alphabet.
    Gsm7,
    /// Transparent 8-bit data.
    EightBit,
    /// Big-endian UCS-2 code units.
    Ucs2,
}

impl Alphabet {
    pub fn from_raw(v: u8) -> Result<Self, PduParseErr> {
        match v {
            0 => Ok(Alphabet::Gsm7),
            1 => Ok(Alphabet::EightBit),
            2 => Ok(Alphabet::Ucs2),
            other => Err(PduParseErr::BadFieldValue {
                field: "data_coding_scheme",
                value: other,
            }),
        }
    }

    pub fn to_raw(self) -> u8 {
        match self {
            Alphabet::Gsm7 => 0,
            Alphabet::EightBit => 1,
            Alphabet::Ucs2 => 2,
        }
    }
}

/// A short message, either drafted for sending (SMS-SUBMIT shape) or parsed
/// from SIM storage (SMS-DELIVER shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sms {
    /// Service centre address; empty means "let the device default apply".
    pub smsc: String,
    /// true for a received message (DELIVER), false for an outgoing one
    /// (SUBMIT). Decides which address field below is on the wire.
    pub received: bool,
    /// Originating address, populated on received messages.
    pub sender: String,
    /// Destination address, populated on outgoing messages.
    pub recipient: String,
    /// TP-PID.
    pub protocol_id: u8,
    pub alphabet: Alphabet,
    /// TP-DCS class bits 0-1; `None` leaves the class marker bit clear.
    pub message_class: Option<u8>,
    /// Empty, `"+<seconds>"` relative validity, or an absolute
    /// `YYYY-MM-DD HH:MM:SS[±HH:MM]` service-centre timestamp.
    pub timestamp: String,
    /// Raw User Data Header, without its length octet.
    pub udh: Vec<u8>,
    /// User data in the alphabet's unpacked form: one septet per byte for
    /// GSM-7, wire bytes for 8-bit, big-endian pairs for UCS-2.
    pub user_data: Vec<u8>,
    /// TP-MR, assigned by the owning message box for outgoing messages.
    pub message_ref: u8,
    /// SIM storage slot this PDU was fetched from, for deletion bookkeeping.
    pub slot: Option<usize>,
}

impl Sms {
    pub fn new() -> Self {
        Sms {
            smsc: String::new(),
            received: false,
            sender: String::new(),
            recipient: String::new(),
            protocol_id: 0,
            alphabet: Alphabet::Gsm7,
            message_class: None,
            timestamp: String::new(),
            udh: Vec::new(),
            user_data: Vec::new(),
            message_ref: 0,
            slot: None,
        }
    }

    /// Size of the encoded TP-UD field in octets; anything above
    /// [`MAX_UD_OCTETS`] forces a multi-part encoding.
    pub fn encoded_size(&self) -> usize {
        user_data::encoded_size(&self.udh, &self.user_data, self.alphabet)
    }

    /// Encode to wire form: one PDU when the user data fits the 140-octet
    /// budget, concatenated parts otherwise.
    pub fn encode(&self) -> Result<Encoded, EncodeErr> {
        if self.encoded_size() > MAX_UD_OCTETS {
            Ok(Encoded::Parts(concat::split_into_parts(self)))
        } else {
            Ok(Encoded::Single(self.to_pdu()?))
        }
    }

    fn dcs_byte(&self) -> u8 {
        let class = self.message_class.map(|c| 0x10 | (c & 0x03)).unwrap_or(0);
        class | (self.alphabet.to_raw() << 2)
    }

    /// Assemble this message as a single PDU. The caller is responsible for
    /// the size budget; [`Sms::encode`] handles splitting.
    pub fn to_pdu(&self) -> Result<Vec<u8>, EncodeErr> {
        let stamp = timestamp::encode_timestamp(&self.timestamp)?;

        let mut pdu = Vec::with_capacity(16 + self.encoded_size());

        // SMSC block carries an octet count, unlike the TP address below
        let mut sca = address::encode_address(&self.smsc);
        if sca.len() > 1 {
            sca[0] = (sca.len() - 1) as u8;
        }
        pdu.extend_from_slice(&sca);

        let mut pdutyp: u8 = if self.received { 0x00 } else { 0x01 };
        if !stamp.is_empty() {
            pdutyp |= 0x10;
            if stamp.len() == 7 {
                pdutyp |= 0x08; // absolute format
            }
        }
        if !self.udh.is_empty() {
            pdutyp |= 0x40;
        }
        pdu.push(pdutyp);

        // TP-MR, SUBMIT only
        if !self.received {
            pdu.push(self.message_ref);
        }

        let addr = if self.received { &self.sender } else { &self.recipient };
        pdu.extend_from_slice(&address::encode_address(addr));

        pdu.push(self.protocol_id);
        pdu.push(self.dcs_byte());
        pdu.extend_from_slice(&stamp);
        user_data::write_user_data(&mut pdu, &self.udh, &self.user_data, self.alphabet);
        Ok(pdu)
    }

    /// Parse a raw PDU back into a message. Truncated or inconsistent
    /// buffers fail; nothing is ever read past the end of `pdu`.
    pub fn parse_pdu(pdu: &[u8]) -> Result<Sms, PduParseErr> {
        let mut r = OctetReader::new(pdu);

        let scalen = r.read_u8("smsc_length")? as usize;
        let smsc = if scalen > 0 {
            let block = r.read_slice(scalen, "smsc_address")?;
            address::decode_address(block, 2 * (scalen - 1))?
        } else {
            String::new()
        };

        let pdutyp = r.read_u8("pdu_type")?;
        let received = pdutyp & 0x03 == 0;

        // TP-MR, SUBMIT only
        let message_ref = if received { 0 } else { r.read_u8("message_reference")? };

        // a zero-length address is just its length octet, mirroring the
        // encoder; no type-of-address follows
        let ndigits = r.read_u8("address_length")? as usize;
        let addr = if ndigits > 0 {
            let block = r.read_slice(1 + ndigits.div_ceil(2), "address")?;
            address::decode_address(block, ndigits)?
        } else {
            String::new()
        };

        let protocol_id = r.read_u8("protocol_id")?;
        let dcs = r.read_u8("data_coding_scheme")?;
        let alphabet = Alphabet::from_raw((dcs >> 2) & 0x03)?;
        let message_class = if dcs & 0x10 != 0 { Some(dcs & 0x03) } else { None };

        let tslen = if pdutyp & 0x10 != 0 {
            if pdutyp & 0x08 != 0 { 7 } else { 1 }
        } else {
            0
        };
        let stamp = if tslen > 0 {
            timestamp::decode_timestamp(r.read_slice(tslen, "timestamp")?)
        } else {
            String::new()
        };

        let udl = r.read_u8("user_data_length")?;
        let (udh, user_data) = user_data::read_user_data(&mut r, udl, pdutyp & 0x40 != 0, alphabet)?;

        Ok(Sms {
            smsc,
            received,
            sender: if received { addr.clone() } else { String::new() },
            recipient: if received { String::new() } else { addr },
            protocol_id,
            alphabet,
            message_class,
            timestamp: stamp,
            udh,
            user_data,
            message_ref,
            slot: None,
        })
    }

    /// Concatenation info carried in this message's UDH, if any.
    pub fn concat_info(&self) -> Option<ConcatInfo> {
        concat::concat_info(self)
    }

    /// Decode the user data as text according to the alphabet.
    pub fn text(&self) -> String {
        match self.alphabet {
            Alphabet::Gsm7 => gsm7::gsm7_to_unicode(&self.user_data),
            // 8-bit payloads read as ISO-8859-1
            Alphabet::EightBit => self.user_data.iter().map(|&b| char::from(b)).collect(),
            Alphabet::Ucs2 => self
                .user_data
                .chunks_exact(2)
                .map(|pair| {
                    let code = u16::from_be_bytes([pair[0], pair[1]]);
                    char::from_u32(code as u32).unwrap_or('?')
                })
                .collect(),
        }
    }

    /// Append text, transparently falling back from GSM-7 to UCS-2 for the
    /// whole message when a character fits neither alphabet table (a single
    /// PDU never mixes alphabets).
    pub fn append_text(&mut self, text: &str) {
        match self.alphabet {
            Alphabet::Gsm7 => match gsm7::unicode_to_gsm7(text) {
                Ok(mut septets) => self.user_data.append(&mut septets),
                Err(_) => {
                    let existing = gsm7::gsm7_to_unicode(&self.user_data);
                    self.alphabet = Alphabet::Ucs2;
                    self.user_data.clear();
                    self.push_ucs2(&existing);
                    self.push_ucs2(text);
                }
            },
            Alphabet::EightBit => {
                for ch in text.chars() {
                    let b = if (ch as u32) < 0x100 { ch as u8 } else { b'?' };
                    self.user_data.push(b);
                }
            }
            Alphabet::Ucs2 => self.push_ucs2(text),
        }
    }

    /// Append raw Unicode code points (invalid scalars become '?').
    pub fn append_unicode(&mut self, codepoints: &[u32]) {
        let text: String = codepoints
            .iter()
            .map(|&c| char::from_u32(c).unwrap_or('?'))
            .collect();
        self.append_text(&text);
    }

    fn push_ucs2(&mut self, text: &str) {
        for ch in text.chars() {
            let code = ch as u32;
            let unit = if code <= 0xFFFF { code as u16 } else { 0x003F }; // '?'
            self.user_data.extend_from_slice(&unit.to_be_bytes());
        }
    }

    /// Snapshot view for UIs and logs.
    pub fn summary(&self) -> SmsSummary {
        let ci = self.concat_info();
        SmsSummary {
            slot: self.slot,
            received: self.received,
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            timestamp: self.timestamp.clone(),
            text: self.text(),
            part_index: ci.as_ref().map(|c| c.index),
            part_count: ci.as_ref().map(|c| c.count),
        }
    }
}

impl Default for Sms {
    fn default() -> Self {
        Sms::new()
    }
}

/// Wire form of a message: exactly one of the two variants is authoritative,
/// decided by the 140-octet user-data budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Single(Vec<u8>),
    Parts(Vec<Sms>),
}

/// Serializable snapshot of a message.
#[derive(Debug, Clone, Serialize)]
pub struct SmsSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,
    pub received: bool,
    pub sender: String,
    pub recipient: String,
    pub timestamp: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_index: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_count: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outgoing(text: &str) -> Sms {
        let mut sms = Sms::new();
        sms.recipient = "+15551234567".to_string();
        sms.message_ref = 42;
        sms.append_text(text);
        sms
    }

    #[test]
    fn submit_roundtrip() {
        let mut sms = outgoing("Hello");
        sms.smsc = "+15550009999".to_string();
        sms.protocol_id = 0;
        sms.message_class = Some(1);
        sms.timestamp = "+43200".to_string();

        let pdu = sms.to_pdu().unwrap();
        let back = Sms::parse_pdu(&pdu).unwrap();
        assert!(!back.received);
        assert_eq!(back.smsc, sms.smsc);
        assert_eq!(back.recipient, sms.recipient);
        assert_eq!(back.message_ref, 42);
        assert_eq!(back.message_class, Some(1));
        assert_eq!(back.alphabet, Alphabet::Gsm7);
        assert_eq!(back.timestamp, "+43200");
        assert_eq!(back.user_data, sms.user_data);
        assert_eq!(back.text(), "Hello");
    }

    #[test]
    fn deliver_roundtrip_with_absolute_timestamp() {
        let mut sms = Sms::new();
        sms.received = true;
        sms.sender = "+4915123456789".to_string();
        sms.timestamp = "2026-08-06 14:30:00+02:00".to_string();
        sms.append_text("Ping");

        let pdu = sms.to_pdu().unwrap();
        let back = Sms::parse_pdu(&pdu).unwrap();
        assert!(back.received);
        assert_eq!(back.sender, sms.sender);
        assert_eq!(back.timestamp, sms.timestamp);
        assert_eq!(back.text(), "Ping");
    }

    #[test]
    fn ucs2_fallback_converts_existing_data() {
        let mut sms = outgoing("Hi ");
        assert_eq!(sms.alphabet, Alphabet::Gsm7);
        sms.append_text("→ done");
        assert_eq!(sms.alphabet, Alphabet::Ucs2);
        assert_eq!(sms.text(), "Hi → done");

        let pdu = sms.to_pdu().unwrap();
        let back = Sms::parse_pdu(&pdu).unwrap();
        assert_eq!(back.alphabet, Alphabet::Ucs2);
        assert_eq!(back.text(), "Hi → done");
    }

    #[test]
    fn eight_bit_payload_roundtrip() {
        let mut sms = Sms::new();
        sms.recipient = "112".to_string();
        sms.alphabet = Alphabet::EightBit;
        sms.user_data = vec![0x00, 0xFF, 0x7F, 0x80];

        let back = Sms::parse_pdu(&sms.to_pdu().unwrap()).unwrap();
        assert_eq!(back.alphabet, Alphabet::EightBit);
        assert_eq!(back.user_data, sms.user_data);
    }

    #[test]
    fn empty_smsc_consumes_single_length_byte() {
        let sms = outgoing("x");
        let pdu = sms.to_pdu().unwrap();
        assert_eq!(pdu[0], 0);
        // pdu type follows directly
        assert_eq!(pdu[1], 0x01);
        let back = Sms::parse_pdu(&pdu).unwrap();
        assert_eq!(back.smsc, "");
    }

    #[test]
    fn boundary_single_vs_parts() {
        // exactly 140 encoded octets stays a single PDU (160 septets)
        let mut sms = outgoing(&"a".repeat(160));
        assert_eq!(sms.encoded_size(), 140);
        assert!(matches!(sms.encode().unwrap(), Encoded::Single(_)));

        // one more character tips it into exactly two parts
        sms.append_text("a");
        match sms.encode().unwrap() {
            Encoded::Parts(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected parts, got {:?}", other),
        }
    }

    #[test]
    fn truncated_pdu_is_rejected() {
        let pdu = outgoing("Hello world").to_pdu().unwrap();
        for cut in 1..pdu.len() {
            assert!(Sms::parse_pdu(&pdu[..cut]).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn reserved_alphabet_is_rejected() {
        // minimal submit with DCS alphabet bits set to the reserved value 3
        let pdu = [0x00, 0x01, 0x01, 0x00, 0x00, 0x0C, 0x00];
        assert_eq!(
            Sms::parse_pdu(&pdu),
            Err(PduParseErr::BadFieldValue {
                field: "data_coding_scheme",
                value: 3
            })
        );
    }

    #[test]
    fn summary_carries_concat_position() {
        let sms = outgoing(&"b".repeat(200));
        let parts = match sms.encode().unwrap() {
            Encoded::Parts(p) => p,
            _ => panic!("expected parts"),
        };
        let s = parts[1].summary();
        assert_eq!(s.part_index, Some(2));
        assert_eq!(s.part_count, Some(2));
        assert!(!s.received);
    }
}
