//! Address fields per 3GPP TS 23.040 clause 9.1.2.5.
//!
//! Phone numbers travel as semi-octet-swapped BCD nibbles behind a
//! type-of-address octet; alphanumeric originators (bank names and the like)
//! are packed GSM 7-bit instead.

use crate::common::errors::PduParseErr;
use crate::common::gsm7;
use crate::common::octets::OctetReader;
use crate::pdu::user_data;

/// Type-of-address bits 4-6: 001 international, 101 alphanumeric.
const TOA_MASK: u8 = 0x70;
const TOA_INTERNATIONAL: u8 = 0x10;
const TOA_ALPHANUMERIC: u8 = 0x50;

/// Encode a phone number as a digit-count-prefixed address block.
///
/// Empty input yields a single zero length indicator and nothing else.
/// Non-digit characters are skipped; a leading `+` selects the
/// international type-of-address (0x91), anything else 0x81. An odd digit
/// count is right-padded with nibble 0xF.
pub fn encode_address(addr: &str) -> Vec<u8> {
    let digits: Vec<u8> = addr
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as u8)
        .collect();
    if digits.is_empty() {
        return vec![0];
    }

    let toa = if addr.starts_with('+') { 0x91 } else { 0x81 };
    let mut out = Vec::with_capacity(2 + digits.len().div_ceil(2));
    out.push(digits.len() as u8);
    out.push(toa);
    for pair in digits.chunks(2) {
        let lo = pair[0];
        let hi = if pair.len() == 2 { pair[1] } else { 0x0F };
        out.push((hi << 4) | lo);
    }
    out
}

/// Decode an address block (type-of-address octet followed by payload).
///
/// `ndigits` counts semi-octets; for SMSC blocks, which carry an octet count
/// instead, pass `2 * (octets - 1)` and any trailing pad nibble is stripped.
pub fn decode_address(block: &[u8], ndigits: usize) -> Result<String, PduParseErr> {
    if ndigits == 0 {
        return Ok(String::new());
    }
    if block.is_empty() {
        return Err(PduParseErr::BufferEnded { field: "type_of_address" });
    }
    let toa = block[0];

    if toa & TOA_MASK == TOA_ALPHANUMERIC {
        // packed GSM 7-bit: 4*ndigits bits hold 4*ndigits/7 septets
        let nchars = 4 * ndigits / 7;
        let mut r = OctetReader::new(&block[1..]);
        let septets = user_data::unpack_septets(&mut r, 0, nchars)?;
        return Ok(gsm7::gsm7_to_unicode(&septets));
    }

    if block.len() < 1 + ndigits.div_ceil(2) {
        return Err(PduParseErr::BufferEnded { field: "address" });
    }
    let mut out = String::with_capacity(ndigits + 1);
    if toa & TOA_MASK == TOA_INTERNATIONAL {
        out.push('+');
    }
    for i in 0..ndigits {
        let byte = block[1 + i / 2];
        let nibble = if i % 2 == 0 { byte & 0x0F } else { byte >> 4 };
        out.push(char::from_digit(nibble as u32, 16).unwrap_or('?'));
    }
    // pad nibble from an even-rounded semi-octet count
    if out.ends_with('f') {
        out.pop();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn international_number_bcd_layout() {
        // 11 digits: semi-octet swapped pairs, 0xF pad in the last octet
        let enc = encode_address("+15551234567");
        assert_eq!(enc, vec![0x0B, 0x91, 0x51, 0x55, 0x21, 0x43, 0x65, 0xF7]);
        assert_eq!(decode_address(&enc[1..], enc[0] as usize).unwrap(), "+15551234567");
    }

    #[test]
    fn roundtrip_with_and_without_plus() {
        for num in ["+33612345678", "0612345678", "112", "+4915123456789"] {
            let enc = encode_address(num);
            let dec = decode_address(&enc[1..], enc[0] as usize).unwrap();
            assert_eq!(dec, num);
        }
    }

    #[test]
    fn empty_address_is_one_zero_byte() {
        assert_eq!(encode_address(""), vec![0]);
        assert_eq!(decode_address(&[], 0).unwrap(), "");
    }

    #[test]
    fn smsc_style_even_count_strips_pad() {
        // "123" encoded, then decoded with the SMSC convention (2 * octets)
        let enc = encode_address("123");
        assert_eq!(enc, vec![0x03, 0x81, 0x21, 0xF3]);
        assert_eq!(decode_address(&enc[1..], 4).unwrap(), "123");
    }

    #[test]
    fn alphanumeric_sender_decodes_via_gsm7() {
        // "INFO" as packed septets behind an alphanumeric type-of-address
        let septets = crate::common::gsm7::unicode_to_gsm7("INFO").unwrap();
        let mut packed = Vec::new();
        user_data::pack_septets(&mut packed, &septets, 0);
        let mut block = vec![0xD0];
        block.extend_from_slice(&packed);
        // 4 septets = 28 bits = 7 semi-octets
        assert_eq!(decode_address(&block, 7).unwrap(), "INFO");
    }

    #[test]
    fn truncated_address_is_an_error() {
        assert_eq!(
            decode_address(&[0x91, 0x21], 4),
            Err(PduParseErr::BufferEnded { field: "address" })
        );
    }
}
