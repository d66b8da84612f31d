//! TP-User-Data encoding.
//!
//! Covers the UDL length conventions (septets for the 7-bit alphabet, octets
//! otherwise), the optional User Data Header, and the packed 7-bit bitstream
//! whose first fractional septet is absorbed by UDH padding bits.

use crate::common::errors::PduParseErr;
use crate::common::octets::OctetReader;
use crate::pdu::sms::Alphabet;

/// Hard TP-UD budget of a single PDU, in octets. Anything larger must be
/// split into concatenated parts.
pub const MAX_UD_OCTETS: usize = 140;

/// Septets occupied by the UDH length octet plus the UDH itself, rounded up
/// to the next septet boundary.
pub(crate) fn udh_septets(udh_len: usize) -> usize {
    (8 + 8 * udh_len + 6) / 7
}

/// Fill bits between the end of the UDH and the first user-data septet.
pub(crate) fn udh_fill_bits(udh_len: usize) -> usize {
    7 * udh_septets(udh_len) - 8 - 8 * udh_len
}

/// Size of the encoded TP-UD field in octets, excluding the UDL octet.
pub fn encoded_size(udh: &[u8], data: &[u8], alphabet: Alphabet) -> usize {
    match alphabet {
        Alphabet::Gsm7 => {
            let mut septets = data.len();
            if !udh.is_empty() {
                septets += udh_septets(udh.len());
            }
            (septets * 7 + 7) / 8
        }
        _ => {
            if udh.is_empty() {
                data.len()
            } else {
                1 + udh.len() + data.len()
            }
        }
    }
}

/// Append UDL, optional UDH, and the payload to `out`.
///
/// `data` is the alphabet's unpacked form: one septet per byte for GSM-7,
/// wire bytes for 8-bit and UCS-2.
pub fn write_user_data(out: &mut Vec<u8>, udh: &[u8], data: &[u8], alphabet: Alphabet) {
    let udl = match alphabet {
        Alphabet::Gsm7 => data.len() + if udh.is_empty() { 0 } else { udh_septets(udh.len()) },
        _ => data.len() + if udh.is_empty() { 0 } else { 1 + udh.len() },
    };
    out.push(udl as u8);
    if !udh.is_empty() {
        out.push(udh.len() as u8);
        out.extend_from_slice(udh);
    }
    match alphabet {
        Alphabet::Gsm7 => {
            let fill = if udh.is_empty() { 0 } else { udh_fill_bits(udh.len()) };
            pack_septets(out, data, fill);
        }
        _ => out.extend_from_slice(data),
    }
}

/// Inverse of [`write_user_data`], minus the UDL octet (already consumed by
/// the PDU parser) and given the PDU-type UDHI flag. Returns `(udh, data)`.
pub fn read_user_data(
    r: &mut OctetReader<'_>,
    udl: u8,
    udh_present: bool,
    alphabet: Alphabet,
) -> Result<(Vec<u8>, Vec<u8>), PduParseErr> {
    let mut udh = Vec::new();
    if udh_present {
        let udhl = r.read_u8("udh_length")? as usize;
        udh = r.read_slice(udhl, "udh")?.to_vec();
    }

    let data = match alphabet {
        Alphabet::Gsm7 => {
            let head = if udh.is_empty() { 0 } else { udh_septets(udh.len()) };
            let count = (udl as usize)
                .checked_sub(head)
                .ok_or(PduParseErr::InconsistentLength {
                    expected: head,
                    found: udl as usize,
                })?;
            let fill = if udh.is_empty() { 0 } else { udh_fill_bits(udh.len()) };
            unpack_septets(r, fill, count)?
        }
        _ => {
            let head = if udh.is_empty() { 0 } else { 1 + udh.len() };
            let count = (udl as usize)
                .checked_sub(head)
                .ok_or(PduParseErr::InconsistentLength {
                    expected: head,
                    found: udl as usize,
                })?;
            r.read_slice(count, "user_data")?.to_vec()
        }
    };
    Ok((udh, data))
}

/// Pack septets into a continuous 7-bit bitstream, the low `fill_bits` bits
/// of the first emitted octet left as padding.
pub(crate) fn pack_septets(out: &mut Vec<u8>, septets: &[u8], fill_bits: usize) {
    let mut nbits = fill_bits as u32;
    let mut carry: u8 = 0;
    for &s in septets {
        let s = s & 0x7F;
        if nbits == 0 {
            carry = s;
            nbits = 7;
        } else {
            out.push(carry | (s << nbits));
            carry = s >> (8 - nbits);
            nbits -= 1;
        }
    }
    if nbits > 0 {
        out.push(carry);
    }
}

/// Unpack `count` septets from the reader, skipping `fill_bits` padding bits
/// at the start of the first octet.
pub(crate) fn unpack_septets(
    r: &mut OctetReader<'_>,
    fill_bits: usize,
    count: usize,
) -> Result<Vec<u8>, PduParseErr> {
    let mut out = Vec::with_capacity(count);
    let mut nbits: u32 = 0;
    let mut carry: u8 = 0;
    if fill_bits > 0 && count > 0 {
        let b = r.read_u8("user_data")?;
        carry = b >> fill_bits;
        nbits = 8 - fill_bits as u32;
    }
    for _ in 0..count {
        if nbits == 7 {
            out.push(carry);
            carry = 0;
            nbits = 0;
        } else {
            let b = r.read_u8("user_data")?;
            out.push((carry | (b << nbits)) & 0x7F);
            carry = b >> (7 - nbits);
            nbits += 1;
        }
    }
    Ok(out)
}
