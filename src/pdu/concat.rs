//! Concatenated SMS: splitting oversized messages into parts and
//! reassembling complete sets.
//!
//! Parts are linked by an Information Element in the UDH — IEI 0x00 with an
//! 8-bit reference (the form this crate emits) or IEI 0x08 with a 16-bit
//! reference — carrying (reference, total parts, 1-based index).

use crate::common::errors::EncodeErr;
use crate::pdu::sms::{Alphabet, Sms};
use crate::pdu::user_data::MAX_UD_OCTETS;

/// Octets of the concatenation IE this crate emits: IEI, IEDL, ref, total,
/// index.
const CONCAT_UDH_LEN: usize = 5;

/// Position of one PDU within a concatenated set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatInfo {
    /// Aggregation key: parts sharing it belong to the same logical message.
    pub signature: String,
    /// 1-based position within the set.
    pub index: u8,
    /// Total number of parts the set declares.
    pub count: u8,
}

/// Scan a message's UDH for a concatenation IE. Unrecognized IEs are skipped
/// by their declared length; a message without one is not part of any set.
pub fn concat_info(sms: &Sms) -> Option<ConcatInfo> {
    let udh = &sms.udh;
    let mut i = 0;
    while i + 1 < udh.len() {
        let iei = udh[i];
        let ielen = udh[i + 1] as usize;
        i += 2;
        if i + ielen > udh.len() {
            return None;
        }
        match (iei, ielen) {
            (0x00, 3) => {
                return Some(ConcatInfo {
                    signature: format!(
                        "{}-{}-{:02x}-{:02x}",
                        sms.sender, sms.recipient, sms.message_ref, udh[i]
                    ),
                    count: udh[i + 1],
                    index: udh[i + 2],
                });
            }
            (0x08, 4) => {
                let subref = u16::from_be_bytes([udh[i], udh[i + 1]]);
                return Some(ConcatInfo {
                    signature: format!(
                        "{}-{}-{:02x}-{:04x}",
                        sms.sender, sms.recipient, sms.message_ref, subref
                    ),
                    count: udh[i + 2],
                    index: udh[i + 3],
                });
            }
            _ => i += ielen,
        }
    }
    None
}

/// Remove the concatenation IE from a UDH, keeping everything else.
fn strip_concat_ie(udh: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(udh.len());
    let mut i = 0;
    while i + 1 < udh.len() {
        let iei = udh[i];
        let ielen = udh[i + 1] as usize;
        if i + 2 + ielen > udh.len() {
            break;
        }
        if !matches!((iei, ielen), (0x00, 3) | (0x08, 4)) {
            out.extend_from_slice(&udh[i..i + 2 + ielen]);
        }
        i += 2 + ielen;
    }
    out
}

/// Split an oversized message into parts, each carrying a concatenation IE
/// ahead of any pre-existing UDH and a contiguous slice of the user data.
/// All other header fields are copied verbatim.
pub fn split_into_parts(sms: &Sms) -> Vec<Sms> {
    let udh_len = sms.udh.len();
    let mut mss = MAX_UD_OCTETS - 1 - CONCAT_UDH_LEN - udh_len;
    if sms.alphabet == Alphabet::Gsm7 {
        // septets per part, accounting for the UDH septet-boundary padding
        mss = (mss * 8 - 6) / 7;
    }
    let total = sms.user_data.len().div_ceil(mss);
    tracing::debug!(
        "splitting {} user-data units into {} parts (mss={})",
        sms.user_data.len(),
        total,
        mss
    );

    let mut parts = Vec::with_capacity(total);
    for (i, chunk) in sms.user_data.chunks(mss).enumerate() {
        let mut udh = Vec::with_capacity(CONCAT_UDH_LEN + udh_len);
        udh.extend_from_slice(&[0x00, 0x03, sms.message_ref, total as u8, (i + 1) as u8]);
        udh.extend_from_slice(&sms.udh);

        let mut part = sms.clone();
        part.udh = udh;
        part.user_data = chunk.to_vec();
        parts.push(part);
    }
    parts
}

/// Rebuild a logical message from a complete set of sibling parts.
///
/// The part count must equal the count the set declares, every part must
/// carry the same signature, and each index may appear only once (a
/// duplicate index means the SIM holds an inconsistent set). Header fields
/// come from the lowest-index part; user data is concatenated in index
/// order.
pub fn reassemble(parts: &[Sms]) -> Result<Sms, EncodeErr> {
    let mut infos = Vec::with_capacity(parts.len());
    for part in parts {
        // a part without a concat IE cannot be a sibling of anything
        let info = part.concat_info().ok_or(EncodeErr::SignatureMismatch)?;
        infos.push(info);
    }
    let first = infos.first().ok_or(EncodeErr::PartMismatch {
        expected: 1,
        found: 0,
    })?;
    if infos.iter().any(|i| i.signature != first.signature) {
        return Err(EncodeErr::SignatureMismatch);
    }
    if parts.len() != first.count as usize {
        return Err(EncodeErr::PartMismatch {
            expected: first.count as usize,
            found: parts.len(),
        });
    }

    let mut ordered: Vec<(u8, &Sms)> = infos
        .iter()
        .zip(parts)
        .map(|(info, part)| (info.index, part))
        .collect();
    ordered.sort_by_key(|&(index, _)| index);
    for pair in ordered.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(EncodeErr::DuplicatePartIndex { index: pair[0].0 });
        }
    }

    let mut merged = ordered[0].1.clone();
    merged.udh = strip_concat_ie(&merged.udh);
    merged.user_data = ordered
        .iter()
        .flat_map(|&(_, part)| part.user_data.iter().copied())
        .collect();
    merged.slot = None;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big_message(len: usize) -> Sms {
        let mut sms = Sms::new();
        sms.recipient = "+15551234567".to_string();
        sms.message_ref = 7;
        sms.append_text(&"x".repeat(len));
        sms
    }

    #[test]
    fn split_reassemble_is_identity() {
        let sms = big_message(400);
        let parts = split_into_parts(&sms);
        // 152 septets per part once the concat IE is in place
        assert_eq!(parts.len(), 3);
        for (i, part) in parts.iter().enumerate() {
            let info = part.concat_info().unwrap();
            assert_eq!(info.index as usize, i + 1);
            assert_eq!(info.count, 3);
            assert!(part.encoded_size() <= MAX_UD_OCTETS);
        }
        let merged = reassemble(&parts).unwrap();
        assert_eq!(merged.user_data, sms.user_data);
        assert_eq!(merged.recipient, sms.recipient);
        assert!(merged.udh.is_empty());
    }

    #[test]
    fn parts_survive_pdu_roundtrip() {
        let sms = big_message(300);
        let parts = split_into_parts(&sms);
        let reparsed: Vec<Sms> = parts
            .iter()
            .map(|p| Sms::parse_pdu(&p.to_pdu().unwrap()).unwrap())
            .collect();
        let merged = reassemble(&reparsed).unwrap();
        assert_eq!(merged.user_data, sms.user_data);
    }

    #[test]
    fn reassembly_order_is_by_index_not_input() {
        let sms = big_message(320);
        let mut parts = split_into_parts(&sms);
        parts.reverse();
        let merged = reassemble(&parts).unwrap();
        assert_eq!(merged.user_data, sms.user_data);
    }

    #[test]
    fn incomplete_set_is_rejected() {
        let parts = split_into_parts(&big_message(400));
        let err = reassemble(&parts[..2]).unwrap_err();
        assert_eq!(err, EncodeErr::PartMismatch { expected: 3, found: 2 });
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let parts = split_into_parts(&big_message(320));
        let dup = vec![parts[0].clone(), parts[0].clone()];
        assert_eq!(
            reassemble(&dup).unwrap_err(),
            EncodeErr::DuplicatePartIndex { index: 1 }
        );
    }

    #[test]
    fn sixteen_bit_reference_form() {
        let mut sms = Sms::new();
        sms.sender = "+4912345".to_string();
        sms.udh = vec![0x08, 0x04, 0x01, 0x02, 0x03, 0x02];
        let info = sms.concat_info().unwrap();
        assert_eq!(info.count, 3);
        assert_eq!(info.index, 2);
        assert!(info.signature.ends_with("-0102"));
    }

    #[test]
    fn unknown_ies_are_skipped() {
        let mut sms = Sms::new();
        // port-addressing IE first, then an 8-bit concat IE
        sms.udh = vec![0x05, 0x04, 0x0B, 0x84, 0x0B, 0x84, 0x00, 0x03, 0x2A, 0x02, 0x01];
        let info = sms.concat_info().unwrap();
        assert_eq!(info.count, 2);
        assert_eq!(info.index, 1);

        // no concat IE at all
        sms.udh = vec![0x05, 0x04, 0x0B, 0x84, 0x0B, 0x84];
        assert!(sms.concat_info().is_none());
    }

    #[test]
    fn existing_udh_is_preserved_through_split() {
        let mut sms = big_message(400);
        sms.udh = vec![0x05, 0x04, 0x0B, 0x84, 0x0B, 0x84];
        let parts = split_into_parts(&sms);
        for part in &parts {
            assert_eq!(&part.udh[..5], &[0x00, 0x03, 0x07, parts.len() as u8, part.concat_info().unwrap().index]);
            assert_eq!(&part.udh[5..], &sms.udh[..]);
            assert!(part.encoded_size() <= MAX_UD_OCTETS);
        }
        let merged = reassemble(&parts).unwrap();
        assert_eq!(merged.udh, sms.udh);
        assert_eq!(merged.user_data, sms.user_data);
    }
}
