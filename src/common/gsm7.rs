//! GSM 03.38 default alphabet transcoding.
//!
//! Maps between the 7-bit default alphabet (clause 6.2.1, including the
//! two-byte escape mechanism of table 6.2.1.1) and Unicode. This module only
//! deals with *unpacked* septets (one 7-bit code per byte); the bit-level
//! packing lives with the user-data codec.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::common::errors::EncodeErr;

/// Default alphabet, code 0x00..0x7F. Position 0x1B is the escape code and
/// never decodes through this table.
const GSM7_TO_UNICODE: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', //
    'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', //
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', //
    'Σ', 'Θ', 'Ξ', '\u{1b}', 'Æ', 'æ', 'ß', 'É', //
    ' ', '!', '"', '#', '¤', '%', '&', '\'', //
    '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', //
    '8', '9', ':', ';', '<', '=', '>', '?', //
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', //
    'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', //
    'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', //
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', //
    'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', //
    'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à', //
];

/// Escape table: (code following 0x1B, character).
const GSM7_EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{0c}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

enum Gsm7Code {
    Single(u8),
    Escaped(u8),
}

/// Reverse lookup, built once on first use. The table never changes after
/// construction.
static REVERSE: Lazy<HashMap<char, Gsm7Code>> = Lazy::new(|| {
    let mut m = HashMap::with_capacity(GSM7_TO_UNICODE.len() + GSM7_EXTENSION.len());
    for (code, &ch) in GSM7_TO_UNICODE.iter().enumerate() {
        if code == 0x1B {
            continue;
        }
        m.insert(ch, Gsm7Code::Single(code as u8));
    }
    for &(code, ch) in GSM7_EXTENSION.iter() {
        m.insert(ch, Gsm7Code::Escaped(code));
    }
    m
});

fn extension_char(code: u8) -> Option<char> {
    GSM7_EXTENSION
        .iter()
        .find(|&&(c, _)| c == code)
        .map(|&(_, ch)| ch)
}

/// Decode unpacked GSM 7-bit codes to text.
///
/// An escape byte with an unrecognized follower, or dangling at the end of
/// the buffer, decodes to nothing (the follower, if any, is still consumed).
pub fn gsm7_to_unicode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let code = data[i];
        if code == 0x1B {
            if let Some(&next) = data.get(i + 1) {
                if let Some(ch) = extension_char(next) {
                    out.push(ch);
                }
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        out.push(GSM7_TO_UNICODE[(code & 0x7F) as usize]);
        i += 1;
    }
    out
}

/// Encode text as unpacked GSM 7-bit codes.
///
/// Fails on the first character found in neither table; a single such
/// character makes the whole string unencodable (there is no mixed-alphabet
/// PDU), so callers fall back to UCS-2 for the entire message.
pub fn unicode_to_gsm7(text: &str) -> Result<Vec<u8>, EncodeErr> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match REVERSE.get(&ch) {
            Some(Gsm7Code::Single(code)) => out.push(*code),
            Some(Gsm7Code::Escaped(code)) => {
                out.push(0x1B);
                out.push(*code);
            }
            None => return Err(EncodeErr::NotEncodable { ch }),
        }
    }
    Ok(out)
}

pub fn is_gsm7_encodable(text: &str) -> bool {
    text.chars().all(|ch| REVERSE.contains_key(&ch))
}

/// Decode unpacked GSM 7-bit codes straight to ISO-8859-1 bytes. Characters
/// outside Latin-1 (the Greek block, '€') come out as '?'.
pub fn gsm7_to_latin1(data: &[u8]) -> Vec<u8> {
    gsm7_to_unicode(data)
        .chars()
        .map(|ch| if (ch as u32) < 0x100 { ch as u8 } else { b'?' })
        .collect()
}
