//! SIM message-box reconciliation.
//!
//! The device exposes its storage as a bitmap of occupied slots plus a
//! per-slot PDU fetch (`sms.json?pos=<slot>&len=1`, a JSON array of hex
//! strings). [`MessageBox::check_new_messages`] diffs a freshly read bitmap
//! against the last one, fetches only the newly occupied slots, and derives
//! the logical message list by grouping concatenated parts.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;

use crate::common::errors::{EncodeErr, PduParseErr};
use crate::pdu::concat;
use crate::pdu::sms::{Encoded, Sms, SmsSummary};

/// The device-I/O collaborator. Both calls are synchronous and opaque; the
/// message box never inspects paths it did not build itself.
pub trait DeviceLink {
    fn download(&mut self, path: &str) -> io::Result<Vec<u8>>;
    fn upload(&mut self, path: &str, content: &[u8]) -> io::Result<()>;
}

#[derive(Debug)]
pub enum MsgBoxErr {
    /// Propagated from the device link; the reconciliation state is left
    /// untouched so a retry can resume cleanly.
    Io(io::Error),
    Pdu(PduParseErr),
    Encode(EncodeErr),
    /// The slot bitmap is not a hex string.
    BadBitmap,
    /// A slot fetch returned something other than a JSON array of hex PDUs.
    BadSlotData { slot: usize },
}

impl fmt::Display for MsgBoxErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgBoxErr::Io(e) => write!(f, "device i/o failed: {}", e),
            MsgBoxErr::Pdu(e) => write!(f, "stored PDU is invalid: {}", e),
            MsgBoxErr::Encode(e) => write!(f, "message cannot be encoded: {}", e),
            MsgBoxErr::BadBitmap => write!(f, "slot bitmap is not a hex string"),
            MsgBoxErr::BadSlotData { slot } => {
                write!(f, "slot {} returned malformed data", slot)
            }
        }
    }
}

impl std::error::Error for MsgBoxErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MsgBoxErr::Io(e) => Some(e),
            MsgBoxErr::Pdu(e) => Some(e),
            MsgBoxErr::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MsgBoxErr {
    fn from(e: io::Error) -> Self {
        MsgBoxErr::Io(e)
    }
}

impl From<PduParseErr> for MsgBoxErr {
    fn from(e: PduParseErr) -> Self {
        MsgBoxErr::Pdu(e)
    }
}

impl From<EncodeErr> for MsgBoxErr {
    fn from(e: EncodeErr) -> Self {
        MsgBoxErr::Encode(e)
    }
}

/// One message box on one device. Not internally synchronized: concurrent
/// reconciliation would race on the previous-bitmap comparison, so callers
/// serialize access per box.
pub struct MessageBox<L: DeviceLink> {
    link: L,
    /// Last bitmap we fully reconciled against; an identical string makes
    /// the next pass a no-op.
    prev_bitmap: String,
    /// PDUs still physically present on the SIM, keyed by slot.
    pdus: BTreeMap<usize, Sms>,
    /// Derived list: plain PDUs as-is, complete concatenated sets merged.
    messages: Vec<Sms>,
    next_ref: u8,
}

impl<L: DeviceLink> MessageBox<L> {
    pub fn new(link: L) -> Self {
        MessageBox {
            link,
            prev_bitmap: String::new(),
            pdus: BTreeMap::new(),
            messages: Vec::new(),
            next_ref: 0,
        }
    }

    /// Allocate the next TP-MR. Process-lifetime counter; seed it with
    /// [`MessageBox::set_next_message_reference`] if cross-restart
    /// uniqueness matters.
    pub fn next_message_reference(&mut self) -> u8 {
        self.next_ref = self.next_ref.wrapping_add(1);
        self.next_ref
    }

    pub fn set_next_message_reference(&mut self, seed: u8) {
        self.next_ref = seed;
    }

    /// Draft an empty outgoing message carrying a fresh TP-MR.
    pub fn new_message(&mut self, recipient: &str) -> Sms {
        let mut sms = Sms::new();
        sms.recipient = recipient.to_string();
        sms.message_ref = self.next_message_reference();
        sms
    }

    /// Draft an outgoing text message (GSM-7 with automatic UCS-2 fallback).
    pub fn new_text_message(&mut self, recipient: &str, text: &str) -> Sms {
        let mut sms = self.new_message(recipient);
        sms.append_text(text);
        sms
    }

    /// Raw PDUs currently on the SIM, in slot order.
    pub fn pdus(&self) -> impl Iterator<Item = &Sms> {
        self.pdus.values()
    }

    /// Logical messages: complete concatenated sets merged, everything else
    /// as-is. Incomplete sets are withheld until their missing parts arrive.
    pub fn messages(&self) -> &[Sms] {
        &self.messages
    }

    pub fn summaries(&self) -> Vec<SmsSummary> {
        self.messages.iter().map(Sms::summary).collect()
    }

    /// Reconcile against a freshly read occupied-slot bitmap (hex string,
    /// one bit per slot, LSB first within each octet).
    ///
    /// No-op when the bitmap is unchanged. Otherwise still-occupied slots
    /// keep their cached PDU, newly occupied slots are fetched, and cleared
    /// slots are dropped. The pass is all-or-nothing: any fetch failure
    /// leaves the previous bitmap and cache untouched.
    pub fn check_new_messages(&mut self, bitmap_hex: &str) -> Result<(), MsgBoxErr> {
        if bitmap_hex == self.prev_bitmap {
            tracing::debug!("slot bitmap unchanged, nothing to reconcile");
            return Ok(());
        }
        let bitmap = hex::decode(bitmap_hex).map_err(|_| MsgBoxErr::BadBitmap)?;

        let mut fresh: BTreeMap<usize, Sms> = BTreeMap::new();
        for slot in 0..bitmap.len() * 8 {
            if bitmap[slot >> 3] & (1 << (slot & 7)) == 0 {
                continue;
            }
            let sms = match self.pdus.get(&slot).cloned() {
                Some(cached) => cached,
                None => {
                    tracing::debug!("fetching new PDU from slot {}", slot);
                    self.fetch_pdu(slot)?
                }
            };
            fresh.insert(slot, sms);
        }

        // derive logical messages: group concatenated parts by signature,
        // in encounter order
        let mut logical: Vec<Sms> = Vec::new();
        let mut signatures: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Sms>> = HashMap::new();
        for sms in fresh.values() {
            match sms.concat_info() {
                None => logical.push(sms.clone()),
                Some(info) => {
                    if !groups.contains_key(&info.signature) {
                        signatures.push(info.signature.clone());
                    }
                    groups.entry(info.signature).or_default().push(sms.clone());
                }
            }
        }
        for sig in &signatures {
            let parts = &groups[sig];
            let declared = parts[0].concat_info().map(|i| i.count as usize).unwrap_or(0);
            if parts.len() != declared {
                tracing::debug!(
                    "concatenated set {} incomplete ({}/{} parts)",
                    sig,
                    parts.len(),
                    declared
                );
                continue;
            }
            match concat::reassemble(parts) {
                Ok(merged) => logical.push(merged),
                Err(e) => {
                    tracing::warn!("discarding inconsistent concatenated set {}: {}", sig, e);
                }
            }
        }

        self.prev_bitmap = bitmap_hex.to_string();
        self.pdus = fresh;
        self.messages = logical;
        tracing::info!(
            "message box reconciled: {} stored PDUs, {} logical messages",
            self.pdus.len(),
            self.messages.len()
        );
        Ok(())
    }

    fn fetch_pdu(&mut self, slot: usize) -> Result<Sms, MsgBoxErr> {
        let raw = self.link.download(&format!("sms.json?pos={}&len=1", slot))?;
        let entries: Vec<String> =
            serde_json::from_slice(&raw).map_err(|_| MsgBoxErr::BadSlotData { slot })?;
        let hexpdu = entries.first().ok_or(MsgBoxErr::BadSlotData { slot })?;
        let bytes = hex::decode(hexpdu).map_err(|_| MsgBoxErr::BadSlotData { slot })?;
        let mut sms = Sms::parse_pdu(&bytes)?;
        sms.slot = Some(slot);
        Ok(sms)
    }

    /// Send a message. Oversized messages go out as ordered concatenated
    /// parts; the first part failure aborts the rest (no partial delivery
    /// is attempted past it).
    pub fn send(&mut self, sms: &Sms) -> Result<(), MsgBoxErr> {
        match sms.encode()? {
            Encoded::Single(pdu) => {
                tracing::info!(
                    "sending message to {} ({} PDU bytes)",
                    sms.recipient,
                    pdu.len()
                );
                self.link.upload("sendSMS", &pdu)?;
            }
            Encoded::Parts(parts) => {
                tracing::info!(
                    "sending message to {} as {} concatenated parts",
                    sms.recipient,
                    parts.len()
                );
                for (i, part) in parts.iter().enumerate() {
                    let pdu = part.to_pdu()?;
                    if let Err(e) = self.link.upload("sendSMS", &pdu) {
                        tracing::warn!(
                            "aborting multi-part send at part {}/{}: {}",
                            i + 1,
                            parts.len(),
                            e
                        );
                        return Err(MsgBoxErr::Io(e));
                    }
                }
            }
        }
        Ok(())
    }

    /// Delete the stored message in `slot` on the device. The next
    /// reconciliation pass picks up the freed slot through the bitmap.
    pub fn clear_slot(&mut self, slot: usize) -> Result<(), MsgBoxErr> {
        tracing::info!("clearing SIM slot {}", slot);
        self.link.upload("cmd.txt", format!("DS{}", slot).as_bytes())?;
        Ok(())
    }
}
