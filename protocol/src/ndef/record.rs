//! NDEF message and record framing.
//!
//! ## Record Layout
//!
//! ```text
//! ┌────┬────┬────┬────┬────┬─────┐
//! │ MB │ ME │ CF │ SR │ IL │ TNF │   header byte
//! ├────┴────┴────┴────┴────┴─────┤
//! │ TYPE LENGTH                   │   1 byte
//! │ PAYLOAD LENGTH                │   1 byte (SR) or 4 bytes big-endian
//! │ ID LENGTH                     │   1 byte, only when IL is set
//! │ TYPE                          │
//! │ ID                            │
//! │ PAYLOAD                       │
//! └───────────────────────────────┘
//! ```
//!
//! A text record (TNF well-known, type `T`) carries a status byte in front
//! of its payload: bit 7 selects UTF-16, bits 0-5 give the length of the
//! IANA language code that follows.

use super::error::NdefError;

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

const TEXT_RECORD_TYPE: &[u8] = b"T";
const TEXT_UTF16_FLAG: u8 = 0x80;
const TEXT_LANG_MASK: u8 = 0x3F;

// ---------------------------------------------------------------------------
// Type Name Format
// ---------------------------------------------------------------------------

/// The 3-bit Type Name Format field of a record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tnf {
    /// Empty record; type, id and payload are absent.
    Empty,
    /// NFC Forum well-known type (`T`, `U`, `Sp`, ...).
    WellKnown,
    /// RFC 2046 media type.
    MimeMedia,
    /// RFC 3986 absolute URI.
    AbsoluteUri,
    /// NFC Forum external type.
    External,
    /// Unknown payload type.
    Unknown,
    /// Continuation chunk of a chunked record.
    Unchanged,
    /// Reserved by the NFC Forum.
    Reserved,
}

impl Tnf {
    fn from_bits(bits: u8) -> Self {
        match bits & TNF_MASK {
            0x00 => Tnf::Empty,
            0x01 => Tnf::WellKnown,
            0x02 => Tnf::MimeMedia,
            0x03 => Tnf::AbsoluteUri,
            0x04 => Tnf::External,
            0x05 => Tnf::Unknown,
            0x06 => Tnf::Unchanged,
            _ => Tnf::Reserved,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Tnf::Empty => 0x00,
            Tnf::WellKnown => 0x01,
            Tnf::MimeMedia => 0x02,
            Tnf::AbsoluteUri => 0x03,
            Tnf::External => 0x04,
            Tnf::Unknown => 0x05,
            Tnf::Unchanged => 0x06,
            Tnf::Reserved => 0x07,
        }
    }
}

// ---------------------------------------------------------------------------
// NdefRecord
// ---------------------------------------------------------------------------

/// A single NDEF record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    /// Type name format.
    pub tnf: Tnf,
    /// Record type, interpreted according to `tnf`.
    pub record_type: Vec<u8>,
    /// Optional record id (empty when absent).
    pub id: Vec<u8>,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl NdefRecord {
    /// Build a well-known UTF-8 text record.
    ///
    /// # Errors
    ///
    /// Returns [`NdefError::EncodingFailure`] if the language code is empty
    /// or does not fit the 6-bit length field.
    pub fn text(text: &str, language: &str) -> Result<Self, NdefError> {
        let lang = language.as_bytes();
        if lang.is_empty() || lang.len() > TEXT_LANG_MASK as usize {
            return Err(NdefError::EncodingFailure(format!(
                "language code must be 1..=63 bytes, got {}",
                lang.len()
            )));
        }

        let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
        payload.push(lang.len() as u8);
        payload.extend_from_slice(lang);
        payload.extend_from_slice(text.as_bytes());

        Ok(Self {
            tnf: Tnf::WellKnown,
            record_type: TEXT_RECORD_TYPE.to_vec(),
            id: Vec::new(),
            payload,
        })
    }

    /// Returns `true` for a well-known `T` record.
    pub fn is_text(&self) -> bool {
        self.tnf == Tnf::WellKnown && self.record_type == TEXT_RECORD_TYPE
    }

    /// Language code of a text record.
    pub fn text_language(&self) -> Result<String, NdefError> {
        let (lang, _) = self.split_text_payload()?;
        String::from_utf8(lang.to_vec())
            .map_err(|_| NdefError::InvalidText("language code is not ASCII".to_string()))
    }

    /// Decode the body of a text record, honouring its UTF-8/UTF-16 flag.
    pub fn text_content(&self) -> Result<String, NdefError> {
        let (_, body) = self.split_text_payload()?;
        let utf16 = self.payload[0] & TEXT_UTF16_FLAG != 0;

        if utf16 {
            decode_utf16(body)
        } else {
            String::from_utf8(body.to_vec())
                .map_err(|e| NdefError::InvalidText(format!("invalid UTF-8: {}", e)))
        }
    }

    fn split_text_payload(&self) -> Result<(&[u8], &[u8]), NdefError> {
        if !self.is_text() {
            return Err(NdefError::NotText);
        }
        let status = *self
            .payload
            .first()
            .ok_or_else(|| NdefError::InvalidText("empty payload".to_string()))?;
        let lang_len = (status & TEXT_LANG_MASK) as usize;
        if 1 + lang_len > self.payload.len() {
            return Err(NdefError::InvalidText(format!(
                "language length {} overruns payload of {} bytes",
                lang_len,
                self.payload.len()
            )));
        }
        Ok((
            &self.payload[1..1 + lang_len],
            &self.payload[1 + lang_len..],
        ))
    }

    fn write_to(&self, out: &mut Vec<u8>, first: bool, last: bool) -> Result<(), NdefError> {
        let type_len = u8::try_from(self.record_type.len()).map_err(|_| {
            NdefError::EncodingFailure(format!(
                "record type of {} bytes exceeds 255",
                self.record_type.len()
            ))
        })?;
        let id_len = u8::try_from(self.id.len()).map_err(|_| {
            NdefError::EncodingFailure(format!("record id of {} bytes exceeds 255", self.id.len()))
        })?;
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            NdefError::EncodingFailure(format!(
                "payload of {} bytes exceeds the 32-bit length field",
                self.payload.len()
            ))
        })?;

        let mut header = self.tnf.bits();
        if first {
            header |= FLAG_MB;
        }
        if last {
            header |= FLAG_ME;
        }
        let short = payload_len <= u8::MAX as u32;
        if short {
            header |= FLAG_SR;
        }
        if id_len > 0 {
            header |= FLAG_IL;
        }

        out.push(header);
        out.push(type_len);
        if short {
            out.push(payload_len as u8);
        } else {
            out.extend_from_slice(&payload_len.to_be_bytes());
        }
        if id_len > 0 {
            out.push(id_len);
        }
        out.extend_from_slice(&self.record_type);
        out.extend_from_slice(&self.id);
        out.extend_from_slice(&self.payload);
        Ok(())
    }
}

fn decode_utf16(body: &[u8]) -> Result<String, NdefError> {
    if body.len() % 2 != 0 {
        return Err(NdefError::InvalidText(
            "UTF-16 body has an odd byte count".to_string(),
        ));
    }

    // Big-endian unless a byte-order mark says otherwise.
    let (little_endian, body) = match body {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => (false, body),
    };

    let units = body.chunks_exact(2).map(|pair| {
        if little_endian {
            u16::from_le_bytes([pair[0], pair[1]])
        } else {
            u16::from_be_bytes([pair[0], pair[1]])
        }
    });

    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| NdefError::InvalidText(format!("invalid UTF-16: {}", e)))
}

// ---------------------------------------------------------------------------
// NdefMessage
// ---------------------------------------------------------------------------

/// An ordered sequence of NDEF records, as stored on a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdefMessage {
    /// Records in tag order.
    pub records: Vec<NdefRecord>,
}

impl NdefMessage {
    /// Wrap a list of records.
    pub fn new(records: Vec<NdefRecord>) -> Self {
        Self { records }
    }

    /// A message holding exactly one record.
    pub fn single(record: NdefRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    /// The first record, if any.
    pub fn first(&self) -> Option<&NdefRecord> {
        self.records.first()
    }

    /// Serialize to the on-tag byte format.
    ///
    /// # Errors
    ///
    /// [`NdefError::EncodingFailure`] for an empty message or a record
    /// whose fields overflow their length fields.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NdefError> {
        if self.records.is_empty() {
            return Err(NdefError::EncodingFailure(
                "an NDEF message needs at least one record".to_string(),
            ));
        }

        let last = self.records.len() - 1;
        let mut out = Vec::new();
        for (i, record) in self.records.iter().enumerate() {
            record.write_to(&mut out, i == 0, i == last)?;
        }
        Ok(out)
    }

    /// Parse an NDEF message.
    ///
    /// Empty input yields an empty message. Parsing stops at the record
    /// flagged ME; tags often pad the remainder of their memory, so any
    /// trailing bytes are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, NdefError> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let mut records = Vec::new();

        while cursor.remaining() > 0 {
            let header = cursor.take_u8()?;
            if header & FLAG_CF != 0 {
                return Err(NdefError::ChunkedRecord);
            }

            let type_len = cursor.take_u8()? as usize;
            let payload_len = if header & FLAG_SR != 0 {
                cursor.take_u8()? as usize
            } else {
                let raw = cursor.take(4)?;
                u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            };
            let id_len = if header & FLAG_IL != 0 {
                cursor.take_u8()? as usize
            } else {
                0
            };

            let record_type = cursor.take(type_len)?.to_vec();
            let id = cursor.take(id_len)?.to_vec();
            let payload = cursor.take(payload_len)?.to_vec();

            records.push(NdefRecord {
                tnf: Tnf::from_bits(header),
                record_type,
                id,
                payload,
            });

            if header & FLAG_ME != 0 {
                break;
            }
        }

        Ok(Self { records })
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], NdefError> {
        if n > self.remaining() {
            return Err(NdefError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, NdefError> {
        Ok(self.take(1)?[0])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
