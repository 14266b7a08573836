//! Member extraction from take-off XML.
//!
//! A take-off document lists framing members as `MEMBER_DATA` elements. Only the
//! first `TYPE`, `NAME`, `DESCRIPTION` and `LENGTH` descendant of each member are
//! read, plus the `UNITS` attribute of that `LENGTH`:
//!
//! ```xml
//! <MEMBER_DATA>
//!   <TYPE>STUD</TYPE>
//!   <NAME>S1</NAME>
//!   <DESCRIPTION>2x4 SPF</DESCRIPTION>
//!   <LENGTH UNITS="in">92.625</LENGTH>
//! </MEMBER_DATA>
//! ```
//!
//! Extraction is lenient: missing fields default to empty / zero and a document
//! that fails to parse yields no members. [`extract_document`] reports which of
//! those happened; [`extract_members`] only returns the list.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::model::MemberRecord;

const MEMBER_TAG: &[u8] = b"MEMBER_DATA";
const UNITS_ATTR: &[u8] = b"UNITS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Type,
    Name,
    Description,
    Length,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"TYPE" => Some(Self::Type),
            b"NAME" => Some(Self::Name),
            b"DESCRIPTION" => Some(Self::Description),
            b"LENGTH" => Some(Self::Length),
            _ => None,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Outcome of parsing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractStatus {
    /// The document parsed; it may still contain zero members.
    Parsed,
    /// The document is not well-formed XML. No members are returned.
    Malformed { reason: String },
}

/// Members plus parse status for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub members: Vec<MemberRecord>,
    pub status: ExtractStatus,
    /// `MEMBER_DATA` elements seen, before the plate filter.
    pub elements: usize,
    /// Members dropped by the plate filter.
    pub plates_dropped: usize,
    /// Members whose length text was present but not a usable number.
    pub bad_lengths: usize,
}

impl Extraction {
    pub fn is_malformed(&self) -> bool {
        matches!(self.status, ExtractStatus::Malformed { .. })
    }

    fn malformed(reason: String) -> Self {
        Self {
            members: Vec::new(),
            status: ExtractStatus::Malformed { reason },
            elements: 0,
            plates_dropped: 0,
            bad_lengths: 0,
        }
    }
}

/// Lenient extraction: members in document order, empty on any parse failure.
pub fn extract_members(xml: &str) -> Vec<MemberRecord> {
    extract_document(xml).members
}

/// Extract members and report whether the document parsed.
pub fn extract_document(xml: &str) -> Extraction {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut members = Vec::new();
    let mut elements = 0usize;
    let mut plates_dropped = 0usize;
    let mut bad_lengths = 0usize;

    // Open elements of any kind; non-zero at Eof means the document was cut short.
    let mut open_elements = 0usize;
    // Depth of MEMBER_DATA nesting; nested members fold into the outermost one.
    let mut member_depth = 0usize;
    let mut current = PendingMember::default();
    // Field being captured, and element depth below it.
    let mut capture: Option<(Field, usize)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                open_elements += 1;
                let name = e.name();
                let tag = name.as_ref();
                if let Some((_, depth)) = capture.as_mut() {
                    *depth += 1;
                } else if tag == MEMBER_TAG {
                    if member_depth == 0 {
                        current = PendingMember::default();
                    }
                    member_depth += 1;
                } else if member_depth > 0 {
                    if let Some(field) = Field::from_tag(tag) {
                        if current.open(field, e) {
                            capture = Some((field, 0));
                        }
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                let tag = name.as_ref();
                if capture.is_some() {
                    // self-closing element inside a field carries no text
                } else if tag == MEMBER_TAG && member_depth == 0 {
                    // <MEMBER_DATA/> is a member with every field defaulted
                    elements += 1;
                    members.push(PendingMember::default().finish().0);
                } else if member_depth > 0 {
                    if let Some(field) = Field::from_tag(tag) {
                        current.open(field, e);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                open_elements = open_elements.saturating_sub(1);
                let name = e.name();
                let tag = name.as_ref();
                match capture {
                    Some((_, depth)) if depth > 0 => {
                        capture = capture.map(|(f, d)| (f, d - 1));
                    }
                    Some(_) => capture = None,
                    None if tag == MEMBER_TAG && member_depth > 0 => {
                        member_depth -= 1;
                        if member_depth == 0 {
                            elements += 1;
                            let (record, bad_length) = std::mem::take(&mut current).finish();
                            if bad_length {
                                bad_lengths += 1;
                            }
                            if is_plate(&record) {
                                plates_dropped += 1;
                            } else {
                                members.push(record);
                            }
                        }
                    }
                    None => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some((field, _)) = capture {
                    current.push_text(field, &String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((field, _)) = capture {
                    current.push_text(field, &String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::GeneralRef(ref e)) => {
                if let Some((field, _)) = capture {
                    let entity = String::from_utf8_lossy(e);
                    match resolve_entity(&entity) {
                        Some(ch) => current.push_char(field, ch),
                        None => current.push_text(field, &format!("&{entity};")),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Extraction::malformed(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if member_depth > 0 {
        return Extraction::malformed("unclosed MEMBER_DATA element".into());
    }
    if open_elements > 0 {
        return Extraction::malformed(format!("{open_elements} unclosed element(s) at end of document"));
    }

    Extraction {
        members,
        status: ExtractStatus::Parsed,
        elements,
        plates_dropped,
        bad_lengths,
    }
}

/// Plates are not counted as framing members.
pub fn is_plate(record: &MemberRecord) -> bool {
    record.member_type.to_lowercase().contains("plate")
        || record.description.to_lowercase().contains("plate")
}

/// Parse the longest leading decimal number, skipping leading whitespace.
///
/// `"92.625"` → 92.625, `" 92in"` → 92, `"1e2"` → 100, `"abc"` → None.
pub fn parse_length_prefix(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)
        }
    }
}

// ---------------------------------------------------------------------------
// Member under construction
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PendingMember {
    /// Text per field; `None` until the field's element is first seen.
    text: [Option<String>; 4],
    units: Option<String>,
}

impl PendingMember {
    /// Start a field element. Returns false when the field was already seen,
    /// since only the first occurrence counts.
    fn open(&mut self, field: Field, e: &BytesStart<'_>) -> bool {
        let slot = &mut self.text[field.slot()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(String::new());
        if field == Field::Length {
            self.units = e
                .attributes()
                .flatten()
                .find(|attr| attr.key.as_ref() == UNITS_ATTR)
                .map(|attr| String::from_utf8_lossy(&attr.value).to_string());
        }
        true
    }

    fn push_text(&mut self, field: Field, text: &str) {
        if let Some(s) = self.text[field.slot()].as_mut() {
            s.push_str(text);
        }
    }

    fn push_char(&mut self, field: Field, ch: char) {
        if let Some(s) = self.text[field.slot()].as_mut() {
            s.push(ch);
        }
    }

    /// Build the record. The flag is set when length text was present but unusable.
    fn finish(self) -> (MemberRecord, bool) {
        let [member_type, name, description, length_text] = self.text;

        let (length, bad_length) = match length_text.as_deref().map(str::trim) {
            None | Some("") => (0.0, false),
            Some(text) => match parse_length_prefix(text) {
                Some(v) if v.is_finite() && v >= 0.0 => (v, false),
                _ => (0.0, true),
            },
        };

        let record = MemberRecord {
            member_type: member_type.unwrap_or_default(),
            name: name.unwrap_or_default(),
            description: description.unwrap_or_default(),
            length,
            units: self.units.unwrap_or_default(),
        };
        (record, bad_length)
    }
}
