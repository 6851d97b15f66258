// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instance locator
//!
//! Walks the DATA section with `memchr` and records where every
//! `#id=TYPE(...);` instance lives, without decoding any attribute.
//! The HEADER section is read separately by [`parse_header`].

use std::ops::Range;

use ifc_slice_model::{EntityId, IfcType};
use memchr::{memchr, memchr2};
use rustc_hash::FxHashMap;

/// Source id to byte span `(start, end)` of the instance text
pub type EntityIndex = FxHashMap<u64, (usize, usize)>;

/// Entity type to source ids, in file order
pub type TypeIndex = FxHashMap<IfcType, Vec<EntityId>>;

/// One located instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedEntity<'a> {
    pub id: u64,
    /// Type keyword as written, e.g. `IFCBEAM`
    pub type_name: &'a str,
    /// Byte range from `#` up to and including the closing `;`
    pub span: Range<usize>,
}

/// Iterator over the instances of the DATA section
pub struct EntityScanner<'a> {
    text: &'a str,
    cursor: usize,
}

impl<'a> EntityScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        let cursor = text.find("DATA;").map_or(0, |at| at + "DATA;".len());
        Self { text, cursor }
    }

    /// Offset index only
    pub fn build_index(text: &'a str) -> EntityIndex {
        Self::build_indices(text).0
    }

    /// Offset index and type index, filled in one pass
    pub fn build_indices(text: &'a str) -> (EntityIndex, TypeIndex) {
        let mut offsets = EntityIndex::default();
        let mut by_type = TypeIndex::default();

        for entity in Self::new(text) {
            offsets.insert(entity.id, (entity.span.start, entity.span.end));
            by_type
                .entry(IfcType::parse(entity.type_name))
                .or_default()
                .push(EntityId(entity.id));
        }

        (offsets, by_type)
    }

    fn bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.cursor).copied()
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.cursor += 1;
        }
    }

    /// Advance while `accept` holds and return the consumed slice
    fn take_while(&mut self, accept: impl Fn(u8) -> bool) -> &'a str {
        let from = self.cursor;
        while self.peek().is_some_and(&accept) {
            self.cursor += 1;
        }
        &self.text[from..self.cursor]
    }

    /// A `#` opens an instance only at the start of a line or right after `;`
    fn opens_instance(&self, at: usize) -> bool {
        at == 0 || matches!(self.bytes()[at - 1], b'\n' | b'\r' | b';')
    }

    /// Read `#id = TYPE` at the cursor; `None` leaves the cursor past the `#`
    fn read_head(&mut self) -> Option<(u64, &'a str)> {
        self.cursor += 1;
        let digits = self.take_while(|b| b.is_ascii_digit());
        let id = digits.parse().ok()?;

        self.skip_blanks();
        if self.peek() != Some(b'=') {
            return None;
        }
        self.cursor += 1;
        self.skip_blanks();

        let keyword = self.take_while(|b| b.is_ascii_alphanumeric() || b == b'_');
        (!keyword.is_empty()).then_some((id, keyword))
    }

    /// Move past the terminating `;`, ignoring any inside quoted strings
    fn seek_terminator(&mut self) -> Option<usize> {
        loop {
            let rest = &self.bytes()[self.cursor..];
            let hit = memchr2(b'\'', b';', rest)?;
            self.cursor += hit + 1;
            if rest[hit] == b';' {
                return Some(self.cursor);
            }
            // Inside a string: a doubled quote is an escaped quote
            loop {
                let rest = &self.bytes()[self.cursor..];
                let close = memchr(b'\'', rest)?;
                self.cursor += close + 1;
                if self.peek() == Some(b'\'') {
                    self.cursor += 1;
                } else {
                    break;
                }
            }
        }
    }
}

impl<'a> Iterator for EntityScanner<'a> {
    type Item = ScannedEntity<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let hash = self.cursor + memchr(b'#', &self.bytes()[self.cursor..])?;
            self.cursor = hash;
            if !self.opens_instance(hash) {
                self.cursor += 1;
                continue;
            }

            let Some((id, type_name)) = self.read_head() else {
                continue;
            };
            let end = self.seek_terminator()?;
            return Some(ScannedEntity {
                id,
                type_name,
                span: hash..end,
            });
        }
    }
}

/// Metadata carried by the HEADER section
#[derive(Clone, Debug, Default)]
pub struct HeaderInfo {
    pub schema_version: String,
    pub file_description: Option<String>,
    pub file_name: Option<String>,
    pub timestamp: Option<String>,
    pub author: Option<String>,
    pub organization: Option<String>,
    pub preprocessor_version: Option<String>,
    pub originating_system: Option<String>,
}

/// A header record argument
#[derive(Clone, Debug, PartialEq)]
enum HeaderValue {
    Text(String),
    List(Vec<HeaderValue>),
    /// `$`, `*` or anything the header grammar does not use
    Absent,
}

impl HeaderValue {
    fn text(&self) -> Option<String> {
        match self {
            HeaderValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// The value itself, or the first non-empty string of a list
    fn first_text(&self) -> Option<String> {
        match self {
            HeaderValue::Text(s) if !s.is_empty() => Some(s.clone()),
            HeaderValue::List(items) => items.iter().find_map(HeaderValue::first_text),
            _ => None,
        }
    }
}

/// Read FILE_DESCRIPTION, FILE_NAME and FILE_SCHEMA
///
/// Missing or malformed records leave the matching fields empty.
pub fn parse_header(content: &str) -> HeaderInfo {
    let from = content.find("HEADER;").unwrap_or(0);
    let to = content[from..]
        .find("ENDSEC;")
        .map_or(content.len(), |at| from + at);
    let header = &content[from..to];

    let mut info = HeaderInfo::default();

    if let Some(args) = record_arguments(header, "FILE_SCHEMA") {
        info.schema_version = args.first().and_then(HeaderValue::first_text).unwrap_or_default();
    }

    if let Some(args) = record_arguments(header, "FILE_DESCRIPTION") {
        info.file_description = args.first().and_then(HeaderValue::first_text);
    }

    // FILE_NAME(name, time_stamp, (author), (organization), preprocessor, originating_system, authorization)
    if let Some(args) = record_arguments(header, "FILE_NAME") {
        let arg = |i: usize| args.get(i);
        info.file_name = arg(0).and_then(HeaderValue::text);
        info.timestamp = arg(1).and_then(HeaderValue::text);
        info.author = arg(2).and_then(HeaderValue::first_text);
        info.organization = arg(3).and_then(HeaderValue::first_text);
        info.preprocessor_version = arg(4).and_then(HeaderValue::text);
        info.originating_system = arg(5).and_then(HeaderValue::text);
    }

    info
}

/// Arguments of the first `KEYWORD(...)` record in `header`
fn record_arguments(header: &str, keyword: &str) -> Option<Vec<HeaderValue>> {
    let at = header.find(keyword)?;
    let after = header[at + keyword.len()..].trim_start();
    let (HeaderValue::List(args), _) = header_value(after)? else {
        return None;
    };
    Some(args)
}

/// Parse one header value and return the unconsumed input
fn header_value(input: &str) -> Option<(HeaderValue, &str)> {
    let input = input.trim_start();
    match input.as_bytes().first()? {
        b'\'' => {
            let (text, rest) = quoted(&input[1..])?;
            Some((HeaderValue::Text(text), rest))
        }
        b'(' => {
            let mut items = Vec::new();
            let mut rest = input[1..].trim_start();
            while !rest.starts_with(')') {
                let (item, after) = header_value(rest)?;
                items.push(item);
                rest = after.trim_start();
                rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
            }
            Some((HeaderValue::List(items), &rest[1..]))
        }
        _ => {
            let end = input.find([',', ')']).unwrap_or(input.len());
            Some((HeaderValue::Absent, &input[end..]))
        }
    }
}

/// Body of a quoted string, with `''` collapsed; `input` starts after the opening quote
fn quoted(input: &str) -> Option<(String, &str)> {
    let mut text = String::new();
    let mut rest = input;
    loop {
        let close = rest.find('\'')?;
        text.push_str(&rest[..close]);
        rest = &rest[close + 1..];
        match rest.strip_prefix('\'') {
            Some(after) => {
                text.push('\'');
                rest = after;
            }
            None => return Some((text, rest)),
        }
    }
}
