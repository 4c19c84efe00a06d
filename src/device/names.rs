//! Parser for the name-table file fetched over the file-transfer channel.
//!
//! The file is XML. Any `<scene>` or `<zone>` element carrying an `id` (or
//! `index`) and a `name` attribute contributes one entry, wherever it sits in
//! the tree. The root element may carry a `formFactor` attribute.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameTableError {
    #[error("name table is not valid XML at byte {position}: {reason}")]
    Xml { position: usize, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    pub scenes: BTreeMap<u16, String>,
    pub zones: BTreeMap<u16, String>,
    pub form_factor: Option<String>,
}

impl NameTable {
    pub fn parse(bytes: &[u8]) -> Result<Self, NameTableError> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(true);

        let mut table = NameTable::default();
        let mut seen_root = false;
        loop {
            let event = reader.read_event().map_err(|err| NameTableError::Xml {
                position: reader.buffer_position(),
                reason: err.to_string(),
            })?;
            match event {
                Event::Start(element) | Event::Empty(element) => {
                    if !seen_root {
                        seen_root = true;
                        table.form_factor = attribute(&element, &["formFactor"]);
                    }
                    table.collect(&element);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(table)
    }

    fn collect(&mut self, element: &BytesStart<'_>) {
        let target = match element.name().as_ref() {
            b"scene" => &mut self.scenes,
            b"zone" => &mut self.zones,
            _ => return,
        };
        let tag = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        let id = attribute(element, &["id", "index"]);
        let name = attribute(element, &["name"]);
        match (id.as_deref().map(str::parse::<u16>), name) {
            (Some(Ok(id)), Some(name)) => {
                target.insert(id, name);
            }
            (id, name) => {
                warn!(%tag, ?id, ?name, "skipping name-table entry without usable id and name");
            }
        }
    }
}

fn attribute(element: &BytesStart<'_>, keys: &[&str]) -> Option<String> {
    element
        .attributes()
        .filter_map(Result::ok)
        .find(|attr| keys.iter().any(|key| key.as_bytes() == attr.key.as_ref()))
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}
