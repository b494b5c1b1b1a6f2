//! Streaming access to the XML parts of a SpreadsheetML package.
//!
//! [`XmlReader`] remembers which package part it reads, so a malformed part is
//! reported by name and byte offset instead of as a bare quick-xml error.

use crate::error::SheetNestError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use thiserror::Error;

/// Phonetic guide text (`<rPh>`) inside a string item; never part of the value
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
/// Text run (`<t>`) inside a string item
const TAG_TEXT: QName = QName(b"t");

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown entity '&{0};'")]
    ParseEntityError(String),

    #[error("Character reference '&{0};' is not a valid character")]
    CharacterReferenceError(String),

    #[error("Malformed XML in '{part}' at byte {position}: {message}")]
    MalformedPart { part: String, position: u64, message: String },
}

/// Event reader over one package part
pub(crate) struct XmlReader<R: BufRead> {
    part: String,
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Empty elements are expanded so `<c r="A1"/>` also yields an end event
    pub(crate) fn new(part: &str, buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        XmlReader {
            part: part.to_owned(),
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, SheetNestError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(XmlError::MalformedPart {
                part: self.part.to_owned(),
                position: self.reader.error_position(),
                message: error.to_string(),
            })?,
        }
    }

    /// Collects the text of a string item up to `end`, joining rich text runs
    /// and skipping phonetic guides. With `in_text` the content is taken as is,
    /// as for a `<v>` element; otherwise only `<t>` runs count.
    pub(crate) fn read_text(&mut self, end: QName, in_text: bool) -> Result<String, SheetNestError> {
        let mut phonetic = false;
        let mut in_text = in_text;
        let mut text = String::new();
        while let Some(event) = self.next()? {
            match event {
                Event::End(event) if event.name() == end => break,
                Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => phonetic = true,
                Event::End(event) if event.name() == TAG_PHONETIC_TEXT => phonetic = false,
                Event::Start(event) if !phonetic && event.name() == TAG_TEXT => in_text = true,
                Event::End(event) if event.name() == TAG_TEXT => in_text = false,
                Event::Text(event) if in_text => text.push_str(&event.xml_content()?),
                Event::CData(event) if in_text => text.push_str(&event.xml_content()?),
                Event::GeneralRef(event) if in_text => push_reference(&mut text, &event)?,
                _ => (),
            }
        }
        Ok(text)
    }
}

/// Appends the character an entity or character reference stands for.
fn push_reference(text: &mut String, reference: &BytesRef) -> Result<(), SheetNestError> {
    let raw = reference.xml_content()?;
    match raw.strip_prefix('#') {
        Some(number) => {
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16)?,
                None => number.parse::<u32>()?,
            };
            let character = char::from_u32(code).ok_or_else(|| XmlError::CharacterReferenceError(raw.to_string()))?;
            text.push(character);
        }
        None => {
            let entity = resolve_xml_entity(&raw).ok_or_else(|| XmlError::ParseEntityError(raw.to_string()))?;
            text.push_str(entity);
        }
    }
    Ok(())
}

pub(crate) trait XmlAttributeHelper<'a> {
    /// Unescaped attribute value
    fn get_value(&self) -> Result<Cow<'a, str>, SheetNestError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, SheetNestError> {
        Ok(self.unescape_value()?)
    }
}

pub(crate) trait XmlNodeHelper<'a> {
    /// Unescaped value of the attribute called `name`, if present
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetNestError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetNestError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }
}

/// Loops over the events of an [`XmlReader`] until the end of the part,
/// ignoring events no arm matches.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const PART: &str = "xl/sharedStrings.xml";

    fn first_item(xml: &str) -> Result<String, SheetNestError> {
        let mut reader = XmlReader::new(PART, xml.as_bytes());
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == QName(b"si") => {
                text = reader.read_text(QName(b"si"), false)?;
                break;
            }
        });
        Ok(text)
    }

    #[test]
    fn rich_text_runs_are_joined() {
        let xml = r#"<sst><si><r><t>Shadow</t></r><r><t xml:space="preserve">step </t></r><rPh><t>シャドウ</t></rPh></si></sst>"#;
        assert_eq!(first_item(xml).unwrap(), "Shadowstep ");
    }

    #[test]
    fn entities_and_character_references() {
        assert_eq!(first_item("<si><t>a&amp;b&#65;&#x42;</t></si>").unwrap(), "a&bAB");
        assert!(matches!(
            first_item("<si><t>&bogus;</t></si>"),
            Err(SheetNestError::XmlHelperError(XmlError::ParseEntityError(_)))
        ));
        assert!(matches!(
            first_item("<si><t>&#xD800;</t></si>"),
            Err(SheetNestError::XmlHelperError(XmlError::CharacterReferenceError(_)))
        ));
    }

    #[test]
    fn attributes_of_empty_elements() -> Result<(), SheetNestError> {
        let mut reader = XmlReader::new(PART, r#"<row><c r="C9"/></row>"#.as_bytes());
        let mut reference = None;
        let mut ends = 0;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == QName(b"c") => {
                reference = event.get_attribute_value("r")?.map(|value| value.to_string());
            }
            Event::End(event) if event.name() == QName(b"c") => ends += 1,
        });
        assert_eq!(reference.as_deref(), Some("C9"));
        assert_eq!(ends, 1);
        Ok(())
    }

    #[test]
    fn malformed_part_is_named() {
        let error = first_item("<sst><si><t>x</t").unwrap_err();
        match error {
            SheetNestError::XmlHelperError(XmlError::MalformedPart { part, .. }) => assert_eq!(part, PART),
            other => panic!("unexpected error: {other}"),
        }
    }
}
