//! Hardened XML parse entry point.
//!
//! Every parser in the engine routes through [`check_xml`] before handing the
//! document to serde. quick-xml never resolves external entities, fetches
//! URLs, or processes XInclude on its own, so rejecting DOCTYPE declarations
//! outright closes off DTD-based attacks (entity expansion, external entity
//! file reads, parameter entities).

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Violation found while vetting an XML document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecureXmlError {
    /// A `<!DOCTYPE ...>` declaration was found. DTDs are forbidden.
    #[error("DOCTYPE declaration at byte {0} is not allowed")]
    DoctypeForbidden(usize),

    /// The document is not well-formed XML.
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: usize, message: String },
}

/// Vet a document: well-formed, and free of DOCTYPE/entity declarations.
///
/// This walks the full event stream once. Codecs call it before serde
/// deserialization so that a malicious part never reaches the typed layer.
pub fn check_xml(xml: &str) -> Result<(), SecureXmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = true;

    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::DocType(_)) => return Err(SecureXmlError::DoctypeForbidden(position)),
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                return Err(SecureXmlError::Malformed {
                    position,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Vet raw bytes, requiring valid UTF-8 first.
pub fn check_xml_bytes(bytes: &[u8]) -> Result<(), SecureXmlError> {
    let text = std::str::from_utf8(bytes).map_err(|e| SecureXmlError::Malformed {
        position: e.valid_up_to(),
        message: "invalid UTF-8".to_string(),
    })?;
    check_xml(text)
}
