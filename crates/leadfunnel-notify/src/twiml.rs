//! TwiML response documents.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::NotifyError;

const VOICE: &str = "alice";

/// `<Response/>`: acknowledges a webhook without further instructions.
///
/// # Errors
///
/// Returns [`NotifyError::Twiml`] if the document cannot be written.
pub fn empty() -> Result<String, NotifyError> {
    let mut writer = document()?;
    writer.write_event(Event::Empty(BytesStart::new("Response")))?;
    finish(writer)
}

/// `<Response><Say>text</Say></Response>` with `text` XML-escaped.
///
/// # Errors
///
/// Returns [`NotifyError::Twiml`] if the document cannot be written.
pub fn say(text: &str) -> Result<String, NotifyError> {
    let mut writer = document()?;
    writer.write_event(Event::Start(BytesStart::new("Response")))?;
    writer.write_event(Event::Start(
        BytesStart::new("Say").with_attributes([("voice", VOICE)]),
    ))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("Say")))?;
    writer.write_event(Event::End(BytesEnd::new("Response")))?;
    finish(writer)
}

fn document() -> Result<Writer<Cursor<Vec<u8>>>, NotifyError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(writer)
}

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, NotifyError> {
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| NotifyError::Twiml(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response() {
        assert_eq!(
            empty().unwrap(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#
        );
    }

    #[test]
    fn say_wraps_text() {
        assert_eq!(
            say("New lead from Jane Doe").unwrap(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Say voice="alice">New lead from Jane Doe</Say></Response>"#
        );
    }

    #[test]
    fn say_escapes_markup() {
        let xml = say("Smith & Sons <LLC>").unwrap();
        assert!(xml.contains("Smith &amp; Sons &lt;LLC&gt;"), "{xml}");
    }
}
