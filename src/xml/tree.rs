//! Raw element trees parsed from framed slices

use crate::error::{Error, Result};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A structurally parsed top-level element
///
/// Attributes keep arrival order; `text` is the concatenation of the
/// element's own text nodes, trimmed at the edges. Entity references in text
/// and attribute values are decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawElement {
    /// Element name
    pub name: String,
    /// Attributes in arrival order
    pub attributes: IndexMap<String, String>,
    /// Concatenated text content, edge-trimmed
    pub text: String,
    /// Child elements in arrival order
    pub children: Vec<RawElement>,
}

impl RawElement {
    /// Look up an attribute value
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Parse one framed slice into a tree
pub fn parse_element(xml: &str) -> Result<RawElement> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<RawElement> = Vec::new();

    loop {
        match reader.read_event() {
            Err(e) => return Err(Error::Xml(e)),
            Ok(Event::Start(start)) => {
                stack.push(element_from_start(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let element = element_from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Ok(Event::End(_)) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| Error::Parse("unexpected closing tag".to_string()))?;
                element.text = element.text.trim().to_string();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let raw = std::str::from_utf8(text.as_ref())?;
                    let decoded = quick_xml::escape::unescape(raw)
                        .map_err(|e| Error::Parse(e.to_string()))?;
                    top.text.push_str(&decoded);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(std::str::from_utf8(data.as_ref())?);
                }
            }
            Ok(Event::GeneralRef(reference)) => {
                if let Some(top) = stack.last_mut() {
                    let raw = reference.into_inner();
                    let name = std::str::from_utf8(&raw)?;
                    match resolve_reference(name) {
                        Some(ch) => top.text.push(ch),
                        None => {
                            top.text.push('&');
                            top.text.push_str(name);
                            top.text.push(';');
                        }
                    }
                }
            }
            Ok(Event::Eof) => {
                return Err(Error::Parse("truncated element".to_string()));
            }
            Ok(_) => {}
        }
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<RawElement> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let mut attributes = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Parse(e.to_string()))?
            .into_owned();
        attributes.insert(key, value);
    }
    Ok(RawElement {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

/// Resolve the five predefined entities plus numeric character references
fn resolve_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_and_text() {
        let el = parse_element(r#"<defSwitch name="CONNECT" label="Connect">On</defSwitch>"#)
            .unwrap();
        assert_eq!(el.name, "defSwitch");
        assert_eq!(el.attribute("name"), Some("CONNECT"));
        assert_eq!(el.attribute("label"), Some("Connect"));
        assert_eq!(el.text, "On");
        assert!(el.children.is_empty());
    }

    #[test]
    fn test_attribute_order_preserved() {
        let el = parse_element(r#"<a z="1" y="2" x="3"/>"#).unwrap();
        let keys: Vec<&String> = el.attributes.keys().collect();
        assert_eq!(keys, ["z", "y", "x"]);
    }

    #[test]
    fn test_children_and_edge_trim() {
        let el = parse_element(
            "<defSwitchVector device=\"D\" name=\"N\">\n  <defSwitch name=\"A\">On</defSwitch>\n  <defSwitch name=\"B\">Off</defSwitch>\n</defSwitchVector>",
        )
        .unwrap();
        assert_eq!(el.children.len(), 2);
        assert_eq!(el.text, "");
        assert_eq!(el.children[0].text, "On");
        assert_eq!(el.children[1].attribute("name"), Some("B"));
    }

    #[test]
    fn test_entities_decoded() {
        let el = parse_element(r#"<message text="a &amp; b">x &lt; y &#38; z</message>"#).unwrap();
        assert_eq!(el.attribute("text"), Some("a & b"));
        assert_eq!(el.text, "x < y & z");
    }

    #[test]
    fn test_mismatched_close_is_error() {
        assert!(parse_element("<a><b></a></b>").is_err());
    }

    #[test]
    fn test_truncated_is_error() {
        assert!(parse_element("<a><b>").is_err());
    }
}
