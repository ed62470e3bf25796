//! Streaming XML decode for the INDI wire format
//!
//! The wire is a forest: top-level elements arrive back to back with no
//! document root, split across TCP reads at arbitrary byte boundaries. The
//! [`StreamDecoder`] combines the push-based [`Framer`] with a per-slice
//! tree parse, yielding one [`RawElement`] per completed
//! top-level element together with any decode diagnostics. Malformed input
//! produces a `Fatal` diagnostic and decoding resumes at the next frame.

mod framing;
mod tree;

pub use framing::{Frame, Framer};
pub use tree::{parse_element, RawElement};

use crate::diagnostic::Diagnostic;

/// Output of one decode step
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedElement {
    /// The parsed tree, absent when the slice was undecodable
    pub element: Option<RawElement>,
    /// Diagnostics collected while decoding this slice
    pub diagnostics: Vec<Diagnostic>,
}

/// Incremental decoder from byte chunks to raw element trees
#[derive(Debug, Default)]
pub struct StreamDecoder {
    framer: Framer,
}

impl StreamDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self {
            framer: Framer::new(),
        }
    }

    /// Append a chunk of input
    pub fn feed(&mut self, chunk: &[u8]) {
        self.framer.feed(chunk);
    }

    /// Decode the next completed top-level element, if any
    pub fn next(&mut self) -> Option<DecodedElement> {
        let frame = self.framer.next_frame()?;
        Some(match frame {
            Frame::Element(slice) => match parse_element(&slice) {
                Ok(element) => DecodedElement {
                    element: Some(element),
                    diagnostics: Vec::new(),
                },
                Err(e) => DecodedElement {
                    element: None,
                    diagnostics: vec![Diagnostic::fatal(format!(
                        "malformed element: {}",
                        e
                    ))],
                },
            },
            Frame::Junk(bytes) => DecodedElement {
                element: None,
                diagnostics: vec![Diagnostic::fatal(format!(
                    "discarded {} undecodable byte(s) before next element",
                    bytes.len()
                ))],
            },
        })
    }

    /// Drain every element currently decodable
    pub fn drain(&mut self) -> Vec<DecodedElement> {
        let mut out = Vec::new();
        while let Some(decoded) = self.next() {
            out.push(decoded);
        }
        out
    }

    /// Signal clean end of input; a pending partial element becomes a Warning
    pub fn finish(&mut self) -> Vec<Diagnostic> {
        match self.framer.take_partial() {
            Some(partial) => vec![Diagnostic::warning(format!(
                "input ended with {} byte(s) of an incomplete element; dropped",
                partial.len()
            ))],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;

    fn decode_all(input: &[u8]) -> Vec<DecodedElement> {
        let mut decoder = StreamDecoder::new();
        decoder.feed(input);
        decoder.drain()
    }

    #[test]
    fn test_forest_semantics() {
        let out = decode_all(b"<a/><b/><c/>");
        assert_eq!(out.len(), 3);
        let names: Vec<&str> = out
            .iter()
            .map(|d| d.element.as_ref().unwrap().name.as_str())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_chunk_independence() {
        let input = b"<defNumberVector device=\"T\" name=\"EQUATORIAL_EOD_COORD\" state=\"Idle\" perm=\"rw\"><defNumber name=\"RA\" format=\"%010.6m\" min=\"0\" max=\"24\">12.0</defNumber></defNumberVector><pingRequest uid=\"abc\"/>";

        let whole = decode_all(input);

        let mut decoder = StreamDecoder::new();
        let mut split = Vec::new();
        for byte in input.iter() {
            decoder.feed(std::slice::from_ref(byte));
            split.extend(decoder.drain());
        }

        assert_eq!(whole, split);
        assert_eq!(whole.len(), 2);
    }

    #[test]
    fn test_malformed_produces_fatal_and_resyncs() {
        let out = decode_all(b"<a><b></a></b><c/>");
        assert_eq!(out.len(), 2);
        assert!(out[0].element.is_none());
        assert_eq!(out[0].diagnostics[0].severity, Severity::Fatal);
        assert_eq!(out[1].element.as_ref().unwrap().name, "c");
    }

    #[test]
    fn test_junk_produces_fatal() {
        let out = decode_all(b"noise<a/>");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].diagnostics[0].severity, Severity::Fatal);
        assert_eq!(out[1].element.as_ref().unwrap().name, "a");
    }

    #[test]
    fn test_finish_warns_on_partial() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(b"<a><b>half");
        assert!(decoder.next().is_none());
        let diags = decoder.finish();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn test_finish_clean() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(b"<a/>\n");
        assert!(decoder.next().is_some());
        assert!(decoder.finish().is_empty());
    }
}
