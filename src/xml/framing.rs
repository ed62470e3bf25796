//! Top-level element framing over a rootless XML byte stream
//!
//! INDI concatenates top-level elements over TCP with no document root and
//! no length prefix, so chunk boundaries can fall anywhere, including inside
//! a tag name or an attribute value. The [`Framer`] accepts chunks as they
//! arrive, tracks tag/quote/markup state and element depth byte by byte, and
//! slices out one complete top-level element at a time. Everything that
//! cannot open a well-formed element at depth zero is surfaced as
//! [`Frame::Junk`] so the caller can diagnose and resynchronize.

use bytes::{Buf, BytesMut};

/// One framed item from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete top-level element, ready for tree parsing
    Element(String),
    /// Bytes at depth zero that cannot start an element
    Junk(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Depth zero, between elements
    Outside,
    /// Consuming garbage at depth zero until the next `<`
    Junk,
    /// Inside an element, between tags
    Text,
    /// Just consumed `<`
    TagOpen,
    /// Inside `<name ...`
    StartTag,
    /// Inside a quoted attribute value
    StartTagQuote(u8),
    /// Inside `</name`
    EndTag,
    /// Seen `<!`
    Bang,
    /// Seen `<!-`
    BangDash,
    /// Inside `<!-- ... -->`
    Comment,
    /// Matching the `CDATA[` prefix
    CdataPrefix(usize),
    /// Inside `<![CDATA[ ... ]]>`
    Cdata,
    /// `<?...?>`, `<!DOCTYPE ...>` and other markup skipped until `>`
    Markup,
}

const CDATA_PREFIX: &[u8] = b"CDATA[";

/// Incremental splitter of a byte stream into top-level element frames
#[derive(Debug)]
pub struct Framer {
    buf: BytesMut,
    pos: usize,
    start: usize,
    depth: usize,
    state: State,
    prev_slash: bool,
    match_len: usize,
}

impl Framer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            pos: 0,
            start: 0,
            depth: 0,
            state: State::Outside,
            prev_slash: false,
            match_len: 0,
        }
    }

    /// Append a chunk of bytes
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Whether an element or garbage run is partially buffered
    pub fn has_partial(&self) -> bool {
        self.state != State::Outside || self.start < self.buf.len()
    }

    /// Take whatever is pending at end of input, resetting the framer
    pub fn take_partial(&mut self) -> Option<String> {
        let pending = if self.state == State::Outside {
            let tail = &self.buf[self.start..];
            if tail.iter().all(|b| b.is_ascii_whitespace()) {
                None
            } else {
                Some(String::from_utf8_lossy(tail).into_owned())
            }
        } else {
            Some(String::from_utf8_lossy(&self.buf[self.start..]).into_owned())
        };
        self.buf.clear();
        self.pos = 0;
        self.start = 0;
        self.depth = 0;
        self.state = State::Outside;
        pending
    }

    /// Scan forward and return the next complete frame, if any
    pub fn next_frame(&mut self) -> Option<Frame> {
        while self.pos < self.buf.len() {
            let b = self.buf[self.pos];
            match self.state {
                State::Outside => {
                    if b == b'<' {
                        self.start = self.pos;
                        self.pos += 1;
                        self.state = State::TagOpen;
                    } else if b.is_ascii_whitespace() {
                        self.pos += 1;
                        self.start = self.pos;
                    } else {
                        self.start = self.pos;
                        self.pos += 1;
                        self.state = State::Junk;
                    }
                }
                State::Junk => {
                    if b == b'<' {
                        let junk = self.take_frame(false);
                        self.pos += 1;
                        self.state = State::TagOpen;
                        return Some(junk);
                    }
                    self.pos += 1;
                }
                State::Text => {
                    if b == b'<' {
                        self.state = State::TagOpen;
                    }
                    self.pos += 1;
                }
                State::TagOpen => match b {
                    b'/' => {
                        self.pos += 1;
                        self.state = State::EndTag;
                    }
                    b'!' => {
                        self.pos += 1;
                        self.state = State::Bang;
                    }
                    b'?' => {
                        self.pos += 1;
                        self.state = State::Markup;
                    }
                    _ => {
                        self.prev_slash = false;
                        self.state = State::StartTag;
                    }
                },
                State::StartTag => match b {
                    b'"' | b'\'' => {
                        self.prev_slash = false;
                        self.pos += 1;
                        self.state = State::StartTagQuote(b);
                    }
                    b'>' => {
                        let self_closing = self.prev_slash;
                        self.pos += 1;
                        if !self_closing {
                            self.depth += 1;
                            self.state = State::Text;
                        } else if self.depth == 0 {
                            let element = self.take_frame(true);
                            self.state = State::Outside;
                            return Some(element);
                        } else {
                            self.state = State::Text;
                        }
                    }
                    b'/' => {
                        self.prev_slash = true;
                        self.pos += 1;
                    }
                    _ => {
                        self.prev_slash = false;
                        self.pos += 1;
                    }
                },
                State::StartTagQuote(quote) => {
                    if b == quote {
                        self.state = State::StartTag;
                        self.prev_slash = false;
                    }
                    self.pos += 1;
                }
                State::EndTag => {
                    self.pos += 1;
                    if b == b'>' {
                        if self.depth == 0 {
                            let junk = self.take_frame(false);
                            self.state = State::Outside;
                            return Some(junk);
                        }
                        self.depth -= 1;
                        if self.depth == 0 {
                            let element = self.take_frame(true);
                            self.state = State::Outside;
                            return Some(element);
                        }
                        self.state = State::Text;
                    }
                }
                State::Bang => match b {
                    b'-' => {
                        self.pos += 1;
                        self.state = State::BangDash;
                    }
                    b'[' => {
                        self.pos += 1;
                        self.state = State::CdataPrefix(0);
                    }
                    _ => {
                        self.state = State::Markup;
                    }
                },
                State::BangDash => {
                    if b == b'-' {
                        self.pos += 1;
                        self.match_len = 0;
                        self.state = State::Comment;
                    } else {
                        self.state = State::Markup;
                    }
                }
                State::Comment => {
                    self.pos += 1;
                    if b == b'-' {
                        self.match_len = (self.match_len + 1).min(2);
                    } else if b == b'>' && self.match_len >= 2 {
                        self.end_markup();
                    } else {
                        self.match_len = 0;
                    }
                }
                State::CdataPrefix(n) => {
                    if b == CDATA_PREFIX[n] {
                        self.pos += 1;
                        if n + 1 == CDATA_PREFIX.len() {
                            self.match_len = 0;
                            self.state = State::Cdata;
                        } else {
                            self.state = State::CdataPrefix(n + 1);
                        }
                    } else {
                        self.state = State::Markup;
                    }
                }
                State::Cdata => {
                    self.pos += 1;
                    if b == b']' {
                        self.match_len = (self.match_len + 1).min(2);
                    } else if b == b'>' && self.match_len >= 2 {
                        self.end_markup();
                    } else {
                        self.match_len = 0;
                    }
                }
                State::Markup => {
                    self.pos += 1;
                    if b == b'>' {
                        self.end_markup();
                    }
                }
            }
        }
        None
    }

    /// Detach `start..pos` from the buffer as an element or junk frame;
    /// bytes that are not valid UTF-8 are always junk.
    fn take_frame(&mut self, element: bool) -> Frame {
        let mut consumed = self.buf.split_to(self.pos);
        let content = consumed.split_off(self.start);
        self.pos = 0;
        self.start = 0;
        match std::str::from_utf8(&content) {
            Ok(s) if element => Frame::Element(s.to_string()),
            Ok(s) => Frame::Junk(s.to_string()),
            Err(_) => Frame::Junk(String::from_utf8_lossy(&content).into_owned()),
        }
    }

    /// Finish a comment/CDATA/markup run; standalone ones at depth zero are
    /// dropped from the buffer outright.
    fn end_markup(&mut self) {
        if self.depth == 0 {
            self.buf.advance(self.pos);
            self.pos = 0;
            self.start = 0;
            self.state = State::Outside;
        } else {
            self.state = State::Text;
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}
