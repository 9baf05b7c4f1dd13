use encoding_rs::Encoding;
use regex::bytes::Regex;
use std::sync::LazyLock;

use crate::error::{Error, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

static CODING_COOKIE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)^[ \t\x0C]*#.*?coding[:=][ \t]*([-\w.]+)")
        .expect("coding cookie regex is valid")
});

static BLANK_OR_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)^[ \t\x0C]*(?:[#\r\n]|$)").expect("blank line regex is valid")
});

/// Text encodings a Python source file can declare that we know how to round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    /// Python's latin-1: every byte maps to the code point of the same value
    Latin1,
    Ascii,
    /// Any other declared codec, e.g. `cp1252`, `koi8-r`, `shift_jis`
    Other(&'static Encoding),
}

impl SourceEncoding {
    /// Resolve a PEP 263 encoding name.
    fn from_declared(name: &str) -> Option<Self> {
        let declared = name.to_ascii_lowercase();
        let name = declared.replace('_', "-");
        let matches_family =
            |family: &str| name == family || name.starts_with(&format!("{family}-"));

        if matches_family("utf-8") || name == "utf8" {
            Some(SourceEncoding::Utf8)
        } else if matches_family("latin-1")
            || matches_family("iso-8859-1")
            || matches_family("iso-latin-1")
            || matches!(name.as_str(), "latin1" | "iso8859-1" | "l1" | "cp819")
        {
            Some(SourceEncoding::Latin1)
        } else if matches!(name.as_str(), "ascii" | "us-ascii" | "646") {
            Some(SourceEncoding::Ascii)
        } else {
            Encoding::for_label(declared.as_bytes())
                .or_else(|| Encoding::for_label(name.as_bytes()))
                // Source code is never UTF-16, and the replacement encoding decodes nothing
                .filter(|encoding| encoding.output_encoding() == *encoding)
                .map(SourceEncoding::Other)
        }
    }
}

/// Line terminator convention of a file, used for newly inserted lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    /// The style of the first line break in `text`. Files without any line break
    /// default to LF.
    pub fn detect(text: &str) -> Self {
        let bytes = text.as_bytes();
        match memchr::memchr2(b'\n', b'\r', bytes) {
            Some(idx) if bytes[idx] == b'\r' => {
                if bytes.get(idx + 1) == Some(&b'\n') {
                    LineEnding::CrLf
                } else {
                    LineEnding::Cr
                }
            }
            _ => LineEnding::Lf,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// Decoded file contents together with what is needed to write them back
/// byte-identically.
#[derive(Debug, Clone)]
pub struct DecodedSource {
    pub text: String,
    pub encoding: SourceEncoding,
    pub bom: bool,
}

impl DecodedSource {
    /// Encode `text` with this source's encoding, restoring the BOM if there was one.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(text.len() + UTF8_BOM.len());
        if self.bom {
            out.extend_from_slice(UTF8_BOM);
        }

        match self.encoding {
            SourceEncoding::Utf8 => out.extend_from_slice(text.as_bytes()),
            SourceEncoding::Latin1 | SourceEncoding::Ascii => {
                let limit = if self.encoding == SourceEncoding::Latin1 {
                    0xFF
                } else {
                    0x7F
                };
                for ch in text.chars() {
                    let code = ch as u32;
                    if code > limit {
                        return Err(Error::Encoding(format!(
                            "character {ch:?} cannot be encoded as {:?}",
                            self.encoding
                        )));
                    }
                    out.push(code as u8);
                }
            }
            SourceEncoding::Other(encoding) => {
                let (bytes, _, had_errors) = encoding.encode(text);
                if had_errors {
                    return Err(Error::Encoding(format!(
                        "text cannot be encoded as {}",
                        encoding.name()
                    )));
                }
                out.extend_from_slice(&bytes);
            }
        }

        Ok(out)
    }
}

/// Find a PEP 263 coding cookie in the first one or two lines.
fn find_cookie(bytes: &[u8]) -> Option<String> {
    let mut lines = bytes.split_inclusive(|&b| b == b'\n');

    let first = lines.next()?;
    if let Some(caps) = CODING_COOKIE.captures(first) {
        return Some(String::from_utf8_lossy(&caps[1]).into_owned());
    }
    if !BLANK_OR_COMMENT.is_match(first) {
        return None;
    }

    let second = lines.next()?;
    CODING_COOKIE
        .captures(second)
        .map(|caps| String::from_utf8_lossy(&caps[1]).into_owned())
}

/// Decode with `encoding`, refusing input that would not encode back to the
/// same bytes. Untouched lines must come out of a rewrite byte for byte.
fn decode_exact(encoding: &'static Encoding, body: &[u8]) -> Result<String> {
    let text = encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| Error::Encoding(format!("invalid {} byte sequence", encoding.name())))?;

    let (round_trip, _, had_errors) = encoding.encode(&text);
    if had_errors || round_trip.as_ref() != body {
        return Err(Error::Encoding(format!(
            "{} text does not survive a decode/encode round trip",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// Decode raw file bytes the way the Python interpreter would: a UTF-8 BOM or a
/// coding cookie decide the encoding, UTF-8 otherwise.
pub fn decode(bytes: &[u8]) -> Result<DecodedSource> {
    let (bom, body) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (true, rest),
        None => (false, bytes),
    };

    let encoding = match find_cookie(body) {
        Some(name) => {
            let encoding = SourceEncoding::from_declared(&name)
                .ok_or_else(|| Error::Encoding(format!("unsupported encoding: {name}")))?;
            if bom && encoding != SourceEncoding::Utf8 {
                return Err(Error::Encoding(format!(
                    "UTF-8 byte order mark conflicts with declared encoding {name}"
                )));
            }
            encoding
        }
        None => SourceEncoding::Utf8,
    };

    let text = match encoding {
        SourceEncoding::Utf8 => String::from_utf8(body.to_vec())
            .map_err(|e| Error::Encoding(format!("invalid UTF-8: {e}")))?,
        SourceEncoding::Latin1 => body.iter().map(|&b| char::from(b)).collect(),
        SourceEncoding::Ascii => {
            if let Some(pos) = body.iter().position(|b| !b.is_ascii()) {
                return Err(Error::Encoding(format!(
                    "non-ASCII byte 0x{:02x} at offset {pos}",
                    body[pos]
                )));
            }
            body.iter().map(|&b| char::from(b)).collect()
        }
        SourceEncoding::Other(encoding) => decode_exact(encoding, body)?,
    };

    Ok(DecodedSource {
        text,
        encoding,
        bom,
    })
}
