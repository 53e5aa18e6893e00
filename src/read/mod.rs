// src/read/mod.rs

use std::{fs, path::Path};

use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, instrument, trace, warn};

use crate::catalog::SourceFile;
use crate::error::EncodingError;

/// Text produced by a successful decode.
#[derive(Debug)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static Encoding,
}

/// A source file together with its decoded contents.
#[derive(Debug)]
pub struct DecodedFile {
    pub source: SourceFile,
    pub text: String,
}

/// Try each encoding in `candidates`, in order, and return the first one that
/// decodes the *whole* buffer cleanly.
///
/// Returns `None` when every candidate fails. Never substitutes replacement
/// characters.
pub fn decode(bytes: &[u8], candidates: &[&'static Encoding]) -> Option<Decoded> {
    candidates.iter().find_map(|&enc| {
        let text = decode_strict(bytes, enc);
        trace!(encoding = enc.name(), ok = text.is_some(), "decode attempt");
        text.map(|text| Decoded {
            text,
            encoding: enc,
        })
    })
}

fn decode_strict(bytes: &[u8], enc: &'static Encoding) -> Option<String> {
    if enc == UTF_8 {
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        return std::str::from_utf8(body).ok().map(str::to_owned);
    }
    if !enc.is_single_byte() {
        return enc
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|c| c.into_owned());
    }
    // Single-byte code pages decode every byte; bytes the page leaves
    // unassigned come out as C1 controls and count as a failure.
    let text = enc.decode_without_bom_handling_and_without_replacement(bytes)?;
    if text.chars().any(|c| ('\u{80}'..='\u{9F}').contains(&c)) {
        return None;
    }
    Some(text.into_owned())
}

/// Read `source` from disk and decode it, recording the encoding that worked.
#[instrument(level = "debug", skip(source, candidates), fields(file = %source.name))]
pub fn read_source(
    source: SourceFile,
    candidates: &[&'static Encoding],
) -> Result<DecodedFile, EncodingError> {
    let bytes = read_bytes(&source.path)?;
    match decode(&bytes, candidates) {
        Some(Decoded { text, encoding }) => {
            debug!(encoding = encoding.name(), bytes = bytes.len(), "decoded");
            Ok(DecodedFile {
                source: source.with_encoding(encoding),
                text,
            })
        }
        None => {
            let tried: Vec<String> = candidates.iter().map(|e| e.name().to_string()).collect();
            warn!(file = %source.name, tried = ?tried, "no candidate encoding decodes file");
            Err(EncodingError::Undecodable {
                path: source.path,
                tried,
            })
        }
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, EncodingError> {
    fs::read(path).map_err(|e| EncodingError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
