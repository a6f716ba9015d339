//! Reading link lists and other text files of unknown encoding.

use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use tracing::debug;

/// Bytes inspected for the first encoding guess.
const DETECTION_SAMPLE_BYTES: usize = 10 * 1024;

/// Decodes text whose encoding is not known up front.
///
/// A byte-order mark wins; otherwise valid UTF-8 is taken as-is. Anything
/// else is run through encoding detection over the first 10 KiB, and again
/// over the whole buffer if the first guess produces malformed output.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        debug!(encoding = encoding.name(), "decoding text by BOM");
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let sample = &bytes[..bytes.len().min(DETECTION_SAMPLE_BYTES)];
    let encoding = detect_encoding(sample, sample.len() == bytes.len());
    let (text, _, had_errors) = encoding.decode(bytes);
    if !had_errors {
        debug!(encoding = encoding.name(), "decoded text from sample detection");
        return text.into_owned();
    }

    let encoding = detect_encoding(bytes, true);
    debug!(encoding = encoding.name(), "decoded text from full detection");
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn detect_encoding(bytes: &[u8], last: bool) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, last);
    detector.guess(None, true)
}

/// Splits text into links: one per line, trimmed, blank lines dropped.
#[must_use]
pub fn read_links(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads and decodes a link file.
///
/// # Errors
///
/// Returns the IO error if the file cannot be read.
pub fn read_links_file(path: &Path) -> std::io::Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    Ok(read_links(&decode_text(&bytes)))
}
