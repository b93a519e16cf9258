//! Byte-to-text decoding for uploaded files.

/// Decode bytes as UTF-8, falling back to Windows-1252 (common for
/// Excel-exported CSVs) when the buffer is not valid UTF-8.
pub fn decode(bytes: &[u8]) -> String {
    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}
