/// Incremental UTF-8 decoder for transport chunks.
///
/// Network reads split the byte stream at arbitrary positions, including in
/// the middle of a multi-byte character. An incomplete trailing sequence is
/// held back and prepended to the next chunk, so a split character decodes
/// once the rest of it arrives instead of degrading to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, returning all text that is complete so far.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(bytes);

        let mut out = String::with_capacity(data.len());
        let mut rest: &[u8] = &data;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match err.error_len() {
                        // Incomplete sequence at the end of the chunk: hold it
                        // back for the next push.
                        None => {
                            self.carry = after.to_vec();
                            break;
                        }
                        // Genuinely invalid bytes: substitute and move on.
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream. A sequence left dangling because the stream
    /// ended mid-character becomes a single replacement character.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            String::new()
        } else {
            self.carry.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}
