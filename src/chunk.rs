//! Output chunks and the text decoder applied to file reads.

use crate::options::Encoding;

/// One unit of stream output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Bytes(Vec<u8>),
    Text(String),
}

impl Chunk {
    /// Byte length of the chunk as it would be written to a file.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Chunk::Bytes(bytes) => bytes,
            Chunk::Text(text) => text.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Chunk::Bytes(bytes) => bytes,
            Chunk::Text(text) => text.into_bytes(),
        }
    }

    /// Returns the text if this chunk was decoded.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Chunk::Text(text) => Some(text),
            Chunk::Bytes(_) => None,
        }
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Chunk::Bytes(bytes)
    }
}

impl From<&[u8]> for Chunk {
    fn from(bytes: &[u8]) -> Self {
        Chunk::Bytes(bytes.to_vec())
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Chunk::Text(text)
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Chunk::Text(text.to_string())
    }
}

/// Turns raw reads into chunks.
///
/// UTF-8 sequences cut by a read boundary are held back until the next read
/// completes them.
#[derive(Debug)]
pub(crate) struct Decoder {
    encoding: Option<Encoding>,
    pending: Vec<u8>,
}

impl Decoder {
    pub(crate) fn new(encoding: Option<Encoding>) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
        }
    }

    /// Decodes one read. Returns `None` when nothing is ready to emit.
    pub(crate) fn decode(&mut self, bytes: Vec<u8>) -> Option<Chunk> {
        let chunk = match self.encoding {
            None => Chunk::Bytes(bytes),
            Some(Encoding::Utf8) => Chunk::Text(self.decode_utf8(&bytes)),
            Some(Encoding::Latin1) => Chunk::Text(bytes.iter().map(|&b| char::from(b)).collect()),
            Some(Encoding::Hex) => Chunk::Text(hex::encode(&bytes)),
        };
        (!chunk.is_empty()).then_some(chunk)
    }

    /// Flushes an incomplete trailing sequence at end of stream.
    pub(crate) fn finish(&mut self) -> Option<Chunk> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        Some(Chunk::Text(char::REPLACEMENT_CHARACTER.to_string()))
    }

    fn decode_utf8(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut text = String::with_capacity(self.pending.len());
        let mut consumed = 0;
        while consumed < self.pending.len() {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.pending.len();
                }
                Err(err) => {
                    let valid_end = consumed + err.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[consumed..valid_end]));
                    match err.error_len() {
                        Some(invalid) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + invalid;
                        }
                        None => {
                            // Incomplete sequence at the end, wait for more bytes
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        text
    }
}
