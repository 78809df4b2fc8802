//! The opaque, serialized form of a grammar.
//!
//! Layout: a 4 byte magic, the ABI version as a little endian `u32`,
//! then the postcard encoding of [GrammarData].

use std::fmt::Debug;

use thiserror::Error;
use tracing::debug;

use crate::data::GrammarData;

/// The ABI version written by [GrammarTable::encode].
pub const LANGUAGE_VERSION: u32 = 14;

/// The oldest ABI version a parser built from this crate understands.
pub const MIN_COMPATIBLE_LANGUAGE_VERSION: u32 = 13;

const MAGIC: [u8; 4] = *b"SDGT";
const HEADER_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("grammar table is empty")]
    Empty,
    #[error("not a grammar table")]
    BadMagic,
    #[error("grammar table header is truncated")]
    Truncated,
    #[error("grammar table has {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("undecodable grammar payload: {0}")]
    Decode(postcard::Error),
    #[error("unable to encode grammar: {0}")]
    Encode(postcard::Error),
}

/// A compiled grammar as an immutable blob of bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GrammarTable {
    bytes: Vec<u8>,
}

impl GrammarTable {
    /// Serialize grammar data at the current [LANGUAGE_VERSION].
    pub fn encode(data: &GrammarData) -> Result<Self, TableError> {
        Self::encode_with_version(data, LANGUAGE_VERSION)
    }

    pub fn encode_with_version(data: &GrammarData, version: u32) -> Result<Self, TableError> {
        let payload = postcard::to_allocvec(data).map_err(TableError::Encode)?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&version.to_le_bytes());
        bytes.extend_from_slice(&payload);

        debug!(grammar = %data.name, version, len = bytes.len(), "encoded grammar table");

        Ok(Self { bytes })
    }

    /// Wrap bytes produced elsewhere. Nothing is checked until the table is decoded.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read the ABI version from the header without decoding the payload.
    pub fn version(&self) -> Result<u32, TableError> {
        let header = self.header()?;
        let mut version = [0; 4];
        version.copy_from_slice(&header[4..HEADER_LEN]);
        Ok(u32::from_le_bytes(version))
    }

    pub fn decode(&self) -> Result<GrammarData, TableError> {
        self.header()?;

        let (data, rest) = postcard::take_from_bytes::<GrammarData>(&self.bytes[HEADER_LEN..])
            .map_err(TableError::Decode)?;

        if !rest.is_empty() {
            return Err(TableError::TrailingBytes(rest.len()));
        }

        Ok(data)
    }

    fn header(&self) -> Result<&[u8], TableError> {
        if self.bytes.is_empty() {
            return Err(TableError::Empty);
        }
        if self.bytes.len() < HEADER_LEN {
            return Err(TableError::Truncated);
        }
        if self.bytes[0..4] != MAGIC {
            return Err(TableError::BadMagic);
        }
        Ok(&self.bytes[0..HEADER_LEN])
    }
}

impl Debug for GrammarTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarTable")
            .field("len", &self.bytes.len())
            .field("version", &self.version().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::strictdoc;

    #[test]
    fn encode_then_decode_keeps_grammar() {
        let data = strictdoc::grammar_data();
        let table = GrammarTable::encode(&data).unwrap();

        assert_eq!(LANGUAGE_VERSION, table.version().unwrap());
        assert_eq!(data, table.decode().unwrap());
    }

    #[test]
    fn empty_table() {
        let table = GrammarTable::from_bytes(vec![]);
        assert!(table.is_empty());
        assert_matches!(table.decode(), Err(TableError::Empty));
        assert_matches!(table.version(), Err(TableError::Empty));
    }

    #[test]
    fn short_header() {
        let table = GrammarTable::from_bytes(b"SDG".to_vec());
        assert_matches!(table.decode(), Err(TableError::Truncated));
    }

    #[test]
    fn wrong_magic() {
        let table = GrammarTable::from_bytes(b"\x7fELF\x0e\0\0\0rest".to_vec());
        assert_matches!(table.decode(), Err(TableError::BadMagic));
    }

    #[test]
    fn truncated_payload() {
        let table = strictdoc::grammar_table();
        let cut = GrammarTable::from_bytes(&table.as_bytes()[..table.len() / 2]);

        assert_eq!(LANGUAGE_VERSION, cut.version().unwrap());
        assert_matches!(cut.decode(), Err(TableError::Decode(_)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = strictdoc::grammar_table().as_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);

        assert_matches!(
            GrammarTable::from_bytes(bytes).decode(),
            Err(TableError::TrailingBytes(3))
        );
    }

    #[test]
    fn version_is_stored_in_header() {
        let table = GrammarTable::encode_with_version(&strictdoc::grammar_data(), 99).unwrap();
        assert_eq!(99, table.version().unwrap());

        let header_only = GrammarTable::from_bytes(&table.as_bytes()[..HEADER_LEN]);
        assert_eq!(
            "GrammarTable { len: 8, version: Some(99) }",
            format!("{header_only:?}")
        );
    }
}
