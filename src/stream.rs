//! content-stream codec
//!
//! a content object is checksummed and transported as a single stream:
//! a u32 big-endian header length, the cbor header (file info plus
//! sorted xattrs), then the raw payload bytes. symlinks carry no
//! payload; their target lives in the header. the object checksum is
//! over this stream, never over the raw file bytes alone.

use std::io::{self, Cursor, Read};

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};
use crate::types::{FileInfo, FileKind, Xattr};

/// headers carry names and xattrs, never payload; anything past this
/// is a malformed stream
const MAX_HEADER_SIZE: usize = 16 * 1024 * 1024;

/// decoded prefix of a content stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHeader {
    pub info: FileInfo,
    pub xattrs: Vec<Xattr>,
}

impl ContentHeader {
    /// build a header, sorting xattrs; only regular files and symlinks
    /// are representable as content objects
    pub fn new(info: FileInfo, mut xattrs: Vec<Xattr>) -> Result<Self> {
        match info.kind {
            FileKind::Regular { .. } | FileKind::Symlink { .. } => {}
            FileKind::Directory => return Err(Error::UnsupportedFileType("directory")),
            FileKind::Special => return Err(Error::UnsupportedFileType("special")),
        }
        xattrs.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        Ok(Self { info, xattrs })
    }

    /// canonical header bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }

    /// header bytes with the u32 big-endian length prefix
    pub fn encode_with_size(&self) -> Result<Vec<u8>> {
        let header = self.encode()?;
        let mut framed = Vec::with_capacity(4 + header.len());
        framed.extend_from_slice(&(header.len() as u32).to_be_bytes());
        framed.extend_from_slice(&header);
        Ok(framed)
    }
}

/// turn a raw file into a content-object stream
///
/// returns the stream and the declared payload length (zero for
/// symlinks). for symlinks pass `std::io::empty()` as the payload.
pub fn raw_file_to_content_stream<R: Read>(
    payload: R,
    info: &FileInfo,
    xattrs: &[Xattr],
) -> Result<(io::Chain<Cursor<Vec<u8>>, R>, u64)> {
    let header = ContentHeader::new(info.clone(), xattrs.to_vec())?;
    let length = info.payload_size();
    Ok((Cursor::new(header.encode_with_size()?).chain(payload), length))
}

/// parse the header portion of a content stream
///
/// on return the reader is positioned at the first payload byte.
pub fn content_stream_parse(reader: &mut impl Read) -> Result<ContentHeader> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .with_path("<content stream>")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_HEADER_SIZE {
        return Err(Error::Io {
            path: "<content stream>".into(),
            source: io::Error::new(io::ErrorKind::InvalidData, "content header too large"),
        });
    }

    let mut header_bytes = vec![0u8; len];
    reader
        .read_exact(&mut header_bytes)
        .with_path("<content stream>")?;

    let header: ContentHeader = ciborium::from_reader(&header_bytes[..])?;
    match header.info.kind {
        FileKind::Regular { .. } | FileKind::Symlink { .. } => Ok(header),
        FileKind::Directory => Err(Error::UnsupportedFileType("directory")),
        FileKind::Special => Err(Error::UnsupportedFileType("special")),
    }
}
