//! Fixed-layout container header.
//!
//! Theme tracks are RIFF/WAVE files with an extensible `fmt ` chunk that names
//! the codec and carries its 4-byte configuration word. Only the leading record
//! is interpreted; the encoded payload always starts at [`PAYLOAD_OFFSET`].

use symphonia::core::io::{BufReader, ReadBytes};

use crate::codec::CodecConfig;
use crate::error::{BgmError, Result};

/// Size of the header record at offset 0.
pub const HEADER_SIZE: usize = 68;

/// Start of the encoded payload for this container layout.
pub const PAYLOAD_OFFSET: usize = 168;

/// Header fields, little-endian on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerHeader {
    pub magic: [u8; 4],
    pub file_size: u32,
    pub chunk_id: [u8; 4],
    pub format_id: [u8; 4],
    pub format_chunk_size: u32,
    pub format_code: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub extension_size: u16,
    pub samples_per_block: u16,
    pub channel_mask: u32,
    pub codec_id: [u8; 16],
    pub version: u32,
    pub codec_config: CodecConfig,
}

impl ContainerHeader {
    /// Parse the header record from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(BgmError::MalformedAsset {
                len: bytes.len(),
                needed: HEADER_SIZE,
            });
        }
        read_header(&mut BufReader::new(&bytes[..HEADER_SIZE])).map_err(|e| {
            tracing::debug!("header read failed: {e}");
            BgmError::MalformedAsset {
                len: bytes.len(),
                needed: HEADER_SIZE,
            }
        })
    }

    /// Magic tag as text, lossy.
    pub fn magic_str(&self) -> String {
        String::from_utf8_lossy(&self.magic).into_owned()
    }

    /// Codec identifier formatted as a Windows GUID.
    pub fn codec_guid(&self) -> String {
        let g = &self.codec_id;
        let d1 = u32::from_le_bytes([g[0], g[1], g[2], g[3]]);
        let d2 = u16::from_le_bytes([g[4], g[5]]);
        let d3 = u16::from_le_bytes([g[6], g[7]]);
        format!(
            "{d1:08x}-{d2:04x}-{d3:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            g[8], g[9], g[10], g[11], g[12], g[13], g[14], g[15]
        )
    }
}

fn read_header(reader: &mut BufReader<'_>) -> std::io::Result<ContainerHeader> {
    let magic = reader.read_quad_bytes()?;
    let file_size = reader.read_u32()?;
    let chunk_id = reader.read_quad_bytes()?;
    let format_id = reader.read_quad_bytes()?;
    let format_chunk_size = reader.read_u32()?;
    let format_code = reader.read_u16()?;
    let channels = reader.read_u16()?;
    let sample_rate = reader.read_u32()?;
    let byte_rate = reader.read_u32()?;
    let block_align = reader.read_u16()?;
    let bits_per_sample = reader.read_u16()?;
    let extension_size = reader.read_u16()?;
    let samples_per_block = reader.read_u16()?;
    let channel_mask = reader.read_u32()?;
    let mut codec_id = [0u8; 16];
    reader.read_buf_exact(&mut codec_id)?;
    let version = reader.read_u32()?;
    let codec_config = CodecConfig::from_bytes(reader.read_quad_bytes()?);

    Ok(ContainerHeader {
        magic,
        file_size,
        chunk_id,
        format_id,
        format_chunk_size,
        format_code,
        channels,
        sample_rate,
        byte_rate,
        block_align,
        bits_per_sample,
        extension_size,
        samples_per_block,
        channel_mask,
        codec_id,
        version,
        codec_config,
    })
}

/// A loaded asset: the raw bytes plus its parsed header.
///
/// Only needs to live as long as the decode that consumes it.
#[derive(Clone, Debug)]
pub struct EncodedAsset {
    bytes: Vec<u8>,
    header: ContainerHeader,
}

impl EncodedAsset {
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let header = ContainerHeader::parse(&bytes)?;
        Ok(Self { bytes, header })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn codec_config(&self) -> CodecConfig {
        self.header.codec_config
    }

    pub fn payload_offset(&self) -> usize {
        PAYLOAD_OFFSET
    }

    /// Encoded bytes after the fixed payload offset; empty when the file ends
    /// before it.
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(PAYLOAD_OFFSET..).unwrap_or(&[])
    }

    pub fn payload_size(&self) -> usize {
        self.payload().len()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
