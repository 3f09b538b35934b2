//! Metadata stored as a sequence of metadata packets rather than plain text.

use crate::error::MetadataError;
use crate::types::ByteOrder;
use uuid::Uuid;

pub const METADATA_PACKET_MAGIC: u32 = 0x75D1_1D57;

/// magic, uuid, checksum, content_size, packet_size, then five single-byte fields
pub const HEADER_LEN: usize = 4 + 16 + 4 + 4 + 4 + 5;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MetadataPacketHeader {
    pub byte_order: ByteOrder,
    pub uuid: Uuid,
    pub checksum: u32,
    /// Bits, header included
    pub content_size: u32,
    /// Bits, header and padding included
    pub packet_size: u32,
    pub compression_scheme: u8,
    pub encryption_scheme: u8,
    pub checksum_scheme: u8,
    pub major: u8,
    pub minor: u8,
}

/// Byte order of the first packet, if `bytes` starts with a metadata packet.
pub fn detect(bytes: &[u8]) -> Option<ByteOrder> {
    let magic: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    if u32::from_le_bytes(magic) == METADATA_PACKET_MAGIC {
        Some(ByteOrder::LittleEndian)
    } else if u32::from_be_bytes(magic) == METADATA_PACKET_MAGIC {
        Some(ByteOrder::BigEndian)
    } else {
        None
    }
}

impl MetadataPacketHeader {
    pub fn parse(bytes: &[u8], offset: u64) -> Result<Self, MetadataError> {
        let invalid = |reason: &str| MetadataError::InvalidPacket {
            offset,
            reason: reason.to_owned(),
        };
        if bytes.len() < HEADER_LEN {
            return Err(invalid("truncated packet header"));
        }
        let byte_order = detect(bytes).ok_or_else(|| invalid("bad magic number"))?;
        let u32_at = |at: usize| {
            let mut b = [0_u8; 4];
            b.copy_from_slice(&bytes[at..at + 4]);
            match byte_order {
                ByteOrder::BigEndian => u32::from_be_bytes(b),
                _ => u32::from_le_bytes(b),
            }
        };
        let mut uuid = [0_u8; 16];
        uuid.copy_from_slice(&bytes[4..20]);
        Ok(MetadataPacketHeader {
            byte_order,
            uuid: Uuid::from_bytes(uuid),
            checksum: u32_at(20),
            content_size: u32_at(24),
            packet_size: u32_at(28),
            compression_scheme: bytes[32],
            encryption_scheme: bytes[33],
            checksum_scheme: bytes[34],
            major: bytes[35],
            minor: bytes[36],
        })
    }
}

/// Concatenate the text of every metadata packet in `bytes`.
///
/// Returns the text and the UUID the packets carry.
pub fn decode(bytes: &[u8]) -> Result<(String, Uuid), MetadataError> {
    let mut text = Vec::with_capacity(bytes.len());
    let mut uuid = None;
    let mut offset = 0_usize;

    while offset < bytes.len() {
        let at = offset as u64;
        let invalid = |reason: &str| MetadataError::InvalidPacket {
            offset: at,
            reason: reason.to_owned(),
        };
        let header = MetadataPacketHeader::parse(&bytes[offset..], at)?;

        if header.compression_scheme != 0 {
            return Err(invalid("compressed metadata is not supported"));
        }
        if header.encryption_scheme != 0 {
            return Err(invalid("encrypted metadata is not supported"));
        }
        if header.checksum_scheme != 0 {
            return Err(invalid("metadata checksums are not supported"));
        }
        if header.content_size % 8 != 0 || header.packet_size % 8 != 0 {
            return Err(invalid("packet sizes are not whole bytes"));
        }
        let content_len = (header.content_size / 8) as usize;
        let packet_len = (header.packet_size / 8) as usize;
        if content_len < HEADER_LEN || packet_len < content_len {
            return Err(invalid("inconsistent content and packet sizes"));
        }
        if offset + packet_len > bytes.len() {
            return Err(invalid("packet extends past the end of the metadata"));
        }
        match uuid {
            None => uuid = Some(header.uuid),
            Some(u) if u != header.uuid => return Err(invalid("packet UUIDs differ")),
            Some(_) => (),
        }

        text.extend_from_slice(&bytes[offset + HEADER_LEN..offset + content_len]);
        offset += packet_len;
    }

    // Writers may NUL-pad the content
    text.retain(|b| *b != 0);
    let text = String::from_utf8(text).map_err(|_| MetadataError::NotUtf8)?;
    Ok((text, uuid.unwrap_or_else(Uuid::nil)))
}


#[cfg(test)]
mod tests {
    use super::test_util::packetize;
    use super::*;
    use pretty_assertions::assert_eq;

    const TEXT: &str = "/* CTF 1.8 */\ntrace { major = 1; minor = 8; byte_order = le; };\n";

    #[test]
    fn concatenates_packets_in_either_byte_order() {
        let uuid = Uuid::from_bytes([7; 16]);
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let bytes = packetize(TEXT, uuid, 10, order);
            assert_eq!(detect(&bytes), Some(order));
            let header = MetadataPacketHeader::parse(&bytes, 0).unwrap();
            assert_eq!(header.content_size, ((HEADER_LEN + 10) * 8) as u32);
            assert_eq!((header.major, header.minor), (1, 8));
            assert_eq!(decode(&bytes).unwrap(), (TEXT.to_owned(), uuid));
        }
        assert_eq!(detect(TEXT.as_bytes()), None);
    }

    #[test]
    fn rejects_bad_packets() {
        let mut bytes = packetize(TEXT, Uuid::nil(), 64, ByteOrder::LittleEndian);
        bytes[32] = 1;
        assert!(matches!(
            decode(&bytes),
            Err(MetadataError::InvalidPacket { offset: 0, .. })
        ));

        let bytes = packetize(TEXT, Uuid::nil(), 64, ByteOrder::LittleEndian);
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1]),
            Err(MetadataError::InvalidPacket { .. })
        ));
        assert!(matches!(
            decode(&bytes[..20]),
            Err(MetadataError::InvalidPacket { .. })
        ));
    }
}
