//! Forward-only bit reader over a byte source.
//!
//! Bit numbering follows CTF: little-endian fields fill each byte from its least
//! significant bit, big-endian fields from its most significant bit. Alignment is
//! relative to the start of the current packet.

use crate::error::{CorruptStreamError, Error};
use crate::types::ByteOrder;
use std::io::{self, BufRead, Read};

pub struct BitReader<R> {
    inner: R,
    /// Byte holding the bit at `position` when `position` is not byte aligned
    current: u8,
    /// Absolute bits consumed since the stream start
    position: u64,
    packet_start: u64,
    /// Absolute bit position that reads must not go past
    content_end: Option<u64>,
}

impl<R: BufRead> BitReader<R> {
    pub fn new(inner: R) -> Self {
        BitReader {
            inner,
            current: 0,
            position: 0,
            packet_start: 0,
            content_end: None,
        }
    }

    /// Bits consumed since the stream start.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Byte offset of the next unread bit, for diagnostics.
    pub fn byte_offset(&self) -> u64 {
        self.position / 8
    }

    /// Bits consumed since the current packet started.
    pub fn packet_position(&self) -> u64 {
        self.position - self.packet_start
    }

    pub fn packet_start_byte(&self) -> u64 {
        self.packet_start / 8
    }

    /// Mark the current position as the start of a packet. Clears any content limit.
    pub fn begin_packet(&mut self) {
        debug_assert!(self.position % 8 == 0, "packets start on a byte boundary");
        self.packet_start = self.position;
        self.content_end = None;
    }

    /// Restrict reads to the first `content_bits` bits of the current packet.
    ///
    /// `packet_bits` is only used for error reporting; without it the packet is taken to
    /// end with its content.
    pub fn set_content_limit(
        &mut self,
        content_bits: u64,
        packet_bits: Option<u64>,
    ) -> Result<(), Error> {
        if self.packet_position() > content_bits {
            return Err(CorruptStreamError::InvalidPacketSize {
                offset: self.packet_start_byte(),
                packet_bits: packet_bits.unwrap_or(content_bits),
                content_bits,
                read_bits: self.packet_position(),
            }
            .into());
        }
        self.content_end = Some(self.packet_start + content_bits);
        Ok(())
    }

    /// Content bits left in the current packet, if a limit is set.
    pub fn remaining_content_bits(&self) -> Option<u64> {
        self.content_end.map(|end| end.saturating_sub(self.position))
    }

    /// True when no more bytes are available and the reader sits on a byte boundary.
    pub fn is_at_end(&mut self) -> Result<bool, Error> {
        if self.position % 8 != 0 {
            return Ok(false);
        }
        Ok(self.inner.fill_buf()?.is_empty())
    }

    fn check_limit(&self, bits: u64) -> Result<(), Error> {
        match self.content_end {
            Some(end) if self.position + bits > end => Err(CorruptStreamError::ReadPastContent {
                offset: self.byte_offset(),
                requested: bits,
                content_bits: end - self.packet_start,
            }
            .into()),
            _ => Ok(()),
        }
    }

    fn eof_error(&self, e: io::Error) -> Error {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CorruptStreamError::UnexpectedEof {
                offset: self.byte_offset(),
            }
            .into()
        } else {
            e.into()
        }
    }

    fn fetch_byte(&mut self) -> Result<u8, Error> {
        let mut b = [0_u8; 1];
        match self.inner.read_exact(&mut b) {
            Ok(()) => Ok(b[0]),
            Err(e) => Err(self.eof_error(e)),
        }
    }

    fn next_bit(&mut self, order: ByteOrder) -> Result<u64, Error> {
        let offset_in_byte = (self.position % 8) as u8;
        if offset_in_byte == 0 {
            self.current = self.fetch_byte()?;
        }
        let shift = match order {
            ByteOrder::BigEndian => 7 - offset_in_byte,
            _ => offset_in_byte,
        };
        self.position += 1;
        Ok(u64::from((self.current >> shift) & 1))
    }

    /// Read an unsigned integer of `bits` bits (0..=64).
    pub fn read_unsigned(&mut self, bits: u32, order: ByteOrder) -> Result<u64, Error> {
        debug_assert!(bits <= 64);
        debug_assert!(order != ByteOrder::Native, "byte order must be resolved");
        self.check_limit(u64::from(bits))?;

        if bits == 0 {
            return Ok(0);
        }

        if self.position % 8 == 0 && bits % 8 == 0 {
            let len = (bits / 8) as usize;
            let mut buf = [0_u8; 8];
            match order {
                ByteOrder::BigEndian => {
                    if let Err(e) = self.inner.read_exact(&mut buf[8 - len..]) {
                        return Err(self.eof_error(e));
                    }
                    self.position += u64::from(bits);
                    return Ok(u64::from_be_bytes(buf));
                }
                _ => {
                    if let Err(e) = self.inner.read_exact(&mut buf[..len]) {
                        return Err(self.eof_error(e));
                    }
                    self.position += u64::from(bits);
                    return Ok(u64::from_le_bytes(buf));
                }
            }
        }

        let mut value = 0_u64;
        for i in 0..bits {
            let bit = self.next_bit(order)?;
            match order {
                ByteOrder::BigEndian => value = (value << 1) | bit,
                _ => value |= bit << i,
            }
        }
        Ok(value)
    }

    /// Read a two's-complement signed integer of `bits` bits (0..=64).
    pub fn read_signed(&mut self, bits: u32, order: ByteOrder) -> Result<i64, Error> {
        let raw = self.read_unsigned(bits, order)?;
        Ok(sign_extend(raw, bits))
    }

    /// Skip padding up to the next `alignment`-bit boundary of the packet.
    pub fn align(&mut self, alignment: u64) -> Result<(), Error> {
        if alignment <= 1 {
            return Ok(());
        }
        let rem = self.packet_position() % alignment;
        if rem == 0 {
            return Ok(());
        }
        self.skip_bits(alignment - rem)
    }

    /// Skip `bits` bits without producing a value.
    pub fn skip_bits(&mut self, bits: u64) -> Result<(), Error> {
        self.check_limit(bits)?;
        self.skip_unchecked(bits)
    }

    fn skip_unchecked(&mut self, mut bits: u64) -> Result<(), Error> {
        while bits > 0 && self.position % 8 != 0 {
            self.next_bit(ByteOrder::LittleEndian)?;
            bits -= 1;
        }
        let whole_bytes = bits / 8;
        if whole_bytes > 0 {
            let skipped = io::copy(&mut (&mut self.inner).take(whole_bytes), &mut io::sink())?;
            self.position += skipped * 8;
            if skipped != whole_bytes {
                return Err(CorruptStreamError::UnexpectedEof {
                    offset: self.byte_offset(),
                }
                .into());
            }
            bits -= whole_bytes * 8;
        }
        while bits > 0 {
            self.next_bit(ByteOrder::LittleEndian)?;
            bits -= 1;
        }
        Ok(())
    }

    /// Consume whatever is left of a packet of `packet_bits` bits, including padding.
    pub fn read_to_end_of_packet(&mut self, packet_bits: u64) -> Result<(), Error> {
        let end = self.packet_start + packet_bits;
        if self.position > end {
            return Err(CorruptStreamError::InvalidPacketSize {
                offset: self.packet_start_byte(),
                packet_bits,
                content_bits: self
                    .content_end
                    .map(|e| e - self.packet_start)
                    .unwrap_or(packet_bits),
                read_bits: self.packet_position(),
            }
            .into());
        }
        self.content_end = None;
        self.skip_unchecked(end - self.position)
    }
}

pub(crate) fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits == 0 {
        0
    } else if bits >= 64 {
        raw as i64
    } else {
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }
}
