// A minimal, allocation-light binary codec. Every wire message in this
// workspace implements `Serializer` and is read/written through `Reader`/
// `Writer` rather than `serde`, matching how `tos_common::serializer` is
// consumed in discovery message code (see the daemon's `mutex::messages`).
//
// All multi-byte integers are big-endian.

use crate::error::{ReaderError, ReaderResult};

pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    // Bytes remaining to be consumed.
    pub fn size(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }

    fn take(&mut self, n: usize) -> ReaderResult<&'a [u8]> {
        if self.size() < n {
            return Err(ReaderError::OutOfBounds);
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> ReaderResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> ReaderResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> ReaderResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> ReaderResult<u64> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_be_bytes(a))
    }

    pub fn read_bytes(&mut self, n: usize) -> ReaderResult<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    // Fails if any byte is left unconsumed. Call after a top-level message
    // has been fully read to reject trailing data.
    pub fn expect_empty(&self) -> ReaderResult<()> {
        if self.size() > 0 {
            return Err(ReaderError::TrailingData(self.size()));
        }
        Ok(())
    }
}

pub struct Writer<'a> {
    bytes: &'a mut Vec<u8>,
}

impl<'a> Writer<'a> {
    pub fn new(bytes: &'a mut Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.bytes.extend_from_slice(value);
    }
}

pub trait Serializer: Sized {
    fn read(reader: &mut Reader) -> ReaderResult<Self>;
    fn write(&self, writer: &mut Writer);

    fn size(&self) -> usize {
        let mut bytes = Vec::new();
        let mut writer = Writer::new(&mut bytes);
        self.write(&mut writer);
        bytes.len()
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut writer = Writer::new(&mut bytes);
        self.write(&mut writer);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> ReaderResult<Self> {
        let mut reader = Reader::new(bytes);
        let value = Self::read(&mut reader)?;
        reader.expect_empty()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, PartialEq, Clone, Copy)]
    struct Pair(u32, u16);

    impl Serializer for Pair {
        fn read(reader: &mut Reader) -> ReaderResult<Self> {
            let a = reader.read_u32()?;
            let b = reader.read_u16()?;
            Ok(Self(a, b))
        }

        fn write(&self, writer: &mut Writer) {
            writer.write_u32(self.0);
            writer.write_u16(self.1);
        }
    }

    #[test]
    fn round_trip() {
        let pair = Pair(0xdead_beef, 0x1234);
        let bytes = pair.to_bytes();
        assert_eq!(bytes.len(), pair.size());
        let decoded = Pair::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.0, 0xdead_beef);
        assert_eq!(decoded.1, 0x1234);
    }

    #[test]
    fn rejects_trailing_data() {
        let mut bytes = Pair(1, 2).to_bytes();
        bytes.push(0xff);
        assert_eq!(Pair::from_bytes(&bytes), Err(ReaderError::TrailingData(1)));
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = Pair(1, 2).to_bytes();
        assert_eq!(
            Reader::new(&bytes[..3]).read_u32(),
            Err(ReaderError::OutOfBounds)
        );
    }

    proptest! {
        #[test]
        fn pair_round_trips_for_any_value(a: u32, b: u16) {
            let pair = Pair(a, b);
            let decoded = Pair::from_bytes(&pair.to_bytes()).unwrap();
            prop_assert_eq!(decoded, pair);
        }
    }
}
