use std::io::SeekFrom;

use bytemuck::Pod;

use super::StreamError;

/// Read/write cursor over a fixed-size byte buffer.
///
/// The buffer is never grown or reallocated. `B` may be owned (`Box<[u8]>`,
/// `Vec<u8>`) or borrowed (`&[u8]`, `&mut [u8]`); writing requires
/// `B: AsMut<[u8]>`.
///
/// A failed access leaves the offset unchanged.
#[derive(Debug, Clone)]
pub struct BinaryCursor<B> {
    buf: B,
    offset: usize,
}

impl<B: AsRef<[u8]>> BinaryCursor<B> {
    /// Binds a cursor to `buf` at offset 0 without copying.
    #[inline]
    pub fn new(buf: B) -> Self {
        Self { buf, offset: 0 }
    }

    /// Current byte offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total capacity of the underlying buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.as_ref().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes between the offset and the end of the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len() - self.offset
    }

    /// The prefix `0..offset`, i.e. everything written so far by a writer
    /// that never seeks backwards.
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.buf.as_ref()[..self.offset]
    }

    #[inline]
    pub fn get_ref(&self) -> &B {
        &self.buf
    }

    #[inline]
    pub fn into_inner(self) -> B {
        self.buf
    }

    /// Resets the offset to 0. Buffer contents are left alone.
    #[inline]
    pub fn rewind(&mut self) {
        self.offset = 0;
    }

    /// Repositions the cursor.
    ///
    /// `SeekFrom::Start` is absolute; `Current` and `End` are relative. The
    /// resulting offset must lie in `0..=len()`.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<usize, StreamError> {
        let len = self.len();
        let target: i128 = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::Current(d) => self.offset as i128 + d as i128,
            SeekFrom::End(d) => len as i128 + d as i128,
        };

        if target < 0 || target > len as i128 {
            return Err(StreamError::OutOfBounds {
                offset: self.offset,
                requested: target.unsigned_abs().min(usize::MAX as u128) as usize,
                capacity: len,
            });
        }

        self.offset = target as usize;
        Ok(self.offset)
    }

    /// Copies `dst.len()` bytes out of the buffer and advances.
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), StreamError> {
        let range = self.checked_range(dst.len())?;
        dst.copy_from_slice(&self.buf.as_ref()[range.clone()]);
        self.offset = range.end;
        Ok(())
    }

    /// Reads one POD value. No alignment is required of the buffer.
    pub fn read<T: Pod>(&mut self) -> Result<T, StreamError> {
        let range = self.checked_range(std::mem::size_of::<T>())?;
        let value = bytemuck::pod_read_unaligned(&self.buf.as_ref()[range.clone()]);
        self.offset = range.end;
        Ok(value)
    }

    fn checked_range(&self, n: usize) -> Result<std::ops::Range<usize>, StreamError> {
        let capacity = self.len();
        match self.offset.checked_add(n) {
            Some(end) if end <= capacity => Ok(self.offset..end),
            _ => Err(StreamError::OutOfBounds {
                offset: self.offset,
                requested: n,
                capacity,
            }),
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BinaryCursor<B> {
    /// Copies `src` into the buffer and advances.
    pub fn write_bytes(&mut self, src: &[u8]) -> Result<(), StreamError> {
        let range = self.checked_range(src.len())?;
        self.buf.as_mut()[range.clone()].copy_from_slice(src);
        self.offset = range.end;
        Ok(())
    }

    /// Writes one POD value as its raw bytes.
    #[inline]
    pub fn write<T: Pod>(&mut self, value: &T) -> Result<(), StreamError> {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Borrows a read-only cursor over the same bytes at the same offset.
    #[inline]
    pub fn as_reader(&self) -> BinaryCursor<&[u8]> {
        BinaryCursor {
            buf: self.buf.as_ref(),
            offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(n: usize) -> BinaryCursor<Vec<u8>> {
        BinaryCursor::new(vec![0u8; n])
    }

    // ── round trip ────────────────────────────────────────────────────────

    #[test]
    fn pod_values_read_back_after_rewind() {
        let mut c = cursor(64);
        c.write(&42i32).unwrap();
        c.write(&-1.5f32).unwrap();
        c.write(&[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        c.write(&0xDEAD_BEEF_u64).unwrap();
        c.write(&7u8).unwrap();

        c.rewind();
        assert_eq!(c.read::<i32>().unwrap(), 42);
        assert_eq!(c.read::<f32>().unwrap(), -1.5);
        assert_eq!(c.read::<[f32; 4]>().unwrap(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(c.read::<u64>().unwrap(), 0xDEAD_BEEF);
        assert_eq!(c.read::<u8>().unwrap(), 7);
    }

    #[test]
    fn unaligned_reads_are_allowed() {
        let mut c = cursor(16);
        c.write(&1u8).unwrap();
        c.write(&0x0102_0304_u32).unwrap();
        c.seek(SeekFrom::Start(1)).unwrap();
        assert_eq!(c.read::<u32>().unwrap(), 0x0102_0304);
    }

    #[test]
    fn written_tracks_prefix() {
        let mut c = cursor(8);
        c.write_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(c.written(), &[1, 2, 3]);
        assert_eq!(c.remaining(), 5);
    }

    // ── bounds ────────────────────────────────────────────────────────────

    #[test]
    fn write_past_end_fails_without_advancing() {
        let mut c = cursor(6);
        c.write(&1u32).unwrap();
        let err = c.write(&2u32).unwrap_err();
        assert_eq!(
            err,
            StreamError::OutOfBounds { offset: 4, requested: 4, capacity: 6 }
        );
        assert_eq!(c.offset(), 4);
    }

    #[test]
    fn read_past_end_fails() {
        let mut c = BinaryCursor::new(&[0u8; 3][..]);
        assert!(c.read::<u32>().is_err());
        assert_eq!(c.offset(), 0);
    }

    #[test]
    fn exact_fit_succeeds() {
        let mut c = cursor(4);
        c.write(&9u32).unwrap();
        assert_eq!(c.remaining(), 0);
    }

    // ── seek ──────────────────────────────────────────────────────────────

    #[test]
    fn seek_absolute_and_relative() {
        let mut c = cursor(32);
        assert_eq!(c.seek(SeekFrom::Start(10)).unwrap(), 10);
        assert_eq!(c.seek(SeekFrom::Current(-4)).unwrap(), 6);
        assert_eq!(c.seek(SeekFrom::Current(2)).unwrap(), 8);
        assert_eq!(c.seek(SeekFrom::End(-2)).unwrap(), 30);
    }

    #[test]
    fn seek_to_end_is_legal_past_end_is_not() {
        let mut c = cursor(8);
        assert_eq!(c.seek(SeekFrom::Start(8)).unwrap(), 8);
        assert!(c.seek(SeekFrom::Current(1)).is_err());
        assert!(c.seek(SeekFrom::Current(-9)).is_err());
        assert_eq!(c.offset(), 8);
    }

    #[test]
    fn reader_shares_bytes_and_offset() {
        let mut c = cursor(8);
        c.write(&5u16).unwrap();
        let mut r = c.as_reader();
        r.rewind();
        assert_eq!(r.read::<u16>().unwrap(), 5);
    }
}
