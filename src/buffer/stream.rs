use {
  bitvec::prelude::{BitSlice, BitVec, Msb0},
  crate::{
    buffer::{BitBuffer, ByteStore},
    element::ElementCodec,
    error::MatrixError as Error,
  },
};

type Result<T> = std::result::Result<T, Error>;

/// A sequential, read-only cursor over a `BitBuffer`.
///
/// Every read advances the position. Once closed, every operation fails with
/// an `IllegalState` error.
#[derive(Debug)]
pub struct BitReader<'a, S: ByteStore> {
  buffer: &'a BitBuffer<S>,
  position: usize,
  closed: bool,
}
impl<'a, S: ByteStore> BitReader<'a, S> {
  /// Creates a reader over `buffer` starting at `position`.
  pub fn new(buffer: &'a BitBuffer<S>, position: usize) -> Self {
    BitReader {
      buffer,
      position,
      closed: false,
    }
  }
  /// The index of the next bit to be read.
  pub fn position(&self) -> usize {
    self.position
  }
  /// Returns true if the reader is open and has bits left.
  pub fn has_next(&self) -> bool {
    !self.closed && self.position < self.buffer.len()
  }
  /// Moves the reader to `position`.
  pub fn seek(&mut self, position: usize) -> Result<()> {
    self.check_open()?;
    self.position = position;
    Ok(())
  }
  /// Steps over `count` bits without reading them.
  pub fn skip(&mut self, count: usize) -> Result<()> {
    self.check_open()?;
    self.position += count;
    Ok(())
  }
  /// Reads one bit.
  pub fn read_bit(&mut self) -> Result<bool> {
    self.check_open()?;
    let bit = self.buffer.get_bit(self.position)?;
    self.position += 1;
    Ok(bit)
  }
  /// Reads `width` bits as a big-endian unsigned integer.
  pub fn read_uint(&mut self, width: usize) -> Result<u64> {
    self.check_open()?;
    let value = self.buffer.get_uint(self.position, width)?;
    self.position += width;
    Ok(value)
  }
  /// Reads `count` bits.
  pub fn read_bits(&mut self, count: usize) -> Result<BitVec<u8, Msb0>> {
    self.check_open()?;
    let bits = self.buffer.get_bits(self.position, count)?;
    self.position += count;
    Ok(bits)
  }
  /// Reads one `width`-bit element through `codec`.
  pub fn read_with<T, C>(&mut self, width: u8, codec: &C) -> Result<T>
  where C: ElementCodec<T> + ?Sized {
    self.check_open()?;
    let value = self.buffer.get_with(self.position, width, codec)?;
    self.position += width as usize;
    Ok(value)
  }
  /// Closes the reader.
  pub fn close(&mut self) {
    self.closed = true;
  }
  /// Returns true once `close` has been called.
  pub fn is_closed(&self) -> bool {
    self.closed
  }
  fn check_open(&self) -> Result<()> {
    if self.closed {
      return Err(Error::IllegalState {
        reason: "bit reader is closed".into(),
      })
    }
    Ok(())
  }
}

/// An appending writer over a `BitBuffer`.
///
/// Writes always land at the end of the buffer. `truncate` rewinds to an
/// earlier mark, discarding everything written after it.
#[derive(Debug)]
pub struct BitWriter<'a, S: ByteStore> {
  buffer: &'a mut BitBuffer<S>,
  closed: bool,
}
impl<'a, S: ByteStore> BitWriter<'a, S> {
  /// Creates a writer appending to `buffer`.
  pub fn new(buffer: &'a mut BitBuffer<S>) -> Self {
    BitWriter {
      buffer,
      closed: false,
    }
  }
  /// The index the next bit will be written to.
  pub fn position(&self) -> usize {
    self.buffer.len()
  }
  /// Appends one bit.
  pub fn write_bit(&mut self, bit: bool) -> Result<()> {
    self.check_open()?;
    self.buffer.push_bit(bit)
  }
  /// Appends the low `width` bits of `value`.
  pub fn write_uint(&mut self, width: usize, value: u64) -> Result<()> {
    self.check_open()?;
    self.buffer.push_uint(width, value)
  }
  /// Appends `bits`.
  pub fn write_bits(&mut self, bits: &BitSlice<u8, Msb0>) -> Result<()> {
    self.check_open()?;
    self.buffer.push_bits(bits)
  }
  /// Appends `value` encoded into `width` bits by `codec`.
  pub fn write_with<T, C>(&mut self, width: u8, value: &T, codec: &C) -> Result<()>
  where C: ElementCodec<T> + ?Sized {
    self.check_open()?;
    let position = self.buffer.len();
    self.buffer.set_with(position, width, value, codec)
  }
  /// Discards everything written from `mark` onwards.
  pub fn truncate(&mut self, mark: usize) -> Result<()> {
    self.check_open()?;
    self.buffer.truncate(mark);
    Ok(())
  }
  /// Closes the writer.
  pub fn close(&mut self) {
    self.closed = true;
  }
  fn check_open(&self) -> Result<()> {
    if self.closed {
      return Err(Error::IllegalState {
        reason: "bit writer is closed".into(),
      })
    }
    Ok(())
  }
}
