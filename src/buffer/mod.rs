mod store;
mod stream;

pub use store::{ByteStore, FileStore, MemoryStore, Storage};
pub use stream::{BitReader, BitWriter};

use {
  bitvec::prelude::{BitSlice, BitVec, Msb0},
  serde::{Deserialize, Serialize},
  std::path::Path,
  crate::{
    config::Backing,
    element::ElementCodec,
    error::MatrixError as Error,
  },
};

type Result<T> = std::result::Result<T, Error>;

const BITS_PER_BYTE: usize = 8;

/// A growable, bit-addressable buffer over a `ByteStore`.
///
/// Bit 0 of every byte is its most significant bit and multi-bit integers are
/// stored big-endian, so the buffer reads left-to-right like a bit string.
/// The logical length (`len`) is tracked separately from the capacity of the
/// store; the capacity at least doubles whenever a write runs past it and
/// `trim` hands the slack back.
///
/// There is no insert primitive. Callers splice by reading the tail, writing
/// the new bits at the target offset and writing the tail back after them.
/// ```
/// fn main() -> Result<(), quad_matrix::error::MatrixError> {
///   use quad_matrix::buffer::BitBuffer;
///   let mut buffer = BitBuffer::new();
///   buffer.push_uint(8, 0b1010_0101)?;
///   buffer.delete(0, 4)?;
///   assert_eq!(4, buffer.len());
///   assert_eq!(0b0101, buffer.get_uint(0, 4)?);
///   Ok(())
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitBuffer<S = MemoryStore> {
  store: S,
  len: usize,
}

/* Constructors */
impl BitBuffer<MemoryStore> {
  /// Creates an empty in-memory buffer with room for one byte.
  pub fn new() -> Self {
    Self::with_capacity(BITS_PER_BYTE)
  }
  /// Creates an empty in-memory buffer with room for at least `bits` bits.
  pub fn with_capacity(bits: usize) -> Self {
    BitBuffer {
      store: MemoryStore::new(bytes_for(bits)),
      len: 0,
    }
  }
  /// Creates an in-memory buffer holding a copy of `bits`.
  pub fn from_bits(bits: &BitSlice<u8, Msb0>) -> Self {
    let mut owned: BitVec<u8, Msb0> = bits.to_bitvec();
    owned.set_uninitialized(false);
    let len = owned.len();
    BitBuffer {
      store: MemoryStore::from_bytes(owned.into_vec()),
      len,
    }
  }
}
impl Default for BitBuffer<MemoryStore> {
  fn default() -> Self {
    Self::new()
  }
}
impl BitBuffer<FileStore> {
  /// Creates an empty buffer backed by a new file at `path`.
  pub fn create(path: impl AsRef<Path>) -> Result<Self> {
    Ok(Self::with_store(FileStore::create(path, 1)?))
  }
  /// Opens a buffer previously written to `path` holding `len` bits.
  pub fn open(path: impl AsRef<Path>, len: usize) -> Result<Self> {
    Self::from_store(FileStore::open(path)?, len)
  }
}
impl BitBuffer<Storage> {
  /// Creates an empty buffer on the backing storage described by `backing`.
  pub fn for_backing(backing: &Backing) -> Result<Self> {
    let store = match backing {
      Backing::Memory => Storage::Memory(MemoryStore::new(1)),
      Backing::File { path } => Storage::File(FileStore::create(path, 1)?),
    };
    Ok(Self::with_store(store))
  }
}

/* Public */
impl<S: ByteStore> BitBuffer<S> {
  /// Wraps an empty buffer around `store`. Existing bytes are treated as slack.
  pub fn with_store(store: S) -> Self {
    BitBuffer { store, len: 0 }
  }
  /// Wraps a buffer around `store` whose first `len` bits are meaningful.
  pub fn from_store(store: S, len: usize) -> Result<Self> {
    if bytes_for(len) > store.size() {
      return Err(Error::OutOfBounds {
        index: len,
        len: store.size() * BITS_PER_BYTE,
      })
    }
    Ok(BitBuffer { store, len })
  }
  /// The number of meaningful bits.
  pub fn len(&self) -> usize {
    self.len
  }
  /// Returns true if the buffer holds no bits.
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }
  /// The number of bits the buffer can hold before it has to grow.
  pub fn capacity(&self) -> usize {
    self.store.size() * BITS_PER_BYTE
  }
  /// The backing store.
  pub fn store(&self) -> &S {
    &self.store
  }
  /// Consumes the buffer, returning the backing store.
  pub fn into_store(self) -> S {
    self.store
  }
  /// Forgets every bit without releasing capacity.
  pub fn clear(&mut self) {
    self.len = 0;
  }
  /// Returns the bit at `index`.
  pub fn get_bit(&self, index: usize) -> Result<bool> {
    self.check_read(index, 1)?;
    Ok(self.read_raw(index, 1)? == 1)
  }
  /// Reads `width` (at most 64) bits starting at `index` as a big-endian unsigned integer.
  pub fn get_uint(&self, index: usize, width: usize) -> Result<u64> {
    check_width(width)?;
    self.check_read(index, width)?;
    self.read_raw(index, width)
  }
  /// Copies `count` bits starting at `index`.
  pub fn get_bits(&self, index: usize, count: usize) -> Result<BitVec<u8, Msb0>> {
    self.check_read(index, count)?;
    let mut bits = BitVec::with_capacity(count);
    let mut done = 0;
    while done < count {
      let chunk = (count - done).min(64);
      let value = self.read_raw(index + done, chunk)?;
      for shift in (0..chunk).rev() {
        bits.push((value >> shift) & 1 == 1);
      }
      done += chunk;
    }
    Ok(bits)
  }
  /// Copies `count` bits starting at `index` into left-aligned bytes. Unused
  /// trailing bits of the last byte are zero.
  pub fn get_bytes(&self, index: usize, count: usize) -> Result<Vec<u8>> {
    let mut bits = self.get_bits(index, count)?;
    bits.set_uninitialized(false);
    Ok(bits.into_vec())
  }
  /// Decodes the `width` bits starting at `index` with `codec`.
  pub fn get_with<T, C>(&self, index: usize, width: u8, codec: &C) -> Result<T>
  where C: ElementCodec<T> + ?Sized {
    let bits = self.get_bits(index, width as usize)?;
    Ok(codec.decode(&bits, width))
  }
  /// Sets the bit at `index`. Writing at `len()` appends.
  pub fn set_bit(&mut self, index: usize, bit: bool) -> Result<()> {
    self.prepare_write(index, 1)?;
    self.write_raw(index, 1, bit as u64)
  }
  /// Writes the low `width` (at most 64) bits of `value` starting at `index`.
  pub fn set_uint(&mut self, index: usize, width: usize, value: u64) -> Result<()> {
    check_width(width)?;
    self.prepare_write(index, width)?;
    self.write_raw(index, width, value)
  }
  /// Writes `bits` starting at `index`.
  pub fn set_bits(&mut self, index: usize, bits: &BitSlice<u8, Msb0>) -> Result<()> {
    self.prepare_write(index, bits.len())?;
    for (n, chunk) in bits.chunks(64).enumerate() {
      let value = chunk.iter().by_vals().fold(0u64, |acc, bit| (acc << 1) | bit as u64);
      self.write_raw(index + n * 64, chunk.len(), value)?;
    }
    Ok(())
  }
  /// Encodes `value` with `codec` into `width` bits starting at `index`.
  pub fn set_with<T, C>(&mut self, index: usize, width: u8, value: &T, codec: &C) -> Result<()>
  where C: ElementCodec<T> + ?Sized {
    let bits = codec.encode(value, width);
    if bits.len() != width as usize {
      return Err(Error::invalid(format!(
        "element codec produced {} bits for a width of {}", bits.len(), width
      )))
    }
    self.set_bits(index, &bits)
  }
  /// Appends one bit.
  pub fn push_bit(&mut self, bit: bool) -> Result<()> {
    self.set_bit(self.len, bit)
  }
  /// Appends the low `width` bits of `value`.
  pub fn push_uint(&mut self, width: usize, value: u64) -> Result<()> {
    self.set_uint(self.len, width, value)
  }
  /// Appends `bits`.
  pub fn push_bits(&mut self, bits: &BitSlice<u8, Msb0>) -> Result<()> {
    self.set_bits(self.len, bits)
  }
  /// Removes the bits in `[start, end)`, shifting every following bit left.
  pub fn delete(&mut self, start: usize, end: usize) -> Result<()> {
    if start > end {
      return Err(Error::invalid(format!("cannot delete the bit range {}..{}", start, end)))
    }
    if end > self.len {
      return Err(Error::OutOfBounds {
        index: end,
        len: self.len,
      })
    }
    let tail = self.len - end;
    let mut moved = 0;
    while moved < tail {
      let chunk = (tail - moved).min(64);
      let value = self.read_raw(end + moved, chunk)?;
      self.write_raw(start + moved, chunk, value)?;
      moved += chunk;
    }
    self.len -= end - start;
    tracing::trace!(start, end, len = self.len, "deleted bit range");
    Ok(())
  }
  /// Drops every bit from `len` onwards. Does nothing if the buffer is already shorter.
  pub fn truncate(&mut self, len: usize) {
    self.len = self.len.min(len);
  }
  /// Makes sure `additional` more bits fit without growing again.
  pub fn reserve(&mut self, additional: usize) -> Result<()> {
    self.ensure_capacity(self.len + additional)
  }
  /// Shrinks the backing store to exactly the bytes needed for `len()` bits.
  pub fn trim(&mut self) -> Result<()> {
    let bytes = bytes_for(self.len);
    if bytes != self.store.size() {
      tracing::debug!(from = self.store.size(), to = bytes, "trimming bit buffer");
      self.store.resize(bytes)?;
    }
    Ok(())
  }
  /// A sequential reader starting at bit 0.
  pub fn reader(&self) -> BitReader<'_, S> {
    BitReader::new(self, 0)
  }
  /// A sequential reader starting at `position`.
  pub fn reader_at(&self, position: usize) -> BitReader<'_, S> {
    BitReader::new(self, position)
  }
  /// A writer appending to the end of the buffer.
  pub fn writer(&mut self) -> BitWriter<'_, S> {
    BitWriter::new(self)
  }
  /// Copies every bit.
  pub fn to_bitvec(&self) -> Result<BitVec<u8, Msb0>> {
    self.get_bits(0, self.len)
  }
  /// Renders the bits from `start` onwards as a string of `0`s and `1`s.
  pub fn to_bit_string(&self, start: usize) -> Result<String> {
    if start > self.len {
      return Err(Error::OutOfBounds {
        index: start,
        len: self.len,
      })
    }
    let bits = self.get_bits(start, self.len - start)?;
    Ok(bits.iter().by_vals().map(|bit| if bit { '1' } else { '0' }).collect())
  }
}

/* Private */
impl<S: ByteStore> BitBuffer<S> {
  fn check_read(&self, index: usize, count: usize) -> Result<()> {
    if index + count > self.len {
      return Err(Error::OutOfBounds {
        index: index.max(self.len),
        len: self.len,
      })
    }
    Ok(())
  }
  /* Writes may start anywhere up to len and extend it */
  fn prepare_write(&mut self, index: usize, count: usize) -> Result<()> {
    if index > self.len {
      return Err(Error::OutOfBounds {
        index,
        len: self.len,
      })
    }
    let end = index + count;
    self.ensure_capacity(end)?;
    self.len = self.len.max(end);
    Ok(())
  }
  fn ensure_capacity(&mut self, bits: usize) -> Result<()> {
    let needed = bytes_for(bits);
    let current = self.store.size();
    if needed > current {
      let grown = needed.max(current * 2);
      tracing::trace!(from = current, to = grown, "growing bit buffer");
      self.store.resize(grown)?;
    }
    Ok(())
  }
  /* No logical bounds checks: callers have already validated the range */
  fn read_raw(&self, index: usize, count: usize) -> Result<u64> {
    let mut value = 0u64;
    let mut pos = index;
    let end = index + count;
    while pos < end {
      let offset = pos % BITS_PER_BYTE;
      let take = (BITS_PER_BYTE - offset).min(end - pos);
      let byte = self.store.get(pos / BITS_PER_BYTE)?;
      let chunk = (byte >> (BITS_PER_BYTE - offset - take)) & low_mask(take);
      value = (value << take) | chunk as u64;
      pos += take;
    }
    Ok(value)
  }
  fn write_raw(&mut self, index: usize, count: usize, value: u64) -> Result<()> {
    let mut pos = index;
    let end = index + count;
    while pos < end {
      let offset = pos % BITS_PER_BYTE;
      let take = (BITS_PER_BYTE - offset).min(end - pos);
      let after = end - pos - take;
      let chunk = ((value >> after) as u8) & low_mask(take);
      let shift = BITS_PER_BYTE - offset - take;
      let mask = low_mask(take) << shift;
      let byte_index = pos / BITS_PER_BYTE;
      let byte = self.store.get(byte_index)?;
      self.store.set(byte_index, (byte & !mask) | (chunk << shift))?;
      pos += take;
    }
    Ok(())
  }
}

/* Traits */
impl<S: ByteStore> std::fmt::Display for BitBuffer<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.to_bit_string(0) {
      Ok(bits) => write!(f, "[{}]", bits),
      Err(e) => write!(f, "[unreadable: {}]", e),
    }
  }
}
impl PartialEq for BitBuffer<MemoryStore> {
  fn eq(&self, other: &Self) -> bool {
    self.len == other.len
    && self.to_bitvec().ok() == other.to_bitvec().ok()
  }
}
impl Eq for BitBuffer<MemoryStore> {}

/* Utils */
fn bytes_for(bits: usize) -> usize {
  (bits + BITS_PER_BYTE - 1) / BITS_PER_BYTE
}
fn low_mask(bits: usize) -> u8 {
  ((1u16 << bits) - 1) as u8
}
fn check_width(width: usize) -> Result<()> {
  if width > 64 {
    return Err(Error::invalid(format!("cannot move {} bits through a 64-bit integer", width)))
  }
  Ok(())
}
