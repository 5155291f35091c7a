use {
  serde::{Deserialize, Serialize},
  std::hash::Hash,
  crate::{
    buffer::{BitBuffer, BitReader, BitWriter, ByteStore},
    element::{ElementCodec, PrimitiveCodec},
    error::MatrixError as Error,
    matrix::{DenseMatrix, Matrix},
    tree::{Cursor, Region},
  },
};

type Result<T> = std::result::Result<T, Error>;

const DATUM_WIDTH_BITS: usize = 8;
const DIMENSION_WIDTH_BITS: usize = 5;

/// The fixed-size prefix of every encoded matrix.
///
/// Laid out as `[8 bits bits_per_datum][bits_per_datum bits default]`
/// `[5 bits hw - 1][hw bits height][5 bits ww - 1][ww bits width]`, where `hw`
/// and `ww` are the bit lengths of the dimensions (at least 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header<T> {
  /// Bits used by each stored element.
  pub bits_per_datum: u8,
  /// The value of every cell the tree does not store.
  pub default: T,
  /// Number of rows.
  pub height: usize,
  /// Number of columns.
  pub width: usize,
}
impl<T> Header<T> {
  /// Creates a header, rejecting dimensions that do not fit in 32 bits.
  pub fn new(bits_per_datum: u8, default: T, height: usize, width: usize) -> Result<Self> {
    if height > u32::MAX as usize || width > u32::MAX as usize {
      return Err(Error::invalid(format!(
        "a {}x{} matrix exceeds the largest encodable dimensions", height, width
      )))
    }
    Ok(Header { bits_per_datum, default, height, width })
  }
  /// The number of bits the header occupies, which is also the offset of the root's presence bit.
  pub fn size(&self) -> usize {
    DATUM_WIDTH_BITS + self.bits_per_datum as usize
    + DIMENSION_WIDTH_BITS + dimension_bits(self.height)
    + DIMENSION_WIDTH_BITS + dimension_bits(self.width)
  }
  /// The region covering the whole matrix.
  pub fn root(&self) -> Region {
    Region::new(0, 0, self.height, self.width)
  }
  /// Writes the header through `writer`.
  pub fn write_to<S, C>(&self, writer: &mut BitWriter<'_, S>, codec: &C) -> Result<()>
  where S: ByteStore, C: ElementCodec<T> + ?Sized {
    writer.write_uint(DATUM_WIDTH_BITS, self.bits_per_datum as u64)?;
    writer.write_with(self.bits_per_datum, &self.default, codec)?;
    for &dimension in &[self.height, self.width] {
      let bits = dimension_bits(dimension);
      writer.write_uint(DIMENSION_WIDTH_BITS, bits as u64 - 1)?;
      writer.write_uint(bits, dimension as u64)?;
    }
    Ok(())
  }
  /// Reads a header through `reader`.
  pub fn read_from<S, C>(reader: &mut BitReader<'_, S>, codec: &C) -> Result<Self>
  where S: ByteStore, C: ElementCodec<T> + ?Sized {
    let bits_per_datum = reader.read_uint(DATUM_WIDTH_BITS)? as u8;
    let default = reader.read_with(bits_per_datum, codec)?;
    let mut dimensions = [0usize; 2];
    for dimension in dimensions.iter_mut() {
      let bits = reader.read_uint(DIMENSION_WIDTH_BITS)? as usize + 1;
      *dimension = reader.read_uint(bits)? as usize;
    }
    Ok(Header {
      bits_per_datum,
      default,
      height: dimensions[0],
      width: dimensions[1],
    })
  }
}

/// How the bits of an encoded matrix divide up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodingStats {
  /// Bits spent on the header.
  pub header_bits: usize,
  /// Bits spent on stored element payloads.
  pub data_bits: usize,
  /// Bits spent on presence bits.
  pub ref_bits: usize,
}
impl EncodingStats {
  /// Total size of the encoding in bits.
  pub fn total(&self) -> usize {
    self.header_bits + self.data_bits + self.ref_bits
  }
}

/// The contract shared by static matrix encodings.
pub trait MatrixEncoding<T> {
  /// Encodes `matrix` into a fresh buffer.
  fn encode(&mut self, matrix: &DenseMatrix<T>) -> Result<BitBuffer>;
  /// Decodes a buffer produced by `encode`.
  fn decode(&self, buffer: &BitBuffer) -> Result<DenseMatrix<T>>;
  /// The breakdown of the most recent encoding. All zero before the first.
  fn stats(&self) -> EncodingStats;
}

/// The preorder quadrant tree encoding as a `MatrixEncoding`.
/// ```
/// use quad_matrix::{matrix::DenseMatrix, tree::{MatrixEncoding, QuadTreeEncoder}};
/// let matrix = DenseMatrix::from_vec(2, 2, vec![0u8, 0, 0, 9]).unwrap();
/// let mut encoder = QuadTreeEncoder::new(4);
/// let buffer = encoder.encode(&matrix).unwrap();
/// let decoded: DenseMatrix<u8> = encoder.decode(&buffer).unwrap();
/// assert_eq!(matrix, decoded);
/// assert_eq!(4, MatrixEncoding::<u8>::stats(&encoder).data_bits);
/// ```
#[derive(Debug, Clone)]
pub struct QuadTreeEncoder<C = PrimitiveCodec> {
  /// Bits used by each stored element.
  pub bits_per_datum: u8,
  codec: C,
  stats: EncodingStats,
}
impl QuadTreeEncoder<PrimitiveCodec> {
  /// An encoder for primitive elements of the given width.
  pub fn new(bits_per_datum: u8) -> Self {
    Self::with_codec(bits_per_datum, PrimitiveCodec)
  }
}
impl<C> QuadTreeEncoder<C> {
  /// An encoder using a custom element codec.
  pub fn with_codec(bits_per_datum: u8, codec: C) -> Self {
    QuadTreeEncoder {
      bits_per_datum,
      codec,
      stats: EncodingStats::default(),
    }
  }
}
impl<T, C> MatrixEncoding<T> for QuadTreeEncoder<C>
where T: Clone + Eq + Hash + Default, C: ElementCodec<T> {
  fn encode(&mut self, matrix: &DenseMatrix<T>) -> Result<BitBuffer> {
    let mut buffer = BitBuffer::new();
    let (_, stats) = encode_into(matrix, self.bits_per_datum, &self.codec, &mut buffer)?;
    self.stats = stats;
    Ok(buffer)
  }
  fn decode(&self, buffer: &BitBuffer) -> Result<DenseMatrix<T>> {
    decode(buffer, &self.codec)
  }
  fn stats(&self) -> EncodingStats {
    self.stats
  }
}

/// Encodes `matrix` into a new in-memory buffer.
///
/// The most frequent value becomes the default; ties go to the value seen
/// first in row-major order, and an empty matrix uses `T::default()`.
pub fn encode<T, C>(matrix: &DenseMatrix<T>, bits_per_datum: u8, codec: &C) -> Result<BitBuffer>
where T: Clone + Eq + Hash + Default, C: ElementCodec<T> + ?Sized {
  let mut buffer = BitBuffer::with_capacity(matrix.len());
  encode_into(matrix, bits_per_datum, codec, &mut buffer)?;
  Ok(buffer)
}

/// Appends the encoding of `matrix` to `buffer`, which should be empty.
pub fn encode_into<T, C, S>(
  matrix: &DenseMatrix<T>,
  bits_per_datum: u8,
  codec: &C,
  buffer: &mut BitBuffer<S>,
) -> Result<(Header<T>, EncodingStats)>
where T: Clone + Eq + Hash + Default, C: ElementCodec<T> + ?Sized, S: ByteStore {
  let default = matrix.mode().cloned().unwrap_or_default();
  let header = Header::new(bits_per_datum, default, matrix.height, matrix.width)?;
  if !codec.fits(&header.default, bits_per_datum) {
    return Err(Error::invalid(format!("the default value does not fit in {} bits", bits_per_datum)))
  }
  for (index, value) in matrix.as_slice().iter().enumerate() {
    if *value != header.default && !codec.fits(value, bits_per_datum) {
      return Err(Error::invalid(format!(
        "cell ({}, {}) does not fit in {} bits", index / matrix.width, index % matrix.width, bits_per_datum
      )))
    }
  }
  let remaining = matrix.as_slice().iter().filter(|&value| *value != header.default).count();
  let mut writer = buffer.writer();
  let start = writer.position();
  header.write_to(&mut writer, codec)?;
  let mut context = EncodeContext {
    matrix,
    default: &header.default,
    bits_per_datum,
    codec,
    remaining,
    writer,
  };
  context.visit(header.root())?;
  let total = context.writer.position() - start;
  let stats = EncodingStats {
    header_bits: header.size(),
    data_bits: remaining * bits_per_datum as usize,
    ref_bits: total - header.size() - remaining * bits_per_datum as usize,
  };
  tracing::debug!(
    height = header.height,
    width = header.width,
    stored = remaining,
    bits = total,
    "encoded matrix"
  );
  Ok((header, stats))
}

/// Decodes a whole buffer back into a dense matrix.
pub fn decode<T, C, S>(buffer: &BitBuffer<S>, codec: &C) -> Result<DenseMatrix<T>>
where T: Clone, C: ElementCodec<T> + ?Sized, S: ByteStore {
  decode_tree(buffer, codec).map_err(Error::corrupted)
}

fn decode_tree<T, C, S>(buffer: &BitBuffer<S>, codec: &C) -> Result<DenseMatrix<T>>
where T: Clone, C: ElementCodec<T> + ?Sized, S: ByteStore {
  let mut reader = buffer.reader();
  let header = Header::read_from(&mut reader, codec)?;
  let mut matrix = DenseMatrix::new(header.height, header.width, header.default.clone());
  let mut cursor = Cursor::new(header.root());
  loop {
    let region = cursor.current();
    let more = if !reader.read_bit()? {
      cursor.skip_children()
    }
    else if region.is_leaf() {
      let value = reader.read_with(header.bits_per_datum, codec)?;
      matrix.set(region.row, region.col, value)?;
      cursor.get_next()
    }
    else {
      cursor.get_next()
    };
    if !more { break }
  }
  Ok(matrix)
}

/* Encoding state threaded through the preorder visit */
struct EncodeContext<'a, 'b, T, C: ?Sized, S: ByteStore> {
  matrix: &'a DenseMatrix<T>,
  default: &'a T,
  bits_per_datum: u8,
  codec: &'a C,
  remaining: usize,
  writer: BitWriter<'b, S>,
}
impl<'a, 'b, T, C, S> EncodeContext<'a, 'b, T, C, S>
where T: Eq, C: ElementCodec<T> + ?Sized, S: ByteStore {
  /* Returns true if anything below `region` was stored */
  fn visit(&mut self, region: Region) -> Result<bool> {
    if self.remaining == 0 {
      self.writer.write_bit(false)?;
      return Ok(false)
    }
    if region.is_leaf() {
      let value = self.matrix.cell(region.row, region.col)?;
      if value == self.default {
        self.writer.write_bit(false)?;
        return Ok(false)
      }
      self.writer.write_bit(true)?;
      self.writer.write_with(self.bits_per_datum, value, self.codec)?;
      self.remaining -= 1;
      return Ok(true)
    }
    let mark = self.writer.position();
    self.writer.write_bit(true)?;
    let mut stored = false;
    for (_, child) in region.children() {
      stored |= self.visit(child)?;
    }
    if !stored {
      self.writer.truncate(mark)?;
      self.writer.write_bit(false)?;
    }
    Ok(stored)
  }
}

fn dimension_bits(dimension: usize) -> usize {
  ((usize::BITS - dimension.leading_zeros()) as usize).max(1)
}
