use {
  bitvec::prelude::{BitVec, Msb0},
  std::hash::Hash,
  crate::{
    buffer::{BitBuffer, ByteStore, MemoryStore, Storage},
    config::MatrixConfig,
    element::{ElementCodec, PrimitiveCodec},
    error::MatrixError as Error,
    matrix::{check_coordinates, check_range, DenseMatrix, Matrix},
    tree::{
      codec::{encode_into, Header},
      iterators::{Order, Ordered, Points},
      Cursor,
      OffsetCache,
      Region,
    },
  },
};

type Result<T> = std::result::Result<T, Error>;

type Key = (usize, usize);

/// A compressed matrix that supports random reads and writes without being decoded.
///
/// The cells are kept as a preorder quadrant tree in a `BitBuffer`: every
/// visited region gets a presence bit, `0` meaning the whole region holds the
/// default value and `1` meaning some cell below differs from it. Leaves with a
/// `1` are followed by the element's payload. Writes splice the buffer in
/// place, so the encoding stays canonical and never needs rebuilding.
///
/// An LRU `OffsetCache` remembers the bit offsets of recently visited regions
/// so reads and writes start from the deepest cached region instead of the root.
///
/// ```
/// fn main() -> Result<(), quad_matrix::error::MatrixError> {
///   use quad_matrix::{CompressedMatrix, DenseMatrix};
///   let dense = DenseMatrix::new(8, 8, 0u16);
///   let mut matrix = CompressedMatrix::from_dense(&dense, 12)?;
///   matrix.set(6, 5, 300)?;
///   matrix.set(0, 4, 7)?;
///   matrix.set(0, 4, 0)?;
///   assert_eq!(300, matrix.get(6, 5)?);
///   assert_eq!(0, matrix.get(0, 4)?);
///   assert_eq!(vec![0, 0, 0, 0, 0, 300, 0, 0], matrix.get_row(6)?);
///   Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct CompressedMatrix<T, C = PrimitiveCodec, S: ByteStore = MemoryStore> {
  buffer: BitBuffer<S>,
  codec: C,
  header: Header<T>,
  header_size: usize,
  cache: OffsetCache<Key, usize>,
  row_hint: Option<RowHint>,
}

/* Constructors */
impl<T> CompressedMatrix<T>
where T: Clone + Eq + Hash + Default, PrimitiveCodec: ElementCodec<T> {
  /// Compresses `matrix` in memory with the default configuration.
  pub fn from_dense(matrix: &DenseMatrix<T>, bits_per_datum: u8) -> Result<Self> {
    Self::encode(matrix, bits_per_datum, PrimitiveCodec, BitBuffer::new(), &MatrixConfig::default())
  }
}
impl<T, C> CompressedMatrix<T, C, Storage>
where T: Clone + Eq + Hash + Default, C: ElementCodec<T> {
  /// Compresses `matrix` onto the storage named by `config.backing`.
  pub fn build(matrix: &DenseMatrix<T>, bits_per_datum: u8, codec: C, config: &MatrixConfig) -> Result<Self> {
    config.validate()?;
    let buffer = BitBuffer::for_backing(&config.backing)?;
    Self::encode(matrix, bits_per_datum, codec, buffer, config)
  }
}
impl<T, C, S> CompressedMatrix<T, C, S>
where T: Clone + PartialEq, C: ElementCodec<T>, S: ByteStore {
  /// Compresses `matrix` into `buffer`, which must be empty.
  pub fn encode(
    matrix: &DenseMatrix<T>,
    bits_per_datum: u8,
    codec: C,
    mut buffer: BitBuffer<S>,
    config: &MatrixConfig,
  ) -> Result<Self>
  where T: Eq + Hash + Default {
    config.validate()?;
    if !buffer.is_empty() {
      return Err(Error::invalid("cannot encode into a buffer that already holds bits"))
    }
    let (header, _) = encode_into(matrix, bits_per_datum, &codec, &mut buffer)?;
    if config.trim_on_build {
      buffer.trim()?;
    }
    Self::assemble(buffer, codec, header, config)
  }
  /// Wraps a buffer that already holds an encoded matrix.
  pub fn from_buffer(buffer: BitBuffer<S>, codec: C, config: &MatrixConfig) -> Result<Self> {
    config.validate()?;
    let header = Header::read_from(&mut buffer.reader(), &codec).map_err(Error::corrupted)?;
    if buffer.len() <= header.size() {
      return Err(Error::corrupted(Error::OutOfBounds {
        index: header.size(),
        len: buffer.len(),
      }))
    }
    Self::assemble(buffer, codec, header, config)
  }
  fn assemble(buffer: BitBuffer<S>, codec: C, header: Header<T>, config: &MatrixConfig) -> Result<Self> {
    let capacity = config.cache_capacity(header.height, header.width);
    let mut matrix = CompressedMatrix {
      header_size: header.size(),
      cache: OffsetCache::new(capacity),
      buffer,
      codec,
      header,
      row_hint: None,
    };
    if config.warm_cache {
      matrix.warm_cache()?;
    }
    tracing::debug!(
      height = matrix.header.height,
      width = matrix.header.width,
      bits = matrix.buffer.len(),
      cache_capacity = capacity,
      cached = matrix.cache.len(),
      "built compressed matrix"
    );
    Ok(matrix)
  }
}

/* Public */
impl<T, C, S> CompressedMatrix<T, C, S>
where T: Clone + PartialEq, C: ElementCodec<T>, S: ByteStore {
  /// Returns the value of the cell at `(row, col)`.
  pub fn get(&mut self, row: usize, col: usize) -> Result<T> {
    self.read_cell(row, col).map_err(Error::read)
  }
  /// Changes the value of the cell at `(row, col)`.
  ///
  /// Writing the default over a stored value collapses every region left
  /// holding only defaults; writing anything else over a default region
  /// expands it down to the cell. Writing the current value changes nothing.
  /// ```
  /// fn main() -> Result<(), quad_matrix::error::MatrixError> {
  ///   use quad_matrix::{CompressedMatrix, DenseMatrix};
  ///   let mut matrix = CompressedMatrix::from_dense(&DenseMatrix::new(4, 4, 0u8), 8)?;
  ///   let empty = matrix.bit_len();
  ///   matrix.set(2, 3, 7)?;
  ///   assert!(matrix.bit_len() > empty);
  ///   matrix.set(2, 3, 0)?;
  ///   assert_eq!(empty, matrix.bit_len());
  ///   Ok(())
  /// }
  /// ```
  pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
    self.write_cell(row, col, value).map_err(Error::write)
  }
  /// Returns the `height` x `width` rectangle whose top-left cell is `(row, col)`, row by row.
  pub fn bulk_get(&mut self, row: usize, col: usize, height: usize, width: usize) -> Result<Vec<T>> {
    self.read_rectangle(row, col, height, width).map_err(Error::read)
  }
  /// Returns every cell of a row, ordered by column.
  ///
  /// Reading rows in ascending order resumes each scan where the previous one
  /// passed the start of the next row.
  pub fn get_row(&mut self, row: usize) -> Result<Vec<T>> {
    if row >= self.header.height {
      return Err(Error::read(Error::InvalidCoordinates {
        row_col: [row, 0],
        height_width: [self.header.height, self.header.width],
      }))
    }
    self.bulk_get(row, 0, 1, self.header.width)
  }
  /// Returns every cell of a column, ordered by row.
  pub fn get_column(&mut self, col: usize) -> Result<Vec<T>> {
    if col >= self.header.width {
      return Err(Error::read(Error::InvalidCoordinates {
        row_col: [0, col],
        height_width: [self.header.height, self.header.width],
      }))
    }
    self.bulk_get(0, col, self.header.height, 1)
  }
  /// Iterates over every cell in the native preorder of the tree.
  pub fn iter(&self) -> Points<'_, T, C, S> {
    Points::new(self, self.header.root(), Cursor::new(self.header.root()), self.header_size)
  }
  /// Iterates over the cells of a rectangle in the native preorder of the tree.
  pub fn iter_region(&self, row: usize, col: usize, height: usize, width: usize) -> Result<Points<'_, T, C, S>> {
    check_range(row, col, height, width, self.header.height, self.header.width).map_err(Error::read)?;
    let frame = Region::new(row, col, height, width);
    if frame.is_empty() {
      return Ok(Points::new(self, frame, Cursor::new(self.header.root()), self.header_size))
    }
    let start = self.locate(row, col).map_err(Error::read)?;
    Ok(Points::new(self, frame, start.cursor, start.offset))
  }
  /// Iterates over every cell in row-major or column-major order.
  pub fn iter_ordered(&self, order: Order) -> Ordered<'_, T, C, S> {
    Ordered::new(self.iter(), order)
  }
  /// Decodes every cell into a `DenseMatrix`.
  pub fn to_dense(&self) -> Result<DenseMatrix<T>> {
    let mut dense = DenseMatrix::new(self.header.height, self.header.width, self.header.default.clone());
    for point in self.iter() {
      let point = point?;
      if point.value != self.header.default {
        Matrix::set(&mut dense, point.row, point.col, point.value)?;
      }
    }
    Ok(dense)
  }
  /// Number of rows.
  pub fn height(&self) -> usize {
    self.header.height
  }
  /// Number of columns.
  pub fn width(&self) -> usize {
    self.header.width
  }
  /// Number of cells.
  pub fn len(&self) -> usize {
    self.header.height * self.header.width
  }
  /// Returns true if the matrix has no cells.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
  /// The value of every cell the tree does not store.
  pub fn default_value(&self) -> &T {
    &self.header.default
  }
  /// Bits used by each stored element.
  pub fn bits_per_datum(&self) -> u8 {
    self.header.bits_per_datum
  }
  /// Bits occupied by the header, which is also the offset of the root region.
  pub fn header_size(&self) -> usize {
    self.header_size
  }
  /// Current size of the encoding in bits.
  pub fn bit_len(&self) -> usize {
    self.buffer.len()
  }
  /// Number of region offsets currently cached.
  pub fn cache_len(&self) -> usize {
    self.cache.len()
  }
  /// Maximum number of region offsets the cache may hold.
  pub fn cache_capacity(&self) -> usize {
    self.cache.capacity()
  }
  /// Releases spare buffer capacity.
  pub fn trim(&mut self) -> Result<()> {
    tracing::debug!(bits = self.buffer.len(), capacity = self.buffer.capacity(), "trimming matrix buffer");
    self.buffer.trim()
  }
  /// The encoded bits.
  pub fn buffer(&self) -> &BitBuffer<S> {
    &self.buffer
  }
  /// Consumes the matrix, returning the encoded bits.
  pub fn into_buffer(self) -> BitBuffer<S> {
    self.buffer
  }
}

/* Traits */
impl<T, C, S> Matrix<T> for CompressedMatrix<T, C, S>
where T: Clone + PartialEq, C: ElementCodec<T>, S: ByteStore {
  fn height(&self) -> usize {
    self.header.height
  }
  fn width(&self) -> usize {
    self.header.width
  }
  fn get(&mut self, row: usize, col: usize) -> Result<T> {
    CompressedMatrix::get(self, row, col)
  }
  fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
    CompressedMatrix::set(self, row, col, value)
  }
  fn bulk_get(&mut self, row: usize, col: usize, height: usize, width: usize) -> Result<Vec<T>> {
    CompressedMatrix::bulk_get(self, row, col, height, width)
  }
  fn to_dense(&mut self) -> Result<DenseMatrix<T>> {
    CompressedMatrix::to_dense(self)
  }
}
impl<T, C, S> std::fmt::Display for CompressedMatrix<T, C, S>
where T: std::fmt::Debug, S: ByteStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let bits = self.buffer.to_bit_string(self.header_size).unwrap_or_default();
    write!(
      f,
      "{}x{} default={:?} [{}]",
      self.header.height, self.header.width, self.header.default, bits
    )
  }
}

/* Private */

/* Where a scan of a given row may start instead of descending from the root */
#[derive(Debug, Clone)]
struct RowHint {
  row: usize,
  cursor: Cursor,
  offset: usize,
}

/* Cache changes queued by a descent, applied only once the operation succeeds */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
  Touch(Key),
  Put(Key, usize),
}

/* The state of a walk towards one target cell */
#[derive(Debug, Clone)]
pub(super) struct Descent {
  pub(super) cursor: Cursor,
  pub(super) offset: usize,
  /* ancestry[d] is the offset of the region at depth d that holds the target */
  ancestry: Vec<usize>,
  pending: Vec<Pending>,
}
impl Descent {
  fn visit_containing(&mut self, offset: usize) {
    let depth = self.cursor.depth();
    self.ancestry.truncate(depth);
    self.ancestry.push(offset);
    if cacheable(&self.cursor) {
      self.pending.push(Pending::Put(self.cursor.current().key(), offset));
    }
  }
}

/* The root is pinned and first children sit right after their parent's bit */
fn cacheable(cursor: &Cursor) -> bool {
  !cursor.is_root() && cursor.quadrant() != 0
}

impl<T, C, S> CompressedMatrix<T, C, S>
where T: Clone + PartialEq, C: ElementCodec<T>, S: ByteStore {
  pub(super) fn bit(&self, offset: usize) -> Result<bool> {
    self.buffer.get_bit(offset)
  }
  pub(super) fn payload(&self, offset: usize) -> Result<T> {
    self.buffer.get_with(offset + 1, self.header.bits_per_datum, &self.codec)
  }
  pub(super) fn datum_bits(&self) -> usize {
    self.header.bits_per_datum as usize
  }
  fn read_cell(&mut self, row: usize, col: usize) -> Result<T> {
    check_coordinates(row, col, self.header.height, self.header.width)?;
    let mut descent = self.locate(row, col)?;
    self.decode_until(&mut descent, row, col)?;
    let value = if self.bit(descent.offset)? {
      self.payload(descent.offset)?
    }
    else {
      self.header.default.clone()
    };
    self.commit(descent.pending);
    Ok(value)
  }
  fn write_cell(&mut self, row: usize, col: usize, value: T) -> Result<()> {
    check_coordinates(row, col, self.header.height, self.header.width)?;
    if value != self.header.default && !self.codec.fits(&value, self.header.bits_per_datum) {
      return Err(Error::invalid(format!(
        "value for ({}, {}) does not fit in {} bits", row, col, self.header.bits_per_datum
      )))
    }
    let mut descent = self.locate(row, col)?;
    self.decode_until(&mut descent, row, col)?;
    let present = self.bit(descent.offset)?;
    if value == self.header.default {
      if present {
        self.collapse(&mut descent)?;
      }
    }
    else if present {
      if self.payload(descent.offset)? != value {
        let at = descent.offset + 1;
        self.buffer.set_with(at, self.header.bits_per_datum, &value, &self.codec)?;
      }
    }
    else {
      self.expand(&mut descent, row, col, &value)?;
    }
    self.commit(descent.pending);
    Ok(())
  }
  fn read_rectangle(&mut self, row: usize, col: usize, height: usize, width: usize) -> Result<Vec<T>> {
    check_range(row, col, height, width, self.header.height, self.header.width)?;
    let frame = Region::new(row, col, height, width);
    if frame.is_empty() {
      return Ok(Vec::new())
    }
    let hinted = match self.row_hint.take() {
      Some(hint) if hint.row == row && col == 0 => Some(hint),
      _ => None,
    };
    let (cursor, offset, pending) = match hinted {
      Some(hint) => (hint.cursor, hint.offset, Vec::new()),
      None => {
        let start = self.locate(row, col)?;
        (start.cursor, start.offset, start.pending)
      },
    };
    let mut cells = vec![self.header.default.clone(); frame.size()];
    let mut points = Points::new(self, frame, cursor, offset).watch_row(row + height);
    for point in &mut points {
      let point = point?;
      cells[(point.row - row) * width + (point.col - col)] = point.value;
    }
    let next = points.into_row_start();
    self.row_hint = next.map(|(cursor, offset)| RowHint { row: row + height, cursor, offset });
    self.commit(pending);
    Ok(cells)
  }
  /* Deepest resolvable start for a walk to (row, col): the root, then cached
  children holding the target; on a miss, the nearest earlier sibling that
  resolves. Only reads the buffer. */
  pub(super) fn locate(&self, row: usize, col: usize) -> Result<Descent> {
    let mut descent = Descent {
      cursor: Cursor::new(self.header.root()),
      offset: self.header_size,
      ancestry: vec![self.header_size],
      pending: Vec::new(),
    };
    loop {
      let region = descent.cursor.current();
      if region.is_leaf() || !self.bit(descent.offset)? {
        return Ok(descent)
      }
      let quadrant = match descent.cursor.descend_containing(row, col) {
        Some(quadrant) => quadrant,
        None => return Ok(descent),
      };
      if let Some(offset) = self.resolve(region, descent.offset, quadrant) {
        descent.offset = offset;
        descent.ancestry.push(offset);
        if quadrant != 0 {
          descent.pending.push(Pending::Touch(descent.cursor.current().key()));
        }
        continue
      }
      /* The first child always resolves, so this ends on a known sibling */
      while let Some((sibling, _)) = descent.cursor.prev_sibling() {
        descent.cursor.ascend();
        descent.cursor.descend(sibling);
        if let Some(offset) = self.resolve(region, descent.offset, sibling) {
          descent.offset = offset;
          if sibling != 0 {
            descent.pending.push(Pending::Touch(descent.cursor.current().key()));
          }
          break
        }
      }
      return Ok(descent)
    }
  }
  /* Offset of a child of a present region, if it is known without decoding */
  fn resolve(&self, parent: Region, parent_offset: usize, quadrant: u8) -> Option<usize> {
    let child = parent.child(quadrant)?;
    if quadrant == 0 {
      Some(parent_offset + 1)
    }
    else {
      self.cache.peek(&child.key()).copied()
    }
  }
  /* Walks forward in preorder until the cursor rests on the target leaf or on
  the default region holding it, queuing every region passed that holds it */
  fn decode_until(&self, descent: &mut Descent, row: usize, col: usize) -> Result<()> {
    loop {
      let region = descent.cursor.current();
      let holds_target = region.contains(row, col);
      if holds_target {
        descent.visit_containing(descent.offset);
        if region.is_leaf() {
          return Ok(())
        }
      }
      let moved = if self.bit(descent.offset)? {
        descent.offset += 1;
        if region.is_leaf() {
          descent.offset += self.datum_bits();
        }
        descent.cursor.get_next()
      }
      else {
        if holds_target {
          return Ok(())
        }
        descent.offset += 1;
        descent.cursor.skip_children()
      };
      if !moved {
        return Err(Error::corrupted(Error::OutOfBounds {
          index: descent.offset,
          len: self.buffer.len(),
        }))
      }
    }
  }
  /* Replaces the presence bit of the default region under the cursor with the
  chain of regions leading down to (row, col) */
  fn expand(&mut self, descent: &mut Descent, row: usize, col: usize, value: &T) -> Result<()> {
    let at = descent.offset;
    let payload = self.codec.encode(value, self.header.bits_per_datum);
    if payload.len() != self.datum_bits() {
      return Err(Error::invalid(format!(
        "element codec produced {} bits for a width of {}", payload.len(), self.datum_bits()
      )))
    }
    let mut chunk: BitVec<u8, Msb0> = BitVec::new();
    let mut walk = descent.cursor.clone();
    let top = walk.depth();
    loop {
      let region = walk.current();
      let moved = if region.contains(row, col) {
        if walk.depth() > top && cacheable(&walk) {
          descent.pending.push(Pending::Put(region.key(), at + chunk.len()));
        }
        chunk.push(true);
        if region.is_leaf() {
          chunk.extend_from_bitslice(payload.as_bitslice());
        }
        walk.get_next()
      }
      else {
        chunk.push(false);
        walk.skip_children()
      };
      if !moved || walk.depth() <= top {
        break
      }
    }
    /* Stage everything before the first write */
    let tail = self.buffer.get_bits(at + 1, self.buffer.len() - at - 1)?;
    let grown = chunk.len() - 1;
    self.buffer.reserve(grown)?;
    self.buffer.set_bits(at, &chunk)?;
    self.buffer.set_bits(at + chunk.len(), &tail)?;
    self.row_hint = None;
    if grown > 0 {
      self.cache.retain(|_, offset| {
        if *offset > at {
          *offset += grown;
        }
        true
      });
    }
    tracing::trace!(at, inserted = grown, bits = self.buffer.len(), "expanded default region");
    Ok(())
  }
  /* Drops the payload under the cursor and collapses every ancestor left with
  no stored cell into a single default bit */
  fn collapse(&mut self, descent: &mut Descent) -> Result<()> {
    let cursor = &descent.cursor;
    let mut depth = cursor.depth();
    let mut end = descent.offset + 1 + self.datum_bits();
    while depth > 0 {
      let (parent, child) = match (cursor.ancestor(depth - 1), cursor.ancestor(depth)) {
        (Some(parent), Some(child)) => (parent, child),
        _ => break,
      };
      let quadrant = parent.quadrant_of(child.row, child.col);
      let mut others = false;
      let mut at = descent.ancestry[depth - 1] + 1;
      for _ in parent.children().filter(|&(q, _)| q < quadrant) {
        if self.bit(at)? {
          others = true;
          break
        }
        at += 1;
      }
      if !others {
        let mut at = end;
        for _ in parent.children().filter(|&(q, _)| q > quadrant) {
          if self.bit(at)? {
            others = true;
            break
          }
          at += 1;
        }
        if !others {
          end = at;
        }
      }
      if others {
        break
      }
      depth -= 1;
    }
    let keep = descent.ancestry[depth];
    let removed = end - keep - 1;
    self.buffer.delete(keep + 1, end)?;
    self.buffer.set_bit(keep, false)?;
    self.row_hint = None;
    self.cache.retain(|_, offset| {
      if *offset > keep && *offset < end {
        return false
      }
      if *offset >= end {
        *offset -= removed;
      }
      true
    });
    descent.pending.retain(|pending| match pending {
      Pending::Put(_, offset) => *offset <= keep,
      Pending::Touch(_) => true,
    });
    tracing::trace!(at = keep, removed, bits = self.buffer.len(), "collapsed region");
    Ok(())
  }
  /* Pre-populates the cache along the first row and the first column */
  fn warm_cache(&mut self) -> Result<()> {
    if self.is_empty() || self.cache.capacity() == 0 {
      return Ok(())
    }
    let mut along_row = self.locate(0, 0)?;
    for col in 0..self.header.width {
      self.decode_until(&mut along_row, 0, col)?;
    }
    let mut along_column = self.locate(0, 0)?;
    for row in 0..self.header.height {
      self.decode_until(&mut along_column, row, 0)?;
    }
    self.commit(along_column.pending);
    self.commit(along_row.pending);
    Ok(())
  }
  fn commit(&mut self, pending: Vec<Pending>) {
    for change in pending.into_iter().rev() {
      match change {
        Pending::Touch(key) => { self.cache.touch(&key); },
        Pending::Put(key, offset) => { self.cache.put(key, offset); },
      }
    }
  }
}

/* Private funcs used in testing */
#[cfg(test)]
impl<T, C, S> CompressedMatrix<T, C, S>
where T: Clone + PartialEq, C: ElementCodec<T>, S: ByteStore {
  /* Every cached offset must point at the presence bit of the region it names */
  pub(crate) fn cache_is_exact(&self) -> bool {
    let mut cursor = Cursor::new(self.header.root());
    let mut offset = self.header_size;
    let mut seen = std::collections::HashMap::new();
    loop {
      let region = cursor.current();
      if cacheable(&cursor) {
        seen.insert(region.key(), offset);
      }
      let bit = match self.bit(offset) { Ok(bit) => bit, Err(_) => return false };
      let moved = if bit {
        offset += 1;
        if region.is_leaf() { offset += self.datum_bits(); }
        cursor.get_next()
      }
      else {
        offset += 1;
        cursor.skip_children()
      };
      if !moved { break }
    }
    offset == self.buffer.len()
    && self.cache.iter().all(|(key, offset)| seen.get(key) == Some(offset))
  }
}

/* Public Interface Tests */

#[cfg(test)]
mod misc {
  use super::*;
  #[test]
  fn is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<CompressedMatrix<u32>>();
  }
  #[test]
  fn is_sync() {
    fn assert_sync<T: Sync>() {}
    assert_sync::<CompressedMatrix<u32>>();
  }
}
