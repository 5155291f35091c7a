use {
  std::collections::HashMap,
  serde::{Deserialize, Serialize},
  crate::{
    buffer::ByteStore,
    element::ElementCodec,
    error::MatrixError as Error,
    tree::{datastore::CompressedMatrix, Cursor, Region},
  },
};

type Result<T> = std::result::Result<T, Error>;

/// The value of one cell along with its coordinates.
///
/// A point is a copy: it is not linked to the live state of the matrix it
/// came from, so writes made after it was produced are not reflected in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point<T> {
  /// The value of the cell.
  pub value: T,
  /// The row of the cell.
  pub row: usize,
  /// The column of the cell.
  pub col: usize,
}

/// The order in which `Ordered` yields cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
  /// Left to right along each row, top row first.
  RowMajor,
  /// Top to bottom along each column, leftmost column first.
  ColumnMajor,
}

/// An iterator over the cells of a `CompressedMatrix` in the preorder of its tree.
///
/// Regions holding only the default value yield their cells row by row before
/// the walk moves on. Cells outside the iterator's frame are passed over
/// without being decoded. After an error nothing more is yielded.
#[derive(Debug)]
pub struct Points<'a, T, C, S: ByteStore> {
  matrix: &'a CompressedMatrix<T, C, S>,
  frame: Region,
  cursor: Cursor,
  offset: usize,
  remaining: usize,
  fill: Option<Fill>,
  watch: Option<usize>,
  row_start: Option<(Cursor, usize)>,
  failed: bool,
}
impl<'a, T, C, S> Points<'a, T, C, S>
where T: Clone + PartialEq, C: ElementCodec<T>, S: ByteStore {
  /* `cursor` must sit at `offset`, on a region no frame cell precedes in preorder */
  pub(super) fn new(matrix: &'a CompressedMatrix<T, C, S>, frame: Region, cursor: Cursor, offset: usize) -> Self {
    Points {
      matrix,
      frame,
      cursor,
      offset,
      remaining: if frame.is_empty() { 0 } else { frame.size() },
      fill: None,
      watch: None,
      row_start: None,
      failed: false,
    }
  }
  /* Remember where the walk first meets a region whose top-left cell is (row, 0) */
  pub(super) fn watch_row(mut self, row: usize) -> Self {
    self.watch = Some(row);
    self
  }
  pub(super) fn into_row_start(self) -> Option<(Cursor, usize)> {
    self.row_start
  }
  /// The rectangle the iterator yields cells from.
  pub fn frame(&self) -> Region {
    self.frame
  }
  /* Visits one region, returning the stored cell it yields, if any */
  fn step(&mut self) -> Result<Option<Point<T>>> {
    if self.cursor.is_exhausted() {
      return Err(Error::corrupted(Error::IllegalState {
        reason: format!("tree ended with {} cells left to visit", self.remaining),
      }))
    }
    let region = self.cursor.current();
    if self.row_start.is_none() && self.watch == Some(region.row) && region.col == 0 {
      self.row_start = Some((self.cursor.clone(), self.offset));
    }
    let overlap = region.intersection(&self.frame);
    if !self.matrix.bit(self.offset)? {
      self.offset += 1;
      self.cursor.skip_children();
      self.fill = overlap.map(|region| Fill { region, index: 0 });
      return Ok(None)
    }
    if !region.is_leaf() {
      self.offset += 1;
      self.cursor.get_next();
      return Ok(None)
    }
    let point = match overlap {
      Some(_) => Some(Point {
        value: self.matrix.payload(self.offset)?,
        row: region.row,
        col: region.col,
      }),
      None => None,
    };
    self.offset += 1 + self.matrix.datum_bits();
    self.cursor.get_next();
    Ok(point)
  }
}
impl<'a, T, C, S> Iterator for Points<'a, T, C, S>
where T: Clone + PartialEq, C: ElementCodec<T>, S: ByteStore {
  type Item = Result<Point<T>>;
  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some((row, col)) = self.fill.as_mut().and_then(Fill::next) {
        self.remaining -= 1;
        let value = self.matrix.default_value().clone();
        return Some(Ok(Point { value, row, col }))
      }
      self.fill = None;
      if self.remaining == 0 || self.failed {
        return None
      }
      match self.step() {
        Ok(Some(point)) => {
          self.remaining -= 1;
          return Some(Ok(point))
        },
        Ok(None) => continue,
        Err(e) => {
          self.failed = true;
          return Some(Err(e))
        },
      }
    }
  }
  fn size_hint(&self) -> (usize, Option<usize>) {
    if self.failed { (0, Some(1)) } else { (0, Some(self.remaining)) }
  }
}

/// An iterator over the cells of a `CompressedMatrix` in row-major or column-major order.
///
/// Cells are pulled from a preorder walk; any that arrive before their turn
/// are parked until the ordering reaches them.
/// ```
/// fn main() -> Result<(), quad_matrix::error::MatrixError> {
///   use quad_matrix::{CompressedMatrix, DenseMatrix, tree::Order};
///   let dense = DenseMatrix::from_rows(vec![vec![0u8, 4], vec![9, 0]])?;
///   let matrix = CompressedMatrix::from_dense(&dense, 4)?;
///   let values = matrix.iter_ordered(Order::ColumnMajor)
///     .map(|point| point.map(|point| point.value))
///     .collect::<Result<Vec<_>, _>>()?;
///   assert_eq!(vec![0, 9, 4, 0], values);
///   Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Ordered<'a, T, C, S: ByteStore> {
  points: Points<'a, T, C, S>,
  order: Order,
  parked: HashMap<(usize, usize), T>,
  position: usize,
  total: usize,
}
impl<'a, T, C, S> Ordered<'a, T, C, S>
where T: Clone + PartialEq, C: ElementCodec<T>, S: ByteStore {
  pub(super) fn new(points: Points<'a, T, C, S>, order: Order) -> Self {
    let frame = points.frame();
    Ordered {
      points,
      order,
      parked: HashMap::new(),
      position: 0,
      total: if frame.is_empty() { 0 } else { frame.size() },
    }
  }
  /// Number of cells pulled ahead of their turn and waiting to be yielded.
  pub fn parked(&self) -> usize {
    self.parked.len()
  }
  fn coordinates(&self, position: usize) -> (usize, usize) {
    let frame = self.points.frame();
    match self.order {
      Order::RowMajor => (frame.row + position / frame.width, frame.col + position % frame.width),
      Order::ColumnMajor => (frame.row + position % frame.height, frame.col + position / frame.height),
    }
  }
}
impl<'a, T, C, S> Iterator for Ordered<'a, T, C, S>
where T: Clone + PartialEq, C: ElementCodec<T>, S: ByteStore {
  type Item = Result<Point<T>>;
  fn next(&mut self) -> Option<Self::Item> {
    if self.position >= self.total {
      return None
    }
    let (row, col) = self.coordinates(self.position);
    if let Some(value) = self.parked.remove(&(row, col)) {
      self.position += 1;
      return Some(Ok(Point { value, row, col }))
    }
    loop {
      match self.points.next() {
        Some(Ok(point)) => {
          if point.row == row && point.col == col {
            self.position += 1;
            return Some(Ok(point))
          }
          self.parked.insert((point.row, point.col), point.value);
        },
        Some(Err(e)) => {
          self.position = self.total;
          return Some(Err(e))
        },
        None => {
          self.position = self.total;
          return Some(Err(Error::IllegalState {
            reason: format!("walk ended before reaching cell ({}, {})", row, col),
          }))
        },
      }
    }
  }
  fn size_hint(&self) -> (usize, Option<usize>) {
    let left = self.total - self.position;
    (0, Some(left))
  }
}

/* Private */

/* Cells of a default region still to be yielded, row by row */
#[derive(Debug, Clone, Copy)]
struct Fill {
  region: Region,
  index: usize,
}
impl Fill {
  fn next(&mut self) -> Option<(usize, usize)> {
    if self.index >= self.region.size() {
      return None
    }
    let cell = (
      self.region.row + self.index / self.region.width,
      self.region.col + self.index % self.region.width,
    );
    self.index += 1;
    Some(cell)
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    crate::matrix::DenseMatrix,
  };
  fn scenario() -> Result<CompressedMatrix<u8>> {
    let mut dense = DenseMatrix::new(4, 4, 0u8);
    crate::matrix::Matrix::set(&mut dense, 2, 3, 7)?;
    CompressedMatrix::from_dense(&dense, 8)
  }
  #[test]
  fn default_regions_fill_row_by_row() -> Result<()> {
    let matrix = scenario()?;
    let first: Vec<(usize, usize)> = matrix.iter()
      .take(5)
      .map(|point| point.map(|p| (p.row, p.col)))
      .collect::<Result<_>>()?;
    assert_eq!(vec![(0, 0), (0, 1), (1, 0), (1, 1), (0, 2)], first);
    Ok(())
  }
  #[test]
  fn stored_cells_carry_their_value() -> Result<()> {
    let matrix = scenario()?;
    let stored: Vec<Point<u8>> = matrix.iter()
      .filter(|point| point.as_ref().map_or(true, |p| p.value != 0))
      .collect::<Result<_>>()?;
    assert_eq!(vec![Point { value: 7, row: 2, col: 3 }], stored);
    Ok(())
  }
  #[test]
  fn region_frames_clip() -> Result<()> {
    let matrix = scenario()?;
    let mut cells: Vec<(usize, usize, u8)> = matrix.iter_region(2, 2, 2, 2)?
      .map(|point| point.map(|p| (p.row, p.col, p.value)))
      .collect::<Result<_>>()?;
    cells.sort();
    assert_eq!(vec![(2, 2, 0), (2, 3, 7), (3, 2, 0), (3, 3, 0)], cells);
    assert_eq!(0, matrix.iter_region(1, 1, 0, 2)?.count());
    Ok(())
  }
  #[test]
  fn ordered_walks() -> Result<()> {
    let matrix = scenario()?;
    let rows: Vec<(usize, usize)> = matrix.iter_ordered(Order::RowMajor)
      .map(|point| point.map(|p| (p.row, p.col)))
      .collect::<Result<_>>()?;
    let expected: Vec<(usize, usize)> = (0..4).flat_map(|r| (0..4).map(move |c| (r, c))).collect();
    assert_eq!(expected, rows);
    let columns: Vec<(usize, usize)> = matrix.iter_ordered(Order::ColumnMajor)
      .map(|point| point.map(|p| (p.row, p.col)))
      .collect::<Result<_>>()?;
    let expected: Vec<(usize, usize)> = (0..4).flat_map(|c| (0..4).map(move |r| (r, c))).collect();
    assert_eq!(expected, columns);
    Ok(())
  }
  #[test]
  fn ordering_parks_early_cells() -> Result<()> {
    let matrix = scenario()?;
    let mut ordered = matrix.iter_ordered(Order::RowMajor);
    let first = ordered.next().transpose()?;
    assert_eq!(Some(Point { value: 0, row: 0, col: 0 }), first);
    ordered.next().transpose()?;
    /* (0, 2) sits in the second quadrant, behind (1, 0) and (1, 1) */
    ordered.next().transpose()?;
    assert_eq!(2, ordered.parked());
    Ok(())
  }
  #[test]
  fn errors_end_the_walk() -> Result<()> {
    use crate::{buffer::BitBuffer, config::MatrixConfig, element::PrimitiveCodec};
    let matrix = scenario()?;
    let mut bits = matrix.buffer().to_bitvec()?;
    let len = bits.len();
    bits.truncate(len - 3);
    let mut config = MatrixConfig::default();
    config.warm_cache = false;
    let broken: CompressedMatrix<u8> = CompressedMatrix::from_buffer(BitBuffer::from_bits(&bits), PrimitiveCodec, &config)?;
    let results: Vec<Result<Point<u8>>> = broken.iter().collect();
    assert!(results.last().map_or(false, |r| r.is_err()));
    assert_eq!(1, results.iter().filter(|r| r.is_err()).count());
    Ok(())
  }
}
