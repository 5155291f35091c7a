use {
  serde::{Deserialize, Serialize},
  std::{collections::HashMap, hash::Hash},
  crate::error::MatrixError as Error,
};

type Result<T> = std::result::Result<T, Error>;

/// The operations shared by every matrix representation in this crate.
///
/// Reads take `&mut self` because compressed matrices update their offset
/// cache as they go. Coordinates are `(row, col)` and rectangles are returned
/// in row-major order.
pub trait Matrix<T> {
  /// Number of rows.
  fn height(&self) -> usize;
  /// Number of columns.
  fn width(&self) -> usize;
  /// Returns the value of the cell at `(row, col)`.
  fn get(&mut self, row: usize, col: usize) -> Result<T>;
  /// Changes the value of the cell at `(row, col)`.
  ///
  /// Read-only matrices keep this default, which fails with `Unsupported`.
  fn set(&mut self, _row: usize, _col: usize, _value: T) -> Result<()> {
    Err(Error::Unsupported {
      operation: "set",
    })
  }
  /// Returns the `height` x `width` rectangle whose top-left cell is `(row, col)`, row by row.
  fn bulk_get(&mut self, row: usize, col: usize, height: usize, width: usize) -> Result<Vec<T>>;
  /// Copies every cell into a `DenseMatrix`.
  fn to_dense(&mut self) -> Result<DenseMatrix<T>>;
}

/// A plain row-major 2-d matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DenseMatrix<T> {
  /// Height of the matrix.
  pub height: usize,
  /// Width of the matrix.
  pub width: usize,
  cells: Vec<T>,
}
impl<T: Clone> DenseMatrix<T> {
  /// Creates a matrix of the given dimensions with every cell set to `fill`.
  pub fn new(height: usize, width: usize, fill: T) -> Self {
    DenseMatrix {
      height,
      width,
      cells: vec![fill; height * width],
    }
  }
  /// Copies one row.
  pub fn get_row(&self, row: usize) -> Result<Vec<T>> {
    check_coordinates(row, 0, self.height, self.width.max(1))?;
    Ok(self.cells[row * self.width..(row + 1) * self.width].to_vec())
  }
  /// Copies one column, ordered by row.
  pub fn get_column(&self, col: usize) -> Result<Vec<T>> {
    check_coordinates(0, col, self.height.max(1), self.width)?;
    Ok((0..self.height).map(|row| self.cells[row * self.width + col].clone()).collect())
  }
  /// Produces the contents of the matrix as a vec of its rows.
  pub fn to_rows(&self) -> Vec<Vec<T>> {
    (0..self.height)
      .map(|row| self.cells[row * self.width..(row + 1) * self.width].to_vec())
      .collect()
  }
  /// Produces the contents of the matrix as a vec of its columns.
  pub fn to_columns(&self) -> Vec<Vec<T>> {
    (0..self.width)
      .map(|col| (0..self.height).map(|row| self.cells[row * self.width + col].clone()).collect())
      .collect()
  }
}
impl<T> DenseMatrix<T> {
  /// Builds a matrix from a flat row-major vec of exactly `height * width` cells.
  pub fn from_vec(height: usize, width: usize, cells: Vec<T>) -> Result<Self> {
    if cells.len() != height * width {
      return Err(Error::invalid(format!(
        "{} cells cannot fill a {}x{} matrix", cells.len(), height, width
      )))
    }
    Ok(DenseMatrix { height, width, cells })
  }
  /// Builds a matrix from its rows. Every row must have the same length.
  pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    let mut cells = Vec::with_capacity(height * width);
    for (n, row) in rows.into_iter().enumerate() {
      if row.len() != width {
        return Err(Error::invalid(format!(
          "row {} holds {} cells where row 0 holds {}", n, row.len(), width
        )))
      }
      cells.extend(row);
    }
    Ok(DenseMatrix { height, width, cells })
  }
  /// A reference to the cell at `(row, col)`.
  pub fn cell(&self, row: usize, col: usize) -> Result<&T> {
    check_coordinates(row, col, self.height, self.width)?;
    Ok(&self.cells[row * self.width + col])
  }
  /// The cells in row-major order.
  pub fn as_slice(&self) -> &[T] {
    &self.cells
  }
  /// Consumes the matrix, returning its cells in row-major order.
  pub fn into_vec(self) -> Vec<T> {
    self.cells
  }
  /// Number of cells.
  pub fn len(&self) -> usize {
    self.cells.len()
  }
  /// Returns true if the matrix has no cells.
  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }
}
impl<T: Eq + Hash> DenseMatrix<T> {
  /// The most frequent value, or `None` for an empty matrix.
  ///
  /// Ties go to the value that occurs first in row-major order.
  pub fn mode(&self) -> Option<&T> {
    let mut counts: HashMap<&T, (usize, usize)> = HashMap::new();
    for (index, value) in self.cells.iter().enumerate() {
      counts.entry(value).or_insert((0, index)).0 += 1;
    }
    counts
      .into_iter()
      .max_by(|(_, (a_count, a_first)), (_, (b_count, b_first))| {
        a_count.cmp(b_count).then(b_first.cmp(a_first))
      })
      .map(|(value, _)| value)
  }
}
impl<T: Clone> Matrix<T> for DenseMatrix<T> {
  fn height(&self) -> usize {
    self.height
  }
  fn width(&self) -> usize {
    self.width
  }
  fn get(&mut self, row: usize, col: usize) -> Result<T> {
    self.cell(row, col).map(T::clone)
  }
  fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
    check_coordinates(row, col, self.height, self.width)?;
    self.cells[row * self.width + col] = value;
    Ok(())
  }
  fn bulk_get(&mut self, row: usize, col: usize, height: usize, width: usize) -> Result<Vec<T>> {
    check_range(row, col, height, width, self.height, self.width)?;
    let mut cells = Vec::with_capacity(height * width);
    for r in row..row + height {
      let start = r * self.width + col;
      cells.extend_from_slice(&self.cells[start..start + width]);
    }
    Ok(cells)
  }
  fn to_dense(&mut self) -> Result<DenseMatrix<T>> {
    Ok(self.clone())
  }
}

pub(crate) fn check_coordinates(row: usize, col: usize, height: usize, width: usize) -> Result<()> {
  if row >= height || col >= width {
    return Err(Error::InvalidCoordinates {
      row_col: [row, col],
      height_width: [height, width],
    })
  }
  Ok(())
}

pub(crate) fn check_range(
  row: usize,
  col: usize,
  rect_height: usize,
  rect_width: usize,
  height: usize,
  width: usize,
) -> Result<()> {
  let fits = |start: usize, len: usize, max: usize| {
    start.checked_add(len).map_or(false, |end| end <= max)
  };
  if !fits(row, rect_height, height) || !fits(col, rect_width, width) {
    return Err(Error::InvalidRange {
      row_col: [row, col],
      rect_height_width: [rect_height, rect_width],
      height_width: [height, width],
    })
  }
  Ok(())
}
