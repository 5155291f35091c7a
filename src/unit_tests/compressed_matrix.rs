/* Public Interface Tests */

use {
  bitvec::prelude::*,
  rand::{rngs::StdRng, Rng, SeedableRng},
  crate::{
    buffer::BitBuffer,
    config::MatrixConfig,
    element::{FnCodec, PrimitiveCodec},
    error::ErrorKind,
    matrix::{DenseMatrix, Matrix},
    tree::{CompressedMatrix, Order},
  },
};

type Result<T> = std::result::Result<T, crate::error::MatrixError>;

const SHAPES: [(usize, usize); 8] = [(1, 1), (1, 7), (6, 1), (2, 2), (3, 5), (5, 3), (8, 8), (13, 9)];

/* Private funcs used in testing */
fn scenario_matrix() -> DenseMatrix<u8> {
  DenseMatrix::from_vec(4, 4, vec![
    0, 0, 0, 0,
    0, 0, 0, 0,
    0, 0, 0, 7,
    0, 0, 0, 0,
  ]).unwrap()
}
fn clustered_matrix() -> DenseMatrix<u16> {
  DenseMatrix::from_rows(vec![
    vec![0, 0, 0, 0, 0, 0, 0, 0],
    vec![0, 0, 0, 0, 0, 0, 0, 0],
    vec![0, 0, 0, 0, 0, 0, 0, 0],
    vec![0, 0, 0, 0, 0, 0, 0, 0],
    vec![9, 9, 9, 0, 0, 0, 0, 0],
    vec![9, 9, 9, 0, 0, 0, 0, 0],
    vec![0, 0, 0, 0, 0, 0, 511, 0],
    vec![0, 0, 0, 0, 0, 0, 0, 3],
  ]).unwrap()
}
fn random_matrix(rng: &mut StdRng, height: usize, width: usize, density: f64) -> DenseMatrix<u16> {
  let cells = (0..height * width)
    .map(|_| if rng.gen_bool(density) { rng.gen_range(1..1000) } else { 0 })
    .collect();
  DenseMatrix::from_vec(height, width, cells).unwrap()
}
fn compress(matrix: &DenseMatrix<u16>, cache_percent: f64) -> Result<CompressedMatrix<u16>> {
  CompressedMatrix::encode(
    matrix,
    10,
    PrimitiveCodec,
    BitBuffer::new(),
    &MatrixConfig::with_cache_percent(cache_percent),
  )
}
fn stream(matrix: &CompressedMatrix<u16>) -> Result<BitVec<u8, Msb0>> {
  matrix.buffer().to_bitvec()
}

#[test]
fn scenario() -> Result<()> {
  let mut matrix = CompressedMatrix::from_dense(&scenario_matrix(), 8)?;
  assert_eq!(0, *matrix.default_value());
  assert_eq!((4, 4), (matrix.height(), matrix.width()));
  assert_eq!(32, matrix.header_size());
  assert_eq!("10001010000011100", matrix.buffer().to_bit_string(32)?);
  assert_eq!(7, matrix.get(2, 3)?);
  assert_eq!(0, matrix.get(3, 3)?);
  matrix.set(2, 3, 0)?;
  assert_eq!("0", matrix.buffer().to_bit_string(32)?);
  assert_eq!(DenseMatrix::new(4, 4, 0), matrix.to_dense()?);
  Ok(())
}
#[test]
fn from_dense() -> Result<()> {
  let dense = clustered_matrix();
  let matrix = CompressedMatrix::from_dense(&dense, 10)?;
  assert_eq!(dense, matrix.to_dense()?);
  assert_eq!(64, matrix.len());
  assert!(matrix.bit_len() < 64 * 10);
  Ok(())
}
#[test]
fn round_trip() -> Result<()> {
  let mut rng = StdRng::seed_from_u64(7);
  for &(height, width) in SHAPES.iter() {
    for &density in [0.0, 0.2, 1.0].iter() {
      let dense = random_matrix(&mut rng, height, width, density);
      let matrix = compress(&dense, 0.1)?;
      assert_eq!(dense, matrix.to_dense()?);
    }
  }
  Ok(())
}
#[test]
fn get() -> Result<()> {
  let dense = clustered_matrix();
  let mut matrix = compress(&dense, 0.25)?;
  for row in 0..8 {
    for col in 0..8 {
      assert_eq!(*dense.cell(row, col)?, matrix.get(row, col)?);
    }
  }
  Ok(())
}
#[test]
fn get_row() -> Result<()> {
  let dense = clustered_matrix();
  let mut matrix = compress(&dense, 0.1)?;
  for row in 0..8 {
    assert_eq!(dense.get_row(row)?, matrix.get_row(row)?);
  }
  /* And again out of order, without a usable row start */
  for &row in [6, 1, 7, 4].iter() {
    assert_eq!(dense.get_row(row)?, matrix.get_row(row)?);
  }
  Ok(())
}
#[test]
fn get_column() -> Result<()> {
  let dense = clustered_matrix();
  let mut matrix = compress(&dense, 0.1)?;
  for col in 0..8 {
    assert_eq!(dense.get_column(col)?, matrix.get_column(col)?);
  }
  Ok(())
}
#[test]
fn bulk_get() -> Result<()> {
  let mut rng = StdRng::seed_from_u64(11);
  let dense = random_matrix(&mut rng, 13, 9, 0.3);
  let mut matrix = compress(&dense, 0.2)?;
  for _ in 0..200 {
    let row = rng.gen_range(0..13);
    let col = rng.gen_range(0..9);
    let height = rng.gen_range(0..=13 - row);
    let width = rng.gen_range(0..=9 - col);
    let mut expected = Vec::with_capacity(height * width);
    for r in row..row + height {
      for c in col..col + width {
        expected.push(*dense.cell(r, c)?);
      }
    }
    assert_eq!(expected, matrix.bulk_get(row, col, height, width)?);
  }
  Ok(())
}
#[test]
fn set() -> Result<()> {
  let mut rng = StdRng::seed_from_u64(3);
  for &(height, width) in SHAPES.iter() {
    for &cache_percent in [0.0, 0.1, 1.0].iter() {
      let mut model = random_matrix(&mut rng, height, width, 0.1);
      let mut matrix = CompressedMatrix::build(
        &DenseMatrix::new(height, width, 0u16),
        10,
        PrimitiveCodec,
        &MatrixConfig::with_cache_percent(cache_percent),
      )?;
      for row in 0..height {
        for col in 0..width {
          matrix.set(row, col, *model.cell(row, col)?)?;
        }
      }
      for _ in 0..4 * height * width {
        let (row, col) = (rng.gen_range(0..height), rng.gen_range(0..width));
        let value = if rng.gen_bool(0.5) { 0 } else { rng.gen_range(1..1000) };
        matrix.set(row, col, value)?;
        Matrix::set(&mut model, row, col, value)?;
        let (row, col) = (rng.gen_range(0..height), rng.gen_range(0..width));
        assert_eq!(*model.cell(row, col)?, matrix.get(row, col)?);
      }
      assert_eq!(model, matrix.to_dense()?);
    }
  }
  Ok(())
}
#[test]
fn set_keeps_encoding_canonical() -> Result<()> {
  let mut rng = StdRng::seed_from_u64(5);
  let mut model = DenseMatrix::new(9, 11, 0u16);
  let mut matrix = compress(&model, 0.3)?;
  for _ in 0..300 {
    let (row, col) = (rng.gen_range(0..9), rng.gen_range(0..11));
    let value = if rng.gen_bool(0.6) { 0 } else { rng.gen_range(1..1000) };
    matrix.set(row, col, value)?;
    Matrix::set(&mut model, row, col, value)?;
    if model.mode() == Some(&0) {
      assert_eq!(stream(&compress(&model, 0.0)?)?, stream(&matrix)?);
    }
    let (row, col) = (rng.gen_range(0..9), rng.gen_range(0..11));
    assert_eq!(*model.cell(row, col)?, matrix.get(row, col)?);
    if rng.gen_bool(0.1) {
      assert_eq!(model.get_row(row)?, matrix.get_row(row)?);
    }
    assert!(matrix.cache_is_exact());
  }
  Ok(())
}
#[test]
fn default_write_is_idempotent() -> Result<()> {
  let dense = clustered_matrix();
  let mut matrix = compress(&dense, 0.1)?;
  let before = stream(&matrix)?;
  for row in 0..8 {
    for col in 0..3 {
      matrix.set(row, col + 3, 0)?;
    }
  }
  matrix.set(4, 0, 9)?;
  matrix.set(6, 6, 511)?;
  assert_eq!(before, stream(&matrix)?);
  Ok(())
}
#[test]
fn cache_is_transparent() -> Result<()> {
  let mut rng = StdRng::seed_from_u64(13);
  let dense = random_matrix(&mut rng, 12, 12, 0.15);
  let mut cold = compress(&dense, 0.0)?;
  let mut hot = compress(&dense, 1.0)?;
  assert_eq!(0, cold.cache_len());
  for _ in 0..500 {
    let (row, col) = (rng.gen_range(0..12), rng.gen_range(0..12));
    if rng.gen_bool(0.5) {
      let value = if rng.gen_bool(0.5) { 0 } else { rng.gen_range(1..1000) };
      cold.set(row, col, value)?;
      hot.set(row, col, value)?;
    }
    else {
      assert_eq!(cold.get(row, col)?, hot.get(row, col)?);
    }
    if rng.gen_bool(0.05) {
      assert_eq!(cold.get_row(row)?, hot.get_row(row)?);
    }
  }
  assert_eq!(stream(&cold)?, stream(&hot)?);
  assert_eq!(0, cold.cache_len());
  Ok(())
}
#[test]
fn size_is_reversible() -> Result<()> {
  let dense = clustered_matrix();
  let mut matrix = compress(&dense, 0.1)?;
  let before = stream(&matrix)?;
  let cells = [(0, 0, 1), (0, 7, 2), (3, 3, 3), (7, 0, 4), (2, 5, 5)];
  for &(row, col, value) in cells.iter() {
    matrix.set(row, col, value)?;
  }
  assert!(matrix.bit_len() > before.len());
  for &(row, col, _) in cells.iter().rev() {
    matrix.set(row, col, 0)?;
  }
  assert_eq!(before, stream(&matrix)?);
  Ok(())
}
#[test]
fn iter() -> Result<()> {
  let mut rng = StdRng::seed_from_u64(17);
  for &(height, width) in SHAPES.iter() {
    let dense = random_matrix(&mut rng, height, width, 0.25);
    let matrix = compress(&dense, 0.1)?;
    let mut seen = DenseMatrix::new(height, width, false);
    for point in matrix.iter() {
      let point = point?;
      assert_eq!(*dense.cell(point.row, point.col)?, point.value);
      assert!(!*seen.cell(point.row, point.col)?);
      Matrix::set(&mut seen, point.row, point.col, true)?;
    }
    assert!(seen.as_slice().iter().all(|&visited| visited));
  }
  Ok(())
}
#[test]
fn iter_ordered() -> Result<()> {
  let mut rng = StdRng::seed_from_u64(19);
  for &(height, width) in SHAPES.iter() {
    let dense = random_matrix(&mut rng, height, width, 0.25);
    let matrix = compress(&dense, 0.1)?;
    let rows: Vec<u16> = matrix.iter_ordered(Order::RowMajor)
      .map(|point| point.map(|p| p.value))
      .collect::<Result<_>>()?;
    assert_eq!(dense.to_rows().concat(), rows);
    let columns: Vec<u16> = matrix.iter_ordered(Order::ColumnMajor)
      .map(|point| point.map(|p| p.value))
      .collect::<Result<_>>()?;
    assert_eq!(dense.to_columns().concat(), columns);
  }
  Ok(())
}
#[test]
fn iter_region() -> Result<()> {
  let dense = clustered_matrix();
  let matrix = compress(&dense, 0.1)?;
  let mut cells: Vec<(usize, usize, u16)> = matrix.iter_region(4, 1, 3, 6)?
    .map(|point| point.map(|p| (p.row, p.col, p.value)))
    .collect::<Result<_>>()?;
  cells.sort();
  assert_eq!(18, cells.len());
  assert_eq!((4, 1, 9), cells[0]);
  assert_eq!((6, 6, 511), cells[17]);
  Ok(())
}
#[test]
fn custom_codec() -> Result<()> {
  let codec = FnCodec::new(
    |c: &char, width: u8| {
      let mut bits = BitVec::<u8, Msb0>::new();
      for shift in (0..width as u32).rev() {
        bits.push((*c as u32 >> shift) & 1 == 1);
      }
      bits
    },
    |bits: &BitSlice<u8, Msb0>, _: u8| {
      let n = bits.iter().by_vals().fold(0u32, |acc, b| (acc << 1) | b as u32);
      std::char::from_u32(n).unwrap_or('?')
    },
  );
  let dense = DenseMatrix::from_rows(vec![
    "..q.".chars().collect(),
    "....".chars().collect(),
    ".zz.".chars().collect(),
  ])?;
  let mut matrix = CompressedMatrix::encode(&dense, 7, codec, BitBuffer::new(), &MatrixConfig::default())?;
  assert_eq!('.', *matrix.default_value());
  assert_eq!('q', matrix.get(0, 2)?);
  matrix.set(1, 3, 'x')?;
  assert_eq!(vec!['.', '.', '.', 'x'], matrix.get_row(1)?);
  Ok(())
}
#[test]
fn errors() -> Result<()> {
  let mut matrix = CompressedMatrix::from_dense(&scenario_matrix(), 8)?;
  let before = matrix.buffer().to_bitvec()?;
  assert_eq!(ErrorKind::InvalidArgument, matrix.get(4, 0).unwrap_err().kind());
  assert_eq!(ErrorKind::InvalidArgument, matrix.set(0, 4, 1).unwrap_err().kind());
  assert_eq!(ErrorKind::InvalidArgument, matrix.bulk_get(2, 2, 3, 1).unwrap_err().kind());
  assert_eq!(ErrorKind::InvalidArgument, matrix.get_column(4).unwrap_err().kind());
  assert_eq!(before, matrix.buffer().to_bitvec()?);
  Ok(())
}
#[test]
fn dense_and_compressed_share_a_trait() -> Result<()> {
  fn total(matrix: &mut impl Matrix<u16>) -> Result<u32> {
    let cells = matrix.bulk_get(0, 0, matrix.height(), matrix.width())?;
    Ok(cells.into_iter().map(u32::from).sum())
  }
  let mut dense = clustered_matrix();
  let mut compressed = compress(&dense, 0.1)?;
  assert_eq!(total(&mut dense)?, total(&mut compressed)?);
  assert_eq!(dense, Matrix::to_dense(&mut compressed)?);
  Ok(())
}
