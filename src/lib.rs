#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

/*!
A matrix of fixed-width values that is stored compressed and can still be read
and written cell by cell, without ever decoding it as a whole.

**Note:** This library relies upon [bitvec](https://docs.rs/bitvec/1.0.1/bitvec/) for its bit-level
plumbing. As with any bit-twiddling crate, always try to compile with optimisations!
*/

/*!
# When `CompressedMatrix`es are Useful:

`CompressedMatrix`es are useful when a large two-dimensional table is mostly filled with
one value, such as zero, and that value tends to cluster into large blocks.

Sparse distance tables, occupancy grids and rasterised masks all fit this shape: the
common value costs a single bit per block that holds nothing else, and every other
cell costs a presence bit plus its payload.
*/

/*!
# How it Works:

## Original Matrix:

```ignore
0 0 | 0 0
0 0 | 0 0
---------
0 0 | 0 7
0 0 | 0 0
```

The most common value becomes the matrix's default, here `0`. The matrix is then split into
four quadrants, each quadrant into four more, and so on down to single cells. Halves are
`max(1, n / 2)` long, so odd and one-wide regions simply have fewer children.

## Quadrant Tree

Every region gets one presence bit: `0` if all its cells hold the default, `1` otherwise.
Regions under a `0` are never visited, and a single cell with a `1` is followed by its value:

```ignore
                 1
     ____________|____________
     |       |       |       |
     0       0       0       1
                     ________|________
                     |     |    |    |
                     0   1:7    0    0
```

## Bit Representation

The tree is written in preorder after a small header holding the bits per value, the
default and both dimensions:

`[header; 1 0 0 0 1 0 1 00000111 0 0]`

Reading or writing a cell walks that stream from the nearest region whose offset is
cached. Writing a non-default value into a `0` region splices the missing branch in,
and writing the default back removes every region left with nothing to store, so the
stream is always exactly what a fresh encoding would produce.

## Final `CompressedMatrix`:

```ignore
CompressedMatrix {
  header: Header { bits_per_datum: 8, default: 0, height: 4, width: 4 },
  header_size: 32, // usize
  buffer: [10001010000011100], // BitBuffer, after the header
  cache: { (0, 2): 34, (2, 0): 35 }, // OffsetCache
}
```
*/

pub use {
  config::MatrixConfig,
  matrix::{DenseMatrix, Matrix},
  tree::CompressedMatrix,
};

/// `BitBuffer` and the byte stores behind it.
pub mod buffer;

/// Library configuration.
pub mod config;

/// Conversions between values and their fixed-width bit patterns.
pub mod element;

/// Library error types.
pub mod error;

/// The `Matrix` trait and `DenseMatrix` struct.
pub mod matrix;

/// `CompressedMatrix` structure and assosciated types.
pub mod tree;

#[cfg(test)]
mod unit_tests;
