mod cache;
mod codec;
mod datastore;
mod iterators;

pub use cache::OffsetCache;
pub use codec::{decode, encode, encode_into, EncodingStats, Header, MatrixEncoding, QuadTreeEncoder};
pub use datastore::CompressedMatrix;
pub use iterators::{Order, Ordered, Point, Points};

use serde::{Deserialize, Serialize};

/* Regions */

/// An axis-aligned rectangle of cells: the node type of the quadrant tree.
///
/// A region splits at `(max(1, height / 2), max(1, width / 2))` into up to four
/// children numbered in preorder: 0 top-left, 1 top-right, 2 bottom-left and
/// 3 bottom-right. Children with no cells do not exist, so a region one row
/// high only has children 0 and 1 and a single cell has none.
/// ```
/// use quad_matrix::tree::Region;
/// let region = Region::new(0, 0, 3, 5);
/// assert_eq!(Some(Region::new(0, 2, 1, 3)), region.child(1));
/// assert_eq!(Some((3, Region::new(1, 2, 2, 3))), region.child_containing(2, 4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
  /// Row of the top-left cell.
  pub row: usize,
  /// Column of the top-left cell.
  pub col: usize,
  /// Number of rows.
  pub height: usize,
  /// Number of columns.
  pub width: usize,
}
impl Region {
  /// Creates a region.
  pub fn new(row: usize, col: usize, height: usize, width: usize) -> Self {
    Region { row, col, height, width }
  }
  /// Number of cells.
  pub fn size(&self) -> usize {
    self.height * self.width
  }
  /// Returns true if the region has no cells.
  pub fn is_empty(&self) -> bool {
    self.height == 0 || self.width == 0
  }
  /// Returns true if the region is a single cell.
  pub fn is_leaf(&self) -> bool {
    self.height == 1 && self.width == 1
  }
  /// The top-left cell, which identifies a region among its non-first siblings and ancestors.
  pub fn key(&self) -> (usize, usize) {
    (self.row, self.col)
  }
  /// Height of the top half and width of the left half.
  pub fn split(&self) -> (usize, usize) {
    ((self.height / 2).max(1), (self.width / 2).max(1))
  }
  /// The child in `quadrant`, if it has any cells.
  pub fn child(&self, quadrant: u8) -> Option<Region> {
    if self.is_empty() || self.is_leaf() {
      return None
    }
    let (top, left) = self.split();
    let (bottom, right) = (self.height - top, self.width - left);
    let child = match quadrant {
      0 => Region::new(self.row, self.col, top, left),
      1 => Region::new(self.row, self.col + left, top, right),
      2 => Region::new(self.row + top, self.col, bottom, left),
      3 => Region::new(self.row + top, self.col + left, bottom, right),
      _ => return None,
    };
    if child.is_empty() { None } else { Some(child) }
  }
  /// Every non-empty child with its quadrant, in preorder.
  pub fn children(&self) -> impl Iterator<Item=(u8, Region)> {
    let region = *self;
    (0..4).filter_map(move |q| region.child(q).map(|child| (q, child)))
  }
  /// Returns true if the cell at `(row, col)` lies inside the region.
  pub fn contains(&self, row: usize, col: usize) -> bool {
    row >= self.row && row < self.row + self.height
    && col >= self.col && col < self.col + self.width
  }
  /// The cells shared with `other`, if there are any.
  pub fn intersection(&self, other: &Region) -> Option<Region> {
    let row = self.row.max(other.row);
    let col = self.col.max(other.col);
    let end_row = (self.row + self.height).min(other.row + other.height);
    let end_col = (self.col + self.width).min(other.col + other.width);
    if row < end_row && col < end_col {
      Some(Region::new(row, col, end_row - row, end_col - col))
    }
    else {
      None
    }
  }
  /// The quadrant of the child holding `(row, col)`, given that the region holds it.
  pub fn quadrant_of(&self, row: usize, col: usize) -> u8 {
    let (top, left) = self.split();
    let lower = if row >= self.row + top { 2 } else { 0 };
    let right = if col >= self.col + left { 1 } else { 0 };
    lower + right
  }
  /// The child holding `(row, col)` and its quadrant.
  pub fn child_containing(&self, row: usize, col: usize) -> Option<(u8, Region)> {
    if !self.contains(row, col) {
      return None
    }
    let quadrant = self.quadrant_of(row, col);
    self.child(quadrant).map(|child| (quadrant, child))
  }
}

/* Navigation */

/// A position in the preorder walk of a region tree.
///
/// The cursor keeps the explicit path from the root to the current region, so
/// parents and siblings are recomputed from it rather than stored anywhere.
/// Once the walk runs off the end of the tree the cursor is exhausted and
/// every further move returns `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
  path: Vec<(Region, u8)>,
  exhausted: bool,
}
impl Cursor {
  /// Creates a cursor positioned on `root`.
  pub fn new(root: Region) -> Self {
    Cursor {
      path: vec![(root, 0)],
      exhausted: false,
    }
  }
  /// The region under the cursor.
  pub fn current(&self) -> Region {
    self.path[self.path.len() - 1].0
  }
  /// The quadrant of the current region within its parent. The root reports 0.
  pub fn quadrant(&self) -> u8 {
    self.path[self.path.len() - 1].1
  }
  /// The number of steps from the root to the current region.
  pub fn depth(&self) -> usize {
    self.path.len() - 1
  }
  /// Returns true while the cursor is on the root.
  pub fn is_root(&self) -> bool {
    self.path.len() == 1
  }
  /// Returns true once the walk has ended.
  pub fn is_exhausted(&self) -> bool {
    self.exhausted
  }
  /// The parent of the current region.
  pub fn parent(&self) -> Option<Region> {
    self.ancestor(self.depth().checked_sub(1)?)
  }
  /// The region on the current path at `depth`.
  pub fn ancestor(&self, depth: usize) -> Option<Region> {
    self.path.get(depth).map(|&(region, _)| region)
  }
  /// Moves to the first non-empty child. Returns false, without moving, at a leaf.
  pub fn first_child(&mut self) -> bool {
    !self.exhausted && self.descend_from(0)
  }
  /// Moves to the next region in preorder.
  pub fn get_next(&mut self) -> bool {
    self.first_child() || self.skip_children()
  }
  /// Moves to the next region in preorder that is not a descendant of the current one.
  pub fn skip_children(&mut self) -> bool {
    if self.exhausted {
      return false
    }
    while self.path.len() > 1 {
      if let Some((_, quadrant)) = self.path.pop() {
        if self.descend_from(quadrant + 1) {
          return true
        }
      }
    }
    self.exhausted = true;
    false
  }
  /// The nearest preceding sibling and its quadrant.
  pub fn prev_sibling(&self) -> Option<(u8, Region)> {
    let parent = self.parent()?;
    (0..self.quadrant()).rev().find_map(|q| parent.child(q).map(|child| (q, child)))
  }
  /// Moves to the child in `quadrant`. Returns false, without moving, if it does not exist.
  pub fn descend(&mut self, quadrant: u8) -> bool {
    match self.current().child(quadrant) {
      Some(child) if !self.exhausted => {
        self.path.push((child, quadrant));
        true
      },
      _ => false,
    }
  }
  /// Moves back to the parent. Returns false, without moving, at the root.
  pub fn ascend(&mut self) -> bool {
    if self.path.len() > 1 {
      self.path.pop();
      true
    }
    else {
      false
    }
  }
  /// Moves to the child holding `(row, col)`, returning its quadrant.
  pub fn descend_containing(&mut self, row: usize, col: usize) -> Option<u8> {
    let (quadrant, _) = self.current().child_containing(row, col)?;
    if self.descend(quadrant) { Some(quadrant) } else { None }
  }
  fn descend_from(&mut self, quadrant: u8) -> bool {
    let current = self.current();
    for q in quadrant..4 {
      if let Some(child) = current.child(q) {
        self.path.push((child, q));
        return true
      }
    }
    false
  }
}

/* Tests */
#[cfg(test)]
mod region_tests {
  use super::*;
  #[test]
  fn odd_split_gives_remainder_to_second_half() {
    let region = Region::new(0, 0, 5, 3);
    assert_eq!((2, 1), region.split());
    let children: Vec<Region> = region.children().map(|(_, child)| child).collect();
    assert_eq!(vec![
      Region::new(0, 0, 2, 1),
      Region::new(0, 1, 2, 2),
      Region::new(2, 0, 3, 1),
      Region::new(2, 1, 3, 2),
    ], children);
  }
  #[test]
  fn thin_regions_skip_empty_children() {
    let row = Region::new(4, 0, 1, 5);
    assert_eq!(vec![0, 1], row.children().map(|(q, _)| q).collect::<Vec<_>>());
    let column = Region::new(0, 7, 3, 1);
    assert_eq!(vec![0, 2], column.children().map(|(q, _)| q).collect::<Vec<_>>());
    assert_eq!(0, Region::new(2, 2, 1, 1).children().count());
    assert_eq!(0, Region::new(0, 0, 0, 4).children().count());
  }
  #[test]
  fn containment() {
    let region = Region::new(2, 3, 4, 4);
    assert!(region.contains(2, 3));
    assert!(region.contains(5, 6));
    assert!(!region.contains(6, 6));
    assert!(!region.contains(1, 4));
    assert_eq!(Some(Region::new(4, 5, 2, 2)), region.intersection(&Region::new(4, 5, 9, 9)));
    assert_eq!(None, region.intersection(&Region::new(6, 0, 2, 9)));
  }
  #[test]
  fn every_cell_has_one_containing_child() {
    let region = Region::new(0, 0, 7, 6);
    for row in 0..7 {
      for col in 0..6 {
        let holders: Vec<u8> = region.children()
          .filter(|(_, child)| child.contains(row, col))
          .map(|(q, _)| q)
          .collect();
        assert_eq!(1, holders.len());
        assert_eq!(Some(holders[0]), region.child_containing(row, col).map(|(q, _)| q));
      }
    }
    assert_eq!(None, region.child_containing(7, 0));
  }
}
