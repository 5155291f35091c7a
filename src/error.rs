/*!
These are all the custom errors that this library could return.

This library uses a nesting system to convey the most useful information
while minimising the number of unique enumerations required:
- Corrupted:
  - The encoded buffer is *likely* to be structurally inconsistent, either because it was
    handed in that way or because the operation that resulted in this error was interrupted.
- Read:
  - The error occured during a read operation, meaning that the state of the matrix could
    not have been changed by the operation that resulted in this error.
- Write:
  - The error occured during a write operation. Writes validate and stage everything they
    need before touching the buffer, so unless the source is an I/O error the state of the
    matrix is unchanged.

`MatrixError::kind` strips the nesting and reports which broad class of failure occured.
*/

/// The broad class of a `MatrixError`, ignoring any nesting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// Bad coordinates, dimensions or configuration, rejected before any mutation.
  InvalidArgument,
  /// A read or write past the logical end of a bit buffer.
  OutOfBounds,
  /// An operation on a closed bit stream.
  IllegalState,
  /// An operation a read-only matrix does not support.
  Unsupported,
  /// The backing storage failed.
  Io,
}

/// Errors produced as a result of interactions with a compressed matrix and its parts.
#[derive(Clone, Debug)]
pub enum MatrixError {
  /// Produced when a user attempts to access a cell outside the bounds of a matrix.
  InvalidCoordinates {
    ///
    row_col: [usize; 2],
    ///
    height_width: [usize; 2],
  },
  /// Produced when a requested rectangle does not fit inside a matrix.
  InvalidRange {
    /// Top-left corner of the requested rectangle.
    row_col: [usize; 2],
    /// Dimensions of the requested rectangle.
    rect_height_width: [usize; 2],
    /// Dimensions of the matrix.
    height_width: [usize; 2],
  },
  /// Produced when an argument is rejected for any other reason.
  InvalidArgument {
    ///
    reason: String,
  },
  /// Produced when a bit outside the logical size of a buffer is accessed.
  OutOfBounds {
    /// First bit index that could not be accessed.
    index: usize,
    /// The logical length of the buffer in bits.
    len: usize,
  },
  /// Produced when a closed bit stream is used.
  IllegalState {
    ///
    reason: String,
  },
  /// Produced when a read-only matrix is asked to change.
  Unsupported {
    ///
    operation: &'static str,
  },
  /// Produced when the backing storage of a buffer fails.
  Io {
    ///
    kind: std::io::ErrorKind,
    ///
    message: String,
  },
  /// Indicates that the source error was caused by, or left, an inconsistent encoding.
  Corrupted {
    ///
    source: Box<MatrixError>,
  },
  /// Indicates that the source error was produced during a read operation.
  ///
  /// Guarantees that the error did not change the matrix.
  Read {
    ///
    source: Box<MatrixError>,
  },
  /// Indicates that the source error was produced during a write operation.
  Write {
    ///
    source: Box<MatrixError>,
  },
}
impl MatrixError {
  /// Returns the class of the innermost error.
  pub fn kind(&self) -> ErrorKind {
    use MatrixError::*;
    match self {
      InvalidCoordinates{..}
      | InvalidRange{..}
      | InvalidArgument{..} => ErrorKind::InvalidArgument,
      OutOfBounds{..} => ErrorKind::OutOfBounds,
      IllegalState{..} => ErrorKind::IllegalState,
      Unsupported{..} => ErrorKind::Unsupported,
      Io{..} => ErrorKind::Io,
      Corrupted{source}
      | Read{source}
      | Write{source} => source.kind(),
    }
  }
  pub(crate) fn read(source: MatrixError) -> Self {
    MatrixError::Read {
      source: Box::new(source)
    }
  }
  pub(crate) fn write(source: MatrixError) -> Self {
    MatrixError::Write {
      source: Box::new(source)
    }
  }
  pub(crate) fn corrupted(source: MatrixError) -> Self {
    MatrixError::Corrupted {
      source: Box::new(source)
    }
  }
  pub(crate) fn invalid(reason: impl Into<String>) -> Self {
    MatrixError::InvalidArgument {
      reason: reason.into()
    }
  }
}
impl std::error::Error for MatrixError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    use MatrixError::*;
    match self {
      Corrupted{source} => Some(source),
      Read{source} => Some(source),
      Write{source} => Some(source),
      _ => None,
    }
  }
}
impl std::fmt::Display for MatrixError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    use MatrixError::*;
    match self {
      InvalidCoordinates {
        row_col: [row, col],
        height_width: [height, width],
      } => write!(f, "Attempt to access the cell at ({}, {}) which is outside of a {}x{} matrix", row, col, height, width),
      InvalidRange {
        row_col: [row, col],
        rect_height_width: [rect_height, rect_width],
        height_width: [height, width],
      } => write!(f, "The {}x{} rectangle at ({}, {}) does not fit inside a {}x{} matrix", rect_height, rect_width, row, col, height, width),
      InvalidArgument{reason} => write!(f, "Invalid argument: {}", reason),
      OutOfBounds{index, len} => write!(f, "Attempt to access bit {} of a buffer holding {} bits", index, len),
      IllegalState{reason} => write!(f, "Illegal state: {}", reason),
      Unsupported{operation} => write!(f, "This matrix does not support {}", operation),
      Io{kind, message} => write!(f, "Storage error ({:?}): {}", kind, message),
      Corrupted{source} => write!(f, "The encoded matrix is corrupted as a result of the following error: {}", source),
      Read{source} => write!(f, "Error during read: {}", source),
      Write{source} => write!(f, "Error during write: {}", source),
    }
  }
}
impl From<std::io::Error> for MatrixError {
  fn from(error: std::io::Error) -> Self {
    MatrixError::Io {
      kind: error.kind(),
      message: error.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  #[test]
  fn kind_sees_through_nesting() {
    let err = MatrixError::write(MatrixError::corrupted(MatrixError::OutOfBounds {
      index: 9,
      len: 4,
    }));
    assert_eq!(ErrorKind::OutOfBounds, err.kind());
    assert_eq!(ErrorKind::InvalidArgument, MatrixError::invalid("nope").kind());
  }
  #[test]
  fn source_chain() {
    use std::error::Error;
    let err = MatrixError::read(MatrixError::IllegalState {
      reason: "closed".into(),
    });
    let inner = err.source().unwrap();
    assert_eq!("Illegal state: closed", inner.to_string());
    assert!(inner.source().is_none());
  }
  #[test]
  fn from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: MatrixError = io.into();
    assert_eq!(ErrorKind::Io, err.kind());
  }
}
