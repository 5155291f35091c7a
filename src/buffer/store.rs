use {
  serde::{Deserialize, Serialize},
  std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
  },
  crate::error::MatrixError as Error,
};

type Result<T> = std::result::Result<T, Error>;

/// Byte-addressable backing storage for a `BitBuffer`.
///
/// Implementors only need to hand out and accept single bytes; all bit-level
/// work happens in the buffer.
pub trait ByteStore {
  /// Returns the byte at `index`.
  fn get(&self, index: usize) -> Result<u8>;
  /// Overwrites the byte at `index`.
  fn set(&mut self, index: usize, byte: u8) -> Result<()>;
  /// The number of bytes the store currently holds.
  fn size(&self) -> usize;
  /// Grows or shrinks the store to exactly `size` bytes. New bytes are zero.
  fn resize(&mut self, size: usize) -> Result<()>;
}

/// A `ByteStore` held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryStore {
  bytes: Vec<u8>,
}
impl MemoryStore {
  /// Creates a store of `size` zeroed bytes.
  pub fn new(size: usize) -> Self {
    MemoryStore {
      bytes: vec![0; size],
    }
  }
  /// Wraps existing bytes.
  pub fn from_bytes(bytes: Vec<u8>) -> Self {
    MemoryStore { bytes }
  }
  /// The raw bytes of the store.
  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }
}
impl ByteStore for MemoryStore {
  fn get(&self, index: usize) -> Result<u8> {
    match self.bytes.get(index) {
      Some(&byte) => Ok(byte),
      None => Err(Error::OutOfBounds {
        index: index * 8,
        len: self.bytes.len() * 8,
      }),
    }
  }
  fn set(&mut self, index: usize, byte: u8) -> Result<()> {
    let len = self.bytes.len();
    match self.bytes.get_mut(index) {
      Some(slot) => { *slot = byte; Ok(()) },
      None => Err(Error::OutOfBounds {
        index: index * 8,
        len: len * 8,
      }),
    }
  }
  fn size(&self) -> usize {
    self.bytes.len()
  }
  fn resize(&mut self, size: usize) -> Result<()> {
    self.bytes.resize(size, 0);
    self.bytes.shrink_to_fit();
    Ok(())
  }
}

/// A `ByteStore` kept in a fixed-size random-access file.
///
/// Every access seeks and transfers exactly one byte; nothing is buffered, so a
/// completed `set` is on its way to disk. The file only changes size through `resize`.
#[derive(Debug)]
pub struct FileStore {
  file: File,
  path: PathBuf,
  size: usize,
}
impl FileStore {
  /// Creates (or truncates) the file at `path` and fills it with `size` zero bytes.
  pub fn create(path: impl AsRef<Path>, size: usize) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(true)
      .open(&path)?;
    file.set_len(size as u64)?;
    Ok(FileStore { file, path, size })
  }
  /// Opens an existing file, using its current length as the store size.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let file = OpenOptions::new().read(true).write(true).open(&path)?;
    let size = file.metadata()?.len() as usize;
    Ok(FileStore { file, path, size })
  }
  /// The path of the backing file.
  pub fn path(&self) -> &Path {
    &self.path
  }
  fn check(&self, index: usize) -> Result<()> {
    if index >= self.size {
      return Err(Error::OutOfBounds {
        index: index * 8,
        len: self.size * 8,
      })
    }
    Ok(())
  }
}
impl ByteStore for FileStore {
  fn get(&self, index: usize) -> Result<u8> {
    self.check(index)?;
    let mut file = &self.file;
    file.seek(SeekFrom::Start(index as u64))?;
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte)?;
    Ok(byte[0])
  }
  fn set(&mut self, index: usize, byte: u8) -> Result<()> {
    self.check(index)?;
    self.file.seek(SeekFrom::Start(index as u64))?;
    self.file.write_all(&[byte])?;
    Ok(())
  }
  fn size(&self) -> usize {
    self.size
  }
  fn resize(&mut self, size: usize) -> Result<()> {
    self.file.set_len(size as u64)?;
    self.size = size;
    Ok(())
  }
}

/// Backing storage chosen at runtime, usually from a `MatrixConfig`.
#[derive(Debug)]
pub enum Storage {
  /// Bytes held in memory.
  Memory(MemoryStore),
  /// Bytes held in a random-access file.
  File(FileStore),
}
impl ByteStore for Storage {
  fn get(&self, index: usize) -> Result<u8> {
    match self {
      Storage::Memory(store) => store.get(index),
      Storage::File(store) => store.get(index),
    }
  }
  fn set(&mut self, index: usize, byte: u8) -> Result<()> {
    match self {
      Storage::Memory(store) => store.set(index, byte),
      Storage::File(store) => store.set(index, byte),
    }
  }
  fn size(&self) -> usize {
    match self {
      Storage::Memory(store) => store.size(),
      Storage::File(store) => store.size(),
    }
  }
  fn resize(&mut self, size: usize) -> Result<()> {
    match self {
      Storage::Memory(store) => store.resize(size),
      Storage::File(store) => store.resize(size),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  #[test]
  fn memory_get_set() -> Result<()> {
    let mut store = MemoryStore::new(2);
    assert_eq!(2, store.size());
    store.set(1, 0xAB)?;
    assert_eq!(0xAB, store.get(1)?);
    assert_eq!(0, store.get(0)?);
    assert_eq!(ErrorKind::OutOfBounds, store.get(2).unwrap_err().kind());
    assert_eq!(ErrorKind::OutOfBounds, store.set(5, 1).unwrap_err().kind());
    Ok(())
  }
  #[test]
  fn memory_resize_zero_fills() -> Result<()> {
    let mut store = MemoryStore::from_bytes(vec![0xFF]);
    store.resize(3)?;
    assert_eq!(&[0xFF, 0, 0], store.as_bytes());
    store.resize(1)?;
    assert_eq!(&[0xFF], store.as_bytes());
    Ok(())
  }
  #[test]
  fn file_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("store.bin");
    let mut store = FileStore::create(&path, 4)?;
    assert_eq!(4, store.size());
    store.set(0, 7)?;
    store.set(3, 0x80)?;
    assert_eq!(7, store.get(0)?);
    assert_eq!(0, store.get(1)?);
    assert_eq!(ErrorKind::OutOfBounds, store.get(4).unwrap_err().kind());
    store.resize(8)?;
    assert_eq!(0, store.get(7)?);
    drop(store);
    let reopened = FileStore::open(&path)?;
    assert_eq!(8, reopened.size());
    assert_eq!(0x80, reopened.get(3)?);
    Ok(())
  }
  #[test]
  fn storage_dispatch() -> Result<()> {
    let mut storage = Storage::Memory(MemoryStore::new(1));
    storage.set(0, 42)?;
    assert_eq!(42, storage.get(0)?);
    storage.resize(2)?;
    assert_eq!(2, storage.size());
    Ok(())
  }
}
