use bitvec::prelude::{BitSlice, BitVec, Msb0};

/// Converts matrix elements to and from fixed-width bit strings.
///
/// `width` is the number of bits each element occupies in an encoded matrix
/// (its bits-per-datum). `encode` must return exactly `width` bits and `decode`
/// is always handed exactly `width` bits, most significant first.
pub trait ElementCodec<T> {
  /// Encodes `value` into `width` bits.
  fn encode(&self, value: &T, width: u8) -> BitVec<u8, Msb0>;
  /// Decodes a value from `width` bits.
  fn decode(&self, bits: &BitSlice<u8, Msb0>, width: u8) -> T;
  /// Returns true if `value` comes back unchanged from `width` bits.
  fn fits(&self, value: &T, width: u8) -> bool where T: PartialEq {
    let bits = self.encode(value, width);
    bits.len() == width as usize && self.decode(&bits, width) == *value
  }
}

/// Codec for the primitive integer types and `bool`.
///
/// Unsigned values are stored as big-endian bit strings, signed values in two's
/// complement and sign-extended on decode. Bits above `width` are dropped, so a
/// value that needs more than `width` bits does not `fits` and matrices reject it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimitiveCodec;

/// Writes the low `width` bits of `value`, most significant first.
pub(crate) fn uint_to_bits(value: u64, width: usize) -> BitVec<u8, Msb0> {
  let mut bits = BitVec::with_capacity(width);
  for shift in (0..width).rev() {
    bits.push(shift < 64 && (value >> shift) & 1 == 1);
  }
  bits
}

/// Reads a big-endian bit string. Only the last 64 bits are kept.
pub(crate) fn bits_to_uint(bits: &BitSlice<u8, Msb0>) -> u64 {
  bits.iter().by_vals().fold(0u64, |acc, bit| (acc << 1) | bit as u64)
}

macro_rules! unsigned_codec {
  ($($t:ty),*) => {$(
    impl ElementCodec<$t> for PrimitiveCodec {
      fn encode(&self, value: &$t, width: u8) -> BitVec<u8, Msb0> {
        uint_to_bits(*value as u64, width as usize)
      }
      fn decode(&self, bits: &BitSlice<u8, Msb0>, _width: u8) -> $t {
        bits_to_uint(bits) as $t
      }
    }
  )*}
}
macro_rules! signed_codec {
  ($($t:ty),*) => {$(
    impl ElementCodec<$t> for PrimitiveCodec {
      fn encode(&self, value: &$t, width: u8) -> BitVec<u8, Msb0> {
        uint_to_bits(*value as i64 as u64, width as usize)
      }
      fn decode(&self, bits: &BitSlice<u8, Msb0>, width: u8) -> $t {
        let raw = bits_to_uint(bits);
        let width = width as u32;
        let extended = if width > 0 && width < 64 && (raw >> (width - 1)) & 1 == 1 {
          raw | (!0u64 << width)
        }
        else {
          raw
        };
        extended as i64 as $t
      }
    }
  )*}
}
unsigned_codec!(u8, u16, u32, u64, usize);
signed_codec!(i8, i16, i32, i64, isize);

impl ElementCodec<bool> for PrimitiveCodec {
  fn encode(&self, value: &bool, width: u8) -> BitVec<u8, Msb0> {
    uint_to_bits(*value as u64, width as usize)
  }
  fn decode(&self, bits: &BitSlice<u8, Msb0>, _width: u8) -> bool {
    bits.any()
  }
}

/// An `ElementCodec` built from a pair of closures.
///
/// ```
/// use quad_matrix::element::{ElementCodec, FnCodec};
/// use bitvec::prelude::*;
/// let codec = FnCodec::new(
///   |c: &char, width: u8| {
///     let mut bits = BitVec::<u8, Msb0>::new();
///     for shift in (0..width as u32).rev() { bits.push((*c as u32 >> shift) & 1 == 1); }
///     bits
///   },
///   |bits: &BitSlice<u8, Msb0>, _width: u8| {
///     let n = bits.iter().by_vals().fold(0u32, |acc, b| (acc << 1) | b as u32);
///     std::char::from_u32(n).unwrap_or('?')
///   },
/// );
/// let bits = codec.encode(&'A', 8);
/// let decoded: char = codec.decode(&bits, 8);
/// assert_eq!('A', decoded);
/// ```
pub struct FnCodec<E, D> {
  encoder: E,
  decoder: D,
}
impl<E, D> FnCodec<E, D> {
  /// Pairs an encoding closure with its decoding closure.
  pub fn new(encoder: E, decoder: D) -> Self {
    FnCodec { encoder, decoder }
  }
}
impl<T, E, D> ElementCodec<T> for FnCodec<E, D>
where
  E: Fn(&T, u8) -> BitVec<u8, Msb0>,
  D: Fn(&BitSlice<u8, Msb0>, u8) -> T,
{
  fn encode(&self, value: &T, width: u8) -> BitVec<u8, Msb0> {
    (self.encoder)(value, width)
  }
  fn decode(&self, bits: &BitSlice<u8, Msb0>, width: u8) -> T {
    (self.decoder)(bits, width)
  }
}
impl<E, D> std::fmt::Debug for FnCodec<E, D> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FnCodec").finish()
  }
}
