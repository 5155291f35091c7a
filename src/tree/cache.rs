use {
  lru::LruCache,
  std::{hash::Hash, num::NonZeroUsize},
};

/// A bounded least-recently-used map from regions to bit offsets.
///
/// A thin layer over `lru::LruCache` that adds what splices need: `retain`
/// rewrites or evicts entries in place without touching their recency. A
/// capacity of 0 stores nothing.
/// ```
/// use quad_matrix::tree::OffsetCache;
/// let mut cache = OffsetCache::new(2);
/// cache.put((0, 1), 40);
/// cache.put((1, 0), 52);
/// cache.touch(&(0, 1));
/// cache.put((1, 1), 61);
/// assert_eq!(None, cache.peek(&(1, 0)));
/// assert_eq!(Some(&40), cache.peek(&(0, 1)));
/// ```
#[derive(Debug)]
pub struct OffsetCache<K: Hash + Eq, V> {
  inner: Option<LruCache<K, V>>,
}
impl<K: Hash + Eq + Clone, V> OffsetCache<K, V> {
  /// Creates an empty cache holding at most `capacity` entries.
  pub fn new(capacity: usize) -> Self {
    OffsetCache {
      inner: NonZeroUsize::new(capacity).map(LruCache::new),
    }
  }
  /// Maximum number of entries.
  pub fn capacity(&self) -> usize {
    self.inner.as_ref().map_or(0, |cache| cache.cap().get())
  }
  /// Number of entries.
  pub fn len(&self) -> usize {
    self.inner.as_ref().map_or(0, |cache| cache.len())
  }
  /// Returns true if the cache holds nothing.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
  /// Looks up `key` without changing its recency.
  pub fn peek(&self, key: &K) -> Option<&V> {
    self.inner.as_ref()?.peek(key)
  }
  /// Marks `key` most recently used. Returns false if it is not cached.
  pub fn touch(&mut self, key: &K) -> bool {
    match self.inner.as_mut() {
      Some(cache) if cache.contains(key) => { cache.promote(key); true },
      _ => false,
    }
  }
  /// Inserts or replaces `key`, making it most recently used and evicting the
  /// least recently used entry if the cache is full. Returns the evicted entry.
  pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
    let cache = self.inner.as_mut()?;
    match cache.push(key.clone(), value) {
      Some((evicted, value)) if evicted != key => Some((evicted, value)),
      _ => None,
    }
  }
  /// Keeps only the entries for which `keep` returns true. `keep` may rewrite
  /// the values it keeps; recency is unchanged.
  pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
    let cache = match self.inner.as_mut() {
      Some(cache) => cache,
      None => return,
    };
    let mut doomed = Vec::new();
    for (key, value) in cache.iter_mut() {
      if !keep(key, value) {
        doomed.push(key.clone());
      }
    }
    for key in doomed {
      cache.pop(&key);
    }
  }
  /// Every entry from most to least recently used.
  pub fn iter(&self) -> impl Iterator<Item=(&K, &V)> + '_ {
    self.inner.iter().flat_map(|cache| cache.iter())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  fn keys(cache: &OffsetCache<u32, usize>) -> Vec<u32> {
    cache.iter().map(|(&k, _)| k).collect()
  }
  #[test]
  fn evicts_least_recently_used() {
    let mut cache = OffsetCache::new(3);
    assert_eq!(None, cache.put(1, 10));
    assert_eq!(None, cache.put(2, 20));
    assert_eq!(None, cache.put(3, 30));
    assert_eq!(vec![3, 2, 1], keys(&cache));
    assert!(cache.touch(&1));
    assert_eq!(Some((2, 20)), cache.put(4, 40));
    assert_eq!(vec![4, 1, 3], keys(&cache));
    assert_eq!(3, cache.len());
  }
  #[test]
  fn peek_does_not_touch() {
    let mut cache = OffsetCache::new(2);
    cache.put(1, 10);
    cache.put(2, 20);
    assert_eq!(Some(&10), cache.peek(&1));
    cache.put(3, 30);
    assert_eq!(None, cache.peek(&1));
    assert!(cache.touch(&2));
    assert!(!cache.touch(&9));
    assert_eq!(vec![2, 3], keys(&cache));
  }
  #[test]
  fn put_replaces_existing() {
    let mut cache = OffsetCache::new(2);
    cache.put(1, 10);
    cache.put(2, 20);
    assert_eq!(None, cache.put(1, 11));
    assert_eq!(vec![1, 2], keys(&cache));
    assert_eq!(Some(&11), cache.peek(&1));
  }
  #[test]
  fn zero_capacity_stores_nothing() {
    let mut cache = OffsetCache::new(0);
    assert_eq!(0, cache.capacity());
    assert_eq!(None, cache.put(1, 10));
    assert!(cache.is_empty());
    assert!(!cache.touch(&1));
    cache.retain(|_, _| false);
    assert_eq!(Vec::<u32>::new(), keys(&cache));
  }
  #[test]
  fn retain_shifts_and_evicts() {
    let mut cache = OffsetCache::new(4);
    for k in 1..=4u32 { cache.put(k, k as usize * 10); }
    cache.retain(|_, offset| {
      if *offset == 20 { return false }
      if *offset > 20 { *offset += 5; }
      true
    });
    assert_eq!(vec![4, 3, 1], keys(&cache));
    assert_eq!(Some(&45), cache.peek(&4));
    assert_eq!(Some(&35), cache.peek(&3));
    assert_eq!(Some(&10), cache.peek(&1));
    cache.retain(|_, _| false);
    assert!(cache.is_empty());
    cache.put(7, 70);
    assert_eq!(vec![7], keys(&cache));
    assert_eq!(4, cache.capacity());
  }
}
