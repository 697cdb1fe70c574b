use smallvec::SmallVec;

/// Key of an entry in [`Slots`].
///
/// Keys are never reused within one container, so a stale key can at worst
/// miss; it never removes a newer entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotKey(u64);

/// An insertion-ordered container whose entries can be removed by key.
///
/// Used wherever the engine tracks a dynamic set of things that may leave the
/// set individually: the teardowns of a [`Subscription`], the observers of a
/// subject and the active inner subscriptions of a flattening operator.
///
/// Most of those sets hold one or two entries, so storage is inline until it
/// grows past two.
///
/// ```rust
/// use rxkernel::subscription::Slots;
///
/// let mut slots = Slots::default();
/// let a = slots.insert("a");
/// let b = slots.insert("b");
/// assert_eq!(slots.remove(a), Some("a"));
/// assert_eq!(slots.remove(a), None);
/// assert_eq!(slots.values().collect::<Vec<_>>(), vec![&"b"]);
/// assert!(slots.contains(b));
/// ```
///
/// [`Subscription`]: crate::subscription::Subscription
pub struct Slots<U> {
  next_key: u64,
  entries: SmallVec<[(SlotKey, U); 2]>,
}

impl<U> Default for Slots<U> {
  fn default() -> Self { Self { next_key: 0, entries: SmallVec::new() } }
}

impl<U> Slots<U> {
  /// Appends `value` and returns its key.
  pub fn insert(&mut self, value: U) -> SlotKey {
    let key = SlotKey(self.next_key);
    self.next_key += 1;
    self.entries.push((key, value));
    key
  }

  pub fn remove(&mut self, key: SlotKey) -> Option<U> {
    let pos = self.entries.iter().position(|(k, _)| *k == key)?;
    Some(self.entries.remove(pos).1)
  }

  #[inline]
  pub fn contains(&self, key: SlotKey) -> bool { self.entries.iter().any(|(k, _)| *k == key) }

  #[inline]
  pub fn len(&self) -> usize { self.entries.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// Drops every entry for which `keep` returns false.
  pub fn retain(&mut self, mut keep: impl FnMut(&U) -> bool) { self.entries.retain(|(_, v)| keep(v)) }

  /// Empties the container, returning the entries in insertion order.
  pub fn take_all(&mut self) -> SmallVec<[U; 2]> {
    std::mem::take(&mut self.entries).into_iter().map(|(_, v)| v).collect()
  }

  pub fn values(&self) -> impl Iterator<Item = &U> { self.entries.iter().map(|(_, v)| v) }
}

impl<U: Clone> Slots<U> {
  /// Clones the current entries, in insertion order.
  ///
  /// Delivery loops iterate the snapshot so the container may change while
  /// they run.
  pub fn snapshot(&self) -> SmallVec<[U; 2]> { self.values().cloned().collect() }
}
