/// A single-slot memo: keeps the last value and recomputes only when the key changes.
#[derive(Debug)]
pub struct Memo<K, V> {
    slot: Option<(K, V)>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<K: PartialEq, V: Clone> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, computing it when the key differs
    /// from the one seen last.
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce(&K) -> V) -> V {
        if let Some((cached_key, value)) = &self.slot {
            if *cached_key == key {
                return value.clone();
            }
        }
        let value = compute(&key);
        self.slot = Some((key, value.clone()));
        value
    }

    pub fn current(&self) -> Option<&V> {
        self.slot.as_ref().map(|(_, value)| value)
    }

    pub fn take(&mut self) -> Option<V> {
        self.slot.take().map(|(_, value)| value)
    }
}
