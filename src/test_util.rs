use std::{
    borrow::Borrow,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Hands out [`Tracked`] values that count their drops in one shared counter.
#[derive(Debug)]
pub(crate) struct DropTracker {
    dropped: Arc<AtomicUsize>,
}

impl DropTracker {
    pub(crate) fn new() -> Self {
        Self {
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn track<T>(&self, elem: T) -> Tracked<T> {
        Tracked {
            dropped: Arc::clone(&self.dropped),
            elem,
        }
    }

    pub(crate) fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A value that bumps its tracker's counter when dropped. Compares and hashes
/// as the wrapped value, so it can be looked up by `&T` in a map.
#[derive(Debug)]
pub(crate) struct Tracked<T> {
    dropped: Arc<AtomicUsize>,
    pub(crate) elem: T,
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl<T: PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.elem == other.elem
    }
}

impl<T: Eq> Eq for Tracked<T> {}

impl<T: Hash> Hash for Tracked<T> {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.elem.hash(hasher);
    }
}

impl<T> Borrow<T> for Tracked<T> {
    fn borrow(&self) -> &T {
        &self.elem
    }
}
