use std::borrow::Borrow;

/// The head of a bin, or the successor link of a node.
pub(crate) type Link<K, V> = Option<Box<Node<K, V>>>;

/// An entry in a bin's chain.
///
/// A node belongs to exactly one chain at a time. It leaves a chain only with
/// its `next` link cleared, either to be relinked during a resize or to be
/// handed back to the node pool.
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// Computed once at insertion and reused when the bin array grows.
    pub(crate) hash: u32,
    pub(crate) next: Link<K, V>,
}

impl<K, V> Node<K, V> {
    #[inline]
    pub(crate) fn matches<Q>(&self, hash: u32, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.hash == hash && self.key.borrow() == key
    }
}

/// Returns the link holding `key`, or the empty link at the tail of the chain
/// when no node matches.
///
/// Because the returned link is either the bin head or the predecessor's
/// `next`, callers splice the chain the same way whether the match is the head
/// or sits in the middle.
pub(crate) fn seek<'c, K, V, Q>(
    mut link: &'c mut Link<K, V>,
    hash: u32,
    key: &Q,
) -> &'c mut Link<K, V>
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    while link.as_ref().map_or(false, |node| !node.matches(hash, key)) {
        if let Some(node) = link {
            link = &mut node.next;
        }
    }
    link
}

/// Returns the node holding `key`.
pub(crate) fn find<'c, K, V, Q>(
    mut link: &'c Link<K, V>,
    hash: u32,
    key: &Q,
) -> Option<&'c Node<K, V>>
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    while let Some(node) = link {
        if node.matches(hash, key) {
            return Some(node);
        }
        link = &node.next;
    }
    None
}

/// Detaches the node at `link` and closes the gap with its successor.
pub(crate) fn unlink<K, V>(link: &mut Link<K, V>) -> Option<Box<Node<K, V>>> {
    let mut node = link.take()?;
    *link = node.next.take();
    Some(node)
}

/// Drops a chain node by node so that long chains do not recurse through
/// `Box` destructors.
pub(crate) fn drop_chain<K, V>(mut link: Link<K, V>) {
    while let Some(mut node) = link {
        link = node.next.take();
    }
}
