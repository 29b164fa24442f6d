use bytes::Bytes;

/// A non-owning view over a shared, immutable byte backing.
///
/// `BufferView` is the Rust realization of the spec's `{base, offset, count}`
/// handle: [`bytes::Bytes`] already *is* a refcounted `{ptr, offset, len}`
/// view, so wrapping it rather than re-deriving the same invariants over a
/// raw `Vec<u8>` keeps the type zero-copy on every slice and clone.
///
/// Once constructed, a `BufferView` never mutates the bytes it points at —
/// the backing allocation may be shared with other views, including ones
/// produced by earlier `slice` calls on the same `Bytes`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BufferView {
    inner: Bytes,
}

impl BufferView {
    /// Wraps an owned byte vector as a view over the whole buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { inner: data.into() }
    }

    /// An empty view, useful as the initial "no leftovers" state.
    pub fn empty() -> Self {
        Self { inner: Bytes::new() }
    }

    /// Number of bytes visible through this view.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when the view covers zero bytes.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Borrows the view's bytes as a contiguous slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Returns the underlying `Bytes`, sharing the backing allocation.
    pub fn as_bytes(&self) -> Bytes {
        self.inner.clone()
    }

    /// Materializes a standalone, owned copy of the viewed bytes.
    ///
    /// Use this only when a caller genuinely needs an allocation independent
    /// of the shared backing (e.g. handing a frame to application code that
    /// outlives the connection); the zero-copy path is `as_bytes`.
    pub fn materialize(&self) -> Vec<u8> {
        self.inner.to_vec()
    }

    /// Produces a sub-view `[offset, offset + count)` without copying.
    ///
    /// # Panics
    /// Panics if `offset + count` exceeds `self.len()`, mirroring the
    /// invariant `offset + count <= backing.length` from the spec.
    pub fn slice(&self, offset: usize, count: usize) -> Self {
        Self {
            inner: self.inner.slice(offset..offset + count),
        }
    }
}

impl From<Vec<u8>> for BufferView {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<Bytes> for BufferView {
    fn from(data: Bytes) -> Self {
        Self { inner: data }
    }
}

impl From<&'static [u8]> for BufferView {
    fn from(data: &'static [u8]) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_shares_backing_without_copying() {
        let view = BufferView::new(b"hello world".to_vec());
        let sub = view.slice(6, 5);
        assert_eq!(sub.as_slice(), b"world");
        assert_eq!(view.len(), 11);
    }

    #[test]
    fn empty_view_has_zero_length() {
        let view = BufferView::empty();
        assert!(view.is_empty());
        assert_eq!(view.materialize(), Vec::<u8>::new());
    }

    #[test]
    #[should_panic]
    fn slice_out_of_bounds_panics() {
        let view = BufferView::new(b"abc".to_vec());
        let _ = view.slice(1, 10);
    }
}
