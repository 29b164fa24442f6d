use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use super::{Defragmenter, DefragmenterOutput, read_at_least};
use crate::buffer::BufferView;
use crate::error::FramewireError;

/// Fixed-header-length defragmenter: reads `header_len` bytes, decodes the
/// *total* frame length (header + body) from them, then reads the remainder.
///
/// This covers the common case of a protocol whose every frame starts with
/// a fixed-size length prefix — e.g. a 4-byte little-endian total length
/// followed by the payload, as used in the worked echo example in the spec.
pub struct LengthPrefixedDefragmenter {
    header_len: usize,
    get_frame_length: Box<dyn Fn(&[u8]) -> usize + Send + Sync>,
    max_frame_len: usize,
}

impl LengthPrefixedDefragmenter {
    /// `get_frame_length` receives exactly `header_len` bytes and must
    /// return the *total* frame length (header included). `max_frame_len`
    /// is the sanity ceiling past which a decoded length is treated as
    /// corrupt data rather than a huge-but-legitimate frame.
    pub fn new(
        header_len: usize,
        get_frame_length: impl Fn(&[u8]) -> usize + Send + Sync + 'static,
        max_frame_len: usize,
    ) -> Self {
        Self {
            header_len,
            get_frame_length: Box::new(get_frame_length),
            max_frame_len,
        }
    }

    /// Convenience constructor for the common 4-byte little-endian total
    /// length prefix (the shape used throughout the spec's worked
    /// examples).
    pub fn u32_le(max_frame_len: usize) -> Self {
        Self::new(
            4,
            |header| u32::from_le_bytes(header.try_into().expect("header_len == 4")) as usize,
            max_frame_len,
        )
    }
}

#[async_trait::async_trait]
impl Defragmenter for LengthPrefixedDefragmenter {
    async fn read_frame(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        leftovers: BufferView,
        cancel: &CancellationToken,
    ) -> Result<DefragmenterOutput, FramewireError> {
        let mut buf = leftovers.materialize();

        if !read_at_least(reader, &mut buf, self.header_len, cancel).await? {
            return Ok(DefragmenterOutput::stream_closed());
        }

        let total = (self.get_frame_length)(&buf[..self.header_len]);
        if total < self.header_len || total > self.max_frame_len {
            return Ok(DefragmenterOutput::dropped());
        }

        if !read_at_least(reader, &mut buf, total, cancel).await? {
            return Ok(DefragmenterOutput::stream_closed());
        }

        let leftover_bytes = buf.split_off(total);
        Ok(DefragmenterOutput::produced(
            BufferView::from(buf),
            BufferView::from(leftover_bytes),
        ))
    }
}
