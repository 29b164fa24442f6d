use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use super::{Defragmenter, DefragmenterOutput, read_at_least};
use crate::buffer::BufferView;
use crate::error::FramewireError;

/// Result of inspecting the bytes accumulated so far as a candidate header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeaderOutcome {
    /// Not enough bytes yet to decide; read more and ask again.
    NeedMore,
    /// The header is complete: it occupies `header_len` bytes and the frame
    /// (header included) totals `total_len` bytes.
    HeaderComplete { header_len: usize, total_len: usize },
    /// The accumulated bytes can never form a valid header.
    Invalid,
}

/// Defragmenter for protocols whose header has no fixed length — e.g. a
/// delimiter-terminated header, or a self-describing tag/length/value
/// prefix. The caller supplies a predicate that inspects the growing byte
/// prefix and reports one of the three [`HeaderOutcome`]s.
pub struct MixedDefragmenter {
    header_predicate: Box<dyn Fn(&[u8]) -> HeaderOutcome + Send + Sync>,
    max_frame_len: usize,
}

impl MixedDefragmenter {
    pub fn new(
        header_predicate: impl Fn(&[u8]) -> HeaderOutcome + Send + Sync + 'static,
        max_frame_len: usize,
    ) -> Self {
        Self {
            header_predicate: Box::new(header_predicate),
            max_frame_len,
        }
    }
}

#[async_trait::async_trait]
impl Defragmenter for MixedDefragmenter {
    async fn read_frame(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        leftovers: BufferView,
        cancel: &CancellationToken,
    ) -> Result<DefragmenterOutput, FramewireError> {
        let mut buf = leftovers.materialize();

        let total_len = loop {
            match (self.header_predicate)(&buf) {
                HeaderOutcome::HeaderComplete { header_len, total_len } => {
                    if total_len < header_len || total_len > self.max_frame_len {
                        return Ok(DefragmenterOutput::dropped());
                    }
                    break total_len;
                }
                HeaderOutcome::Invalid => return Ok(DefragmenterOutput::dropped()),
                HeaderOutcome::NeedMore => {
                    let target = buf.len() + 1;
                    if !read_at_least(reader, &mut buf, target, cancel).await? {
                        return Ok(DefragmenterOutput::stream_closed());
                    }
                }
            }
        };

        if !read_at_least(reader, &mut buf, total_len, cancel).await? {
            return Ok(DefragmenterOutput::stream_closed());
        }

        let leftover_bytes = buf.split_off(total_len);
        Ok(DefragmenterOutput::produced(
            BufferView::from(buf),
            BufferView::from(leftover_bytes),
        ))
    }
}
