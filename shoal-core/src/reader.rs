//! Per-request read sequences over a shared session.
//!
//! Every HTTP response owns its own [`ReadSequence`]. Dropping it, whether
//! because the body finished or because the client went away, withdraws its
//! piece interest and detaches it from the session without touching any
//! other reader.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::range::ByteRange;
use crate::session::SwarmSession;
use crate::swarm::{InterestId, SwarmError, SwarmTorrent};

/// Failures that end a read sequence early.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("session destroyed while reading")]
    SessionDestroyed,

    #[error(transparent)]
    Swarm(#[from] SwarmError),

    #[error("swarm returned no data at offset {offset}")]
    UnexpectedEof { offset: u64 },
}

/// Ordered, non-restartable chunk stream over one byte window of one file.
pub struct ReadSequence {
    id: u64,
    range: ByteRange,
    cancel: CancellationToken,
    stream: BoxStream<'static, Result<Bytes, ReadError>>,
}

impl ReadSequence {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session: Arc<SwarmSession>,
        torrent: Arc<dyn SwarmTorrent>,
        id: u64,
        file_index: usize,
        range: ByteRange,
        interest: InterestId,
        cancel: CancellationToken,
        chunk_size: usize,
    ) -> Self {
        let guard = ReaderGuard {
            session: session.clone(),
            torrent: torrent.clone(),
            interest,
            id,
        };
        let state = ReaderState {
            session,
            torrent,
            file_index,
            next: range.start,
            end: range.end,
            cancel: cancel.clone(),
            chunk_size,
            finished: false,
            _guard: guard,
        };

        Self {
            id,
            range,
            cancel,
            stream: stream::unfold(state, next_chunk).boxed(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Window this sequence was opened for.
    pub fn range(&self) -> ByteRange {
        self.range
    }

    /// Stops this sequence only. The stream ends at its next poll.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for ReadSequence {
    type Item = Result<Bytes, ReadError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ReadSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSequence")
            .field("id", &self.id)
            .field("range", &self.range)
            .finish()
    }
}

struct ReaderState {
    session: Arc<SwarmSession>,
    torrent: Arc<dyn SwarmTorrent>,
    file_index: usize,
    next: u64,
    end: u64,
    cancel: CancellationToken,
    chunk_size: usize,
    finished: bool,
    _guard: ReaderGuard,
}

/// Detaches the reader from its session when the stream state is dropped.
struct ReaderGuard {
    session: Arc<SwarmSession>,
    torrent: Arc<dyn SwarmTorrent>,
    interest: InterestId,
    id: u64,
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.torrent.remove_interest(self.interest);
        self.session.reader_closed(self.id);
    }
}

async fn next_chunk(mut state: ReaderState) -> Option<(Result<Bytes, ReadError>, ReaderState)> {
    if state.finished || state.next > state.end {
        return None;
    }

    let want = (state.end - state.next + 1).min(state.chunk_size as u64) as usize;
    let torrent = state.torrent.clone();
    let cancel = state.cancel.clone();
    let read = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        read = torrent.read_at(state.file_index, state.next, want) => Some(read),
    };

    let Some(read) = read else {
        state.finished = true;
        if state.session.cancellation().is_cancelled() {
            return Some((Err(ReadError::SessionDestroyed), state));
        }
        return None;
    };

    match read {
        Ok(bytes) if bytes.is_empty() => {
            state.finished = true;
            let offset = state.next;
            Some((Err(ReadError::UnexpectedEof { offset }), state))
        }
        Ok(mut bytes) => {
            bytes.truncate(want);
            state.next += bytes.len() as u64;
            state.session.touch();
            Some((Ok(bytes), state))
        }
        Err(SwarmError::Shutdown) => {
            state.finished = true;
            Some((Err(ReadError::SessionDestroyed), state))
        }
        Err(e) => {
            state.finished = true;
            Some((Err(ReadError::Swarm(e)), state))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_id::Locator;
    use crate::swarm::SwarmClient;
    use crate::swarm::test_mocks::{MockSwarm, MockTorrent, patterned_bytes};

    async fn session_over(len: usize, chunk: usize) -> (Arc<SwarmSession>, Arc<MockTorrent>) {
        let swarm = MockSwarm::with_video(len);
        let locator = Locator::parse("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();
        let session = Arc::new(SwarmSession::pending(locator.content_id, chunk));
        let torrent = swarm.join(&locator).await.unwrap();
        session.mark_ready(torrent);
        (session, swarm.last_torrent().unwrap())
    }

    #[tokio::test]
    async fn test_chunks_respect_chunk_size() {
        let (session, _torrent) = session_over(1000, 128).await;
        let reader = session.open_reader(0, ByteRange::new(0, 999)).unwrap();

        let sizes: Vec<usize> = reader.map(|chunk| chunk.unwrap().len()).collect().await;
        assert_eq!(sizes.len(), 8);
        assert!(sizes.iter().all(|size| *size <= 128));
        assert_eq!(sizes.iter().sum::<usize>(), 1000);
    }

    #[tokio::test]
    async fn test_independent_readers_over_one_session() {
        let (session, torrent) = session_over(4096, 256).await;
        let first = session.open_reader(0, ByteRange::new(0, 1023)).unwrap();
        let second = session.open_reader(0, ByteRange::new(2048, 4095)).unwrap();
        assert_eq!(torrent.interest_count(), 2);
        assert_eq!(session.active_readers(), 2);

        first.cancel();
        let mut first = first;
        assert!(first.next().await.is_none());
        drop(first);
        assert_eq!(torrent.interest_count(), 1);
        assert_eq!(session.active_readers(), 1);

        let bytes: Vec<u8> = second
            .flat_map(|chunk| stream::iter(chunk.unwrap().to_vec()))
            .collect()
            .await;
        assert_eq!(bytes, patterned_bytes(4096)[2048..].to_vec());
        assert_eq!(torrent.interest_count(), 0);
        assert_eq!(session.active_readers(), 0);
    }

    #[tokio::test]
    async fn test_dropping_reader_mid_stream_detaches() {
        let (session, torrent) = session_over(4096, 256).await;
        let mut reader = session.open_reader(0, ByteRange::new(0, 4095)).unwrap();
        assert!(reader.next().await.unwrap().is_ok());
        drop(reader);

        assert_eq!(torrent.interest_count(), 0);
        assert_eq!(session.active_readers(), 0);
        assert!(!torrent.is_shut_down());
    }
}
