//! Simulated torrent handle with paced, priority-driven delivery.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use shoal_core::config::SimulationConfig;
use shoal_core::{FileHandle, InterestId, SwarmError, SwarmTorrent, TransferStats};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::content::SimulatedContent;
use crate::picker::{PieceWindow, StreamingPiecePicker};

struct DeliveryState {
    picker: StreamingPiecePicker,
    windows: BTreeMap<InterestId, PieceWindow>,
}

/// A joined simulated swarm for one item of content.
///
/// A background task delivers `pieces_per_tick` pieces every
/// `piece_interval`, always preferring pieces under an active interest.
pub struct SimulatedTorrent {
    content: Arc<SimulatedContent>,
    /// Start offset of each file within the concatenated piece space
    file_offsets: Vec<u64>,
    piece_size: u64,
    pieces_per_tick: u32,
    delivery_rate: u64,
    peer_count: u32,
    state: Mutex<DeliveryState>,
    have: watch::Sender<u32>,
    next_interest: AtomicU64,
    paused: AtomicBool,
    cancel: CancellationToken,
}

impl SimulatedTorrent {
    /// Creates the torrent and starts its delivery task.
    pub fn start(
        content: Arc<SimulatedContent>,
        config: &SimulationConfig,
        peer_count: u32,
    ) -> Arc<Self> {
        let piece_size = u64::from(config.piece_size.max(1));
        let piece_count = content.total_length().div_ceil(piece_size) as u32;

        let mut file_offsets = Vec::with_capacity(content.files().len());
        let mut offset = 0;
        for file in content.files() {
            file_offsets.push(offset);
            offset += file.length();
        }

        let (have, _) = watch::channel(0);
        let torrent = Arc::new(Self {
            content,
            file_offsets,
            piece_size,
            pieces_per_tick: config.pieces_per_tick.max(1),
            delivery_rate: config.delivery_rate(),
            peer_count,
            state: Mutex::new(DeliveryState {
                picker: StreamingPiecePicker::new(piece_count),
                windows: BTreeMap::new(),
            }),
            have,
            next_interest: AtomicU64::new(1),
            paused: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        });

        info!(
            content_id = %torrent.content.content_id().short(),
            pieces = piece_count,
            peers = peer_count,
            "simulated torrent started"
        );

        tokio::spawn(deliver(
            Arc::downgrade(&torrent),
            torrent.cancel.clone(),
            config.piece_interval,
        ));
        torrent
    }

    pub fn content(&self) -> &SimulatedContent {
        &self.content
    }

    pub fn piece_count(&self) -> u32 {
        self.state.lock().picker.piece_count()
    }

    pub fn have_count(&self) -> u32 {
        *self.have.borrow()
    }

    pub fn interest_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    /// Stops delivery until [`resume`](Self::resume). Reads of missing pieces stall.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Delivers one tick worth of pieces. Returns false once complete.
    fn deliver_tick(&self) -> bool {
        if self.is_paused() {
            return true;
        }

        let (delivered, have, complete) = {
            let mut state = self.state.lock();
            let windows: Vec<PieceWindow> = state.windows.values().copied().collect();
            let mut delivered = Vec::new();
            for _ in 0..self.pieces_per_tick {
                let Some(piece) = state.picker.next_piece(&windows) else {
                    break;
                };
                state.picker.mark_have(piece);
                delivered.push(piece);
            }
            (delivered, state.picker.have_count(), state.picker.is_complete())
        };

        if !delivered.is_empty() {
            trace!(pieces = ?delivered, have, "pieces delivered");
            self.have.send_replace(have);
        }
        !complete
    }

    fn has_piece(&self, piece: u32) -> bool {
        self.state.lock().picker.has(piece)
    }

    fn file_start(&self, file_index: usize) -> Result<(u64, u64), SwarmError> {
        let file = self
            .content
            .files()
            .get(file_index)
            .ok_or(SwarmError::FileNotFound { index: file_index })?;
        Ok((self.file_offsets[file_index], file.length()))
    }
}

async fn deliver(
    torrent: Weak<SimulatedTorrent>,
    cancel: CancellationToken,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let Some(torrent) = torrent.upgrade() else {
            return;
        };
        if !torrent.deliver_tick() {
            info!(
                content_id = %torrent.content.content_id().short(),
                "simulated transfer complete"
            );
            return;
        }
    }
}

#[async_trait]
impl SwarmTorrent for SimulatedTorrent {
    fn files(&self) -> Vec<FileHandle> {
        self.content.file_handles()
    }

    fn stats(&self) -> TransferStats {
        let (have, count) = {
            let state = self.state.lock();
            (state.picker.have_count(), state.picker.piece_count())
        };
        let complete = have == count;
        let active = !complete && !self.is_paused() && !self.is_shut_down();

        TransferStats {
            download_rate_bytes_per_sec: if active { self.delivery_rate } else { 0 },
            upload_rate_bytes_per_sec: if self.is_shut_down() {
                0
            } else {
                self.delivery_rate / 8
            },
            peer_count: if self.is_shut_down() { 0 } else { self.peer_count },
            progress_fraction: if count == 0 {
                1.0
            } else {
                f64::from(have) / f64::from(count)
            },
        }
    }

    fn is_complete(&self) -> bool {
        self.state.lock().picker.is_complete()
    }

    async fn wait_complete(&self) {
        let count = self.piece_count();
        let mut have = self.have.subscribe();
        let completed = tokio::select! {
            done = have.wait_for(|have| *have >= count) => done.is_ok(),
            _ = self.cancel.cancelled() => false,
        };
        if !completed {
            std::future::pending::<()>().await;
        }
    }

    fn add_interest(
        &self,
        file_index: usize,
        range: RangeInclusive<u64>,
    ) -> Result<InterestId, SwarmError> {
        if self.is_shut_down() {
            return Err(SwarmError::Shutdown);
        }
        let (start, length) = self.file_start(file_index)?;
        if *range.end() >= length {
            return Err(SwarmError::OutOfBounds {
                offset: *range.end(),
                length,
            });
        }

        let window = PieceWindow::covering(
            start + range.start(),
            start + range.end(),
            self.piece_size,
        );
        let id = InterestId(self.next_interest.fetch_add(1, Ordering::SeqCst));
        self.state.lock().windows.insert(id, window);

        debug!(
            interest = id.0,
            first_piece = window.first,
            last_piece = window.last,
            "interest registered"
        );
        Ok(id)
    }

    fn remove_interest(&self, interest: InterestId) {
        if self.state.lock().windows.remove(&interest).is_some() {
            debug!(interest = interest.0, "interest withdrawn");
        }
    }

    async fn read_at(
        &self,
        file_index: usize,
        offset: u64,
        max_len: usize,
    ) -> Result<Bytes, SwarmError> {
        let (start, length) = self.file_start(file_index)?;
        if offset >= length {
            return Err(SwarmError::OutOfBounds { offset, length });
        }

        let global = start + offset;
        let piece = (global / self.piece_size) as u32;

        let mut have = self.have.subscribe();
        while !self.has_piece(piece) {
            tokio::select! {
                changed = have.changed() => {
                    if changed.is_err() {
                        return Err(SwarmError::Shutdown);
                    }
                }
                _ = self.cancel.cancelled() => return Err(SwarmError::Shutdown),
            }
        }
        if self.is_shut_down() {
            return Err(SwarmError::Shutdown);
        }

        let piece_end = (u64::from(piece) + 1) * self.piece_size - start;
        let end = (offset + max_len as u64).min(length).min(piece_end);
        let data = &self.content.files()[file_index].data;
        Ok(data.slice(offset as usize..end as usize))
    }

    async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.state.lock().windows.clear();
        info!(
            content_id = %self.content.content_id().short(),
            "simulated torrent shut down"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig {
            piece_size: 100,
            piece_interval: Duration::from_millis(10),
            pieces_per_tick: 1,
            ..SimulationConfig::deterministic_testing()
        }
    }

    fn content(len: usize) -> Arc<SimulatedContent> {
        Arc::new(
            SimulatedContent::builder("clip")
                .file("poster.jpg", vec![9u8; 50])
                .patterned_file("clip.mp4", len)
                .build(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_waits_for_piece() {
        let torrent = SimulatedTorrent::start(content(1000), &config(), 4);
        torrent.pause();

        let read = tokio::time::timeout(Duration::from_secs(5), torrent.read_at(1, 0, 64)).await;
        assert!(read.is_err());

        torrent.resume();
        let bytes = torrent.read_at(1, 0, 64).await.unwrap();
        assert_eq!(bytes.len(), 50);
        assert_eq!(bytes[0], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interest_window_is_delivered_first() {
        let torrent = SimulatedTorrent::start(content(1000), &config(), 4);
        // file 1 starts at byte 50, so offset 800 lives in piece 8
        let interest = torrent.add_interest(1, 800..=899).unwrap();

        let bytes = torrent.read_at(1, 850, 200).await.unwrap();
        assert_eq!(bytes.len(), 100);
        assert_eq!(bytes[0], (850 % 251) as u8);
        assert!(torrent.have_count() <= 3);

        torrent.remove_interest(interest);
        assert_eq!(torrent.interest_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_and_reports_stats() {
        let torrent = SimulatedTorrent::start(content(1000), &config(), 4);
        assert_eq!(torrent.stats().peer_count, 4);
        assert!(torrent.stats().download_rate_bytes_per_sec > 0);

        torrent.wait_complete().await;
        assert!(torrent.is_complete());
        let stats = torrent.stats();
        assert_eq!(stats.progress_fraction, 1.0);
        assert_eq!(stats.download_rate_bytes_per_sec, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_unblocks_reads() {
        let torrent = SimulatedTorrent::start(content(1000), &config(), 4);
        torrent.pause();

        let reader = {
            let torrent = torrent.clone();
            tokio::spawn(async move { torrent.read_at(1, 900, 10).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        torrent.shutdown().await;

        assert_eq!(reader.await.unwrap(), Err(SwarmError::Shutdown));
        assert!(matches!(
            torrent.add_interest(1, 0..=1),
            Err(SwarmError::Shutdown)
        ));
        assert_eq!(torrent.stats().peer_count, 0);
    }

    #[tokio::test]
    async fn test_bounds_are_checked() {
        let torrent = SimulatedTorrent::start(content(100), &config(), 1);
        assert!(matches!(
            torrent.read_at(1, 100, 1).await,
            Err(SwarmError::OutOfBounds { .. })
        ));
        assert!(matches!(
            torrent.add_interest(5, 0..=1),
            Err(SwarmError::FileNotFound { index: 5 })
        ));
        torrent.shutdown().await;
    }
}
