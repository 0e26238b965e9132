//! Streaming-aware piece selection.
//!
//! Pieces covering a registered read window are fetched before anything
//! else, taking turns between windows so concurrent viewers make progress
//! together. With no window outstanding the picker falls back to plain
//! sequential order.

/// Inclusive range of piece indices a reader needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceWindow {
    pub first: u32,
    pub last: u32,
}

impl PieceWindow {
    /// Window of pieces covering the inclusive byte range `start..=end`.
    pub fn covering(start: u64, end: u64, piece_size: u64) -> Self {
        Self {
            first: (start / piece_size) as u32,
            last: (end / piece_size) as u32,
        }
    }
}

/// Tracks which pieces are present and decides what to fetch next.
#[derive(Debug, Clone)]
pub struct StreamingPiecePicker {
    have: Vec<bool>,
    have_count: u32,
    sequential_cursor: u32,
    window_turn: usize,
}

impl StreamingPiecePicker {
    pub fn new(piece_count: u32) -> Self {
        Self {
            have: vec![false; piece_count as usize],
            have_count: 0,
            sequential_cursor: 0,
            window_turn: 0,
        }
    }

    pub fn piece_count(&self) -> u32 {
        self.have.len() as u32
    }

    pub fn have_count(&self) -> u32 {
        self.have_count
    }

    pub fn has(&self, piece: u32) -> bool {
        self.have.get(piece as usize).copied().unwrap_or(false)
    }

    pub fn is_complete(&self) -> bool {
        self.have_count == self.piece_count()
    }

    /// Records a piece as downloaded. Returns false if it was already present.
    pub fn mark_have(&mut self, piece: u32) -> bool {
        match self.have.get_mut(piece as usize) {
            Some(slot) if !*slot => {
                *slot = true;
                self.have_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Chooses the next missing piece, or None once complete.
    ///
    /// Windows are visited round-robin starting after the one served last;
    /// each contributes its lowest missing piece.
    pub fn next_piece(&mut self, windows: &[PieceWindow]) -> Option<u32> {
        if self.is_complete() {
            return None;
        }

        for step in 0..windows.len() {
            let turn = (self.window_turn + step) % windows.len();
            if let Some(piece) = self.first_missing_in(windows[turn]) {
                self.window_turn = turn + 1;
                return Some(piece);
            }
        }

        while self.has(self.sequential_cursor) {
            self.sequential_cursor += 1;
        }
        if self.sequential_cursor < self.piece_count() {
            Some(self.sequential_cursor)
        } else {
            None
        }
    }

    fn first_missing_in(&self, window: PieceWindow) -> Option<u32> {
        let last = window.last.min(self.piece_count().saturating_sub(1));
        (window.first..=last).find(|piece| !self.has(*piece))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn drain(picker: &mut StreamingPiecePicker, windows: &[PieceWindow], n: usize) -> Vec<u32> {
        let mut picked = Vec::new();
        for _ in 0..n {
            let Some(piece) = picker.next_piece(windows) else {
                break;
            };
            picker.mark_have(piece);
            picked.push(piece);
        }
        picked
    }

    #[test]
    fn test_sequential_without_windows() {
        let mut picker = StreamingPiecePicker::new(5);
        assert_eq!(drain(&mut picker, &[], 10), vec![0, 1, 2, 3, 4]);
        assert!(picker.is_complete());
        assert_eq!(picker.next_piece(&[]), None);
    }

    #[test]
    fn test_window_is_served_first() {
        let mut picker = StreamingPiecePicker::new(100);
        let window = PieceWindow { first: 60, last: 62 };
        assert_eq!(drain(&mut picker, &[window], 4), vec![60, 61, 62, 0]);
    }

    #[test]
    fn test_windows_take_turns() {
        let mut picker = StreamingPiecePicker::new(100);
        let windows = [
            PieceWindow { first: 10, last: 11 },
            PieceWindow { first: 50, last: 51 },
        ];
        assert_eq!(drain(&mut picker, &windows, 4), vec![10, 50, 11, 51]);
    }

    #[test]
    fn test_covering_window() {
        let window = PieceWindow::covering(1000, 5000, 1024);
        assert_eq!(window, PieceWindow { first: 0, last: 4 });
    }

    #[test]
    fn test_window_past_last_piece_is_clamped() {
        let mut picker = StreamingPiecePicker::new(3);
        let window = PieceWindow { first: 2, last: 9 };
        assert_eq!(drain(&mut picker, &[window], 3), vec![2, 0, 1]);
    }

    proptest! {
        #[test]
        fn prop_every_piece_picked_once(
            count in 1u32..200,
            windows in proptest::collection::vec((0u32..200, 0u32..20), 0..4),
        ) {
            let windows: Vec<_> = windows
                .into_iter()
                .map(|(first, span)| PieceWindow { first, last: first + span })
                .collect();
            let mut picker = StreamingPiecePicker::new(count);
            let mut picked = drain(&mut picker, &windows, count as usize + 10);
            prop_assert!(picker.is_complete());
            picked.sort_unstable();
            prop_assert_eq!(picked, (0..count).collect::<Vec<_>>());
        }
    }
}
