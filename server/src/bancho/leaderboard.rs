// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::collections::HashMap;

use packet::Mode;
use smol::lock::Mutex;

use crate::store::StatsRow;

#[derive(Debug, Clone, Copy)]
struct Entry {
    user_id: i32,
    score: u64,
}

#[derive(Default)]
struct Board {
    /// Descending by score; ties keep insertion order, so the earlier
    /// insertion holds the better rank.
    ordered: Vec<Entry>,
    positions: HashMap<i32, usize>,
}

impl Board {
    fn upsert(&mut self, user_id: i32, score: u64) {
        match self.positions.get(&user_id) {
            Some(&pos) => self.ordered[pos].score = score,
            None => self.ordered.push(Entry { user_id, score }),
        }
        // stable sort keeps equal scores in their current order
        self.ordered.sort_by(|a, b| b.score.cmp(&a.score));
        self.reindex();
    }

    fn remove(&mut self, user_id: i32) {
        if self.positions.remove(&user_id).is_some() {
            self.ordered.retain(|e| e.user_id != user_id);
            self.reindex();
        }
    }

    fn reindex(&mut self) {
        self.positions = self
            .ordered
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.user_id, pos))
            .collect();
    }

    fn rank(&self, user_id: i32) -> Option<i32> {
        self.positions.get(&user_id).map(|&pos| pos as i32 + 1)
    }
}

/// Per-mode ranked-score index. One async mutex serialises every
/// reader and writer; rank lookups are O(1) under the lock.
pub struct Leaderboards {
    boards: Mutex<[Board; 4]>,
}

impl Leaderboards {
    pub fn new() -> Self {
        Self {
            boards: Mutex::new(Default::default()),
        }
    }

    pub async fn seed(&self, rows: &[StatsRow]) {
        let mut boards = self.boards.lock().await;
        for row in rows {
            boards[usize::from(u8::from(row.mode))].upsert(row.user_id, row.ranked_score);
        }
    }

    pub async fn upsert(&self, mode: Mode, user_id: i32, score: u64) {
        let mut boards = self.boards.lock().await;
        boards[usize::from(u8::from(mode))].upsert(user_id, score);
    }

    /// 1-based rank, or None for users not on the board.
    pub async fn rank(&self, mode: Mode, user_id: i32) -> Option<i32> {
        let boards = self.boards.lock().await;
        boards[usize::from(u8::from(mode))].rank(user_id)
    }

    /// Drop the user from every mode's board.
    pub async fn remove(&self, user_id: i32) {
        let mut boards = self.boards.lock().await;
        for board in boards.iter_mut() {
            board.remove(user_id);
        }
    }
}

impl Default for Leaderboards {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_counts_strictly_greater_scores() {
        smol::block_on(async {
            let boards = Leaderboards::new();
            boards.upsert(Mode::Osu, 3, 100).await;
            boards.upsert(Mode::Osu, 4, 200).await;
            boards.upsert(Mode::Osu, 5, 50).await;

            assert_eq!(boards.rank(Mode::Osu, 4).await, Some(1));
            assert_eq!(boards.rank(Mode::Osu, 3).await, Some(2));
            assert_eq!(boards.rank(Mode::Osu, 5).await, Some(3));
            assert_eq!(boards.rank(Mode::Osu, 6).await, None);
            // other modes are independent
            assert_eq!(boards.rank(Mode::Taiko, 3).await, None);
        });
    }

    #[test]
    fn ties_keep_insertion_order() {
        smol::block_on(async {
            let boards = Leaderboards::new();
            boards.upsert(Mode::Mania, 3, 100).await;
            boards.upsert(Mode::Mania, 4, 100).await;
            boards.upsert(Mode::Mania, 5, 100).await;

            assert_eq!(boards.rank(Mode::Mania, 3).await, Some(1));
            assert_eq!(boards.rank(Mode::Mania, 4).await, Some(2));
            assert_eq!(boards.rank(Mode::Mania, 5).await, Some(3));

            // re-upserting the same score does not reshuffle ties
            boards.upsert(Mode::Mania, 4, 100).await;
            assert_eq!(boards.rank(Mode::Mania, 4).await, Some(2));
        });
    }

    #[test]
    fn upsert_reflects_new_scores() {
        smol::block_on(async {
            let boards = Leaderboards::new();
            boards.upsert(Mode::Osu, 3, 100).await;
            boards.upsert(Mode::Osu, 4, 200).await;

            boards.upsert(Mode::Osu, 3, 300).await;
            assert_eq!(boards.rank(Mode::Osu, 3).await, Some(1));
            assert_eq!(boards.rank(Mode::Osu, 4).await, Some(2));
        });
    }

    #[test]
    fn remove_drops_all_modes() {
        smol::block_on(async {
            let boards = Leaderboards::new();
            for mode in Mode::ALL {
                boards.upsert(mode, 3, 10).await;
                boards.upsert(mode, 4, 5).await;
            }
            boards.remove(3).await;
            for mode in Mode::ALL {
                assert_eq!(boards.rank(mode, 3).await, None);
                assert_eq!(boards.rank(mode, 4).await, Some(1));
            }
        });
    }
}
