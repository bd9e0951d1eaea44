use chrono::{DateTime, Local};
use log::info;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;

/// Letter rank shown on the results screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    S,
    A,
    B,
    C,
    D,
    F,
}

pub fn rank_for_accuracy(accuracy: f64) -> Rank {
    if accuracy >= 95.0 {
        Rank::S
    } else if accuracy >= 90.0 {
        Rank::A
    } else if accuracy >= 80.0 {
        Rank::B
    } else if accuracy >= 70.0 {
        Rank::C
    } else if accuracy >= 60.0 {
        Rank::D
    } else {
        Rank::F
    }
}

/// Outcome of one finished play-through.
#[derive(Debug, Clone)]
pub struct PlayRecord {
    pub song_title: String,
    pub score: u32,
    pub hit_notes: u32,
    pub total_notes: u32,
    pub accuracy: f64,
    pub rank: Rank,
    /// Whether the song ran to completion (as opposed to a game over).
    pub cleared: bool,
    pub finished_at: DateTime<Local>,
}

// Best result per song for this process lifetime. Results are not written
// to disk.
static BEST_RESULTS: Lazy<Mutex<HashMap<String, PlayRecord>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Stores a finished play-through, keeping the highest-scoring record per
/// song.
pub fn record(result: PlayRecord) {
    info!(
        "Recording result for '{}': score {}, {}/{} hit, {:.1}% ({:?})",
        result.song_title, result.score, result.hit_notes, result.total_notes, result.accuracy, result.rank
    );

    let mut best = BEST_RESULTS.lock().unwrap();
    match best.get(&result.song_title) {
        Some(existing) if existing.score >= result.score => {}
        _ => {
            best.insert(result.song_title.clone(), result);
        }
    }
}

/// Best recorded result for a song, if any attempt finished.
pub fn best_for(song_title: &str) -> Option<PlayRecord> {
    BEST_RESULTS.lock().unwrap().get(song_title).cloned()
}
