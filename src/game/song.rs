use crate::config;
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// The six playable note names, one per lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKey {
    C,
    D,
    E,
    F,
    G,
    A,
}

pub const ALL_NOTE_KEYS: [NoteKey; config::LANE_COUNT] = [
    NoteKey::C,
    NoteKey::D,
    NoteKey::E,
    NoteKey::F,
    NoteKey::G,
    NoteKey::A,
];

impl NoteKey {
    #[inline(always)]
    pub const fn lane(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            NoteKey::C => "C",
            NoteKey::D => "D",
            NoteKey::E => "E",
            NoteKey::F => "F",
            NoteKey::G => "G",
            NoteKey::A => "A",
        }
    }

    pub fn from_name(name: &str) -> Option<NoteKey> {
        match name {
            "C" => Some(NoteKey::C),
            "D" => Some(NoteKey::D),
            "E" => Some(NoteKey::E),
            "F" => Some(NoteKey::F),
            "G" => Some(NoteKey::G),
            "A" => Some(NoteKey::A),
            _ => None,
        }
    }
}

fn default_lane() -> i32 {
    -1
}

/// One schedule entry of a song. `time` is seconds from song start at which
/// the note should arrive at the hit line (or begin its hold). Storage order
/// is not guaranteed to be sorted by time.
#[derive(Debug, Clone, Deserialize)]
pub struct SongNote {
    pub key: String,
    #[serde(default = "default_lane")]
    pub lane: i32, // -1 = derive from key
    pub time: f64,
    #[serde(default)]
    pub hold: f64, // Seconds; 0 = instantaneous note
}

#[derive(Debug, Clone, Deserialize)]
pub struct Song {
    pub title: String,
    pub artist: String,
    pub bpm: u32,
    pub duration: f64, // Seconds
    pub notes: Vec<SongNote>,
}

impl Song {
    /// Difficulty score in 0..=100 from note density, BPM and the share of
    /// hold notes.
    pub fn difficulty(&self) -> u32 {
        if self.notes.is_empty() || self.duration <= 0.0 {
            return 0;
        }

        let note_density = self.notes.len() as f64 / self.duration;
        let hold_notes = self.notes.iter().filter(|n| n.hold > 0.0).count();
        let hold_ratio = hold_notes as f64 / self.notes.len() as f64;

        let base = note_density * 20.0 + f64::from(self.bpm) / 4.0;
        let hold_bonus = hold_ratio * 20.0;

        (base + hold_bonus).clamp(0.0, 100.0) as u32
    }

    pub fn from_json(data: &str) -> Result<Song, String> {
        let song: Song = serde_json::from_str(data).map_err(|e| format!("invalid song data: {}", e))?;
        if song.bpm == 0 {
            return Err(format!("song '{}' has zero BPM", song.title));
        }
        if song.duration <= 0.0 {
            return Err(format!("song '{}' has non-positive duration", song.title));
        }
        Ok(song)
    }

    /// Built-in song used when no playable songs could be loaded, so a
    /// session can always start.
    pub fn fallback() -> Song {
        Song {
            title: "Default Song".to_string(),
            artist: "System".to_string(),
            bpm: 120,
            duration: 20.0,
            notes: vec![
                SongNote { key: "C".to_string(), lane: 0, time: 1.0, hold: 0.0 },
                SongNote { key: "D".to_string(), lane: 1, time: 2.0, hold: 0.0 },
                SongNote { key: "E".to_string(), lane: 2, time: 3.0, hold: 0.0 },
                SongNote { key: "F".to_string(), lane: 3, time: 4.0, hold: 0.0 },
                SongNote { key: "G".to_string(), lane: 4, time: 5.0, hold: 0.0 },
                SongNote { key: "A".to_string(), lane: 5, time: 6.0, hold: 0.0 },
            ],
        }
    }
}

pub fn load_song_from_file(path: &Path) -> Result<Song, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("could not read {:?}: {}", path, e))?;
    Song::from_json(&data)
}

/// Scans a directory for `.json` song files. Unreadable or malformed files
/// are logged and skipped; an empty or missing directory yields an empty
/// list, which the session turns into the built-in fallback song.
pub fn load_songs_from_dir(dir: &Path) -> Vec<Arc<Song>> {
    if !dir.is_dir() {
        warn!("Songs directory {:?} not found. No songs will be loaded.", dir);
        return Vec::new();
    }

    let mut songs = Vec::new();
    for entry in fs::read_dir(dir).into_iter().flatten().flatten() {
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            continue;
        }

        match load_song_from_file(&path) {
            Ok(song) => {
                info!("Loaded song '{}' by {} ({} notes)", song.title, song.artist, song.notes.len());
                songs.push(Arc::new(song));
            }
            Err(e) => warn!("Skipping song file {:?}: {}", path, e),
        }
    }

    info!("Finished song scan. Found {} songs in {:?}.", songs.len(), dir);
    songs
}
