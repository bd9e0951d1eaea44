use crate::config;
use crate::game::song::{Song, SongNote};
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Counting,
    Playing,
    Finished,
}

/// Temporal scheduler for one play-through: converts "advance to time T"
/// calls into the batch of song notes due to spawn, each exactly once.
/// The caller samples the clock once per tick and passes the same instant
/// to every method it calls that tick.
pub struct SongPlayer {
    song: Arc<Song>,
    phase: PlaybackPhase,
    countdown_end: Option<Instant>,
    playing_start: Option<Instant>,
    // One flag per schedule index, so duplicate timestamps and unsorted
    // storage both spawn correctly.
    spawned: Vec<bool>,
}

impl SongPlayer {
    pub fn new(song: Arc<Song>) -> SongPlayer {
        let spawned = vec![false; song.notes.len()];
        SongPlayer {
            song,
            phase: PlaybackPhase::Idle,
            countdown_end: None,
            playing_start: None,
            spawned,
        }
    }

    #[inline(always)]
    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    #[inline(always)]
    pub fn is_finished(&self) -> bool {
        self.phase == PlaybackPhase::Finished
    }

    pub fn song(&self) -> &Arc<Song> {
        &self.song
    }

    /// Begins a play-through with a fixed countdown. Restarts cleanly from
    /// any phase.
    pub fn start(&mut self, now: Instant) {
        self.phase = PlaybackPhase::Counting;
        self.countdown_end = Some(now + Duration::from_secs_f64(config::COUNTDOWN_SECONDS));
        self.playing_start = None;
        self.spawned.fill(false);
        info!("Song '{}' starting after countdown", self.song.title);
    }

    /// Halts playback immediately and idempotently; no further notes spawn
    /// even if update is called again this tick.
    pub fn stop(&mut self) {
        self.phase = PlaybackPhase::Finished;
    }

    /// Whole seconds left on the countdown, for display. `None` outside the
    /// counting phase.
    pub fn countdown_display(&self, now: Instant) -> Option<u32> {
        if self.phase != PlaybackPhase::Counting {
            return None;
        }
        let end = self.countdown_end?;
        let remaining = end.saturating_duration_since(now).as_secs_f64();
        Some((remaining.ceil() as u32).max(1))
    }

    /// Seconds of playback elapsed at `now`; 0 before playback begins.
    pub fn elapsed(&self, now: Instant) -> f64 {
        match self.playing_start {
            Some(start) => now.saturating_duration_since(start).as_secs_f64(),
            None => 0.0,
        }
    }

    /// Advances the playback state machine to `now` and returns every note
    /// newly due within the approach window. The batch is a set: no order
    /// is guaranteed, and no note is ever returned twice across a
    /// play-through.
    pub fn update(&mut self, now: Instant) -> Vec<SongNote> {
        if self.phase == PlaybackPhase::Counting {
            let end = self.countdown_end.expect("counting phase always has a countdown end");
            if now < end {
                return Vec::new();
            }
            self.phase = PlaybackPhase::Playing;
            self.playing_start = Some(now);
            info!("Countdown over, song '{}' playing", self.song.title);
        }

        if self.phase != PlaybackPhase::Playing {
            return Vec::new();
        }

        let elapsed = self.elapsed(now);

        if elapsed >= self.song.duration {
            // Final sweep: anything scheduled inside the song that a sparse
            // tick cadence skipped over still spawns exactly once before the
            // player reports Finished.
            let batch = self.take_due(f64::INFINITY);
            self.phase = PlaybackPhase::Finished;
            info!("Song '{}' finished after {:.2}s", self.song.title, elapsed);
            return batch;
        }

        self.take_due(elapsed + config::NOTE_APPROACH_TIME)
    }

    /// Collects unspawned notes with `time <= horizon` (and inside the
    /// song), marking each index spawned.
    fn take_due(&mut self, horizon: f64) -> Vec<SongNote> {
        let mut batch = Vec::new();
        for (i, note) in self.song.notes.iter().enumerate() {
            if self.spawned[i] || note.time >= self.song.duration {
                continue;
            }
            if note.time <= horizon {
                self.spawned[i] = true;
                batch.push(note.clone());
            }
        }
        batch
    }
}
