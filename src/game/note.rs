use crate::config;
use crate::game::song::{NoteKey, SongNote};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStatus {
    Active,
    Hit,
    Missed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteKind {
    Tap,
    Hold { secs: f64 },
}

/// A spawned, scrolling instance of a song note. Owned by the session's
/// active collection; once its status leaves `Active` it is inert and gets
/// removed during compaction.
#[derive(Debug, Clone)]
pub struct RuntimeNote {
    pub key: NoteKey,
    pub lane: usize,
    pub x: f32,
    pub y: f32,
    pub height: f32,
    pub speed: f32, // Pixels per second, downward
    pub kind: NoteKind,
    pub status: NoteStatus,
}

impl RuntimeNote {
    /// Materializes a schedule entry into a scrolling note. Returns `None`
    /// for an unrecognized key; such notes are dropped rather than crashing
    /// the session.
    pub fn spawn(note: &SongNote, bpm: u32, screen_width: f32) -> Option<RuntimeNote> {
        let Some(key) = NoteKey::from_name(&note.key) else {
            warn!("Dropping note with unknown key '{}' at t={:.2}", note.key, note.time);
            return None;
        };

        let lane = if note.lane >= 0 && (note.lane as usize) < config::LANE_COUNT {
            note.lane as usize
        } else {
            key.lane()
        };

        let lane_width = screen_width / config::LANE_COUNT as f32;
        let x = lane as f32 * lane_width + lane_width / 2.0 - config::NOTE_WIDTH / 2.0;

        let hold = note.hold.max(0.0);
        let (kind, height) = if hold > 0.0 {
            let height = (hold as f32 * config::HOLD_PIXELS_PER_SECOND).min(config::MAX_HOLD_HEIGHT);
            (NoteKind::Hold { secs: hold }, height)
        } else {
            (NoteKind::Tap, config::NOTE_HEIGHT)
        };

        // Spawn with the whole body above the field, bottom edge at 0.
        let y = -height;

        let speed = (config::BASE_SCROLL_SPEED * bpm as f32 / config::REFERENCE_BPM)
            .clamp(config::MIN_SCROLL_SPEED, config::MAX_SCROLL_SPEED);

        Some(RuntimeNote {
            key,
            lane,
            x,
            y,
            height,
            speed,
            kind,
            status: NoteStatus::Active,
        })
    }

    pub fn advance(&mut self, dt: f32) {
        self.y += self.speed * dt;
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.status == NoteStatus::Active
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn hit(&mut self) {
        if self.status == NoteStatus::Active {
            self.status = NoteStatus::Hit;
        }
    }

    pub fn miss(&mut self) {
        if self.status == NoteStatus::Active {
            self.status = NoteStatus::Missed;
        }
    }

    /// Whether any judgeable part of the note is within the hit window.
    pub fn is_hittable(&self, hit_line_y: f32) -> bool {
        match self.kind {
            NoteKind::Tap => (self.y - hit_line_y).abs() <= config::HIT_WINDOW,
            NoteKind::Hold { .. } => {
                self.y - config::HIT_WINDOW <= hit_line_y
                    && hit_line_y <= self.bottom() + config::HIT_WINDOW
            }
        }
    }

    /// Whether the note has passed out of judgeable range below the hit
    /// line. Holds are judged on the bottom edge of their body, taps on
    /// their head.
    pub fn has_passed(&self, hit_line_y: f32) -> bool {
        match self.kind {
            NoteKind::Tap => self.y > hit_line_y + config::HIT_WINDOW,
            NoteKind::Hold { .. } => self.bottom() > hit_line_y + config::HIT_WINDOW,
        }
    }

    /// Timing quality in 0.0..=1.0 for a press at the current position.
    /// Better timing never scores lower.
    pub fn hit_accuracy(&self, hit_line_y: f32) -> f32 {
        match self.kind {
            NoteKind::Tap => {
                let distance = (self.y - hit_line_y).abs();
                if distance > config::HIT_WINDOW {
                    0.0
                } else {
                    1.0 - distance / config::HIT_WINDOW
                }
            }
            NoteKind::Hold { .. } => {
                let head_distance = (self.y - hit_line_y).abs();
                if head_distance < config::HOLD_PERFECT_TOLERANCE {
                    return 1.0;
                }
                if self.y <= hit_line_y && hit_line_y <= self.bottom() {
                    return config::HOLD_BODY_ACCURACY;
                }
                if head_distance > config::HIT_WINDOW {
                    return config::HOLD_ACCURACY_FLOOR;
                }
                (0.7 - head_distance / 100.0).max(config::HOLD_ACCURACY_FLOOR)
            }
        }
    }
}

/// Points awarded for a press at the given accuracy: flat base plus an
/// accuracy-scaled bonus.
pub fn score_for_accuracy(accuracy: f32) -> u32 {
    let bonus = (config::BASE_NOTE_SCORE as f32 * accuracy.clamp(0.0, 1.0)).round() as u32;
    config::BASE_NOTE_SCORE + bonus
}
