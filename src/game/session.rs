use crate::config::{self, Settings};
use crate::core::audio::AudioOutput;
use crate::core::clock::Clock;
use crate::game::input::InputEvent;
use crate::game::note::{self, RuntimeNote};
use crate::game::player::SongPlayer;
use crate::game::scores::{self, PlayRecord};
use crate::game::song::{NoteKey, Song};
use log::{info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Title,
    Playing,
    GameOver,
    SongComplete,
}

/// Transient per-lane feedback for the renderer; shown for
/// `config::FEEDBACK_FLASH_DURATION` after the event.
#[derive(Debug, Clone, Copy)]
pub struct HitFlash {
    pub lane: usize,
    pub awarded: u32,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct MissFlash {
    pub lane: usize,
    pub at: Instant,
}

/// One game session: the state machine from title screen through gameplay
/// to the results screens, plus every counter the renderer shows.
pub struct Session {
    pub state: SessionState,
    pub score: u32,
    pub misses: u32,
    pub total_notes: u32,
    pub hit_notes: u32,
    pub selected_song: usize,
    pub songs: Vec<Arc<Song>>,
    pub player: SongPlayer,
    pub notes: Vec<RuntimeNote>,
    pub last_hit: Option<HitFlash>,
    pub last_miss: Option<MissFlash>,
    settings: Settings,
    clock: Arc<dyn Clock>,
    audio: Box<dyn AudioOutput>,
    input_queue: VecDeque<InputEvent>,
    ended_at: Option<Instant>,
    log_timer: f32,
}

pub fn init(songs: Vec<Arc<Song>>, clock: Arc<dyn Clock>, audio: Box<dyn AudioOutput>) -> Session {
    let mut songs = songs;
    if songs.is_empty() {
        warn!("No playable songs provided; using the built-in fallback song.");
        songs.push(Arc::new(Song::fallback()));
    }

    info!("Session ready with {} song(s).", songs.len());
    let player = SongPlayer::new(songs[0].clone());
    Session {
        state: SessionState::Title,
        score: 0,
        misses: 0,
        total_notes: 0,
        hit_notes: 0,
        selected_song: 0,
        songs,
        player,
        notes: Vec::new(),
        last_hit: None,
        last_miss: None,
        settings: config::get(),
        clock,
        audio,
        input_queue: VecDeque::new(),
        ended_at: None,
        log_timer: 0.0,
    }
}

/// Enqueues a host input event for the next tick. Events are drained once
/// per `update`, so a key press is credited against at most one note no
/// matter how the host delivers it.
pub fn queue_input(session: &mut Session, event: InputEvent) {
    session.input_queue.push_back(event);
}

/// Advances the session by one tick. `dt` is the seconds since the previous
/// tick; the wall clock is sampled exactly once.
pub fn update(session: &mut Session, dt: f32) {
    let now = session.clock.now();
    match session.state {
        SessionState::Title => update_title(session, now),
        SessionState::Playing => update_playing(session, dt, now),
        SessionState::GameOver | SessionState::SongComplete => update_results(session, now),
    }
}

impl Session {
    pub fn current_song(&self) -> &Arc<Song> {
        &self.songs[self.selected_song]
    }

    /// Hit percentage in 0..=100; zero before any note has been seen.
    pub fn accuracy(&self) -> f64 {
        if self.total_notes == 0 {
            return 0.0;
        }
        f64::from(self.hit_notes) / f64::from(self.total_notes) * 100.0
    }

    /// Countdown value to display, when counting down.
    pub fn countdown(&self) -> Option<u32> {
        self.player.countdown_display(self.clock.now())
    }

    /// Seconds of the current song left to play, clamped at zero.
    pub fn remaining_time(&self) -> f64 {
        let song = self.player.song();
        (song.duration - self.player.elapsed(self.clock.now())).max(0.0)
    }

    /// Hit feedback still inside its display window, if any.
    pub fn hit_flash(&self) -> Option<HitFlash> {
        self.last_hit.filter(|flash| {
            self.clock.now().saturating_duration_since(flash.at) < config::FEEDBACK_FLASH_DURATION
        })
    }

    /// Miss feedback still inside its display window, if any.
    pub fn miss_flash(&self) -> Option<MissFlash> {
        self.last_miss.filter(|flash| {
            self.clock.now().saturating_duration_since(flash.at) < config::FEEDBACK_FLASH_DURATION
        })
    }
}

fn update_title(session: &mut Session, now: Instant) {
    while let Some(event) = session.input_queue.pop_front() {
        match event {
            InputEvent::Start => {
                start_new_game(session, now);
                return;
            }
            InputEvent::SelectNext => change_selection(session, 1),
            InputEvent::SelectPrev => change_selection(session, -1),
            InputEvent::Note(_) | InputEvent::Continue => {}
        }
    }
}

fn change_selection(session: &mut Session, step: i32) {
    let last = session.songs.len() as i32 - 1;
    let target = (session.selected_song as i32 + step).clamp(0, last) as usize;
    if target == session.selected_song {
        return;
    }

    session.selected_song = target;
    // Rebind the player so the countdown starts against the right song.
    session.player = SongPlayer::new(session.songs[target].clone());
    info!("Selected song '{}'", session.current_song().title);
}

fn start_new_game(session: &mut Session, now: Instant) {
    session.notes.clear();
    session.score = 0;
    session.misses = 0;
    session.total_notes = 0;
    session.hit_notes = 0;
    session.last_hit = None;
    session.last_miss = None;
    session.ended_at = None;
    session.input_queue.clear();
    session.log_timer = 0.0;
    session.state = SessionState::Playing;
    session.player.start(now);
    info!("Starting '{}'", session.current_song().title);
}

fn update_playing(session: &mut Session, dt: f32, now: Instant) {
    spawn_due_notes(session, now);

    for note in session.notes.iter_mut().filter(|n| n.is_active()) {
        note.advance(dt);
    }

    apply_passive_misses(session, now);
    if session.misses >= config::MISS_LIMIT {
        enter_game_over(session, now);
        return;
    }

    drain_gameplay_inputs(session, now);

    // Compact: anything judged or fallen out of the field is gone for good.
    let cull_y = session.settings.screen_height + config::CULL_MARGIN;
    session.notes.retain(|n| n.is_active() && n.y <= cull_y);

    if session.player.is_finished() && session.notes.is_empty() {
        enter_song_complete(session, now);
        return;
    }

    session.log_timer += dt;
    if session.log_timer >= 1.0 {
        info!(
            "Time left: {:.1}s, Score: {}, Misses: {}/{}, Active notes: {}",
            session.remaining_time(),
            session.score,
            session.misses,
            config::MISS_LIMIT,
            session.notes.len()
        );
        session.log_timer -= 1.0;
    }
}

fn spawn_due_notes(session: &mut Session, now: Instant) {
    let batch = session.player.update(now);
    if batch.is_empty() {
        return;
    }

    let bpm = session.player.song().bpm;
    for song_note in &batch {
        if let Some(note) = RuntimeNote::spawn(song_note, bpm, session.settings.screen_width) {
            session.notes.push(note);
            session.total_notes += 1;
        }
    }
}

fn apply_passive_misses(session: &mut Session, now: Instant) {
    let hit_line = session.settings.hit_line_y;
    for note in session.notes.iter_mut() {
        if note.is_active() && note.has_passed(hit_line) {
            note.miss();
            session.misses += 1;
            session.last_miss = Some(MissFlash { lane: note.lane, at: now });
        }
    }
}

fn drain_gameplay_inputs(session: &mut Session, now: Instant) {
    while let Some(event) = session.input_queue.pop_front() {
        let InputEvent::Note(key) = event else {
            // Start/Continue/selection have no meaning mid-song.
            continue;
        };
        judge_key_press(session, key, now);
    }
}

/// Credits the pressed key against the first active note of that key inside
/// the hit window. At most one note is credited per key event.
fn judge_key_press(session: &mut Session, key: NoteKey, now: Instant) {
    let hit_line = session.settings.hit_line_y;
    let Some(note) = session
        .notes
        .iter_mut()
        .find(|n| n.key == key && n.is_active() && n.is_hittable(hit_line))
    else {
        // Pressing into empty space is free: no score change, no sound.
        return;
    };

    let accuracy = note.hit_accuracy(hit_line);
    let awarded = note::score_for_accuracy(accuracy);
    let lane = note.lane;
    note.hit();

    session.score += awarded;
    session.hit_notes += 1;
    session.last_hit = Some(HitFlash { lane, awarded, at: now });
    session.audio.play_note(key);
}

fn enter_game_over(session: &mut Session, now: Instant) {
    session.state = SessionState::GameOver;
    session.player.stop();
    session.ended_at = Some(now);
    session.input_queue.clear();
    info!(
        "Game over on '{}' with {} misses; final accuracy {:.1}%",
        session.current_song().title,
        session.misses,
        session.accuracy()
    );
    record_result(session, false);
}

fn enter_song_complete(session: &mut Session, now: Instant) {
    session.state = SessionState::SongComplete;
    session.ended_at = Some(now);
    session.input_queue.clear();
    info!(
        "Completed '{}': score {}, accuracy {:.1}%",
        session.current_song().title,
        session.score,
        session.accuracy()
    );
    record_result(session, true);
}

fn record_result(session: &Session, cleared: bool) {
    let accuracy = session.accuracy();
    scores::record(PlayRecord {
        song_title: session.current_song().title.clone(),
        score: session.score,
        hit_notes: session.hit_notes,
        total_notes: session.total_notes,
        accuracy,
        rank: scores::rank_for_accuracy(accuracy),
        cleared,
        finished_at: chrono::Local::now(),
    });
}

fn update_results(session: &mut Session, now: Instant) {
    let timed_out = session
        .ended_at
        .is_some_and(|ended| now.saturating_duration_since(ended) >= config::RESULT_SCREEN_TIMEOUT);

    let mut continue_pressed = false;
    while let Some(event) = session.input_queue.pop_front() {
        if event == InputEvent::Continue {
            continue_pressed = true;
        }
    }

    if timed_out || continue_pressed {
        session.state = SessionState::Title;
        session.ended_at = None;
        info!("Returning to title screen.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::core::audio::AudioOutput;
    use crate::core::clock::ManualClock;
    use crate::game::song::{NoteKey, SongNote};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Audio collaborator that remembers what it was asked to play.
    struct RecordingAudio(Arc<Mutex<Vec<NoteKey>>>);

    impl AudioOutput for RecordingAudio {
        fn play_note(&mut self, key: NoteKey) {
            self.0.lock().unwrap().push(key);
        }
    }

    fn song_with(notes: Vec<SongNote>, bpm: u32, duration: f64) -> Arc<Song> {
        Arc::new(Song {
            title: "Session Test".to_string(),
            artist: "Test".to_string(),
            bpm,
            duration,
            notes,
        })
    }

    fn note_at(key: &str, lane: i32, time: f64) -> SongNote {
        SongNote { key: key.to_string(), lane, time, hold: 0.0 }
    }

    struct Harness {
        session: Session,
        clock: Arc<ManualClock>,
        played: Arc<Mutex<Vec<NoteKey>>>,
    }

    fn harness(songs: Vec<Arc<Song>>) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let played = Arc::new(Mutex::new(Vec::new()));
        let session = init(songs, clock.clone(), Box::new(RecordingAudio(played.clone())));
        Harness { session, clock, played }
    }

    impl Harness {
        /// Advances the clock and runs one tick with a matching dt.
        fn tick(&mut self, secs: f64) {
            self.clock.advance(Duration::from_secs_f64(secs));
            update(&mut self.session, secs as f32);
        }

        /// Starts gameplay and burns through the countdown so the first
        /// playing tick has happened. The countdown is crossed with a
        /// zero-length tick so freshly spawned notes haven't moved yet.
        fn start_playing(&mut self) {
            queue_input(&mut self.session, InputEvent::Start);
            update(&mut self.session, 0.0);
            assert_eq!(self.session.state, SessionState::Playing);
            self.clock.advance(Duration::from_secs_f64(config::COUNTDOWN_SECONDS));
            update(&mut self.session, 0.0);
        }
    }

    // With BPM 200 the scroll speed clamps to 240 px/s, so a note spawned
    // at y = -20 sits exactly on the hit line (y = 400) 1.75 s later.
    const FAST_BPM: u32 = 200;
    const TRAVEL_TO_LINE_SECS: f64 = 1.75;

    #[test]
    fn empty_song_list_falls_back_to_the_builtin_song() {
        let h = harness(Vec::new());
        assert_eq!(h.session.songs.len(), 1);
        assert_eq!(h.session.current_song().title, "Default Song");
        assert_eq!(h.session.state, SessionState::Title);
    }

    #[test]
    fn start_resets_counters_and_begins_countdown() {
        let mut h = harness(vec![song_with(vec![note_at("C", 0, 1.0)], 120, 5.0)]);
        queue_input(&mut h.session, InputEvent::Start);
        update(&mut h.session, 0.0);

        assert_eq!(h.session.state, SessionState::Playing);
        assert_eq!(h.session.score, 0);
        assert_eq!(h.session.misses, 0);
        assert_eq!(h.session.countdown(), Some(3));
        assert!(h.session.notes.is_empty());
    }

    #[test]
    fn selection_moves_and_clamps_at_the_ends() {
        let songs = vec![
            song_with(vec![], 100, 5.0),
            song_with(vec![], 110, 5.0),
        ];
        let mut h = harness(songs);

        queue_input(&mut h.session, InputEvent::SelectPrev);
        update(&mut h.session, 0.0);
        assert_eq!(h.session.selected_song, 0);

        queue_input(&mut h.session, InputEvent::SelectNext);
        update(&mut h.session, 0.0);
        assert_eq!(h.session.selected_song, 1);
        assert_eq!(h.session.player.song().bpm, 110);

        queue_input(&mut h.session, InputEvent::SelectNext);
        update(&mut h.session, 0.0);
        assert_eq!(h.session.selected_song, 1);
        assert_eq!(h.session.state, SessionState::Title);
    }

    #[test]
    fn perfect_press_scores_base_plus_full_bonus() {
        let mut h = harness(vec![song_with(vec![note_at("C", 0, 1.0)], FAST_BPM, 10.0)]);
        h.start_playing();
        assert_eq!(h.session.notes.len(), 1);
        assert_eq!(h.session.total_notes, 1);

        h.tick(TRAVEL_TO_LINE_SECS);
        queue_input(&mut h.session, InputEvent::Note(NoteKey::C));
        h.tick(0.0);

        assert_eq!(h.session.score, 200);
        assert_eq!(h.session.hit_notes, 1);
        assert_eq!(h.session.misses, 0);
        assert_eq!(h.played.lock().unwrap().clone(), vec![NoteKey::C]);
        // The judged note is compacted away the same tick.
        assert!(h.session.notes.is_empty());
    }

    #[test]
    fn press_at_the_window_edge_earns_almost_no_bonus() {
        let mut h = harness(vec![song_with(vec![note_at("C", 0, 1.0)], FAST_BPM, 10.0)]);
        h.start_playing();

        // 30 px past the line: distance == window.
        h.tick(TRAVEL_TO_LINE_SECS + config::HIT_WINDOW as f64 / 240.0);
        queue_input(&mut h.session, InputEvent::Note(NoteKey::C));
        h.tick(0.0);

        assert_eq!(h.session.score, config::BASE_NOTE_SCORE);
        assert_eq!(h.session.hit_notes, 1);
    }

    #[test]
    fn press_outside_the_window_neither_hits_nor_scores() {
        let mut h = harness(vec![song_with(vec![note_at("C", 0, 1.0)], FAST_BPM, 10.0)]);
        h.start_playing();

        // Note is still high above the hit line.
        h.tick(0.5);
        queue_input(&mut h.session, InputEvent::Note(NoteKey::C));
        h.tick(0.0);

        assert_eq!(h.session.score, 0);
        assert_eq!(h.session.hit_notes, 0);
        assert!(h.played.lock().unwrap().is_empty());
        assert_eq!(h.session.notes.len(), 1);
    }

    #[test]
    fn one_key_event_credits_at_most_one_note() {
        // Two overlapping notes for the same key.
        let notes = vec![note_at("C", 0, 1.0), note_at("C", 0, 1.05)];
        let mut h = harness(vec![song_with(notes, FAST_BPM, 10.0)]);
        h.start_playing();
        assert_eq!(h.session.notes.len(), 2);

        h.tick(TRAVEL_TO_LINE_SECS);
        queue_input(&mut h.session, InputEvent::Note(NoteKey::C));
        h.tick(0.0);

        assert_eq!(h.session.hit_notes, 1);
        assert_eq!(h.session.notes.len(), 1);
    }

    #[test]
    fn wrong_key_does_not_hit_a_note_in_another_lane() {
        let mut h = harness(vec![song_with(vec![note_at("C", 0, 1.0)], FAST_BPM, 10.0)]);
        h.start_playing();

        h.tick(TRAVEL_TO_LINE_SECS);
        queue_input(&mut h.session, InputEvent::Note(NoteKey::D));
        h.tick(0.0);

        assert_eq!(h.session.hit_notes, 0);
        assert_eq!(h.session.score, 0);
    }

    #[test]
    fn passed_notes_are_missed_and_flash_their_lane() {
        let mut h = harness(vec![song_with(vec![note_at("E", 2, 1.0)], FAST_BPM, 10.0)]);
        h.start_playing();

        // Carry the note well past the hit window.
        h.tick(TRAVEL_TO_LINE_SECS + 0.2);

        assert_eq!(h.session.misses, 1);
        assert_eq!(h.session.hit_notes, 0);
        let flash = h.session.miss_flash().expect("miss flash should be fresh");
        assert_eq!(flash.lane, 2);
        // The missed note is compacted away.
        assert!(h.session.notes.is_empty());
    }

    #[test]
    fn twenty_straight_misses_end_the_game_with_zero_accuracy() {
        let notes: Vec<SongNote> = (0..config::MISS_LIMIT)
            .map(|i| note_at("C", 0, 0.1 * f64::from(i)))
            .collect();
        let mut h = harness(vec![song_with(notes, FAST_BPM, 30.0)]);
        h.start_playing();
        assert_eq!(h.session.total_notes, config::MISS_LIMIT);

        // Let every note fall past the window.
        h.tick(TRAVEL_TO_LINE_SECS + 3.0);

        assert_eq!(h.session.state, SessionState::GameOver);
        assert!(h.session.misses >= config::MISS_LIMIT);
        assert_eq!(h.session.accuracy(), 0.0);
        assert!(h.session.player.is_finished());
    }

    #[test]
    fn nineteen_misses_keep_the_game_alive() {
        let notes: Vec<SongNote> = (0..config::MISS_LIMIT - 1)
            .map(|i| note_at("C", 0, 0.1 * f64::from(i)))
            .collect();
        let mut h = harness(vec![song_with(notes, FAST_BPM, 30.0)]);
        h.start_playing();

        h.tick(TRAVEL_TO_LINE_SECS + 3.0);

        assert_eq!(h.session.misses, config::MISS_LIMIT - 1);
        assert_eq!(h.session.state, SessionState::Playing);
    }

    #[test]
    fn completion_requires_finished_player_and_no_notes_in_flight() {
        // Short song whose only note is still falling when playback ends.
        let mut h = harness(vec![song_with(vec![note_at("C", 0, 2.5)], 100, 3.0)]);
        h.start_playing();

        // Run past the song duration: the player finishes but the note is
        // still on its way down.
        h.tick(3.1);
        assert!(h.session.player.is_finished());
        assert_eq!(h.session.notes.len(), 1);
        assert_eq!(h.session.state, SessionState::Playing);

        // Once the straggler falls past the window it is missed, compacted,
        // and only then does the session complete.
        h.tick(4.0);
        assert_eq!(h.session.state, SessionState::SongComplete);
        assert_eq!(h.session.misses, 1);
    }

    #[test]
    fn results_screen_returns_to_title_on_continue() {
        let mut h = harness(vec![song_with(vec![note_at("C", 0, 2.5)], 100, 3.0)]);
        h.start_playing();
        h.tick(8.0);
        assert_eq!(h.session.state, SessionState::SongComplete);

        queue_input(&mut h.session, InputEvent::Continue);
        h.tick(0.1);
        assert_eq!(h.session.state, SessionState::Title);
    }

    #[test]
    fn results_screen_times_out_back_to_title() {
        let mut h = harness(vec![song_with(vec![note_at("C", 0, 2.5)], 100, 3.0)]);
        h.start_playing();
        h.tick(8.0);
        assert_eq!(h.session.state, SessionState::SongComplete);

        h.tick(4.9);
        assert_eq!(h.session.state, SessionState::SongComplete);
        h.tick(0.2);
        assert_eq!(h.session.state, SessionState::Title);
    }

    #[test]
    fn accuracy_tracks_hits_over_spawned_notes() {
        let notes = vec![note_at("C", 0, 1.0), note_at("D", 1, 1.0)];
        let mut h = harness(vec![song_with(notes, FAST_BPM, 10.0)]);
        h.start_playing();

        h.tick(TRAVEL_TO_LINE_SECS);
        queue_input(&mut h.session, InputEvent::Note(NoteKey::C));
        h.tick(0.0);

        assert_eq!(h.session.hit_notes, 1);
        assert_eq!(h.session.total_notes, 2);
        assert!((h.session.accuracy() - 50.0).abs() < 1e-9);
        assert!(h.session.hit_notes <= h.session.total_notes);
    }

    #[test]
    fn hit_flash_expires_after_its_window() {
        let mut h = harness(vec![song_with(vec![note_at("C", 0, 1.0)], FAST_BPM, 10.0)]);
        h.start_playing();
        h.tick(TRAVEL_TO_LINE_SECS);
        queue_input(&mut h.session, InputEvent::Note(NoteKey::C));
        h.tick(0.0);

        let flash = h.session.hit_flash().expect("flash should be fresh");
        assert_eq!(flash.lane, 0);
        assert_eq!(flash.awarded, 200);

        h.clock.advance(config::FEEDBACK_FLASH_DURATION);
        assert!(h.session.hit_flash().is_none());
    }

    #[test]
    fn unknown_keys_in_the_schedule_are_dropped_not_counted() {
        let notes = vec![
            note_at("C", 0, 1.0),
            note_at("Q", 3, 1.0), // no such key; lane alone is not enough
        ];
        let mut h = harness(vec![song_with(notes, FAST_BPM, 10.0)]);
        h.start_playing();

        assert_eq!(h.session.notes.len(), 1);
        assert_eq!(h.session.total_notes, 1);
    }

    #[test]
    fn game_over_stops_spawning_immediately() {
        let mut notes: Vec<SongNote> = (0..config::MISS_LIMIT)
            .map(|i| note_at("C", 0, 0.1 * f64::from(i)))
            .collect();
        notes.push(note_at("D", 1, 20.0)); // far in the future
        let mut h = harness(vec![song_with(notes, FAST_BPM, 30.0)]);
        h.start_playing();

        h.tick(TRAVEL_TO_LINE_SECS + 3.0);
        assert_eq!(h.session.state, SessionState::GameOver);
        let spawned = h.session.total_notes;

        // Ticks on the results screen spawn nothing new.
        h.tick(30.0);
        assert_eq!(h.session.total_notes, spawned);
    }
}
