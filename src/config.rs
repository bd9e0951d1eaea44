use configparser::ini::Ini;
use log::{info, warn};
use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

// Playing field (reference geometry; overridable via keyfall.ini)
pub const SCREEN_WIDTH: f32 = 640.0;
pub const SCREEN_HEIGHT: f32 = 480.0;
pub const HIT_LINE_Y: f32 = 400.0;
pub const LANE_COUNT: usize = 6;

// Note scheduling
pub const NOTE_APPROACH_TIME: f64 = 2.0; // Seconds between spawn and scheduled arrival at the hit line
pub const COUNTDOWN_SECONDS: f64 = 3.0;

// Note geometry
pub const NOTE_WIDTH: f32 = 40.0;
pub const NOTE_HEIGHT: f32 = 20.0;
pub const HOLD_PIXELS_PER_SECOND: f32 = 100.0;
pub const MAX_HOLD_HEIGHT: f32 = 400.0;
pub const CULL_MARGIN: f32 = 120.0; // How far below the field a note may drift before compaction

// Scroll speed, pixels per second
pub const BASE_SCROLL_SPEED: f32 = 120.0; // At REFERENCE_BPM
pub const REFERENCE_BPM: f32 = 100.0;
pub const MIN_SCROLL_SPEED: f32 = 60.0;
pub const MAX_SCROLL_SPEED: f32 = 240.0;

// Judgment
pub const HIT_WINDOW: f32 = 30.0; // Pixels either side of the hit line
pub const HOLD_PERFECT_TOLERANCE: f32 = 10.0;
pub const HOLD_BODY_ACCURACY: f32 = 0.8;
pub const HOLD_ACCURACY_FLOOR: f32 = 0.5;
pub const BASE_NOTE_SCORE: u32 = 100;

// Session
pub const MISS_LIMIT: u32 = 20;
pub const RESULT_SCREEN_TIMEOUT: Duration = Duration::from_secs(5);
pub const FEEDBACK_FLASH_DURATION: Duration = Duration::from_millis(200);

// --- Settings ---

const SAVE_DIR: &str = "save";
const SETTINGS_INI_PATH: &str = "save/keyfall.ini";

#[derive(Debug, Clone)]
pub struct Settings {
    pub screen_width: f32,
    pub screen_height: f32,
    pub hit_line_y: f32,
    pub songs_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            screen_width: SCREEN_WIDTH,
            screen_height: SCREEN_HEIGHT,
            hit_line_y: HIT_LINE_Y,
            songs_dir: "songs".to_string(),
        }
    }
}

static SETTINGS: Lazy<Mutex<Settings>> = Lazy::new(|| Mutex::new(Settings::default()));

/// Creates the default settings file if it doesn't exist.
fn create_default_file() -> Result<(), std::io::Error> {
    info!("Settings file not found, creating defaults in '{}'.", SAVE_DIR);
    fs::create_dir_all(SAVE_DIR)?;

    let defaults = Settings::default();
    let mut conf = Ini::new();
    conf.set("playfield", "Width", Some(format!("{}", defaults.screen_width)));
    conf.set("playfield", "Height", Some(format!("{}", defaults.screen_height)));
    conf.set("playfield", "HitLineY", Some(format!("{}", defaults.hit_line_y)));
    conf.set("songs", "Dir", Some(defaults.songs_dir));
    conf.write(SETTINGS_INI_PATH)?;
    Ok(())
}

pub fn load() {
    if !Path::new(SETTINGS_INI_PATH).exists() {
        if let Err(e) = create_default_file() {
            warn!("Failed to create default settings file: {}", e);
            // Proceed with default struct values.
            return;
        }
    }

    let mut settings = SETTINGS.lock().unwrap();
    let defaults = Settings::default();

    let mut conf = Ini::new();
    if conf.load(SETTINGS_INI_PATH).is_ok() {
        settings.screen_width = conf
            .get("playfield", "Width")
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|w| *w > 0.0)
            .unwrap_or(defaults.screen_width);
        settings.screen_height = conf
            .get("playfield", "Height")
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|h| *h > 0.0)
            .unwrap_or(defaults.screen_height);
        settings.hit_line_y = conf
            .get("playfield", "HitLineY")
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(defaults.hit_line_y);
        settings.songs_dir = conf.get("songs", "Dir").unwrap_or(defaults.songs_dir);
    } else {
        warn!("Failed to load '{}', using default settings.", SETTINGS_INI_PATH);
    }
}

/// Returns a copy of the currently loaded settings.
pub fn get() -> Settings {
    SETTINGS.lock().unwrap().clone()
}
