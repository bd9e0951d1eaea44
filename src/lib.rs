pub mod config;
pub mod core;
pub mod game;

pub use crate::core::audio::{AudioOutput, NullAudio};
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::game::input::InputEvent;
pub use crate::game::note::{NoteKind, NoteStatus, RuntimeNote};
pub use crate::game::player::{PlaybackPhase, SongPlayer};
pub use crate::game::session::{Session, SessionState};
pub use crate::game::song::{NoteKey, Song, SongNote};
