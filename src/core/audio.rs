use crate::game::song::NoteKey;
use log::debug;

/// Playback collaborator. The engine only ever asks for the sound bound to a
/// note key, and only on confirmed hits; decoding and mixing live entirely
/// on the implementation's side.
pub trait AudioOutput: Send {
    /// Best-effort: implementations must swallow their own failures. A
    /// missing or unplayable sound means silence, never a blocked score.
    fn play_note(&mut self, key: NoteKey);
}

/// Output used when no audio backend is wired up.
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioOutput for NullAudio {
    fn play_note(&mut self, key: NoteKey) {
        debug!("No audio backend; dropping note sound '{}'", key.name());
    }
}
