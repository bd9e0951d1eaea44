use crate::game::song::NoteKey;

/// Discrete events the host feeds into the session. However the host reads
/// its devices, events are queued and drained once per tick so each key
/// press is judged at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// A mapped note key went down this tick.
    Note(NoteKey),
    /// Start gameplay from the title screen.
    Start,
    /// Leave a results screen early.
    Continue,
    /// Move the song selection down the list (title screen only).
    SelectNext,
    /// Move the song selection up the list (title screen only).
    SelectPrev,
}
