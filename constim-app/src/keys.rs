use constim_core::Signal;
use winit::keyboard::KeyCode;

/// Observer signal for a key press; `None` for keys with no meaning.
pub fn signal_for_key(key: KeyCode) -> Option<Signal> {
    match key {
        KeyCode::KeyY => Some(Signal::Positive),
        KeyCode::KeyN => Some(Signal::Negative),
        KeyCode::KeyQ | KeyCode::Escape => Some(Signal::Abort),
        _ => None,
    }
}
