pub mod monitor;
pub mod render;
pub mod stimulus;
pub mod text;

pub use monitor::Monitor;
pub use render::{FrameStats, Screen, SkiaRenderer};
pub use stimulus::{grating_value, render_stimulus};
pub use text::{TextCache, load_font, render_text_pixmap};
