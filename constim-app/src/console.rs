use constim_core::DrawRequest;
use constim_experiment::Presenter;
use constim_render::render::{INSTRUCTIONS, QUESTION};
use std::io::{self, Write};
use tracing::info;

/// Text-only presenter for running without a display. Stimuli go to the log.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    presented: usize,
}

impl ConsolePresenter {
    pub fn presented(&self) -> usize {
        self.presented
    }
}

impl Presenter for ConsolePresenter {
    fn instructions(&mut self) {
        println!("\n{INSTRUCTIONS}");
        println!("(type a line and press Enter)");
    }

    fn announce(&mut self, position: usize, total: usize) {
        println!("\nTrial {position} / {total}");
    }

    fn present(&mut self, request: &DrawRequest) {
        self.presented += 1;
        info!(
            contrast = request.contrast,
            frequency = request.frequency,
            size_deg = request.size_deg,
            orientation_deg = request.orientation_deg,
            mask = ?request.mask,
            "stimulus"
        );
    }

    fn question(&mut self) {
        print!("{QUESTION} ");
        let _ = io::stdout().flush();
    }
}
