use crate::keys::signal_for_key;
use crate::report::print_summary;
use anyhow::{Context, Result, anyhow};
use constim_core::{SessionPhase, Signal, TrialStage};
use constim_experiment::config::DisplayConfig;
use constim_experiment::{JsonFileStore, Pacing, Session};
use constim_render::{Monitor, Screen, SkiaRenderer, load_font};
use constim_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use std::sync::Arc;
use tracing::{debug, error, info};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

/// Which trial stage is on screen and since when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageClock {
    pub stage: TrialStage,
    pub since_ns: u64,
}

impl StageClock {
    pub fn restart(&mut self, now_ns: u64) {
        self.stage = TrialStage::Announce;
        self.since_ns = now_ns;
    }

    /// Moves past timed stages whose duration has run out. Returns true if the stage changed.
    pub fn tick(&mut self, now_ns: u64, pacing: Pacing) -> bool {
        let limit = match self.stage {
            TrialStage::Announce => pacing.announce,
            TrialStage::Stimulus => pacing.stimulus,
            TrialStage::Question => return false,
        };
        let elapsed = now_ns.saturating_sub(self.since_ns);
        if (elapsed as u128) < limit.as_nanos() {
            return false;
        }
        if let Some(next) = self.stage.next() {
            self.stage = next;
            self.since_ns = now_ns;
        }
        true
    }
}

pub struct App<T: Timer = HighPrecisionTimer> {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    session: Session<T>,
    clock: StageClock,
    pacing: Pacing,
    store: JsonFileStore,
    display: DisplayConfig,
    windowed_size: PhysicalSize<u32>,
    monitor: Monitor,
    background: f64,
    refresh_rate: Option<f64>,

    /// First unrecoverable error; returned from `run` once the loop exits.
    fatal: Option<anyhow::Error>,
    should_exit: bool,
}

impl<T: Timer> App<T> {
    pub fn new(
        session: Session<T>,
        pacing: Pacing,
        store: JsonFileStore,
        display: DisplayConfig,
        monitor: Monitor,
        background: f64,
        size_pix: [u32; 2],
    ) -> Self {
        Self {
            window: None,
            pixels: None,
            renderer: None,
            session,
            clock: StageClock::default(),
            pacing,
            store,
            display,
            windowed_size: PhysicalSize::new(size_pix[0], size_pix[1]),
            monitor,
            background,
            refresh_rate: None,
            fatal: None,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        println!("Press any key to leave the instructions, Y/N to answer, Q or ESC to quit.\n");

        event_loop.run_app(&mut self)?;
        self.outcome()
    }

    fn outcome(&mut self) -> Result<()> {
        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: anyhow::Error) {
        error!("{err:#}");
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let mut window_attributes = Window::default_attributes()
            .with_title("Contrast detection")
            .with_resizable(false);
        window_attributes = if self.display.fullscreen {
            window_attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
        } else {
            window_attributes.with_inner_size(self.windowed_size)
        };

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();

        println!("Display Configuration:");
        println!(
            "  Physical size: {}×{}",
            physical_size.width, physical_size.height
        );
        println!("  Scale factor: {:.2}", window.scale_factor());
        if let Some(refresh_rate) = self.refresh_rate {
            println!("  Refresh rate: {:.1} Hz", refresh_rate);
        }
        println!(
            "  Stimulus geometry: {:.2} px/deg",
            self.monitor.pixels_per_degree()
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(
            Pixels::new(physical_size.width, physical_size.height, surface_texture)
                .context("creating pixel surface")?,
        );

        let font = load_font(&self.display.font_paths);
        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            self.monitor,
            self.background,
            font,
        )?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn screen(&self) -> Screen {
        match self.session.phase() {
            SessionPhase::AwaitingConfig => Screen::Blank,
            SessionPhase::AwaitingStart => Screen::Instructions,
            SessionPhase::Running(position) => match self.clock.stage {
                TrialStage::Announce => Screen::Announce {
                    position,
                    total: self.session.schedule().total(),
                },
                TrialStage::Stimulus => self
                    .session
                    .draw_request()
                    .map(Screen::Stimulus)
                    .unwrap_or(Screen::Blank),
                TrialStage::Question => Screen::Question,
            },
            SessionPhase::Aborted | SessionPhase::Completed | SessionPhase::Persisted => {
                Screen::Message("Thank you!".to_string())
            }
        }
    }

    fn render(&mut self) -> Result<()> {
        let screen = self.screen();
        let (Some(pix), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let timer = self.session.timer();

        let stats = renderer.render_frame(&screen, pix.frame_mut(), timer)?;
        let now = timer.now();
        pix.render()?;
        let present = timer.elapsed(now);

        if stats.redrawn {
            debug!(
                draw_ms = stats.draw.as_secs_f64() * 1e3,
                copy_ms = stats.copy.as_secs_f64() * 1e3,
                present_ms = present.as_secs_f64() * 1e3,
                "frame"
            );
        }
        Ok(())
    }

    fn update(&mut self) {
        if self.session.phase().is_running() {
            let now = self.session.timer().now();
            if self.clock.tick(now, self.pacing) {
                debug!(stage = ?self.clock.stage, "trial stage");
            }
        }
    }

    /// Applies one key press. Returns true once the session has finished and
    /// its results are due to be saved.
    fn on_key(&mut self, code: KeyCode) -> bool {
        let phase = self.session.phase();
        if !phase.allows_input() {
            return false;
        }
        if phase == SessionPhase::AwaitingStart {
            self.session.start();
            self.clock.restart(self.session.timer().now());
        } else {
            match signal_for_key(code) {
                Some(Signal::Abort) => self.submit(Signal::Abort),
                Some(answer) if self.clock.stage.awaits_signal() => self.submit(answer),
                _ => {}
            }
        }
        self.session.phase().is_finished()
    }

    /// Closing the window counts as an abort. A session that never started is
    /// started first so the empty run is still saved. Returns true when there
    /// are results to save.
    fn on_close(&mut self) -> bool {
        if self.session.phase() == SessionPhase::AwaitingStart {
            self.session.start();
        }
        if self.session.phase().is_running() {
            self.submit(Signal::Abort);
        }
        self.session.phase().is_finished()
    }

    fn submit(&mut self, signal: Signal) {
        if self.session.submit(signal) && self.session.phase().is_running() {
            self.clock.restart(self.session.timer().now());
        }
    }

    /// Writes the results once; a failed write is kept as the exit error.
    fn save_results(&mut self) {
        match self.session.persist(&self.store) {
            Ok(path) => {
                info!(path = %path.display(), "results saved");
                if let Err(err) = print_summary(&path) {
                    error!("cannot summarize {}: {err:#}", path.display());
                }
            }
            Err(err) => self.fail(err.context("failed to save results")),
        }
    }

    fn finish(&mut self, event_loop: &ActiveEventLoop) {
        self.save_results();
        self.cleanup_and_exit(event_loop);
    }

    fn close(&mut self, event_loop: &ActiveEventLoop) {
        if self.on_close() {
            self.save_results();
        }
        self.cleanup_and_exit(event_loop);
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!("Failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!("Failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                error!("Failed to resize canvas: {e:#}");
            }
        }
        info!(
            width = new_size.width,
            height = new_size.height,
            "display resized"
        );
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }
}

impl<T: Timer> ApplicationHandler for App<T> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.fail(e.context("failed to create window and surface"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close(event_loop),
            WindowEvent::RedrawRequested => {
                self.update();
                if let Err(e) = self.render() {
                    self.fail(e.context("render failed"));
                    self.close(event_loop);
                    return;
                }
                if let Some(win) = &self.window {
                    win.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    if self.on_key(code) {
                        self.finish(event_loop);
                    }
                }
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
