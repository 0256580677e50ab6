use std::{
    fmt::Write as _,
    io::{self, Write},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use matrix_code_rendering::{Color, Presentation, RenderingBackend, Scene, SceneCell};

const CLEAR_SCREEN: &str = "\x1b[2J";
const CURSOR_HOME: &str = "\x1b[H";
const RESET: &str = "\x1b[0m";
/// Share of a solid cell's colour bled into its background.
const SOLID_BACKGROUND: f32 = 0.35;

/// Rendering backend that prints each frame as 24-bit ANSI text on stdout.
#[derive(Debug)]
pub(crate) struct TextBackend {
    frames: u64,
    frame_interval: Duration,
    realtime: bool,
}

impl TextBackend {
    /// Creates a backend that presents `frames` frames at `fps` frames per second.
    pub(crate) fn new(frames: u64, fps: u32) -> Self {
        Self {
            frames,
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            realtime: false,
        }
    }

    /// Sleeps between frames instead of printing them back to back.
    pub(crate) const fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

impl RenderingBackend for TextBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(Duration, &mut Scene) + 'static,
    {
        let Presentation {
            window_title,
            clear_color,
            mut scene,
        } = presentation;

        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{CLEAR_SCREEN}{CURSOR_HOME}{window_title}")
            .context("could not write banner")?;

        for _ in 0..self.frames {
            update_scene(self.frame_interval, &mut scene);
            out.write_all(render_frame(&scene, clear_color).as_bytes())
                .context("could not write frame")?;
            out.flush().context("could not flush frame")?;
            if self.realtime {
                thread::sleep(self.frame_interval);
            }
        }

        tracing::info!(frames = self.frames, "text backend finished");
        Ok(())
    }
}

/// Renders a scene as ANSI text, homing the cursor first.
///
/// Style sequences are only emitted when they change between neighbouring cells.
pub(crate) fn render_frame(scene: &Scene, clear: Color) -> String {
    let mut out = String::with_capacity(scene.cells.len() * 2 + scene.rows * 8);
    out.push_str(CURSOR_HOME);

    for row in 0..scene.rows {
        let Some(cells) = scene.row(row) else {
            break;
        };
        let mut active: Option<String> = None;
        for cell in cells {
            let params = cell_params(cell, clear);
            if params != active {
                if active.is_some() {
                    out.push_str(RESET);
                }
                if let Some(params) = &params {
                    let _ = write!(out, "\x1b[{params}m");
                }
                active = params;
            }
            out.push(if cell.is_invisible() { ' ' } else { cell.glyph });
        }
        if active.is_some() {
            out.push_str(RESET);
        }
        out.push('\n');
    }
    out
}

fn cell_params(cell: &SceneCell, clear: Color) -> Option<String> {
    if cell.is_invisible() {
        return None;
    }

    let mut params = Vec::with_capacity(3);
    if cell.size > 1.0 {
        params.push("1".to_owned());
    }

    let mut foreground = blend(clear, cell.color, cell.color.alpha);
    if cell.glow > 0.0 {
        foreground = foreground.lighten((cell.glow / 40.0).min(0.5));
    }
    let (red, green, blue) = foreground.to_rgb_u8();
    params.push(format!("38;2;{red};{green};{blue}"));

    if cell.solid {
        let background = blend(clear, cell.color, cell.color.alpha * SOLID_BACKGROUND);
        let (red, green, blue) = background.to_rgb_u8();
        params.push(format!("48;2;{red};{green};{blue}"));
    }
    Some(params.join(";"))
}

fn blend(base: Color, top: Color, amount: f32) -> Color {
    let amount = amount.clamp(0.0, 1.0);
    let mix = |from: f32, to: f32| from + (to - from) * amount;
    Color::new(
        mix(base.red, top.red),
        mix(base.green, top.green),
        mix(base.blue, top.blue),
        1.0,
    )
}
