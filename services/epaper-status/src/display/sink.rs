//! Rendering sinks

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use super::frame::{Color, DrawCommand, Frame, HEIGHT, WIDTH};

/// Display failure; the panel is assumed disconnected or broken
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Display I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A fixed-size monochrome output surface
pub trait DisplaySink: Send {
    /// Canvas size as (width, height)
    fn size(&self) -> (u32, u32);

    fn clear(&mut self, color: Color) -> Result<(), DisplayError>;

    fn display(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Put the panel into low-power mode
    fn sleep(&mut self) -> Result<(), DisplayError>;

    /// Release the panel before exit
    fn release(&mut self) -> Result<(), DisplayError>;
}

/// Sink rendering frames as text
///
/// Every frame is logged. With a snapshot path, the frame's text lines are
/// also written to that file, replacing the previous frame.
pub struct TextDisplay {
    snapshot: Option<PathBuf>,
    frames: u64,
}

impl TextDisplay {
    pub fn new(snapshot: Option<PathBuf>) -> Self {
        Self {
            snapshot,
            frames: 0,
        }
    }

    fn write_snapshot(&self, contents: &str) -> Result<(), DisplayError> {
        if let Some(path) = &self.snapshot {
            std::fs::write(path, contents)?;
            debug!("Wrote display snapshot to {}", path.display());
        }
        Ok(())
    }
}

impl DisplaySink for TextDisplay {
    fn size(&self) -> (u32, u32) {
        (WIDTH, HEIGHT)
    }

    fn clear(&mut self, color: Color) -> Result<(), DisplayError> {
        info!("Clearing display ({})", color);
        self.write_snapshot("")
    }

    fn display(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        self.frames += 1;
        for command in &frame.commands {
            match command {
                DrawCommand::Text { at, text, font } => {
                    debug!("| {:>3},{:>3} {:>2}px {}", at.0, at.1, *font as u8, text)
                }
                DrawCommand::Line { from, to } => {
                    debug!("| {:>3},{:>3} line to {},{}", from.0, from.1, to.0, to.1)
                }
            }
        }
        let lines = frame.text_lines();
        info!(
            frames = self.frames,
            "Rendered {}x{} frame with {} draw commands",
            frame.width,
            frame.height,
            frame.commands.len()
        );

        let mut contents = lines.join("\n");
        contents.push('\n');
        self.write_snapshot(&contents)
    }

    fn sleep(&mut self) -> Result<(), DisplayError> {
        debug!("Display sleeping");
        Ok(())
    }

    fn release(&mut self) -> Result<(), DisplayError> {
        debug!("Display released after {} frames", self.frames);
        Ok(())
    }
}
