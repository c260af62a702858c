//! Frame layout for the 2.7" e-Paper panel (264x176, landscape)

use crate::refresh::StatusReport;

pub const WIDTH: u32 = 264;
pub const HEIGHT: u32 = 176;

/// Panel fill colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    Black,
    #[default]
    White,
}

impl Color {
    pub fn byte(self) -> u8 {
        match self {
            Color::Black => 0x00,
            Color::White => 0xFF,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04X}", self.byte())
    }
}

/// Font sizes in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSize {
    Heading = 11,
    Body = 12,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Line { from: (u32, u32), to: (u32, u32) },
    Text { at: (u32, u32), text: String, font: FontSize },
}

/// A monochrome canvas described as draw commands
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn line(&mut self, from: (u32, u32), to: (u32, u32)) {
        self.commands.push(DrawCommand::Line { from, to });
    }

    pub fn text(&mut self, at: (u32, u32), text: impl Into<String>, font: FontSize) {
        self.commands.push(DrawCommand::Text {
            at,
            text: text.into(),
            font,
        });
    }

    /// Text commands in reading order (top to bottom, left to right)
    pub fn text_lines(&self) -> Vec<&str> {
        let mut texts: Vec<(&(u32, u32), &str)> = self
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { at, text, .. } => Some((at, text.as_str())),
                DrawCommand::Line { .. } => None,
            })
            .collect();
        texts.sort_by_key(|(at, _)| (at.0 >= WIDTH / 2, at.1, at.0));
        texts.into_iter().map(|(_, text)| text).collect()
    }

    /// Lay out a status report
    ///
    /// Top half: receiver status. Bottom left: aircraft counters and range.
    /// Bottom right: receiver OS, cycle number and display address.
    pub fn layout(report: &StatusReport, width: u32, height: u32) -> Self {
        let mut frame = Frame::new(width, height);

        frame.line((0, 88), (264, 88));
        frame.line((132, 88), (132, 176));

        frame.text((4, 4), format!("Status ({})", report.status_slug), FontSize::Heading);
        frame.text((8, 20), &report.time, FontSize::Body);
        frame.text((8, 35), &report.piaware, FontSize::Body);
        frame.text((8, 50), &report.gps, FontSize::Body);
        frame.text((8, 65), &report.radio, FontSize::Body);

        frame.text((4, 90), "Aircrafts", FontSize::Heading);
        frame.text((8, 103), format!("Count (all): {}", report.counts.all), FontSize::Body);
        frame.text(
            (8, 116),
            format!("Count (w/ pos): {}", report.counts.with_position),
            FontSize::Body,
        );
        frame.text((8, 129), format!("Count (MLAT): {}", report.counts.mlat), FontSize::Body);
        frame.text(
            (8, 142),
            format!("Min Range: {}", range_label(report.min_range_km)),
            FontSize::Body,
        );
        frame.text(
            (8, 155),
            format!("Max Range: {}", range_label(report.max_range_km)),
            FontSize::Body,
        );

        frame.text((136, 90), "Receiver OS", FontSize::Heading);
        frame.text((140, 103), format!("Up: {}", report.uptime), FontSize::Body);
        frame.text((140, 116), format!("CPU Load: {}%", report.cpu_load), FontSize::Body);
        frame.text((140, 129), format!("CPU Temp: {}°C", report.cpu_temp), FontSize::Body);

        frame.text((136, 147), format!("Cycle: {}", thousands(report.cycle)), FontSize::Heading);
        frame.text((136, 160), format!("Display IP: {}", report.local_ip), FontSize::Heading);

        frame
    }
}

fn range_label(km: Option<f64>) -> String {
    match km {
        Some(km) => format!("{:.1} km", km),
        None => "n/a".to_string(),
    }
}

/// Format with `,` as thousands separator
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
