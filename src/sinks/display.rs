//! ==============================================================================
//! display.rs - local e-paper display sink
//! ==============================================================================
//!
//! purpose:
//!     turns a payload tree into the fixed set of lines shown on the station's
//!     portrait display, and renders the boot screen.
//!
//!     report screen (y grows downward, "+" marks an extra half line):
//!
//!         CastleWeather
//!         2026-10-17
//!         14:03:10
//!       + temp 64.2 °F
//!         hum. 58.0 %
//!         bp 29.92 inhg
//!       + wind WSW
//!          6/9g mph
//!         rain 0.22 in
//!         ...
//!         192.168.0.42            <- pinned to the bottom
//!
//!     a field that cannot be projected shows as "--"; the rest of the screen
//!     still renders.
//!
//! relationships:
//!     - implements: sinks::Sink
//!     - uses: projector.rs, DisplaySurface (the panel driver)
//!
//! ==============================================================================

use super::{Sink, SinkKind};
use crate::conversion::ConversionSpec;
use crate::error::{ExtractionFailure, SinkError};
use crate::payload::PayloadTree;
use crate::projector::{Projected, Projector};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::sync::Arc;

/// one line of text at a pixel position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub x: u32,
    pub y: u32,
    pub text: String,
}

/// the panel driver
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    /// draw `lines` on a fresh canvas and refresh the panel
    async fn render(&self, lines: Vec<TextLine>) -> Result<(), SinkError>;
}

/// logs every render instead of drawing (no panel attached)
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

#[async_trait]
impl DisplaySurface for ConsoleDisplay {
    async fn render(&self, lines: Vec<TextLine>) -> Result<(), SinkError> {
        for line in &lines {
            tracing::info!(target: "display", "[{:>3}] {}", line.y, line.text);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayLayout {
    pub line_spacing: u32,
    /// canvas height in portrait orientation
    pub height: u32,
}

impl Default for DisplayLayout {
    fn default() -> Self {
        Self { line_spacing: 26, height: 296 }
    }
}

/// cursor that hands out y positions top to bottom
struct Cursor {
    y: u32,
    spacing: u32,
    lines: Vec<TextLine>,
}

impl Cursor {
    fn new(spacing: u32) -> Self {
        Self { y: 0, spacing, lines: Vec::new() }
    }

    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(TextLine { x: 0, y: self.y, text: text.into() });
        self.y = self.y.saturating_add(self.spacing);
    }

    fn half_gap(&mut self) {
        self.y = self.y.saturating_add(self.spacing / 2);
    }
}

fn fixed(value: &Projected, decimals: usize) -> String {
    match value.as_f64() {
        Some(v) => format!("{:.*}", decimals, v),
        None => "--".to_string(),
    }
}

pub struct DisplaySink {
    surface: Arc<dyn DisplaySurface>,
    station_name: String,
    host: String,
    layout: DisplayLayout,
}

impl DisplaySink {
    pub fn new(
        surface: Arc<dyn DisplaySurface>,
        station_name: impl Into<String>,
        host: impl Into<String>,
        layout: DisplayLayout,
    ) -> Self {
        Self { surface, station_name: station_name.into(), host: host.into(), layout }
    }

    /// the report screen for `tree`, plus the fields that had to be blanked
    pub fn report_lines(
        &self,
        tree: &PayloadTree,
        now: DateTime<Local>,
    ) -> (Vec<TextLine>, Vec<ExtractionFailure>) {
        let mut p = Projector::new(tree, SinkKind::Display.name());
        let temp = p.project_number("temperature/measurement", ConversionSpec::Temperature);
        let hum = p.project_number("humidity/measurement", ConversionSpec::Identity);
        let bp = p.project_number("pressure/measurement", ConversionSpec::Pressure);
        let direction = p.project("wind/direction", ConversionSpec::Identity);
        let speed = p.project_number("wind/average", ConversionSpec::Speed);
        let gust = p.project_number("wind/gust", ConversionSpec::Speed);
        let rain = p.project_number("rain_day/measurement", ConversionSpec::Identity);

        let mut c = self.header(now);
        c.half_gap();
        c.line(format!("temp {} °F", fixed(&temp, 1)));
        c.line(format!("hum. {} %", fixed(&hum, 1)));
        c.line(format!("bp {} inhg", fixed(&bp, 2)));
        c.half_gap();
        c.line(format!("wind {}", direction));
        c.line(format!(" {}/{}g mph", fixed(&speed, 0), fixed(&gust, 0)));
        c.line(format!("rain {} in", fixed(&rain, 2)));

        (self.footer(c), p.into_failures())
    }

    /// station name, `message`, date, time, host
    pub fn boot_lines(&self, message: &str, now: DateTime<Local>) -> Vec<TextLine> {
        let mut c = Cursor::new(self.layout.line_spacing);
        c.line(self.station_name.as_str());
        c.line(message);
        c.line(now.format("%Y-%m-%d").to_string());
        c.line(now.format("%H:%M:%S").to_string());
        self.footer(c)
    }

    /// render the boot screen with `message`
    pub async fn announce(&self, message: &str) -> Result<(), SinkError> {
        self.surface.render(self.boot_lines(message, Local::now())).await
    }

    fn header(&self, now: DateTime<Local>) -> Cursor {
        let mut c = Cursor::new(self.layout.line_spacing);
        c.line(self.station_name.as_str());
        c.line(now.format("%Y-%m-%d").to_string());
        c.line(now.format("%H:%M:%S").to_string());
        c
    }

    fn footer(&self, c: Cursor) -> Vec<TextLine> {
        let mut lines = c.lines;
        lines.push(TextLine {
            x: 0,
            y: self.layout.height.saturating_sub(self.layout.line_spacing),
            text: self.host.clone(),
        });
        lines
    }
}

#[async_trait]
impl Sink for DisplaySink {
    fn kind(&self) -> SinkKind {
        SinkKind::Display
    }

    async fn publish(&self, tree: &PayloadTree) -> Result<(), SinkError> {
        let (lines, failures) = self.report_lines(tree, Local::now());
        if !failures.is_empty() {
            let paths: Vec<&str> = failures.iter().map(|f| f.path.as_str()).collect();
            tracing::warn!(sink = "display", "blanked {} field(s): {}", paths.len(), paths.join(", "));
        }
        self.surface.render(lines).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSurface {
        frames: Mutex<Vec<Vec<TextLine>>>,
    }

    #[async_trait]
    impl DisplaySurface for RecordingSurface {
        async fn render(&self, lines: Vec<TextLine>) -> Result<(), SinkError> {
            self.frames.lock().unwrap().push(lines);
            Ok(())
        }
    }

    fn sink(surface: Arc<RecordingSurface>) -> DisplaySink {
        DisplaySink::new(surface, "CastleWeather", "10.0.0.7", DisplayLayout::default())
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn full_tree() -> PayloadTree {
        PayloadTree::new()
            .with("temperature", PayloadTree::measurement(20.0, "C"))
            .with("humidity", PayloadTree::measurement(55.4, "%"))
            .with("pressure", PayloadTree::measurement(1013.25, "hPa"))
            .with(
                "wind",
                PayloadTree::new()
                    .with("direction", "WSW")
                    .with("average", 10.0)
                    .with("gust", 16.0)
                    .with("units", "km/h"),
            )
            .with("rain_hr", PayloadTree::measurement(0.0, "in"))
            .with("rain_day", PayloadTree::measurement(0.231, "in"))
    }

    fn texts(lines: &[TextLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn report_screen_converts_and_formats() {
        let (lines, failures) = sink(Arc::default()).report_lines(&full_tree(), now());

        assert!(failures.is_empty());
        assert_eq!(
            texts(&lines),
            [
                "CastleWeather",
                "2026-03-14",
                "09:26:53",
                "temp 68.0 °F",
                "hum. 55.4 %",
                "bp 29.92 inhg",
                "wind WSW",
                " 6/10g mph",
                "rain 0.23 in",
                "10.0.0.7",
            ]
        );
    }

    #[test]
    fn layout_adds_half_gaps_and_pins_host_to_bottom() {
        let (lines, _) = sink(Arc::default()).report_lines(&full_tree(), now());
        let ys: Vec<u32> = lines.iter().map(|l| l.y).collect();
        assert_eq!(ys, [0, 26, 52, 91, 117, 143, 182, 208, 234, 270]);
    }

    #[test]
    fn missing_sensor_blanks_only_its_lines() {
        let mut tree = PayloadTree::new();
        for key in ["humidity", "pressure", "wind", "rain_hr", "rain_day"] {
            if let Some(v) = full_tree().get(key) {
                tree.insert(key, v.clone());
            }
        }

        let (lines, failures) = sink(Arc::default()).report_lines(&tree, now());
        assert_eq!(lines[3].text, "temp -- °F");
        assert_eq!(lines[4].text, "hum. 55.4 %");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "temperature/measurement");
    }

    #[test]
    fn text_reading_is_blanked_and_reported() {
        let mut tree = full_tree();
        tree.insert("humidity", PayloadTree::new().with("measurement", "n/a").with("units", "%"));

        let (lines, failures) = sink(Arc::default()).report_lines(&tree, now());
        assert_eq!(lines[4].text, "hum. -- %");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "humidity/measurement");
    }

    #[test]
    fn oversized_spacing_does_not_overflow() {
        let layout = DisplayLayout { line_spacing: u32::MAX / 2, height: 296 };
        let sink = DisplaySink::new(Arc::new(ConsoleDisplay), "CastleWeather", "10.0.0.7", layout);

        let (lines, _) = sink.report_lines(&full_tree(), now());
        assert_eq!(lines[8].y, u32::MAX);
        assert_eq!(lines.last().unwrap().y, 0);
    }

    #[tokio::test]
    async fn publish_and_announce_render_frames() {
        let surface = Arc::new(RecordingSurface::default());
        let sink = sink(surface.clone());

        sink.announce(" Booting...").await.unwrap();
        sink.publish(&PayloadTree::new()).await.unwrap();

        let frames = surface.frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][1].text, " Booting...");
        assert_eq!(frames[0].last().unwrap().text, "10.0.0.7");
        assert_eq!(frames[1][6].text, "wind --");
        assert_eq!(frames[1][7].text, " --/--g mph");
    }
}
