//! Console Visualization Sink
//!
//! Renders each window update as one text line: the latest value, the
//! window fill, the value range and a sparkline of the window, labelled
//! with the first and last display times.

use std::io::Write;

use crate::application::ports::{SinkError, VisualizationSink};
use crate::domain::sample::Location;
use crate::domain::series::SeriesWindow;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Line-oriented terminal sink.
#[derive(Debug)]
pub struct ConsoleSink<W> {
    out: W,
    slots: Vec<Location>,
    initialized: bool,
}

impl ConsoleSink<std::io::Stdout> {
    /// Sink writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    /// Sink writing to `out`.
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self {
            out,
            slots: Vec::new(),
            initialized: false,
        }
    }

    /// Display slots in order.
    #[must_use]
    pub fn slots(&self) -> &[Location] {
        &self.slots
    }

    /// Consume the sink, returning the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn label_width(&self) -> usize {
        self.slots.iter().map(|s| s.chars().count()).max().unwrap_or(0)
    }
}

impl<W: Write + Send> VisualizationSink for ConsoleSink<W> {
    fn initialize(&mut self, layout: &[Location]) -> Result<(), SinkError> {
        self.slots = layout.to_vec();
        self.initialized = true;
        writeln!(self.out, "Live temperature ({} locations)", self.slots.len())?;
        for (index, location) in self.slots.iter().enumerate() {
            writeln!(self.out, "  [{}] {location}", index + 1)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn update(&mut self, location: &str, window: &SeriesWindow) -> Result<(), SinkError> {
        if !self.initialized {
            return Err(SinkError::NotInitialized);
        }
        let Some(slot) = self.slots.iter().position(|s| s == location) else {
            return Err(SinkError::UnknownSlot(location.to_string()));
        };
        let Some(latest) = window.latest() else {
            return Ok(());
        };

        let (min, max) = window.value_range().unwrap_or((latest.value, latest.value));
        let first = window.oldest().map_or("", |p| p.display_time.as_str());
        let width = self.label_width();

        writeln!(
            self.out,
            "[{}] {location:<width$} {:>7.2}  {:>2}/{}  [{min:.1}, {max:.1}]  {}  {first}..{}",
            slot + 1,
            latest.value,
            window.len(),
            window.capacity(),
            sparkline(&window.values()),
            latest.display_time,
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn add_slot(&mut self, location: &str) -> Result<(), SinkError> {
        self.slots.push(location.to_string());
        writeln!(self.out, "  [{}] {location} (new)", self.slots.len())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Render values as block characters scaled to their own range.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn sparkline(values: &[f64]) -> String {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let span = max - min;
    let top = SPARK_LEVELS.len() - 1;

    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                SPARK_LEVELS[top / 2]
            } else {
                let level = (((v - min) / span) * top as f64).round() as usize;
                SPARK_LEVELS[level.min(top)]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::domain::series::SeriesPoint;

    fn window(values: &[f64]) -> SeriesWindow {
        let mut window = SeriesWindow::new(NonZeroUsize::new(20).unwrap());
        for (i, v) in values.iter().enumerate() {
            window.push(SeriesPoint::new(format!("12:00:0{i}"), *v));
        }
        window
    }

    fn rendered(sink: ConsoleSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn sparkline_spans_levels() {
        assert_eq!(sparkline(&[0.0, 7.0]), "▁█");
        assert_eq!(sparkline(&[3.0, 3.0, 3.0]), "▄▄▄");
        assert_eq!(sparkline(&[]), "");
    }

    #[test]
    fn initialize_lists_layout() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.initialize(&["London".to_string(), "Oslo".to_string()])
            .unwrap();

        let out = rendered(sink);
        assert!(out.contains("2 locations"));
        assert!(out.contains("[1] London"));
        assert!(out.contains("[2] Oslo"));
    }

    #[test]
    fn update_renders_latest_value_and_labels() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.initialize(&["X".to_string()]).unwrap();
        sink.update("X", &window(&[10.0, 12.5, 11.0])).unwrap();

        let out = rendered(sink);
        let line = out.lines().last().unwrap();
        assert!(line.contains("11.00"));
        assert!(line.contains(" 3/20"));
        assert!(line.contains("[10.0, 12.5]"));
        assert!(line.contains("12:00:00..12:00:02"));
    }

    #[test]
    fn update_requires_initialize() {
        let mut sink = ConsoleSink::new(Vec::new());
        assert!(matches!(
            sink.update("X", &window(&[1.0])),
            Err(SinkError::NotInitialized)
        ));
    }

    /// Writer that only exposes bytes once they are flushed.
    #[derive(Default)]
    struct Buffered {
        pending: Vec<u8>,
        flushed: Vec<u8>,
    }

    impl Write for Buffered {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.pending.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.append(&mut self.pending);
            Ok(())
        }
    }

    #[test]
    fn every_write_is_flushed() {
        let mut sink = ConsoleSink::new(Buffered::default());
        sink.initialize(&["X".to_string()]).unwrap();
        sink.add_slot("Y").unwrap();

        let out = sink.into_inner();
        assert!(out.pending.is_empty());
        assert!(String::from_utf8(out.flushed).unwrap().contains("[2] Y (new)"));
    }

    #[test]
    fn update_for_missing_slot_fails() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.initialize(&["X".to_string()]).unwrap();
        assert!(matches!(
            sink.update("Y", &window(&[1.0])),
            Err(SinkError::UnknownSlot(_))
        ));

        sink.add_slot("Y").unwrap();
        sink.update("Y", &window(&[1.0])).unwrap();
        assert_eq!(sink.slots(), ["X".to_string(), "Y".to_string()]);
    }
}
