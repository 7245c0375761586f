//! Rendering seam between the renderer and whatever draws the chart.

use crate::chart::candle::OhlcvBar;

/// Series drawn on a chart surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesId {
    Candles,
    Volume,
    /// Simple moving average of the given period
    MovingAverage(usize),
}

/// One point of a series, keyed by bucket time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesPoint {
    Candle(OhlcvBar),
    Histogram { time: i64, value: f64, rising: bool },
    Line { time: i64, value: f64 },
}

impl SeriesPoint {
    pub fn time(&self) -> i64 {
        match self {
            Self::Candle(bar) => bar.time,
            Self::Histogram { time, .. } | Self::Line { time, .. } => *time,
        }
    }

    pub(crate) fn volume(bar: &OhlcvBar) -> Self {
        Self::Histogram {
            time: bar.time,
            value: bar.volume,
            rising: bar.is_rising(),
        }
    }
}

/// A chart that can be fed series data.
///
/// `update` with the time of the last point overwrites it in place; a newer
/// time appends.
pub trait ChartSurface {
    /// Replace a whole series.
    fn set_data(&mut self, series: SeriesId, points: Vec<SeriesPoint>);

    /// Incrementally update a series.
    fn update(&mut self, series: SeriesId, point: SeriesPoint);

    /// Apply new viewport dimensions.
    fn resize(&mut self, width: u32, height: u32);
}

/// A call made against a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    SetData(SeriesId, Vec<SeriesPoint>),
    Update(SeriesId, SeriesPoint),
    Resize(u32, u32),
}

/// Headless surface that records every call and keeps the resulting series.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    calls: Vec<SurfaceCall>,
    series: Vec<(SeriesId, Vec<SeriesPoint>)>,
    size: Option<(u32, u32)>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    /// Current points of a series, as a chart would hold them.
    pub fn series(&self, id: SeriesId) -> &[SeriesPoint] {
        self.series
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, points)| points.as_slice())
            .unwrap_or(&[])
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn points_mut(&mut self, id: SeriesId) -> &mut Vec<SeriesPoint> {
        let idx = match self.series.iter().position(|(sid, _)| *sid == id) {
            Some(idx) => idx,
            None => {
                self.series.push((id, Vec::new()));
                self.series.len() - 1
            }
        };
        &mut self.series[idx].1
    }
}

impl ChartSurface for RecordingSurface {
    fn set_data(&mut self, series: SeriesId, points: Vec<SeriesPoint>) {
        *self.points_mut(series) = points.clone();
        self.calls.push(SurfaceCall::SetData(series, points));
    }

    fn update(&mut self, series: SeriesId, point: SeriesPoint) {
        let points = self.points_mut(series);
        match points.last_mut() {
            Some(last) if last.time() == point.time() => *last = point,
            _ => points.push(point),
        }
        self.calls.push(SurfaceCall::Update(series, point));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = Some((width, height));
        self.calls.push(SurfaceCall::Resize(width, height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_overwrites_same_time() {
        let mut surface = RecordingSurface::new();
        surface.update(SeriesId::Volume, SeriesPoint::Line { time: 0, value: 1.0 });
        surface.update(SeriesId::Volume, SeriesPoint::Line { time: 0, value: 2.0 });
        surface.update(SeriesId::Volume, SeriesPoint::Line { time: 60, value: 3.0 });

        assert_eq!(
            surface.series(SeriesId::Volume),
            &[
                SeriesPoint::Line { time: 0, value: 2.0 },
                SeriesPoint::Line { time: 60, value: 3.0 },
            ]
        );
        assert_eq!(surface.calls().len(), 3);
        assert!(surface.series(SeriesId::Candles).is_empty());
    }
}
