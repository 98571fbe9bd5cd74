use crate::geom::{Margins, Point, ScreenPoint, ScreenRect};
use crate::transform::Transform;
use crate::view::Viewport;

use super::{Color, LineStyle, RenderCommand, RenderList, TextStyle, clip_segment};

/// Coordinate space of a drawing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// Data coordinates, mapped through the painter's transform.
    Data,
    /// Pixels relative to the top-left corner of the margin box.
    Pixels,
}

/// A pen path made of disconnected runs.
///
/// `move_to` lifts the pen; `line_to` extends the current run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PainterPath {
    runs: Vec<Vec<Point>>,
}

impl PainterPath {
    /// Create an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run at the point.
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.runs.push(vec![Point::new(x, y)]);
    }

    /// Extend the current run, starting one if the pen is up.
    pub fn line_to(&mut self, x: f64, y: f64) {
        match self.runs.last_mut() {
            Some(run) => run.push(Point::new(x, y)),
            None => self.move_to(x, y),
        }
    }

    /// Check whether no point was added.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Access the runs.
    pub fn runs(&self) -> &[Vec<Point>] {
        &self.runs
    }
}

/// Records drawing calls into a [`RenderList`] through a transform.
pub struct Painter<'a> {
    list: &'a mut RenderList,
    transform: Transform,
    clip: Option<ScreenRect>,
}

impl<'a> Painter<'a> {
    /// Bind a painter to a list and transform.
    pub fn new(list: &'a mut RenderList, transform: Transform) -> Self {
        Self {
            list,
            transform,
            clip: None,
        }
    }

    /// Active transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Surface size in pixels.
    pub fn size(&self) -> (f32, f32) {
        self.transform.size()
    }

    /// Whether this pass produces an export rather than the live surface.
    pub fn exporting(&self) -> bool {
        self.list.is_export()
    }

    /// Run `f` with a painter using a different viewport and margins.
    ///
    /// Returns `None` without calling `f` when the scope is degenerate.
    pub fn scoped<R>(
        &mut self,
        viewport: Viewport,
        margins: Margins,
        f: impl FnOnce(&mut Painter<'_>) -> R,
    ) -> Option<R> {
        let transform = Transform::new(viewport, self.transform.size(), margins)?;
        let mut inner = Painter {
            list: &mut *self.list,
            transform,
            clip: self.clip,
        };
        Some(f(&mut inner))
    }

    /// Clip subsequent paths to a pixel rectangle.
    pub fn set_clip(&mut self, clip: Option<ScreenRect>) {
        self.clip = clip;
    }

    /// Map a coordinate pair to absolute pixels.
    pub fn map(&self, space: Space, x: f64, y: f64) -> ScreenPoint {
        match space {
            Space::Data => self.transform.data_to_pixel(Point::new(x, y)),
            Space::Pixels => self
                .transform
                .offset_to_pixel(ScreenPoint::new(x as f32, y as f32)),
        }
    }

    /// Stroke a straight line.
    pub fn draw_line(&mut self, space: Space, from: (f64, f64), to: (f64, f64), style: LineStyle) {
        let mut path = PainterPath::new();
        path.move_to(from.0, from.1);
        path.line_to(to.0, to.1);
        self.draw_path(space, &path, style);
    }

    /// Stroke every run of a path.
    ///
    /// Non-finite points lift the pen. Runs are clipped when a clip is set.
    pub fn draw_path(&mut self, space: Space, path: &PainterPath, style: LineStyle) {
        for run in path.runs() {
            let mut current: Vec<ScreenPoint> = Vec::new();
            let mut prev: Option<ScreenPoint> = None;
            for point in run {
                if !point.is_finite() {
                    self.flush(&mut current, style);
                    prev = None;
                    continue;
                }
                let pixel = self.map(space, point.x, point.y);
                match self.clip {
                    None => current.push(pixel),
                    Some(clip) => {
                        if let Some(start) = prev {
                            match clip_segment(start, pixel, clip) {
                                Some((a, b)) => {
                                    if current.last() != Some(&a) {
                                        self.flush(&mut current, style);
                                        current.push(a);
                                    }
                                    current.push(b);
                                }
                                None => self.flush(&mut current, style),
                            }
                        } else if clip.contains(pixel) {
                            current.push(pixel);
                        }
                        prev = Some(pixel);
                    }
                }
            }
            self.flush(&mut current, style);
        }
    }

    fn flush(&mut self, current: &mut Vec<ScreenPoint>, style: LineStyle) {
        if current.len() >= 2 {
            self.list.push(RenderCommand::Polyline {
                points: std::mem::take(current),
                style,
            });
        } else {
            current.clear();
        }
    }

    /// Fill and/or outline a rectangle given by two corners.
    pub fn draw_rect(
        &mut self,
        space: Space,
        corner_a: (f64, f64),
        corner_b: (f64, f64),
        fill: Option<Color>,
        stroke: Option<LineStyle>,
    ) {
        let a = self.map(space, corner_a.0, corner_a.1);
        let b = self.map(space, corner_b.0, corner_b.1);
        let rect = ScreenRect::bounding(a, b);
        if !(rect.min.x.is_finite() && rect.max.x.is_finite())
            || !(rect.min.y.is_finite() && rect.max.y.is_finite())
        {
            return;
        }
        self.list.push(RenderCommand::Rect { rect, fill, stroke });
    }

    /// Draw a line of text anchored at the position.
    pub fn draw_text(&mut self, space: Space, at: (f64, f64), text: impl Into<String>, style: TextStyle) {
        let position = self.map(space, at.0, at.1);
        if !(position.x.is_finite() && position.y.is_finite()) {
            return;
        }
        self.list.push(RenderCommand::Text {
            position,
            text: text.into(),
            style,
        });
    }

    /// Begin a clipped region in the backend.
    pub fn push_clip(&mut self, rect: ScreenRect) {
        self.list.push(RenderCommand::ClipRect(rect));
    }

    /// End the innermost clipped region.
    pub fn pop_clip(&mut self) {
        self.list.push(RenderCommand::ClipEnd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Range;

    fn painter_transform() -> Transform {
        Transform::new(
            Viewport::new(Range::new(0.0, 100.0), Range::new(0.0, 10.0)),
            (120.0, 30.0),
            Margins::new(10.0, 10.0, 10.0, 10.0),
        )
        .unwrap()
    }

    fn polylines(list: &RenderList) -> Vec<Vec<ScreenPoint>> {
        list.commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::Polyline { points, .. } => Some(points.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn nan_lifts_the_pen() {
        let mut list = RenderList::new();
        let mut painter = Painter::new(&mut list, painter_transform());
        let mut path = PainterPath::new();
        path.move_to(0.0, 0.0);
        path.line_to(10.0, 5.0);
        path.line_to(20.0, f64::NAN);
        path.line_to(30.0, 5.0);
        path.line_to(40.0, 5.0);
        painter.draw_path(Space::Data, &path, LineStyle::default());
        let lines = polylines(&list);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0][0], ScreenPoint::new(10.0, 20.0));
        assert_eq!(lines[1].len(), 2);
    }

    #[test]
    fn pixel_space_is_margin_relative() {
        let mut list = RenderList::new();
        let painter = Painter::new(&mut list, painter_transform());
        assert_eq!(painter.map(Space::Pixels, 5.0, 2.0), ScreenPoint::new(15.0, 12.0));
    }

    #[test]
    fn degenerate_scope_skips_drawing() {
        let mut list = RenderList::new();
        let mut painter = Painter::new(&mut list, painter_transform());
        let called = painter.scoped(
            Viewport::new(Range::new(5.0, 5.0), Range::new(0.0, 1.0)),
            Margins::default(),
            |_| true,
        );
        assert!(called.is_none());
        let scoped = painter.scoped(Viewport::unit(), Margins::default(), |p| {
            p.map(Space::Data, 1.0, 0.0)
        });
        assert_eq!(scoped, Some(ScreenPoint::new(120.0, 30.0)));
    }

    #[test]
    fn clip_splits_runs_at_the_boundary() {
        let mut list = RenderList::new();
        let mut painter = Painter::new(&mut list, painter_transform());
        painter.set_clip(Some(painter.transform().inner()));
        let mut path = PainterPath::new();
        path.move_to(50.0, 5.0);
        path.line_to(150.0, 5.0);
        path.line_to(150.0, 6.0);
        path.line_to(50.0, 6.0);
        painter.draw_path(Space::Data, &path, LineStyle::default());
        let lines = polylines(&list);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].last().map(|p| p.x), Some(110.0));
        assert_eq!(lines[1].first().map(|p| p.x), Some(110.0));
    }
}
