use gpui::{
    App, BorderStyle, Bounds, ContentMask, Corners, Edges, PathBuilder, Pixels, TextRun, Window,
    font, point, px, quad,
};

use crate::canvas::{Color, LineStyle, RenderCommand, RenderList, TextAlign, TextStyle};
use crate::geom::{ScreenPoint, ScreenRect};

/// Replay render lists in order, offset by the element origin.
pub(crate) fn paint_lists<'a>(
    lists: impl IntoIterator<Item = &'a RenderList>,
    origin: ScreenPoint,
    window: &mut Window,
    cx: &mut App,
) {
    for list in lists {
        paint_list(list, origin, window, cx);
    }
}

fn paint_list(list: &RenderList, origin: ScreenPoint, window: &mut Window, cx: &mut App) {
    let mut clip_stack: Vec<ContentMask<Pixels>> = Vec::new();
    for command in list.commands() {
        match command {
            RenderCommand::ClipRect(rect) => {
                clip_stack.push(ContentMask {
                    bounds: to_bounds(*rect, origin),
                });
            }
            RenderCommand::ClipEnd => {
                clip_stack.pop();
            }
            RenderCommand::Polyline { points, style } => {
                with_clip(window, &clip_stack, |window| {
                    paint_polyline(window, points, *style, origin);
                });
            }
            RenderCommand::Rect { rect, fill, stroke } => {
                with_clip(window, &clip_stack, |window| {
                    paint_rect(window, *rect, *fill, *stroke, origin);
                });
            }
            RenderCommand::Text {
                position,
                text,
                style,
            } => {
                with_clip(window, &clip_stack, |window| {
                    paint_text(window, cx, offset(*position, origin), text, style);
                });
            }
        }
    }
}

fn paint_polyline(window: &mut Window, points: &[ScreenPoint], style: LineStyle, origin: ScreenPoint) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    if rest.is_empty() {
        return;
    }
    let width = style.width.max(0.5);
    let mut builder = PathBuilder::stroke(px(width));
    let first = offset(*first, origin);
    builder.move_to(point(px(first.x), px(first.y)));
    for pt in rest {
        let pt = offset(*pt, origin);
        builder.line_to(point(px(pt.x), px(pt.y)));
    }
    if let Ok(path) = builder.build() {
        window.paint_path(path, to_rgba(style.color));
    }
}

fn paint_rect(
    window: &mut Window,
    rect: ScreenRect,
    fill: Option<Color>,
    stroke: Option<LineStyle>,
    origin: ScreenPoint,
) {
    let transparent = Color::new(0.0, 0.0, 0.0, 0.0);
    let (stroke_width, stroke_color) = stroke.map_or((0.0, transparent), |s| (s.width, s.color));
    window.paint_quad(quad(
        to_bounds(rect, origin),
        Corners::all(px(0.0)),
        to_rgba(fill.unwrap_or(transparent)),
        Edges::all(px(stroke_width)),
        to_rgba(stroke_color),
        BorderStyle::default(),
    ));
}

fn paint_text(
    window: &mut Window,
    cx: &mut App,
    position: ScreenPoint,
    text: &str,
    style: &TextStyle,
) {
    if text.is_empty() {
        return;
    }
    let run = TextRun {
        len: text.len(),
        font: font(".SystemUIFont"),
        color: to_hsla(style.color),
        background_color: None,
        underline: None,
        strikethrough: None,
    };
    let shaped = window
        .text_system()
        .shape_line(text.to_string().into(), px(style.size), &[run], None);
    let line_height = shaped.ascent + shaped.descent;
    let width = f32::from(shaped.width);
    let x = match style.align {
        TextAlign::Left => position.x,
        TextAlign::Center => position.x - width * 0.5,
        TextAlign::Right => position.x - width,
    };
    let y = position.y - f32::from(line_height) * 0.5;
    let _ = shaped.paint(point(px(x), px(y)), line_height, window, cx);
}

fn offset(pt: ScreenPoint, origin: ScreenPoint) -> ScreenPoint {
    ScreenPoint::new(pt.x + origin.x, pt.y + origin.y)
}

fn to_rgba(color: Color) -> gpui::Rgba {
    gpui::Rgba {
        r: color.r,
        g: color.g,
        b: color.b,
        a: color.a,
    }
}

pub(crate) fn to_hsla(color: Color) -> gpui::Hsla {
    gpui::Hsla::from(to_rgba(color))
}

fn to_bounds(rect: ScreenRect, origin: ScreenPoint) -> Bounds<Pixels> {
    let min = offset(rect.min, origin);
    let max = offset(rect.max, origin);
    Bounds::from_corners(point(px(min.x), px(min.y)), point(px(max.x), px(max.y)))
}

fn with_clip(window: &mut Window, stack: &[ContentMask<Pixels>], f: impl FnOnce(&mut Window)) {
    if let Some(mask) = stack.last() {
        window.with_content_mask(Some(mask.clone()), f);
    } else {
        f(window);
    }
}
