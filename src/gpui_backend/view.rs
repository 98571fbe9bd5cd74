use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use gpui::prelude::*;
use gpui::{
    App, FocusHandle, KeyDownEvent, MouseButton, MouseDownEvent, MouseMoveEvent, MouseUpEvent,
    Pixels, Point, ScrollWheelEvent, Window, canvas, div, px,
};

use crate::canvas::Color;
use crate::geom::ScreenPoint;
use crate::signal::SignalHandle;
use crate::widget::TimeseriesView;

use super::paint::{paint_lists, to_hsla};

/// A GPUI view that renders a [`TimeseriesView`] and forwards input to it.
///
/// Layers are repainted lazily; while repaints or throttled drags are
/// outstanding the view keeps requesting animation frames.
#[derive(Clone)]
pub struct GpuiTimeseriesView {
    view: Arc<RwLock<TimeseriesView>>,
    origin: Arc<RwLock<ScreenPoint>>,
    focus_handle: FocusHandle,
}

impl GpuiTimeseriesView {
    /// Wrap a view.
    pub fn new(view: TimeseriesView, cx: &mut App) -> Self {
        Self {
            view: Arc::new(RwLock::new(view)),
            origin: Arc::new(RwLock::new(ScreenPoint::new(0.0, 0.0))),
            focus_handle: cx.focus_handle(),
        }
    }

    /// Get a handle for driving the view from outside the render loop.
    pub fn view_handle(&self) -> TimeseriesHandle {
        TimeseriesHandle {
            view: Arc::clone(&self.view),
        }
    }

    /// Store handle, for transport tasks answering segment requests.
    pub fn signal_handle(&self) -> SignalHandle {
        self.view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handle()
            .clone()
    }

    fn local(&self, position: Point<Pixels>) -> ScreenPoint {
        let origin = *self.origin.read().unwrap_or_else(PoisonError::into_inner);
        ScreenPoint::new(f32::from(position.x) - origin.x, f32::from(position.y) - origin.y)
    }

    fn on_mouse_down(&mut self, ev: &MouseDownEvent, window: &mut Window, cx: &mut Context<Self>) {
        window.focus(&self.focus_handle);
        let pos = self.local(ev.position);
        self.write_view().pointer_down(pos, Instant::now());
        cx.notify();
    }

    fn on_mouse_move(&mut self, ev: &MouseMoveEvent, cx: &mut Context<Self>) {
        let pos = self.local(ev.position);
        let primary_down = ev.pressed_button == Some(MouseButton::Left);
        self.write_view().pointer_move(pos, primary_down, Instant::now());
        if primary_down {
            cx.notify();
        }
    }

    fn on_mouse_up(&mut self, ev: &MouseUpEvent, cx: &mut Context<Self>) {
        let pos = self.local(ev.position);
        self.write_view().pointer_up(pos, Instant::now());
        cx.notify();
    }

    fn on_scroll(&mut self, ev: &ScrollWheelEvent, cx: &mut Context<Self>) {
        let delta = ev.delta.pixel_delta(px(16.0));
        let delta_y = f32::from(delta.y);
        if delta_y.abs() < 0.01 {
            return;
        }
        let pos = self.local(ev.position);
        // GPUI reports positive deltas when scrolling up
        self.write_view().scroll(pos, -delta_y, Instant::now());
        cx.notify();
    }

    fn on_key_down(&mut self, ev: &KeyDownEvent, cx: &mut Context<Self>) {
        if self.write_view().key_pressed(&ev.keystroke.key, Instant::now()) {
            cx.stop_propagation();
            cx.notify();
        }
    }

    fn write_view(&self) -> std::sync::RwLockWriteGuard<'_, TimeseriesView> {
        self.view.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Render for GpuiTimeseriesView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let prepaint_view = Arc::clone(&self.view);
        let paint_view = Arc::clone(&self.view);
        let origin = Arc::clone(&self.origin);

        div()
            .size_full()
            .bg(to_hsla(Color::WHITE))
            .track_focus(&self.focus_handle)
            .child(
                canvas(
                    move |bounds, window, _| {
                        let now = Instant::now();
                        let top_left = ScreenPoint::new(f32::from(bounds.origin.x), f32::from(bounds.origin.y));
                        *origin.write().unwrap_or_else(PoisonError::into_inner) = top_left;
                        let mut view = prepaint_view.write().unwrap_or_else(PoisonError::into_inner);
                        view.set_size(
                            f32::from(bounds.size.width),
                            f32::from(bounds.size.height),
                            now,
                        );
                        view.poll(now);
                        if view.next_deadline().is_some() {
                            window.request_animation_frame();
                        }
                        top_left
                    },
                    move |_, top_left, window, cx| {
                        let view = paint_view.read().unwrap_or_else(PoisonError::into_inner);
                        paint_lists(view.canvas().render_lists(), top_left, window, cx);
                    },
                )
                .size_full(),
            )
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, ev, window, cx| {
                    this.on_mouse_down(ev, window, cx);
                }),
            )
            .on_mouse_move(cx.listener(|this, ev, _, cx| {
                this.on_mouse_move(ev, cx);
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, ev, _, cx| {
                    this.on_mouse_up(ev, cx);
                }),
            )
            .on_scroll_wheel(cx.listener(|this, ev, _, cx| {
                this.on_scroll(ev, cx);
            }))
            .on_key_down(cx.listener(|this, ev, _, cx| {
                this.on_key_down(ev, cx);
            }))
    }
}

/// A handle for driving a [`TimeseriesView`] held inside a `GpuiTimeseriesView`.
///
/// The handle clones cheaply and can be moved into async tasks.
#[derive(Clone)]
pub struct TimeseriesHandle {
    view: Arc<RwLock<TimeseriesView>>,
}

impl TimeseriesHandle {
    /// Read the view state.
    ///
    /// The view is locked for the duration of the callback.
    pub fn read<R>(&self, f: impl FnOnce(&TimeseriesView) -> R) -> R {
        let view = self.view.read().unwrap_or_else(PoisonError::into_inner);
        f(&view)
    }

    /// Mutate the view state.
    ///
    /// The view is locked for the duration of the callback.
    pub fn write<R>(&self, f: impl FnOnce(&mut TimeseriesView) -> R) -> R {
        let mut view = self.view.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut view)
    }
}
