//! Multi-channel timeseries view.
//!
//! [`TimeseriesView`] wires a [`TimeAxisController`] to a shared segment
//! store and a five-layer canvas (overview strip, time axis, traces, cursor,
//! labels). Hosts feed it pointer and key input, call
//! [`poll`](TimeseriesView::poll) at
//! [`next_deadline`](TimeseriesView::next_deadline) and replay the render
//! lists of the repainted layers.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::axis::time_ticks;
use crate::canvas::{
    Color, LayerId, LayeredCanvas, LineStyle, Painter, RenderList, RepaintScheduler, Space,
    TextAlign, TextStyle,
};
use crate::config::TraceviewConfig;
use crate::events::SubscriptionId;
use crate::geom::{Margins, ScreenPoint};
use crate::gesture::{DragInfo, GestureEvent, MouseGestureTracker};
use crate::link::{TimeSyncBinding, TimeSyncGroup, TimeSyncOptions};
use crate::panel::{
    Panel, PanelPaint, TraceCompleteness, TraceParams, build_panels, label_stride, paint_order,
};
use crate::signal::{ChannelLayout, SegmentSet, SignalHandle};
use crate::timeaxis::{TimeAction, TimeAxisController, ViewEvent, ViewUpdate};
use crate::transform::Transform;
use crate::view::{Range, Viewport};

const AXIS_COLOR: Color = Color::rgb8(22, 22, 22);
const CURSOR_WIDTH: f32 = 2.0;
const TRACK_COLOR: Color = Color::rgb8(211, 211, 211);
const DRAG_COLOR: Color = Color::rgb8(0, 100, 0);
const WINDOW_BORDER: f32 = 2.0;

/// Handler bound to a key with [`TimeseriesView::bind_key`].
pub type KeyHandler = Box<dyn FnMut(&mut TimeAxisController) -> ViewUpdate + Send + Sync>;

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Segment sets written since the last poll.
#[derive(Default)]
struct Arrivals {
    since: Option<Instant>,
    sets: Vec<SegmentSet>,
    waker: Option<Waker>,
}

impl fmt::Debug for Arrivals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arrivals")
            .field("since", &self.since)
            .field("sets", &self.sets.len())
            .field("waker", &self.waker.is_some())
            .finish()
    }
}

/// Host key bindings, consulted before the built-in keys.
#[derive(Default)]
struct KeyBindings {
    entries: Vec<(String, KeyHandler)>,
}

impl KeyBindings {
    fn insert(&mut self, key: String, handler: KeyHandler) {
        self.remove(&key);
        self.entries.push((key, handler));
    }

    fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(bound, _)| bound != key);
        self.entries.len() != before
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut KeyHandler> {
        self.entries
            .iter_mut()
            .find(|(bound, _)| bound == key)
            .map(|(_, handler)| handler)
    }
}

impl fmt::Debug for KeyBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(key, _)| key))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressTarget {
    Overview,
    Traces,
}

/// State the layer paint callbacks read.
#[derive(Debug)]
pub struct ViewContext {
    handle: SignalHandle,
    layout: ChannelLayout,
    panels: Vec<Panel>,
    time_range: Range,
    current_time: Option<f64>,
    downsample_factor: usize,
    amplitude_scale: f64,
    highlight_selected: bool,
    sample_rate: f64,
    num_timepoints: usize,
    trace_margins: Margins,
    overview_drag: Option<Range>,
    panel_budget: Duration,
    next_panel: AtomicUsize,
    incomplete: AtomicBool,
}

impl ViewContext {
    /// Panels in display order.
    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    /// Time range the layers were last painted with.
    pub fn time_range(&self) -> Range {
        self.time_range
    }
}

/// Layer ids of a [`TimeseriesView`], bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewLayers {
    /// Whole-signal strip with the visible window.
    pub overview: LayerId,
    /// Ticks, baseline and scale bar.
    pub time_axis: LayerId,
    /// Frame and channel traces.
    pub main: LayerId,
    /// Current time marker.
    pub cursor: LayerId,
    /// Channel labels.
    pub labels: LayerId,
}

/// Interactive multi-channel trace view.
#[derive(Debug)]
pub struct TimeseriesView {
    config: TraceviewConfig,
    controller: TimeAxisController,
    canvas: LayeredCanvas<ViewContext>,
    ctx: ViewContext,
    layers: ViewLayers,
    scheduler: RepaintScheduler,
    gestures: MouseGestureTracker,
    press_target: Option<PressTarget>,
    main_resume_at: Option<Instant>,
    sync: Option<TimeSyncBinding>,
    arrivals: Arc<Mutex<Arrivals>>,
    segment_subscription: SubscriptionId,
    key_bindings: KeyBindings,
    channel_labels: Vec<String>,
    channel_painters: HashMap<usize, Arc<dyn PanelPaint>>,
    selected: BTreeSet<usize>,
    view_only_selected: bool,
}

impl TimeseriesView {
    /// Create a view over the store behind `handle`.
    pub fn new(handle: SignalHandle, config: TraceviewConfig) -> Self {
        let descriptor = handle.read(|store| *store.descriptor());
        let num_channels = descriptor.num_channels();
        let controller =
            TimeAxisController::new(descriptor.num_timepoints(), num_channels, config.navigation.clone());

        let arrivals = Arc::new(Mutex::new(Arrivals::default()));
        let segment_subscription = {
            let queue = Arc::clone(&arrivals);
            handle.write(|store| {
                store.on_segment_set(move |set: &SegmentSet| {
                    let waker = {
                        let mut arrivals = queue.lock().unwrap_or_else(PoisonError::into_inner);
                        arrivals.since.get_or_insert_with(Instant::now);
                        arrivals.sets.push(*set);
                        arrivals.waker.clone()
                    };
                    if let Some(wake) = waker {
                        wake();
                    }
                })
            })
        };

        let trace_margins = config.layout.trace_margins();
        let whole_signal = Viewport::new(
            Range::new(0.0, descriptor.num_timepoints() as f64),
            Range::new(0.0, 1.0),
        );
        let mut canvas = LayeredCanvas::new((0.0, 0.0));
        let layers = ViewLayers {
            overview: canvas.add_layer("overview", Margins::default(), whole_signal, paint_overview),
            time_axis: canvas.add_layer("time_axis", Margins::default(), Viewport::unit(), paint_time_axis),
            main: canvas.add_layer("main", trace_margins, Viewport::unit(), paint_main),
            cursor: canvas.add_layer("cursor", trace_margins, Viewport::unit(), paint_cursor),
            labels: canvas.add_layer("labels", Margins::default(), Viewport::unit(), paint_labels),
        };

        let ctx = ViewContext {
            handle,
            layout: ChannelLayout::identity(num_channels),
            panels: Vec::new(),
            time_range: controller.time_range(),
            current_time: controller.current_time(),
            downsample_factor: controller.downsample_factor(),
            amplitude_scale: controller.amplitude_scale(),
            highlight_selected: true,
            sample_rate: descriptor.sample_rate(),
            num_timepoints: descriptor.num_timepoints(),
            trace_margins,
            overview_drag: None,
            panel_budget: config.repaint.panel_budget(),
            next_panel: AtomicUsize::new(0),
            incomplete: AtomicBool::new(false),
        };

        let mut view = Self {
            scheduler: RepaintScheduler::new(&config.repaint),
            gestures: MouseGestureTracker::new(&config.gesture),
            config,
            controller,
            canvas,
            ctx,
            layers,
            press_target: None,
            main_resume_at: None,
            sync: None,
            arrivals,
            segment_subscription,
            key_bindings: KeyBindings::default(),
            channel_labels: (0..num_channels).map(|m| m.to_string()).collect(),
            channel_painters: HashMap::new(),
            selected: BTreeSet::new(),
            view_only_selected: false,
        };
        view.update_panels();
        view
    }

    /// Join a time sync group.
    pub fn with_sync_group(mut self, group: TimeSyncGroup, options: TimeSyncOptions) -> Self {
        self.set_sync_group(Some((group, options)));
        self
    }

    /// Join, switch or leave a time sync group.
    pub fn set_sync_group(&mut self, group: Option<(TimeSyncGroup, TimeSyncOptions)>) {
        if let Some(binding) = self.sync.take() {
            binding.leave();
        }
        self.sync = group.map(|(group, options)| TimeSyncBinding::join(group, options));
    }

    /// Shared store handle.
    pub fn handle(&self) -> &SignalHandle {
        &self.ctx.handle
    }

    /// Navigation state.
    pub fn controller(&self) -> &TimeAxisController {
        &self.controller
    }

    /// Layer ids.
    pub fn layers(&self) -> ViewLayers {
        self.layers
    }

    /// Canvas holding the render lists of the last paints.
    pub fn canvas(&self) -> &LayeredCanvas<ViewContext> {
        &self.canvas
    }

    /// Panels in display order.
    pub fn panels(&self) -> &[Panel] {
        &self.ctx.panels
    }

    /// Whether the last trace paint found every bucket cached.
    ///
    /// A trace paint that stopped at its time budget counts as incomplete
    /// until the remaining panels are drawn.
    pub fn last_paint_complete(&self) -> TraceCompleteness {
        if self.ctx.incomplete.load(Ordering::Relaxed) || self.main_resume_at.is_some() {
            TraceCompleteness::Incomplete
        } else {
            TraceCompleteness::Complete
        }
    }

    /// Call `waker` whenever segment data lands in the store.
    ///
    /// The waker runs on the writer's thread with the store locked; it
    /// should only schedule a [`poll`](Self::poll).
    pub fn set_data_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.arrivals.lock().unwrap_or_else(PoisonError::into_inner).waker = Some(Arc::new(waker));
    }

    /// Observe time range, cursor and resolution changes.
    pub fn subscribe(
        &mut self,
        handler: impl FnMut(&ViewEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.controller.subscribe(handler)
    }

    /// Stop observing.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.controller.unsubscribe(id)
    }

    /// Resize the surface.
    pub fn set_size(&mut self, width: f32, height: f32, now: Instant) {
        if self.canvas.size() == (width, height) {
            return;
        }
        self.canvas.set_size((width, height));
        self.place_layers();
        let margins = self.ctx.trace_margins;
        let update = self.controller.set_width(width - margins.left - margins.right);
        self.update_panels();
        self.apply_update(update, now);
        self.main_resume_at = None;
        self.ctx.next_panel.store(0, Ordering::Relaxed);
        self.scheduler.request_all(self.canvas.layer_ids(), now);
    }

    /// Set the per-channel offsets and base scale.
    pub fn set_channel_layout(&mut self, layout: ChannelLayout, now: Instant) {
        self.ctx.layout = layout;
        self.request_main(now);
    }

    /// Set the channel labels, indexed by channel.
    pub fn set_channel_labels(&mut self, labels: Vec<String>, now: Instant) {
        self.channel_labels = labels;
        self.update_panels();
        self.scheduler.request(self.layers.labels, now);
    }

    /// Draw one channel with a custom painter, or restore the default.
    pub fn set_channel_painter(
        &mut self,
        channel: usize,
        painter: Option<Arc<dyn PanelPaint>>,
        now: Instant,
    ) {
        match painter {
            Some(painter) => self.channel_painters.insert(channel, painter),
            None => self.channel_painters.remove(&channel),
        };
        self.update_panels();
        self.request_main(now);
    }

    /// Bind `key` to a handler run before the built-in key actions.
    ///
    /// Rebinding a key replaces its handler.
    pub fn bind_key(
        &mut self,
        key: impl Into<String>,
        handler: impl FnMut(&mut TimeAxisController) -> ViewUpdate + Send + Sync + 'static,
    ) {
        self.key_bindings.insert(key.into(), Box::new(handler));
    }

    /// Remove a host key binding. Returns whether one existed.
    pub fn unbind_key(&mut self, key: &str) -> bool {
        self.key_bindings.remove(key)
    }

    /// Replace the selected channel set.
    pub fn set_selected_channels(&mut self, selected: impl IntoIterator<Item = usize>, now: Instant) {
        self.selected = selected.into_iter().collect();
        self.relayout(now);
    }

    /// Selected channels.
    pub fn selected_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().copied()
    }

    /// Show only the selected channels.
    pub fn set_view_only_selected(&mut self, only_selected: bool, now: Instant) {
        if self.view_only_selected == only_selected {
            return;
        }
        self.view_only_selected = only_selected;
        self.relayout(now);
    }

    /// Move the visible time range.
    pub fn set_time_range(&mut self, range: Range, now: Instant) -> ViewUpdate {
        let update = self.controller.set_time_range(range);
        self.apply_update(update, now);
        update
    }

    /// Move the cursor.
    pub fn set_current_time(&mut self, time: Option<f64>, now: Instant) -> ViewUpdate {
        let update = self.controller.set_current_time(time);
        self.apply_update(update, now);
        update
    }

    /// Move the cursor and scroll it into view.
    pub fn jump_to_time(&mut self, time: f64, now: Instant) -> ViewUpdate {
        let update = self
            .controller
            .set_current_time(Some(time))
            .merge(self.controller.ensure_current_time_visible());
        self.apply_update(update, now);
        update
    }

    /// Apply a navigation command.
    pub fn apply_action(&mut self, action: TimeAction, now: Instant) -> ViewUpdate {
        let update = self.controller.apply_action(action);
        self.apply_update(update, now);
        update
    }

    /// Handle a key by name. Returns whether the key is bound.
    pub fn key_pressed(&mut self, key: &str, now: Instant) -> bool {
        if let Some(handler) = self.key_bindings.get_mut(key) {
            let update = handler(&mut self.controller);
            self.apply_update(update, now);
            return true;
        }
        match TimeAction::from_key(key) {
            Some(action) => {
                self.apply_action(action, now);
                true
            }
            None => false,
        }
    }

    /// Primary button pressed.
    pub fn pointer_down(&mut self, pos: ScreenPoint, now: Instant) {
        let events = self.gestures.press(pos, now);
        self.handle_gestures(events, now);
    }

    /// Pointer moved.
    pub fn pointer_move(&mut self, pos: ScreenPoint, primary_down: bool, now: Instant) {
        let events = self.gestures.moved(pos, primary_down, now);
        self.handle_gestures(events, now);
    }

    /// Primary button released.
    pub fn pointer_up(&mut self, pos: ScreenPoint, now: Instant) {
        let events = self.gestures.release(pos, now);
        self.handle_gestures(events, now);
    }

    /// Pointer entered the surface.
    pub fn pointer_enter(&mut self, pos: ScreenPoint, now: Instant) {
        let events = self.gestures.enter(pos);
        self.handle_gestures(events, now);
    }

    /// Pointer left the surface.
    pub fn pointer_leave(&mut self, pos: ScreenPoint, now: Instant) {
        let events = self.gestures.leave(pos);
        self.handle_gestures(events, now);
    }

    /// Wheel scrolled; scrolling up zooms in.
    pub fn scroll(&mut self, pos: ScreenPoint, delta_y: f32, now: Instant) {
        let events = self.gestures.wheel(pos, delta_y);
        self.handle_gestures(events, now);
    }

    /// When [`poll`](Self::poll) has work next.
    ///
    /// Segment data written since the last poll is due as soon as it lands.
    pub fn next_deadline(&self) -> Option<Instant> {
        let arrived = self.arrivals.lock().unwrap_or_else(PoisonError::into_inner).since;
        [
            self.scheduler.next_deadline(),
            self.gestures.next_deadline(),
            arrived,
            self.main_resume_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Process queued work and repaint the layers that are due.
    ///
    /// Returns the repainted layers. A trace paint that ran out of time is
    /// picked up again once the resume delay has passed.
    pub fn poll(&mut self, now: Instant) -> Vec<LayerId> {
        if let Some(event) = self.gestures.poll(now) {
            self.handle_gesture(event, now);
        }
        self.drain_segment_events(now);
        self.pull_sync(now);

        let mut due = self.scheduler.poll(now);
        let main_due = due.contains(&self.layers.main);
        let resume = !main_due && self.main_resume_at.is_some_and(|at| at <= now);
        if due.is_empty() && !resume {
            return due;
        }
        self.refresh_context();
        if main_due {
            self.ctx.incomplete.store(false, Ordering::Relaxed);
            self.ctx.next_panel.store(0, Ordering::Relaxed);
        }
        for &layer in &due {
            self.canvas.repaint(layer, &self.ctx);
        }
        if resume {
            tracing::trace!(from = self.ctx.next_panel.load(Ordering::Relaxed), "resuming trace paint");
            self.canvas.resume(self.layers.main, &self.ctx);
            due.push(self.layers.main);
        }
        if main_due || resume {
            let paused = self.ctx.next_panel.load(Ordering::Relaxed) > 0;
            self.main_resume_at = paused.then(|| now + self.config.repaint.panel_resume());
        }
        due
    }

    /// Paint every layer into a fresh list, without the cursor or overview.
    ///
    /// Reads only cached data and leaves the live view state untouched.
    pub fn export(&mut self) -> RenderList {
        self.refresh_context();
        self.canvas.export(&self.ctx)
    }

    fn handle_gestures(&mut self, events: Vec<GestureEvent>, now: Instant) {
        for event in events {
            self.handle_gesture(event, now);
        }
    }

    fn handle_gesture(&mut self, event: GestureEvent, now: Instant) {
        match event {
            GestureEvent::Press(pos) => {
                if pos.y < self.config.layout.overview_height {
                    self.press_target = Some(PressTarget::Overview);
                } else {
                    self.press_target = Some(PressTarget::Traces);
                    self.controller.begin_pan();
                }
            }
            GestureEvent::Drag(info) => match self.press_target {
                Some(PressTarget::Overview) => self.drag_overview(info, now),
                Some(PressTarget::Traces) => {
                    let (Some(anchor), Some(pos)) =
                        (self.pixel_to_time(info.anchor), self.pixel_to_time(info.pos))
                    else {
                        return;
                    };
                    let update = self.controller.pan(anchor, pos);
                    self.apply_update(update, now);
                }
                None => {}
            },
            GestureEvent::DragRelease(_) => {
                self.controller.end_pan();
                if self.press_target.take() == Some(PressTarget::Overview) {
                    self.commit_overview_drag(now);
                }
            }
            GestureEvent::Release(pos) => {
                self.controller.end_pan();
                match self.press_target.take() {
                    Some(PressTarget::Overview) => {
                        if let Some(t) = self.overview_time(pos) {
                            let update = self
                                .controller
                                .set_current_time(Some(t))
                                .merge(self.controller.ensure_current_time_visible());
                            self.apply_update(update, now);
                        }
                    }
                    Some(PressTarget::Traces) | None => {
                        if let Some(t) = self.pixel_to_time(pos) {
                            let update = self.controller.set_current_time(Some(t));
                            self.apply_update(update, now);
                        }
                    }
                }
            }
            GestureEvent::Wheel { delta_y, .. } => {
                let action = if delta_y < 0.0 {
                    TimeAction::ZoomIn
                } else if delta_y > 0.0 {
                    TimeAction::ZoomOut
                } else {
                    return;
                };
                self.apply_action(action, now);
            }
            GestureEvent::Move(_) | GestureEvent::Enter(_) | GestureEvent::Leave(_) => {}
        }
    }

    fn drag_overview(&mut self, info: DragInfo, now: Instant) {
        let (Some(anchor), Some(pos)) = (self.overview_time(info.anchor), self.overview_time(info.pos))
        else {
            return;
        };
        self.ctx.overview_drag = Some(self.controller.time_range().translated(pos - anchor));
        self.scheduler.request(self.layers.overview, now);
    }

    fn commit_overview_drag(&mut self, now: Instant) {
        if let Some(range) = self.ctx.overview_drag.take() {
            let update = self
                .controller
                .set_time_range(range)
                .merge(self.controller.ensure_current_time_in_range());
            self.apply_update(update, now);
        }
        self.scheduler.request(self.layers.overview, now);
    }

    fn pixel_to_time(&self, pos: ScreenPoint) -> Option<f64> {
        let size = self.canvas.size();
        let viewport = Viewport::new(self.controller.time_range(), Range::new(0.0, 1.0));
        let transform = Transform::new(viewport, size, self.ctx.trace_margins)?;
        let t = transform.pixel_to_data(pos).x;
        t.is_finite().then_some(t)
    }

    fn overview_time(&self, pos: ScreenPoint) -> Option<f64> {
        let transform = self.canvas.transform(self.layers.overview)?;
        let t = transform.pixel_to_data(pos).x;
        t.is_finite().then_some(t)
    }

    /// Schedule a full trace repaint, dropping any paused paint.
    fn request_main(&mut self, now: Instant) {
        self.main_resume_at = None;
        self.ctx.next_panel.store(0, Ordering::Relaxed);
        self.scheduler.request(self.layers.main, now);
    }

    fn apply_update(&mut self, update: ViewUpdate, now: Instant) {
        if update.is_empty() {
            return;
        }
        if update.needs_trace_repaint() {
            self.request_main(now);
        }
        if update.time_range_changed {
            self.scheduler.request(self.layers.overview, now);
            self.scheduler.request(self.layers.time_axis, now);
            self.scheduler.request(self.layers.cursor, now);
            if let Some(sync) = &self.sync {
                sync.publish_time_range(self.controller.time_range());
            }
        }
        if update.current_time_changed {
            self.scheduler.request(self.layers.cursor, now);
            if let Some(sync) = &self.sync {
                sync.publish_current_time(self.controller.current_time());
            }
        }
    }

    fn drain_segment_events(&mut self, now: Instant) {
        let sets = {
            let mut arrivals = self.arrivals.lock().unwrap_or_else(PoisonError::into_inner);
            arrivals.since = None;
            std::mem::take(&mut arrivals.sets)
        };
        let range = self.controller.time_range();
        let visible = sets
            .iter()
            .any(|set| set.t1 as f64 <= range.max && set.t2 as f64 >= range.min);
        if visible {
            tracing::trace!(count = sets.len(), "visible segments arrived");
            self.request_main(now);
        }
    }

    fn pull_sync(&mut self, now: Instant) {
        let Some(sync) = self.sync.as_mut() else {
            return;
        };
        let range = sync.take_time_range();
        let cursor = sync.take_current_time();
        let mut update = ViewUpdate::NONE;
        if let Some(range) = range {
            update = update.merge(self.controller.set_time_range(range));
        }
        if let Some(time) = cursor {
            update = update.merge(self.controller.set_current_time(time));
        }
        self.apply_update(update, now);
    }

    fn displayed_channels(&self) -> Vec<usize> {
        let num_channels = self.ctx.handle.read(|store| store.descriptor().num_channels());
        (0..num_channels)
            .filter(|m| !self.view_only_selected || self.selected.contains(m))
            .collect()
    }

    fn relayout(&mut self, now: Instant) {
        self.update_panels();
        let update = self.controller.set_num_channels(self.ctx.panels.len());
        self.apply_update(update, now);
        self.request_main(now);
        self.scheduler.request(self.layers.labels, now);
    }

    fn update_panels(&mut self) {
        let (_, height) = self.canvas.size();
        let margins = self.ctx.trace_margins;
        let channels = self.displayed_channels();
        let every = label_stride(channels.len(), height, self.config.layout.label_row_px);
        let selected = &self.selected;
        let mut panels = build_panels(
            &channels,
            &self.channel_labels,
            |m| selected.contains(&m),
            margins.top,
            height - margins.bottom,
            every,
        );
        for panel in &mut panels {
            if let Some(painter) = self.channel_painters.get(&panel.channel) {
                panel.painter = Arc::clone(painter);
            }
        }
        self.ctx.panels = panels;
        self.ctx.highlight_selected = !self.view_only_selected;
    }

    /// Margins of the layers that depend on the surface size.
    fn place_layers(&mut self) {
        let (width, height) = self.canvas.size();
        let layout = &self.config.layout;
        let margins = self.ctx.trace_margins;
        self.canvas.set_margins(
            self.layers.overview,
            Margins::new(margins.left, margins.right, 0.0, height - layout.overview_height),
        );
        self.canvas.set_margins(
            self.layers.time_axis,
            Margins::new(margins.left, margins.right, height - layout.time_axis_height, 0.0),
        );
        self.canvas
            .set_margins(self.layers.labels, Margins::new(0.0, (width - margins.left).max(0.0), 0.0, 0.0));
    }

    fn refresh_context(&mut self) {
        let range = self.controller.time_range();
        self.ctx.time_range = range;
        self.ctx.current_time = self.controller.current_time();
        self.ctx.downsample_factor = self.controller.downsample_factor();
        self.ctx.amplitude_scale = self.controller.amplitude_scale();

        let time_viewport = Viewport::new(range, Range::new(0.0, 1.0));
        self.canvas.set_viewport(self.layers.time_axis, time_viewport);
        self.canvas.set_viewport(self.layers.main, time_viewport);
        self.canvas.set_viewport(self.layers.cursor, time_viewport);
    }
}

impl Drop for TimeseriesView {
    fn drop(&mut self) {
        let id = self.segment_subscription;
        self.ctx.handle.write(|store| store.remove_segment_set_handler(id));
        if let Some(binding) = self.sync.take() {
            binding.leave();
        }
    }
}

fn paint_overview(ctx: &ViewContext, painter: &mut Painter<'_>) {
    if painter.exporting() {
        return;
    }
    let n = ctx.num_timepoints as f64;
    painter.draw_rect(Space::Data, (0.0, 0.4), (n, 0.6), Some(TRACK_COLOR), None);
    let window = ctx.time_range;
    painter.draw_rect(
        Space::Data,
        (window.min, 0.3),
        (window.max, 0.7),
        Some(Color::GRAY),
        Some(LineStyle::new(Color::BLACK, WINDOW_BORDER)),
    );
    if let Some(drag) = ctx.overview_drag {
        painter.draw_rect(
            Space::Data,
            (drag.min, 0.3),
            (drag.max, 0.7),
            None,
            Some(LineStyle::new(DRAG_COLOR, WINDOW_BORDER)),
        );
    }
}

fn paint_time_axis(ctx: &ViewContext, painter: &mut Painter<'_>) {
    let range = ctx.time_range;
    let axis = LineStyle::new(AXIS_COLOR, 1.0);
    painter.draw_line(Space::Data, (range.min, 1.0), (range.max, 1.0), axis);
    let width = painter.transform().inner().width() as f64;
    let ticks = time_ticks(range, width, ctx.sample_rate);
    for tick in &ticks.ticks {
        painter.draw_line(Space::Data, (tick.time, 1.0), (tick.time, 1.0 - tick.height), axis);
    }
    if let Some(bar) = ticks.scale_bar {
        painter.draw_line(Space::Data, (bar.start, 0.45), (bar.end, 0.45), axis);
        painter.draw_line(Space::Data, (bar.start, 0.45), (bar.start, 0.5), axis);
        painter.draw_line(Space::Data, (bar.end, 0.45), (bar.end, 0.5), axis);
        let style = TextStyle {
            color: AXIS_COLOR,
            align: TextAlign::Center,
            ..TextStyle::default()
        };
        painter.draw_text(Space::Data, ((bar.start + bar.end) * 0.5, 0.2), bar.label, style);
    }
}

/// Paint the frame and the panels in [`paint_order`].
///
/// Live paints stop once the panel budget is spent and record where to pick
/// up in `next_panel`; the frame is drawn only by a paint starting at the
/// first panel. Exports always draw everything and touch no shared state.
fn paint_main(ctx: &ViewContext, painter: &mut Painter<'_>) {
    let exporting = painter.exporting();
    let start = if exporting {
        0
    } else {
        ctx.next_panel.load(Ordering::Relaxed)
    };
    if start == 0 {
        let frame = LineStyle::new(Color::GRAY, 1.0);
        painter.scoped(Viewport::unit(), ctx.trace_margins, |p| {
            p.draw_line(Space::Data, (0.0, 0.0), (0.0, 1.0), frame);
            p.draw_line(Space::Data, (1.0, 0.0), (1.0, 1.0), frame);
            p.draw_line(Space::Data, (0.0, 1.0), (1.0, 1.0), frame);
        });
    }

    let order = paint_order(ctx.panels.len());
    let scale = ctx.layout.scale as f64 * ctx.amplitude_scale;
    let started = Instant::now();
    let mut completeness = TraceCompleteness::Complete;
    let mut next = 0;
    ctx.handle.write(|store| {
        for (k, &index) in order.iter().enumerate().skip(start) {
            let panel = &ctx.panels[index];
            let params = TraceParams {
                time_range: ctx.time_range,
                ds: ctx.downsample_factor,
                offset: ctx.layout.offset(panel.channel),
                scale,
                highlight_selected: ctx.highlight_selected,
            };
            completeness = completeness.and(panel.painter.paint(painter, store, panel, &params));
            if !exporting && k + 1 < order.len() && started.elapsed() >= ctx.panel_budget {
                next = k + 1;
                break;
            }
        }
    });
    if exporting {
        return;
    }
    if next > 0 {
        tracing::trace!(painted = next, total = order.len(), "trace paint out of time");
    }
    ctx.next_panel.store(next, Ordering::Relaxed);
    if completeness == TraceCompleteness::Incomplete {
        ctx.incomplete.store(true, Ordering::Relaxed);
    }
}

fn paint_cursor(ctx: &ViewContext, painter: &mut Painter<'_>) {
    if painter.exporting() {
        return;
    }
    let Some(t) = ctx.current_time.filter(|t| ctx.time_range.contains(*t)) else {
        return;
    };
    painter.draw_line(Space::Data, (t, 0.0), (t, 1.0), LineStyle::new(Color::BLUE, CURSOR_WIDTH));
}

fn paint_labels(ctx: &ViewContext, painter: &mut Painter<'_>) {
    let outer = painter.transform().margins();
    let height = painter.size().1;
    let style = TextStyle {
        align: TextAlign::Right,
        ..TextStyle::default()
    };
    for panel in &ctx.panels {
        let Some(label) = panel.label.as_deref().filter(|l| !l.is_empty()) else {
            continue;
        };
        let margins = panel.margins(outer.left, outer.right, height);
        painter.scoped(Viewport::unit(), margins, |p| {
            p.draw_text(Space::Data, (0.8, 0.5), label, style);
        });
    }
}
