//! traceview is the core of a multi-channel timeseries viewer.
//!
//! Signals too large to hold in memory are read through a segment cache
//! that fetches min/max downsampled blocks on demand, while the view keeps
//! panning, zooming and cursor placement responsive. Rendering goes through
//! backend-agnostic render lists; the `gpui` feature adds a GPUI view.

#![forbid(unsafe_code)]

pub mod axis;
pub mod canvas;
pub mod config;
pub mod error;
pub mod events;
pub mod geom;
pub mod gesture;
pub mod link;
pub mod panel;
pub mod signal;
pub mod timeaxis;
pub mod transform;
pub mod view;
pub mod widget;

#[cfg(feature = "gpui")]
pub mod gpui_backend;

pub use axis::{ScaleBar, Tick, TimeTicks, time_ticks};
pub use canvas::{
    Color, LayerId, LayeredCanvas, LineStyle, Painter, PainterPath, RenderCommand, RenderList,
    RepaintDecision, RepaintScheduler, Space, TextAlign, TextStyle,
};
pub use config::{
    GestureConfig, LayoutConfig, NavigationConfig, RepaintConfig, SegmentConfig, TraceviewConfig,
};
pub use error::{ConfigError, DescriptorError, PayloadError, SegmentError};
pub use events::{SubscriptionId, Subscribers};
pub use geom::{Margins, Point, ScreenPoint, ScreenRect};
pub use gesture::{DragInfo, GestureEvent, GestureState, MouseGestureTracker};
pub use link::{TimeSyncGroup, TimeSyncMemberId, TimeSyncOptions};
pub use panel::{ChannelPanelRenderer, Panel, PanelPaint, TraceCompleteness, TraceParams};
pub use signal::{
    ChannelDataOptions, ChannelLayout, MultiscaleSource, SegmentKey, SegmentRequest, SegmentSet,
    SegmentStatus, SegmentedSignalStore, SignalDescriptor, SignalHandle,
};
pub use timeaxis::{TimeAction, TimeAxisController, ViewEvent, ViewUpdate};
pub use transform::Transform;
pub use view::{Range, Viewport};
pub use widget::{KeyHandler, TimeseriesView, ViewLayers};
