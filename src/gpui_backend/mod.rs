//! GPUI integration for traceview.
//!
//! This module provides a GPUI view that replays the render lists of a
//! [`TimeseriesView`](crate::widget::TimeseriesView) and forwards mouse,
//! scroll and key input to it.

mod paint;
mod view;

pub use view::{GpuiTimeseriesView, TimeseriesHandle};
