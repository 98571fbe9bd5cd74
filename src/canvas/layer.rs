use crate::geom::Margins;
use crate::transform::Transform;
use crate::view::Viewport;

use super::{Painter, RenderList};

/// Paint callback of a layer, invoked with the host context.
pub type PaintFn<C> = Box<dyn Fn(&C, &mut Painter<'_>) + Send + Sync>;

/// Index of a layer inside a [`LayeredCanvas`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub(crate) usize);

impl LayerId {
    /// Position in paint order.
    pub fn index(self) -> usize {
        self.0
    }
}

struct Layer<C> {
    name: &'static str,
    margins: Margins,
    viewport: Viewport,
    list: RenderList,
    paint: PaintFn<C>,
}

/// Ordered stack of independently repainted layers sharing one pixel size.
///
/// Each layer keeps the render list of its last paint, so repainting one
/// layer leaves the others untouched.
pub struct LayeredCanvas<C> {
    size: (f32, f32),
    layers: Vec<Layer<C>>,
}

impl<C> LayeredCanvas<C> {
    /// Create an empty canvas.
    pub fn new(size: (f32, f32)) -> Self {
        Self {
            size,
            layers: Vec::new(),
        }
    }

    /// Append a layer on top of the existing ones.
    pub fn add_layer(
        &mut self,
        name: &'static str,
        margins: Margins,
        viewport: Viewport,
        paint: impl Fn(&C, &mut Painter<'_>) + Send + Sync + 'static,
    ) -> LayerId {
        self.layers.push(Layer {
            name,
            margins,
            viewport,
            list: RenderList::new(),
            paint: Box::new(paint),
        });
        LayerId(self.layers.len() - 1)
    }

    /// Surface size in pixels.
    pub fn size(&self) -> (f32, f32) {
        self.size
    }

    /// Resize the surface. Layers must be repainted afterwards.
    pub fn set_size(&mut self, size: (f32, f32)) {
        self.size = size;
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// All layer ids in paint order.
    pub fn layer_ids(&self) -> impl Iterator<Item = LayerId> + use<C> {
        (0..self.layers.len()).map(LayerId)
    }

    /// Name given at creation.
    pub fn name(&self, id: LayerId) -> Option<&'static str> {
        self.layers.get(id.0).map(|layer| layer.name)
    }

    /// Replace a layer's margins.
    pub fn set_margins(&mut self, id: LayerId, margins: Margins) {
        if let Some(layer) = self.layers.get_mut(id.0) {
            layer.margins = margins;
        }
    }

    /// Replace a layer's default data ranges.
    pub fn set_viewport(&mut self, id: LayerId, viewport: Viewport) {
        if let Some(layer) = self.layers.get_mut(id.0) {
            layer.viewport = viewport;
        }
    }

    /// Transform a layer currently paints with.
    pub fn transform(&self, id: LayerId) -> Option<Transform> {
        let layer = self.layers.get(id.0)?;
        Transform::new(layer.viewport, self.size, layer.margins)
    }

    /// Render list of a layer's last paint.
    pub fn render_list(&self, id: LayerId) -> Option<&RenderList> {
        self.layers.get(id.0).map(|layer| &layer.list)
    }

    /// Render lists in paint order.
    pub fn render_lists(&self) -> impl Iterator<Item = &RenderList> {
        self.layers.iter().map(|layer| &layer.list)
    }

    /// Clear and re-record one layer.
    ///
    /// Returns false when the layer is unknown or its transform is
    /// degenerate; the layer is left empty in the latter case.
    pub fn repaint(&mut self, id: LayerId, ctx: &C) -> bool {
        let size = self.size;
        let Some(layer) = self.layers.get_mut(id.0) else {
            return false;
        };
        layer.list.clear();
        let Some(transform) = Transform::new(layer.viewport, size, layer.margins) else {
            tracing::trace!(layer = layer.name, "skipping paint of degenerate layer");
            return false;
        };
        let mut painter = Painter::new(&mut layer.list, transform);
        (layer.paint)(ctx, &mut painter);
        true
    }

    /// Invoke a layer's paint callback again without clearing its list.
    ///
    /// Used to finish a paint that stopped early; the callback decides where
    /// to pick up from its context.
    pub fn resume(&mut self, id: LayerId, ctx: &C) -> bool {
        let size = self.size;
        let Some(layer) = self.layers.get_mut(id.0) else {
            return false;
        };
        let Some(transform) = Transform::new(layer.viewport, size, layer.margins) else {
            return false;
        };
        let mut painter = Painter::new(&mut layer.list, transform);
        (layer.paint)(ctx, &mut painter);
        true
    }

    /// Repaint every layer in order.
    pub fn repaint_all(&mut self, ctx: &C) {
        for index in 0..self.layers.len() {
            self.repaint(LayerId(index), ctx);
        }
    }

    /// Paint every layer into a fresh list flagged as an export.
    ///
    /// Live render lists are not touched.
    pub fn export(&self, ctx: &C) -> RenderList {
        let mut out = RenderList::for_export();
        for layer in &self.layers {
            let Some(transform) = Transform::new(layer.viewport, self.size, layer.margins) else {
                continue;
            };
            let mut painter = Painter::new(&mut out, transform);
            (layer.paint)(ctx, &mut painter);
        }
        out
    }
}

impl<C> std::fmt::Debug for LayeredCanvas<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredCanvas")
            .field("size", &self.size)
            .field(
                "layers",
                &self.layers.iter().map(|layer| layer.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
