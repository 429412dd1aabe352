//! Layer-shell surface geometry: anchors, margins, exclusive zones, and the two-pass arrangement
//! algorithm that reshapes each output's usable area.

use bitflags::bitflags;
use slotmap::{new_key_type, SlotMap};

use crate::output::{OutputId, OutputManager};
use crate::utils::geometry::{Box2, Point, Size};

new_key_type! {
    pub struct LayerSurfaceId;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Anchor: u8 {
        const TOP = 0b0001;
        const BOTTOM = 0b0010;
        const LEFT = 0b0100;
        const RIGHT = 0b1000;
    }
}

/// The four layer-shell layers, ordered back to front. [`Layer::paint_order`] gives this same
/// order for rendering; arrangement always walks it front-to-back (`OVERLAY` first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    Background,
    Bottom,
    Top,
    Overlay,
}

impl Layer {
    /// Front-to-back order used by both exclusive-zone and placement passes.
    pub const ARRANGE_ORDER: [Layer; 4] =
        [Layer::Overlay, Layer::Top, Layer::Bottom, Layer::Background];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Margin {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
}

#[derive(Debug, Clone)]
pub struct LayerSurface {
    pub output: OutputId,
    pub layer: Layer,
    pub anchor: Anchor,
    pub margin: Margin,
    /// `-1` means "ignore for usable-area purposes, but still don't overlap clipped content";
    /// `0` means no exclusive zone; positive values shrink `usable_area`.
    pub exclusive_zone: i32,
    /// Client-requested size; a `0` component means "let the anchors decide".
    pub desired_size: Size<i32, smithay::utils::Logical>,
    pub geometry: Box2,
    pub mapped: bool,
    pub keyboard_interactive: bool,
}

impl LayerSurface {
    pub fn new(output: OutputId, layer: Layer) -> Self {
        Self {
            output,
            layer,
            anchor: Anchor::empty(),
            margin: Margin::default(),
            exclusive_zone: 0,
            desired_size: Size::from((0, 0)),
            geometry: Box2::from_loc_and_size((0, 0), (0, 0)),
            mapped: false,
            keyboard_interactive: false,
        }
    }
}

/// Shrinks `usable_area` by this surface's exclusive zone, if anchored such that a single edge is
/// unambiguous: the surface must span the perpendicular axis (anchored to both edges
/// perpendicular to the one being shrunk) and additionally be anchored to the edge itself.
fn apply_exclusive_zone(usable_area: &mut Box2, surface: &LayerSurface) {
    if surface.exclusive_zone <= 0 {
        return;
    }
    let a = surface.anchor;
    let amount = surface.exclusive_zone;

    if a.contains(Anchor::LEFT | Anchor::RIGHT | Anchor::TOP) && !a.contains(Anchor::BOTTOM) {
        let shrink = amount + surface.margin.top;
        usable_area.loc.y += shrink;
        usable_area.size.h -= shrink;
    } else if a.contains(Anchor::LEFT | Anchor::RIGHT | Anchor::BOTTOM) && !a.contains(Anchor::TOP)
    {
        usable_area.size.h -= amount + surface.margin.bottom;
    } else if a.contains(Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT) && !a.contains(Anchor::RIGHT)
    {
        let shrink = amount + surface.margin.left;
        usable_area.loc.x += shrink;
        usable_area.size.w -= shrink;
    } else if a.contains(Anchor::TOP | Anchor::BOTTOM | Anchor::RIGHT) && !a.contains(Anchor::LEFT)
    {
        usable_area.size.w -= amount + surface.margin.right;
    }
}

/// Computes this surface's box for the non-exclusive placement pass. Returns `None` if either
/// resulting dimension is negative, meaning the surface should be closed.
fn compute_box(bounds: Box2, surface: &LayerSurface) -> Option<Box2> {
    let a = surface.anchor;
    let m = surface.margin;

    let width = if a.contains(Anchor::LEFT | Anchor::RIGHT) && surface.desired_size.w == 0 {
        bounds.size.w - m.left - m.right
    } else {
        surface.desired_size.w
    };
    let height = if a.contains(Anchor::TOP | Anchor::BOTTOM) && surface.desired_size.h == 0 {
        bounds.size.h - m.top - m.bottom
    } else {
        surface.desired_size.h
    };

    if width < 0 || height < 0 {
        return None;
    }

    let x = if a.contains(Anchor::LEFT | Anchor::RIGHT) {
        bounds.loc.x + m.left
    } else if a.contains(Anchor::LEFT) {
        bounds.loc.x + m.left
    } else if a.contains(Anchor::RIGHT) {
        bounds.loc.x + bounds.size.w - width - m.right
    } else {
        bounds.loc.x + (bounds.size.w - width) / 2
    };

    let y = if a.contains(Anchor::TOP | Anchor::BOTTOM) {
        bounds.loc.y + m.top
    } else if a.contains(Anchor::TOP) {
        bounds.loc.y + m.top
    } else if a.contains(Anchor::BOTTOM) {
        bounds.loc.y + bounds.size.h - height - m.bottom
    } else {
        bounds.loc.y + (bounds.size.h - height) / 2
    };

    Some(Box2::from_loc_and_size(Point::from((x, y)), (width, height)))
}

/// Owns every [`LayerSurface`], across every output.
#[derive(Debug, Default)]
pub struct LayerEngine {
    layers: SlotMap<LayerSurfaceId, LayerSurface>,
}

impl LayerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, surface: LayerSurface) -> LayerSurfaceId {
        self.layers.insert(surface)
    }

    pub fn remove(&mut self, id: LayerSurfaceId) -> Option<LayerSurface> {
        self.layers.remove(id)
    }

    pub fn get(&self, id: LayerSurfaceId) -> Option<&LayerSurface> {
        self.layers.get(id)
    }

    pub fn get_mut(&mut self, id: LayerSurfaceId) -> Option<&mut LayerSurface> {
        self.layers.get_mut(id)
    }

    fn on_output(&self, output: OutputId) -> impl Iterator<Item = (LayerSurfaceId, &LayerSurface)> {
        self.layers
            .iter()
            .filter(move |(_, surface)| surface.output == output)
    }

    /// Surfaces on `output` in a given layer, in insertion order.
    pub fn layer_surfaces(
        &self,
        output: OutputId,
        layer: Layer,
    ) -> impl Iterator<Item = (LayerSurfaceId, &LayerSurface)> {
        self.on_output(output).filter(move |(_, s)| s.layer == layer)
    }

    /// Re-arranges every layer surface on `output`. Returns `(usable_area_changed, closed)`:
    /// `closed` lists surfaces whose negative computed box means they must be closed by the
    /// caller (layer-shell protocol violation on the client's part).
    pub fn arrange(&mut self, output_manager: &OutputManager, output: OutputId) -> (bool, Vec<LayerSurfaceId>) {
        let Some(output_box) = output_manager.output_box(output) else {
            return (false, Vec::new());
        };
        let previous_usable_area = output_manager
            .get(output)
            .map(|o| o.usable_area)
            .unwrap_or(Box2::from_loc_and_size((0, 0), output_box.size));

        let mut usable_area = Box2::from_loc_and_size((0, 0), output_box.size);

        // Pass 1: exclusive zones, top layer first.
        for layer in Layer::ARRANGE_ORDER {
            let ids: Vec<LayerSurfaceId> = self
                .layer_surfaces(output, layer)
                .map(|(id, _)| id)
                .collect();
            for id in ids {
                let surface = &self.layers[id];
                apply_exclusive_zone(&mut usable_area, surface);
            }
        }

        // Pass 2: placement within the final usable area (or full output for exclusive_zone=-1).
        let mut closed = Vec::new();
        for layer in Layer::ARRANGE_ORDER {
            let ids: Vec<LayerSurfaceId> = self
                .layer_surfaces(output, layer)
                .map(|(id, _)| id)
                .collect();
            for id in ids {
                let surface = &self.layers[id];
                let bounds = if surface.exclusive_zone == -1 {
                    Box2::from_loc_and_size((0, 0), output_box.size)
                } else {
                    usable_area
                };
                match compute_box(bounds, surface) {
                    Some(geometry) => {
                        self.layers[id].geometry = Box2::from_loc_and_size(
                            geometry.loc + output_box.loc,
                            geometry.size,
                        );
                    }
                    None => closed.push(id),
                }
            }
        }

        (usable_area != previous_usable_area, closed)
    }

    /// The topmost mapped {OVERLAY, TOP} surface across all outputs requesting keyboard
    /// interactivity, if any. Used to decide whether a layer surface should steal keyboard focus.
    pub fn topmost_keyboard_interactive(&self) -> Option<LayerSurfaceId> {
        for layer in [Layer::Overlay, Layer::Top] {
            if let Some((id, _)) = self
                .layers
                .iter()
                .filter(|(_, s)| s.layer == layer && s.mapped && s.keyboard_interactive)
                .last()
            {
                return Some(id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_manager_with_one_output() -> (OutputManager, OutputId) {
        use slotmap::SlotMap;
        let mut views = SlotMap::with_key();
        let mut manager = OutputManager::new();
        let id = manager.register_output(&mut views, Size::from((1920, 1080)));
        (manager, id)
    }

    #[test]
    fn exclusive_top_bar_shrinks_usable_area_from_the_top() {
        let (manager, output) = output_manager_with_one_output();
        let mut engine = LayerEngine::new();
        let mut bar = LayerSurface::new(output, Layer::Top);
        bar.anchor = Anchor::TOP | Anchor::LEFT | Anchor::RIGHT;
        bar.exclusive_zone = 32;
        bar.desired_size = Size::from((0, 32));
        engine.insert(bar);

        let (changed, closed) = engine.arrange(&manager, output);
        assert!(changed);
        assert!(closed.is_empty());
    }

    #[test]
    fn zone_is_not_shrunk_when_not_anchored_to_perpendicular_edges() {
        let (manager, output) = output_manager_with_one_output();
        let mut engine = LayerEngine::new();
        let mut bar = LayerSurface::new(output, Layer::Top);
        // Anchored only to TOP, not also LEFT+RIGHT: ambiguous, must not shrink.
        bar.anchor = Anchor::TOP;
        bar.exclusive_zone = 32;
        bar.desired_size = Size::from((400, 32));
        let id = engine.insert(bar);

        engine.arrange(&manager, output);
        let geometry = engine.get(id).unwrap().geometry;
        assert_eq!(geometry.size, (400, 32).into());
    }

    #[test]
    fn stretched_surface_fills_usable_width() {
        let (manager, output) = output_manager_with_one_output();
        let mut engine = LayerEngine::new();
        let mut bg = LayerSurface::new(output, Layer::Background);
        bg.anchor = Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT;
        let id = engine.insert(bg);

        engine.arrange(&manager, output);
        let geometry = engine.get(id).unwrap().geometry;
        assert_eq!(geometry.size, (1920, 1080).into());
    }

    #[test]
    fn negative_computed_box_is_reported_for_closing() {
        let (manager, output) = output_manager_with_one_output();
        let mut engine = LayerEngine::new();
        let mut panel = LayerSurface::new(output, Layer::Top);
        panel.anchor = Anchor::LEFT | Anchor::RIGHT;
        panel.margin.left = 5000; // larger than the output, forcing a negative width
        engine.insert(panel);

        let (_, closed) = engine.arrange(&manager, output);
        assert_eq!(closed.len(), 1);
    }

    #[test]
    fn topmost_keyboard_interactive_prefers_overlay_over_top() {
        let (_, output) = output_manager_with_one_output();
        let mut engine = LayerEngine::new();
        let mut top = LayerSurface::new(output, Layer::Top);
        top.mapped = true;
        top.keyboard_interactive = true;
        engine.insert(top);

        let mut overlay = LayerSurface::new(output, Layer::Overlay);
        overlay.mapped = true;
        overlay.keyboard_interactive = true;
        let overlay_id = engine.insert(overlay);

        assert_eq!(engine.topmost_keyboard_interactive(), Some(overlay_id));
    }
}
