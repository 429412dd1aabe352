//! Owns every [`View`] and [`LayerSurface`], the front-to-back view stacking order, and the
//! cursor hit-testing pipeline that walks both across it.

use slotmap::SlotMap;

use crate::layer::{Layer, LayerSurfaceId};
use crate::output::OutputManager;
use crate::window::{ShellKind, View, ViewId};

pub use crate::layer::LayerEngine;

/// What [`SurfaceManager::get_surface_under_cursor`] found under a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Layer(LayerSurfaceId),
    View(ViewId),
}

/// Views plus layer surfaces, plus the stacking order (front = topmost) that a compositor
/// consults both for focus-follows-click and for deciding which surface owns a given pixel.
#[derive(Debug, Default)]
pub struct SurfaceManager {
    pub views: SlotMap<ViewId, View>,
    pub layers: LayerEngine,
    /// Front = topmost. Only ever contains keys also present in `views`.
    view_order: Vec<ViewId>,
}

impl SurfaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly created (not yet mapped) view at the back of the stacking order.
    pub fn insert_view(&mut self, shell: ShellKind, geometry: crate::utils::geometry::Box2) -> ViewId {
        let id = self.views.insert(View::new(shell, geometry));
        self.view_order.push(id);
        id
    }

    /// Removes `view` from every bookkeeping list. Callers are responsible for having already
    /// unmapped it from its workspace and the seat's focus stack.
    pub fn destroy_view(&mut self, view: ViewId) -> Option<View> {
        self.view_order.retain(|v| *v != view);
        self.views.remove(view)
    }

    pub fn move_view_to_front(&mut self, view: ViewId) {
        if let Some(idx) = self.view_order.iter().position(|v| *v == view) {
            let id = self.view_order.remove(idx);
            self.view_order.insert(0, id);
        }
    }

    /// Views in current stacking order, front (topmost) first.
    pub fn view_order(&self) -> &[ViewId] {
        &self.view_order
    }

    /// Hit-tests `(lx, ly)` (global coordinates) per the layered search order: overlay layer
    /// surfaces, then top layer surfaces (skipped if the workspace under the cursor has an active
    /// fullscreen view), then the fullscreen view itself, then floating views front-to-back, then
    /// tiled views column by column, then bottom/background layer surfaces. The first surface
    /// whose box contains the point wins.
    pub fn get_surface_under_cursor(
        &self,
        output_manager: &OutputManager,
        lx: i32,
        ly: i32,
    ) -> Option<HitTarget> {
        let output = output_manager.output_at(lx, ly)?;
        let workspace = output_manager
            .workspaces
            .iter()
            .find(|ws| ws.output == Some(output));

        let contains = |box2: crate::utils::geometry::Box2| box2.contains((lx, ly));

        if let Some((id, _)) = self
            .layers
            .layer_surfaces(output, Layer::Overlay)
            .find(|(_, s)| s.mapped && contains(s.geometry))
        {
            return Some(HitTarget::Layer(id));
        }

        let has_fullscreen = workspace.is_some_and(|ws| ws.fullscreen_view.is_some());
        if !has_fullscreen {
            if let Some((id, _)) = self
                .layers
                .layer_surfaces(output, Layer::Top)
                .find(|(_, s)| s.mapped && contains(s.geometry))
            {
                return Some(HitTarget::Layer(id));
            }
        }

        if let Some(ws) = workspace {
            if let Some(view) = ws.fullscreen_view {
                if self.views[view].mapped && contains(self.views[view].box_in_global()) {
                    return Some(HitTarget::View(view));
                }
            }

            for &view in &ws.floating_views {
                if self.views[view].mapped && contains(self.views[view].box_in_global()) {
                    return Some(HitTarget::View(view));
                }
            }

            for column in &ws.columns {
                for tile in &column.tiles {
                    let view = &self.views[tile.view];
                    if view.mapped && contains(view.box_in_global()) {
                        return Some(HitTarget::View(tile.view));
                    }
                }
            }
        }

        for layer in [Layer::Bottom, Layer::Background] {
            if let Some((id, _)) = self
                .layers
                .layer_surfaces(output, layer)
                .find(|(_, s)| s.mapped && contains(s.geometry))
            {
                return Some(HitTarget::Layer(id));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::geometry::{Box2, Size};
    use crate::window::ShellKind;

    fn manager_with_output() -> (SurfaceManager, OutputManager, crate::output::OutputId) {
        let mut surfaces = SurfaceManager::new();
        let mut output_manager = OutputManager::new();
        let output = output_manager.register_output(&mut surfaces.views, Size::from((800, 600)));
        (surfaces, output_manager, output)
    }

    #[test]
    fn hit_test_finds_a_mapped_tiled_view() {
        let (mut surfaces, mut output_manager, output) = manager_with_output();
        let view = surfaces.insert_view(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (300, 600)));
        surfaces.views[view].mapped = true;
        let geom = output_manager.workspace_geometry(output);
        output_manager.workspaces[0].add_view(&mut surfaces.views, view, None, false, false, geom);

        let hit = surfaces.get_surface_under_cursor(&output_manager, 10, 10);
        assert_eq!(hit, Some(HitTarget::View(view)));
    }

    #[test]
    fn overlay_layer_wins_over_tiled_views() {
        let (mut surfaces, mut output_manager, output) = manager_with_output();
        let view = surfaces.insert_view(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (300, 600)));
        surfaces.views[view].mapped = true;
        let geom = output_manager.workspace_geometry(output);
        output_manager.workspaces[0].add_view(&mut surfaces.views, view, None, false, false, geom);

        let mut overlay = crate::layer::LayerSurface::new(output, Layer::Overlay);
        overlay.mapped = true;
        overlay.geometry = Box2::from_loc_and_size((0, 0), (800, 600));
        let layer_id = surfaces.layers.insert(overlay);

        let hit = surfaces.get_surface_under_cursor(&output_manager, 10, 10);
        assert_eq!(hit, Some(HitTarget::Layer(layer_id)));
    }

    #[test]
    fn top_layer_is_skipped_when_workspace_is_fullscreen() {
        let (mut surfaces, mut output_manager, output) = manager_with_output();
        let view = surfaces.insert_view(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (300, 600)));
        surfaces.views[view].mapped = true;
        let geom = output_manager.workspace_geometry(output);
        output_manager.workspaces[0].add_view(&mut surfaces.views, view, None, false, false, geom);
        output_manager.workspaces[0].set_fullscreen_view(&mut surfaces.views, Some(view), geom);

        let mut top = crate::layer::LayerSurface::new(output, Layer::Top);
        top.mapped = true;
        top.geometry = Box2::from_loc_and_size((0, 0), (800, 600));
        surfaces.layers.insert(top);

        let hit = surfaces.get_surface_under_cursor(&output_manager, 10, 10);
        assert_eq!(hit, Some(HitTarget::View(view)));
    }

    #[test]
    fn move_view_to_front_reorders_the_stacking_list() {
        let mut surfaces = SurfaceManager::new();
        let a = surfaces.insert_view(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (10, 10)));
        let b = surfaces.insert_view(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (10, 10)));
        surfaces.move_view_to_front(b);
        assert_eq!(surfaces.view_order(), &[b, a]);
    }
}
