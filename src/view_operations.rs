//! Higher-level view actions that need both a view's own state and its place in the output/
//! workspace/seat graph: moving it between workspaces, repositioning and resizing it in response
//! to drags, and scrolling a workspace's viewport.

use slotmap::SlotMap;

use crate::output::OutputManager;
use crate::seat::Seat;
use crate::surface_manager::SurfaceManager;
use crate::window::{View, ViewId};

/// Sets a workspace's `scroll_x` to an exact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteScroll(pub i32);

/// Adjusts a workspace's `scroll_x` by a signed delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeScroll(pub i32);

/// Resolves a scroll request against a workspace's current `scroll_x`. Implemented only for
/// [`AbsoluteScroll`] and [`RelativeScroll`] so callers can't accidentally pass a bare `i32` and
/// leave it ambiguous which semantics they meant.
pub trait ScrollDelta {
    fn resolve(self, current: i32) -> i32;
}

impl ScrollDelta for AbsoluteScroll {
    fn resolve(self, _current: i32) -> i32 {
        self.0
    }
}

impl ScrollDelta for RelativeScroll {
    fn resolve(self, current: i32) -> i32 {
        current + self.0
    }
}

/// Applies `delta` to `workspace_idx`'s `scroll_x` and re-arranges it.
pub fn scroll_workspace<S: ScrollDelta>(
    views: &mut SlotMap<ViewId, View>,
    output_manager: &mut OutputManager,
    workspace_idx: usize,
    delta: S,
) {
    let output = output_manager
        .workspaces
        .get(workspace_idx)
        .and_then(|ws| ws.output);
    let geometry = output.and_then(|o| output_manager.workspace_geometry(o));

    if let Some(ws) = output_manager.workspaces.get_mut(workspace_idx) {
        ws.scroll_x = delta.resolve(ws.scroll_x);
        ws.arrange_workspace(views, geometry, None);
    }
}

/// Moves `view` to `new_workspace`, carrying over its fullscreen state and, for a floating view
/// crossing to a different output, re-centering it on the new output's usable area. Does not
/// follow `view` with focus: instead it refocuses whichever view was most recently focused among
/// those still left in the old workspace, or clears focus if none remain.
pub fn change_view_workspace(
    surfaces: &mut SurfaceManager,
    output_manager: &mut OutputManager,
    seat: &mut Seat,
    view: ViewId,
    new_workspace: usize,
) {
    let Some(old_workspace) = surfaces.views[view].workspace_id else {
        return;
    };
    if old_workspace == new_workspace {
        return;
    }

    let was_fullscreen = output_manager
        .workspaces
        .get(old_workspace)
        .is_some_and(|ws| ws.fullscreen_view == Some(view));
    let was_floating = output_manager
        .workspaces
        .get(old_workspace)
        .is_some_and(|ws| ws.is_view_floating(view));

    let old_output = output_manager.workspaces.get(old_workspace).and_then(|ws| ws.output);
    let new_output = output_manager.workspaces.get(new_workspace).and_then(|ws| ws.output);
    let old_geometry = old_output.and_then(|o| output_manager.workspace_geometry(o));
    let new_geometry = new_output.and_then(|o| output_manager.workspace_geometry(o));

    if was_floating && old_output != new_output {
        if let Some((new_box, new_usable)) = new_geometry {
            let w = surfaces.views[view].geometry.size.w;
            let h = surfaces.views[view].geometry.size.h;
            let x = new_box.loc.x + new_usable.loc.x + (new_usable.size.w - w) / 2;
            let y = new_box.loc.y + new_usable.loc.y + (new_usable.size.h - h) / 2;
            surfaces.views[view].move_to(x, y);
        }
    }

    if let Some(ws) = output_manager.workspaces.get_mut(old_workspace) {
        ws.remove_view(&mut surfaces.views, view, true, old_geometry);
    }
    if let Some(ws) = output_manager.workspaces.get_mut(new_workspace) {
        ws.add_view(&mut surfaces.views, view, None, was_floating, true, new_geometry);
        if was_fullscreen {
            ws.set_fullscreen_view(&mut surfaces.views, Some(view), new_geometry);
        }
    }

    surfaces.views[view].workspace_id = Some(new_workspace);
    surfaces.views[view].output = new_output;

    let next_focus = seat
        .focus_stack
        .iter()
        .find(|&&v| v != view && surfaces.views.get(v).is_some_and(|vs| vs.workspace_id == Some(old_workspace)))
        .copied();
    seat.focus_view(surfaces, output_manager, next_focus);
}

/// Repositions `view` to `(x, y)`. A tiled view can't move independently of its column, so the
/// attempted delta is instead folded into a [`RelativeScroll`] of its workspace; a floating view
/// is moved directly and migrated to whichever output it ends up over.
pub fn reconfigure_view_position(
    surfaces: &mut SurfaceManager,
    output_manager: &mut OutputManager,
    seat: &mut Seat,
    view: ViewId,
    x: i32,
    y: i32,
) {
    let Some(workspace_idx) = surfaces.views[view].workspace_id else {
        surfaces.views[view].move_to(x, y);
        return;
    };

    let is_floating = output_manager
        .workspaces
        .get(workspace_idx)
        .is_some_and(|ws| ws.is_view_floating(view));

    if is_floating {
        surfaces.views[view].move_to(x, y);

        let new_output = output_manager.output_at(x, y);
        if new_output.is_some() && new_output != surfaces.views[view].output {
            let new_workspace = new_output.and_then(|o| {
                output_manager.workspaces.iter().position(|ws| ws.output == Some(o))
            });
            if let Some(new_workspace) = new_workspace {
                change_view_workspace(surfaces, output_manager, seat, view, new_workspace);
            }
        }
    } else {
        let dx = surfaces.views[view].x - x;
        scroll_workspace(&mut surfaces.views, output_manager, workspace_idx, RelativeScroll(dx));
    }
}

/// Resizes `view` to `(w, h)`. A floating view is resized directly. A tiled view's height is
/// dictated by its column's layout, so only its width changes, and it is applied to every
/// mapped-normal tile sharing its column (they share a width by construction).
pub fn reconfigure_view_size(
    surfaces: &mut SurfaceManager,
    output_manager: &mut OutputManager,
    view: ViewId,
    w: i32,
    h: i32,
) {
    let Some(workspace_idx) = surfaces.views[view].workspace_id else {
        surfaces.views[view].resize(w, h);
        return;
    };

    let Some(ws) = output_manager.workspaces.get(workspace_idx) else {
        surfaces.views[view].resize(w, h);
        return;
    };

    if ws.is_view_floating(view) {
        surfaces.views[view].resize(w, h);
        return;
    }

    let Some(column_idx) = ws.find_column(view) else {
        return;
    };
    let tile_views: Vec<ViewId> = ws.columns[column_idx]
        .tiles
        .iter()
        .map(|t| t.view)
        .filter(|v| surfaces.views[*v].is_mapped_and_normal())
        .collect();
    let geometry = ws.output.and_then(|o| output_manager.workspace_geometry(o));

    for v in tile_views {
        let height = surfaces.views[v].geometry.size.h;
        surfaces.views[v].resize(w, height);
    }

    if let Some(ws) = output_manager.workspaces.get_mut(workspace_idx) {
        ws.arrange_workspace(&mut surfaces.views, geometry, None);
    }
}
