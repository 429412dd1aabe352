//! The single seat: focus stack, keyboard/layer focus, and the mutually-exclusive interactive
//! grab state machine (move, resize, touchpad workspace-scroll with inertia).

use bitflags::bitflags;
use slotmap::SlotMap;

use crate::layer::LayerSurfaceId;
use crate::output::OutputManager;
use crate::surface_manager::{HitTarget, SurfaceManager};
use crate::utils::geometry::Box2;
use crate::window::{ClientId, View, ViewId};

/// Touchpad-swipe scroll gain applied to raw swipe deltas before accumulation.
const SWIPE_SENSITIVITY: f64 = 2.0;
/// Per-tick decay applied to `WorkspaceScroll::speed` until it settles below 1px/tick.
const SWIPE_FRICTION: f64 = 0.9;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResizeEdge: u8 {
        const TOP = 0b0001;
        const BOTTOM = 0b0010;
        const LEFT = 0b0100;
        const RIGHT = 0b1000;
    }
}

/// The seat's current interactive mode. Exactly one of these is active; entering one ends
/// whatever grab was previously running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrabState {
    Idle,
    Move {
        view: ViewId,
        lx: f64,
        ly: f64,
        view_x0: i32,
        view_y0: i32,
    },
    Resize {
        view: ViewId,
        lx: f64,
        ly: f64,
        geometry0: Box2,
        edges: ResizeEdge,
        workspace: usize,
        scroll_x0: i32,
        view_x0: i32,
        view_y0: i32,
    },
    WorkspaceScroll {
        workspace: usize,
        speed: f64,
        delta_since_update: f64,
        scroll_x_f64: f64,
        ready: bool,
        wants_to_stop: bool,
    },
}

impl GrabState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GrabState::Idle)
    }
}

#[derive(Debug)]
pub struct Seat {
    /// Front = most recently focused. Never contains duplicates or unmapped views.
    pub focus_stack: Vec<ViewId>,
    pub focused_view: Option<ViewId>,
    pub focused_layer: Option<LayerSurfaceId>,
    pub exclusive_client: Option<ClientId>,
    pub cursor_x: f64,
    pub cursor_y: f64,
    pub grab: GrabState,
    pub mouse_mods: u32,
}

impl Default for Seat {
    fn default() -> Self {
        Self {
            focus_stack: Vec::new(),
            focused_view: None,
            focused_layer: None,
            exclusive_client: None,
            cursor_x: 0.0,
            cursor_y: 0.0,
            grab: GrabState::Idle,
            mouse_mods: 1 << 6,
        }
    }
}

impl Seat {
    pub fn new(mouse_mods: u32) -> Self {
        Self {
            mouse_mods,
            ..Default::default()
        }
    }

    fn push_focus_stack(&mut self, view: ViewId) {
        self.focus_stack.retain(|v| *v != view);
        self.focus_stack.insert(0, view);
    }

    /// Drops `view` from the focus stack and, if it was focused, clears the current focus.
    /// Idempotent: safe to call on a view that was never tracked.
    pub fn remove_from_focus_stack(&mut self, view: ViewId) {
        self.focus_stack.retain(|v| *v != view);
        if self.focused_view == Some(view) {
            self.focused_view = None;
        }
    }

    /// Attempts to focus `view` (or clears focus on `None`). Denied silently if `view`'s
    /// workspace already has a *different* fullscreen view that `view` is not transient for, or
    /// if an `exclusive_client` is set and `view` does not belong to it. On success, promotes
    /// `view` to the front of the focus stack and SurfaceManager's stacking order, then
    /// `fit_view_on_screen`s its workspace (a no-op for floating views).
    ///
    /// If a layer surface currently holds keyboard focus, that focus is deferred rather than
    /// silently overridden: `focused_layer` is cleared for the duration of the call (so the view
    /// still gets promoted, activated, and fitted on screen) and re-asserted before returning, so
    /// keyboard events keep flowing to the layer while the view becomes visually activated.
    pub fn focus_view(
        &mut self,
        surfaces: &mut SurfaceManager,
        output_manager: &mut OutputManager,
        view: Option<ViewId>,
    ) {
        let deferred_layer = self.focused_layer.take();
        self.focus_view_inner(surfaces, output_manager, view);
        self.focused_layer = deferred_layer;
    }

    fn focus_view_inner(
        &mut self,
        surfaces: &mut SurfaceManager,
        output_manager: &mut OutputManager,
        view: Option<ViewId>,
    ) {
        let Some(view) = view else {
            self.focused_view = None;
            return;
        };

        if let Some(exclusive) = self.exclusive_client {
            if surfaces.views[view].client != Some(exclusive) {
                return;
            }
        }

        if let Some(workspace_idx) = surfaces.views[view].workspace_id {
            if let Some(fullscreen) = output_manager.workspaces[workspace_idx].fullscreen_view {
                if fullscreen != view && !surfaces.views[view].is_transient_for(fullscreen) {
                    return;
                }
            }
        }

        self.push_focus_stack(view);
        surfaces.move_view_to_front(view);
        self.focused_view = Some(view);

        if let Some(workspace_idx) = surfaces.views[view].workspace_id {
            let geometry = surfaces.views[view]
                .output
                .and_then(|o| output_manager.workspace_geometry(o));
            output_manager.workspaces[workspace_idx].fit_view_on_screen(
                &mut surfaces.views,
                view,
                false,
                geometry,
            );
        }
    }

    /// On `None` with a previously focused layer, clears layer focus and re-asserts the current
    /// view's focus so keyboard events resume flowing to it. On a mapped layer, records it as
    /// focused only if `layer.layer >= Layer::Top`; surfaces below that never take keyboard focus.
    pub fn focus_layer(
        &mut self,
        surfaces: &mut SurfaceManager,
        output_manager: &mut OutputManager,
        layer: Option<LayerSurfaceId>,
    ) {
        match layer {
            None => {
                if self.focused_layer.take().is_some() {
                    let view = self.focused_view;
                    self.focus_view(surfaces, output_manager, view);
                }
            }
            Some(id) => {
                let Some(surface) = surfaces.layers.get(id) else {
                    return;
                };
                if !surface.mapped {
                    return;
                }
                if surface.layer >= crate::layer::Layer::Top {
                    self.focused_layer = Some(id);
                }
            }
        }
    }

    /// Pointer-button handler, driven directly by a concrete backend's own input loop the same
    /// way `process_cursor_motion`/`process_swipe_update` are (there is no input backend in this
    /// crate's scope to route through `BackendEvent`). On release, ends whatever interactive grab
    /// is running. On press, focuses the view under the cursor if there is one and it isn't
    /// already focused, then — only if `mods` matches `mouse_mods` exactly — also starts a move
    /// grab on it, the "mod+drag" floating-WM convention.
    pub fn process_button(
        &mut self,
        surfaces: &mut SurfaceManager,
        output_manager: &mut OutputManager,
        mods: u32,
        pressed: bool,
    ) {
        if !pressed {
            self.end_interactive();
            return;
        }

        let Some(HitTarget::View(view)) =
            surfaces.get_surface_under_cursor(output_manager, self.cursor_x as i32, self.cursor_y as i32)
        else {
            return;
        };

        if self.focused_view != Some(view) {
            self.focus_view(surfaces, output_manager, Some(view));
        }

        if mods == self.mouse_mods {
            self.begin_move(surfaces, view);
        }
    }

    pub fn begin_move(&mut self, surfaces: &SurfaceManager, view: ViewId) {
        if self.focused_view != Some(view) {
            return;
        }
        let v = &surfaces.views[view];
        self.grab = GrabState::Move {
            view,
            lx: self.cursor_x,
            ly: self.cursor_y,
            view_x0: v.x,
            view_y0: v.y,
        };
    }

    pub fn begin_resize(
        &mut self,
        surfaces: &SurfaceManager,
        output_manager: &OutputManager,
        view: ViewId,
        edges: ResizeEdge,
    ) {
        let v = &surfaces.views[view];
        let workspace = v.workspace_id.unwrap_or(usize::MAX);
        let scroll_x0 = output_manager
            .workspaces
            .get(workspace)
            .map(|ws| ws.scroll_x)
            .unwrap_or(0);
        self.grab = GrabState::Resize {
            view,
            lx: self.cursor_x,
            ly: self.cursor_y,
            geometry0: v.geometry,
            edges,
            workspace,
            scroll_x0,
            view_x0: v.x,
            view_y0: v.y,
        };
    }

    pub fn begin_workspace_scroll(&mut self, workspace: usize, scroll_x: i32) {
        self.grab = GrabState::WorkspaceScroll {
            workspace,
            speed: 0.0,
            delta_since_update: 0.0,
            scroll_x_f64: scroll_x as f64,
            ready: false,
            wants_to_stop: false,
        };
    }

    /// Updates a `Move`/`Resize` grab from cursor motion to `(lx, ly)`; no-op for other grab
    /// states.
    pub fn process_cursor_motion(
        &mut self,
        surfaces: &mut SurfaceManager,
        output_manager: &mut OutputManager,
        lx: f64,
        ly: f64,
    ) {
        self.cursor_x = lx;
        self.cursor_y = ly;
        match self.grab {
            GrabState::Move {
                view,
                lx: ox,
                ly: oy,
                view_x0,
                view_y0,
            } => {
                let x = view_x0 + (lx - ox) as i32;
                let y = view_y0 + (ly - oy) as i32;
                crate::view_operations::reconfigure_view_position(
                    surfaces,
                    output_manager,
                    self,
                    view,
                    x,
                    y,
                );
            }
            GrabState::Resize {
                view,
                lx: ox,
                ly: oy,
                geometry0,
                edges,
                ..
            } => {
                let dx = (lx - ox) as i32;
                let dy = (ly - oy) as i32;

                let mut x = geometry0.loc.x;
                let mut y = geometry0.loc.y;
                let mut w = geometry0.size.w;
                let mut h = geometry0.size.h;

                if edges.contains(ResizeEdge::RIGHT) {
                    w = (geometry0.size.w + dx).max(1);
                }
                if edges.contains(ResizeEdge::BOTTOM) {
                    h = (geometry0.size.h + dy).max(1);
                }
                if edges.contains(ResizeEdge::LEFT) {
                    w = (geometry0.size.w - dx).max(1);
                    x = geometry0.loc.x + (geometry0.size.w - w);
                }
                if edges.contains(ResizeEdge::TOP) {
                    h = (geometry0.size.h - dy).max(1);
                    y = geometry0.loc.y + (geometry0.size.h - h);
                }

                surfaces.views[view].geometry.loc.x = x;
                surfaces.views[view].geometry.loc.y = y;
                crate::view_operations::reconfigure_view_size(surfaces, output_manager, view, w, h);
            }
            GrabState::Idle | GrabState::WorkspaceScroll { .. } => {}
        }
    }

    /// A 3-finger swipe delta arrived: accumulate it (scaled by [`SWIPE_SENSITIVITY`]) into the
    /// running `WorkspaceScroll` grab. No-op unless that grab is already active.
    pub fn process_swipe_update(&mut self, dx: f64) {
        if let GrabState::WorkspaceScroll {
            delta_since_update,
            ready,
            ..
        } = &mut self.grab
        {
            *delta_since_update += dx * SWIPE_SENSITIVITY;
            *ready = true;
        }
    }

    /// Fingers lifted: the grab keeps running (decelerating) until its speed settles.
    pub fn process_swipe_end(&mut self) {
        if let GrabState::WorkspaceScroll { wants_to_stop, .. } = &mut self.grab {
            *wants_to_stop = true;
        }
    }

    /// One animation-frame tick of an in-progress `WorkspaceScroll` grab: folds the accumulated
    /// delta into `speed`, applies friction, and updates the workspace's `scroll_x`. Ends the grab
    /// once `wants_to_stop` and the residual speed has decayed below 1px.
    pub fn tick_workspace_scroll(
        &mut self,
        views: &mut SlotMap<ViewId, View>,
        output_manager: &mut OutputManager,
    ) {
        let GrabState::WorkspaceScroll {
            workspace,
            speed,
            delta_since_update,
            scroll_x_f64,
            wants_to_stop,
            ..
        } = &mut self.grab
        else {
            return;
        };

        *speed = *delta_since_update;
        *delta_since_update = 0.0;
        *scroll_x_f64 -= *speed;
        *speed *= SWIPE_FRICTION;
        let scroll_x = scroll_x_f64.round() as i32;
        let workspace = *workspace;
        let settled = *wants_to_stop && speed.abs() < 1.0;

        // Resolved before indexing into `output_manager.workspaces` mutably: the `ws.output` lookup
        // needs an immutable borrow of all of `output_manager`, which a live `&mut` into
        // `output_manager.workspaces` would block.
        let output = output_manager.workspaces.get(workspace).and_then(|ws| ws.output);
        let geometry = output.and_then(|o| output_manager.workspace_geometry(o));
        if let Some(ws) = output_manager.workspaces.get_mut(workspace) {
            ws.scroll_x = scroll_x;
            ws.arrange_workspace(views, geometry, None);
        }

        if settled {
            self.grab = GrabState::Idle;
        }
    }

    /// Ends whatever grab is active, returning to `Idle`.
    pub fn end_interactive(&mut self) {
        self.grab = GrabState::Idle;
    }

    /// Called on view destruction: if `view` was the grab subject, ends the grab.
    pub fn on_view_destroyed(&mut self, view: ViewId) {
        let is_subject = match self.grab {
            GrabState::Move { view: v, .. } => v == view,
            GrabState::Resize { view: v, .. } => v == view,
            GrabState::WorkspaceScroll { .. } | GrabState::Idle => false,
        };
        if is_subject {
            self.end_interactive();
        }
        self.remove_from_focus_stack(view);
    }
}
