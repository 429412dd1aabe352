//! The view: a mapped top-level client window, independent of which shell protocol produced it.
//!
//! A view's actual surface is owned by the backend/shell plumbing on the other side of
//! [`crate::backend::Backend`]; what lives here is purely the bookkeeping the tiling engine needs
//! to compute layout and forward configure/close requests.

use slotmap::new_key_type;

use crate::utils::geometry::Box2;

new_key_type! {
    /// Stable handle to a [`View`]. Dangles past `destroy`; callers that hold one across a yield
    /// point must re-check with [`crate::surface_manager::SurfaceManager::get`].
    pub struct ViewId;
}

/// Which shell protocol produced this view. Both variants are otherwise handled identically by
/// the tiling engine; the distinction only matters to the backend when it actually configures the
/// client surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    XdgToplevel,
    XwaylandRegular,
}

/// Saved geometry to restore a view to when it un-fullscreens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedState {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Tracks whether a view is in its ordinary tiled/floating geometry, mid-recovery from a
/// fullscreen exit (waiting for the client to ack the restored size), or fullscreened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpansionState {
    #[default]
    Normal,
    Recovering,
    Fullscreen,
}

/// Predefined width ratios `CycleWidth` steps through, relative to the output's width.
const WIDTH_RATIOS: &[f64] = &[1.0 / 3.0, 1.0 / 2.0, 2.0 / 3.0];

#[derive(Debug, Clone)]
pub struct View {
    pub shell: ShellKind,
    /// Inner content box within the view's surface (excludes shadows/csd decorations the client
    /// may draw outside its logical content area).
    pub geometry: Box2,
    /// Current position in global coordinates.
    pub x: i32,
    pub y: i32,
    /// Where the animation queue is driving `(x, y)` toward. Equal to `(x, y)` when not
    /// animating.
    pub target_x: i32,
    pub target_y: i32,
    /// Pending target width/height for the next arrangement pass; used by `CycleWidth` to stage
    /// a size change before `arrange_workspace` picks it up.
    pub target_width: i32,
    pub target_height: i32,
    pub mapped: bool,
    pub workspace_id: Option<usize>,
    pub expansion_state: ExpansionState,
    pub saved_state: Option<SavedState>,
    /// Remembered `(width, height)` from before the last float/tile transition, restored on
    /// `ToggleFloating`.
    pub previous_size: (i32, i32),
    pub output: Option<crate::output::OutputId>,
    pub app_id: Option<String>,
    pub title: Option<String>,
    /// Opaque handle to the client that owns this view's surface, as reported by the backend.
    /// Used only to check `Seat::exclusive_client`.
    pub client: Option<ClientId>,
    /// The dialog/popup relationship used by the fullscreen-transient focus exception: a view
    /// transient for the active fullscreen view may still take focus.
    pub transient_for: Option<ViewId>,
}

/// Opaque per-client identity as reported by the backend; has no meaning inside the engine beyond
/// equality comparison against [`crate::seat::Seat::exclusive_client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

impl View {
    pub fn new(shell: ShellKind, geometry: Box2) -> Self {
        Self {
            shell,
            geometry,
            x: 0,
            y: 0,
            target_x: 0,
            target_y: 0,
            target_width: geometry.size.w,
            target_height: geometry.size.h,
            mapped: false,
            workspace_id: None,
            expansion_state: ExpansionState::Normal,
            saved_state: None,
            previous_size: (geometry.size.w, geometry.size.h),
            output: None,
            app_id: None,
            title: None,
            client: None,
            transient_for: None,
        }
    }

    pub fn is_transient_for(&self, other: ViewId) -> bool {
        self.transient_for == Some(other)
    }

    pub fn is_mapped_and_normal(&self) -> bool {
        self.mapped && self.expansion_state == ExpansionState::Normal
    }

    pub fn box_in_global(&self) -> Box2 {
        Box2::from_loc_and_size((self.x, self.y), self.geometry.size)
    }

    pub fn move_to(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
        self.target_x = x;
        self.target_y = y;
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        self.geometry.size.w = width;
        self.geometry.size.h = height;
    }

    /// Records `state` as the geometry to restore to and marks the view fullscreened.
    pub fn save_state(&mut self, state: SavedState) {
        self.saved_state = Some(state);
    }

    /// Marks a view NORMAL again once its post-fullscreen resize has been confirmed. No-op if the
    /// view was not `Recovering`.
    pub fn recover(&mut self) {
        if self.expansion_state == ExpansionState::Recovering {
            self.expansion_state = ExpansionState::Normal;
        }
    }

    /// Advances through [`WIDTH_RATIOS`], picking the ratio whose resulting width is nearest to
    /// (but different from) the view's current width, and stages it into `target_width`/
    /// `target_height` (height is left as-is; only width cycles).
    pub fn cycle_width(&mut self, screen_width: i32) {
        let current = self.geometry.size.w;
        let widths: Vec<i32> = WIDTH_RATIOS
            .iter()
            .map(|ratio| (*ratio * screen_width as f64).round() as i32)
            .collect();

        let next = widths
            .iter()
            .copied()
            .find(|w| *w > current)
            .unwrap_or(widths[0]);

        self.target_width = next;
        self.target_height = self.geometry.size.h;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> View {
        View::new(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (800, 600)))
    }

    #[test]
    fn cycle_width_steps_through_ratios_in_order() {
        let mut v = view();
        v.geometry.size.w = 1920 / 3; // ~640, the first ratio
        v.cycle_width(1920);
        assert_eq!(v.target_width, 1920 / 2);
    }

    #[test]
    fn cycle_width_wraps_around_past_the_last_ratio() {
        let mut v = view();
        v.geometry.size.w = (1920.0 * 2.0 / 3.0).round() as i32;
        v.cycle_width(1920);
        assert_eq!(v.target_width, (1920.0 / 3.0).round() as i32);
    }

    #[test]
    fn recover_only_clears_recovering_state() {
        let mut v = view();
        v.expansion_state = ExpansionState::Fullscreen;
        v.recover();
        assert_eq!(v.expansion_state, ExpansionState::Fullscreen);

        v.expansion_state = ExpansionState::Recovering;
        v.recover();
        assert_eq!(v.expansion_state, ExpansionState::Normal);
    }
}
