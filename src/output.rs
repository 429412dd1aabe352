//! Output tracking and the global output layout.
//!
//! An `Output` is created on the backend's "new output" notification and lives until its
//! destroy event; it is owned exclusively by [`OutputManager`]. The layout places outputs
//! left-to-right in registration order, which is all the reference implementation ever needed —
//! there is no user-facing output-arrangement UI in scope here.

use slotmap::{new_key_type, SlotMap};

use crate::space::workspace::Workspace;
use crate::utils::geometry::{Box2, Point, Size};
use crate::window::{View, ViewId};

new_key_type! {
    /// Stable handle to an [`Output`]. Never reused while the `Output` it named is alive; a
    /// destroyed output's id becomes a dangling reference everywhere it is still held, which is
    /// why every lookup through [`OutputManager`] returns an `Option`.
    pub struct OutputId;
}

/// One physical monitor as tracked by the core engine.
#[derive(Debug, Clone)]
pub struct Output {
    /// Position and size in the global output layout, logical pixels.
    pub geometry: Box2,
    /// The area still usable after layer-shell exclusive zones have been subtracted, in the
    /// output's own local frame (i.e. relative to `geometry.loc`).
    pub usable_area: Box2,
    /// Monotonic timestamp of the last frame presented on this output.
    pub last_presented: std::time::Duration,
}

impl Output {
    fn new(geometry: Box2) -> Self {
        Self {
            usable_area: Box2::from_loc_and_size((0, 0).into(), geometry.size),
            geometry,
            last_presented: std::time::Duration::ZERO,
        }
    }
}

/// Owns every [`Output`], the layout that places them in global space, and the flat pool of
/// [`Workspace`]s shared across all outputs (a workspace is *active* iff assigned to one).
#[derive(Debug, Default)]
pub struct OutputManager {
    outputs: SlotMap<OutputId, Output>,
    /// Registration order; also the left-to-right layout order.
    order: Vec<OutputId>,
    pub workspaces: Vec<Workspace>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly enabled output of `size` logical pixels, appends it to the right of the
    /// current layout, then assigns it the first unassigned workspace (creating one if every
    /// existing workspace is already active).
    pub fn register_output(
        &mut self,
        views: &mut SlotMap<ViewId, View>,
        size: Size<i32, smithay::utils::Logical>,
    ) -> OutputId {
        let x = self
            .order
            .last()
            .map(|id| {
                let output = &self.outputs[*id];
                output.geometry.loc.x + output.geometry.size.w
            })
            .unwrap_or(0);
        let geometry = Box2::from_loc_and_size(Point::from((x, 0)), size);
        let id = self.outputs.insert(Output::new(geometry));
        self.order.push(id);

        let workspace_idx = self
            .workspaces
            .iter()
            .position(|ws| !ws.is_active())
            .unwrap_or_else(|| {
                self.workspaces.push(Workspace::new(self.workspaces.len()));
                self.workspaces.len() - 1
            });
        // Resolved before indexing into `self.workspaces` mutably below: `self` can't be lent out
        // again as `&OutputManager` once one of its fields is borrowed mutably.
        let geometry = self.workspace_geometry(id);
        self.workspaces[workspace_idx].activate(views, id);
        self.workspaces[workspace_idx].arrange_workspace(views, geometry, None);

        id
    }

    /// `(output_box, usable_area)` for `id`, both in global coordinates, as consumed by
    /// [`Workspace`]'s layout methods.
    pub fn workspace_geometry(&self, id: OutputId) -> crate::space::workspace::WorkspaceGeometry {
        Some((self.output_box(id)?, self.real_usable_area(id)?))
    }

    /// Like [`Self::workspace_geometry`], but keyed by a workspace's index into `self.workspaces`
    /// rather than by output id directly. `None` if the index is out of bounds or the workspace
    /// has no assigned output.
    pub fn workspace_geometry_for_workspace(&self, workspace_idx: usize) -> crate::space::workspace::WorkspaceGeometry {
        let output = self.workspaces.get(workspace_idx)?.output?;
        self.workspace_geometry(output)
    }

    /// On destroy: deactivates whatever workspace was assigned to `id`, then drops the output.
    pub fn remove(&mut self, views: &mut SlotMap<ViewId, View>, id: OutputId) -> Option<Output> {
        if let Some(ws) = self.workspaces.iter_mut().find(|ws| ws.output == Some(id)) {
            ws.deactivate(views);
        }
        self.order.retain(|other| *other != id);
        self.outputs.remove(id)
    }

    /// The workspace `view` currently belongs to, if any.
    pub fn view_workspace_mut(&mut self, views: &SlotMap<ViewId, View>, view: ViewId) -> Option<&mut Workspace> {
        let idx = views[view].workspace_id?;
        self.workspaces.get_mut(idx)
    }

    pub fn get(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(id)
    }

    pub fn get_mut(&mut self, id: OutputId) -> Option<&mut Output> {
        self.outputs.get_mut(id)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (OutputId, &Output)> {
        self.order.iter().map(|id| (*id, &self.outputs[*id]))
    }

    /// The output's box in global coordinates.
    pub fn output_box(&self, id: OutputId) -> Option<Box2> {
        self.outputs.get(id).map(|o| o.geometry)
    }

    /// `usable_area` translated from the output's local frame into global coordinates.
    pub fn real_usable_area(&self, id: OutputId) -> Option<Box2> {
        let output = self.outputs.get(id)?;
        Some(Box2::from_loc_and_size(
            output.geometry.loc + output.usable_area.loc,
            output.usable_area.size,
        ))
    }

    /// The output (if any) whose global-coordinate box contains `(lx, ly)`.
    pub fn output_at(&self, lx: i32, ly: i32) -> Option<OutputId> {
        self.order
            .iter()
            .copied()
            .find(|id| self.outputs[*id].geometry.contains((lx, ly)))
    }

    pub fn contains_point(&self, id: OutputId, lx: i32, ly: i32) -> bool {
        self.outputs
            .get(id)
            .is_some_and(|o| o.geometry.contains((lx, ly)))
    }
}
