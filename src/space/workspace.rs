//! The scrollable tiling model: columns of tiles, floating views, fullscreen, and the layout
//! algorithm that places them on screen.

use slotmap::SlotMap;

use crate::animation::ViewAnimation;
use crate::output::OutputId;
use crate::utils::geometry::{Box2, Point};
use crate::window::{ExpansionState, SavedState, View, ViewId};

/// `(output_box, usable_area)`, both in global coordinates, as needed by the layout algorithm.
/// `None` means the workspace has no assigned output (or it was destroyed mid-call); every
/// layout-touching method treats that as a no-op. Callers resolve this from
/// [`crate::output::OutputManager`] *before* indexing into its own `workspaces` vec, since the
/// manager cannot lend itself out again while one of its fields is already borrowed mutably.
pub type WorkspaceGeometry = Option<(Box2, Box2)>;

/// One tile in a [`Column`]: a view plus the positive weight determining its share of the
/// column's height.
#[derive(Debug, Clone)]
pub struct Tile {
    pub view: ViewId,
    pub vertical_scale: f64,
}

/// A vertical stack of [`Tile`]s. Columns are never empty: [`Workspace::remove_view`] destroys a
/// column the moment its last tile leaves.
#[derive(Debug, Clone, Default)]
pub struct Column {
    pub tiles: Vec<Tile>,
}

impl Column {
    fn mapped_and_normal<'v>(
        &'v self,
        views: &'v SlotMap<ViewId, View>,
    ) -> impl Iterator<Item = &'v Tile> + 'v {
        self.tiles
            .iter()
            .filter(move |tile| views[tile.view].is_mapped_and_normal())
    }

    fn find_tile(&self, view: ViewId) -> Option<usize> {
        self.tiles.iter().position(|t| t.view == view)
    }
}

/// A numbered plane of tiled columns, floating views, and an optional fullscreen view.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub index: usize,
    pub output: Option<OutputId>,
    /// Integer horizontal viewport offset in global coordinates.
    pub scroll_x: i32,
    pub columns: Vec<Column>,
    /// Front = most recently floated.
    pub floating_views: Vec<ViewId>,
    pub fullscreen_view: Option<ViewId>,
    /// Pixel gap between tiles and around the usable area's border, mirroring
    /// `cardboard_config::Config::gap`. Kept per-workspace so a live `config gap` change can be
    /// applied without touching anything but the layout pass.
    pub gap: i32,
}

impl Workspace {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            output: None,
            scroll_x: 0,
            columns: Vec::new(),
            floating_views: Vec::new(),
            fullscreen_view: None,
            gap: 8,
        }
    }

    pub fn is_active(&self) -> bool {
        self.output.is_some()
    }

    pub fn find_column(&self, view: ViewId) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.find_tile(view).is_some())
    }

    pub fn find_floating(&self, view: ViewId) -> Option<usize> {
        self.floating_views.iter().position(|v| *v == view)
    }

    pub fn is_view_floating(&self, view: ViewId) -> bool {
        self.find_floating(view).is_some()
    }

    /// Adds `view` to the workspace. If `floating`, it is inserted into `floating_views`
    /// (after `next_to` if given, else at the front). Otherwise a brand new column is created
    /// holding just this view, inserted after `next_to`'s column (or at the end).
    ///
    /// `transferring` skips the activation dance (`workspace_id`/`set_activated`/output
    /// reassignment) for callers that are relocating a view that is already correctly tracked
    /// elsewhere (e.g. `insert_into_column`, `ToggleFloating`).
    pub fn add_view(
        &mut self,
        views: &mut SlotMap<ViewId, View>,
        view: ViewId,
        next_to: Option<ViewId>,
        floating: bool,
        transferring: bool,
        geometry: WorkspaceGeometry,
    ) {
        if floating {
            let insert_at = next_to
                .and_then(|anchor| self.find_floating(anchor))
                .map(|idx| idx + 1)
                .unwrap_or(0);
            self.floating_views.insert(insert_at, view);
        } else {
            let insert_at = next_to
                .and_then(|anchor| self.find_column(anchor))
                .map(|idx| idx + 1)
                .unwrap_or(self.columns.len());
            self.columns.insert(
                insert_at,
                Column {
                    tiles: vec![Tile {
                        view,
                        vertical_scale: 1.0,
                    }],
                },
            );
        }

        if !transferring {
            views[view].workspace_id = Some(self.index);
            if self.output.is_some() {
                views[view].output = self.output;
            }
        }

        self.arrange_workspace(views, geometry, None);
    }

    /// Removes `view` from wherever it lives in this workspace (tiled column or floating list).
    /// An emptied column is destroyed.
    pub fn remove_view(
        &mut self,
        views: &mut SlotMap<ViewId, View>,
        view: ViewId,
        transferring: bool,
        geometry: WorkspaceGeometry,
    ) {
        if !transferring {
            if self.fullscreen_view == Some(view) {
                self.fullscreen_view = None;
            }
            views[view].output = None;
        }

        if let Some(column_idx) = self.find_column(view) {
            let column = &mut self.columns[column_idx];
            column.tiles.retain(|t| t.view != view);
            if column.tiles.is_empty() {
                self.columns.remove(column_idx);
            }
        }
        self.floating_views.retain(|v| *v != view);

        self.arrange_workspace(views, geometry, None);
    }

    /// Moves `view` out of its current column and appends it as a new tile at the end of
    /// the column containing `target_anchor`, matching that column's widest mapped-normal tile
    /// so the next arrangement pass treats it as already resized. `target_anchor` is any view
    /// already living in the destination column; it is looked up again after removing `view` in
    /// case that shifted column indices.
    pub fn insert_into_column(
        &mut self,
        views: &mut SlotMap<ViewId, View>,
        view: ViewId,
        target_anchor: ViewId,
        geometry: WorkspaceGeometry,
    ) {
        let Some(target_idx) = self.find_column(target_anchor) else {
            return;
        };
        let max_width = self.columns[target_idx]
            .mapped_and_normal(views)
            .map(|t| views[t.view].geometry.size.w)
            .max()
            .unwrap_or(views[view].geometry.size.w);

        self.remove_view(views, view, true, geometry);

        let Some(target_idx) = self.find_column(target_anchor) else {
            return;
        };
        self.columns[target_idx].tiles.push(Tile {
            view,
            vertical_scale: 1.0,
        });
        views[view].geometry.size.w = max_width;

        self.arrange_workspace(views, geometry, None);
    }

    /// Splits the last tile out of `column_idx` into its own new column, placed right after the
    /// column containing the original column's first tile. No-op if the column has fewer than
    /// two tiles.
    pub fn pop_from_column(
        &mut self,
        views: &mut SlotMap<ViewId, View>,
        column_idx: usize,
        geometry: WorkspaceGeometry,
    ) {
        if self.columns[column_idx].tiles.len() < 2 {
            return;
        }
        let to_pop = self.columns[column_idx].tiles.pop().unwrap().view;
        let next_to = self.columns[column_idx].tiles[0].view;
        self.add_view(views, to_pop, Some(next_to), false, true, geometry);
    }

    /// Runs the layout algorithm: positions the fullscreen view (if any) over the whole output
    /// box, then lays out each column left to right starting at `scroll_x`, splitting each
    /// column's usable height among its mapped-normal tiles by `vertical_scale`. Columns that
    /// contain any unmapped/non-normal tile are skipped entirely (not yet ready to be measured).
    ///
    /// When `animation` is `Some`, view moves are enqueued there instead of applied immediately.
    pub fn arrange_workspace(
        &mut self,
        views: &mut SlotMap<ViewId, View>,
        geometry: WorkspaceGeometry,
        mut animation: Option<&mut ViewAnimation>,
    ) {
        let gap = self.gap;
        let Some((output_box, usable_area)) = geometry else {
            return;
        };

        if let Some(fullscreen) = self.fullscreen_view {
            views[fullscreen].x = output_box.loc.x;
            views[fullscreen].y = output_box.loc.y;
            views[fullscreen].resize(output_box.size.w, output_box.size.h);
        }

        let mut acc_width = 0;
        for column in &self.columns {
            let should_skip = column.tiles.iter().any(|t| !views[t.view].is_mapped_and_normal());
            if should_skip {
                continue;
            }

            let scale_sum: f64 = column.tiles.iter().map(|t| t.vertical_scale).sum();
            let mut current_y = output_box.loc.y + usable_area.loc.y + gap;
            let mut max_width = 0;

            for tile in &column.tiles {
                let view = &views[tile.view];
                max_width = max_width.max(view.geometry.size.w);
                let target_x = output_box.loc.x + acc_width - view.geometry.loc.x - self.scroll_x;
                let target_y = current_y - view.geometry.loc.y;

                let height = ((usable_area.size.h - (column.tiles.len() as i32 + 1) * gap) as f64
                    * (tile.vertical_scale / scale_sum)) as i32;

                match animation.as_deref_mut() {
                    Some(animation) => {
                        let start = Point::from((view.x, view.y));
                        animation.enqueue_task(tile.view, start, Point::from((target_x, target_y)));
                    }
                    None => views[tile.view].move_to(target_x, target_y),
                }
                views[tile.view].resize(views[tile.view].geometry.size.w, height);
                current_y += height + gap;
            }

            acc_width += max_width + gap;
        }
    }

    /// Scrolls the viewport so `view` is fully visible (or, with `condense`, snaps to the
    /// workspace's left/right extreme when `view`'s column is the first/last one), then
    /// re-arranges.
    pub fn fit_view_on_screen(
        &mut self,
        views: &mut SlotMap<ViewId, View>,
        view: ViewId,
        condense: bool,
        geometry: WorkspaceGeometry,
    ) {
        let gap = self.gap;
        if self.fullscreen_view.is_some() {
            return;
        }
        if views[view].expansion_state != ExpansionState::Normal {
            return;
        }
        let Some(column_idx) = self.find_column(view) else {
            return;
        };
        let Some((_, usable_area)) = geometry else {
            return;
        };

        let wx = self.view_workspace_x(views, view);
        let view_box = &views[view];
        let vx = view_box.x + view_box.geometry.loc.x;
        let width = view_box.geometry.size.w;

        let overflowing_left = vx < usable_area.loc.x;
        let overflowing_right = vx + width > usable_area.loc.x + usable_area.size.w;

        if condense && column_idx == 0 {
            self.scroll_x = -usable_area.loc.x + gap / 2;
        } else if condense && column_idx == self.columns.len() - 1 {
            self.scroll_x = wx + width - (usable_area.loc.x + usable_area.size.w) - gap / 2;
        } else if overflowing_left {
            self.scroll_x = wx - usable_area.loc.x - gap / 2;
        } else if overflowing_right {
            self.scroll_x = wx + width - (usable_area.loc.x + usable_area.size.w) + gap / 2;
        }

        self.arrange_workspace(views, geometry, None);
    }

    /// The view's x-coordinate in workspace-plane space: the sum of every preceding column's
    /// representative (first mapped-normal tile) width plus gap, up to (not including) the
    /// column containing `view`.
    fn view_workspace_x(&self, views: &SlotMap<ViewId, View>, view: ViewId) -> i32 {
        let mut acc = 0;
        for column in &self.columns {
            if column.find_tile(view).is_some() {
                break;
            }
            if let Some(tile) = column.mapped_and_normal(views).next() {
                acc += views[tile.view].geometry.size.w + self.gap;
            }
        }
        acc
    }

    /// Finds the column most visible within the output's usable area — by summed intersection
    /// area of each column's representative tile box against the usable area — and returns the
    /// first view from `focus_stack` that both belongs to that column and is mapped-and-normal.
    /// Sticky: if `focused_view` is already in the running and no other column beats it by more
    /// than 1% visibility, it is returned unchanged.
    pub fn find_dominant_view(
        &self,
        views: &SlotMap<ViewId, View>,
        usable_area: Option<Box2>,
        focus_stack: &[ViewId],
        focused_view: Option<ViewId>,
    ) -> Option<ViewId> {
        let usable_area = usable_area?;
        let usable_box_area = (usable_area.size.w as f64) * (usable_area.size.h as f64);
        if usable_box_area <= 0.0 {
            return None;
        }

        let mut most_visible_column = None;
        let mut max_visibility = -1.0;
        let mut focused_view_visibility = -1.0;

        for (idx, column) in self.columns.iter().enumerate() {
            let Some(tile) = column.mapped_and_normal(views).next() else {
                continue;
            };
            let view = &views[tile.view];
            let view_box = Box2::from_loc_and_size(
                (view.x + view.geometry.loc.x, usable_area.loc.y),
                (view.geometry.size.w, usable_area.size.h),
            );
            let view_box_area = (view_box.size.w as f64) * (view_box.size.h as f64);
            if view_box_area <= 0.0 {
                continue;
            }

            let visibility = view_box
                .intersection(usable_area)
                .map(|overlap| (overlap.size.w as f64) * (overlap.size.h as f64) / view_box_area)
                .unwrap_or(0.0);

            if focused_view.is_some_and(|f| column.find_tile(f).is_some()) {
                focused_view_visibility = visibility;
            }
            if visibility > max_visibility {
                max_visibility = visibility;
                most_visible_column = Some(idx);
            }
        }

        let most_visible_column = most_visible_column?;
        if focused_view.is_none() || (max_visibility - focused_view_visibility) > 0.01 {
            focus_stack
                .iter()
                .find(|v| self.columns[most_visible_column].find_tile(**v).is_some())
                .copied()
        } else {
            focused_view
        }
    }

    /// Sets or clears the workspace's fullscreen view, saving/restoring geometry either way.
    pub fn set_fullscreen_view(
        &mut self,
        views: &mut SlotMap<ViewId, View>,
        view: Option<ViewId>,
        geometry: WorkspaceGeometry,
    ) {
        if let Some(current) = self.fullscreen_view {
            if let Some(saved) = views[current].saved_state.take() {
                views[current].move_to(saved.x, saved.y);
                views[current].resize(saved.width, saved.height);
            }
            views[current].expansion_state = ExpansionState::Recovering;
        }

        if let Some(view) = view {
            let v = &views[view];
            views[view].save_state(SavedState {
                x: v.x,
                y: v.y,
                width: v.geometry.size.w,
                height: v.geometry.size.h,
            });
            views[view].expansion_state = ExpansionState::Fullscreen;
        }

        self.fullscreen_view = view;
        self.arrange_workspace(views, geometry, None);
    }

    /// Assigns `output` to this workspace and reparents every tiled view onto it.
    pub fn activate(&mut self, views: &mut SlotMap<ViewId, View>, output: OutputId) {
        self.output = Some(output);
        for column in &self.columns {
            for tile in &column.tiles {
                views[tile.view].output = Some(output);
            }
        }
    }

    /// Unassigns this workspace's output and clears every tiled view's output back-reference.
    pub fn deactivate(&mut self, views: &mut SlotMap<ViewId, View>) {
        for column in &self.columns {
            for tile in &column.tiles {
                views[tile.view].output = None;
            }
        }
        self.output = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputManager;
    use crate::utils::geometry::Size;
    use crate::window::ShellKind;

    fn setup() -> (SlotMap<ViewId, View>, OutputManager, OutputId) {
        let mut views = SlotMap::with_key();
        let mut output_manager = OutputManager::new();
        let output = output_manager.register_output(&mut views, Size::from((1920, 1080)));
        (views, output_manager, output)
    }

    fn geometry(output_manager: &OutputManager, output: OutputId) -> WorkspaceGeometry {
        Some((
            output_manager.output_box(output).unwrap(),
            output_manager.real_usable_area(output).unwrap(),
        ))
    }

    fn push_view(views: &mut SlotMap<ViewId, View>) -> ViewId {
        let mut v = View::new(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (800, 600)));
        v.mapped = true;
        views.insert(v)
    }

    #[test]
    fn add_view_creates_a_new_column() {
        let (mut views, output_manager, output) = setup();
        let mut ws = Workspace::new(0);
        ws.activate(&mut views, output);
        let view = push_view(&mut views);
        let geom = geometry(&output_manager, output);

        ws.add_view(&mut views, view, None, false, false, geom);
        assert_eq!(ws.columns.len(), 1);
        assert_eq!(views[view].workspace_id, Some(0));
    }

    #[test]
    fn removing_the_last_tile_destroys_the_column() {
        let (mut views, output_manager, output) = setup();
        let mut ws = Workspace::new(0);
        ws.activate(&mut views, output);
        let view = push_view(&mut views);
        let geom = geometry(&output_manager, output);
        ws.add_view(&mut views, view, None, false, false, geom);

        ws.remove_view(&mut views, view, false, geom);
        assert!(ws.columns.is_empty());
    }

    #[test]
    fn two_columns_split_width_left_to_right() {
        let (mut views, output_manager, output) = setup();
        let mut ws = Workspace::new(0);
        ws.activate(&mut views, output);
        let a = push_view(&mut views);
        let b = push_view(&mut views);
        let geom = geometry(&output_manager, output);
        ws.add_view(&mut views, a, None, false, false, geom);
        ws.add_view(&mut views, b, None, false, false, geom);

        assert!(views[a].x < views[b].x);
    }

    #[test]
    fn vertical_scale_splits_column_height_proportionally() {
        let (mut views, output_manager, output) = setup();
        let mut ws = Workspace::new(0);
        ws.activate(&mut views, output);
        let top = push_view(&mut views);
        let bottom = push_view(&mut views);
        let geom = geometry(&output_manager, output);
        ws.add_view(&mut views, top, None, false, false, geom);
        // manually stack `bottom` into the same column as a second tile
        let column = ws.find_column(top).unwrap();
        ws.columns[column].tiles.push(Tile {
            view: bottom,
            vertical_scale: 3.0,
        });
        ws.arrange_workspace(&mut views, geom, None);

        let top_height = views[top].geometry.size.h;
        let bottom_height = views[bottom].geometry.size.h;
        assert!(bottom_height > top_height * 2);
    }

    #[test]
    fn pop_from_column_is_a_noop_with_a_single_tile() {
        let (mut views, output_manager, output) = setup();
        let mut ws = Workspace::new(0);
        ws.activate(&mut views, output);
        let view = push_view(&mut views);
        let geom = geometry(&output_manager, output);
        ws.add_view(&mut views, view, None, false, false, geom);

        ws.pop_from_column(&mut views, 0, geom);
        assert_eq!(ws.columns.len(), 1);
        assert_eq!(ws.columns[0].tiles.len(), 1);
    }

    #[test]
    fn find_dominant_view_prefers_the_most_visible_column() {
        let (mut views, output_manager, output) = setup();
        let mut ws = Workspace::new(0);
        ws.activate(&mut views, output);
        let a = push_view(&mut views);
        let geom = geometry(&output_manager, output);
        ws.add_view(&mut views, a, None, false, false, geom);

        let usable_area = output_manager.real_usable_area(output);
        let dominant = ws.find_dominant_view(&views, usable_area, &[a], None);
        assert_eq!(dominant, Some(a));
    }

    #[test]
    fn find_dominant_view_is_sticky_within_one_percent() {
        let (mut views, output_manager, output) = setup();
        let mut ws = Workspace::new(0);
        ws.activate(&mut views, output);
        let a = push_view(&mut views);
        let geom = geometry(&output_manager, output);
        ws.add_view(&mut views, a, None, false, false, geom);

        // Only one column on screen: `a` is both the most visible and the focused view.
        let usable_area = output_manager.real_usable_area(output);
        let dominant = ws.find_dominant_view(&views, usable_area, &[a], Some(a));
        assert_eq!(dominant, Some(a));
    }

    #[test]
    fn set_fullscreen_view_saves_and_restores_geometry() {
        let (mut views, output_manager, output) = setup();
        let mut ws = Workspace::new(0);
        ws.activate(&mut views, output);
        let view = push_view(&mut views);
        let geom = geometry(&output_manager, output);
        ws.add_view(&mut views, view, None, false, false, geom);
        views[view].move_to(50, 60);
        views[view].resize(300, 200);

        ws.set_fullscreen_view(&mut views, Some(view), geom);
        assert_eq!(views[view].expansion_state, ExpansionState::Fullscreen);
        assert_eq!(views[view].x, 0);

        ws.set_fullscreen_view(&mut views, None, geom);
        assert_eq!(views[view].x, 50);
        assert_eq!(views[view].y, 60);
    }
}
