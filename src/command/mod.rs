//! Parses wire [`CommandData`] into closures over the running engine, and runs them.
//!
//! A command's life cycle is two phases: [`dispatch_command`] turns a `CommandData` into a boxed
//! closure (the *parse* phase is already done upstream by `bincode`/`cardboard-ipc`), then calling
//! that closure with a live [`CommandContext`] actually performs the operation and produces a
//! [`CommandResult`].

pub mod keybindings;

use cardboard_ipc::{CommandData, ConfigCommand, FocusDirection};

use crate::backend::Backend;
use crate::command::keybindings::KeybindingTable;
use crate::output::OutputManager;
use crate::seat::Seat;
use crate::surface_manager::SurfaceManager;
use crate::window::ViewId;

/// Everything a command needs to run. Borrowed fresh for each dispatch; nothing here outlives one
/// IPC request or one keybinding press.
pub struct CommandContext<'a> {
    pub surfaces: &'a mut SurfaceManager,
    pub output_manager: &'a mut OutputManager,
    pub seat: &'a mut Seat,
    pub keybindings: &'a mut KeybindingTable,
    pub config: &'a mut cardboard_config::Config,
    pub backend: &'a mut dyn Backend,
}

impl std::fmt::Debug for CommandContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("surfaces", &self.surfaces)
            .field("output_manager", &self.output_manager)
            .field("seat", &self.seat)
            .field("keybindings", &self.keybindings)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The outcome of running a command: an optional response message (sent back over IPC when
/// non-empty) and, for `Quit`, the exit code the caller should shut down with.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommandResult {
    pub message: Option<String>,
    pub quit: Option<i32>,
}

impl CommandResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            quit: None,
        }
    }

    pub fn quit(code: i32) -> Self {
        Self {
            message: None,
            quit: Some(code),
        }
    }
}

/// A command ready to run, closed over its own parameters.
pub type Command = Box<dyn FnOnce(&mut CommandContext<'_>) -> CommandResult>;

/// Turns a wire [`CommandData`] into a runnable [`Command`]. Never fails: unknown states (no
/// focused view, out-of-bounds workspace index, etc.) are handled as no-ops by the closure itself,
/// each returning `CommandResult::empty()`.
pub fn dispatch_command(data: CommandData) -> Command {
    match data {
        CommandData::Quit { code } => Box::new(move |_ctx| CommandResult::quit(code)),

        CommandData::Focus { direction } => Box::new(move |ctx| {
            focus(ctx, direction);
            CommandResult::empty()
        }),

        CommandData::Exec { argv } => Box::new(move |_ctx| {
            if let Err(err) = crate::utils::spawn(&argv) {
                return CommandResult::message(format!("exec failed: {err}"));
            }
            CommandResult::empty()
        }),

        CommandData::Bind { mods, key, inner } => Box::new(move |ctx| {
            ctx.keybindings.bind(mods, &key, *inner);
            CommandResult::empty()
        }),

        CommandData::Close => Box::new(|ctx| {
            if let Some(view) = ctx.seat.focused_view {
                ctx.backend.close_view(view);
            }
            CommandResult::empty()
        }),

        CommandData::WorkspaceSwitch { n } => Box::new(move |ctx| {
            workspace_switch(ctx, n);
            CommandResult::empty()
        }),

        CommandData::WorkspaceMove { n } => Box::new(move |ctx| {
            if let Some(view) = ctx.seat.focused_view {
                crate::view_operations::change_view_workspace(
                    ctx.surfaces,
                    ctx.output_manager,
                    ctx.seat,
                    view,
                    n,
                );
            }
            CommandResult::empty()
        }),

        CommandData::ToggleFloating => Box::new(|ctx| {
            toggle_floating(ctx);
            CommandResult::empty()
        }),

        CommandData::Move { dx, dy } => Box::new(move |ctx| {
            move_view(ctx, dx, dy);
            CommandResult::empty()
        }),

        CommandData::Resize { w, h } => Box::new(move |ctx| {
            resize_view(ctx, w, h);
            CommandResult::empty()
        }),

        CommandData::InsertIntoColumn => Box::new(|ctx| {
            insert_into_column(ctx);
            CommandResult::empty()
        }),

        CommandData::PopFromColumn => Box::new(|ctx| {
            pop_from_column(ctx);
            CommandResult::empty()
        }),

        CommandData::Config(sub) => Box::new(move |ctx| {
            apply_config(ctx, sub);
            CommandResult::empty()
        }),

        CommandData::CycleWidth => Box::new(|ctx| {
            cycle_width(ctx);
            CommandResult::empty()
        }),
    }
}

fn focus(ctx: &mut CommandContext<'_>, direction: FocusDirection) {
    let Some(view) = ctx.seat.focused_view else {
        return;
    };
    let Some(workspace_idx) = ctx.surfaces.views[view].workspace_id else {
        return;
    };

    let next = match direction {
        FocusDirection::Left | FocusDirection::Right => {
            let ws = &ctx.output_manager.workspaces[workspace_idx];
            let Some(column_idx) = ws.find_column(view) else {
                return;
            };
            let target_idx = if direction == FocusDirection::Left {
                column_idx.checked_sub(1)
            } else {
                (column_idx + 1 < ws.columns.len()).then_some(column_idx + 1)
            };
            target_idx.and_then(|idx| ws.columns[idx].tiles.first()).map(|t| t.view)
        }
        FocusDirection::Up | FocusDirection::Down => {
            let ws = &ctx.output_manager.workspaces[workspace_idx];
            let Some(column_idx) = ws.find_column(view) else {
                return;
            };
            let column = &ws.columns[column_idx];
            let Some(tile_idx) = column.tiles.iter().position(|t| t.view == view) else {
                return;
            };
            let range: Box<dyn Iterator<Item = usize>> = if direction == FocusDirection::Up {
                Box::new((0..tile_idx).rev())
            } else {
                Box::new((tile_idx + 1)..column.tiles.len())
            };
            range
                .map(|idx| column.tiles[idx].view)
                .find(|v| ctx.surfaces.views[*v].is_mapped_and_normal())
        }
        FocusDirection::Cycle => {
            let ws_views: Vec<ViewId> = ctx
                .seat
                .focus_stack
                .iter()
                .copied()
                .filter(|v| ctx.surfaces.views[*v].workspace_id == Some(workspace_idx))
                .collect();
            let pos = ws_views.iter().position(|v| *v == view);
            pos.and_then(|idx| ws_views.get((idx + 1) % ws_views.len().max(1)).copied())
                .filter(|v| *v != view)
        }
    };

    if let Some(next) = next {
        ctx.seat.focus_view(ctx.surfaces, ctx.output_manager, Some(next));
    }
}

fn move_view(ctx: &mut CommandContext<'_>, dx: i32, dy: i32) {
    let Some(view) = ctx.seat.focused_view else {
        return;
    };
    let Some(workspace_idx) = ctx.surfaces.views[view].workspace_id else {
        return;
    };

    let is_floating = ctx.output_manager.workspaces[workspace_idx].is_view_floating(view);
    if is_floating {
        let x = ctx.surfaces.views[view].x + dx;
        let y = ctx.surfaces.views[view].y + dy;
        crate::view_operations::reconfigure_view_position(
            ctx.surfaces,
            ctx.output_manager,
            ctx.seat,
            view,
            x,
            y,
        );
        return;
    }

    let geometry = ctx.output_manager.workspace_geometry_for_workspace(workspace_idx);
    let ws = &mut ctx.output_manager.workspaces[workspace_idx];
    let Some(column_idx) = ws.find_column(view) else {
        return;
    };

    if dx != 0 {
        let target = if dx < 0 {
            column_idx.checked_sub(1)
        } else {
            (column_idx + 1 < ws.columns.len()).then_some(column_idx + 1)
        };
        if let Some(target) = target {
            ws.columns.swap(column_idx, target);
        }
    }
    if dy != 0 {
        let column = &mut ws.columns[ws.find_column(view).unwrap_or(column_idx)];
        if let Some(tile_idx) = column.tiles.iter().position(|t| t.view == view) {
            let target = if dy < 0 {
                tile_idx.checked_sub(1)
            } else {
                (tile_idx + 1 < column.tiles.len()).then_some(tile_idx + 1)
            };
            if let Some(target) = target {
                column.tiles.swap(tile_idx, target);
            }
        }
    }

    ws.arrange_workspace(&mut ctx.surfaces.views, geometry, None);
    ws.fit_view_on_screen(&mut ctx.surfaces.views, view, false, geometry);
}

fn resize_view(ctx: &mut CommandContext<'_>, dw: i32, dh: i32) {
    let Some(view) = ctx.seat.focused_view else {
        return;
    };
    let w = ctx.surfaces.views[view].geometry.size.w + dw;
    let h = ctx.surfaces.views[view].geometry.size.h + dh;
    crate::view_operations::reconfigure_view_size(ctx.surfaces, ctx.output_manager, view, w.max(1), h.max(1));
}

/// Toggles `view` between tiled and floating. `previous_size` always holds the size the view had
/// the *last* time it was on the other side of this toggle: every call swaps it with the view's
/// current geometry before resizing, so a view floated, resized, tiled, then floated again comes
/// back at the size it was floating at before, not whatever size tiling last gave it.
fn toggle_floating(ctx: &mut CommandContext<'_>) {
    let Some(view) = ctx.seat.focused_view else {
        return;
    };
    let Some(workspace_idx) = ctx.surfaces.views[view].workspace_id else {
        return;
    };
    let geometry = ctx.output_manager.workspace_geometry_for_workspace(workspace_idx);
    let ws = &mut ctx.output_manager.workspaces[workspace_idx];
    let was_floating = ws.is_view_floating(view);

    let restore_size = ctx.surfaces.views[view].previous_size;
    let current_size = (
        ctx.surfaces.views[view].geometry.size.w,
        ctx.surfaces.views[view].geometry.size.h,
    );
    ctx.surfaces.views[view].previous_size = current_size;
    ctx.surfaces.views[view].resize(restore_size.0, restore_size.1);

    ws.remove_view(&mut ctx.surfaces.views, view, true, geometry);
    ws.add_view(&mut ctx.surfaces.views, view, None, !was_floating, true, geometry);

    ctx.output_manager.workspaces[workspace_idx].fit_view_on_screen(&mut ctx.surfaces.views, view, false, geometry);
}

fn insert_into_column(ctx: &mut CommandContext<'_>) {
    let Some(view) = ctx.seat.focused_view else {
        return;
    };
    let Some(workspace_idx) = ctx.surfaces.views[view].workspace_id else {
        return;
    };
    let geometry = ctx.output_manager.workspace_geometry_for_workspace(workspace_idx);
    let ws = &mut ctx.output_manager.workspaces[workspace_idx];
    let Some(column_idx) = ws.find_column(view) else {
        return;
    };
    let Some(target_column) = ws.columns.get(column_idx + 1) else {
        return;
    };
    let Some(target_anchor) = target_column.tiles.first().map(|t| t.view) else {
        return;
    };
    ws.insert_into_column(&mut ctx.surfaces.views, view, target_anchor, geometry);
}

fn pop_from_column(ctx: &mut CommandContext<'_>) {
    let Some(view) = ctx.seat.focused_view else {
        return;
    };
    let Some(workspace_idx) = ctx.surfaces.views[view].workspace_id else {
        return;
    };
    let geometry = ctx.output_manager.workspace_geometry_for_workspace(workspace_idx);
    let ws = &mut ctx.output_manager.workspaces[workspace_idx];
    let Some(column_idx) = ws.find_column(view) else {
        return;
    };
    ws.pop_from_column(&mut ctx.surfaces.views, column_idx, geometry);
}

fn cycle_width(ctx: &mut CommandContext<'_>) {
    let Some(view) = ctx.seat.focused_view else {
        return;
    };
    let Some(output) = ctx.surfaces.views[view].output else {
        return;
    };
    let Some(screen_width) = ctx.output_manager.output_box(output).map(|b| b.size.w) else {
        return;
    };
    ctx.surfaces.views[view].cycle_width(screen_width);
    let w = ctx.surfaces.views[view].target_width;
    let h = ctx.surfaces.views[view].geometry.size.h;
    crate::view_operations::reconfigure_view_size(ctx.surfaces, ctx.output_manager, view, w, h);
}

fn workspace_switch(ctx: &mut CommandContext<'_>, n: usize) {
    let Some(view) = ctx.seat.focused_view else {
        return;
    };
    let Some(output) = ctx.surfaces.views[view].output else {
        return;
    };
    while ctx.output_manager.workspaces.len() <= n {
        let idx = ctx.output_manager.workspaces.len();
        let mut workspace = crate::space::workspace::Workspace::new(idx);
        workspace.gap = ctx.config.gap;
        ctx.output_manager.workspaces.push(workspace);
    }
    if ctx.output_manager.workspaces[n].output == Some(output) {
        return;
    }
    if let Some(current_idx) = ctx
        .output_manager
        .workspaces
        .iter()
        .position(|ws| ws.output == Some(output))
    {
        ctx.output_manager.workspaces[current_idx].deactivate(&mut ctx.surfaces.views);
    }
    ctx.output_manager.workspaces[n].activate(&mut ctx.surfaces.views, output);
    let geometry = ctx.output_manager.workspace_geometry(output);
    ctx.output_manager.workspaces[n].arrange_workspace(&mut ctx.surfaces.views, geometry, None);
}

fn apply_config(ctx: &mut CommandContext<'_>, sub: ConfigCommand) {
    match sub {
        ConfigCommand::MouseMod { mods } => {
            ctx.config.mouse_mods = mods;
            ctx.seat.mouse_mods = mods;
        }
        ConfigCommand::Gap { px } => {
            ctx.config.gap = px;
            for workspace_idx in 0..ctx.output_manager.workspaces.len() {
                ctx.output_manager.workspaces[workspace_idx].gap = px;
                let geometry = ctx.output_manager.workspace_geometry_for_workspace(workspace_idx);
                ctx.output_manager.workspaces[workspace_idx].arrange_workspace(
                    &mut ctx.surfaces.views,
                    geometry,
                    None,
                );
            }
        }
        ConfigCommand::FocusColor { r, g, b, a } => {
            ctx.config.focus_color = csscolorparser::Color::new(r, g, b, a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;
    use crate::utils::geometry::Size;
    use crate::window::ShellKind;

    fn context_pieces() -> (
        SurfaceManager,
        OutputManager,
        Seat,
        KeybindingTable,
        cardboard_config::Config,
        HeadlessBackend,
    ) {
        let mut surfaces = SurfaceManager::new();
        let mut output_manager = OutputManager::new();
        output_manager.register_output(&mut surfaces.views, Size::from((1920, 1080)));
        (
            surfaces,
            output_manager,
            Seat::default(),
            KeybindingTable::new(),
            cardboard_config::Config::default(),
            HeadlessBackend::default(),
        )
    }

    #[test]
    fn bind_registers_the_inner_command() {
        let (mut surfaces, mut output_manager, mut seat, mut keybindings, mut config, mut backend) =
            context_pieces();
        let mut ctx = CommandContext {
            surfaces: &mut surfaces,
            output_manager: &mut output_manager,
            seat: &mut seat,
            keybindings: &mut keybindings,
            config: &mut config,
            backend: &mut backend,
        };

        let command = dispatch_command(CommandData::Bind {
            mods: 1 << 6,
            key: "Return".to_string(),
            inner: Box::new(CommandData::Quit { code: 0 }),
        });
        command(&mut ctx);

        assert_eq!(keybindings.lookup(1 << 6, "return"), Some(&CommandData::Quit { code: 0 }));
    }

    #[test]
    fn quit_command_reports_the_exit_code() {
        let (mut surfaces, mut output_manager, mut seat, mut keybindings, mut config, mut backend) =
            context_pieces();
        let mut ctx = CommandContext {
            surfaces: &mut surfaces,
            output_manager: &mut output_manager,
            seat: &mut seat,
            keybindings: &mut keybindings,
            config: &mut config,
            backend: &mut backend,
        };

        let result = dispatch_command(CommandData::Quit { code: 7 })(&mut ctx);
        assert_eq!(result.quit, Some(7));
    }

    #[test]
    fn focus_left_moves_to_the_adjacent_column() {
        let (mut surfaces, mut output_manager, mut seat, mut keybindings, mut config, mut backend) =
            context_pieces();
        let output = output_manager.outputs().next().unwrap().0;
        let a = surfaces.insert_view(ShellKind::XdgToplevel, crate::utils::geometry::Box2::from_loc_and_size((0, 0), (300, 300)));
        let b = surfaces.insert_view(ShellKind::XdgToplevel, crate::utils::geometry::Box2::from_loc_and_size((0, 0), (300, 300)));
        surfaces.views[a].mapped = true;
        surfaces.views[b].mapped = true;
        let geom = output_manager.workspace_geometry(output);
        output_manager.workspaces[0].add_view(&mut surfaces.views, a, None, false, false, geom);
        output_manager.workspaces[0].add_view(&mut surfaces.views, b, None, false, false, geom);
        seat.focus_view(&mut surfaces, &mut output_manager, Some(b));

        let mut ctx = CommandContext {
            surfaces: &mut surfaces,
            output_manager: &mut output_manager,
            seat: &mut seat,
            keybindings: &mut keybindings,
            config: &mut config,
            backend: &mut backend,
        };
        dispatch_command(CommandData::Focus { direction: FocusDirection::Left })(&mut ctx);

        assert_eq!(seat.focused_view, Some(a));
    }

    #[test]
    fn toggle_floating_round_trips_view_placement() {
        let (mut surfaces, mut output_manager, mut seat, mut keybindings, mut config, mut backend) =
            context_pieces();
        let output = output_manager.outputs().next().unwrap().0;
        let view = surfaces.insert_view(ShellKind::XdgToplevel, crate::utils::geometry::Box2::from_loc_and_size((0, 0), (300, 300)));
        surfaces.views[view].mapped = true;
        let geom = output_manager.workspace_geometry(output);
        output_manager.workspaces[0].add_view(&mut surfaces.views, view, None, false, false, geom);
        seat.focus_view(&mut surfaces, &mut output_manager, Some(view));

        let mut ctx = CommandContext {
            surfaces: &mut surfaces,
            output_manager: &mut output_manager,
            seat: &mut seat,
            keybindings: &mut keybindings,
            config: &mut config,
            backend: &mut backend,
        };
        dispatch_command(CommandData::ToggleFloating)(&mut ctx);
        assert!(output_manager.workspaces[0].is_view_floating(view));
    }

    #[test]
    fn toggle_floating_restores_the_last_floating_size() {
        let (mut surfaces, mut output_manager, mut seat, mut keybindings, mut config, mut backend) =
            context_pieces();
        let output = output_manager.outputs().next().unwrap().0;
        let view = surfaces.insert_view(ShellKind::XdgToplevel, crate::utils::geometry::Box2::from_loc_and_size((0, 0), (300, 300)));
        surfaces.views[view].mapped = true;
        let geom = output_manager.workspace_geometry(output);
        output_manager.workspaces[0].add_view(&mut surfaces.views, view, None, false, false, geom);
        seat.focus_view(&mut surfaces, &mut output_manager, Some(view));

        {
            let mut ctx = CommandContext {
                surfaces: &mut surfaces,
                output_manager: &mut output_manager,
                seat: &mut seat,
                keybindings: &mut keybindings,
                config: &mut config,
                backend: &mut backend,
            };
            dispatch_command(CommandData::ToggleFloating)(&mut ctx); // tiled -> floating
        }
        surfaces.views[view].resize(500, 400); // user resizes the floating view
        let floating_size = (surfaces.views[view].geometry.size.w, surfaces.views[view].geometry.size.h);
        {
            let mut ctx = CommandContext {
                surfaces: &mut surfaces,
                output_manager: &mut output_manager,
                seat: &mut seat,
                keybindings: &mut keybindings,
                config: &mut config,
                backend: &mut backend,
            };
            dispatch_command(CommandData::ToggleFloating)(&mut ctx); // floating -> tiled
            dispatch_command(CommandData::ToggleFloating)(&mut ctx); // tiled -> floating
        }

        assert!(output_manager.workspaces[0].is_view_floating(view));
        assert_eq!(
            (surfaces.views[view].geometry.size.w, surfaces.views[view].geometry.size.h),
            floating_size
        );
    }

    #[test]
    fn config_gap_command_rearranges_tiles_live() {
        let (mut surfaces, mut output_manager, mut seat, mut keybindings, mut config, mut backend) =
            context_pieces();
        let output = output_manager.outputs().next().unwrap().0;
        let a = surfaces.insert_view(ShellKind::XdgToplevel, crate::utils::geometry::Box2::from_loc_and_size((0, 0), (300, 300)));
        let b = surfaces.insert_view(ShellKind::XdgToplevel, crate::utils::geometry::Box2::from_loc_and_size((0, 0), (300, 300)));
        surfaces.views[a].mapped = true;
        surfaces.views[b].mapped = true;
        let geom = output_manager.workspace_geometry(output);
        output_manager.workspaces[0].add_view(&mut surfaces.views, a, None, false, false, geom);
        output_manager.workspaces[0].add_view(&mut surfaces.views, b, None, false, false, geom);
        let x_before = surfaces.views[b].geometry.loc.x;

        let mut ctx = CommandContext {
            surfaces: &mut surfaces,
            output_manager: &mut output_manager,
            seat: &mut seat,
            keybindings: &mut keybindings,
            config: &mut config,
            backend: &mut backend,
        };
        dispatch_command(CommandData::Config(ConfigCommand::Gap { px: 40 }))(&mut ctx);

        assert_eq!(config.gap, 40);
        assert_eq!(output_manager.workspaces[0].gap, 40);
        assert_ne!(surfaces.views[b].geometry.loc.x, x_before);
    }
}
