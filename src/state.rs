//! The top-level engine: owns every subsystem and wires backend events, IPC commands, and
//! keybindings into the tiling model. Generic over [`Backend`] so the same engine drives both the
//! test suite and the crate's own binary, which uses [`crate::backend::headless::HeadlessBackend`]
//! since a real display-server backend is outside this crate's scope.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use calloop::generic::Generic;
use calloop::timer::{TimeoutAction, Timer};
use calloop::{Interest, LoopHandle, LoopSignal, Mode, PostAction};

use cardboard_ipc::CommandData;

use crate::animation::ViewAnimation;
use crate::backend::{Backend, BackendEvent};
use crate::command::keybindings::KeybindingTable;
use crate::command::{dispatch_command, CommandContext, CommandResult};
use crate::output::{OutputId, OutputManager};
use crate::seat::Seat;
use crate::surface_manager::SurfaceManager;
use crate::utils::geometry::{Box2, Size};
use crate::window::{ShellKind, ViewId};

/// Owns every piece of engine state and the backend driving it. One instance per running
/// compositor.
pub struct State<B: Backend> {
    pub surfaces: SurfaceManager,
    pub output_manager: OutputManager,
    pub seat: Seat,
    pub animation: ViewAnimation,
    pub keybindings: KeybindingTable,
    pub config: cardboard_config::Config,
    pub backend: B,
    pub exit_code: i32,
    loop_signal: LoopSignal,
    ipc_socket_path: Option<PathBuf>,
}

impl<B: Backend> std::fmt::Debug for State<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("surfaces", &self.surfaces)
            .field("output_manager", &self.output_manager)
            .field("seat", &self.seat)
            .field("animation", &self.animation)
            .field("keybindings", &self.keybindings)
            .field("config", &self.config)
            .field("exit_code", &self.exit_code)
            .field("ipc_socket_path", &self.ipc_socket_path)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Drop for State<B> {
    fn drop(&mut self) {
        if let Some(path) = self.ipc_socket_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl<B: Backend> State<B> {
    pub fn new(backend: B, config: cardboard_config::Config, loop_signal: LoopSignal) -> Self {
        let seat = Seat::new(config.mouse_mods);
        let animation = ViewAnimation::new(config.animation.duration());
        Self {
            surfaces: SurfaceManager::new(),
            output_manager: OutputManager::new(),
            seat,
            animation,
            keybindings: KeybindingTable::new(),
            config,
            backend,
            exit_code: 0,
            loop_signal,
            ipc_socket_path: None,
        }
    }

    /// Registers a newly enabled output and assigns it a workspace. The id minted here is what a
    /// concrete backend uses to name this output in every future [`BackendEvent`].
    pub fn add_output(&mut self, size: Size<i32, smithay::utils::Logical>) -> OutputId {
        let output = self.output_manager.register_output(&mut self.surfaces.views, size);
        if let Some(workspace) = self.output_manager.workspaces.iter_mut().find(|ws| ws.output == Some(output)) {
            workspace.gap = self.config.gap;
        }
        output
    }

    /// Registers a freshly created (not yet mapped) view. The id minted here is what a concrete
    /// backend uses to name this view in every future [`BackendEvent`].
    pub fn add_view(&mut self, shell: ShellKind, geometry: Box2) -> ViewId {
        self.surfaces.insert_view(shell, geometry)
    }

    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::OutputDestroyed { id } => {
                self.output_manager.remove(&mut self.surfaces.views, id);
            }
            BackendEvent::ViewMapped { id } => self.map_view(id),
            BackendEvent::ViewUnmapped { id } => self.unmap_view(id),
            BackendEvent::ViewDestroyed { id } => self.destroy_view(id),
            BackendEvent::Presented { output } => {
                if let Some(output) = self.output_manager.get_mut(output) {
                    output.last_presented = crate::utils::get_monotonic_time();
                }
            }
        }
    }

    /// Marks `view` mapped, places it into the first available output's active workspace if it
    /// doesn't already belong to one, and gives it focus.
    fn map_view(&mut self, view: ViewId) {
        let Some(view_state) = self.surfaces.views.get_mut(view) else {
            return;
        };
        view_state.mapped = true;

        if self.surfaces.views[view].workspace_id.is_none() {
            let output = self.output_manager.outputs().next().map(|(id, _)| id);
            if let Some(output) = output {
                let workspace_idx = self
                    .output_manager
                    .workspaces
                    .iter()
                    .position(|ws| ws.output == Some(output));
                if let Some(workspace_idx) = workspace_idx {
                    let geometry = self.output_manager.workspace_geometry(output);
                    self.output_manager.workspaces[workspace_idx].add_view(
                        &mut self.surfaces.views,
                        view,
                        None,
                        false,
                        false,
                        geometry,
                    );
                }
            }
        }

        self.seat.focus_view(&mut self.surfaces, &mut self.output_manager, Some(view));
        if let Some(output) = self.surfaces.views[view].output {
            self.backend.schedule_redraw(output);
        }
    }

    /// Marks `view` unmapped and re-arranges its column so tiling skips it, without forgetting
    /// its place in the workspace — a view can remap later (e.g. after a client minimizes and
    /// restores it) and picks its spot back up.
    fn unmap_view(&mut self, view: ViewId) {
        if let Some(view_state) = self.surfaces.views.get_mut(view) {
            view_state.mapped = false;
        } else {
            return;
        }
        self.seat.on_view_destroyed(view);
        self.animation.cancel_tasks(&mut self.surfaces.views, view);

        if let Some(workspace_idx) = self.surfaces.views[view].workspace_id {
            let geometry = self.output_manager.workspace_geometry_for_workspace(workspace_idx);
            self.output_manager.workspaces[workspace_idx].arrange_workspace(
                &mut self.surfaces.views,
                geometry,
                Some(&mut self.animation),
            );
        }
    }

    fn destroy_view(&mut self, view: ViewId) {
        let workspace_idx = self.surfaces.views.get(view).and_then(|v| v.workspace_id);
        if let Some(workspace_idx) = workspace_idx {
            let geometry = self.output_manager.workspace_geometry_for_workspace(workspace_idx);
            self.output_manager.workspaces[workspace_idx].remove_view(
                &mut self.surfaces.views,
                view,
                false,
                geometry,
            );
        }
        self.seat.on_view_destroyed(view);
        self.animation.cancel_tasks(&mut self.surfaces.views, view);
        self.surfaces.destroy_view(view);
    }

    /// Runs a command straight from its wire form, the single path both IPC and keybinding
    /// dispatch funnel through. A `Quit` result stops the event loop and records the exit code
    /// the caller should shut down with.
    pub fn run_command(&mut self, data: CommandData) -> CommandResult {
        let command = dispatch_command(data);
        let mut ctx = CommandContext {
            surfaces: &mut self.surfaces,
            output_manager: &mut self.output_manager,
            seat: &mut self.seat,
            keybindings: &mut self.keybindings,
            config: &mut self.config,
            backend: &mut self.backend,
        };
        let result = command(&mut ctx);
        if let Some(code) = result.quit {
            self.exit_code = code;
            self.loop_signal.stop();
        }
        result
    }

    /// Looks up `(mods, key)` in the keybinding table and runs the bound command, if any.
    /// Returns whether the key was handled, so the caller knows whether to forward the event to a
    /// client instead. `XF86Switch_VT_<n>` is always honored, even with an `exclusive_client` set,
    /// so a client that grabs the seat can never lock the user out of switching VTs. Every other
    /// binding is skipped while `exclusive_client` is set.
    pub fn handle_key(&mut self, mods: u32, key: &str) -> bool {
        if let Some(vt) = vt_switch_target(key) {
            self.backend.switch_vt(vt);
            return true;
        }

        if self.seat.exclusive_client.is_some() {
            return false;
        }

        let Some(command) = self.keybindings.lookup(mods, key).cloned() else {
            return false;
        };
        self.run_command(command);
        true
    }

    /// One tick of everything driven by the fixed-period animation timer: the move/resize
    /// animation queue and an in-progress touchpad workspace-scroll's inertia.
    pub fn tick(&mut self, now: Duration) {
        self.animation.tick(&mut self.surfaces.views, now);
        self.seat.tick_workspace_scroll(&mut self.surfaces.views, &mut self.output_manager);
    }

    /// Binds the IPC socket and registers it plus the animation timer on `loop_handle`. Call once
    /// at startup, after the loop itself exists but before running it.
    pub fn insert_sources(
        &mut self,
        loop_handle: &LoopHandle<'static, Self>,
        socket_path: PathBuf,
    ) -> io::Result<()> {
        let listener = crate::ipc::bind(&socket_path)?;
        self.ipc_socket_path = Some(socket_path);

        loop_handle
            .insert_source(
                Generic::new(listener, Interest::READ, Mode::Level),
                |_readiness, listener, state| {
                    crate::ipc::drain(listener, |data| state.run_command(data));
                    Ok(PostAction::Continue)
                },
            )
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;

        let period = self.config.animation.ms_per_frame();
        loop_handle
            .insert_source(Timer::from_duration(period), move |_deadline, _metadata, state| {
                state.tick(crate::utils::get_monotonic_time());
                TimeoutAction::ToDuration(period)
            })
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;

        Ok(())
    }
}

/// Parses an `XF86Switch_VT_<n>` keysym name (1-12, matched case-insensitively like every other
/// keysym in this crate) into its target VT number.
fn vt_switch_target(key: &str) -> Option<u32> {
    let n: u32 = key.to_lowercase().strip_prefix("xf86switch_vt_")?.parse().ok()?;
    (1..=12).contains(&n).then_some(n)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use calloop::EventLoop;

    use super::*;
    use crate::backend::headless::HeadlessBackend;
    use crate::utils::geometry::Point2;
    use crate::window::ShellKind;

    fn state() -> State<HeadlessBackend> {
        let event_loop: EventLoop<'static, State<HeadlessBackend>> = EventLoop::try_new().unwrap();
        let signal = event_loop.get_signal();
        State::new(HeadlessBackend::new(), cardboard_config::Config::default(), signal)
    }

    #[test]
    fn mapping_a_view_places_it_in_the_active_workspace_and_focuses_it() {
        let mut state = state();
        let output = state.add_output(Size::from((1920, 1080)));
        let view = state.add_view(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (300, 300)));

        state.handle_backend_event(BackendEvent::ViewMapped { id: view });

        assert!(state.surfaces.views[view].mapped);
        assert_eq!(state.surfaces.views[view].output, Some(output));
        assert_eq!(state.seat.focused_view, Some(view));
        assert_eq!(state.backend.redraws_scheduled, vec![output]);
    }

    #[test]
    fn destroying_a_mapped_view_empties_its_column() {
        let mut state = state();
        state.add_output(Size::from((1920, 1080)));
        let view = state.add_view(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (300, 300)));
        state.handle_backend_event(BackendEvent::ViewMapped { id: view });

        state.handle_backend_event(BackendEvent::ViewDestroyed { id: view });

        assert!(state.surfaces.views.get(view).is_none());
        assert!(state.output_manager.workspaces[0].columns.is_empty());
        assert_eq!(state.seat.focused_view, None);
    }

    #[test]
    fn unmapping_a_view_keeps_its_column_slot_but_clears_mapped() {
        let mut state = state();
        state.add_output(Size::from((1920, 1080)));
        let view = state.add_view(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (300, 300)));
        state.handle_backend_event(BackendEvent::ViewMapped { id: view });

        state.handle_backend_event(BackendEvent::ViewUnmapped { id: view });

        assert!(!state.surfaces.views[view].mapped);
        assert!(state.output_manager.workspaces[0].find_column(view).is_some());
    }

    #[test]
    fn presented_event_records_a_timestamp_on_the_output() {
        let mut state = state();
        let output = state.add_output(Size::from((1920, 1080)));

        state.handle_backend_event(BackendEvent::Presented { output });

        assert!(state.output_manager.get(output).unwrap().last_presented > Duration::ZERO);
    }

    #[test]
    fn run_command_quit_sets_exit_code_and_stops_the_loop() {
        let mut state = state();
        let result = state.run_command(CommandData::Quit { code: 5 });
        assert_eq!(result.quit, Some(5));
        assert_eq!(state.exit_code, 5);
    }

    #[test]
    fn handle_key_runs_the_bound_command_and_reports_it_was_handled() {
        let mut state = state();
        state.keybindings.bind(1 << 6, "q", CommandData::Quit { code: 9 });

        assert!(state.handle_key(1 << 6, "q"));
        assert_eq!(state.exit_code, 9);
    }

    #[test]
    fn handle_key_returns_false_for_an_unbound_key() {
        let mut state = state();
        assert!(!state.handle_key(0, "x"));
    }

    #[test]
    fn handle_key_skips_bindings_while_an_exclusive_client_is_set() {
        let mut state = state();
        state.keybindings.bind(1 << 6, "q", CommandData::Quit { code: 9 });
        state.seat.exclusive_client = Some(crate::window::ClientId(1));

        assert!(!state.handle_key(1 << 6, "q"));
        assert_eq!(state.exit_code, 0);
    }

    #[test]
    fn handle_key_always_honors_a_vt_switch_even_with_an_exclusive_client_set() {
        let mut state = state();
        state.seat.exclusive_client = Some(crate::window::ClientId(1));

        assert!(state.handle_key(0, "XF86Switch_VT_3"));
        assert_eq!(state.backend.vt_switches, vec![3]);
    }

    #[test]
    fn tick_advances_a_queued_move_animation_to_completion() {
        let mut state = state();
        state.add_output(Size::from((1920, 1080)));
        let view = state.add_view(ShellKind::XdgToplevel, Box2::from_loc_and_size((0, 0), (300, 300)));
        state.handle_backend_event(BackendEvent::ViewMapped { id: view });

        let now = crate::utils::get_monotonic_time();
        state
            .animation
            .enqueue_task(view, Point2::from((0, 0)), Point2::from((100, 0)));
        state.tick(now + Duration::from_secs(1));

        assert_eq!(state.surfaces.views[view].x, 100);
    }

    #[test]
    fn insert_sources_wires_the_ipc_socket_to_run_command() {
        let mut event_loop: EventLoop<'static, State<HeadlessBackend>> = EventLoop::try_new().unwrap();
        let signal = event_loop.get_signal();
        let mut state = State::new(HeadlessBackend::new(), cardboard_config::Config::default(), signal);

        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("cardboard.sock");
        state.insert_sources(&event_loop.handle(), socket_path.clone()).unwrap();

        let mut client = std::os::unix::net::UnixStream::connect(&socket_path).unwrap();
        client
            .write_all(&cardboard_ipc::encode_command(&CommandData::Quit { code: 4 }).unwrap())
            .unwrap();

        event_loop
            .dispatch(Some(Duration::from_millis(200)), &mut state)
            .unwrap();

        assert_eq!(state.exit_code, 4);
    }
}
