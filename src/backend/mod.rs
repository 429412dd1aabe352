//! The display-server backend boundary.
//!
//! Output enumeration, input devices, rendering, and the xdg-shell/layer-shell/xwayland protocol
//! machinery all live on the other side of this trait. The core engine only needs to (a) receive
//! a stream of [`BackendEvent`]s and (b) issue a small set of imperative requests back
//! (reconfigure a view's geometry, close a surface, ask for a redraw). Everything else —
//! compositing, buffer management, DRM/GL details — is the concrete backend's problem.

#[cfg(feature = "headless-backend")]
pub mod headless;

use crate::output::OutputId;
use crate::utils::geometry::{Box2, Size};
use crate::window::ViewId;

/// Events a concrete backend feeds into the core loop, for everything that happens to an
/// already-known [`OutputId`]/[`ViewId`]. Creation is deliberately not an event: `OutputId` and
/// `ViewId` are slotmap keys only the core engine can mint, so a backend that detects a new output
/// or view calls [`crate::output::OutputManager::register_output`] /
/// [`crate::surface_manager::SurfaceManager::insert_view`] directly and gets the id back
/// synchronously, before any further event naming that id can occur.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    OutputDestroyed {
        id: OutputId,
    },
    ViewMapped {
        id: ViewId,
    },
    ViewUnmapped {
        id: ViewId,
    },
    ViewDestroyed {
        id: ViewId,
    },
    /// A frame was presented on `output`; used to pace the animation timer and any
    /// presentation-feedback bookkeeping a concrete backend layers on top.
    Presented {
        output: OutputId,
    },
}

/// The imperative half of the boundary: requests the core engine issues to whatever backend is
/// driving it.
pub trait Backend {
    /// Ask the backend to move/resize the client surface behind `view` to `geometry` (in global
    /// logical coordinates).
    fn configure_view(&mut self, view: ViewId, geometry: Box2);

    /// Ask the backend to send a close/destroy request to the client behind `view`.
    fn close_view(&mut self, view: ViewId);

    /// Ask the backend to schedule a redraw of `output` on its next available frame slot.
    fn schedule_redraw(&mut self, output: OutputId);

    /// The current logical size of `output`, or `None` if it is unknown/destroyed.
    fn output_size(&self, output: OutputId) -> Option<Size<i32, smithay::utils::Logical>>;

    /// Ask the backend to switch the active virtual terminal, in response to an
    /// `XF86Switch_VT_<n>` keysym. A backend with no session/seatd handle to do this with (or one
    /// that isn't running on a VT at all, like this crate's own headless backend) can no-op.
    fn switch_vt(&mut self, vt: u32);
}
