//! A `Backend` that does nothing but record what it was asked to do. Drives the core engine in
//! unit and integration tests without a real display server attached.

use std::collections::HashMap;

use crate::output::OutputId;
use crate::utils::geometry::{Box2, Size};
use crate::window::ViewId;

use super::Backend;

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    pub configured: Vec<(ViewId, Box2)>,
    pub closed: Vec<ViewId>,
    pub redraws_scheduled: Vec<OutputId>,
    pub vt_switches: Vec<u32>,
    output_sizes: HashMap<OutputId, Size<i32, smithay::utils::Logical>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_output_size(&mut self, output: OutputId, size: Size<i32, smithay::utils::Logical>) {
        self.output_sizes.insert(output, size);
    }
}

impl Backend for HeadlessBackend {
    fn configure_view(&mut self, view: ViewId, geometry: Box2) {
        self.configured.push((view, geometry));
    }

    fn close_view(&mut self, view: ViewId) {
        self.closed.push(view);
    }

    fn schedule_redraw(&mut self, output: OutputId) {
        self.redraws_scheduled.push(output);
    }

    fn output_size(&self, output: OutputId) -> Option<Size<i32, smithay::utils::Logical>> {
        self.output_sizes.get(&output).copied()
    }

    fn switch_vt(&mut self, vt: u32) {
        self.vt_switches.push(vt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_every_configure_call() {
        let mut backend = HeadlessBackend::new();
        let mut views: slotmap::SlotMap<ViewId, ()> = slotmap::SlotMap::with_key();
        let view = views.insert(());
        backend.configure_view(view, Box2::from_loc_and_size((0, 0), (100, 100)));
        assert_eq!(backend.configured.len(), 1);
    }
}
