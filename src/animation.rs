//! The single FIFO view-movement animation queue, driven by a fixed-period timer.
//!
//! There is exactly one of these per core; every tiled/floating view move that wants to animate
//! (instead of snapping) goes through it. Tasks are plain data — no timer plumbing lives here,
//! since arming/disarming the actual `calloop` timer is [`crate::state::State`]'s job.

use std::collections::VecDeque;
use std::time::Duration;

use slotmap::SlotMap;

use crate::utils::geometry::Point2;
use crate::window::{View, ViewId};

type FinishedCallback = Box<dyn FnOnce(&mut SlotMap<ViewId, View>)>;

/// One in-flight move: a view sliding from `start` to `target` over `duration`, timestamped by
/// `start_time` ([`crate::utils::get_monotonic_time`]).
pub struct AnimationTask {
    view: ViewId,
    start: Point2,
    target: Point2,
    start_time: Duration,
    cancelled: bool,
    finished_callback: Option<FinishedCallback>,
}

impl std::fmt::Debug for AnimationTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationTask")
            .field("view", &self.view)
            .field("start", &self.start)
            .field("target", &self.target)
            .field("start_time", &self.start_time)
            .field("cancelled", &self.cancelled)
            .field("finished_callback", &self.finished_callback.is_some())
            .finish()
    }
}

/// Smoothstep: `t²(3−2t)`, clamped to `[0, 1]`.
fn ease(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[derive(Debug)]
pub struct ViewAnimation {
    tasks: VecDeque<AnimationTask>,
    duration: Duration,
}

impl ViewAnimation {
    pub fn new(duration: Duration) -> Self {
        Self {
            tasks: VecDeque::new(),
            duration,
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Enqueues a move from `start` to `target`, timestamped now.
    pub fn enqueue_task(&mut self, view: ViewId, start: Point2, target: Point2) {
        self.enqueue_task_with_callback(view, start, target, None);
    }

    pub fn enqueue_task_with_callback(
        &mut self,
        view: ViewId,
        start: Point2,
        target: Point2,
        finished_callback: Option<FinishedCallback>,
    ) {
        self.tasks.push_back(AnimationTask {
            view,
            start,
            target,
            start_time: crate::utils::get_monotonic_time(),
            cancelled: false,
            finished_callback,
        });
    }

    /// Marks every task referencing `view` as cancelled and snaps it straight to the most
    /// recently enqueued target for it, if any.
    pub fn cancel_tasks(&mut self, views: &mut SlotMap<ViewId, View>, view: ViewId) {
        let mut last_target = None;
        for task in &mut self.tasks {
            if task.view == view {
                task.cancelled = true;
                last_target = Some(task.target);
            }
        }
        if let Some(target) = last_target {
            if let Some(v) = views.get_mut(view) {
                v.move_to(target.x, target.y);
            }
        }
    }

    /// Drains the queue once: advances every task by `now`, dropping cancelled ones, applying
    /// eased positions, and re-enqueueing anything not yet finished. Call this on every
    /// `ms_per_frame` timer tick.
    pub fn tick(&mut self, views: &mut SlotMap<ViewId, View>, now: Duration) {
        let pending: Vec<AnimationTask> = self.tasks.drain(..).collect();
        for mut task in pending {
            if task.cancelled || !views.contains_key(task.view) {
                continue;
            }

            let elapsed = now.saturating_sub(task.start_time).as_secs_f64();
            let t = elapsed / self.duration.as_secs_f64().max(f64::EPSILON);
            let progress = ease(t);

            let x = task.start.x as f64 - progress * (task.start.x - task.target.x) as f64;
            let y = task.start.y as f64 - progress * (task.start.y - task.target.y) as f64;
            if let Some(view) = views.get_mut(task.view) {
                view.x = x.round() as i32;
                view.y = y.round() as i32;
                view.target_x = task.target.x;
                view.target_y = task.target.y;
            }

            if t < 0.999 {
                self.tasks.push_back(task);
            } else if let Some(callback) = task.finished_callback.take() {
                callback(views);
            }
        }
    }
}
