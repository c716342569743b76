// Turns continuous input (wheel bursts, swipes, keys) into single-step navigation
// and throttles it. The visual change is delegated to the TransitionController.

use log::debug;

use crate::config::NavigatorSettings;
use crate::error::SiteError;
use crate::timers::{TimerId, TimerQueue};
use crate::transition::TransitionController;
use crate::types::*;

/// Body background for sections without `data-bgColor`.
pub(crate) const DEFAULT_BG_COLOR: &str = "#000";

/// An accepted navigation, from one section index to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavigatorTimer {
    Unlock,
    WheelSettled,
}

pub struct SectionNavigator {
    settings: NavigatorSettings,
    current_index: usize,
    is_scrolling: bool,
    touch_start_y: Option<f64>,
    pending_wheel: Option<Direction>,
    wheel_timer: Option<TimerId>,
    timers: TimerQueue<NavigatorTimer>,
}

impl SectionNavigator {
    pub fn new(current_index: usize, settings: NavigatorSettings) -> Self {
        SectionNavigator {
            settings,
            current_index,
            is_scrolling: false,
            touch_start_y: None,
            pending_wheel: None,
            wheel_timer: None,
            timers: TimerQueue::new(),
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_scrolling(&self) -> bool {
        self.is_scrolling
    }

    /// Document clicks are swallowed while the navigation lock is held.
    pub fn blocks_clicks(&self) -> bool {
        self.is_scrolling
    }

    fn is_locked(&self, transitions: &TransitionController) -> bool {
        self.is_scrolling || transitions.is_transitioning()
    }

    /// Step one section. No-op while locked or at either end of the list.
    pub fn scroll(
        &mut self,
        direction: Direction,
        now: Timestamp,
        transitions: &mut TransitionController,
        out: &mut Vec<DomCommand>,
    ) -> Option<Navigation> {
        if self.is_locked(transitions) {
            return None;
        }
        let target = direction.step(self.current_index, transitions.len())?;
        self.navigate_to_index(target, now, transitions, out)
    }

    /// Jump straight to a section by id.
    pub fn navigate_to(
        &mut self,
        id: &SectionId,
        now: Timestamp,
        transitions: &mut TransitionController,
        out: &mut Vec<DomCommand>,
    ) -> Result<Option<Navigation>, SiteError> {
        let index = transitions
            .index_of(id)
            .ok_or_else(|| SiteError::UnknownSection(id.clone()))?;
        Ok(self.navigate_to_index(index, now, transitions, out))
    }

    /// Jump straight to a section by position.
    pub fn navigate_to_index(
        &mut self,
        index: usize,
        now: Timestamp,
        transitions: &mut TransitionController,
        out: &mut Vec<DomCommand>,
    ) -> Option<Navigation> {
        if index >= transitions.len()
            || index == self.current_index
            || self.is_locked(transitions)
        {
            return None;
        }
        if let Err(err) = transitions.transition_to(index, now, out) {
            debug!("navigation to {} refused: {}", index, err);
            return None;
        }

        let from = self.current_index;
        self.current_index = index;
        self.is_scrolling = true;
        self.timers
            .schedule(now.after(self.settings.scroll_delay_ms), NavigatorTimer::Unlock);

        out.push(DomCommand::SetNavIndicator { index });
        let color = transitions
            .section(index)
            .and_then(|s| s.bg_color.clone())
            .unwrap_or_else(|| DEFAULT_BG_COLOR.to_string());
        out.push(DomCommand::SetBodyBackground(color));

        debug!("navigate {} -> {}", from, index);
        Some(Navigation { from, to: index })
    }

    /// Feed one wheel event. A burst collapses into one step once it goes quiet.
    pub fn wheel(&mut self, delta_y: f64, now: Timestamp, transitions: &TransitionController) {
        if self.is_locked(transitions) {
            return;
        }
        let Some(direction) = Direction::from_delta(delta_y) else {
            return;
        };
        self.pending_wheel = Some(direction);
        if let Some(id) = self.wheel_timer.take() {
            self.timers.cancel(id);
        }
        let due = now.after(self.settings.wheel_debounce_ms);
        self.wheel_timer = Some(self.timers.schedule(due, NavigatorTimer::WheelSettled));
    }

    pub fn key(
        &mut self,
        key: &str,
        now: Timestamp,
        transitions: &mut TransitionController,
        out: &mut Vec<DomCommand>,
    ) -> Option<Navigation> {
        let direction = match key {
            "ArrowDown" | "ArrowRight" | "PageDown" => Direction::Next,
            "ArrowUp" | "ArrowLeft" | "PageUp" => Direction::Previous,
            _ => return None,
        };
        self.scroll(direction, now, transitions, out)
    }

    pub fn touch_start(&mut self, y: f64) {
        self.touch_start_y = Some(y);
    }

    /// Forget a touch whose end was consumed elsewhere.
    pub fn cancel_touch(&mut self) {
        self.touch_start_y = None;
    }

    /// Finger moving up (start below end) advances.
    pub fn touch_end(
        &mut self,
        y: f64,
        now: Timestamp,
        transitions: &mut TransitionController,
        out: &mut Vec<DomCommand>,
    ) -> Option<Navigation> {
        let start = self.touch_start_y.take()?;
        let diff = start - y;
        if diff.abs() <= self.settings.swipe_threshold_px {
            return None;
        }
        let direction = Direction::from_delta(diff)?;
        self.scroll(direction, now, transitions, out)
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_due()
    }

    /// Drop the unlock and any pending wheel step. Releases the lock.
    pub fn clear_timers(&mut self) {
        self.timers.clear();
        self.wheel_timer = None;
        self.pending_wheel = None;
        self.touch_start_y = None;
        self.is_scrolling = false;
    }

    pub fn fire_next(
        &mut self,
        now: Timestamp,
        transitions: &mut TransitionController,
        out: &mut Vec<DomCommand>,
    ) -> Option<Navigation> {
        let (_, _, timer) = self.timers.pop_due(now)?;
        match timer {
            NavigatorTimer::Unlock => {
                self.is_scrolling = false;
                None
            }
            NavigatorTimer::WheelSettled => {
                self.wheel_timer = None;
                let direction = self.pending_wheel.take()?;
                self.scroll(direction, now, transitions, out)
            }
        }
    }
}
