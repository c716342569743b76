// Landing-section loop: cycles (font, image) pairs on a fixed interval, cross-fading
// two background layers so a swap never shows a blank frame.

use log::{debug, info, warn};

use crate::config::HomeSettings;
use crate::timers::{TimerId, TimerQueue};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeState {
    Stopped,
    Running,
    /// Terminal; start/stop are no-ops afterwards.
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HomeTimer {
    Tick,
}

pub struct HomeAnimator {
    settings: HomeSettings,
    state: HomeState,
    enabled: bool,
    started_once: bool,
    /// Pair currently on screen.
    index: usize,
    visible_layer: BackgroundLayer,
    tick: Option<TimerId>,
    timers: TimerQueue<HomeTimer>,
}

impl HomeAnimator {
    pub fn new(settings: HomeSettings) -> Self {
        HomeAnimator {
            settings,
            state: HomeState::Stopped,
            enabled: true,
            started_once: false,
            index: 0,
            visible_layer: BackgroundLayer::Primary,
            tick: None,
            timers: TimerQueue::new(),
        }
    }

    /// Animator for a page without the landing title. Never starts.
    pub fn disabled(settings: HomeSettings) -> Self {
        warn!("landing title element not found, home animation disabled");
        HomeAnimator {
            enabled: false,
            ..HomeAnimator::new(settings)
        }
    }

    pub fn state(&self) -> HomeState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == HomeState::Running
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_started(&self) -> bool {
        self.started_once
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn visible_layer(&self) -> BackgroundLayer {
        self.visible_layer
    }

    /// First pair on the primary layer, secondary hidden.
    pub fn initial_commands(&self, out: &mut Vec<DomCommand>) {
        if !self.enabled {
            return;
        }
        let Some(first) = self.settings.pairs.first() else {
            return;
        };
        out.push(DomCommand::Home(HomeCommand::SetLayerImage {
            layer: BackgroundLayer::Primary,
            image: first.image.clone(),
        }));
        out.push(DomCommand::Home(HomeCommand::SetLayerOpacity {
            layer: BackgroundLayer::Primary,
            opacity: 1.0,
        }));
        out.push(DomCommand::Home(HomeCommand::SetLayerOpacity {
            layer: BackgroundLayer::Secondary,
            opacity: 0.0,
        }));
        out.push(DomCommand::Home(HomeCommand::SetTitleFont(first.font.clone())));
    }

    /// `Stopped -> Running`. Returns whether the state changed.
    pub fn start(&mut self, now: Timestamp) -> bool {
        if !self.enabled || self.state != HomeState::Stopped || self.settings.pairs.is_empty() {
            return false;
        }
        self.state = HomeState::Running;
        self.started_once = true;
        let first = match self.settings.initial_delay_ms {
            0 => self.settings.interval_ms,
            delay => delay,
        };
        self.tick = Some(self.timers.schedule(now.after(first), HomeTimer::Tick));
        info!("home animation started");
        true
    }

    /// `Running -> Stopped`, cancelling the pending tick.
    pub fn stop(&mut self) -> bool {
        if self.state != HomeState::Running {
            return false;
        }
        if let Some(id) = self.tick.take() {
            self.timers.cancel(id);
        }
        self.state = HomeState::Stopped;
        debug!("home animation stopped at pair {}", self.index);
        true
    }

    /// Idempotent teardown.
    pub fn destroy(&mut self) {
        if self.state == HomeState::Destroyed {
            return;
        }
        self.stop();
        self.timers.clear();
        self.state = HomeState::Destroyed;
    }

    pub fn on_landing_left(&mut self, out: &mut Vec<DomCommand>) {
        self.stop();
        if self.enabled {
            out.push(DomCommand::Home(HomeCommand::SetVisible(false)));
        }
    }

    pub fn on_landing_entered(&mut self, out: &mut Vec<DomCommand>) {
        if self.enabled && self.state != HomeState::Destroyed {
            out.push(DomCommand::Home(HomeCommand::SetVisible(true)));
        }
    }

    /// Stop when a transition settles anywhere but the landing section.
    pub fn on_transition_complete(&mut self, event: &TransitionComplete, landing: &SectionId) {
        if event.section != *landing {
            self.stop();
        }
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_due()
    }

    pub fn fire_next(&mut self, now: Timestamp, out: &mut Vec<DomCommand>) {
        let Some((_, due, HomeTimer::Tick)) = self.timers.pop_due(now) else {
            return;
        };
        self.tick = None;
        if self.state != HomeState::Running {
            return;
        }
        self.advance(out);
        self.tick = Some(
            self.timers
                .schedule(due.after(self.settings.interval_ms), HomeTimer::Tick),
        );
    }

    fn advance(&mut self, out: &mut Vec<DomCommand>) {
        let len = self.settings.pairs.len();
        if len == 0 {
            return;
        }
        self.index = (self.index + 1) % len;
        let pair = &self.settings.pairs[self.index];

        out.push(DomCommand::Home(HomeCommand::SetTitleFont(pair.font.clone())));
        out.push(DomCommand::Home(HomeCommand::ReflowTitle));

        let incoming = self.visible_layer.other();
        out.push(DomCommand::Home(HomeCommand::SetLayerImage {
            layer: incoming,
            image: pair.image.clone(),
        }));
        out.push(DomCommand::Home(HomeCommand::SetLayerOpacity {
            layer: incoming,
            opacity: 1.0,
        }));
        out.push(DomCommand::Home(HomeCommand::SetLayerOpacity {
            layer: self.visible_layer,
            opacity: 0.0,
        }));
        self.visible_layer = incoming;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn run_until(home: &mut HomeAnimator, now: Timestamp, out: &mut Vec<DomCommand>) {
        while home.next_deadline().is_some_and(|d| d <= now) {
            home.fire_next(now, out);
        }
    }

    #[test]
    fn ticks_advance_and_alternate_layers() {
        let mut home = HomeAnimator::new(HomeSettings::default());
        let mut out = Vec::new();
        assert!(home.start(ts(0)));
        assert!(!home.start(ts(5)));

        run_until(&mut home, ts(100), &mut out);
        assert_eq!(home.index(), 1);
        assert_eq!(home.visible_layer(), BackgroundLayer::Secondary);
        assert!(out.contains(&DomCommand::Home(HomeCommand::SetLayerImage {
            layer: BackgroundLayer::Secondary,
            image: "assets/images/index_univ_2.png".to_string(),
        })));
        assert!(out.contains(&DomCommand::Home(HomeCommand::ReflowTitle)));

        run_until(&mut home, ts(300), &mut out);
        assert_eq!(home.index(), 3);
        assert_eq!(home.visible_layer(), BackgroundLayer::Secondary);
    }

    #[test]
    fn index_wraps_around_the_pairs() {
        let mut home = HomeAnimator::new(HomeSettings::default());
        let mut out = Vec::new();
        home.start(ts(0));
        run_until(&mut home, ts(900), &mut out);
        assert_eq!(home.index(), 0);
    }

    #[test]
    fn stop_cancels_the_pending_tick() {
        let mut home = HomeAnimator::new(HomeSettings::default());
        let mut out = Vec::new();
        home.start(ts(0));
        run_until(&mut home, ts(150), &mut out);
        assert!(home.stop());
        assert_eq!(home.state(), HomeState::Stopped);
        assert_eq!(home.next_deadline(), None);

        out.clear();
        run_until(&mut home, ts(10_000), &mut out);
        assert!(out.is_empty());
        assert_eq!(home.index(), 1);
    }

    #[test]
    fn completion_elsewhere_stops_landing_does_not() {
        let mut home = HomeAnimator::new(HomeSettings::default());
        let landing = SectionId::new("home");
        home.start(ts(0));

        let back_home = TransitionComplete {
            section: landing.clone(),
            previous_section: Some("a".into()),
            source: None,
        };
        home.on_transition_complete(&back_home, &landing);
        assert!(home.is_running());

        let away = TransitionComplete {
            section: "a".into(),
            previous_section: Some(landing.clone()),
            source: None,
        };
        home.on_transition_complete(&away, &landing);
        assert_eq!(home.state(), HomeState::Stopped);
    }

    #[test]
    fn destroyed_animator_never_restarts() {
        let mut home = HomeAnimator::new(HomeSettings::default());
        home.start(ts(0));
        home.destroy();
        home.destroy();
        assert_eq!(home.state(), HomeState::Destroyed);
        assert!(!home.start(ts(10)));
        assert_eq!(home.next_deadline(), None);
    }

    #[test]
    fn disabled_animator_stays_stopped() {
        let mut home = HomeAnimator::disabled(HomeSettings::default());
        let mut out = Vec::new();
        assert!(!home.start(ts(0)));
        home.initial_commands(&mut out);
        home.on_landing_left(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn initial_delay_postpones_the_first_change() {
        let settings = HomeSettings {
            initial_delay_ms: 1_000,
            interval_ms: 2_000,
            ..Default::default()
        };
        let mut home = HomeAnimator::new(settings);
        let mut out = Vec::new();
        home.start(ts(0));
        assert_eq!(home.next_deadline(), Some(ts(1_000)));
        run_until(&mut home, ts(1_000), &mut out);
        assert_eq!(home.index(), 1);
        assert_eq!(home.next_deadline(), Some(ts(3_000)));
    }
}
