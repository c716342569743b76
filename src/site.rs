// Site coordinator. Builds the modules in a fixed order, routes page input to them and
// fires their timers in due order. Pure Rust: the wasm layer feeds it timestamps and
// applies the commands it returns.

use log::{debug, info, warn};

use crate::config::SiteConfig;
use crate::contact::ContactForm;
use crate::descriptions::split_sentences;
use crate::error::SiteError;
use crate::events::{EventBus, SubscriptionId};
use crate::grid::ContactGrid;
use crate::home::HomeAnimator;
use crate::menu::MenuController;
use crate::navigator::{Navigation, SectionNavigator, DEFAULT_BG_COLOR};
use crate::timers::TimerQueue;
use crate::transition::TransitionController;
use crate::types::*;
use crate::video::VideoDeck;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SiteTimer {
    MarkLoaded,
}

/// Timer owners, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerSource {
    Site,
    Transitions,
    Navigator,
    Menu,
    Video,
    Home,
    Grid,
    Contact,
}

pub struct Site {
    config: SiteConfig,
    landing: SectionId,
    transitions: TransitionController,
    navigator: SectionNavigator,
    video: VideoDeck,
    home: HomeAnimator,
    menu: MenuController,
    grid: ContactGrid,
    contact: ContactForm,
    descriptions: Vec<String>,
    players: Vec<(PlayerId, SectionId)>,
    timers: TimerQueue<SiteTimer>,
    bus: EventBus<TransitionComplete>,
    mounted: bool,
    destroyed: bool,
}

impl Site {
    /// Sections first, then transitions, navigator, video, home, menu and the
    /// contact section. Every module exists before any input can reach it.
    pub fn new(config: SiteConfig, layout: PageLayout) -> Result<Self, SiteError> {
        config.validate()?;
        let landing = SectionId::new(config.landing_section.clone());

        let transitions = TransitionController::new(layout.sections, config.transition.clone())?;
        let navigator = SectionNavigator::new(
            transitions.current_index().unwrap_or(0),
            config.navigator.clone(),
        );
        let video = VideoDeck::new(config.video.clone());

        let players = layout
            .players
            .into_iter()
            .filter(|(player, section)| {
                let known = transitions.index_of(section).is_some();
                if !known {
                    warn!("{} sits outside any section ({}), ignored", player, section);
                }
                known
            })
            .collect();

        let home = if !layout.has_home_title {
            HomeAnimator::disabled(config.home.clone())
        } else if transitions.index_of(&landing).is_none() {
            warn!("landing section '{}' not found", landing);
            HomeAnimator::disabled(config.home.clone())
        } else {
            HomeAnimator::new(config.home.clone())
        };

        let menu = MenuController::new(layout.menu_links, config.menu.clone());

        let grid_section = layout.contact_grid.filter(|section| {
            let known = transitions.index_of(section).is_some();
            if !known {
                warn!("grid container sits outside any section ({}), ignored", section);
            }
            known
        });
        let grid = ContactGrid::new(grid_section, layout.viewport, config.grid.clone());
        let contact = ContactForm::new(layout.has_contact_button, config.contact.clone());

        Ok(Site {
            config,
            landing,
            transitions,
            navigator,
            video,
            home,
            menu,
            grid,
            contact,
            descriptions: layout.descriptions,
            players,
            timers: TimerQueue::new(),
            bus: EventBus::new(),
            mounted: false,
            destroyed: false,
        })
    }

    /// Parse the JSON config and build the site.
    pub fn from_json(config_json: &str, layout: PageLayout) -> Result<Self, SiteError> {
        let config = SiteConfig::from_json(config_json)?;
        Self::new(config, layout)
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn transitions(&self) -> &TransitionController {
        &self.transitions
    }

    pub fn navigator(&self) -> &SectionNavigator {
        &self.navigator
    }

    pub fn video(&self) -> &VideoDeck {
        &self.video
    }

    pub fn home(&self) -> &HomeAnimator {
        &self.home
    }

    pub fn menu(&self) -> &MenuController {
        &self.menu
    }

    pub fn grid(&self) -> &ContactGrid {
        &self.grid
    }

    pub fn contact(&self) -> &ContactForm {
        &self.contact
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn current_section(&self) -> Option<&SectionId> {
        self.transitions.current_section().map(|s| &s.id)
    }

    pub fn blocks_clicks(&self) -> bool {
        !self.destroyed && self.navigator.blocks_clicks()
    }

    fn is_landing_active(&self) -> bool {
        self.current_section() == Some(&self.landing)
    }

    /// Initial page state. Only the first call produces commands.
    pub fn mount(&mut self, now: Timestamp) -> Vec<DomCommand> {
        let mut out = Vec::new();
        if self.mounted || self.destroyed {
            return out;
        }
        self.mounted = true;

        self.transitions.sync_commands(&mut out);
        if let Some(index) = self.transitions.current_index() {
            out.push(DomCommand::SetNavIndicator { index });
        }
        let current = self.transitions.current_section().cloned();
        if let Some(section) = &current {
            let color = section
                .bg_color
                .clone()
                .unwrap_or_else(|| DEFAULT_BG_COLOR.to_string());
            out.push(DomCommand::SetBodyBackground(color));
        }

        self.home.initial_commands(&mut out);
        if !self.is_landing_active() {
            self.home.on_landing_left(&mut out);
        }

        for (player, section) in &self.players {
            self.video.register(*player, section.clone(), &mut out);
        }

        if let Some(section) = &current {
            self.video.pause_all_except(&section.id, &mut out);
            self.video.reset_active_video(&section.id, &mut out);
            self.menu.highlight(section, &mut out);
        }

        for (index, text) in self.descriptions.iter().enumerate() {
            out.push(DomCommand::SplitDescription {
                index,
                lines: split_sentences(text),
            });
        }
        out.push(DomCommand::MarkAnimationsReady);

        self.grid.build(&mut out);
        if let Some(section) = &current {
            if self.grid.section() == Some(&section.id) {
                self.grid.activate(now, &mut out);
            }
        }

        self.timers
            .schedule(now.after(self.config.loaded_delay_ms), SiteTimer::MarkLoaded);

        info!(
            "site mounted: {} sections, {} players, {} menu links",
            self.transitions.len(),
            self.players.len(),
            self.menu.links().len()
        );
        out
    }

    /// Route one page input.
    pub fn handle(&mut self, event: InputEvent, now: Timestamp) -> Vec<DomCommand> {
        let mut out = Vec::new();
        if self.destroyed {
            return out;
        }

        match event {
            InputEvent::Wheel { delta_y, delta_x } => {
                self.grid.wheel(delta_x, delta_y, now);
                if !self.landing_gesture(now) {
                    self.navigator.wheel(delta_y, now, &self.transitions);
                }
            }
            InputEvent::KeyDown { key } => {
                if !self.menu.key(&key, &mut out) {
                    let step = self
                        .navigator
                        .key(&key, now, &mut self.transitions, &mut out);
                    self.after_navigation(step, &mut out);
                }
            }
            InputEvent::TouchStart { y } => self.navigator.touch_start(y),
            InputEvent::TouchEnd { y } => {
                if self.landing_gesture(now) {
                    self.navigator.cancel_touch();
                } else {
                    let step = self
                        .navigator
                        .touch_end(y, now, &mut self.transitions, &mut out);
                    self.after_navigation(step, &mut out);
                }
            }
            InputEvent::TitleClick => {
                self.landing_gesture(now);
            }
            InputEvent::MenuToggle => self.menu.toggle(now, &mut out),
            InputEvent::MenuOpen => self.menu.open(now, &mut out),
            InputEvent::MenuClose => self.menu.close(&mut out),
            InputEvent::MenuLink { section } => self.menu.link_clicked(section, now, &mut out),
            InputEvent::NavIndicator { index } => {
                let step = self
                    .navigator
                    .navigate_to_index(index, now, &mut self.transitions, &mut out);
                self.after_navigation(step, &mut out);
            }
            InputEvent::TransitionEnd { section, property } => {
                let done = self
                    .transitions
                    .visual_complete(&section, &property, &mut out);
                if let Some(done) = done {
                    self.on_complete(done, now, &mut out);
                }
            }
            InputEvent::PlayerHover { player, entered } => {
                let result = if entered {
                    self.video.hover_enter(player, &mut out)
                } else {
                    self.video.hover_leave(player, &mut out)
                };
                log_failure(result);
            }
            InputEvent::PlayToggle { player } => {
                log_failure(self.video.toggle_play(player, &mut out))
            }
            InputEvent::MuteToggle { player } => {
                log_failure(self.video.toggle_mute(player, &mut out))
            }
            InputEvent::VolumeSet { player, fraction } => {
                log_failure(self.video.set_volume(player, fraction, &mut out))
            }
            InputEvent::ProgressSeek { player, fraction } => {
                log_failure(self.video.seek_fraction(player, fraction, &mut out))
            }
            InputEvent::TimeUpdate {
                player,
                position,
                duration,
            } => log_failure(
                self.video
                    .time_update(player, position, duration, &mut out),
            ),
            InputEvent::MediaState { player, playing } => {
                log_failure(self.video.media_state(player, playing, &mut out))
            }
            InputEvent::PlaybackRejected { player, reason } => {
                log_failure(self.video.playback_rejected(player, &reason, &mut out))
            }
            InputEvent::FullscreenToggle { player } => {
                log_failure(self.video.toggle_fullscreen(player, now, &mut out))
            }
            InputEvent::FullscreenChanged { player } => {
                self.video.fullscreen_changed(player, &mut out)
            }
            InputEvent::PointerDown { x, y } => self.grid.pointer_down(x, y, &mut out),
            InputEvent::PointerMove { x, y } => self.grid.pointer_move(x, y, now),
            InputEvent::PointerUp => self.grid.pointer_up(&mut out),
            InputEvent::Resize { width, height } => {
                self.grid.resize(Viewport::new(width, height), now, &mut out)
            }
            InputEvent::ContactClick => self.contact.click(now, &mut out),
        }
        out
    }

    /// A gesture on the landing section starts the animator. Only the gesture that
    /// starts it for the first time is consumed.
    fn landing_gesture(&mut self, now: Timestamp) -> bool {
        if !self.is_landing_active() || self.transitions.is_transitioning() {
            return false;
        }
        let first = !self.home.has_started();
        self.home.start(now) && first
    }

    /// Jump to a section by id. Requests during a transition are dropped.
    pub fn navigate_to(
        &mut self,
        id: &SectionId,
        now: Timestamp,
    ) -> Result<Vec<DomCommand>, SiteError> {
        let mut out = Vec::new();
        if self.destroyed {
            return Ok(out);
        }
        let step = self
            .navigator
            .navigate_to(id, now, &mut self.transitions, &mut out)?;
        self.after_navigation(step, &mut out);
        Ok(out)
    }

    pub fn scroll(&mut self, direction: Direction, now: Timestamp) -> Vec<DomCommand> {
        let mut out = Vec::new();
        if self.destroyed {
            return out;
        }
        let step = self
            .navigator
            .scroll(direction, now, &mut self.transitions, &mut out);
        self.after_navigation(step, &mut out);
        out
    }

    fn after_navigation(&mut self, step: Option<Navigation>, out: &mut Vec<DomCommand>) {
        let Some(step) = step else {
            return;
        };
        let (Some(from), Some(to)) = (
            self.transitions.section(step.from).map(|s| s.id.clone()),
            self.transitions.section(step.to).map(|s| s.id.clone()),
        ) else {
            return;
        };
        self.video.pause_all_except(&to, out);
        if self.grid.section() == Some(&from) {
            self.grid.deactivate(out);
        }
        if to == self.landing {
            self.home.on_landing_entered(out);
        } else if from == self.landing {
            self.home.on_landing_left(out);
        }
    }

    fn on_complete(
        &mut self,
        done: TransitionComplete,
        now: Timestamp,
        out: &mut Vec<DomCommand>,
    ) {
        debug!(
            "transition settled on {} via {:?}",
            done.section, done.source
        );
        self.video.section_entered(&done.section, out);
        if self.grid.section() == Some(&done.section) {
            self.grid.activate(now, out);
        }
        if let Some(previous) = &done.previous_section {
            out.push(DomCommand::RestartAnimations {
                section: previous.clone(),
            });
        }
        self.home.on_transition_complete(&done, &self.landing);
        if let Some(section) = self.transitions.current_section() {
            self.menu.highlight(section, out);
        }
        out.push(DomCommand::DispatchTransitionComplete(done.clone()));
        self.bus.emit(&done);
    }

    /// Earliest pending timer across all modules. `None` once destroyed.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        if self.destroyed {
            return None;
        }
        self.deadlines().into_iter().filter_map(|(_, due)| due).min()
    }

    fn deadlines(&self) -> [(TimerSource, Option<Timestamp>); 8] {
        [
            (TimerSource::Site, self.timers.next_due()),
            (TimerSource::Transitions, self.transitions.next_deadline()),
            (TimerSource::Navigator, self.navigator.next_deadline()),
            (TimerSource::Menu, self.menu.next_deadline()),
            (TimerSource::Video, self.video.next_deadline()),
            (TimerSource::Home, self.home.next_deadline()),
            (TimerSource::Grid, self.grid.next_deadline()),
            (TimerSource::Contact, self.contact.next_deadline()),
        ]
    }

    /// Fire every timer due at `now`, earliest first. Each one runs at its own due
    /// time so follow-up timers are scheduled from it.
    pub fn advance(&mut self, now: Timestamp) -> Vec<DomCommand> {
        let mut out = Vec::new();
        if self.destroyed {
            return out;
        }
        while let Some((source, due)) = self
            .deadlines()
            .into_iter()
            .filter_map(|(source, due)| due.filter(|d| *d <= now).map(|d| (source, d)))
            .min_by_key(|(_, due)| *due)
        {
            match source {
                TimerSource::Site => {
                    if let Some((_, _, SiteTimer::MarkLoaded)) = self.timers.pop_due(due) {
                        out.push(DomCommand::MarkLoaded);
                    }
                }
                TimerSource::Transitions => {
                    if let Some(done) = self.transitions.fire_next(due, &mut out) {
                        self.on_complete(done, due, &mut out);
                    }
                }
                TimerSource::Navigator => {
                    let step = self
                        .navigator
                        .fire_next(due, &mut self.transitions, &mut out);
                    self.after_navigation(step, &mut out);
                }
                TimerSource::Menu => {
                    if let Some(target) = self.menu.fire_next(due, &mut out) {
                        let step = self.navigator.navigate_to(
                            &target,
                            due,
                            &mut self.transitions,
                            &mut out,
                        );
                        match step {
                            Ok(step) => self.after_navigation(step, &mut out),
                            Err(err) => warn!("menu link ignored: {}", err),
                        }
                    }
                }
                TimerSource::Video => self.video.fire_next(due, &mut out),
                TimerSource::Home => self.home.fire_next(due, &mut out),
                TimerSource::Grid => self.grid.fire_next(due, &mut out),
                TimerSource::Contact => self.contact.fire_next(due, &mut out),
            }
        }
        out
    }

    /// Rust-side listeners for settled transitions.
    pub fn subscribe(
        &mut self,
        handler: impl FnMut(&TransitionComplete) + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Stop the landing loop, close the menu, release the grid and drop every
    /// pending timer. Idempotent; the site ignores input afterwards.
    pub fn destroy(&mut self) -> Vec<DomCommand> {
        let mut out = Vec::new();
        if self.destroyed {
            return out;
        }
        self.home.destroy();
        self.menu.close(&mut out);
        self.grid.deactivate(&mut out);
        self.timers.clear();
        self.transitions.clear_timers();
        self.navigator.clear_timers();
        self.menu.clear_timers();
        self.video.clear_timers();
        self.grid.clear_timers();
        self.contact.clear_timers();
        self.destroyed = true;
        info!("site destroyed");
        out
    }
}

fn log_failure(result: Result<(), SiteError>) {
    if let Err(err) = result {
        warn!("{}", err);
    }
}
