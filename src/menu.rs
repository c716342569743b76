// Slide-out menu: open/close, staggered item reveal, and link clicks that navigate
// once the panel has had time to close.

use log::debug;

use crate::config::MenuSettings;
use crate::timers::{TimerId, TimerQueue};
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum MenuTimer {
    RevealItem(usize),
    Navigate(SectionId),
}

pub struct MenuController {
    settings: MenuSettings,
    links: Vec<SectionId>,
    is_open: bool,
    reveals: Vec<TimerId>,
    pending_navigation: Option<TimerId>,
    timers: TimerQueue<MenuTimer>,
}

impl MenuController {
    pub fn new(links: Vec<SectionId>, settings: MenuSettings) -> Self {
        MenuController {
            settings,
            links,
            is_open: false,
            reveals: Vec::new(),
            pending_navigation: None,
            timers: TimerQueue::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn links(&self) -> &[SectionId] {
        &self.links
    }

    pub fn open(&mut self, now: Timestamp, out: &mut Vec<DomCommand>) {
        if self.is_open {
            return;
        }
        self.is_open = true;
        out.push(DomCommand::SetMenuOpen(true));
        out.push(DomCommand::HideMenuItems);
        for index in 0..self.links.len() {
            let step = (index as u64).saturating_mul(self.settings.item_stagger_step_ms);
            let delay = self.settings.item_stagger_base_ms.saturating_add(step);
            let id = self.timers.schedule(now.after(delay), MenuTimer::RevealItem(index));
            self.reveals.push(id);
        }
    }

    pub fn close(&mut self, out: &mut Vec<DomCommand>) {
        if !self.is_open {
            return;
        }
        self.is_open = false;
        for id in self.reveals.drain(..) {
            self.timers.cancel(id);
        }
        out.push(DomCommand::SetMenuOpen(false));
    }

    pub fn toggle(&mut self, now: Timestamp, out: &mut Vec<DomCommand>) {
        if self.is_open {
            self.close(out);
        } else {
            self.open(now, out);
        }
    }

    /// Escape closes an open menu. Returns whether the key was consumed.
    pub fn key(&mut self, key: &str, out: &mut Vec<DomCommand>) -> bool {
        if key == "Escape" && self.is_open {
            self.close(out);
            return true;
        }
        false
    }

    /// Close now, navigate after the closing animation. A newer click replaces
    /// a navigation that has not fired yet.
    pub fn link_clicked(
        &mut self,
        section: SectionId,
        now: Timestamp,
        out: &mut Vec<DomCommand>,
    ) {
        self.close(out);
        if let Some(id) = self.pending_navigation.take() {
            self.timers.cancel(id);
        }
        debug!("menu link to {}", section);
        let due = now.after(self.settings.navigate_delay_ms);
        self.pending_navigation = Some(self.timers.schedule(due, MenuTimer::Navigate(section)));
    }

    /// Mark the link of the active section and show the navigation chrome on
    /// project sections only.
    pub fn highlight(&self, active: &Section, out: &mut Vec<DomCommand>) {
        for link in &self.links {
            out.push(DomCommand::SetMenuLinkActive {
                section: link.clone(),
                active: *link == active.id,
            });
        }
        out.push(DomCommand::SetNavChromeVisible(active.is_project));
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_due()
    }

    /// Drop pending reveals and any navigation queued by a link click.
    pub fn clear_timers(&mut self) {
        self.timers.clear();
        self.reveals.clear();
        self.pending_navigation = None;
    }

    /// Fire the earliest due timer; returns a section to navigate to, if any.
    pub fn fire_next(&mut self, now: Timestamp, out: &mut Vec<DomCommand>) -> Option<SectionId> {
        let (id, _, timer) = self.timers.pop_due(now)?;
        match timer {
            MenuTimer::RevealItem(index) => {
                self.reveals.retain(|r| *r != id);
                out.push(DomCommand::RevealMenuItem { index });
                None
            }
            MenuTimer::Navigate(section) => {
                self.pending_navigation = None;
                Some(section)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn menu() -> MenuController {
        MenuController::new(
            vec!["home".into(), "a".into(), "contact".into()],
            MenuSettings::default(),
        )
    }

    fn drain(
        menu: &mut MenuController,
        now: Timestamp,
        out: &mut Vec<DomCommand>,
    ) -> Vec<SectionId> {
        let mut targets = Vec::new();
        while menu.next_deadline().is_some_and(|d| d <= now) {
            targets.extend(menu.fire_next(now, out));
        }
        targets
    }

    #[test]
    fn open_reveals_items_in_stagger_order() {
        let mut m = menu();
        let mut out = Vec::new();
        m.open(ts(0), &mut out);
        assert_eq!(out, vec![DomCommand::SetMenuOpen(true), DomCommand::HideMenuItems]);

        out.clear();
        drain(&mut m, ts(100), &mut out);
        assert_eq!(
            out,
            vec![
                DomCommand::RevealMenuItem { index: 0 },
                DomCommand::RevealMenuItem { index: 1 }
            ]
        );
        drain(&mut m, ts(150), &mut out);
        assert_eq!(out.last(), Some(&DomCommand::RevealMenuItem { index: 2 }));
    }

    #[test]
    fn closing_cancels_pending_reveals() {
        let mut m = menu();
        let mut out = Vec::new();
        m.open(ts(0), &mut out);
        m.close(&mut out);
        assert_eq!(m.next_deadline(), None);
        assert!(!m.is_open());
    }

    #[test]
    fn escape_only_consumed_when_open() {
        let mut m = menu();
        let mut out = Vec::new();
        assert!(!m.key("Escape", &mut out));
        m.toggle(ts(0), &mut out);
        assert!(m.key("Escape", &mut out));
        assert!(!m.is_open());
    }

    #[test]
    fn link_click_navigates_after_close_delay() {
        let mut m = menu();
        let mut out = Vec::new();
        m.open(ts(0), &mut out);
        m.link_clicked("contact".into(), ts(10), &mut out);
        assert!(!m.is_open());
        assert!(drain(&mut m, ts(309), &mut out).is_empty());
        assert_eq!(drain(&mut m, ts(310), &mut out), vec![SectionId::new("contact")]);
    }

    #[test]
    fn later_click_replaces_pending_navigation() {
        let mut m = menu();
        let mut out = Vec::new();
        m.link_clicked("a".into(), ts(0), &mut out);
        m.link_clicked("contact".into(), ts(100), &mut out);
        assert_eq!(drain(&mut m, ts(1_000), &mut out), vec![SectionId::new("contact")]);
    }

    #[test]
    fn highlight_marks_active_link_and_chrome() {
        let m = menu();
        let mut out = Vec::new();
        m.highlight(&Section::new("a", 1).project(), &mut out);
        assert!(out.contains(&DomCommand::SetMenuLinkActive {
            section: "a".into(),
            active: true
        }));
        assert!(out.contains(&DomCommand::SetMenuLinkActive {
            section: "home".into(),
            active: false
        }));
        assert_eq!(out.last(), Some(&DomCommand::SetNavChromeVisible(true)));
    }

    #[test]
    fn huge_stagger_values_saturate_instead_of_overflowing() {
        let settings = MenuSettings {
            item_stagger_base_ms: u64::MAX - 1,
            item_stagger_step_ms: u64::MAX,
            ..MenuSettings::default()
        };
        let mut m = MenuController::new(vec!["home".into(), "a".into(), "b".into()], settings);
        let mut out = Vec::new();
        m.open(ts(10), &mut out);
        assert_eq!(m.next_deadline(), Some(Timestamp::from_millis(u64::MAX)));
        m.close(&mut out);
        assert_eq!(m.next_deadline(), None);
    }

    #[test]
    fn clearing_timers_forgets_a_queued_navigation() {
        let mut m = menu();
        let mut out = Vec::new();
        m.open(ts(0), &mut out);
        m.link_clicked("a".into(), ts(10), &mut out);
        m.clear_timers();
        assert_eq!(m.next_deadline(), None);
        assert!(drain(&mut m, ts(10_000), &mut out).is_empty());
    }
}
