// Mail contact button. Opens the visitor's mail client and, in case none
// answers, reveals the contact form after a delay.

use log::debug;

use crate::config::ContactSettings;
use crate::timers::{TimerId, TimerQueue};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContactTimer {
    RevealForm,
}

pub struct ContactForm {
    settings: ContactSettings,
    enabled: bool,
    revealed: bool,
    pending: Option<TimerId>,
    timers: TimerQueue<ContactTimer>,
}

impl ContactForm {
    pub fn new(enabled: bool, settings: ContactSettings) -> Self {
        ContactForm {
            settings,
            enabled,
            revealed: false,
            pending: None,
            timers: TimerQueue::new(),
        }
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    /// Open the mail client. The first click also starts the form countdown.
    pub fn click(&mut self, now: Timestamp, out: &mut Vec<DomCommand>) {
        if !self.enabled {
            return;
        }
        out.push(DomCommand::OpenMailto(self.settings.mailto.clone()));
        if self.revealed || self.pending.is_some() {
            return;
        }
        debug!("contact form fallback in {} ms", self.settings.form_reveal_delay_ms);
        let due = now.after(self.settings.form_reveal_delay_ms);
        self.pending = Some(self.timers.schedule(due, ContactTimer::RevealForm));
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_due()
    }

    pub fn fire_next(&mut self, now: Timestamp, out: &mut Vec<DomCommand>) {
        let Some((_, _, ContactTimer::RevealForm)) = self.timers.pop_due(now) else {
            return;
        };
        self.pending = None;
        self.revealed = true;
        out.push(DomCommand::ShowContactForm {
            notice: self.settings.form_notice.clone(),
        });
    }

    pub fn clear_timers(&mut self) {
        self.timers.clear();
        self.pending = None;
    }
}
