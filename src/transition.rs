// Section transition state machine: active -> leaving -> (exit phase) -> target active.
// A transition settles exactly once, on the target's own opacity `transitionend` or on
// the fallback deadline, whichever comes first. The lock never outlives the fallback.

use std::collections::HashSet;

use log::debug;

use crate::config::TransitionSettings;
use crate::error::{SiteError, TransitionError};
use crate::timers::{TimerId, TimerQueue};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Transitioning,
}

/// Identifies one accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionTimer {
    ExitPhase,
    Fallback,
}

#[derive(Debug)]
struct InFlight {
    ticket: TransitionTicket,
    target: usize,
    previous: Option<usize>,
    exit_pending: bool,
    exit_timer: Option<TimerId>,
    fallback_timer: TimerId,
}

/// Owns the section list and is the only writer of its active/leaving flags.
pub struct TransitionController {
    settings: TransitionSettings,
    sections: Vec<Section>,
    current: Option<usize>,
    in_flight: Option<InFlight>,
    timers: TimerQueue<TransitionTimer>,
    next_ticket: u64,
}

impl TransitionController {
    /// Takes the statically declared sections. The first one flagged active wins;
    /// with none flagged, the first section becomes active.
    pub fn new(
        mut sections: Vec<Section>,
        settings: TransitionSettings,
    ) -> Result<Self, SiteError> {
        if sections.is_empty() {
            return Err(SiteError::EmptySectionList);
        }

        let mut seen = HashSet::new();
        for section in &sections {
            if !seen.insert(section.id.clone()) {
                return Err(SiteError::DuplicateSection(section.id.clone()));
            }
        }

        let active = sections.iter().position(|s| s.is_active).unwrap_or(0);
        for (index, section) in sections.iter_mut().enumerate() {
            section.index = index;
            section.is_active = index == active;
            section.is_leaving = false;
        }

        Ok(TransitionController {
            settings,
            sections,
            current: Some(active),
            in_flight: None,
            timers: TimerQueue::new(),
            next_ticket: 0,
        })
    }

    pub fn state(&self) -> TransitionState {
        if self.in_flight.is_some() {
            TransitionState::Transitioning
        } else {
            TransitionState::Idle
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn index_of(&self, id: &SectionId) -> Option<usize> {
        self.sections.iter().position(|s| s.id == *id)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_section(&self) -> Option<&Section> {
        self.current.and_then(|i| self.sections.get(i))
    }

    /// Whether the transition behind `ticket` has settled.
    pub fn is_settled(&self, ticket: TransitionTicket) -> bool {
        ticket.0 < self.next_ticket && self.in_flight.as_ref().map(|f| f.ticket) != Some(ticket)
    }

    /// Mirror the model onto the page, used once at mount.
    pub fn sync_commands(&self, out: &mut Vec<DomCommand>) {
        for section in &self.sections {
            let marker = SectionMarker::Active;
            out.push(if section.is_active {
                DomCommand::AddMarker { section: section.id.clone(), marker }
            } else {
                DomCommand::RemoveMarker { section: section.id.clone(), marker }
            });
            out.push(DomCommand::RemoveMarker {
                section: section.id.clone(),
                marker: SectionMarker::Leaving,
            });
        }
    }

    /// Start a transition to `target`. Refused requests leave every flag untouched.
    pub fn transition_to(
        &mut self,
        target: usize,
        now: Timestamp,
        out: &mut Vec<DomCommand>,
    ) -> Result<TransitionTicket, TransitionError> {
        if self.in_flight.is_some() {
            return Err(TransitionError::Busy);
        }
        if target >= self.sections.len() {
            return Err(TransitionError::UnknownTarget(target));
        }
        if self.current == Some(target) {
            return Err(TransitionError::AlreadyCurrent(target));
        }

        let previous = self.current;
        self.current = Some(target);
        let ticket = TransitionTicket(self.next_ticket);
        self.next_ticket += 1;

        let exit_timer = match previous {
            Some(prev) => {
                let leaving = &mut self.sections[prev];
                leaving.is_active = false;
                leaving.is_leaving = true;
                out.push(DomCommand::RemoveMarker {
                    section: leaving.id.clone(),
                    marker: SectionMarker::Active,
                });
                out.push(DomCommand::AddMarker {
                    section: leaving.id.clone(),
                    marker: SectionMarker::Leaving,
                });
                out.push(DomCommand::ForceReflow {
                    section: leaving.id.clone(),
                });
                out.push(DomCommand::SetTransitionInProgress(true));
                Some(
                    self.timers
                        .schedule(now.after(self.settings.exit_ms), TransitionTimer::ExitPhase),
                )
            }
            None => {
                self.activate(target, out);
                None
            }
        };
        let fallback_timer = self
            .timers
            .schedule(now.after(self.settings.fallback_ms), TransitionTimer::Fallback);

        debug!(
            "transition {:?}: {:?} -> {}",
            ticket,
            previous.map(|i| self.sections[i].id.as_str()),
            self.sections[target].id
        );

        self.in_flight = Some(InFlight {
            ticket,
            target,
            previous,
            exit_pending: exit_timer.is_some(),
            exit_timer,
            fallback_timer,
        });
        Ok(ticket)
    }

    /// Report a `transitionend` from the page. Only the target's opacity transition,
    /// after it received its active marker, settles the transition.
    pub fn visual_complete(
        &mut self,
        section: &SectionId,
        property: &str,
        out: &mut Vec<DomCommand>,
    ) -> Option<TransitionComplete> {
        if property != "opacity" {
            return None;
        }
        let flight = self.in_flight.as_ref()?;
        if flight.exit_pending || self.sections[flight.target].id != *section {
            return None;
        }
        self.complete(CompletionSource::VisualSignal, out)
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_due()
    }

    /// Fire the earliest timer due at `now`. Returns the completion if it settled.
    pub fn fire_next(
        &mut self,
        now: Timestamp,
        out: &mut Vec<DomCommand>,
    ) -> Option<TransitionComplete> {
        let (_, _, timer) = self.timers.pop_due(now)?;
        match timer {
            TransitionTimer::ExitPhase => {
                if let Some(flight) = self.in_flight.as_mut() {
                    flight.exit_timer = None;
                }
                self.finish_exit(out);
                None
            }
            TransitionTimer::Fallback => self.complete(CompletionSource::Fallback, out),
        }
    }

    fn finish_exit(&mut self, out: &mut Vec<DomCommand>) {
        let Some(flight) = self.in_flight.as_mut() else {
            return;
        };
        if !flight.exit_pending {
            return;
        }
        flight.exit_pending = false;
        if let Some(id) = flight.exit_timer.take() {
            self.timers.cancel(id);
        }
        let (previous, target) = (flight.previous, flight.target);

        if let Some(prev) = previous {
            let leaving = &mut self.sections[prev];
            leaving.is_leaving = false;
            out.push(DomCommand::RemoveMarker {
                section: leaving.id.clone(),
                marker: SectionMarker::Leaving,
            });
            out.push(DomCommand::SetTransitionInProgress(false));
        }
        self.activate(target, out);
    }

    fn activate(&mut self, index: usize, out: &mut Vec<DomCommand>) {
        let section = &mut self.sections[index];
        section.is_active = true;
        out.push(DomCommand::AddMarker {
            section: section.id.clone(),
            marker: SectionMarker::Active,
        });
    }

    /// Drop the pending exit phase and fallback. A transition in flight is
    /// abandoned without a completion.
    pub fn clear_timers(&mut self) {
        self.timers.clear();
        if let Some(flight) = self.in_flight.take() {
            debug!("transition {:?} abandoned", flight.ticket);
        }
    }

    fn complete(
        &mut self,
        source: CompletionSource,
        out: &mut Vec<DomCommand>,
    ) -> Option<TransitionComplete> {
        self.finish_exit(out);
        let flight = self.in_flight.take()?;
        self.timers.cancel(flight.fallback_timer);

        debug!("transition {:?} settled via {:?}", flight.ticket, source);
        Some(TransitionComplete {
            section: self.sections[flight.target].id.clone(),
            previous_section: flight.previous.map(|i| self.sections[i].id.clone()),
            source: Some(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn controller() -> TransitionController {
        let sections = vec![
            Section::new("home", 0).active(),
            Section::new("a", 1),
            Section::new("b", 2),
        ];
        TransitionController::new(sections, TransitionSettings::default()).unwrap()
    }

    fn active_count(c: &TransitionController) -> usize {
        c.sections().iter().filter(|s| s.is_active).count()
    }

    fn drain(
        c: &mut TransitionController,
        now: Timestamp,
        out: &mut Vec<DomCommand>,
    ) -> Vec<TransitionComplete> {
        let mut done = Vec::new();
        while c.next_deadline().is_some_and(|due| due <= now) {
            if let Some(event) = c.fire_next(now, out) {
                done.push(event);
            }
        }
        done
    }

    #[test]
    fn first_section_becomes_active_when_none_flagged() {
        let c = TransitionController::new(
            vec![Section::new("x", 0), Section::new("y", 1)],
            TransitionSettings::default(),
        )
        .unwrap();
        assert_eq!(c.current_index(), Some(0));
        assert_eq!(active_count(&c), 1);
    }

    #[test]
    fn rejects_empty_and_duplicate_layouts() {
        assert!(matches!(
            TransitionController::new(vec![], TransitionSettings::default()),
            Err(SiteError::EmptySectionList)
        ));
        assert!(matches!(
            TransitionController::new(
                vec![Section::new("x", 0), Section::new("x", 1)],
                TransitionSettings::default()
            ),
            Err(SiteError::DuplicateSection(_))
        ));
    }

    #[test]
    fn phases_run_leaving_then_active_then_fallback() {
        let mut c = controller();
        let mut out = Vec::new();
        c.transition_to(1, ts(0), &mut out).unwrap();

        assert!(out.contains(&DomCommand::AddMarker {
            section: "home".into(),
            marker: SectionMarker::Leaving
        }));
        assert!(out.contains(&DomCommand::ForceReflow { section: "home".into() }));
        assert!(c.sections()[0].is_leaving);
        assert!(!c.sections()[1].is_active);
        assert_eq!(c.state(), TransitionState::Transitioning);

        out.clear();
        assert!(drain(&mut c, ts(600), &mut out).is_empty());
        assert!(!c.sections()[0].is_leaving);
        assert!(c.sections()[1].is_active);
        assert!(out.contains(&DomCommand::SetTransitionInProgress(false)));
        assert!(c.is_transitioning());

        let done = drain(&mut c, ts(1_500), &mut out);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].section, SectionId::new("a"));
        assert_eq!(done[0].previous_section, Some(SectionId::new("home")));
        assert_eq!(done[0].source, Some(CompletionSource::Fallback));
        assert_eq!(c.state(), TransitionState::Idle);
        assert_eq!(active_count(&c), 1);
    }

    #[test]
    fn busy_request_is_refused_without_side_effects() {
        let mut c = controller();
        let mut out = Vec::new();
        c.transition_to(1, ts(0), &mut out).unwrap();
        let before: Vec<Section> = c.sections().to_vec();

        out.clear();
        assert_eq!(c.transition_to(2, ts(10), &mut out), Err(TransitionError::Busy));
        assert!(out.is_empty());
        assert_eq!(c.sections(), before.as_slice());
        assert_eq!(c.current_index(), Some(1));
    }

    #[test]
    fn current_and_out_of_range_targets_are_refused() {
        let mut c = controller();
        let mut out = Vec::new();
        assert_eq!(c.transition_to(0, ts(0), &mut out), Err(TransitionError::AlreadyCurrent(0)));
        assert_eq!(c.transition_to(7, ts(0), &mut out), Err(TransitionError::UnknownTarget(7)));
        assert_eq!(c.state(), TransitionState::Idle);
    }

    #[test]
    fn visual_signal_settles_early_and_cancels_fallback() {
        let mut c = controller();
        let mut out = Vec::new();
        let ticket = c.transition_to(1, ts(0), &mut out).unwrap();
        drain(&mut c, ts(600), &mut out);

        let done = c.visual_complete(&"a".into(), "opacity", &mut out).unwrap();
        assert_eq!(done.source, Some(CompletionSource::VisualSignal));
        assert!(c.is_settled(ticket));
        assert_eq!(c.next_deadline(), None);
        assert!(drain(&mut c, ts(5_000), &mut out).is_empty());
    }

    #[test]
    fn stale_signals_are_ignored() {
        let mut c = controller();
        let mut out = Vec::new();
        assert!(c.visual_complete(&"a".into(), "opacity", &mut out).is_none());

        c.transition_to(1, ts(0), &mut out).unwrap();
        // Before the exit phase the target has no active marker yet.
        assert!(c.visual_complete(&"a".into(), "opacity", &mut out).is_none());
        drain(&mut c, ts(600), &mut out);
        assert!(c.visual_complete(&"home".into(), "opacity", &mut out).is_none());
        assert!(c.visual_complete(&"a".into(), "transform", &mut out).is_none());
        assert!(c.is_transitioning());
    }

    #[test]
    fn clearing_timers_abandons_the_transition_in_flight() {
        let mut c = controller();
        let mut out = Vec::new();
        let ticket = c.transition_to(1, ts(0), &mut out).unwrap();
        c.clear_timers();
        assert_eq!(c.next_deadline(), None);
        assert!(!c.is_transitioning());
        assert!(c.is_settled(ticket));
        assert!(drain(&mut c, ts(5_000), &mut out).is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Transition(usize),
        Advance(u64),
        Signal(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..4).prop_map(Op::Transition),
            (0u64..2_000).prop_map(Op::Advance),
            (0usize..3).prop_map(Op::Signal),
        ]
    }

    proptest! {
        /// Once the fallback deadline has passed, exactly one section is active and
        /// nothing is leaving, whatever mix of requests and signals came before.
        #[test]
        fn settles_to_exactly_one_active(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let mut c = controller();
            let mut out = Vec::new();
            let mut now = 0u64;
            for op in ops {
                match op {
                    Op::Transition(target) => {
                        let busy = c.is_transitioning();
                        let result = c.transition_to(target, ts(now), &mut out);
                        if busy {
                            prop_assert_eq!(result, Err(TransitionError::Busy));
                        }
                    }
                    Op::Advance(ms) => {
                        now += ms;
                        drain(&mut c, ts(now), &mut out);
                    }
                    Op::Signal(index) => {
                        let id = c.sections()[index].id.clone();
                        c.visual_complete(&id, "opacity", &mut out);
                    }
                }
                prop_assert!(c.sections().iter().filter(|s| s.is_active).count() <= 1);
            }

            now += TransitionSettings::default().fallback_ms;
            drain(&mut c, ts(now), &mut out);
            prop_assert_eq!(c.state(), TransitionState::Idle);
            prop_assert_eq!(active_count(&c), 1);
            prop_assert!(c.sections().iter().all(|s| !s.is_leaving));
            prop_assert_eq!(c.current_section().map(|s| s.is_active), Some(true));
        }
    }
}
