// Per-section video players. One player plays at a time, the one in the active
// section; everything else is paused and muted. Positions and volumes are tracked
// here so pause/resume, hover and fullscreen switches can restore them.

use log::{debug, warn};

use crate::config::{PositionPolicy, VideoSettings};
use crate::error::SiteError;
use crate::timers::TimerQueue;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlaybackSnapshot {
    position: f64,
    was_playing: bool,
}

/// Association between a media element and the section that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoBinding {
    pub player: PlayerId,
    pub section: SectionId,
    /// Seconds, never negative.
    pub position: f64,
    pub duration: Option<f64>,
    pub playing: bool,
    pub muted: bool,
    pub volume: f64,
    /// Audible volume cached at the last mute.
    pub last_volume: Option<f64>,
    pub hovered: bool,
    pub fullscreen: bool,
    fullscreen_snapshot: Option<PlaybackSnapshot>,
}

impl VideoBinding {
    fn new(player: PlayerId, section: SectionId, volume: f64) -> Self {
        VideoBinding {
            player,
            section,
            position: 0.0,
            duration: None,
            playing: false,
            muted: true,
            volume,
            last_volume: None,
            hovered: false,
            fullscreen: false,
            fullscreen_snapshot: None,
        }
    }

    fn progress_percent(&self) -> f64 {
        match self.duration {
            Some(d) if d > 0.0 => (self.position / d * 100.0).clamp(0.0, 100.0),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoTimer {
    FullscreenSettle(PlayerId),
}

pub struct VideoDeck {
    settings: VideoSettings,
    bindings: Vec<VideoBinding>,
    active_section: Option<SectionId>,
    timers: TimerQueue<VideoTimer>,
}

impl VideoDeck {
    pub fn new(settings: VideoSettings) -> Self {
        VideoDeck {
            settings,
            bindings: Vec::new(),
            active_section: None,
            timers: TimerQueue::new(),
        }
    }

    /// Bind a player found at mount. Players start muted and paused.
    pub fn register(&mut self, player: PlayerId, section: SectionId, out: &mut Vec<DomCommand>) {
        let binding = VideoBinding::new(player, section, self.settings.default_volume);
        let emit = |command| DomCommand::Video { player, command };
        out.push(emit(VideoCommand::SetMuted(true)));
        out.push(emit(VideoCommand::SetMuteIcon { muted: true }));
        out.push(emit(VideoCommand::SetPlayIcon { paused: true }));
        out.push(emit(VideoCommand::SetVolume(binding.volume)));
        self.bindings.push(binding);
    }

    pub fn bindings(&self) -> &[VideoBinding] {
        &self.bindings
    }

    pub fn binding(&self, player: PlayerId) -> Option<&VideoBinding> {
        self.bindings.iter().find(|b| b.player == player)
    }

    fn binding_mut(&mut self, player: PlayerId) -> Result<&mut VideoBinding, SiteError> {
        self.bindings
            .iter_mut()
            .find(|b| b.player == player)
            .ok_or(SiteError::UnknownPlayer(player))
    }

    pub fn active_section(&self) -> Option<&SectionId> {
        self.active_section.as_ref()
    }

    /// Pause and mute every player outside `section`, which becomes the active one.
    pub fn pause_all_except(&mut self, section: &SectionId, out: &mut Vec<DomCommand>) {
        self.active_section = Some(section.clone());
        for binding in self.bindings.iter_mut().filter(|b| b.section != *section) {
            if binding.playing {
                pause(binding, out);
            }
            mute(binding, out);
        }
    }

    /// Prepare the player(s) of a section that was just entered, per the position policy.
    pub fn reset_active_video(&mut self, section: &SectionId, out: &mut Vec<DomCommand>) {
        let policy = self.settings.position_policy;
        for binding in self.bindings.iter_mut().filter(|b| b.section == *section) {
            if binding.playing {
                pause(binding, out);
            }
            if policy == PositionPolicy::ResetOnEnter {
                binding.position = 0.0;
            }
            let player = binding.player;
            out.push(DomCommand::Video {
                player,
                command: VideoCommand::Seek { position: binding.position },
            });
            out.push(DomCommand::Video {
                player,
                command: VideoCommand::SetProgress(binding.progress_percent()),
            });
            mute(binding, out);
        }
    }

    /// A transition into `section` settled.
    pub fn section_entered(&mut self, section: &SectionId, out: &mut Vec<DomCommand>) {
        self.active_section = Some(section.clone());
        self.reset_active_video(section, out);
        if !self.settings.autoplay_active {
            return;
        }
        for binding in self.bindings.iter_mut().filter(|b| b.section == *section) {
            play(binding, out);
        }
    }

    fn is_in_active_section(&self, binding: &VideoBinding) -> bool {
        self.active_section.as_ref() == Some(&binding.section)
    }

    /// Pointer entered the player: resume from the saved position with sound.
    pub fn hover_enter(
        &mut self,
        player: PlayerId,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        let default_volume = self.settings.default_volume;
        let active = self
            .binding(player)
            .map(|b| self.is_in_active_section(b))
            .ok_or(SiteError::UnknownPlayer(player))?;
        let binding = self.binding_mut(player)?;
        binding.hovered = true;
        if !active {
            return Ok(());
        }
        if !binding.playing {
            out.push(DomCommand::Video {
                player,
                command: VideoCommand::Seek { position: binding.position },
            });
            play(binding, out);
        }
        if binding.muted {
            unmute(binding, default_volume, out);
        }
        Ok(())
    }

    /// Pointer left the player: keep the position, go quiet and pause.
    pub fn hover_leave(
        &mut self,
        player: PlayerId,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        let binding = self.binding_mut(player)?;
        binding.hovered = false;
        mute(binding, out);
        if binding.playing && !binding.fullscreen {
            pause(binding, out);
        }
        Ok(())
    }

    pub fn toggle_play(
        &mut self,
        player: PlayerId,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        let binding = self.binding_mut(player)?;
        if binding.playing {
            pause(binding, out);
        } else {
            play(binding, out);
        }
        Ok(())
    }

    pub fn toggle_mute(
        &mut self,
        player: PlayerId,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        let default_volume = self.settings.default_volume;
        let binding = self.binding_mut(player)?;
        if binding.muted {
            unmute(binding, default_volume, out);
        } else {
            mute(binding, out);
        }
        Ok(())
    }

    /// Volume slider. Zero mutes; anything else unmutes at that level.
    pub fn set_volume(
        &mut self,
        player: PlayerId,
        fraction: f64,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        let binding = self.binding_mut(player)?;
        let volume = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        binding.volume = volume;
        binding.last_volume = Some(volume);
        binding.muted = volume == 0.0;
        out.push(DomCommand::Video { player, command: VideoCommand::SetVolume(volume) });
        out.push(DomCommand::Video {
            player,
            command: VideoCommand::SetMuted(binding.muted),
        });
        out.push(DomCommand::Video {
            player,
            command: VideoCommand::SetMuteIcon { muted: binding.muted },
        });
        Ok(())
    }

    /// Click on the progress bar at `fraction` of its width.
    pub fn seek_fraction(
        &mut self,
        player: PlayerId,
        fraction: f64,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        let binding = self.binding_mut(player)?;
        let Some(duration) = binding.duration.filter(|d| *d > 0.0) else {
            debug!("{}: seek ignored, duration unknown", player);
            return Ok(());
        };
        binding.position = fraction.clamp(0.0, 1.0) * duration;
        out.push(DomCommand::Video {
            player,
            command: VideoCommand::Seek { position: binding.position },
        });
        out.push(DomCommand::Video {
            player,
            command: VideoCommand::SetProgress(binding.progress_percent()),
        });
        Ok(())
    }

    /// `timeupdate` from the media element.
    pub fn time_update(
        &mut self,
        player: PlayerId,
        position: f64,
        duration: f64,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        let binding = self.binding_mut(player)?;
        if duration.is_finite() && duration > 0.0 {
            binding.duration = Some(duration);
        }
        if position.is_finite() && position >= 0.0 {
            binding.position = position;
        }
        out.push(DomCommand::Video {
            player,
            command: VideoCommand::SetProgress(binding.progress_percent()),
        });
        Ok(())
    }

    /// Native play/pause/ended notifications keep the model and the icon honest.
    pub fn media_state(
        &mut self,
        player: PlayerId,
        playing: bool,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        let binding = self.binding_mut(player)?;
        binding.playing = playing;
        out.push(DomCommand::Video {
            player,
            command: VideoCommand::SetPlayIcon { paused: !playing },
        });
        Ok(())
    }

    /// Autoplay policy denied `play()`. Logged, never surfaced.
    pub fn playback_rejected(
        &mut self,
        player: PlayerId,
        reason: &str,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        warn!(
            "{}",
            SiteError::Playback { player, reason: reason.to_string() }
        );
        let binding = self.binding_mut(player)?;
        binding.playing = false;
        out.push(DomCommand::Video {
            player,
            command: VideoCommand::SetPlayIcon { paused: true },
        });
        Ok(())
    }

    /// Enter or leave fullscreen, then restore position and play state once the
    /// browser's own switch has settled.
    pub fn toggle_fullscreen(
        &mut self,
        player: PlayerId,
        now: Timestamp,
        out: &mut Vec<DomCommand>,
    ) -> Result<(), SiteError> {
        let settle = self.settings.fullscreen_settle_ms;
        let binding = self.binding_mut(player)?;
        binding.fullscreen_snapshot = Some(PlaybackSnapshot {
            position: binding.position,
            was_playing: binding.playing,
        });
        let command = if binding.fullscreen {
            VideoCommand::ExitFullscreen
        } else {
            VideoCommand::RequestFullscreen
        };
        out.push(DomCommand::Video { player, command });
        self.timers
            .schedule(now.after(settle), VideoTimer::FullscreenSettle(player));
        Ok(())
    }

    /// The document's fullscreen element changed.
    pub fn fullscreen_changed(&mut self, fullscreen: Option<PlayerId>, out: &mut Vec<DomCommand>) {
        for binding in self.bindings.iter_mut() {
            let now_fullscreen = fullscreen == Some(binding.player);
            if binding.fullscreen != now_fullscreen {
                binding.fullscreen = now_fullscreen;
                out.push(DomCommand::Video {
                    player: binding.player,
                    command: VideoCommand::SetFullscreenIcon { fullscreen: now_fullscreen },
                });
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_due()
    }

    /// Forget pending fullscreen restores.
    pub fn clear_timers(&mut self) {
        self.timers.clear();
        for binding in self.bindings.iter_mut() {
            binding.fullscreen_snapshot = None;
        }
    }

    pub fn fire_next(&mut self, now: Timestamp, out: &mut Vec<DomCommand>) {
        let Some((_, _, VideoTimer::FullscreenSettle(player))) = self.timers.pop_due(now) else {
            return;
        };
        let Ok(binding) = self.binding_mut(player) else {
            return;
        };
        let Some(snapshot) = binding.fullscreen_snapshot.take() else {
            return;
        };
        binding.position = snapshot.position;
        out.push(DomCommand::Video {
            player,
            command: VideoCommand::Seek { position: snapshot.position },
        });
        if snapshot.was_playing {
            play(binding, out);
        }
    }
}

fn play(binding: &mut VideoBinding, out: &mut Vec<DomCommand>) {
    binding.playing = true;
    out.push(DomCommand::Video { player: binding.player, command: VideoCommand::Play });
    out.push(DomCommand::Video {
        player: binding.player,
        command: VideoCommand::SetPlayIcon { paused: false },
    });
}

fn pause(binding: &mut VideoBinding, out: &mut Vec<DomCommand>) {
    binding.playing = false;
    out.push(DomCommand::Video { player: binding.player, command: VideoCommand::Pause });
    out.push(DomCommand::Video {
        player: binding.player,
        command: VideoCommand::SetPlayIcon { paused: true },
    });
}

fn mute(binding: &mut VideoBinding, out: &mut Vec<DomCommand>) {
    if binding.muted {
        return;
    }
    if binding.volume > 0.0 {
        binding.last_volume = Some(binding.volume);
    }
    binding.muted = true;
    out.push(DomCommand::Video {
        player: binding.player,
        command: VideoCommand::SetMuted(true),
    });
    out.push(DomCommand::Video {
        player: binding.player,
        command: VideoCommand::SetMuteIcon { muted: true },
    });
}

fn unmute(binding: &mut VideoBinding, default_volume: f64, out: &mut Vec<DomCommand>) {
    let volume = binding.last_volume.filter(|v| *v > 0.0).unwrap_or(default_volume);
    binding.muted = false;
    binding.volume = volume;
    out.push(DomCommand::Video {
        player: binding.player,
        command: VideoCommand::SetVolume(volume),
    });
    out.push(DomCommand::Video {
        player: binding.player,
        command: VideoCommand::SetMuted(false),
    });
    out.push(DomCommand::Video {
        player: binding.player,
        command: VideoCommand::SetMuteIcon { muted: false },
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn p(n: u32) -> PlayerId {
        PlayerId::new(n)
    }

    fn deck(settings: VideoSettings) -> VideoDeck {
        let mut deck = VideoDeck::new(settings);
        let mut out = Vec::new();
        deck.register(p(0), "a".into(), &mut out);
        deck.register(p(1), "b".into(), &mut out);
        deck.register(p(2), "c".into(), &mut out);
        deck
    }

    #[test]
    fn pause_all_except_pauses_and_mutes_the_rest() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        for n in 0..3 {
            deck.toggle_play(p(n), &mut out).unwrap();
            deck.toggle_mute(p(n), &mut out).unwrap();
        }

        out.clear();
        deck.pause_all_except(&"b".into(), &mut out);

        for binding in deck.bindings() {
            if binding.section == SectionId::new("b") {
                assert!(binding.playing);
                assert!(!binding.muted);
            } else {
                assert!(!binding.playing);
                assert!(binding.muted);
                assert_eq!(binding.last_volume, Some(0.5));
            }
        }
        assert!(out.contains(&DomCommand::Video { player: p(0), command: VideoCommand::Pause }));
        assert!(!out.contains(&DomCommand::Video { player: p(1), command: VideoCommand::Pause }));
    }

    #[test]
    fn entering_a_section_resets_position_by_default() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        deck.time_update(p(0), 12.0, 60.0, &mut out).unwrap();

        out.clear();
        deck.section_entered(&"a".into(), &mut out);
        let binding = deck.binding(p(0)).unwrap();
        assert_eq!(binding.position, 0.0);
        assert!(binding.playing);
        assert!(binding.muted);
        assert!(out.contains(&DomCommand::Video {
            player: p(0),
            command: VideoCommand::SetProgress(0.0)
        }));
    }

    #[test]
    fn resume_policy_keeps_position() {
        let mut deck = deck(VideoSettings {
            position_policy: PositionPolicy::Resume,
            autoplay_active: false,
            ..Default::default()
        });
        let mut out = Vec::new();
        deck.time_update(p(0), 30.0, 60.0, &mut out).unwrap();
        out.clear();
        deck.section_entered(&"a".into(), &mut out);

        let binding = deck.binding(p(0)).unwrap();
        assert_eq!(binding.position, 30.0);
        assert!(!binding.playing);
        assert!(out.contains(&DomCommand::Video {
            player: p(0),
            command: VideoCommand::SetProgress(50.0)
        }));
    }

    #[test]
    fn hover_plays_only_in_the_active_section() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        deck.pause_all_except(&"a".into(), &mut out);

        deck.hover_enter(p(1), &mut out).unwrap();
        assert!(!deck.binding(p(1)).unwrap().playing);

        deck.time_update(p(0), 4.0, 20.0, &mut out).unwrap();
        out.clear();
        deck.hover_enter(p(0), &mut out).unwrap();
        let binding = deck.binding(p(0)).unwrap();
        assert!(binding.playing);
        assert!(!binding.muted);
        assert_eq!(binding.volume, 0.5);
        assert_eq!(
            out.first(),
            Some(&DomCommand::Video { player: p(0), command: VideoCommand::Seek { position: 4.0 } })
        );

        deck.hover_leave(p(0), &mut out).unwrap();
        let binding = deck.binding(p(0)).unwrap();
        assert!(!binding.playing);
        assert!(binding.muted);
        assert_eq!(binding.position, 4.0);
    }

    #[test]
    fn unmute_restores_the_cached_volume() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        deck.set_volume(p(0), 0.8, &mut out).unwrap();
        deck.toggle_mute(p(0), &mut out).unwrap();
        assert!(deck.binding(p(0)).unwrap().muted);

        deck.toggle_mute(p(0), &mut out).unwrap();
        let binding = deck.binding(p(0)).unwrap();
        assert!(!binding.muted);
        assert_eq!(binding.volume, 0.8);
    }

    #[test]
    fn zero_volume_mutes_and_unmute_falls_back_to_default() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        deck.set_volume(p(0), -2.0, &mut out).unwrap();
        assert!(deck.binding(p(0)).unwrap().muted);

        deck.toggle_mute(p(0), &mut out).unwrap();
        assert_eq!(deck.binding(p(0)).unwrap().volume, 0.5);
    }

    #[test]
    fn fullscreen_switch_restores_position_and_play_state() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        deck.time_update(p(0), 9.5, 60.0, &mut out).unwrap();
        deck.toggle_play(p(0), &mut out).unwrap();

        out.clear();
        deck.toggle_fullscreen(p(0), ts(0), &mut out).unwrap();
        assert_eq!(
            out,
            vec![DomCommand::Video { player: p(0), command: VideoCommand::RequestFullscreen }]
        );

        // The browser resets the element while switching.
        deck.media_state(p(0), false, &mut out).unwrap();
        deck.fullscreen_changed(Some(p(0)), &mut out);
        assert!(deck.binding(p(0)).unwrap().fullscreen);

        out.clear();
        assert_eq!(deck.next_deadline(), Some(ts(100)));
        deck.fire_next(ts(100), &mut out);
        assert!(out.contains(&DomCommand::Video {
            player: p(0),
            command: VideoCommand::Seek { position: 9.5 }
        }));
        assert!(deck.binding(p(0)).unwrap().playing);

        out.clear();
        deck.toggle_fullscreen(p(0), ts(200), &mut out).unwrap();
        assert_eq!(
            out,
            vec![DomCommand::Video { player: p(0), command: VideoCommand::ExitFullscreen }]
        );
    }

    #[test]
    fn time_update_accepts_a_rewind_to_zero() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        deck.time_update(p(0), 12.0, 60.0, &mut out).unwrap();
        out.clear();
        deck.time_update(p(0), 0.0, 60.0, &mut out).unwrap();
        assert_eq!(deck.binding(p(0)).unwrap().position, 0.0);
        assert_eq!(
            out,
            vec![DomCommand::Video { player: p(0), command: VideoCommand::SetProgress(0.0) }]
        );

        deck.time_update(p(0), f64::NAN, 60.0, &mut out).unwrap();
        deck.time_update(p(0), -3.0, 60.0, &mut out).unwrap();
        assert_eq!(deck.binding(p(0)).unwrap().position, 0.0);
    }

    #[test]
    fn clearing_timers_cancels_the_fullscreen_restore() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        deck.toggle_fullscreen(p(0), ts(0), &mut out).unwrap();
        deck.clear_timers();
        assert_eq!(deck.next_deadline(), None);

        out.clear();
        deck.fire_next(ts(1_000), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn seek_needs_a_known_duration() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        deck.seek_fraction(p(0), 0.5, &mut out).unwrap();
        assert!(out.is_empty());

        deck.time_update(p(0), 1.0, 40.0, &mut out).unwrap();
        deck.seek_fraction(p(0), 0.25, &mut out).unwrap();
        assert_eq!(deck.binding(p(0)).unwrap().position, 10.0);
    }

    #[test]
    fn rejected_playback_marks_player_paused() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        deck.toggle_play(p(0), &mut out).unwrap();
        deck.playback_rejected(p(0), "NotAllowedError", &mut out).unwrap();
        assert!(!deck.binding(p(0)).unwrap().playing);
    }

    #[test]
    fn unknown_players_are_errors() {
        let mut deck = deck(VideoSettings::default());
        let mut out = Vec::new();
        assert!(matches!(
            deck.toggle_play(p(9), &mut out),
            Err(SiteError::UnknownPlayer(_))
        ));
    }
}
