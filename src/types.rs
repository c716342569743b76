// Strong typing over strings. Newtypes for clock readings, section ids and player ids.
// Inputs come in from the DOM layer as `InputEvent`; everything the engine wants done
// to the page goes back out as `DomCommand`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic clock reading in milliseconds (browser `performance.now()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Reading `ms` milliseconds after this one.
    pub fn after(&self, ms: u64) -> Self {
        Timestamp(self.0.saturating_add(ms))
    }

    /// Milliseconds from `self` until `later`, zero if `later` is not in the future.
    pub fn until(&self, later: Timestamp) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

/// Section identifier (the element `id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    pub fn new(id: impl Into<String>) -> Self {
        SectionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionId {
    fn from(id: &str) -> Self {
        SectionId::new(id)
    }
}

/// Video player handle, assigned in document order at mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(u32);

impl PlayerId {
    pub fn new(id: u32) -> Self {
        PlayerId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

/// Discrete navigation intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Previous,
    Next,
}

impl Direction {
    /// Direction of a wheel or swipe delta. Positive moves forward.
    pub fn from_delta(delta: f64) -> Option<Self> {
        if delta > 0.0 {
            Some(Direction::Next)
        } else if delta < 0.0 {
            Some(Direction::Previous)
        } else {
            None
        }
    }

    /// Apply to an index, `None` when the result would leave `0..len`.
    pub fn step(&self, index: usize, len: usize) -> Option<usize> {
        let target = match self {
            Direction::Next => index.checked_add(1)?,
            Direction::Previous => index.checked_sub(1)?,
        };
        (target < len).then_some(target)
    }
}

/// One full-viewport block of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub index: usize,
    pub is_active: bool,
    pub is_leaving: bool,
    /// Body background while this section is shown (`data-bgColor`).
    #[serde(default)]
    pub bg_color: Option<String>,
    /// Project sections show the navigation chrome.
    #[serde(default)]
    pub is_project: bool,
}

impl Section {
    pub fn new(id: impl Into<String>, index: usize) -> Self {
        Section {
            id: SectionId::new(id),
            index,
            is_active: false,
            is_leaving: false,
            bg_color: None,
            is_project: false,
        }
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    pub fn with_bg_color(mut self, color: impl Into<String>) -> Self {
        self.bg_color = Some(color.into());
        self
    }

    pub fn project(mut self) -> Self {
        self.is_project = true;
        self
    }
}

/// Which way a transition settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionSource {
    /// The incoming section reported the end of its opacity transition.
    VisualSignal,
    /// The fallback deadline elapsed first.
    Fallback,
}

/// Payload of `sectionTransitionComplete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionComplete {
    pub section: SectionId,
    pub previous_section: Option<SectionId>,
    #[serde(skip)]
    pub source: Option<CompletionSource>,
}

/// Viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Viewport { width, height }
    }
}

/// Page layout discovered at mount.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub sections: Vec<Section>,
    /// Players in document order with the section that owns them.
    pub players: Vec<(PlayerId, SectionId)>,
    /// Menu links in document order, by target section.
    pub menu_links: Vec<SectionId>,
    /// Whether the landing title element exists.
    pub has_home_title: bool,
    pub viewport: Viewport,
    /// Section hosting the parallax grid container, if the page has one.
    pub contact_grid: Option<SectionId>,
    /// Text of each project description, in document order.
    pub descriptions: Vec<String>,
    /// Whether the mail contact button exists.
    pub has_contact_button: bool,
}

/// Input signal from the page. Tagged so JS can hand over batches as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputEvent {
    Wheel {
        delta_y: f64,
        #[serde(default)]
        delta_x: f64,
    },
    KeyDown { key: String },
    TouchStart { y: f64 },
    TouchEnd { y: f64 },
    /// Click on the landing title.
    TitleClick,
    MenuToggle,
    MenuOpen,
    MenuClose,
    MenuLink { section: SectionId },
    /// Click on the navigation indicator at `index`.
    NavIndicator { index: usize },
    /// `transitionend` raised on a section element.
    TransitionEnd { section: SectionId, property: String },
    PlayerHover { player: PlayerId, entered: bool },
    PlayToggle { player: PlayerId },
    MuteToggle { player: PlayerId },
    VolumeSet { player: PlayerId, fraction: f64 },
    ProgressSeek { player: PlayerId, fraction: f64 },
    TimeUpdate { player: PlayerId, position: f64, duration: f64 },
    /// Native play/pause/ended notification.
    MediaState { player: PlayerId, playing: bool },
    PlaybackRejected { player: PlayerId, reason: String },
    FullscreenToggle { player: PlayerId },
    /// Document fullscreen element changed; `None` when fullscreen was left.
    FullscreenChanged { player: Option<PlayerId> },
    /// Mouse button or first touch went down, in client coordinates.
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    Resize { width: f64, height: f64 },
    /// Click on the mail contact button.
    ContactClick,
}

/// Class markers the engine toggles on section elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionMarker {
    Active,
    Leaving,
}

impl SectionMarker {
    pub fn class_name(&self) -> &'static str {
        match self {
            SectionMarker::Active => "active",
            SectionMarker::Leaving => "leaving",
        }
    }
}

/// The two double-buffered background layers of the landing section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackgroundLayer {
    Primary,
    Secondary,
}

impl BackgroundLayer {
    pub fn element_id(&self) -> &'static str {
        match self {
            BackgroundLayer::Primary => "bg1",
            BackgroundLayer::Secondary => "bg2",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            BackgroundLayer::Primary => BackgroundLayer::Secondary,
            BackgroundLayer::Secondary => BackgroundLayer::Primary,
        }
    }
}

/// Media element mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VideoCommand {
    Play,
    Pause,
    Seek { position: f64 },
    SetMuted(bool),
    SetVolume(f64),
    /// Progress bar width in percent.
    SetProgress(f64),
    SetPlayIcon { paused: bool },
    SetMuteIcon { muted: bool },
    SetFullscreenIcon { fullscreen: bool },
    RequestFullscreen,
    ExitFullscreen,
}

/// Landing-section mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HomeCommand {
    SetTitleFont(String),
    /// Re-layout the title so a font swap is not coalesced away.
    ReflowTitle,
    SetLayerImage { layer: BackgroundLayer, image: String },
    SetLayerOpacity { layer: BackgroundLayer, opacity: f32 },
    /// Show or hide the title and both layers.
    SetVisible(bool),
}

/// One tile of the contact grid as the page should build it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridTileView {
    pub image: String,
    pub caption: Vec<String>,
    pub width: f64,
    pub height: f64,
}

/// Contact grid mutation. Items are addressed by build order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GridCommand {
    /// Replace the container's children with these tiles.
    Build(Vec<GridTileView>),
    Place {
        item: usize,
        x: f64,
        y: f64,
        image_x: f64,
        image_y: f64,
        image_scale: f64,
    },
    SetCaptionVisible { item: usize, visible: bool },
    SetDragging(bool),
    /// Lock page overflow while the grid owns the wheel.
    SetScrollLock(bool),
}

/// Everything the engine asks the page to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomCommand {
    AddMarker { section: SectionId, marker: SectionMarker },
    RemoveMarker { section: SectionId, marker: SectionMarker },
    /// Force a synchronous style recomputation on a section.
    ForceReflow { section: SectionId },
    SetTransitionInProgress(bool),
    SetBodyBackground(String),
    /// Mark navigation indicator `index` active, clear the rest.
    SetNavIndicator { index: usize },
    SetNavChromeVisible(bool),
    SetMenuLinkActive { section: SectionId, active: bool },
    SetMenuOpen(bool),
    /// Hide every menu item ahead of the staggered reveal.
    HideMenuItems,
    RevealMenuItem { index: usize },
    Video { player: PlayerId, command: VideoCommand },
    Home(HomeCommand),
    DispatchTransitionComplete(TransitionComplete),
    /// Add the `loaded` class to the body once the page has settled.
    MarkLoaded,
    Grid(GridCommand),
    /// Replace description `index` with one span per line.
    SplitDescription { index: usize, lines: Vec<String> },
    /// Add the `animations-ready` class to the body.
    MarkAnimationsReady,
    /// Replay the entrance animations inside a section that was just left.
    RestartAnimations { section: SectionId },
    OpenMailto(String),
    ShowContactForm { notice: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_arithmetic() {
        let ts = Timestamp::from_millis(1_000);
        assert_eq!(ts.after(500).as_millis(), 1_500);
        assert_eq!(ts.until(Timestamp::from_millis(1_250)), 250);
        assert_eq!(ts.until(Timestamp::from_millis(10)), 0);
    }

    #[test]
    fn direction_step_stays_in_bounds() {
        assert_eq!(Direction::Next.step(0, 3), Some(1));
        assert_eq!(Direction::Next.step(2, 3), None);
        assert_eq!(Direction::Previous.step(0, 3), None);
        assert_eq!(Direction::Previous.step(2, 3), Some(1));
        assert_eq!(Direction::from_delta(0.0), None);
        assert_eq!(Direction::from_delta(-3.0), Some(Direction::Previous));
    }

    #[test]
    fn completion_detail_uses_dom_field_names() {
        let detail = TransitionComplete {
            section: SectionId::new("a"),
            previous_section: Some(SectionId::new("home")),
            source: Some(CompletionSource::Fallback),
        };
        let json = serde_json::to_string(&detail).unwrap();
        assert_eq!(json, r#"{"section":"a","previousSection":"home"}"#);
    }

    #[test]
    fn input_events_parse_from_tagged_json() {
        let event: InputEvent =
            serde_json::from_str(r#"{"type":"Wheel","delta_y":120.0}"#).unwrap();
        assert_eq!(event, InputEvent::Wheel { delta_y: 120.0, delta_x: 0.0 });

        let event: InputEvent =
            serde_json::from_str(r#"{"type":"MenuLink","section":"contact"}"#).unwrap();
        assert_eq!(
            event,
            InputEvent::MenuLink {
                section: SectionId::new("contact")
            }
        );
    }
}
