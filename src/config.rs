// Site configuration passed from JS as JSON. Every field has a default, so `{}` is valid.

use serde::{Deserialize, Serialize};

use crate::error::SiteError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Id of the landing section that hosts the font/background loop.
    #[serde(default = "default_landing_section")]
    pub landing_section: String,
    /// `error`, `warn`, `info`, `debug`, `trace` or `off`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay before the page is marked loaded, which starts the entrance styles.
    #[serde(default = "default_loaded_delay")]
    pub loaded_delay_ms: u64,
    #[serde(default)]
    pub navigator: NavigatorSettings,
    #[serde(default)]
    pub transition: TransitionSettings,
    #[serde(default)]
    pub video: VideoSettings,
    #[serde(default)]
    pub home: HomeSettings,
    #[serde(default)]
    pub menu: MenuSettings,
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub contact: ContactSettings,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            landing_section: default_landing_section(),
            log_level: default_log_level(),
            loaded_delay_ms: default_loaded_delay(),
            navigator: NavigatorSettings::default(),
            transition: TransitionSettings::default(),
            video: VideoSettings::default(),
            home: HomeSettings::default(),
            menu: MenuSettings::default(),
            grid: GridSettings::default(),
            contact: ContactSettings::default(),
        }
    }
}

impl SiteConfig {
    pub fn from_json(json: &str) -> Result<Self, SiteError> {
        let config: SiteConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall the timer loop or break the transition phases.
    pub fn validate(&self) -> Result<(), SiteError> {
        let t = &self.transition;
        if t.exit_ms == 0 || t.fallback_ms == 0 {
            return Err(SiteError::InvalidConfig(
                "transition durations must be non-zero".to_string(),
            ));
        }
        if t.exit_ms >= t.fallback_ms {
            return Err(SiteError::InvalidConfig(format!(
                "transition.exit_ms ({}) must be shorter than transition.fallback_ms ({})",
                t.exit_ms, t.fallback_ms
            )));
        }
        if self.home.interval_ms == 0 {
            return Err(SiteError::InvalidConfig(
                "home.interval_ms must be non-zero".to_string(),
            ));
        }
        if self.home.pairs.is_empty() {
            return Err(SiteError::InvalidConfig(
                "home.pairs must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.video.default_volume) {
            return Err(SiteError::InvalidConfig(format!(
                "video.default_volume {} is outside 0..=1",
                self.video.default_volume
            )));
        }
        crate::logging::parse_level(&self.log_level)?;
        if self.navigator.swipe_threshold_px < 0.0 {
            return Err(SiteError::InvalidConfig(
                "navigator.swipe_threshold_px must not be negative".to_string(),
            ));
        }
        self.grid.validate()
    }
}

impl GridSettings {
    fn validate(&self) -> Result<(), SiteError> {
        for (name, ease) in [("ease", self.ease), ("pointer_ease", self.pointer_ease)] {
            if !(ease > 0.0 && ease <= 1.0) {
                return Err(SiteError::InvalidConfig(format!(
                    "grid.{} {} is outside (0, 1]",
                    name, ease
                )));
            }
        }
        if self.frame_ms == 0 {
            return Err(SiteError::InvalidConfig(
                "grid.frame_ms must be non-zero".to_string(),
            ));
        }
        if !(self.design_width > 0.0 && self.design_height > 0.0) {
            return Err(SiteError::InvalidConfig(
                "grid design size must be positive".to_string(),
            ));
        }
        if !self.areas.is_empty() && self.sources.is_empty() {
            return Err(SiteError::InvalidConfig(
                "grid.areas need at least one grid.sources entry".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_landing_section() -> String {
    "home".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_loaded_delay() -> u64 {
    500
}

/// Input interpretation and throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigatorSettings {
    /// Lock held after an accepted navigation.
    #[serde(default = "default_scroll_delay")]
    pub scroll_delay_ms: u64,
    /// Quiet period that closes a burst of wheel events.
    #[serde(default = "default_wheel_debounce")]
    pub wheel_debounce_ms: u64,
    /// Minimum vertical travel for a swipe.
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold_px: f64,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        NavigatorSettings {
            scroll_delay_ms: default_scroll_delay(),
            wheel_debounce_ms: default_wheel_debounce(),
            swipe_threshold_px: default_swipe_threshold(),
        }
    }
}

fn default_scroll_delay() -> u64 {
    1_000
}

fn default_wheel_debounce() -> u64 {
    50
}

fn default_swipe_threshold() -> f64 {
    50.0
}

/// Transition phase timings. Must match the stylesheet's fade durations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionSettings {
    /// Exit fade of the outgoing section.
    #[serde(default = "default_exit")]
    pub exit_ms: u64,
    /// Deadline after which the transition completes without a DOM signal.
    #[serde(default = "default_fallback")]
    pub fallback_ms: u64,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        TransitionSettings {
            exit_ms: default_exit(),
            fallback_ms: default_fallback(),
        }
    }
}

fn default_exit() -> u64 {
    600
}

fn default_fallback() -> u64 {
    1_500
}

/// What happens to a video's position when its section is entered again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PositionPolicy {
    /// Start over from 0 on every entry.
    #[default]
    ResetOnEnter,
    /// Pick up where the viewer left off.
    Resume,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    #[serde(default)]
    pub position_policy: PositionPolicy,
    /// Start the entered section's video (muted) once the transition settles.
    #[serde(default = "default_true")]
    pub autoplay_active: bool,
    /// Volume used on unmute when nothing audible was cached.
    #[serde(default = "default_volume")]
    pub default_volume: f64,
    /// Delay before position and play state are reapplied after a fullscreen switch.
    #[serde(default = "default_fullscreen_settle")]
    pub fullscreen_settle_ms: u64,
}

impl Default for VideoSettings {
    fn default() -> Self {
        VideoSettings {
            position_policy: PositionPolicy::default(),
            autoplay_active: default_true(),
            default_volume: default_volume(),
            fullscreen_settle_ms: default_fullscreen_settle(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_volume() -> f64 {
    0.5
}

fn default_fullscreen_settle() -> u64 {
    100
}

/// One step of the landing loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontImagePair {
    pub font: String,
    pub image: String,
}

impl FontImagePair {
    pub fn new(font: impl Into<String>, image: impl Into<String>) -> Self {
        FontImagePair {
            font: font.into(),
            image: image.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeSettings {
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    /// Wait before the first change after start.
    #[serde(default)]
    pub initial_delay_ms: u64,
    #[serde(default = "default_pairs")]
    pub pairs: Vec<FontImagePair>,
}

impl Default for HomeSettings {
    fn default() -> Self {
        HomeSettings {
            interval_ms: default_interval(),
            initial_delay_ms: 0,
            pairs: default_pairs(),
        }
    }
}

fn default_interval() -> u64 {
    100
}

fn default_pairs() -> Vec<FontImagePair> {
    [
        ("'Playfair Display', serif", 1),
        ("'Amatic SC', cursive", 2),
        ("'Anton', sans-serif", 3),
        ("'Orbitron', sans-serif", 4),
        ("'Lucida Console', monospace", 5),
        ("'Pacifico', cursive", 6),
        ("'Trebuchet MS', sans-serif", 7),
        ("'Impact', sans-serif", 8),
        ("'Poppins', sans-serif", 9),
    ]
    .into_iter()
    .map(|(font, n)| FontImagePair::new(font, format!("assets/images/index_univ_{n}.png")))
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuSettings {
    /// Time given to the panel's closing animation before navigating.
    #[serde(default = "default_navigate_delay")]
    pub navigate_delay_ms: u64,
    #[serde(default = "default_stagger")]
    pub item_stagger_base_ms: u64,
    #[serde(default = "default_stagger")]
    pub item_stagger_step_ms: u64,
}

impl Default for MenuSettings {
    fn default() -> Self {
        MenuSettings {
            navigate_delay_ms: default_navigate_delay(),
            item_stagger_base_ms: default_stagger(),
            item_stagger_step_ms: default_stagger(),
        }
    }
}

fn default_navigate_delay() -> u64 {
    300
}

fn default_stagger() -> u64 {
    50
}

/// Image and caption shown by grid tiles, assigned to areas round-robin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSource {
    pub image: String,
    #[serde(default)]
    pub caption: Vec<String>,
}

/// Tile rectangle in design coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridArea {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Parallax grid of the contact section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    /// Fraction of the remaining scroll distance covered per frame.
    #[serde(default = "default_grid_ease")]
    pub ease: f64,
    #[serde(default = "default_grid_ease")]
    pub pointer_ease: f64,
    /// Pixels of grid travel per pixel of wheel delta.
    #[serde(default = "default_wheel_factor")]
    pub wheel_factor: f64,
    /// Per-frame scroll delta amplification for the drift parallax.
    #[serde(default = "default_drift_factor")]
    pub drift_factor: f64,
    /// Share of a tile's size it shifts as the pointer crosses the viewport.
    #[serde(default = "default_pointer_parallax")]
    pub pointer_parallax: f64,
    /// Counter-shift of the image inside its tile.
    #[serde(default = "default_image_parallax")]
    pub image_parallax: f64,
    #[serde(default = "default_image_scale")]
    pub image_scale: f64,
    #[serde(default = "default_frame")]
    pub frame_ms: u64,
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
    /// Size of the layout the areas were drawn on. One design tile spans the
    /// viewport width.
    #[serde(default = "default_design_width")]
    pub design_width: f64,
    #[serde(default = "default_design_height")]
    pub design_height: f64,
    #[serde(default = "default_grid_sources")]
    pub sources: Vec<GridSource>,
    #[serde(default = "default_grid_areas")]
    pub areas: Vec<GridArea>,
    /// Seed for the per-tile parallax weights.
    #[serde(default)]
    pub seed: u64,
}

impl Default for GridSettings {
    fn default() -> Self {
        GridSettings {
            ease: default_grid_ease(),
            pointer_ease: default_grid_ease(),
            wheel_factor: default_wheel_factor(),
            drift_factor: default_drift_factor(),
            pointer_parallax: default_pointer_parallax(),
            image_parallax: default_image_parallax(),
            image_scale: default_image_scale(),
            frame_ms: default_frame(),
            image_dir: default_image_dir(),
            design_width: default_design_width(),
            design_height: default_design_height(),
            sources: default_grid_sources(),
            areas: default_grid_areas(),
            seed: 0,
        }
    }
}

fn default_grid_ease() -> f64 {
    0.1
}

fn default_wheel_factor() -> f64 {
    0.4
}

fn default_drift_factor() -> f64 {
    5.0
}

fn default_pointer_parallax() -> f64 {
    0.6
}

fn default_image_parallax() -> f64 {
    0.3
}

fn default_image_scale() -> f64 {
    1.1
}

fn default_frame() -> u64 {
    16
}

fn default_image_dir() -> String {
    "assets/images/cinema/".to_string()
}

fn default_design_width() -> f64 {
    1522.0
}

fn default_design_height() -> f64 {
    1238.0
}

fn default_grid_sources() -> Vec<GridSource> {
    [
        ("cadreur.jpeg", ["Art direction", "Visual worlds", "Cinematic storytelling", "2024"]),
        (
            "decorateur.jpg",
            ["Audiovisual production", "Short and feature films", "Creative documentaries", "2023"],
        ),
        ("grip.jpeg", ["Post-production", "Editing and grading", "Sound design", "2024"]),
        ("moniteur.jpeg", ["Cinematography", "Creative lighting", "Image composition", "2022"]),
        ("lens-1.jpg", ["Directing", "Actor direction", "Staging", "2024"]),
        ("set-1.jpg", ["Commercials", "Corporate films", "Digital content", "2023"]),
    ]
    .into_iter()
    .map(|(image, caption)| GridSource {
        image: image.to_string(),
        caption: caption.iter().map(|line| line.to_string()).collect(),
    })
    .collect()
}

fn default_grid_areas() -> Vec<GridArea> {
    [
        (71.0, 58.0, 400.0, 270.0),
        (211.0, 255.0, 540.0, 360.0),
        (631.0, 158.0, 400.0, 270.0),
        (1191.0, 245.0, 260.0, 195.0),
        (351.0, 687.0, 260.0, 290.0),
        (751.0, 824.0, 205.0, 154.0),
    ]
    .into_iter()
    .map(|(x, y, w, h)| GridArea { x, y, w, h })
    .collect()
}

/// Mail contact button with a form fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSettings {
    #[serde(default = "default_mailto")]
    pub mailto: String,
    /// Wait before assuming no mail client opened.
    #[serde(default = "default_form_reveal")]
    pub form_reveal_delay_ms: u64,
    /// Message shown with the form. `null` shows the form silently.
    #[serde(default = "default_form_notice")]
    pub form_notice: Option<String>,
}

impl Default for ContactSettings {
    fn default() -> Self {
        ContactSettings {
            mailto: default_mailto(),
            form_reveal_delay_ms: default_form_reveal(),
            form_notice: default_form_notice(),
        }
    }
}

fn default_mailto() -> String {
    "mailto:test@example.com?subject=Contact&body=Bonjour".to_string()
}

fn default_form_reveal() -> u64 {
    4_000
}

fn default_form_notice() -> Option<String> {
    Some(
        "If your mail application did not open, you can reach us through this form."
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = SiteConfig::from_json("{}").unwrap();
        assert_eq!(config.landing_section, "home");
        assert_eq!(config.loaded_delay_ms, 500);
        assert_eq!(config.transition.exit_ms, 600);
        assert_eq!(config.transition.fallback_ms, 1_500);
        assert_eq!(config.navigator.wheel_debounce_ms, 50);
        assert_eq!(config.home.pairs.len(), 9);
        assert_eq!(config.video.position_policy, PositionPolicy::ResetOnEnter);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let json = r#"{"navigator":{"scroll_delay_ms":500},"video":{"position_policy":"Resume"}}"#;
        let config = SiteConfig::from_json(json).unwrap();
        assert_eq!(config.navigator.scroll_delay_ms, 500);
        assert_eq!(config.navigator.swipe_threshold_px, 50.0);
        assert_eq!(config.video.position_policy, PositionPolicy::Resume);
    }

    #[test]
    fn exit_must_be_shorter_than_fallback() {
        let err = SiteConfig::from_json(r#"{"transition":{"exit_ms":2000,"fallback_ms":1500}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("exit_ms"));
    }

    #[test]
    fn rejects_unknown_log_level() {
        assert!(SiteConfig::from_json(r#"{"log_level":"chatty"}"#).is_err());
        assert!(SiteConfig::from_json(r#"{"log_level":"Debug"}"#).is_ok());
    }

    #[test]
    fn rejects_zero_interval_and_empty_pairs() {
        assert!(SiteConfig::from_json(r#"{"home":{"interval_ms":0}}"#).is_err());
        assert!(SiteConfig::from_json(r#"{"home":{"pairs":[]}}"#).is_err());
    }

    #[test]
    fn grid_defaults_pair_six_areas_with_six_sources() {
        let config = SiteConfig::from_json("{}").unwrap();
        assert_eq!(config.grid.areas.len(), 6);
        assert_eq!(config.grid.sources.len(), 6);
        assert_eq!(config.grid.frame_ms, 16);
        assert_eq!(config.contact.form_reveal_delay_ms, 4_000);
    }

    #[test]
    fn rejects_unusable_grid_settings() {
        assert!(SiteConfig::from_json(r#"{"grid":{"ease":0}}"#).is_err());
        assert!(SiteConfig::from_json(r#"{"grid":{"pointer_ease":1.5}}"#).is_err());
        assert!(SiteConfig::from_json(r#"{"grid":{"frame_ms":0}}"#).is_err());
        assert!(SiteConfig::from_json(r#"{"grid":{"sources":[]}}"#).is_err());
        assert!(SiteConfig::from_json(r#"{"grid":{"sources":[],"areas":[]}}"#).is_ok());
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = SiteConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, SiteError::Serialization(_)));
    }
}
