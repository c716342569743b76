// folio_engine: Rust/WASM engine for a full-screen, section-based portfolio page.
// The core (navigation, transitions, video, landing loop, menu, contact grid) is
// sans-IO and runs natively under test. The browser layer is compiled for wasm32 only.

mod config;
mod contact;
mod descriptions;
mod error;
mod events;
mod grid;
mod home;
mod logging;
mod menu;
mod navigator;
mod site;
mod timers;
mod transition;
mod types;
mod video;

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod runtime;

use wasm_bindgen::prelude::*;

pub use config::{
    ContactSettings, FontImagePair, GridArea, GridSettings, GridSource, HomeSettings,
    MenuSettings, NavigatorSettings, PositionPolicy, SiteConfig, TransitionSettings,
    VideoSettings,
};
pub use contact::ContactForm;
pub use descriptions::split_sentences;
pub use error::{SiteError, TransitionError};
pub use events::{EventBus, SubscriptionId};
pub use grid::{ContactGrid, GridItem};
pub use home::{HomeAnimator, HomeState};
pub use logging::parse_level;
pub use menu::MenuController;
pub use navigator::{Navigation, SectionNavigator};
pub use site::Site;
pub use timers::{TimerId, TimerQueue};
pub use transition::{TransitionController, TransitionState, TransitionTicket};
pub use types::*;
pub use video::{VideoBinding, VideoDeck};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Handle returned to JavaScript by `FolioSite.mount`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct FolioSite {
    runtime: std::rc::Rc<runtime::Runtime>,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl FolioSite {
    /// Scan the document and take over navigation. `config_json` may be `"{}"`.
    pub fn mount(config_json: &str) -> Result<FolioSite, JsValue> {
        let runtime = runtime::Runtime::start(config_json).map_err(to_js)?;
        Ok(FolioSite { runtime })
    }

    pub fn navigate_to(&self, section_id: &str) -> Result<(), JsValue> {
        self.runtime.navigate_to(&SectionId::new(section_id)).map_err(to_js)
    }

    pub fn scroll_up(&self) {
        self.runtime.scroll(Direction::Previous);
    }

    pub fn scroll_down(&self) {
        self.runtime.scroll(Direction::Next);
    }

    pub fn current_section(&self) -> Option<String> {
        self.runtime.current_section().map(|id| id.as_str().to_string())
    }

    /// Feed page input the engine does not listen for itself, as JSON
    /// (one `InputEvent` or an array of them).
    pub fn dispatch(&self, events_json: &str) -> Result<(), JsValue> {
        let events: Vec<InputEvent> = match serde_json::from_str::<Vec<InputEvent>>(events_json) {
            Ok(events) => events,
            Err(_) => vec![serde_json::from_str(events_json)
                .map_err(|e| JsValue::from_str(&format!("Invalid input event: {}", e)))?],
        };
        for event in events {
            self.runtime.dispatch(event);
        }
        Ok(())
    }

    /// `callback(detail)` runs after every settled transition. Returns an id for
    /// `unsubscribe`.
    pub fn on_transition_complete(&self, callback: js_sys::Function) -> u32 {
        self.runtime.on_transition_complete(callback)
    }

    pub fn unsubscribe(&self, id: u32) -> bool {
        self.runtime.unsubscribe(id)
    }

    pub fn destroy(&self) {
        self.runtime.destroy();
    }
}

#[cfg(target_arch = "wasm32")]
fn to_js(err: SiteError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
