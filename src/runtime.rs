// Browser driver for `Site`: wires page listeners, applies commands and keeps one
// timeout armed for the earliest pending deadline.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use gloo_timers::callback::Timeout;
use log::{debug, info};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, CustomEvent, Event, EventTarget, HtmlInputElement, KeyboardEvent,
    MouseEvent, TouchEvent, TransitionEvent, WheelEvent, Window,
};

use crate::config::SiteConfig;
use crate::dom::{Feedback, Page, TRANSITION_COMPLETE_EVENT};
use crate::error::SiteError;
use crate::logging;
use crate::site::Site;
use crate::types::*;

/// An event listener removed from its target on drop.
pub struct Listener {
    target: EventTarget,
    event: &'static str,
    capture: bool,
    closure: Closure<dyn FnMut(Event)>,
}

impl Listener {
    pub fn new(
        target: &EventTarget,
        event: &'static str,
        options: ListenOptions,
        handler: impl FnMut(Event) + 'static,
    ) -> Self {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        let init = AddEventListenerOptions::new();
        init.set_capture(options.capture);
        init.set_passive(options.passive);
        let _ = target.add_event_listener_with_callback_and_add_event_listener_options(
            event,
            closure.as_ref().unchecked_ref(),
            &init,
        );
        Listener {
            target: target.clone(),
            event,
            capture: options.capture,
            closure,
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self.target.remove_event_listener_with_callback_and_bool(
            self.event,
            self.closure.as_ref().unchecked_ref(),
            self.capture,
        );
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListenOptions {
    pub capture: bool,
    pub passive: bool,
}

impl Default for ListenOptions {
    fn default() -> Self {
        ListenOptions { capture: false, passive: true }
    }
}

pub struct Runtime {
    this: Weak<Runtime>,
    window: Window,
    page: Page,
    site: RefCell<Site>,
    feedback: Feedback,
    listeners: RefCell<Vec<Listener>>,
    js_listeners: RefCell<HashMap<u32, Listener>>,
    next_js_listener: Cell<u32>,
    timeout: RefCell<Option<Timeout>>,
    /// The timeout that last fired. Kept until the next one fires so a callback
    /// never drops its own closure.
    spent: RefCell<Option<Timeout>>,
    armed_for: Cell<Option<Timestamp>>,
}

impl Runtime {
    /// Parse the config, scan the document, mount the site and start listening.
    pub fn start(config_json: &str) -> Result<Rc<Runtime>, SiteError> {
        let config = SiteConfig::from_json(config_json)?;
        logging::init(logging::parse_level(&config.log_level)?);

        let window =
            web_sys::window().ok_or_else(|| SiteError::MissingElement("window".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| SiteError::MissingElement("document".to_string()))?;
        let (page, mut layout) = Page::scan(&document)?;
        layout.viewport = viewport(&window);
        let site = Site::new(config, layout)?;

        let runtime = Rc::new_cyclic(|this: &Weak<Runtime>| {
            let weak = this.clone();
            let feedback: Feedback = Rc::new(move |event| {
                if let Some(runtime) = weak.upgrade() {
                    runtime.dispatch(event);
                }
            });
            Runtime {
                this: this.clone(),
                window,
                page,
                site: RefCell::new(site),
                feedback,
                listeners: RefCell::new(Vec::new()),
                js_listeners: RefCell::new(HashMap::new()),
                next_js_listener: Cell::new(0),
                timeout: RefCell::new(None),
                spent: RefCell::new(None),
                armed_for: Cell::new(None),
            }
        });

        let now = runtime.now();
        let commands = runtime.site.borrow_mut().mount(now);
        runtime.apply(commands);
        runtime.bind_listeners();
        runtime.rearm();
        info!("runtime started");
        Ok(runtime)
    }

    fn now(&self) -> Timestamp {
        let ms = self.window.performance().map(|p| p.now()).unwrap_or(0.0);
        Timestamp::from_millis(ms.max(0.0) as u64)
    }

    fn apply(&self, commands: Vec<DomCommand>) {
        for command in commands {
            self.page.apply(command, &self.feedback);
        }
    }

    /// Feed one input to the site. Input arriving while the site is busy (a listener
    /// fired from inside command application) is dropped.
    pub fn dispatch(&self, event: InputEvent) {
        let now = self.now();
        let commands = match self.site.try_borrow_mut() {
            Ok(mut site) => {
                let mut out = site.handle(event, now);
                out.extend(site.advance(now));
                out
            }
            Err(_) => {
                debug!("re-entrant input dropped: {:?}", event);
                return;
            }
        };
        self.apply(commands);
        self.rearm();
    }

    fn on_timer(&self) {
        let fired = self.timeout.borrow_mut().take();
        *self.spent.borrow_mut() = fired;
        self.armed_for.set(None);

        let now = self.now();
        let commands = self.site.borrow_mut().advance(now);
        self.apply(commands);
        self.rearm();
    }

    /// Keep exactly one timeout, armed for the earliest deadline.
    fn rearm(&self) {
        let Ok(site) = self.site.try_borrow() else {
            return;
        };
        let deadline = site.next_deadline();
        drop(site);

        if deadline == self.armed_for.get() && self.timeout.borrow().is_some() {
            return;
        }
        self.timeout.borrow_mut().take();
        self.armed_for.set(deadline);
        let Some(due) = deadline else {
            return;
        };
        let delay = self.now().until(due).min(u32::MAX as u64) as u32;
        let weak = self.this.clone();
        let timeout = Timeout::new(delay, move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.on_timer();
            }
        });
        *self.timeout.borrow_mut() = Some(timeout);
    }

    fn grid_active(&self) -> bool {
        self.site
            .try_borrow()
            .map(|site| site.grid().is_active())
            .unwrap_or(false)
    }

    /// Mouse and touch drags for the contact grid.
    fn bind_grid_pointer(&self, window: &EventTarget) {
        let weak = self.this.clone();
        let options = ListenOptions {
            capture: false,
            passive: false,
        };
        self.listen(window, "mousedown", options, move |e| {
            let mouse = e.dyn_ref::<MouseEvent>()?;
            if weak.upgrade().is_some_and(|rt| rt.grid_active()) {
                e.prevent_default();
            }
            Some(InputEvent::PointerDown {
                x: mouse.client_x() as f64,
                y: mouse.client_y() as f64,
            })
        });
        self.listen(window, "mousemove", ListenOptions::default(), |e| {
            let mouse = e.dyn_ref::<MouseEvent>()?;
            Some(InputEvent::PointerMove {
                x: mouse.client_x() as f64,
                y: mouse.client_y() as f64,
            })
        });
        self.listen(window, "mouseup", ListenOptions::default(), |_| {
            Some(InputEvent::PointerUp)
        });
        self.listen(window, "touchstart", ListenOptions::default(), |e| {
            let touch = e.dyn_ref::<TouchEvent>()?.touches().get(0)?;
            Some(InputEvent::PointerDown {
                x: touch.client_x() as f64,
                y: touch.client_y() as f64,
            })
        });
        self.listen(window, "touchmove", ListenOptions::default(), |e| {
            let touch = e.dyn_ref::<TouchEvent>()?.touches().get(0)?;
            Some(InputEvent::PointerMove {
                x: touch.client_x() as f64,
                y: touch.client_y() as f64,
            })
        });
        self.listen(window, "touchend", ListenOptions::default(), |_| {
            Some(InputEvent::PointerUp)
        });
    }

    fn listen(
        &self,
        target: &EventTarget,
        event: &'static str,
        options: ListenOptions,
        map: impl Fn(&Event) -> Option<InputEvent> + 'static,
    ) {
        let weak = self.this.clone();
        let listener = Listener::new(target, event, options, move |e: Event| {
            let Some(runtime) = weak.upgrade() else {
                return;
            };
            if let Some(input) = map(&e) {
                runtime.dispatch(input);
            }
        });
        self.listeners.borrow_mut().push(listener);
    }

    fn bind_listeners(&self) {
        let window: &EventTarget = self.window.as_ref();
        let document: &EventTarget = self.page.document.as_ref();

        self.listen(window, "wheel", ListenOptions { capture: false, passive: false }, |e| {
            let wheel = e.dyn_ref::<WheelEvent>()?;
            wheel.prevent_default();
            Some(InputEvent::Wheel {
                delta_y: wheel.delta_y(),
                delta_x: wheel.delta_x(),
            })
        });
        self.listen(window, "keydown", ListenOptions { capture: false, passive: false }, |e| {
            let key = e.dyn_ref::<KeyboardEvent>()?.key();
            if matches!(key.as_str(), "ArrowDown" | "ArrowUp" | "PageDown" | "PageUp") {
                e.prevent_default();
            }
            Some(InputEvent::KeyDown { key })
        });
        self.listen(window, "touchstart", ListenOptions::default(), |e| {
            let touch = e.dyn_ref::<TouchEvent>()?.changed_touches().get(0)?;
            Some(InputEvent::TouchStart { y: touch.client_y() as f64 })
        });
        self.listen(window, "touchend", ListenOptions::default(), |e| {
            let touch = e.dyn_ref::<TouchEvent>()?.changed_touches().get(0)?;
            Some(InputEvent::TouchEnd { y: touch.client_y() as f64 })
        });
        self.listen(window, "resize", ListenOptions::default(), |e| {
            let window = e.current_target()?.dyn_into::<Window>().ok()?;
            let Viewport { width, height } = viewport(&window);
            Some(InputEvent::Resize { width, height })
        });
        self.bind_grid_pointer(window);

        // Capture phase, so suppression runs before any page handler.
        let weak = self.this.clone();
        let click_guard = Listener::new(
            document,
            "click",
            ListenOptions { capture: true, passive: false },
            move |e: Event| {
                let blocked = weak
                    .upgrade()
                    .and_then(|rt| rt.site.try_borrow().ok().map(|site| site.blocks_clicks()))
                    .unwrap_or(false);
                if blocked {
                    e.prevent_default();
                    e.stop_propagation();
                }
            },
        );
        self.listeners.borrow_mut().push(click_guard);

        for (id, element) in &self.page.sections {
            let section = id.clone();
            self.listen(element.as_ref(), "transitionend", ListenOptions::default(), move |e| {
                let event = e.dyn_ref::<TransitionEvent>()?;
                let target = e.target()?.dyn_into::<web_sys::Element>().ok()?;
                if target.id() != section.as_str() {
                    return None;
                }
                Some(InputEvent::TransitionEnd {
                    section: section.clone(),
                    property: event.property_name(),
                })
            });
        }

        if let Some(title) = &self.page.title {
            self.listen(title.as_ref(), "click", ListenOptions::default(), |_| {
                Some(InputEvent::TitleClick)
            });
        }
        if let Some(toggle) = &self.page.menu_toggle {
            self.listen(toggle.as_ref(), "click", ListenOptions::default(), |_| {
                Some(InputEvent::MenuOpen)
            });
        }
        if let Some(close) = &self.page.menu_close {
            self.listen(close.as_ref(), "click", ListenOptions::default(), |_| {
                Some(InputEvent::MenuClose)
            });
        }
        for (id, link) in &self.page.menu_links {
            let section = id.clone();
            let options = ListenOptions {
                capture: false,
                passive: false,
            };
            self.listen(link.as_ref(), "click", options, move |e| {
                e.prevent_default();
                Some(InputEvent::MenuLink { section: section.clone() })
            });
        }
        if let Some(button) = &self.page.contact_button {
            let options = ListenOptions {
                capture: false,
                passive: false,
            };
            self.listen(button.as_ref(), "click", options, |e| {
                e.prevent_default();
                Some(InputEvent::ContactClick)
            });
        }
        for (index, line) in self.page.indicators.iter().enumerate() {
            self.listen(line.as_ref(), "click", ListenOptions::default(), move |_| {
                Some(InputEvent::NavIndicator { index })
            });
        }

        for (player, elements) in &self.page.players {
            self.bind_player(*player, elements);
        }

        let weak = self.this.clone();
        self.listen(document, "fullscreenchange", ListenOptions::default(), move |_| {
            let runtime = weak.upgrade()?;
            Some(InputEvent::FullscreenChanged { player: runtime.page.fullscreen_player() })
        });
    }

    fn bind_player(&self, player: PlayerId, elements: &crate::dom::PlayerElements) {
        let root: &EventTarget = elements.root.as_ref();
        self.listen(root, "mouseenter", ListenOptions::default(), move |_| {
            Some(InputEvent::PlayerHover { player, entered: true })
        });
        self.listen(root, "mouseleave", ListenOptions::default(), move |_| {
            Some(InputEvent::PlayerHover { player, entered: false })
        });

        let video: &EventTarget = elements.video.as_ref();
        let media = elements.video.clone();
        self.listen(video, "timeupdate", ListenOptions::default(), move |_| {
            Some(InputEvent::TimeUpdate {
                player,
                position: media.current_time(),
                duration: media.duration(),
            })
        });
        for (event, playing) in [("play", true), ("pause", false), ("ended", false)] {
            self.listen(video, event, ListenOptions::default(), move |_| {
                Some(InputEvent::MediaState { player, playing })
            });
        }

        if let Some(button) = &elements.play_button {
            self.listen(button.as_ref(), "click", ListenOptions::default(), move |e| {
                e.stop_propagation();
                Some(InputEvent::PlayToggle { player })
            });
        }
        if let Some(button) = &elements.mute_button {
            self.listen(button.as_ref(), "click", ListenOptions::default(), move |e| {
                e.stop_propagation();
                Some(InputEvent::MuteToggle { player })
            });
        }
        if let Some(button) = &elements.fullscreen_button {
            self.listen(button.as_ref(), "click", ListenOptions::default(), move |e| {
                e.stop_propagation();
                Some(InputEvent::FullscreenToggle { player })
            });
        }
        if let Some(slider) = &elements.volume_slider {
            self.listen(slider.as_ref(), "input", ListenOptions::default(), move |e| {
                let input = e.target()?.dyn_into::<HtmlInputElement>().ok()?;
                let max = input.max().parse::<f64>().ok().filter(|m| *m > 0.0).unwrap_or(1.0);
                let value = input.value().parse::<f64>().ok()?;
                Some(InputEvent::VolumeSet { player, fraction: value / max })
            });
        }
        if let Some(bar) = &elements.progress_bar {
            let bar_element = bar.clone();
            self.listen(bar.as_ref(), "click", ListenOptions::default(), move |e| {
                let click = e.dyn_ref::<MouseEvent>()?;
                let rect = bar_element.get_bounding_client_rect();
                if rect.width() <= 0.0 {
                    return None;
                }
                let fraction = (click.client_x() as f64 - rect.left()) / rect.width();
                Some(InputEvent::ProgressSeek { player, fraction })
            });
        }
    }

    pub fn navigate_to(&self, id: &SectionId) -> Result<(), SiteError> {
        let now = self.now();
        let commands = self.site.borrow_mut().navigate_to(id, now)?;
        self.apply(commands);
        self.rearm();
        Ok(())
    }

    pub fn scroll(&self, direction: Direction) {
        let now = self.now();
        let commands = self.site.borrow_mut().scroll(direction, now);
        self.apply(commands);
        self.rearm();
    }

    pub fn current_section(&self) -> Option<SectionId> {
        self.site.borrow().current_section().cloned()
    }

    /// Call `callback(detail)` for every `sectionTransitionComplete`. Returns an id
    /// for `unsubscribe`.
    pub fn on_transition_complete(&self, callback: js_sys::Function) -> u32 {
        let id = self.next_js_listener.get();
        self.next_js_listener.set(id.wrapping_add(1));
        let document: &EventTarget = self.page.document.as_ref();
        let notify = move |e: Event| {
            let Some(event) = e.dyn_ref::<CustomEvent>() else {
                return;
            };
            if let Err(err) = callback.call1(&wasm_bindgen::JsValue::NULL, &event.detail()) {
                log::warn!("transition listener threw: {}", crate::dom::describe(&err));
            }
        };
        let listener = Listener::new(
            document,
            TRANSITION_COMPLETE_EVENT,
            ListenOptions::default(),
            notify,
        );
        self.js_listeners.borrow_mut().insert(id, listener);
        id
    }

    pub fn unsubscribe(&self, id: u32) -> bool {
        self.js_listeners.borrow_mut().remove(&id).is_some()
    }

    /// Detach every listener, cancel the timeout and stop the site.
    pub fn destroy(&self) {
        let commands = self.site.borrow_mut().destroy();
        self.apply(commands);
        self.listeners.borrow_mut().clear();
        self.js_listeners.borrow_mut().clear();
        self.timeout.borrow_mut().take();
        self.armed_for.set(None);
        info!("runtime destroyed");
    }
}

fn viewport(window: &Window) -> Viewport {
    let size = |value: Result<wasm_bindgen::JsValue, wasm_bindgen::JsValue>| {
        value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
    };
    Viewport::new(size(window.inner_width()), size(window.inner_height()))
}
