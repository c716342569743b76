//! Browser tests. Run with `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use folio_engine::FolioSite;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const PAGE: &str = r##"
  <h1 id="romy">Romy</h1>
  <section id="home" class="section active"></section>
  <section id="work" class="section project-section" data-bgColor="#222">
    <div class="minimal-player">
      <video></video>
      <div class="progress-bar"><div class="progress"></div></div>
    </div>
    <p class="project-description">Shot on 16mm. Graded in Paris.</p>
  </section>
  <section id="contact" class="section">
    <div id="contact-grid"></div>
    <a id="btncontact" href="#">Write</a>
    <form id="contactForm" style="display:none"></form>
  </section>
  <div id="menuPanel">
    <div class="menu-items"><a href="#work">Work</a><a href="#contact">Contact</a></div>
  </div>
  <div class="ligne-container">
    <div class="ligne"></div><div class="ligne"></div><div class="ligne"></div>
  </div>
"##;

fn document() -> web_sys::Document {
    web_sys::window().unwrap().document().unwrap()
}

fn setup() -> FolioSite {
    document().body().unwrap().set_inner_html(PAGE);
    FolioSite::mount(r#"{"log_level":"warn"}"#).unwrap()
}

fn has_class(id: &str, class: &str) -> bool {
    document()
        .get_element_by_id(id)
        .map(|e| e.class_list().contains(class))
        .unwrap_or(false)
}

async fn sleep(ms: u32) {
    gloo_timers::future::TimeoutFuture::new(ms).await;
}

#[wasm_bindgen_test]
fn mount_creates_background_layers() {
    let site = setup();
    assert!(document().get_element_by_id("bg1").is_some());
    assert!(document().get_element_by_id("bg2").is_some());
    assert_eq!(site.current_section().as_deref(), Some("home"));
    site.destroy();
}

#[wasm_bindgen_test]
fn invalid_config_is_rejected() {
    document().body().unwrap().set_inner_html(PAGE);
    assert!(FolioSite::mount(r#"{"transition":{"exit_ms":0}}"#).is_err());
}

#[wasm_bindgen_test]
fn unknown_section_is_an_error() {
    let site = setup();
    assert!(site.navigate_to("nowhere").is_err());
    site.destroy();
}

#[wasm_bindgen_test]
async fn scroll_down_marks_sections_and_notifies() {
    let site = setup();
    let seen = Rc::new(RefCell::new(Vec::<String>::new()));
    let sink = seen.clone();
    let callback = Closure::wrap(Box::new(move |detail: JsValue| {
        let section = js_sys::Reflect::get(&detail, &JsValue::from_str("section"))
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default();
        sink.borrow_mut().push(section);
    }) as Box<dyn FnMut(JsValue)>);
    let function = callback.as_ref().unchecked_ref::<js_sys::Function>().clone();
    let id = site.on_transition_complete(function);

    site.scroll_down();
    assert!(has_class("home", "leaving"));
    assert!(!has_class("home", "active"));

    sleep(1_700).await;
    assert!(has_class("work", "active"));
    assert!(!has_class("home", "leaving"));
    assert_eq!(*seen.borrow(), vec!["work".to_string()]);
    assert_eq!(site.current_section().as_deref(), Some("work"));

    assert!(site.unsubscribe(id));
    site.destroy();
}

#[wasm_bindgen_test]
async fn destroy_stops_navigation() {
    let site = setup();
    site.destroy();
    site.scroll_down();
    sleep(50).await;
    assert_eq!(site.current_section().as_deref(), Some("home"));
    assert!(has_class("home", "active"));
}

#[wasm_bindgen_test]
fn descriptions_are_split_into_lines() {
    let site = setup();
    let lines = document()
        .query_selector_all(".project-description-line")
        .unwrap();
    assert_eq!(lines.length(), 2);
    assert!(document().body().unwrap().class_list().contains("animations-ready"));
    site.destroy();
}

#[wasm_bindgen_test]
fn contact_grid_is_built_at_mount() {
    let site = setup();
    let items = document().query_selector_all("#contact-grid .grid-item").unwrap();
    assert_eq!(items.length(), 24);
    assert!(document().query_selector("#contact-grid img").unwrap().is_some());
    site.destroy();
}
