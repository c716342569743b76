// Page binding. Reads the document into a `PageLayout` with element handles, and
// applies `DomCommand`s to those elements. Holds no state of its own.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CustomEvent, CustomEventInit, Document, Element, HtmlElement, HtmlInputElement,
    HtmlVideoElement, NodeList,
};

use crate::error::SiteError;
use crate::types::*;

/// Sink for signals the page produces while commands are applied (rejected `play()`).
pub type Feedback = Rc<dyn Fn(InputEvent)>;

pub const TRANSITION_COMPLETE_EVENT: &str = "sectionTransitionComplete";

const CHROME_OPACITY: &str = "0.6";

/// Parts of a section whose entrance animation replays on the next visit.
const ANIMATED_PARTS: &str =
    ".project-title-container, .project-video-container, .project-description-line";

/// Elements of one `.minimal-player`. Controls are optional.
pub struct PlayerElements {
    pub root: Element,
    pub video: HtmlVideoElement,
    pub progress_bar: Option<Element>,
    progress: Option<HtmlElement>,
    pub mute_button: Option<Element>,
    volume_on: Option<HtmlElement>,
    volume_off: Option<HtmlElement>,
    pub volume_slider: Option<HtmlInputElement>,
    pub fullscreen_button: Option<Element>,
    fullscreen_enter: Option<HtmlElement>,
    fullscreen_exit: Option<HtmlElement>,
    pub play_button: Option<Element>,
    play_icon: Option<HtmlElement>,
    pause_icon: Option<HtmlElement>,
}

impl PlayerElements {
    fn scan(root: Element) -> Option<Self> {
        let video = select::<HtmlVideoElement>(&root, "video")?;
        Some(PlayerElements {
            progress_bar: select(&root, ".progress-bar"),
            progress: select(&root, ".progress"),
            mute_button: select(&root, ".mute-button"),
            volume_on: select(&root, ".volume-on"),
            volume_off: select(&root, ".volume-off"),
            volume_slider: select(&root, ".volume-slider"),
            fullscreen_button: select(&root, ".fullscreen-button"),
            fullscreen_enter: select(&root, ".fullscreen-enter"),
            fullscreen_exit: select(&root, ".fullscreen-exit"),
            play_button: select(&root, ".play-button"),
            play_icon: select(&root, ".play-icon"),
            pause_icon: select(&root, ".pause-icon"),
            root,
            video,
        })
    }
}

struct GridItemElements {
    root: HtmlElement,
    image: HtmlElement,
    caption: HtmlElement,
}

/// `#contact-grid` and the tiles built into it.
struct GridElements {
    container: HtmlElement,
    items: RefCell<Vec<GridItemElements>>,
}

pub struct Page {
    pub document: Document,
    pub body: HtmlElement,
    pub sections: Vec<(SectionId, HtmlElement)>,
    pub players: Vec<(PlayerId, PlayerElements)>,
    pub menu_toggle: Option<Element>,
    pub menu_close: Option<Element>,
    menu_panel: Option<Element>,
    pub menu_links: Vec<(SectionId, HtmlElement)>,
    pub indicators: Vec<HtmlElement>,
    chrome: Vec<HtmlElement>,
    pub title: Option<HtmlElement>,
    layers: [HtmlElement; 2],
    descriptions: Vec<HtmlElement>,
    grid: Option<GridElements>,
    pub contact_button: Option<HtmlElement>,
    contact_form: Option<HtmlElement>,
}

impl Page {
    /// Read the document. Missing optional parts are logged and left out.
    pub fn scan(document: &Document) -> Result<(Page, PageLayout), SiteError> {
        let body = document
            .body()
            .ok_or_else(|| SiteError::MissingElement("body".to_string()))?;

        let mut sections = Vec::new();
        let mut layout_sections = Vec::new();
        let elements = select_all::<HtmlElement>(document, ".section");
        for (index, element) in elements.into_iter().enumerate() {
            let mut raw_id = element.id();
            if raw_id.is_empty() {
                raw_id = format!("section-{}", index);
                warn!(".section at {} has no id, using '{}'", index, raw_id);
            }
            let class_list = element.class_list();
            let mut section = Section::new(raw_id, index);
            section.is_active = class_list.contains("active");
            section.is_project = class_list.contains("project-section");
            section.bg_color = element.get_attribute("data-bgcolor");
            sections.push((section.id.clone(), element));
            layout_sections.push(section);
        }

        let mut players = Vec::new();
        let mut layout_players = Vec::new();
        for root in select_all::<Element>(document, ".minimal-player") {
            let owner = root
                .closest(".section")
                .ok()
                .flatten()
                .map(|s| SectionId::new(s.id()));
            let Some(owner) = owner else {
                warn!(".minimal-player outside any .section, skipped");
                continue;
            };
            let Some(elements) = PlayerElements::scan(root) else {
                warn!(".minimal-player in '{}' has no <video>, skipped", owner);
                continue;
            };
            let player = PlayerId::new(players.len() as u32);
            layout_players.push((player, owner));
            players.push((player, elements));
        }

        let mut menu_links = Vec::new();
        for link in select_all::<HtmlElement>(document, ".menu-items a") {
            let target = link
                .get_attribute("href")
                .and_then(|href| href.strip_prefix('#').map(str::to_string))
                .filter(|id| !id.is_empty());
            match target {
                Some(id) => menu_links.push((SectionId::new(id), link)),
                None => debug!("menu link without '#id' href ignored"),
            }
        }

        let title = document
            .get_element_by_id("romy")
            .and_then(|e| e.dyn_into::<HtmlElement>().ok());
        let layers = [
            background_layer(document, &body, BackgroundLayer::Primary)?,
            background_layer(document, &body, BackgroundLayer::Secondary)?,
        ];

        let mut chrome = select_all::<HtmlElement>(document, ".ligne-container");
        chrome.extend(select_all::<HtmlElement>(document, ".logoRomy"));

        let menu_panel = document.get_element_by_id("menuPanel");
        if menu_panel.is_none() {
            warn!("#menuPanel not found, menu disabled");
        }

        let descriptions = select_all::<HtmlElement>(document, ".project-description");
        let description_texts = descriptions
            .iter()
            .map(|d| d.text_content().unwrap_or_default())
            .collect();

        let grid = by_id::<HtmlElement>(document, "contact-grid");
        let grid_section = grid
            .as_ref()
            .and_then(|g| g.closest(".section").ok().flatten())
            .map(|s| SectionId::new(s.id()));
        if grid.is_some() && grid_section.is_none() {
            warn!("#contact-grid outside any .section, grid disabled");
        }

        let contact_button = by_id::<HtmlElement>(document, "btncontact");
        let contact_form = by_id::<HtmlElement>(document, "contactForm");
        if contact_button.is_some() && contact_form.is_none() {
            warn!("#contactForm not found, mail fallback has no form to show");
        }

        let layout = PageLayout {
            sections: layout_sections,
            players: layout_players,
            menu_links: menu_links.iter().map(|(id, _)| id.clone()).collect(),
            has_home_title: title.is_some(),
            viewport: Viewport::default(),
            contact_grid: grid_section,
            descriptions: description_texts,
            has_contact_button: contact_button.is_some(),
        };
        let page = Page {
            document: document.clone(),
            body,
            sections,
            players,
            menu_toggle: document.get_element_by_id("menuToggle"),
            menu_close: document.get_element_by_id("menuClose"),
            menu_panel,
            menu_links,
            indicators: select_all(document, ".ligne"),
            chrome,
            title,
            layers,
            descriptions,
            grid: grid.map(|container| GridElements {
                container,
                items: RefCell::new(Vec::new()),
            }),
            contact_button,
            contact_form,
        };
        Ok((page, layout))
    }

    fn section(&self, id: &SectionId) -> Option<&HtmlElement> {
        self.sections.iter().find(|(s, _)| s == id).map(|(_, e)| e)
    }

    fn player(&self, id: PlayerId) -> Option<&PlayerElements> {
        self.players.iter().find(|(p, _)| *p == id).map(|(_, e)| e)
    }

    fn layer(&self, layer: BackgroundLayer) -> &HtmlElement {
        match layer {
            BackgroundLayer::Primary => &self.layers[0],
            BackgroundLayer::Secondary => &self.layers[1],
        }
    }

    /// Player whose root is the document's fullscreen element.
    pub fn fullscreen_player(&self) -> Option<PlayerId> {
        let element = self.document.fullscreen_element()?;
        self.players
            .iter()
            .find(|(_, p)| p.root == element || Element::from(p.video.clone()) == element)
            .map(|(id, _)| *id)
    }

    pub fn apply(&self, command: DomCommand, feedback: &Feedback) {
        match command {
            DomCommand::AddMarker { section, marker } => {
                if let Some(el) = self.section(&section) {
                    let _ = el.class_list().add_1(marker.class_name());
                }
            }
            DomCommand::RemoveMarker { section, marker } => {
                if let Some(el) = self.section(&section) {
                    let _ = el.class_list().remove_1(marker.class_name());
                }
            }
            DomCommand::ForceReflow { section } => {
                if let Some(el) = self.section(&section) {
                    let _ = el.offset_height();
                }
            }
            DomCommand::SetTransitionInProgress(on) => {
                let _ = self.body.class_list().toggle_with_force("transition-in-progress", on);
            }
            DomCommand::SetBodyBackground(color) => {
                set_style(&self.body, "background-color", &color);
            }
            DomCommand::SetNavIndicator { index } => {
                for (i, line) in self.indicators.iter().enumerate() {
                    let _ = line.class_list().toggle_with_force("active", i == index);
                }
            }
            DomCommand::SetNavChromeVisible(visible) => {
                for el in &self.chrome {
                    set_style(el, "opacity", if visible { CHROME_OPACITY } else { "0" });
                    set_style(el, "pointer-events", if visible { "auto" } else { "none" });
                }
            }
            DomCommand::SetMenuLinkActive { section, active } => {
                for (_, link) in self.menu_links.iter().filter(|(id, _)| *id == section) {
                    let _ = link.class_list().toggle_with_force("active", active);
                }
            }
            DomCommand::SetMenuOpen(open) => {
                if let Some(panel) = &self.menu_panel {
                    let _ = panel.class_list().toggle_with_force("active", open);
                }
            }
            DomCommand::HideMenuItems => {
                for (_, link) in &self.menu_links {
                    set_style(link, "transition", "none");
                    set_style(link, "opacity", "0");
                    set_style(link, "transform", "translateX(-20px)");
                }
            }
            DomCommand::RevealMenuItem { index } => {
                if let Some((_, link)) = self.menu_links.get(index) {
                    set_style(link, "transition", "opacity 0.3s ease, transform 0.3s ease");
                    set_style(link, "opacity", "1");
                    set_style(link, "transform", "translateX(0)");
                }
            }
            DomCommand::Video { player, command } => match self.player(player) {
                Some(elements) => apply_video(player, elements, command, &self.document, feedback),
                None => debug!("command for unknown {}", player),
            },
            DomCommand::Home(command) => self.apply_home(command),
            DomCommand::DispatchTransitionComplete(detail) => {
                if let Err(err) = self.dispatch_complete(&detail) {
                    warn!("{}", err);
                }
            }
            DomCommand::MarkLoaded => {
                let _ = self.body.class_list().add_1("loaded");
            }
            DomCommand::Grid(command) => self.apply_grid(command),
            DomCommand::SplitDescription { index, lines } => {
                if let Some(description) = self.descriptions.get(index) {
                    if let Err(err) = self.split_description(description, &lines) {
                        warn!("{}", err);
                    }
                }
            }
            DomCommand::MarkAnimationsReady => {
                let _ = self.body.class_list().add_1("animations-ready");
            }
            DomCommand::RestartAnimations { section } => {
                let Some(el) = self.section(&section) else {
                    return;
                };
                let parts = el
                    .query_selector_all(ANIMATED_PARTS)
                    .map(|list| nodes::<HtmlElement>(&list))
                    .unwrap_or_default();
                for part in parts {
                    set_style(&part, "display", "none");
                    let _ = part.offset_width();
                    let _ = part.style().remove_property("display");
                }
            }
            DomCommand::OpenMailto(url) => {
                if let Err(err) = self.open_mailto(&url) {
                    warn!("{}", err);
                }
            }
            DomCommand::ShowContactForm { notice } => {
                match &self.contact_form {
                    Some(form) => set_style(form, "display", "block"),
                    None => debug!("no contact form to show"),
                }
                if let (Some(text), Some(window)) = (notice, self.document.default_view()) {
                    let _ = window.alert_with_message(&text);
                }
            }
        }
    }

    fn apply_grid(&self, command: GridCommand) {
        let Some(grid) = &self.grid else {
            return;
        };
        match command {
            GridCommand::Build(tiles) => match build_grid(&self.document, &grid.container, tiles) {
                Ok(items) => *grid.items.borrow_mut() = items,
                Err(err) => warn!("grid build failed: {}", err),
            },
            GridCommand::Place {
                item,
                x,
                y,
                image_x,
                image_y,
                image_scale,
            } => {
                if let Some(el) = grid.items.borrow().get(item) {
                    set_style(&el.root, "transform", &format!("translate({}px, {}px)", x, y));
                    let image = format!(
                        "translate({}px, {}px) scale({})",
                        image_x, image_y, image_scale
                    );
                    set_style(&el.image, "transform", &image);
                }
            }
            GridCommand::SetCaptionVisible { item, visible } => {
                if let Some(el) = grid.items.borrow().get(item) {
                    let _ = el.caption.class_list().toggle_with_force("visible", visible);
                }
            }
            GridCommand::SetDragging(on) => {
                if let Some(root) = self.document.document_element() {
                    let _ = root.class_list().toggle_with_force("dragging", on);
                }
            }
            GridCommand::SetScrollLock(on) => {
                let root = self
                    .document
                    .document_element()
                    .and_then(|e| e.dyn_into::<HtmlElement>().ok());
                for el in std::iter::once(&self.body).chain(root.as_ref()) {
                    if on {
                        set_style(el, "overflow", "hidden");
                    } else {
                        let _ = el.style().remove_property("overflow");
                    }
                }
            }
        }
    }

    fn split_description(
        &self,
        element: &HtmlElement,
        lines: &[String],
    ) -> Result<(), SiteError> {
        element.set_inner_html("");
        for line in lines {
            let span = create(&self.document, "span", "project-description-line")?;
            span.set_text_content(Some(&format!("{} ", line)));
            element
                .append_child(&span)
                .map_err(|e| js_error("description", &e))?;
        }
        Ok(())
    }

    /// Follow a `mailto:` link through a hidden anchor so the mail client opens.
    fn open_mailto(&self, url: &str) -> Result<(), SiteError> {
        let link = create(&self.document, "a", "")?;
        link.set_attribute("href", url)
            .map_err(|e| js_error("mailto", &e))?;
        set_style(&link, "display", "none");
        self.body
            .append_child(&link)
            .map_err(|e| js_error("mailto", &e))?;
        link.click();
        let _ = self.body.remove_child(&link);
        Ok(())
    }

    fn apply_home(&self, command: HomeCommand) {
        match command {
            HomeCommand::SetTitleFont(font) => {
                if let Some(title) = &self.title {
                    set_style(title, "font-family", &font);
                }
            }
            HomeCommand::ReflowTitle => {
                if let Some(title) = &self.title {
                    let _ = title.offset_width();
                }
            }
            HomeCommand::SetLayerImage { layer, image } => {
                set_style(self.layer(layer), "background-image", &format!("url({})", image));
            }
            HomeCommand::SetLayerOpacity { layer, opacity } => {
                set_style(self.layer(layer), "opacity", &opacity.to_string());
            }
            HomeCommand::SetVisible(visible) => {
                let value = if visible { "visible" } else { "hidden" };
                if let Some(title) = &self.title {
                    set_style(title, "visibility", value);
                }
                for layer in &self.layers {
                    set_style(layer, "visibility", value);
                }
            }
        }
    }

    fn dispatch_complete(&self, detail: &TransitionComplete) -> Result<(), SiteError> {
        let json = serde_json::to_string(detail)?;
        let detail = js_sys::JSON::parse(&json).map_err(|e| js_error("detail", &e))?;
        let init = CustomEventInit::new();
        init.set_detail(&detail);
        let event = CustomEvent::new_with_event_init_dict(TRANSITION_COMPLETE_EVENT, &init)
            .map_err(|e| js_error("event", &e))?;
        self.document
            .dispatch_event(&event)
            .map_err(|e| js_error("dispatch", &e))?;
        Ok(())
    }
}

fn apply_video(
    player: PlayerId,
    elements: &PlayerElements,
    command: VideoCommand,
    document: &Document,
    feedback: &Feedback,
) {
    let video = &elements.video;
    match command {
        VideoCommand::Play => match video.play() {
            Ok(promise) => {
                let feedback = feedback.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    if let Err(err) = JsFuture::from(promise).await {
                        feedback(InputEvent::PlaybackRejected { player, reason: describe(&err) });
                    }
                });
            }
            Err(err) => feedback(InputEvent::PlaybackRejected { player, reason: describe(&err) }),
        },
        VideoCommand::Pause => {
            let _ = video.pause();
        }
        VideoCommand::Seek { position } => video.set_current_time(position),
        VideoCommand::SetMuted(muted) => video.set_muted(muted),
        VideoCommand::SetVolume(volume) => {
            video.set_volume(volume);
            if let Some(slider) = &elements.volume_slider {
                slider.set_value(&volume.to_string());
            }
        }
        VideoCommand::SetProgress(percent) => {
            if let Some(progress) = &elements.progress {
                set_style(progress, "width", &format!("{}%", percent));
            }
        }
        VideoCommand::SetPlayIcon { paused } => {
            show(elements.play_icon.as_ref(), paused);
            show(elements.pause_icon.as_ref(), !paused);
        }
        VideoCommand::SetMuteIcon { muted } => {
            show(elements.volume_off.as_ref(), muted);
            show(elements.volume_on.as_ref(), !muted);
        }
        VideoCommand::SetFullscreenIcon { fullscreen } => {
            show(elements.fullscreen_exit.as_ref(), fullscreen);
            show(elements.fullscreen_enter.as_ref(), !fullscreen);
        }
        VideoCommand::RequestFullscreen => {
            if let Err(err) = elements.root.request_fullscreen() {
                warn!("{}: fullscreen refused: {}", player, describe(&err));
            }
        }
        VideoCommand::ExitFullscreen => {
            let _ = document.exit_fullscreen();
        }
    }
}

fn show(element: Option<&HtmlElement>, visible: bool) {
    if let Some(el) = element {
        set_style(el, "display", if visible { "block" } else { "none" });
    }
}

fn set_style(element: &HtmlElement, property: &str, value: &str) {
    let _ = element.style().set_property(property, value);
}

/// `#bg1` / `#bg2`, created as fixed full-viewport layers when the page lacks them.
fn background_layer(
    document: &Document,
    body: &HtmlElement,
    layer: BackgroundLayer,
) -> Result<HtmlElement, SiteError> {
    let id = layer.element_id();
    if let Some(el) = by_id::<HtmlElement>(document, id) {
        return Ok(el);
    }
    debug!("creating background layer #{}", id);
    let el = create(document, "div", "bg-layer")?;
    el.set_id(id);
    for (property, value) in [
        ("position", "fixed"),
        ("top", "0"),
        ("left", "0"),
        ("width", "100vw"),
        ("height", "100vh"),
        ("background-size", "cover"),
        ("background-position", "center"),
        ("background-repeat", "no-repeat"),
        ("transition", "opacity 0.8s ease"),
        ("z-index", "-1"),
        ("opacity", "0"),
    ] {
        set_style(&el, property, value);
    }
    body.append_child(&el).map_err(|e| js_error(id, &e))?;
    Ok(el)
}

/// Replace the grid container's children with one `.grid-item` per tile.
fn build_grid(
    document: &Document,
    container: &HtmlElement,
    tiles: Vec<GridTileView>,
) -> Result<Vec<GridItemElements>, SiteError> {
    container.set_inner_html("");
    let mut items = Vec::with_capacity(tiles.len());
    for tile in tiles {
        let width = format!("{}px", tile.width);
        let root = create(document, "div", "grid-item")?;
        set_style(&root, "width", &width);
        let wrapper = create(document, "div", "item-wrapper")?;
        let frame = create(document, "div", "item-image")?;
        set_style(&frame, "width", &width);
        set_style(&frame, "height", &format!("{}px", tile.height));
        let image = create(document, "img", "")?;
        image
            .set_attribute("src", &tile.image)
            .map_err(|e| js_error("grid image", &e))?;
        let caption = create(document, "small", "")?;
        for (index, line) in tile.caption.iter().enumerate() {
            if index > 0 {
                let br = document
                    .create_element("br")
                    .map_err(|e| js_error("grid caption", &e))?;
                caption
                    .append_with_node_1(&br)
                    .map_err(|e| js_error("grid caption", &e))?;
            }
            caption
                .append_with_str_1(line)
                .map_err(|e| js_error("grid caption", &e))?;
        }

        for (parent, child) in [
            (&frame, &image),
            (&wrapper, &frame),
            (&wrapper, &caption),
            (&root, &wrapper),
            (container, &root),
        ] {
            parent
                .append_child(child)
                .map_err(|e| js_error("grid", &e))?;
        }
        items.push(GridItemElements {
            root,
            image,
            caption,
        });
    }
    Ok(items)
}

fn create(document: &Document, tag: &str, class: &str) -> Result<HtmlElement, SiteError> {
    let el = document
        .create_element(tag)
        .map_err(|e| js_error(tag, &e))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| SiteError::MissingElement(tag.to_string()))?;
    if !class.is_empty() {
        el.set_class_name(class);
    }
    Ok(el)
}

fn by_id<T: JsCast>(document: &Document, id: &str) -> Option<T> {
    document
        .get_element_by_id(id)
        .and_then(|e| e.dyn_into::<T>().ok())
}

pub fn select<T: JsCast>(root: &Element, selector: &str) -> Option<T> {
    root.query_selector(selector)
        .ok()
        .flatten()
        .and_then(|e| e.dyn_into::<T>().ok())
}

pub fn select_all<T: JsCast>(document: &Document, selector: &str) -> Vec<T> {
    document
        .query_selector_all(selector)
        .map(|list| nodes(&list))
        .unwrap_or_default()
}

fn nodes<T: JsCast>(list: &NodeList) -> Vec<T> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<T>().ok())
        .collect()
}

/// Error name (`NotAllowedError`, ...) or message of a JS exception.
pub fn describe(err: &JsValue) -> String {
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        return format!("{}: {}", String::from(error.name()), String::from(error.message()));
    }
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

fn js_error(context: &str, err: &JsValue) -> SiteError {
    SiteError::Js(format!("{}: {}", context, describe(err)))
}
