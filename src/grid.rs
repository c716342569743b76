// Parallax tile grid of the contact section.
//
// The configured areas form one design tile as wide as the viewport. It is laid
// out 2x2 and every item wraps around that doubled period, so the grid has no
// edge in any direction. The scroll position eases toward a target that wheel
// and drag input move. Items drift with the per-frame scroll delta (weighted by
// a random ease per item) and with the pointer position.
//
// Frames are timer ticks. They only run while the grid's section is shown and
// something is still moving; a settled grid schedules nothing.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::GridSettings;
use crate::timers::{TimerId, TimerQueue};
use crate::types::*;

/// Scroll distance under which the grid counts as settled.
const SETTLE_PX: f64 = 0.05;
/// Same for the normalized pointer position.
const SETTLE_POINTER: f64 = 0.0005;
/// The initial scroll is offset by this share of the viewport.
const START_OFFSET: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Point {
    x: f64,
    y: f64,
}

impl Point {
    fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    fn ease_toward(&mut self, target: Point, ease: f64) {
        self.x += (target.x - self.x) * ease;
        self.y += (target.y - self.y) * ease;
    }

    fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// One placed copy of a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct GridItem {
    /// Position inside the doubled tile, in pixels.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Weight of the scroll drift, in `0.5..1.0`.
    pub ease: f64,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    start: Point,
    origin: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridTimer {
    Frame,
}

pub struct ContactGrid {
    settings: GridSettings,
    section: Option<SectionId>,
    viewport: Viewport,
    /// Wrap period, twice the design tile.
    period: Viewport,
    items: Vec<GridItem>,
    scroll: Point,
    target: Point,
    last: Point,
    pointer: Point,
    pointer_target: Point,
    drag: Option<Drag>,
    active: bool,
    frame: Option<TimerId>,
    timers: TimerQueue<GridTimer>,
    rng: StdRng,
}

impl ContactGrid {
    /// `section` hosts the grid container; `None` disables the grid.
    pub fn new(section: Option<SectionId>, viewport: Viewport, settings: GridSettings) -> Self {
        let rng = StdRng::seed_from_u64(settings.seed);
        ContactGrid {
            settings,
            section,
            viewport,
            period: Viewport::default(),
            items: Vec::new(),
            scroll: Point::default(),
            target: Point::default(),
            last: Point::default(),
            pointer: Point::new(0.5, 0.5),
            pointer_target: Point::new(0.5, 0.5),
            drag: None,
            active: false,
            frame: None,
            timers: TimerQueue::new(),
            rng,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.section.is_some()
    }

    pub fn section(&self) -> Option<&SectionId> {
        self.section.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn items(&self) -> &[GridItem] {
        &self.items
    }

    /// Current eased scroll offset.
    pub fn scroll(&self) -> (f64, f64) {
        (self.scroll.x, self.scroll.y)
    }

    /// Offset the scroll is easing toward.
    pub fn target(&self) -> (f64, f64) {
        (self.target.x, self.target.y)
    }

    /// Lay the tiles out for the current viewport and place them. Scroll starts
    /// over, slightly off-centre.
    pub fn build(&mut self, out: &mut Vec<DomCommand>) {
        if !self.is_enabled() {
            return;
        }
        let Viewport { width, height } = self.viewport;
        let scale = width / self.settings.design_width;
        let tile = Viewport::new(width, self.settings.design_height * scale);

        let mut items = Vec::new();
        let mut views = Vec::new();
        let sources = &self.settings.sources;
        for (index, area) in self.settings.areas.iter().enumerate() {
            let Some(source) = sources.get(index % sources.len().max(1)) else {
                break;
            };
            let (w, h) = (area.w * scale, area.h * scale);
            for offset_x in [0.0, tile.width] {
                for offset_y in [0.0, tile.height] {
                    items.push(GridItem {
                        x: area.x * scale + offset_x,
                        y: area.y * scale + offset_y,
                        width: w,
                        height: h,
                        ease: self.rng.random_range(0.5..1.0),
                        visible: false,
                    });
                    views.push(GridTileView {
                        image: format!("{}{}", self.settings.image_dir, source.image),
                        caption: source.caption.clone(),
                        width: w,
                        height: h,
                    });
                }
            }
        }

        self.items = items;
        self.period = Viewport::new(tile.width * 2.0, tile.height * 2.0);
        let start = Point::new(-width * START_OFFSET, -height * START_OFFSET);
        self.scroll = start;
        self.target = start;
        self.last = start;

        debug!("grid built: {} items over {}x{}", self.items.len(), width, height);
        out.push(DomCommand::Grid(GridCommand::Build(views)));
        self.place(out);
    }

    /// Viewport changed: rebuild, and keep animating if shown.
    pub fn resize(&mut self, viewport: Viewport, now: Timestamp, out: &mut Vec<DomCommand>) {
        self.viewport = viewport;
        self.build(out);
        if self.active {
            self.request_frame(now);
        }
    }

    /// The grid's section became current.
    pub fn activate(&mut self, now: Timestamp, out: &mut Vec<DomCommand>) {
        if !self.is_enabled() || self.active {
            return;
        }
        self.active = true;
        out.push(DomCommand::Grid(GridCommand::SetScrollLock(true)));
        self.request_frame(now);
    }

    /// The grid's section is being left. Stops frames and ends any drag.
    pub fn deactivate(&mut self, out: &mut Vec<DomCommand>) {
        if !self.active {
            return;
        }
        self.active = false;
        self.clear_timers();
        if self.drag.take().is_some() {
            out.push(DomCommand::Grid(GridCommand::SetDragging(false)));
        }
        out.push(DomCommand::Grid(GridCommand::SetScrollLock(false)));
    }

    pub fn wheel(&mut self, delta_x: f64, delta_y: f64, now: Timestamp) {
        if !self.active {
            return;
        }
        self.target.x -= delta_x * self.settings.wheel_factor;
        self.target.y -= delta_y * self.settings.wheel_factor;
        self.request_frame(now);
    }

    pub fn pointer_down(&mut self, x: f64, y: f64, out: &mut Vec<DomCommand>) {
        if !self.active {
            return;
        }
        if self.drag.is_none() {
            out.push(DomCommand::Grid(GridCommand::SetDragging(true)));
        }
        self.drag = Some(Drag {
            start: Point::new(x, y),
            origin: self.target,
        });
    }

    /// Pointer position feeds the parallax; during a drag it also moves the
    /// scroll target by the distance travelled.
    pub fn pointer_move(&mut self, x: f64, y: f64, now: Timestamp) {
        if !self.active {
            return;
        }
        if self.viewport.width > 0.0 && self.viewport.height > 0.0 {
            self.pointer_target = Point::new(x / self.viewport.width, y / self.viewport.height);
        }
        if let Some(drag) = self.drag {
            self.target = Point::new(
                drag.origin.x + (x - drag.start.x),
                drag.origin.y + (y - drag.start.y),
            );
        }
        self.request_frame(now);
    }

    pub fn pointer_up(&mut self, out: &mut Vec<DomCommand>) {
        if self.drag.take().is_some() {
            out.push(DomCommand::Grid(GridCommand::SetDragging(false)));
        }
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_due()
    }

    /// Run one frame, and schedule the next unless everything has settled.
    pub fn fire_next(&mut self, now: Timestamp, out: &mut Vec<DomCommand>) {
        let Some((_, _, GridTimer::Frame)) = self.timers.pop_due(now) else {
            return;
        };
        self.frame = None;
        self.scroll.ease_toward(self.target, self.settings.ease);
        self.pointer
            .ease_toward(self.pointer_target, self.settings.pointer_ease);
        self.place(out);
        if self.active && !self.is_settled() {
            self.request_frame(now);
        }
    }

    pub fn clear_timers(&mut self) {
        self.timers.clear();
        self.frame = None;
    }

    fn request_frame(&mut self, now: Timestamp) {
        if self.frame.is_some() || self.items.is_empty() {
            return;
        }
        let due = now.after(self.settings.frame_ms);
        self.frame = Some(self.timers.schedule(due, GridTimer::Frame));
    }

    fn is_settled(&self) -> bool {
        self.scroll.distance(self.target) < SETTLE_PX
            && self.pointer.distance(self.pointer_target) < SETTLE_POINTER
    }

    fn place(&mut self, out: &mut Vec<DomCommand>) {
        let drift = Point::new(self.scroll.x - self.last.x, self.scroll.y - self.last.y);
        let settings = &self.settings;
        let (scroll, pointer, viewport, period) =
            (self.scroll, self.pointer, self.viewport, self.period);

        for (index, item) in self.items.iter_mut().enumerate() {
            let shift_x = settings.drift_factor * drift.x * item.ease
                + (pointer.x - 0.5) * item.width * settings.pointer_parallax;
            let shift_y = settings.drift_factor * drift.y * item.ease
                + (pointer.y - 0.5) * item.height * settings.pointer_parallax;
            let x = wrap(item.x + scroll.x + shift_x, item.width, period.width);
            let y = wrap(item.y + scroll.y + shift_y, item.height, period.height);

            out.push(DomCommand::Grid(GridCommand::Place {
                item: index,
                x,
                y,
                image_x: -shift_x * settings.image_parallax,
                image_y: -shift_y * settings.image_parallax,
                image_scale: settings.image_scale,
            }));

            let visible = x < viewport.width
                && x + item.width > 0.0
                && y < viewport.height
                && y + item.height > 0.0;
            if visible != item.visible {
                item.visible = visible;
                out.push(DomCommand::Grid(GridCommand::SetCaptionVisible {
                    item: index,
                    visible,
                }));
            }
        }
        self.last = self.scroll;
    }
}

/// Bring `position` into `[-size, period - size)`, so an item leaving one edge
/// comes back in at the other.
fn wrap(position: f64, size: f64, period: f64) -> f64 {
    if period <= 0.0 || !position.is_finite() {
        return position;
    }
    (position + size).rem_euclid(period) - size
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn grid() -> ContactGrid {
        let mut grid = ContactGrid::new(
            Some("contact".into()),
            Viewport::new(1522.0, 900.0),
            GridSettings::default(),
        );
        grid.build(&mut Vec::new());
        grid
    }

    /// Run frames until the grid stops scheduling them. Returns the frame count.
    fn settle(grid: &mut ContactGrid, out: &mut Vec<DomCommand>) -> usize {
        let mut frames = 0;
        while let Some(due) = grid.next_deadline() {
            grid.fire_next(due, out);
            frames += 1;
            assert!(frames < 1_000, "grid never settled");
        }
        frames
    }

    fn placements(out: &[DomCommand]) -> Vec<(usize, f64, f64)> {
        out.iter()
            .filter_map(|c| match c {
                DomCommand::Grid(GridCommand::Place { item, x, y, .. }) => Some((*item, *x, *y)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn build_repeats_every_area_two_by_two() {
        let mut grid = ContactGrid::new(
            Some("contact".into()),
            Viewport::new(761.0, 600.0),
            GridSettings::default(),
        );
        let mut out = Vec::new();
        grid.build(&mut out);

        assert_eq!(grid.items().len(), 24);
        let DomCommand::Grid(GridCommand::Build(views)) = &out[0] else {
            panic!("build command first, got {:?}", out[0]);
        };
        assert_eq!(views.len(), 24);
        assert_eq!(views[0].image, "assets/images/cinema/cadreur.jpeg");
        assert_eq!(views[0].width, 200.0);
        assert_eq!(placements(&out).len(), 24);

        // Same area, shifted by one design tile across and down.
        let (a, d) = (&grid.items()[0], &grid.items()[3]);
        assert_eq!(d.x - a.x, 761.0);
        assert!((d.y - a.y - 619.0).abs() < 1e-9);
        assert!(grid.items().iter().all(|i| (0.5..1.0).contains(&i.ease)));
        let (x, y) = grid.scroll();
        assert!((x + 76.1).abs() < 1e-9 && (y + 60.0).abs() < 1e-9);
    }

    #[test]
    fn disabled_grid_builds_nothing() {
        let mut grid = ContactGrid::new(None, Viewport::new(800.0, 600.0), GridSettings::default());
        let mut out = Vec::new();
        grid.build(&mut out);
        grid.activate(ts(0), &mut out);
        assert!(out.is_empty());
        assert!(!grid.is_active());
    }

    #[test]
    fn input_is_ignored_until_active() {
        let mut g = grid();
        let mut out = Vec::new();
        g.wheel(0.0, 100.0, ts(0));
        g.pointer_down(10.0, 10.0, &mut out);
        assert_eq!(g.target(), g.scroll());
        assert!(out.is_empty());
        assert_eq!(g.next_deadline(), None);
    }

    #[test]
    fn wheel_moves_the_target_and_scroll_eases_after_it() {
        let mut g = grid();
        let mut out = Vec::new();
        g.activate(ts(0), &mut out);
        assert_eq!(out, vec![DomCommand::Grid(GridCommand::SetScrollLock(true))]);
        let (start_x, start_y) = g.scroll();

        g.wheel(50.0, 100.0, ts(0));
        assert_eq!(g.target(), (start_x - 20.0, start_y - 40.0));

        let due = g.next_deadline().unwrap();
        assert_eq!(due, ts(16));
        g.fire_next(due, &mut out);
        let (x, y) = g.scroll();
        assert!((x - (start_x - 2.0)).abs() < 1e-9);
        assert!((y - (start_y - 4.0)).abs() < 1e-9);

        settle(&mut g, &mut out);
        let (x, y) = g.scroll();
        assert!((x - (start_x - 20.0)).abs() < SETTLE_PX);
        assert!((y - (start_y - 40.0)).abs() < SETTLE_PX);
        assert_eq!(g.next_deadline(), None);
    }

    #[test]
    fn drag_follows_the_pointer_from_where_it_started() {
        let mut g = grid();
        let mut out = Vec::new();
        g.activate(ts(0), &mut out);
        let (tx, ty) = g.target();

        out.clear();
        g.pointer_down(100.0, 100.0, &mut out);
        assert!(g.is_dragging());
        assert_eq!(out, vec![DomCommand::Grid(GridCommand::SetDragging(true))]);
        g.pointer_move(160.0, 70.0, ts(5));
        assert_eq!(g.target(), (tx + 60.0, ty - 30.0));

        out.clear();
        g.pointer_up(&mut out);
        assert_eq!(out, vec![DomCommand::Grid(GridCommand::SetDragging(false))]);
        g.pointer_move(500.0, 500.0, ts(6));
        assert_eq!(g.target(), (tx + 60.0, ty - 30.0));
    }

    #[test]
    fn leaving_the_section_stops_frames_and_ends_the_drag() {
        let mut g = grid();
        let mut out = Vec::new();
        g.activate(ts(0), &mut out);
        g.pointer_down(0.0, 0.0, &mut out);

        out.clear();
        g.deactivate(&mut out);
        assert_eq!(
            out,
            vec![
                DomCommand::Grid(GridCommand::SetDragging(false)),
                DomCommand::Grid(GridCommand::SetScrollLock(false)),
            ]
        );
        assert_eq!(g.next_deadline(), None);
        assert!(!g.is_active());
    }

    #[test]
    fn items_wrap_instead_of_scrolling_away() {
        let mut g = grid();
        let mut out = Vec::new();
        g.activate(ts(0), &mut out);
        for _ in 0..40 {
            g.wheel(-900.0, 700.0, ts(0));
        }
        out.clear();
        assert!(settle(&mut g, &mut out) > 50);

        let period = (1522.0 * 2.0, 1238.0 * 2.0);
        for (index, x, y) in placements(&out) {
            let item = &g.items()[index];
            assert!(x >= -item.width && x < period.0 - item.width);
            assert!(y >= -item.height && y < period.1 - item.height);
        }
        assert!(g.items().iter().any(|i| i.visible));
    }

    #[test]
    fn captions_toggle_only_on_change() {
        let mut g = grid();
        let mut out = Vec::new();
        g.activate(ts(0), &mut out);
        settle(&mut g, &mut out);
        out.clear();
        // Pointer at the centre: the frame runs but nothing moves.
        g.pointer_move(761.0, 450.0, ts(100));
        assert_eq!(settle(&mut g, &mut out), 1);
        assert_eq!(placements(&out).len(), g.items().len());
        assert!(!out
            .iter()
            .any(|c| matches!(c, DomCommand::Grid(GridCommand::SetCaptionVisible { .. }))));
    }

    #[test]
    fn same_seed_gives_same_weights() {
        assert_eq!(grid().items(), grid().items());
    }

    proptest! {
        #[test]
        fn wrap_lands_inside_the_period(
            position in -1e6f64..1e6,
            size in 1.0f64..500.0,
            period in 1_000.0f64..5_000.0,
        ) {
            let wrapped = wrap(position, size, period);
            prop_assert!(wrapped >= -size - 1e-6);
            prop_assert!(wrapped < period - size + 1e-6);
            let turns = (position - wrapped) / period;
            prop_assert!((turns - turns.round()).abs() < 1e-6);
        }
    }
}
