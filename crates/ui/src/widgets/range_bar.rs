use iced::widget::canvas::{self, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Length, Point, Rectangle, Size, Theme, mouse};

const HANDLE_WIDTH: f32 = 8.0;
const RAIL_HEIGHT: f32 = 6.0;

/// Converts an x coordinate in widget space to seconds on `[0, duration]`.
///
/// Positions outside the widget are clamped to the nearest edge.
///
/// # Example
///
/// ```ignore
/// assert_eq!(seconds_from_x(0.0, 200.0, 60.0), 0.0);
/// assert_eq!(seconds_from_x(100.0, 200.0, 60.0), 30.0);
/// assert_eq!(seconds_from_x(250.0, 200.0, 60.0), 60.0);
/// ```
pub fn seconds_from_x(x: f32, width: f32, duration: f64) -> f64 {
    if duration <= 0.0 || width <= 0.0 {
        return 0.0;
    }

    let ratio = f64::from(x.clamp(0.0, width) / width);
    ratio * duration
}

fn x_from_seconds(seconds: f64, duration: f64, width: f32) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }

    let ratio = (seconds / duration).clamp(0.0, 1.0);
    ratio as f32 * width
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handle {
    Start,
    End,
}

/// Picks the handle closest to `x`. Coinciding handles split by side.
fn nearest_handle(x: f32, start_x: f32, end_x: f32) -> Handle {
    let to_start = (x - start_x).abs();
    let to_end = (x - end_x).abs();
    if to_start < to_end || (to_start == to_end && x < end_x) {
        Handle::Start
    } else {
        Handle::End
    }
}

#[derive(Debug, Default)]
struct RangeBarState {
    dragging: Option<Handle>,
    draft: Option<(f64, f64)>,
}

#[derive(Debug)]
struct RangeBarProgram<'a, Message> {
    duration: f64,
    start: f64,
    end: f64,
    position: f64,
    enabled: bool,
    cache: &'a canvas::Cache,
    on_drag: fn(f64, f64) -> Message,
    on_commit: fn(f64, f64) -> Message,
}

impl<Message> RangeBarProgram<'_, Message> {
    fn is_interactive(&self) -> bool {
        self.enabled && self.duration > 0.0
    }

    fn moved(&self, handle: Handle, seconds: f64) -> (f64, f64) {
        match handle {
            Handle::Start => (seconds, self.end),
            Handle::End => (self.start, seconds),
        }
    }
}

impl<Message> canvas::Program<Message> for RangeBarProgram<'_, Message> {
    type State = RangeBarState;

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        if !self.is_interactive() {
            state.dragging = None;
            state.draft = None;
            return (canvas::event::Status::Ignored, None);
        }

        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                let Some(position) = cursor.position_in(bounds) else {
                    return (canvas::event::Status::Ignored, None);
                };
                let handle = nearest_handle(
                    position.x,
                    x_from_seconds(self.start, self.duration, bounds.width),
                    x_from_seconds(self.end, self.duration, bounds.width),
                );
                let draft = self.moved(
                    handle,
                    seconds_from_x(position.x, bounds.width, self.duration),
                );
                state.dragging = Some(handle);
                state.draft = Some(draft);
                (
                    canvas::event::Status::Captured,
                    Some((self.on_drag)(draft.0, draft.1)),
                )
            }
            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                let (Some(handle), Some(position)) = (state.dragging, cursor.position()) else {
                    return (canvas::event::Status::Ignored, None);
                };
                let draft = self.moved(
                    handle,
                    seconds_from_x(position.x - bounds.x, bounds.width, self.duration),
                );
                state.draft = Some(draft);
                (
                    canvas::event::Status::Captured,
                    Some((self.on_drag)(draft.0, draft.1)),
                )
            }
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.dragging.take().is_none() {
                    return (canvas::event::Status::Ignored, None);
                }
                let (start, end) = state.draft.take().unwrap_or((self.start, self.end));
                (
                    canvas::event::Status::Captured,
                    Some((self.on_commit)(start, end)),
                )
            }
            _ => (canvas::event::Status::Ignored, None),
        }
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let rail_y = (bounds.height - RAIL_HEIGHT) / 2.0;

        let rail = self.cache.draw(renderer, bounds.size(), |frame| {
            let background = Path::rectangle(Point::ORIGIN, frame.size());
            frame.fill(&background, Color::from_rgb8(22, 24, 29));

            let rail = Path::rectangle(
                Point::new(0.0, rail_y),
                Size::new(frame.width(), RAIL_HEIGHT),
            );
            frame.fill(&rail, Color::from_rgb8(97, 97, 97));
        });

        let mut overlay = canvas::Frame::new(renderer, bounds.size());
        if self.duration > 0.0 {
            let start_x = x_from_seconds(self.start, self.duration, bounds.width);
            let end_x = x_from_seconds(self.end, self.duration, bounds.width);

            // An inverted range selects nothing; only the handles are drawn.
            if end_x > start_x {
                let track = Path::rectangle(
                    Point::new(start_x, rail_y),
                    Size::new(end_x - start_x, RAIL_HEIGHT),
                );
                overlay.fill(&track, Color::from_rgb8(25, 118, 210));
            }

            let handle_color = if self.enabled {
                Color::from_rgb8(144, 202, 249)
            } else {
                Color::from_rgb8(120, 120, 120)
            };
            for x in [start_x, end_x] {
                let handle = Path::rectangle(
                    Point::new(x - HANDLE_WIDTH / 2.0, 4.0),
                    Size::new(HANDLE_WIDTH, (bounds.height - 8.0).max(1.0)),
                );
                overlay.fill(&handle, handle_color);
            }

            let x = x_from_seconds(self.position, self.duration, bounds.width);
            let line = Path::line(Point::new(x, 0.0), Point::new(x, bounds.height));
            overlay.stroke(
                &line,
                Stroke::default()
                    .with_width(2.0)
                    .with_color(Color::from_rgb8(255, 94, 77)),
            );
        }

        vec![rail, overlay.into_geometry()]
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if state.dragging.is_some() {
            mouse::Interaction::Grabbing
        } else if self.is_interactive() && cursor.is_over(bounds) {
            mouse::Interaction::Grab
        } else {
            mouse::Interaction::None
        }
    }
}

/// Renders the two-handle trim range bar.
///
/// `on_drag` fires while a handle moves; `on_commit` fires once on release
/// with the final pair.
pub fn view<'a, Message>(
    duration: f64,
    (start, end): (f64, f64),
    position: f64,
    enabled: bool,
    cache: &'a canvas::Cache,
    on_drag: fn(f64, f64) -> Message,
    on_commit: fn(f64, f64) -> Message,
) -> Element<'a, Message>
where
    Message: 'a,
{
    container(
        canvas::Canvas::new(RangeBarProgram {
            duration,
            start,
            end,
            position,
            enabled,
            cache,
            on_drag,
            on_commit,
        })
        .width(Length::Fill)
        .height(Length::Fixed(40.0)),
    )
    .width(Length::Fill)
    .into()
}
