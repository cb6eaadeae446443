use std::any::type_name;

use crossterm::event::Event;
use ratatui::{Frame, layout::Rect};
use theme::Theme;

pub mod dashboard;
pub mod error;
pub mod theme;

pub use dashboard::DashboardWidget;

use crate::{
    env::{AppEvent, WidgetCtx, WidgetId},
    help,
};

/// Identity shared by every widget: its own id and the widget that opened it.
pub struct WidgetInner {
    id: WidgetId,
    parent: Option<WidgetId>,
    name: &'static str,
}

impl WidgetInner {
    pub fn new<T>(parent: WidgetId) -> Self {
        Self::with_parent::<T>(Some(parent))
    }

    pub fn root<T>() -> Self {
        Self::with_parent::<T>(None)
    }

    fn with_parent<T>(parent: Option<WidgetId>) -> Self {
        let name = type_name::<T>().rsplit("::").next().unwrap_or("widget");
        Self {
            id: WidgetId::next(),
            parent,
            name,
        }
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn parent(&self) -> Option<WidgetId> {
        self.parent
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

pub trait Widget: Send {
    fn inner(&self) -> &WidgetInner;

    fn id(&self) -> WidgetId {
        self.inner().id()
    }

    /// Start any background work (state lives behind interior mutability)
    fn start(&self, _ctx: WidgetCtx) {}

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme);

    /// Handle input events. Returns true if the event was handled.
    fn handle_event(&self, _ctx: WidgetCtx, _event: &Event) -> bool {
        false
    }

    /// Events this widget emitted to itself, usually from a spawned task.
    fn on_self_event(&self, _ctx: WidgetCtx, _event: &AppEvent) {}

    /// Key hints to display at the bottom while this widget is active
    fn help(&self) -> Option<&[help::Entry<'_>]> {
        None
    }

    fn is_loading(&self) -> bool {
        false
    }

    /// Text inputs take over every key, so app-level bindings stay quiet.
    fn captures_input(&self) -> bool {
        false
    }
}

pub trait Popup: Widget {
    fn rect(&self, area: Rect) -> Rect;
}
