use std::{
    borrow::Cow,
    cell::RefCell,
    sync::Arc,
    time::{Duration, Instant},
};

use crossterm::event::{Event, KeyCode};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::Line,
    widgets::{Paragraph, Tabs},
};
use throbber_widgets_tui::ThrobberState;

use segscope::{
    api::{ApiError, CustomerSource},
    model::{ClusterSummary, CustomerRecord},
    view::{ClusterCatalog, Commit, Controller, Mode, Ticket, TopK},
};

use crate::{
    env::{AppEvent, Toast, WidgetCtx},
    help,
    util::pad,
    widgets::{WidgetInner, error::ErrorPopup, theme::Theme},
};

mod cluster_picker;
mod details;
mod records_table;
mod search_box;

use cluster_picker::{ClusterPicker, PickerAction};
use records_table::RecordsTable;
use search_box::{SearchAction, SearchBox};

const THROBBER_STEP: Duration = Duration::from_millis(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Browse,
    Search,
    Segments,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Browse, Tab::Search, Tab::Segments];

    fn title(self) -> &'static str {
        match self {
            Tab::Browse => "All Customers",
            Tab::Search => "Semantic Search",
            Tab::Segments => "Customer Segments",
        }
    }

    fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Browse => Tab::Browse,
            Mode::Search => Tab::Search,
            Mode::ClusterFilter => Tab::Segments,
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|tab| *tab == self).unwrap_or(0)
    }
}

/// The single screen of the app: tab bar, the input for the active tab,
/// the result title and the record table.
pub struct DashboardWidget {
    inner: WidgetInner,
    source: Arc<dyn CustomerSource>,
    state: RefCell<DashboardState>,
}

struct DashboardState {
    controller: Controller,
    clusters: ClusterCatalog,
    tab: Tab,
    search: SearchBox,
    picker: ClusterPicker,
    table: RecordsTable,
    throbber: ThrobberState,
    throbber_step: Instant,
}

struct CustomersLoaded {
    generation: u64,
    result: Result<Vec<CustomerRecord>, ApiError>,
}

struct ClustersLoaded {
    generation: u64,
    result: Result<Vec<ClusterSummary>, ApiError>,
}

impl DashboardWidget {
    const HELP_TABLE: &'static [help::Entry<'static>] = &[
        help::Entry {
            keys: Cow::Borrowed("1/2/3"),
            short: Cow::Borrowed("tabs"),
            long: Cow::Borrowed("All customers / search / segments"),
        },
        help::Entry {
            keys: Cow::Borrowed("/"),
            short: Cow::Borrowed("search"),
            long: Cow::Borrowed("Edit the search query"),
        },
        help::Entry {
            keys: Cow::Borrowed("⏎"),
            short: Cow::Borrowed("details"),
            long: Cow::Borrowed("Expand/collapse row details"),
        },
        help::Entry {
            keys: Cow::Borrowed("c"),
            short: Cow::Borrowed("collapse"),
            long: Cow::Borrowed("Collapse all rows"),
        },
        help::Entry {
            keys: Cow::Borrowed("y"),
            short: Cow::Borrowed("copy id"),
            long: Cow::Borrowed("Copy customer ID"),
        },
        help::Entry {
            keys: Cow::Borrowed("r"),
            short: Cow::Borrowed("refresh"),
            long: Cow::Borrowed("Re-run the current query"),
        },
        help::Entry {
            keys: Cow::Borrowed("j/k"),
            short: Cow::Borrowed("move"),
            long: Cow::Borrowed("Move selection"),
        },
    ];

    const HELP_SEGMENTS: &'static [help::Entry<'static>] = &[
        help::Entry {
            keys: Cow::Borrowed("←/→"),
            short: Cow::Borrowed("segment"),
            long: Cow::Borrowed("Highlight segment"),
        },
        help::Entry {
            keys: Cow::Borrowed("⏎"),
            short: Cow::Borrowed("select"),
            long: Cow::Borrowed("Show customers in segment"),
        },
        help::Entry {
            keys: Cow::Borrowed("tab"),
            short: Cow::Borrowed("table"),
            long: Cow::Borrowed("Focus the result table"),
        },
        help::Entry {
            keys: Cow::Borrowed("1/2"),
            short: Cow::Borrowed("tabs"),
            long: Cow::Borrowed("All customers / search"),
        },
    ];

    const HELP_SEARCH_EDIT: &'static [help::Entry<'static>] = &[
        help::Entry {
            keys: Cow::Borrowed("⏎"),
            short: Cow::Borrowed("search"),
            long: Cow::Borrowed("Run semantic search"),
        },
        help::Entry {
            keys: Cow::Borrowed("tab"),
            short: Cow::Borrowed("results"),
            long: Cow::Borrowed("Cycle number of results"),
        },
        help::Entry {
            keys: Cow::Borrowed("^u"),
            short: Cow::Borrowed("clear"),
            long: Cow::Borrowed("Clear the query"),
        },
        help::Entry {
            keys: Cow::Borrowed("esc"),
            short: Cow::Borrowed("done"),
            long: Cow::Borrowed("Leave the search box"),
        },
    ];

    pub fn new(source: Arc<dyn CustomerSource>, browse_limit: u32) -> Self {
        Self {
            inner: WidgetInner::root::<Self>(),
            source,
            state: RefCell::new(DashboardState {
                controller: Controller::new(browse_limit, segscope::view::DEFAULT_CLUSTER_LIMIT),
                clusters: ClusterCatalog::default(),
                tab: Tab::default(),
                search: SearchBox::default(),
                picker: ClusterPicker::default(),
                table: RecordsTable::default(),
                throbber: ThrobberState::default(),
                throbber_step: Instant::now(),
            }),
        }
    }

    fn dispatch(&self, ticket: Ticket, ctx: WidgetCtx) {
        let source = self.source.clone();
        ctx.invalidate();
        tokio::spawn(async move {
            tracing::trace!(generation = ticket.generation, query = ?ticket.query, "fetch_start");
            let result = ticket.run(source.as_ref()).await;
            ctx.emit_self(CustomersLoaded {
                generation: ticket.generation,
                result,
            });
        });
    }

    fn browse(&self, ctx: WidgetCtx) {
        let ticket = {
            let mut state = self.state.borrow_mut();
            state.tab = Tab::Browse;
            state.search.set_active(false);
            state.picker.set_focused(false);
            state.controller.begin_browse(None)
        };
        self.dispatch(ticket, ctx);
    }

    fn search(&self, query: &str, top_k: TopK, ctx: WidgetCtx) {
        let ticket = {
            let mut state = self.state.borrow_mut();
            match state.controller.begin_search(query, top_k) {
                Ok(ticket) => {
                    state.tab = Tab::Search;
                    ticket
                }
                Err(err) => {
                    tracing::debug!(error = %err, "search_rejected");
                    return;
                }
            }
        };
        self.dispatch(ticket, ctx);
    }

    fn select_cluster(&self, cluster_id: Option<u32>, ctx: WidgetCtx) {
        let ticket = {
            let mut state = self.state.borrow_mut();
            state.tab = Tab::Segments;
            state.picker.set_focused(false);
            state.controller.begin_cluster_filter(cluster_id, None)
        };
        self.dispatch(ticket, ctx);
    }

    fn refresh(&self, ctx: WidgetCtx) {
        let ticket = {
            let mut state = self.state.borrow_mut();
            let ticket = state.controller.begin_refresh();
            state.tab = Tab::for_mode(state.controller.state().mode());
            ticket
        };
        self.dispatch(ticket, ctx);
    }

    fn load_clusters(&self, ctx: WidgetCtx) {
        let generation = self.state.borrow_mut().clusters.begin();
        let source = self.source.clone();
        ctx.invalidate();
        tokio::spawn(async move {
            let result = source.cluster_stats().await;
            ctx.emit_self(ClustersLoaded { generation, result });
        });
    }

    fn switch_tab(&self, tab: Tab, ctx: WidgetCtx) {
        match tab {
            Tab::Browse => self.browse(ctx),
            Tab::Search => {
                let mut state = self.state.borrow_mut();
                state.tab = Tab::Search;
                state.picker.set_focused(false);
                state.search.set_active(true);
                ctx.invalidate();
            }
            Tab::Segments => {
                let needs_load = {
                    let mut state = self.state.borrow_mut();
                    let DashboardState {
                        controller,
                        clusters,
                        tab,
                        search,
                        picker,
                        ..
                    } = &mut *state;
                    *tab = Tab::Segments;
                    search.set_active(false);
                    picker.set_focused(true);
                    let applied = (controller.state().mode() == Mode::ClusterFilter)
                        .then(|| controller.state().selected_cluster_id())
                        .flatten();
                    picker.highlight(clusters, applied);
                    !clusters.is_loading() && (!clusters.has_loaded() || clusters.error().is_some())
                };
                if needs_load {
                    self.load_clusters(ctx.clone());
                }
                ctx.invalidate();
            }
        }
    }

    fn copy_selected_id(&self, ctx: WidgetCtx) {
        let id = {
            let state = self.state.borrow();
            let records = state.controller.state().records();
            state
                .table
                .selected(records)
                .and_then(|index| records.get(index))
                .and_then(CustomerRecord::customer_id)
        };
        let Some(id) = id else {
            return;
        };
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(id.clone())) {
            Ok(()) => ctx.show_toast(Toast::info(format!("Copied {id}"))),
            Err(err) => {
                tracing::warn!(error = %err, "clipboard_unavailable");
                ctx.show_toast(Toast::error(format!("Clipboard unavailable: {err}")));
            }
        }
    }

    fn show_error(&self, ctx: WidgetCtx, message: &str) {
        let is_empty = self.state.borrow().controller.state().records().is_empty();
        if is_empty {
            ctx.set_popup(Box::new(ErrorPopup::new("Error", message, self.inner.id())));
        } else {
            ctx.show_toast(Toast::error(message));
        }
    }

    fn advance_throbber(state: &mut DashboardState) {
        if state.throbber_step.elapsed() >= THROBBER_STEP {
            state.throbber.calc_next();
            state.throbber_step = Instant::now();
        }
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect, theme: &Theme, active: Tab) {
        let titles: Vec<Line> = Tab::ALL
            .iter()
            .enumerate()
            .map(|(idx, tab)| Line::from(format!("{} {}", idx + 1, tab.title())))
            .collect();
        let tabs = Tabs::new(titles)
            .select(active.index())
            .style(Style::default().fg(theme.text_muted()).bg(theme.bg()))
            .highlight_style(
                Style::default()
                    .fg(theme.accent())
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )
            .divider(" │ ");
        frame.render_widget(tabs, area);
    }
}

impl crate::widgets::Widget for DashboardWidget {
    fn inner(&self) -> &WidgetInner {
        &self.inner
    }

    fn start(&self, ctx: WidgetCtx) {
        self.browse(ctx);
    }

    fn is_loading(&self) -> bool {
        let state = self.state.borrow();
        state.controller.state().is_loading() || state.clusters.is_loading()
    }

    fn captures_input(&self) -> bool {
        self.state.borrow().search.is_active()
    }

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let mut state = self.state.borrow_mut();
        Self::advance_throbber(&mut state);
        let DashboardState {
            controller,
            clusters,
            tab,
            search,
            picker,
            table,
            throbber,
            ..
        } = &mut *state;

        let input_height = match tab {
            Tab::Browse => 0,
            Tab::Search => search_box::HEIGHT,
            Tab::Segments => cluster_picker::HEIGHT,
        };
        let [tabs_area, input_area, title_area, table_area] = area.layout(&Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(input_height),
            Constraint::Length(1),
            Constraint::Fill(1),
        ]));

        self.render_tabs(frame, tabs_area, theme, *tab);
        let view = controller.state();
        match tab {
            Tab::Browse => {}
            Tab::Search => search.render(frame, input_area, theme, view.is_loading()),
            Tab::Segments => {
                let applied = (view.mode() == Mode::ClusterFilter)
                    .then_some(view.selected_cluster_id());
                picker.render(frame, input_area, theme, clusters, applied);
            }
        }

        frame.render_widget(
            Paragraph::new(pad(view.title(), 1)).style(
                Style::default()
                    .fg(theme.text())
                    .add_modifier(Modifier::BOLD),
            ),
            title_area,
        );
        table.render(frame, table_area, theme, view, controller.generation(), throbber);
    }

    fn handle_event(&self, ctx: WidgetCtx, event: &Event) -> bool {
        let Some(key) = event.as_key_press_event() else {
            return false;
        };

        {
            let mut state = self.state.borrow_mut();
            let DashboardState {
                controller, table, ..
            } = &mut *state;
            // any key dismisses a failure once older results can be shown again
            table.dismiss_error(controller.state(), controller.generation());
        }

        if self.state.borrow().search.is_active() {
            let action = self.state.borrow_mut().search.handle_event(event);
            match action {
                SearchAction::Submit { query, top_k } => {
                    self.state.borrow_mut().search.set_active(false);
                    self.search(&query, top_k, ctx.clone());
                }
                SearchAction::Edited | SearchAction::Blur | SearchAction::None => {}
            }
            ctx.invalidate();
            return true;
        }

        let picker_action = {
            let mut state = self.state.borrow_mut();
            let DashboardState {
                clusters, picker, ..
            } = &mut *state;
            picker.handle_event(event, clusters)
        };
        match picker_action {
            PickerAction::Select(cluster_id) => {
                self.select_cluster(cluster_id, ctx);
                return true;
            }
            PickerAction::Retry => {
                self.load_clusters(ctx);
                return true;
            }
            PickerAction::Moved => {
                ctx.invalidate();
                return true;
            }
            PickerAction::None => {}
        }

        let tab = self.state.borrow().tab;
        match key.code {
            KeyCode::Char('1') => self.switch_tab(Tab::Browse, ctx.clone()),
            KeyCode::Char('2') | KeyCode::Char('/') => self.switch_tab(Tab::Search, ctx.clone()),
            KeyCode::Char('3') => self.switch_tab(Tab::Segments, ctx.clone()),
            KeyCode::Tab | KeyCode::BackTab if tab == Tab::Segments => {
                let mut state = self.state.borrow_mut();
                let focused = state.picker.is_focused();
                state.picker.set_focused(!focused);
            }
            KeyCode::Tab if tab == Tab::Search => self.switch_tab(Tab::Search, ctx.clone()),
            KeyCode::Char('r') => self.refresh(ctx.clone()),
            KeyCode::Char('y') => self.copy_selected_id(ctx.clone()),
            _ => {
                let mut state = self.state.borrow_mut();
                let DashboardState {
                    controller, table, ..
                } = &mut *state;
                let records = controller.state().records();
                let len = records.len();
                match key.code {
                    KeyCode::Char('j') | KeyCode::Down => table.select_next(len),
                    KeyCode::Char('k') | KeyCode::Up => table.select_prev(),
                    KeyCode::PageDown => table.page_down(len),
                    KeyCode::PageUp => table.page_up(),
                    KeyCode::Char('g') | KeyCode::Home => table.select_first(),
                    KeyCode::Char('G') | KeyCode::End => table.select_last(len),
                    KeyCode::Enter | KeyCode::Char(' ') => {
                        table.toggle_selected(records);
                    }
                    KeyCode::Char('c') => table.collapse_all(),
                    _ => return false,
                }
            }
        }
        ctx.invalidate();
        true
    }

    fn on_self_event(&self, ctx: WidgetCtx, event: &AppEvent) {
        if let Some(loaded) = event.payload::<CustomersLoaded>() {
            let (commit, error) = {
                let mut state = self.state.borrow_mut();
                let commit = state
                    .controller
                    .complete(loaded.generation, loaded.result.clone());
                let DashboardState {
                    controller,
                    clusters,
                    picker,
                    table,
                    ..
                } = &mut *state;
                if commit == Commit::Applied {
                    table.sync(controller.state().records());
                    if controller.state().mode() == Mode::ClusterFilter {
                        picker.highlight(clusters, controller.state().selected_cluster_id());
                    }
                }
                (commit, controller.state().error().map(str::to_string))
            };
            if commit == Commit::Failed
                && let Some(message) = error
            {
                self.show_error(ctx.clone(), &message);
            }
            ctx.invalidate();
            return;
        }

        if let Some(loaded) = event.payload::<ClustersLoaded>() {
            let mut state = self.state.borrow_mut();
            let DashboardState {
                controller,
                clusters,
                picker,
                ..
            } = &mut *state;
            if clusters.complete(loaded.generation, loaded.result.clone()) == Commit::Applied {
                let applied = (controller.state().mode() == Mode::ClusterFilter)
                    .then(|| controller.state().selected_cluster_id())
                    .flatten();
                picker.highlight(clusters, applied);
            }
            ctx.invalidate();
        }
    }

    fn help(&self) -> Option<&[help::Entry<'_>]> {
        let state = self.state.borrow();
        if state.search.is_active() {
            Some(Self::HELP_SEARCH_EDIT)
        } else if state.tab == Tab::Segments && state.picker.is_focused() {
            Some(Self::HELP_SEGMENTS)
        } else {
            Some(Self::HELP_TABLE)
        }
    }
}
