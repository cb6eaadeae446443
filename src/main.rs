use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::{Result, eyre::WrapErr};
use crossterm::event::{Event, EventStream, KeyCode, KeyModifiers};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Clear, Paragraph, Wrap},
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::StreamExt;
use unicode_width::UnicodeWidthStr;

use segscope::{
    api::{ApiClient, CustomerSource},
    settings::{Preferences, Settings},
    view::{DEFAULT_BROWSE_LIMIT, DEFAULT_CLUSTER_LIMIT, TopK},
};

mod env;
mod help;
mod logging;
mod subcommands;
mod util;
mod widgets;

use env::{Env, Message, Toast, ToastKind};
use util::{centered, env_u32, pad};
use widgets::{DashboardWidget, Popup, Widget, theme::Theme};

const BROWSE_LIMIT_ENV: &str = "SEGSCOPE_BROWSE_LIMIT";

#[derive(clap::Parser)]
#[command(
    name = "segscope",
    version,
    about = "Browse, search and segment customer insights",
    long_about = None
)]
struct Cli {
    /// Increase output verbosity (-v, -vv, etc.)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Base URL of the customer insights API
    #[arg(long, global = true, env = "SEGSCOPE_API_URL", default_value = ApiClient::DEFAULT_BASE_URL)]
    api_url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,

    /// Write TUI logs here instead of the default data directory
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List customers
    Customers {
        /// Maximum number of customers to fetch
        #[arg(short, long, default_value_t = DEFAULT_BROWSE_LIMIT)]
        limit: u32,
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
    /// Semantic search over customer descriptions
    Search {
        /// Free-text query, at least three characters
        query: String,
        /// Number of results (5, 10, 15 or 20)
        #[arg(short = 'k', long, default_value_t = 5, value_parser = parse_top_k)]
        top_k: u32,
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
    /// List customers of one segment, or of all segments
    Segment {
        /// Segment to filter by; omit for every segment
        #[arg(short, long)]
        cluster_id: Option<u32>,
        /// Maximum number of customers per segment
        #[arg(short, long, default_value_t = DEFAULT_CLUSTER_LIMIT)]
        limit: u32,
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
    /// Show per-segment statistics
    Clusters {
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
}

fn parse_top_k(raw: &str) -> std::result::Result<u32, String> {
    raw.parse::<u32>()
        .ok()
        .and_then(TopK::new)
        .map(TopK::get)
        .ok_or_else(|| format!("must be one of {:?}", TopK::CHOICES))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = <Cli as clap::Parser>::parse();

    let target = match cli.command {
        Some(_) => logging::Target::Stderr,
        None => logging::Target::File(cli.log_file.as_deref()),
    };
    let log_path = logging::init(cli.verbose, target)?;

    let client = ApiClient::new(&cli.api_url, Duration::from_secs(cli.timeout_secs))
        .wrap_err("invalid API configuration")?;
    tracing::info!(base_url = client.base_url(), log = ?log_path, "starting");

    match cli.command {
        Some(Commands::Customers { limit, json }) => {
            subcommands::customers::browse(&client, limit, json).await
        }
        Some(Commands::Search { query, top_k, json }) => {
            subcommands::customers::search(&client, &query, top_k, json).await
        }
        Some(Commands::Segment {
            cluster_id,
            limit,
            json,
        }) => subcommands::customers::segment(&client, cluster_id, limit, json).await,
        Some(Commands::Clusters { json }) => subcommands::clusters::command(&client, json).await,
        None => {
            let browse_limit = env_u32(BROWSE_LIMIT_ENV).unwrap_or(DEFAULT_BROWSE_LIMIT);
            let (app, messages) = App::new(Arc::new(client), browse_limit);
            app.run_tui(messages).await
        }
    }
}

struct ActiveToast {
    toast: Toast,
    expires_at: Instant,
}

struct App {
    should_quit: bool,
    base_url: String,
    dashboard: DashboardWidget,
    popup: Option<Box<dyn Popup>>,
    toast: Option<ActiveToast>,
    settings: Settings,
    theme: Theme,
    env: Env,
}

impl App {
    const FRAMES_PER_SECOND: f32 = 30.0;

    fn new(client: Arc<ApiClient>, browse_limit: u32) -> (Self, UnboundedReceiver<Message>) {
        let settings = Settings::load_default().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Using default settings");
            Settings::in_memory(Preferences::default())
        });
        let theme = Theme::resolve(settings.theme());
        let base_url = client.base_url().to_string();
        let source: Arc<dyn CustomerSource> = client;
        let (env, messages) = Env::new();
        let app = Self {
            should_quit: false,
            base_url,
            dashboard: DashboardWidget::new(source, browse_limit),
            popup: None,
            toast: None,
            settings,
            theme,
            env,
        };
        (app, messages)
    }

    async fn run_tui(self, messages: UnboundedReceiver<Message>) -> Result<()> {
        let terminal = ratatui::init();
        let app_result = self.run(terminal, messages).await;
        ratatui::restore();
        app_result
    }

    async fn run(
        mut self,
        mut terminal: DefaultTerminal,
        mut messages: UnboundedReceiver<Message>,
    ) -> Result<()> {
        self.dashboard.start(self.env.ctx(self.dashboard.id()));

        let period = Duration::from_secs_f32(1.0 / Self::FRAMES_PER_SECOND);
        let mut interval = tokio::time::interval(period);
        let mut events = EventStream::new();

        while !self.should_quit {
            tokio::select! {
                _ = interval.tick() => {
                    self.expire_toast();
                    terminal.draw(|frame| self.render(frame))?;
                },
                Some(Ok(event)) = events.next() => self.handle_event(&event),
                Some(msg) = messages.recv() => self.handle_message(msg),
            }
        }
        Ok(())
    }

    fn handle_message(&mut self, msg: Message) {
        match msg {
            // the next tick redraws
            Message::Invalidate => {}
            Message::SetPopup(popup) => {
                tracing::debug!(
                    popup = popup.inner().name(),
                    parent = ?popup.inner().parent(),
                    "popup_opened"
                );
                popup.start(self.env.ctx(popup.id()));
                self.popup = Some(popup);
            }
            Message::DismissPopup => self.popup = None,
            Message::ShowToast(toast) => {
                self.toast = Some(ActiveToast {
                    expires_at: Instant::now() + toast.duration,
                    toast,
                });
            }
            Message::Event(event) => {
                let target = event.target();
                if target == self.dashboard.id() {
                    self.dashboard
                        .on_self_event(self.env.ctx(target), &event);
                } else if let Some(popup) = self.popup.as_ref().filter(|p| p.id() == target) {
                    popup.on_self_event(self.env.ctx(target), &event);
                } else {
                    tracing::debug!(%target, "event_for_closed_widget");
                }
            }
        }
    }

    fn expire_toast(&mut self) {
        if self
            .toast
            .as_ref()
            .is_some_and(|active| active.expires_at <= Instant::now())
        {
            self.toast = None;
        }
    }

    fn active_widget(&self) -> &dyn Widget {
        if let Some(popup) = &self.popup {
            return &**popup;
        }
        &self.dashboard
    }

    fn handle_event(&mut self, event: &Event) {
        let widget = self.active_widget();
        if widget.handle_event(self.env.ctx(widget.id()), event) {
            return;
        }
        let Some(key) = event.as_key_press_event() else {
            return;
        };
        if self.active_widget().captures_input() {
            return;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') if self.popup.is_none() => self.open_help(),
            KeyCode::Char('T') => self.toggle_theme(),
            _ => {}
        }
    }

    fn open_help(&mut self) {
        let mut entries: Vec<&help::Entry<'_>> = Vec::new();
        if let Some(widget_help) = self.dashboard.help() {
            entries.extend(widget_help.iter());
        }
        entries.extend(help::GLOBAL.iter());
        let popup = help::Widget::new(&entries, self.dashboard.id());
        self.popup = Some(Box::new(popup));
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Err(err) = self.settings.set_theme(self.theme.preference()) {
            tracing::warn!(error = %err, "failed to save theme");
            self.toast = Some(ActiveToast {
                toast: Toast::error(format!("Theme not saved: {err}")),
                expires_at: Instant::now() + Duration::from_secs(4),
            });
        }
    }

    fn render(&self, frame: &mut Frame) {
        let theme = &self.theme;
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(theme.bg())), area);

        let mut hints: Vec<&help::Entry<'_>> = Vec::new();
        if let Some(widget_help) = self.active_widget().help() {
            hints.extend(widget_help.iter());
        }
        hints.extend(help::GLOBAL.iter());
        let footer_height = help::height(&hints, area);

        let layout = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(footer_height),
        ]);
        let [title_area, body_area, footer_area] = area.layout(&layout);

        self.render_header(frame, title_area);
        self.dashboard.render(frame, body_area, theme);
        help::render(&hints, frame, footer_area, theme);

        if let Some(popup) = &self.popup {
            let rect = popup.rect(body_area);
            popup.render(frame, rect, theme);
        }
        if let Some(active) = &self.toast {
            render_toast(frame, body_area, theme, &active.toast);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let theme = &self.theme;
        let mut spans = vec![
            Span::styled(
                pad("segscope", 1),
                Style::default()
                    .fg(theme.accent())
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("· Customer Insights Platform", Style::default().fg(theme.text())),
        ];
        if self.dashboard.is_loading() {
            spans.push(Span::styled(" ⟳", Style::default().fg(theme.warning())));
        }
        let [left, right] = area.layout(&Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length((self.base_url.len() + 2) as u16),
        ]));
        frame.render_widget(Line::from(spans), left);
        frame.render_widget(
            Line::styled(pad(&self.base_url, 1), Style::default().fg(theme.text_muted()))
                .right_aligned(),
            right,
        );
    }
}

fn render_toast(frame: &mut Frame, area: Rect, theme: &Theme, toast: &Toast) {
    let color = match toast.kind {
        ToastKind::Info => theme.success(),
        ToastKind::Error => theme.error(),
    };
    let width = toast_width(&toast.message, area.width);
    let height = 3;
    let bottom = centered(area, width, height);
    let rect = Rect {
        y: (area.y + area.height).saturating_sub(height + 1),
        ..bottom
    };
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(toast.message.as_str())
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(theme.text()).bg(theme.panel_bg()))
            .block(
                Block::bordered()
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(color)),
            ),
        rect,
    );
}

/// Message width plus borders and padding, kept inside the screen.
fn toast_width(message: &str, available: u16) -> u16 {
    u16::try_from(message.width())
        .unwrap_or(u16::MAX)
        .saturating_add(4)
        .min(available.saturating_sub(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toast_width_counts_display_columns() {
        assert_eq!(toast_width("Copied c-1", 80), 14);
        // wide glyphs take two columns each
        assert_eq!(toast_width("顧客", 80), 8);
        assert_eq!(toast_width(&"x".repeat(70_000), 80), 78);
        assert_eq!(toast_width("anything", 1), 0);
    }

    #[test]
    fn top_k_argument_accepts_only_known_choices() {
        assert_eq!(parse_top_k("15"), Ok(15));
        assert!(parse_top_k("7").is_err());
        assert!(parse_top_k("ten").is_err());
    }
}
