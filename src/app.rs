use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use tracing::{info, warn};

use crate::commands::{self, Action};
use crate::config::Config;
use crate::db::Database;
use crate::event::{Event, EventHandler};
use crate::library::{Library, Shelf};
use crate::news::types::Category;
use crate::news::{CachedNewsClient, KeyRotator, NewsClient};
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_footer, draw_header, StatusLine};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{CountryListView, FeedView, SavedListView};

const TICK_RATE: Duration = Duration::from_millis(250);

/// How long a footer message stays visible
const STATUS_TTL: Duration = Duration::from_secs(4);

/// Startup overrides from the command line
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
  pub country: Option<String>,
  pub category: Option<Category>,
  pub force_refresh: bool,
}

/// Main application state
pub struct App {
  config: Config,
  library: Library,

  /// Root view, never popped
  feed: FeedView,
  /// Views pushed on top of the feed
  stack: Vec<Box<dyn View>>,

  command: CommandInput,
  status: Option<(StatusLine, Instant)>,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, options: StartOptions) -> Result<Self> {
    let db = match Database::open(config.cache.path.as_deref()) {
      Ok(db) => db,
      Err(e) => {
        warn!(error = %e, "failed to open database, keeping data in memory");
        Database::open_in_memory()?
      }
    };
    let db = Arc::new(db);

    let rotator = Arc::new(KeyRotator::new(config.credential_source()?));
    let client = NewsClient::new(&config.news, rotator)?;
    let news = CachedNewsClient::new(client, config.article_store(Arc::clone(&db)));
    let library = Library::new(db);

    let country = options
      .country
      .unwrap_or_else(|| config.default_country.clone());
    let category = options.category.unwrap_or(config.default_category);
    info!(%country, %category, "starting");

    let feed = FeedView::new(
      news,
      library.clone(),
      &country,
      category,
      options.force_refresh,
    );

    Ok(Self {
      config,
      library,
      feed,
      stack: Vec::new(),
      command: CommandInput::new(),
      status: None,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let result = self.event_loop().await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }

    Ok(())
  }

  fn current_view(&mut self) -> &mut dyn View {
    match self.stack.last_mut() {
      Some(view) => view.as_mut(),
      None => &mut self.feed,
    }
  }

  fn tick(&mut self) {
    self.feed.tick();
    for view in &mut self.stack {
      view.tick();
    }
    if let Some((_, at)) = &self.status {
      if at.elapsed() > STATUS_TTL {
        self.status = None;
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if !self.current_view().captures_input() {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(line)) => {
          self.execute_command(&line);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = self.current_view().handle_key(key);
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.stack.push(view),
      ViewAction::Pop => {
        if self.stack.is_empty() {
          self.should_quit = true;
        } else {
          self.pop();
        }
      }
      ViewAction::Run(action) => self.run_action(action),
      ViewAction::Status(text) => self.set_status(text, false),
      ViewAction::Error(text) => self.set_status(text, true),
    }
  }

  fn pop(&mut self) {
    if let Some(mut view) = self.stack.pop() {
      view.on_close();
    }
    self.current_view().on_resume();
  }

  /// Close every pushed view, back to the feed
  fn pop_to_root(&mut self) {
    while let Some(mut view) = self.stack.pop() {
      view.on_close();
    }
    self.feed.on_resume();
  }

  fn execute_command(&mut self, line: &str) {
    match commands::parse(line) {
      Ok(action) => self.run_action(action),
      Err(e) => self.set_status(e, true),
    }
  }

  fn run_action(&mut self, action: Action) {
    match action {
      Action::Feed => self.pop_to_root(),
      Action::Bookmarks => self.open_shelf(Shelf::Bookmarks),
      Action::History => self.open_shelf(Shelf::History),
      Action::ListCountries => {
        self.pop_to_root();
        self.stack.push(Box::new(CountryListView::new(self.feed.country())));
      }
      Action::Country(country) => {
        self.pop_to_root();
        self.feed.set_country(country);
        self.set_status(format!("Country: {}", country.name), false);
      }
      Action::Quit => self.should_quit = true,
    }
  }

  fn open_shelf(&mut self, shelf: Shelf) {
    self.pop_to_root();
    self
      .stack
      .push(Box::new(SavedListView::new(shelf, self.library.clone())));
  }

  fn set_status(&mut self, text: String, is_error: bool) {
    if is_error {
      warn!(%text, "status error");
    }
    self.status = Some((StatusLine { text, is_error }, Instant::now()));
  }

  fn breadcrumb(&self) -> Vec<String> {
    std::iter::once(self.feed.breadcrumb_label())
      .chain(self.stack.iter().map(|v| v.breadcrumb_label()))
      .collect()
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(1),    // Content
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let shortcuts = self.current_view_ref().shortcuts();
    draw_header(
      frame,
      chunks[0],
      self.config.title(),
      self.feed.country(),
      &shortcuts,
    );

    let breadcrumb = self.breadcrumb();
    let status = self.status.as_ref().map(|(line, _)| line);
    draw_footer(frame, chunks[2], &breadcrumb, status);

    self.current_view().render(frame, chunks[1]);
    self.command.render_overlay(frame, chunks[1]);
  }

  fn current_view_ref(&self) -> &dyn View {
    match self.stack.last() {
      Some(view) => view.as_ref(),
      None => &self.feed,
    }
  }
}
