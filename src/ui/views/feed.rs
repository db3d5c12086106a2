use std::collections::HashSet;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::{info, warn};

use crate::cache::{CacheResult, CacheSource};
use crate::library::Library;
use crate::news::types::{Article, Category, Country, FeedRequest, NewsPage, RequestIntent};
use crate::news::CachedNewsClient;
use crate::query::{Query, QueryState};
use crate::ui::components::{CategoryTabs, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{relative_age, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::ArticleDetailView;

type FeedQuery = Query<FeedRequest, CacheResult<NewsPage>>;

/// Root view: headlines for the selected country and category, or search results
pub struct FeedView {
  library: Library,
  country: String,
  /// Submitted search, empty when browsing categories
  search_text: String,
  query: FeedQuery,
  /// Last page that arrived for the current intent, kept while refreshing
  shown: Option<CacheResult<NewsPage>>,
  bookmarked: HashSet<String>,
  list_state: ListState,
  tabs: CategoryTabs,
  search: SearchInput,
}

impl FeedView {
  pub fn new(
    news: CachedNewsClient,
    library: Library,
    country: &str,
    category: Category,
    force_refresh: bool,
  ) -> Self {
    let query = Query::new(move |req: FeedRequest| {
      let news = news.clone();
      async move {
        news
          .read(&req.intent, req.force_refresh)
          .await
          .map_err(|e| {
            if e.is_recoverable() {
              format!("{}. Press 'r' to retry.", e)
            } else {
              e.to_string()
            }
          })
      }
    });

    let mut view = Self {
      library,
      country: country.to_string(),
      search_text: String::new(),
      query,
      shown: None,
      bookmarked: HashSet::new(),
      list_state: ListState::default(),
      tabs: CategoryTabs::new(category),
      search: SearchInput::new(),
    };
    view.reload_bookmarks();
    view.dispatch(force_refresh);
    view
  }

  pub fn country(&self) -> &str {
    &self.country
  }

  fn intent(&self) -> RequestIntent {
    RequestIntent::from_selection(&self.country, self.tabs.selected(), &self.search_text)
  }

  /// Request the current selection. A new intent clears the list.
  fn dispatch(&mut self, force_refresh: bool) {
    let intent = self.intent();
    let same_intent = self.query.request().map(|r| &r.intent) == Some(&intent);
    if !same_intent {
      self.shown = None;
      self.list_state.select(Some(0));
    }

    info!(%intent, force_refresh, "loading feed");
    let request = if force_refresh {
      FeedRequest::forced(intent)
    } else {
      FeedRequest::new(intent)
    };
    self.query.dispatch(request);
  }

  /// Switch country and fetch fresh headlines for it.
  pub fn set_country(&mut self, country: &Country) {
    self.country = country.code.to_string();
    self.dispatch(true);
  }

  fn articles(&self) -> &[Article] {
    self
      .shown
      .as_ref()
      .map(|r| r.data.articles.as_slice())
      .unwrap_or(&[])
  }

  fn selected_article(&self) -> Option<&Article> {
    self.list_state.selected().and_then(|i| self.articles().get(i))
  }

  /// Category to file library entries under; searches have none
  fn current_category(&self) -> Option<Category> {
    self.search_text.is_empty().then(|| self.tabs.selected())
  }

  fn reload_bookmarks(&mut self) {
    match self.library.bookmarks() {
      Ok(saved) => self.bookmarked = saved.into_iter().map(|s| s.article.url).collect(),
      Err(e) => warn!(error = %e, "failed to load bookmarks"),
    }
  }

  fn toggle_bookmark(&mut self) -> ViewAction {
    let Some(article) = self.selected_article().cloned() else {
      return ViewAction::None;
    };
    match self.library.toggle_bookmark(&article, self.current_category()) {
      Ok(true) => {
        self.bookmarked.insert(article.url);
        ViewAction::Status("Bookmarked".to_string())
      }
      Ok(false) => {
        self.bookmarked.remove(&article.url);
        ViewAction::Status("Bookmark removed".to_string())
      }
      Err(e) => ViewAction::Error(e.to_string()),
    }
  }

  fn title(&self) -> String {
    let what = match self.intent() {
      RequestIntent::Search { query, .. } => format!("Search \"{}\"", truncate(&query, 30)),
      RequestIntent::TopHeadlines { .. } => "Top headlines".to_string(),
      RequestIntent::Category { category, .. } => category.label().to_string(),
    };

    let status = match (self.query.state(), &self.shown) {
      (QueryState::Loading, _) => "loading...".to_string(),
      (QueryState::Error(e), _) => format!("error: {}", e),
      (_, Some(result)) => match (result.source, result.cached_at) {
        (CacheSource::Cache, Some(at)) => format!(
          "{} · cached {}",
          result.data.articles.len(),
          relative_age(at, Utc::now())
        ),
        _ => format!("{} · live", result.data.articles.len()),
      },
      _ => String::new(),
    };

    format!(" {} [{}] ({}) ", what, self.country.to_uppercase(), status)
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.articles().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if self.query.is_error() {
        Color::Red
      } else {
        Color::Blue
      }));

    if len == 0 {
      let content = match self.query.state() {
        QueryState::Loading | QueryState::Idle => "Loading articles...",
        QueryState::Error(_) => "Failed to load articles.",
        QueryState::Success(_) => "No articles found.",
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let now = Utc::now();
    let title_width = (area.width as usize).saturating_sub(34).max(20);
    let items: Vec<ListItem> = self
      .articles()
      .iter()
      .map(|article| {
        let mark = if self.bookmarked.contains(&article.url) { "★ " } else { "  " };
        ListItem::new(Line::from(vec![
          Span::styled(mark, Style::default().fg(Color::Yellow)),
          Span::styled(
            format!("{:<9}", relative_age(article.published_at, now)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(
            format!("{:<16}", truncate(&article.source_name, 15)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(truncate(&article.title, title_width)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for FeedView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key, &self.search_text) {
      KeyResult::Event(SearchEvent::Submitted(text)) => {
        if text != self.search_text {
          self.search_text = text;
          self.dispatch(false);
        }
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    if let KeyResult::Event(_) = self.tabs.handle_key(key) {
      self.search_text.clear();
      self.dispatch(false);
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.list_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.list_state.select_last(),
      KeyCode::Char('r') => self.dispatch(true),
      KeyCode::Char('b') => return self.toggle_bookmark(),
      KeyCode::Enter => {
        if let Some(article) = self.selected_article().cloned() {
          return ViewAction::Push(Box::new(ArticleDetailView::new(
            article,
            self.current_category(),
            self.library.clone(),
          )));
        }
      }
      KeyCode::Esc if !self.search_text.is_empty() => {
        self.search_text.clear();
        self.dispatch(false);
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(1)])
      .split(area);

    self
      .tabs
      .render(frame, chunks[0], !self.search_text.is_empty());
    self.render_list(frame, chunks[1]);
    self.search.render_overlay(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    match self.intent() {
      RequestIntent::Search { query, .. } => format!("Search [{}]", truncate(&query, 20)),
      _ => format!("Feed [{}]", self.tabs.selected().label()),
    }
  }

  fn tick(&mut self) {
    if self.query.poll() && self.query.is_success() {
      self.shown = self.query.data().cloned();
    }
  }

  fn captures_input(&self) -> bool {
    self.search.is_active()
  }

  /// Returning from a pushed view may have changed bookmarks
  fn on_resume(&mut self) {
    self.reload_bookmarks();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("tab", "category").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("b", "bookmark").with_priority(50),
      ShortcutInfo::new("Esc", "clear search")
        .with_priority(60)
        .when_active(),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
