use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::library::{Library, SavedArticle, Shelf};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{relative_age, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::ArticleDetailView;

/// Bookmarks or reading history, read straight from the local database
pub struct SavedListView {
  shelf: Shelf,
  library: Library,
  items: Vec<SavedArticle>,
  error: Option<String>,
  list_state: ListState,
}

impl SavedListView {
  pub fn new(shelf: Shelf, library: Library) -> Self {
    let mut view = Self {
      shelf,
      library,
      items: Vec::new(),
      error: None,
      list_state: ListState::default(),
    };
    view.reload();
    view
  }

  fn reload(&mut self) {
    match self.library.shelf(self.shelf) {
      Ok(items) => {
        self.items = items;
        self.error = None;
      }
      Err(e) => self.error = Some(e.to_string()),
    }
  }

  fn selected(&self) -> Option<&SavedArticle> {
    self.list_state.selected().and_then(|i| self.items.get(i))
  }

  fn remove_selected(&mut self) -> ViewAction {
    if self.shelf != Shelf::Bookmarks {
      return ViewAction::None;
    }
    let Some(url) = self.selected().map(|s| s.article.url.clone()) else {
      return ViewAction::None;
    };
    match self.library.remove_bookmark(&url) {
      Ok(()) => {
        self.reload();
        ViewAction::Status("Bookmark removed".to_string())
      }
      Err(e) => ViewAction::Error(e.to_string()),
    }
  }

  fn item_line(&self, saved: &SavedArticle, now: chrono::DateTime<Utc>) -> ListItem<'static> {
    let mut spans = vec![
      Span::styled(
        format!("{:<9}", relative_age(saved.saved_at, now)),
        Style::default().fg(Color::DarkGray),
      ),
      Span::styled(
        format!("{:<16}", truncate(&saved.article.source_name, 15)),
        Style::default().fg(Color::Cyan),
      ),
      Span::raw(truncate(&saved.article.title, 70)),
    ];
    if let Some(secs) = saved.read_duration {
      spans.push(Span::styled(
        format!("  ({}m {}s)", secs / 60, secs % 60),
        Style::default().fg(Color::DarkGray),
      ));
    }
    ListItem::new(Line::from(spans))
  }
}

impl View for SavedListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.reload(),
      KeyCode::Char('d') | KeyCode::Char('b') => return self.remove_selected(),
      KeyCode::Enter => {
        if let Some(saved) = self.selected() {
          return ViewAction::Push(Box::new(ArticleDetailView::new(
            saved.article.clone(),
            saved.category,
            self.library.clone(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    ensure_valid_selection(&mut self.list_state, self.items.len());

    let title = match &self.error {
      Some(e) => format!(" {} (error: {}) ", self.shelf.title(), e),
      None => format!(" {} ({}) ", self.shelf.title(), self.items.len()),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.items.is_empty() {
      let content = match self.shelf {
        Shelf::Bookmarks => "No bookmarks yet. Press 'b' on an article to save it.",
        Shelf::History => "Nothing read yet.",
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let now = Utc::now();
    let items: Vec<ListItem> = self.items.iter().map(|s| self.item_line(s, now)).collect();
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

  fn breadcrumb_label(&self) -> String {
    self.shelf.title().to_string()
  }

  fn on_resume(&mut self) {
    self.reload();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "reload").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ];
    if self.shelf == Shelf::Bookmarks {
      shortcuts.push(ShortcutInfo::new("d", "remove").with_priority(50));
    }
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::sample_articles;
  use crate::db::Database;
  use crossterm::event::KeyModifiers;
  use std::sync::Arc;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_remove_bookmark_from_list() {
    let lib = Library::new(Arc::new(Database::open_in_memory().unwrap()));
    for article in sample_articles(2) {
      lib.add_bookmark(&article, None).unwrap();
    }

    let mut view = SavedListView::new(Shelf::Bookmarks, lib.clone());
    assert_eq!(view.items.len(), 2);

    view.list_state.select(Some(0));
    assert!(matches!(view.handle_key(key(KeyCode::Char('d'))), ViewAction::Status(_)));
    assert_eq!(view.items.len(), 1);
    assert_eq!(lib.bookmarks().unwrap().len(), 1);
  }

  #[test]
  fn test_history_cannot_remove() {
    let lib = Library::new(Arc::new(Database::open_in_memory().unwrap()));
    lib.record_open(&sample_articles(1)[0], None).unwrap();

    let mut view = SavedListView::new(Shelf::History, lib.clone());
    view.list_state.select(Some(0));
    assert!(matches!(view.handle_key(key(KeyCode::Char('d'))), ViewAction::None));
    assert_eq!(lib.history().unwrap().len(), 1);
  }
}
