use std::time::Instant;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::warn;

use crate::library::Library;
use crate::news::types::{Article, Category};
use crate::ui::renderfns::{read_time_minutes, relative_age, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Full view of one article. Opening it records a history entry; leaving
/// records how long it was read.
pub struct ArticleDetailView {
  article: Article,
  category: Option<Category>,
  library: Library,
  opened_at: Instant,
  bookmarked: bool,
  scroll: u16,
}

impl ArticleDetailView {
  pub fn new(article: Article, category: Option<Category>, library: Library) -> Self {
    if let Err(e) = library.record_open(&article, category) {
      warn!(error = %e, url = %article.url, "failed to record reading history");
    }
    let bookmarked = library.is_bookmarked(&article.url).unwrap_or_else(|e| {
      warn!(error = %e, "failed to read bookmark state");
      false
    });

    Self {
      article,
      category,
      library,
      opened_at: Instant::now(),
      bookmarked,
      scroll: 0,
    }
  }

  fn body(&self) -> Vec<Line<'_>> {
    let article = &self.article;
    let label = Style::default().fg(Color::DarkGray);

    let mut lines = vec![
      Line::from(Span::styled(
        article.title.as_str(),
        Style::default().fg(Color::White).bold(),
      )),
      Line::raw(""),
      Line::from(vec![
        Span::styled("Source: ", label),
        Span::styled(article.source_name.as_str(), Style::default().fg(Color::Cyan)),
        Span::raw("   "),
        Span::styled("Published: ", label),
        Span::raw(format!(
          "{} ({})",
          article.published_at.format("%Y-%m-%d %H:%M UTC"),
          relative_age(article.published_at, Utc::now())
        )),
        Span::raw("   "),
        Span::styled(
          format!("{} min read", read_time_minutes(&article.description)),
          label,
        ),
      ]),
    ];

    if let Some(category) = self.category {
      lines.push(Line::from(vec![
        Span::styled("Category: ", label),
        Span::raw(category.label()),
      ]));
    }
    if self.bookmarked {
      lines.push(Line::from(Span::styled("★ Bookmarked", Style::default().fg(Color::Yellow))));
    }

    lines.push(Line::raw(""));
    if article.description.is_empty() {
      lines.push(Line::from(Span::styled("No description", label)));
    } else {
      lines.push(Line::raw(article.description.as_str()));
    }

    if let Some(content) = article.content.as_deref() {
      lines.push(Line::raw(""));
      lines.push(Line::raw(content));
    }

    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
      Span::styled("Link: ", label),
      Span::styled(article.url.as_str(), Style::default().fg(Color::Blue).underlined()),
    ]));
    if let Some(image) = article.image.as_deref() {
      lines.push(Line::from(vec![Span::styled("Image: ", label), Span::raw(image)]));
    }

    lines
  }
}

impl View for ArticleDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('g') | KeyCode::Home => self.scroll = 0,
      KeyCode::Char('b') => {
        return match self.library.toggle_bookmark(&self.article, self.category) {
          Ok(now) => {
            self.bookmarked = now;
            ViewAction::Status(if now { "Bookmarked" } else { "Bookmark removed" }.to_string())
          }
          Err(e) => ViewAction::Error(e.to_string()),
        };
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" {} ", truncate(&self.article.source_name, 40)))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = Paragraph::new(self.body())
      .block(block)
      .wrap(Wrap { trim: true })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    truncate(&self.article.title, 30)
  }

  fn on_close(&mut self) {
    let read_for = self.opened_at.elapsed();
    if let Err(e) = self.library.record_duration(&self.article.url, read_for) {
      warn!(error = %e, url = %self.article.url, "failed to record reading duration");
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("j/k", "scroll").with_priority(10),
      ShortcutInfo::new("b", "bookmark").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
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

  fn library() -> Library {
    Library::new(Arc::new(Database::open_in_memory().unwrap()))
  }

  #[test]
  fn test_opening_records_history_and_closing_records_duration() {
    let lib = library();
    let article = sample_articles(1).remove(0);

    let mut view = ArticleDetailView::new(article.clone(), Some(Category::World), lib.clone());
    let history = lib.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].read_duration, None);

    view.on_close();
    let history = lib.history().unwrap();
    assert_eq!(history[0].article.url, article.url);
    assert_eq!(history[0].read_duration, Some(0));
  }

  #[test]
  fn test_bookmark_toggle() {
    let lib = library();
    let article = sample_articles(1).remove(0);
    let mut view = ArticleDetailView::new(article.clone(), None, lib.clone());

    assert!(matches!(view.handle_key(key(KeyCode::Char('b'))), ViewAction::Status(_)));
    assert!(lib.is_bookmarked(&article.url).unwrap());
    view.handle_key(key(KeyCode::Char('b')));
    assert!(!lib.is_bookmarked(&article.url).unwrap());
  }

  #[test]
  fn test_q_pops() {
    let mut view = ArticleDetailView::new(sample_articles(1).remove(0), None, library());
    assert!(matches!(view.handle_key(key(KeyCode::Char('q'))), ViewAction::Pop));
  }
}
