use super::KeyResult;
use crate::news::types::Category;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Category tab strip above the feed
#[derive(Debug, Clone, Default)]
pub struct CategoryTabs {
  selected: Category,
}

impl CategoryTabs {
  pub fn new(selected: Category) -> Self {
    Self { selected }
  }

  pub fn selected(&self) -> Category {
    self.selected
  }

  /// Tab/Shift-Tab or h/l move between categories, wrapping around
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<Category> {
    self.selected = match key.code {
      KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => self.selected.next(),
      KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => self.selected.previous(),
      _ => return KeyResult::NotHandled,
    };
    KeyResult::Event(self.selected)
  }

  /// Render the tabs. `dimmed` greys out the selection while a search is shown.
  pub fn render(&self, frame: &mut Frame, area: Rect, dimmed: bool) {
    let mut spans = Vec::with_capacity(Category::ALL.len() * 2);

    for (idx, category) in Category::ALL.iter().enumerate() {
      if idx > 0 {
        spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
      }
      let style = match (*category == self.selected, dimmed) {
        (true, false) => Style::default().fg(Color::Black).bg(Color::Cyan),
        (true, true) => Style::default().fg(Color::Black).bg(Color::DarkGray),
        (false, _) => Style::default().fg(Color::Gray),
      };
      spans.push(Span::styled(format!(" {} ", category.label()), style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_navigation_wraps() {
    let mut tabs = CategoryTabs::default();
    assert_eq!(
      tabs.handle_key(key(KeyCode::BackTab)),
      KeyResult::Event(Category::Health)
    );
    assert_eq!(
      tabs.handle_key(key(KeyCode::Char('l'))),
      KeyResult::Event(Category::General)
    );
    assert_eq!(tabs.handle_key(key(KeyCode::Tab)), KeyResult::Event(Category::World));
    assert_eq!(tabs.selected(), Category::World);
  }

  #[test]
  fn test_other_keys_not_handled() {
    let mut tabs = CategoryTabs::new(Category::Science);
    assert_eq!(tabs.handle_key(key(KeyCode::Char('j'))), KeyResult::NotHandled);
    assert_eq!(tabs.selected(), Category::Science);
  }
}
