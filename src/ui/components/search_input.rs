use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Enter pressed with the trimmed query (may be empty to clear the search)
  Submitted(String),
  /// Escape pressed, previous search stays in effect
  Cancelled,
}

/// Search prompt opened with `/`.
///
/// Queries go to the network, so only submitted text is reported.
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open the prompt, pre-filled with the current query
  pub fn activate(&mut self, current: &str) {
    self.active = true;
    self.input.set(current);
  }

  /// Handle a key event.
  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent, current: &str) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate(current);
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(query) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted(query.trim().to_string()))
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Cancelled)
      }
      // While typing, swallow everything so view shortcuts don't fire
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Render the search overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, 3.min(area.height));

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Search articles ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let input_line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input_line), inner);
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
  fn test_slash_activates() {
    let mut search = SearchInput::new();
    assert_eq!(search.handle_key(key(KeyCode::Char('x')), ""), KeyResult::NotHandled);
    assert_eq!(search.handle_key(key(KeyCode::Char('/')), ""), KeyResult::Handled);
    assert!(search.is_active());
  }

  #[test]
  fn test_submit_trims_query() {
    let mut search = SearchInput::new();
    search.activate("");
    for c in " mars ".chars() {
      search.handle_key(key(KeyCode::Char(c)), "");
    }
    assert_eq!(
      search.handle_key(key(KeyCode::Enter), ""),
      KeyResult::Event(SearchEvent::Submitted("mars".to_string()))
    );
    assert!(!search.is_active());
  }

  #[test]
  fn test_prefilled_with_current_query() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')), "rust");
    search.handle_key(key(KeyCode::Char('c')), "rust");
    assert_eq!(
      search.handle_key(key(KeyCode::Enter), "rust"),
      KeyResult::Event(SearchEvent::Submitted("rustc".to_string()))
    );
  }

  #[test]
  fn test_shortcut_keys_are_swallowed_while_typing() {
    let mut search = SearchInput::new();
    search.activate("");
    assert_eq!(search.handle_key(key(KeyCode::Tab), ""), KeyResult::Handled);
    assert_eq!(
      search.handle_key(key(KeyCode::Esc), ""),
      KeyResult::Event(SearchEvent::Cancelled)
    );
  }
}
