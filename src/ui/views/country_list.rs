use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};

use crate::commands::Action;
use crate::news::types::COUNTRIES;
use crate::ui::ensure_valid_selection;
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Picker over the supported countries
pub struct CountryListView {
  list_state: ListState,
}

impl CountryListView {
  /// Open with `current` highlighted
  pub fn new(current: &str) -> Self {
    let mut list_state = ListState::default();
    list_state.select(COUNTRIES.iter().position(|c| c.code == current));
    Self { list_state }
  }
}

impl View for CountryListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Enter => {
        if let Some(country) = self.list_state.selected().and_then(|i| COUNTRIES.get(i)) {
          return ViewAction::Run(Action::Country(country));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    ensure_valid_selection(&mut self.list_state, COUNTRIES.len());

    let items: Vec<ListItem> = COUNTRIES
      .iter()
      .map(|c| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<4}", c.code), Style::default().fg(Color::Cyan)),
          Span::raw(c.name),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(
        Block::default()
          .title(" Countries ")
          .title_alignment(Alignment::Center)
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Blue)),
      )
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn breadcrumb_label(&self) -> String {
    "Countries".to_string()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("Enter", "select").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
