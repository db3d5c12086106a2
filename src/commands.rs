//! `:` commands, autocomplete and argument parsing

use crate::news::types::Country;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "feed",
    aliases: &["f", "news", "home"],
    description: "Back to the headline feed",
  },
  Command {
    name: "bookmarks",
    aliases: &["b", "saved"],
    description: "Bookmarked articles",
  },
  Command {
    name: "history",
    aliases: &["h", "recent"],
    description: "Recently read articles",
  },
  Command {
    name: "country",
    aliases: &["c", "region"],
    description: "Switch country, e.g. :country gb",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit newsdeck",
  },
];

/// A command ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Feed,
  Bookmarks,
  History,
  Country(&'static Country),
  /// `:country` without an argument lists the supported codes
  ListCountries,
  Quit,
}

/// Parse the command line typed after `:`.
///
/// The first word is resolved through the best autocomplete match, so
/// prefixes and aliases work the same as in the suggestion list.
pub fn parse(input: &str) -> Result<Action, String> {
  let mut words = input.split_whitespace();
  let Some(word) = words.next() else {
    return Err("empty command".to_string());
  };
  let arg = words.next();

  let Some(command) = get_suggestions(word).into_iter().next() else {
    return Err(format!("unknown command '{}'", word));
  };

  match command.name {
    "feed" => Ok(Action::Feed),
    "bookmarks" => Ok(Action::Bookmarks),
    "history" => Ok(Action::History),
    "quit" => Ok(Action::Quit),
    "country" => match arg {
      None => Ok(Action::ListCountries),
      Some(code) => Country::find(code)
        .map(Action::Country)
        .ok_or_else(|| format!("unsupported country '{}'", code)),
    },
    other => Err(format!("unhandled command '{}'", other)),
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_priority(cmd, &input_lower).map(|p| (cmd, p)))
    .collect();

  matches.sort_by_key(|(_, priority)| *priority);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better; `None` means no match
fn match_priority(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}
