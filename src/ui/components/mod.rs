mod category_tabs;
mod command_input;
mod input;
mod key_result;
mod search_input;

pub use category_tabs::CategoryTabs;
pub use command_input::{CommandEvent, CommandInput};
pub use key_result::KeyResult;
pub use search_input::{SearchEvent, SearchInput};
