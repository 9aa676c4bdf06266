mod add;
mod browse;
pub mod common;
mod completions;
mod delete;
mod edit;
mod list;
mod show;
mod watch;

pub use add::{run_add, AddArgs};
pub use browse::{run_calendar, run_map, run_media, run_mood};
pub use completions::run_completions;
pub use delete::run_delete;
pub use edit::{apply_edit, run_edit};
pub use list::{run_list, run_search};
pub use show::run_show;
pub use watch::run_watch;
