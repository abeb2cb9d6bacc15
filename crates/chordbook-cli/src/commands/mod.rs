pub mod add;
pub mod common;
pub mod completions;
pub mod conflicts;
pub mod edit;
pub mod history;
pub mod maintenance;
pub mod restore;
