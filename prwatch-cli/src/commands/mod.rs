//! CLI command implementations

pub mod check;
pub mod run;
pub mod status;

pub use check::CheckArgs;
pub use run::RunArgs;
pub use status::StatusArgs;
