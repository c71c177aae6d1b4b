pub(crate) mod csv;
pub(crate) mod grading;
pub(crate) mod identity;
pub(crate) mod question_import;
pub(crate) mod questions;
pub(crate) mod roster_import;
pub(crate) mod session_manager;
pub(crate) mod session_timing;
