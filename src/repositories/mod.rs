pub(crate) mod exams;
pub(crate) mod questions;
pub(crate) mod sessions;
pub(crate) mod users;
