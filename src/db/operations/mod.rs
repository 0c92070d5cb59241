pub mod content;
pub mod dictation;
pub mod learning;
pub mod user;
