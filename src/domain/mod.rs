pub mod checklist;
pub mod codes;
pub mod lifecycle;
pub mod time;
pub mod token;
