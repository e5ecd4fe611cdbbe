pub mod ai;
pub mod conversation;
pub mod driver;
pub mod redaction;
pub mod sessions;
pub mod storage;
pub mod validation;
