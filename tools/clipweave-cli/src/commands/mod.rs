pub mod check;
pub mod compose;
pub mod init;
pub mod plan;
