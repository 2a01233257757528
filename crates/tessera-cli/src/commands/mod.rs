pub mod init;
pub mod issue;
pub mod prove;
pub mod setup;
pub mod trust;
pub mod verify;
