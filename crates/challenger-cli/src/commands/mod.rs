pub mod history;
pub mod init;
pub mod recommend;
pub mod take;
pub mod tier;
pub mod validate;
