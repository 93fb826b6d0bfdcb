pub mod fetch;
pub mod login;
pub mod tail;
