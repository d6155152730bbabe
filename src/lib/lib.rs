pub mod port;
pub mod protocol;
