//! Client side of the RESP wire protocol, enough to issue one command and
//! decode its reply.

pub mod parser;
pub mod types;

pub use parser::RespParser;
pub use types::RespValue;
