//! Wire models

pub mod outcome;
pub mod request;
