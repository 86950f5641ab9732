//! Small framework-free helpers shared by the other modules and by
//! embedding services.

pub mod env;
pub mod strings;
pub mod time;
pub mod validation;
