pub mod classes;
pub mod core;
pub mod roster;
pub mod session;
