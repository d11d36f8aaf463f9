pub mod bucket;
pub mod eval;
pub mod injection;
pub mod pii;
