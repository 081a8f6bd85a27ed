pub mod admission;
pub mod lifecycle;
pub mod matching;
pub mod schedule;
