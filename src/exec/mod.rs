pub mod live;
pub mod paper;
