pub mod review;
pub mod team;
