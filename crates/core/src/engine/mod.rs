pub mod normalize;
pub mod recommend;
pub mod tables;
pub mod valuation;
