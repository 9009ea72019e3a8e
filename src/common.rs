pub mod error;
pub mod labels;
pub mod pagination;
pub mod payload;
