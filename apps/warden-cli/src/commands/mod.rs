pub mod audit;
pub mod auto_approve;
pub mod batch;
pub mod check;
pub mod emit;
pub mod validate;
