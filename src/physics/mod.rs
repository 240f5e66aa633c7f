pub mod resample;
pub mod array_factor;
pub mod erp;
pub mod sparams;
