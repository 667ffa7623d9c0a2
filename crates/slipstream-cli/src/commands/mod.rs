pub mod ghost;
pub mod probe;
pub mod run;
