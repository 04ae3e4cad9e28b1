pub mod gen;
pub mod make;
pub mod service;
