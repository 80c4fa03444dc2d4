pub mod concepts;
pub mod diversify;
pub mod scorer;
