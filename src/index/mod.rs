pub mod set;
pub mod sets;
