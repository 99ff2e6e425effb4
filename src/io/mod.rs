pub mod bus;
pub mod port92;
