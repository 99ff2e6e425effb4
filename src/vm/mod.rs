pub mod cpu;
pub mod descriptor;
pub mod memory;
pub mod registers;
pub mod runtime;
