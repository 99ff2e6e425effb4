pub mod a20;
pub mod bda;
pub mod block_move;
pub mod frame;
pub mod init;
pub mod memmap;
pub mod platform;
pub mod system;
