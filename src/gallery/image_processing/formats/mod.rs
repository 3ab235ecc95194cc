pub mod jpeg;
pub mod webp;
