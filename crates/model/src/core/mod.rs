pub mod value;
pub mod window;
