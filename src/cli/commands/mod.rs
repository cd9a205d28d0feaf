pub mod impact;
pub mod stream;
