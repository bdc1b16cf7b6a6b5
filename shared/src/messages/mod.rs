pub mod codec;
pub mod frame;
pub mod view_message;
