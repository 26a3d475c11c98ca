mod booking;
mod house;
mod user;

pub use booking::*;
pub use house::*;
pub use user::*;
