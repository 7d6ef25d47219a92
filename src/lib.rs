pub mod bilibili;
pub mod config;
pub mod session;

pub(crate) mod util;

pub use self::{
	bilibili::{Credential, LiveDanmaku, LiveEvent, RoomContext},
	config::{Config, Fatal}
};
