// Copyright 2024 pyke.io
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use thiserror::Error;

use crate::{bilibili::Captcha, util::Nonempty};

pub const DEFAULT_ROOM_ID: u64 = 55;

/// Conditions that stop the backend before it ever connects.
#[derive(Debug, Error)]
pub enum Fatal {
	#[error("username or password undefined!")]
	MissingCredentials,
	#[error("Need 2fa login! ({url})")]
	SecondFactorRequired { url: String },
	#[error("invalid room ID `{0}`")]
	InvalidRoomId(String)
}

impl Fatal {
	pub fn exit_code(&self) -> i32 {
		match self {
			Fatal::MissingCredentials => 1,
			Fatal::SecondFactorRequired { .. } => -1,
			Fatal::InvalidRoomId(_) => 2
		}
	}
}

#[derive(Clone)]
pub struct Config {
	pub username: String,
	pub password: String,
	/// Fallback `buvid3` for when the login response doesn't set one.
	pub buvid3: Option<String>,
	pub room_id: u64,
	pub captcha: Option<Captcha>
}

impl Config {
	/// Reads `USERNAME`, `PASSWORD`, `BUVID3`, `ROOM_ID` and the `CAPTCHA_*` variables from the process environment.
	pub fn from_env() -> Result<Self, Fatal> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Fatal> {
		let (Some(username), Some(password)) = (lookup("USERNAME").nonempty(), lookup("PASSWORD").nonempty()) else {
			return Err(Fatal::MissingCredentials);
		};

		let room_id = match lookup("ROOM_ID").nonempty() {
			Some(room) => parse_room_id(&room)?,
			None => DEFAULT_ROOM_ID
		};

		let captcha = match (
			lookup("CAPTCHA_TOKEN").nonempty(),
			lookup("CAPTCHA_CHALLENGE").nonempty(),
			lookup("CAPTCHA_VALIDATE").nonempty(),
			lookup("CAPTCHA_SECCODE").nonempty()
		) {
			(Some(token), Some(challenge), Some(validate), Some(seccode)) => Some(Captcha { token, challenge, validate, seccode }),
			_ => None
		};

		Ok(Config {
			username,
			password,
			buvid3: lookup("BUVID3").nonempty(),
			room_id,
			captcha
		})
	}

	/// Overrides the room, e.g. from a command line argument.
	pub fn with_room_id(mut self, room: Option<&str>) -> Result<Self, Fatal> {
		if let Some(room) = room {
			self.room_id = parse_room_id(room)?;
		}
		Ok(self)
	}
}

fn parse_room_id(room: &str) -> Result<u64, Fatal> {
	room.trim().parse().ok().filter(|c| *c != 0).ok_or_else(|| Fatal::InvalidRoomId(room.to_owned()))
}

impl fmt::Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.field("buvid3", &self.buvid3)
			.field("room_id", &self.room_id)
			.field("captcha", &self.captcha.is_some())
			.finish()
	}
}
