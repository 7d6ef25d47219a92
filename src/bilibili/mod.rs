// Copyright 2024 pyke.io
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{sync::OnceLock, time::Duration};

use reqwest::header::{self, HeaderMap, HeaderValue};

mod credential;
mod error;
pub mod event;
mod live;
pub mod login;
pub mod packet;
mod room;
pub mod user;
mod util;
pub mod wbi;

pub use self::{
	credential::Credential,
	error::Error,
	event::{DanmakuMessage, GiftMessage, LiveEvent},
	live::{LiveDanmaku, LiveDanmakuStream},
	login::{Captcha, LoginOutcome},
	room::{DanmuHost, RoomContext},
	user::SelfInfo
};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0";

fn default_headers() -> HeaderMap {
	let mut headers = HeaderMap::new();
	headers.append(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
	// most endpoints answer -352 (risk control) without a bilibili.com referer
	headers.append(header::REFERER, HeaderValue::from_static("https://www.bilibili.com/"));
	headers.append(header::ORIGIN, HeaderValue::from_static("https://www.bilibili.com"));
	headers
}

/// The shared HTTP client. Panics if the TLS backend can't be initialised; a client without the default headers would
/// only fail later with confusing risk-control errors.
pub(crate) fn get_http_client() -> &'static reqwest::Client {
	static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
	HTTP_CLIENT.get_or_init(|| {
		reqwest::Client::builder()
			.default_headers(default_headers())
			.timeout(Duration::from_secs(15))
			.build()
			.expect("failed to initialise HTTP client")
	})
}
