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

use std::fmt;

use reqwest::{header, RequestBuilder};

use super::Error;
use crate::util::Nonempty;

/// The session cookies of a logged-in Bilibili account.
///
/// A credential is obtained once (usually via [`login_with_password`](super::login::login_with_password)) and held for
/// the lifetime of the process. It is never written to disk.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
	pub sessdata: String,
	pub bili_jct: String,
	/// Browser fingerprint cookie. The live danmaku server uses it to tell apart anonymous and logged-in viewers; if it
	/// is missing, usernames in chat messages are masked.
	pub buvid3: Option<String>,
	pub dedeuserid: Option<String>,
	/// Refresh token handed out alongside the session cookies.
	pub ac_time_value: Option<String>
}

impl Credential {
	pub fn new(sessdata: impl Into<String>, bili_jct: impl Into<String>) -> Self {
		Self {
			sessdata: sessdata.into(),
			bili_jct: bili_jct.into(),
			..Default::default()
		}
	}

	pub(crate) fn from_cookies<'a>(cookies: impl IntoIterator<Item = (&'a str, &'a str)>, refresh_token: Option<String>) -> Result<Self, Error> {
		let mut credential = Credential {
			ac_time_value: refresh_token.nonempty(),
			..Default::default()
		};
		for (name, value) in cookies {
			match name {
				"SESSDATA" => credential.sessdata = value.to_owned(),
				"bili_jct" => credential.bili_jct = value.to_owned(),
				"buvid3" => credential.buvid3 = value.to_owned().nonempty(),
				"DedeUserID" => credential.dedeuserid = value.to_owned().nonempty(),
				_ => {}
			}
		}
		if credential.sessdata.is_empty() {
			return Err(Error::MissingCookie("SESSDATA"));
		}
		Ok(credential)
	}

	pub fn has_buvid3(&self) -> bool {
		self.buvid3.as_deref().is_some_and(|c| !c.is_empty())
	}

	/// Sets `buvid3` from `fallback` if the credential doesn't carry one. Returns `true` if the credential now has a
	/// `buvid3`.
	pub fn ensure_buvid3(&mut self, fallback: Option<String>) -> bool {
		if !self.has_buvid3() {
			self.buvid3 = fallback.nonempty();
		}
		self.has_buvid3()
	}

	/// The logged-in account's UID, or `0` if unknown.
	pub fn uid(&self) -> u64 {
		self.dedeuserid.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0)
	}

	pub fn cookie_header(&self) -> String {
		let mut cookies = vec![format!("SESSDATA={}", self.sessdata), format!("bili_jct={}", self.bili_jct)];
		if let Some(buvid3) = &self.buvid3 {
			cookies.push(format!("buvid3={buvid3}"));
		}
		if let Some(uid) = &self.dedeuserid {
			cookies.push(format!("DedeUserID={uid}"));
		}
		if let Some(ac_time_value) = &self.ac_time_value {
			cookies.push(format!("ac_time_value={ac_time_value}"));
		}
		cookies.join("; ")
	}

	pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
		request.header(header::COOKIE, self.cookie_header())
	}
}

impl fmt::Debug for Credential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credential")
			.field("sessdata", &"<redacted>")
			.field("bili_jct", &"<redacted>")
			.field("buvid3", &self.buvid3)
			.field("dedeuserid", &self.dedeuserid)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::Credential;
	use crate::bilibili::Error;

	#[test]
	fn from_login_cookies() {
		let credential = Credential::from_cookies(
			[("SESSDATA", "abc%2C123"), ("bili_jct", "csrf"), ("DedeUserID", "12345"), ("sid", "ignored")],
			Some("refresh".to_string())
		)
		.unwrap();
		assert_eq!(credential.sessdata, "abc%2C123");
		assert_eq!(credential.uid(), 12345);
		assert_eq!(credential.ac_time_value.as_deref(), Some("refresh"));
		assert!(!credential.has_buvid3());
	}

	#[test]
	fn session_cookie_is_required() {
		assert!(matches!(Credential::from_cookies([("bili_jct", "csrf")], None), Err(Error::MissingCookie("SESSDATA"))));
	}

	#[test]
	fn buvid3_is_filled_from_fallback() {
		let mut credential = Credential::new("sess", "jct");
		assert!(credential.ensure_buvid3(Some("FALLBACK-infoc".to_string())));
		assert_eq!(credential.buvid3.as_deref(), Some("FALLBACK-infoc"));

		// an existing value wins
		assert!(credential.ensure_buvid3(Some("OTHER-infoc".to_string())));
		assert_eq!(credential.buvid3.as_deref(), Some("FALLBACK-infoc"));

		let mut credential = Credential::new("sess", "jct");
		assert!(!credential.ensure_buvid3(Some(String::new())));
		assert!(!credential.ensure_buvid3(None));
	}

	#[test]
	fn cookie_header_and_debug() {
		let mut credential = Credential::new("sess", "jct");
		credential.buvid3 = Some("b3".into());
		assert_eq!(credential.cookie_header(), "SESSDATA=sess; bili_jct=jct; buvid3=b3");
		assert!(!format!("{credential:?}").contains("sess\""));
	}
}
