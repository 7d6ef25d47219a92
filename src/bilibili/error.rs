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

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("request timed out")]
	TimedOut,
	#[error("request returned bad HTTP status: {0}")]
	BadStatus(StatusCode),
	#[error("request error: {0}")]
	GeneralRequest(reqwest::Error),
	#[error("API error {code}: {message}")]
	Api { code: i64, message: String },
	#[error("API response is missing its `data` field")]
	MissingData,
	#[error("error when deserializing: {0}")]
	Deserialization(#[from] simd_json::Error),
	#[error("Error parsing URL: {0}")]
	URLParseError(#[from] url::ParseError),
	#[error("websocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
	#[error("failed to decode packet: {0}")]
	Decode(String),
	#[error("`{cmd}` event is missing required field `{field}`")]
	MissingField { cmd: String, field: &'static str },
	#[error("failed to encrypt password: {0}")]
	Crypto(String),
	#[error("login response did not set the `{0}` cookie")]
	MissingCookie(&'static str),
	#[error("server rejected authentication for room {room_id} (code {code})")]
	AuthRejected { room_id: u64, code: i64 },
	#[error("connection closed")]
	Closed
}

impl Error {
	/// Whether the event stream can keep going after this error. Per-event problems (a payload missing a field, a
	/// command that fails to deserialize, an undecodable frame) are not fatal.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, Error::MissingField { .. } | Error::Deserialization(_) | Error::Decode(_))
	}
}

impl From<reqwest::Error> for Error {
	fn from(value: reqwest::Error) -> Self {
		if value.is_timeout() {
			Error::TimedOut
		} else if let Some(status) = value.status() {
			Error::BadStatus(status)
		} else {
			Error::GeneralRequest(value)
		}
	}
}

impl From<rsa::Error> for Error {
	fn from(value: rsa::Error) -> Self {
		Error::Crypto(value.to_string())
	}
}

impl From<rsa::pkcs8::spki::Error> for Error {
	fn from(value: rsa::pkcs8::spki::Error) -> Self {
		Error::Crypto(value.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::Error;

	#[test]
	fn per_event_errors_are_recoverable() {
		assert!(!Error::MissingField { cmd: "SEND_GIFT".into(), field: "data.num" }.is_fatal());
		assert!(!Error::Decode("brotli".into()).is_fatal());
		assert!(Error::Closed.is_fatal());
		assert!(Error::AuthRejected { room_id: 55, code: -101 }.is_fatal());
	}
}
