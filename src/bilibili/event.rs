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

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_option_number_from_string;
use simd_json::{
	base::{ValueAsArray, ValueAsObject, ValueAsScalar},
	OwnedValue
};

use super::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanmakuMessage {
	/// The sender's UID. Bilibili reports `0` for viewers it masks (i.e. when the connection has no `buvid3`).
	pub uid: Option<u64>,
	pub user: String,
	pub message: String,
	pub sent_at: DateTime<Utc>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftMessage {
	pub uid: Option<u64>,
	pub user: String,
	pub gift_name: String,
	/// Unit price, in gold seeds (1000 = ¥1). Free gifts (silver seeds) report `0`.
	pub price: u64,
	pub num: u64,
	pub sent_at: DateTime<Utc>
}

impl GiftMessage {
	pub fn total_value(&self) -> u64 {
		self.price.saturating_mul(self.num)
	}
}

#[derive(Debug, Clone)]
pub enum LiveEvent {
	/// The server accepted the auth packet; events will start flowing.
	Authenticated,
	/// Heartbeat reply carrying the room's current popularity value.
	Popularity(u32),
	Danmaku(DanmakuMessage),
	Gift(GiftMessage),
	/// Any other command (`INTERACT_WORD`, `ONLINE_RANK_COUNT`, ...), passed through untouched.
	Other { cmd: String, payload: OwnedValue }
}

/// Formats a timestamp as local `HH:MM:SS.mmm`.
pub fn format_clock(time: &DateTime<Utc>) -> String {
	time.with_timezone(&Local).format("%H:%M:%S%.3f").to_string()
}

impl fmt::Display for DanmakuMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} Received danmaku from {}: {}", format_clock(&self.sent_at), self.user, self.message)
	}
}

impl fmt::Display for GiftMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} Received gift: {} x{} from {}, value: {}",
			format_clock(&self.sent_at),
			self.gift_name,
			self.num,
			self.user,
			self.total_value()
		)
	}
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GiftData {
	uname: Option<String>,
	#[serde(default, deserialize_with = "deserialize_option_number_from_string")]
	uid: Option<u64>,
	gift_name: Option<String>,
	#[serde(default, deserialize_with = "deserialize_option_number_from_string")]
	price: Option<u64>,
	#[serde(default, deserialize_with = "deserialize_option_number_from_string")]
	num: Option<u64>,
	#[serde(default, deserialize_with = "deserialize_option_number_from_string")]
	timestamp: Option<i64>
}

fn field<'v>(value: Option<&'v OwnedValue>, key: &str) -> Option<&'v OwnedValue> {
	value?.as_object()?.get(key)
}

fn index(value: Option<&OwnedValue>, i: usize) -> Option<&OwnedValue> {
	value?.as_array()?.get(i)
}

fn missing(cmd: &str, field: &'static str) -> Error {
	Error::MissingField { cmd: cmd.to_owned(), field }
}

/// Parses the JSON body of an [`Operation::Message`](super::packet::Operation::Message) packet.
pub(crate) fn parse_command(body: &[u8]) -> Result<LiveEvent, Error> {
	let mut body = body.to_vec();
	let value = simd_json::to_owned_value(&mut body)?;
	let cmd = field(Some(&value), "cmd")
		.and_then(|c| c.as_str())
		.ok_or_else(|| missing("<unknown>", "cmd"))?
		.to_owned();

	// some commands carry protocol variants after a colon, e.g. `DANMU_MSG:4:0:2:2:2:0`
	match cmd.split(':').next().unwrap_or_default() {
		"DANMU_MSG" => parse_danmaku(&cmd, &value).map(LiveEvent::Danmaku),
		"SEND_GIFT" => parse_gift(&cmd, value).map(LiveEvent::Gift),
		_ => Ok(LiveEvent::Other { cmd, payload: value })
	}
}

fn parse_danmaku(cmd: &str, value: &OwnedValue) -> Result<DanmakuMessage, Error> {
	let info = field(Some(value), "info");
	let millis = index(index(info, 0), 4).and_then(|c| c.as_i64()).ok_or_else(|| missing(cmd, "info[0][4]"))?;
	let message = index(info, 1).and_then(|c| c.as_str()).ok_or_else(|| missing(cmd, "info[1]"))?;
	let sender = index(info, 2);
	let user = index(sender, 1).and_then(|c| c.as_str()).ok_or_else(|| missing(cmd, "info[2][1]"))?;
	Ok(DanmakuMessage {
		uid: index(sender, 0).and_then(|c| c.as_u64()).filter(|c| *c != 0),
		user: user.to_owned(),
		message: message.to_owned(),
		sent_at: Utc.timestamp_millis_opt(millis).single().ok_or_else(|| missing(cmd, "info[0][4]"))?
	})
}

fn parse_gift(cmd: &str, value: OwnedValue) -> Result<GiftMessage, Error> {
	let data = match value {
		OwnedValue::Object(mut object) => object.remove("data"),
		_ => None
	}
	.ok_or_else(|| missing(cmd, "data"))?;
	let data: GiftData = simd_json::serde::from_owned_value(data)?;
	let timestamp = data.timestamp.ok_or_else(|| missing(cmd, "data.timestamp"))?;
	Ok(GiftMessage {
		uid: data.uid.filter(|c| *c != 0),
		user: data.uname.ok_or_else(|| missing(cmd, "data.uname"))?,
		gift_name: data.gift_name.ok_or_else(|| missing(cmd, "data.giftName"))?,
		price: data.price.ok_or_else(|| missing(cmd, "data.price"))?,
		num: data.num.ok_or_else(|| missing(cmd, "data.num"))?,
		sent_at: Utc.timestamp_opt(timestamp, 0).single().ok_or_else(|| missing(cmd, "data.timestamp"))?
	})
}

#[cfg(test)]
mod tests {
	use chrono::{Local, TimeZone};

	use super::{format_clock, parse_command, LiveEvent};
	use crate::bilibili::Error;

	const ALICE: &str = r#"{"cmd":"DANMU_MSG","info":[[0,1,25,16777215,1700000000123,1700000000,0,"a1b2c3",0,0,0,"",0],"hello",[114514,"Alice",0,0,0,10000,1,""],[],[0,0,9868950,">50000"],["",""],0,0,null,{"ts":1700000000,"ct":"ABCDEF"},0,0,null,null,0,7]}"#;

	#[test]
	fn danmaku_line() {
		let LiveEvent::Danmaku(message) = parse_command(ALICE.as_bytes()).unwrap() else {
			panic!("expected danmaku");
		};
		assert_eq!(message.user, "Alice");
		assert_eq!(message.uid, Some(114514));

		let expected_time = Local.timestamp_millis_opt(1700000000123).unwrap().format("%H:%M:%S%.3f").to_string();
		assert!(expected_time.ends_with(".123"));
		assert_eq!(format_clock(&message.sent_at), expected_time);

		let line = message.to_string();
		assert!(line.contains("Alice"));
		assert!(line.contains(&expected_time));
		assert_eq!(line, format!("{expected_time} Received danmaku from Alice: hello"));
	}

	#[test]
	fn danmaku_with_variant_suffix() {
		let body = ALICE.replace(r#""cmd":"DANMU_MSG""#, r#""cmd":"DANMU_MSG:4:0:2:2:2:0""#);
		assert!(matches!(parse_command(body.as_bytes()).unwrap(), LiveEvent::Danmaku(_)));
	}

	#[test]
	fn gift_total_value() {
		let body = r#"{"cmd":"SEND_GIFT","data":{"uname":"Bob","uid":42,"giftName":"辣条","price":10,"num":3,"timestamp":1700000000,"coin_type":"gold"}}"#;
		let LiveEvent::Gift(gift) = parse_command(body.as_bytes()).unwrap() else {
			panic!("expected gift");
		};
		assert_eq!(gift.total_value(), 30);
		let line = gift.to_string();
		assert!(line.ends_with("Received gift: 辣条 x3 from Bob, value: 30"));
		assert!(line.starts_with(&format_clock(&gift.sent_at)));
	}

	#[test]
	fn gift_numbers_as_strings() {
		let body = r#"{"cmd":"SEND_GIFT","data":{"uname":"Bob","giftName":"x","price":"100","num":"2","timestamp":"1700000000"}}"#;
		let LiveEvent::Gift(gift) = parse_command(body.as_bytes()).unwrap() else {
			panic!("expected gift");
		};
		assert_eq!(gift.total_value(), 200);
		assert_eq!(gift.uid, None);
	}

	#[test]
	fn missing_fields_are_reported() {
		let body = r#"{"cmd":"DANMU_MSG","info":[[0,1,25,16777215,1700000000123],"hello",[1]]}"#;
		match parse_command(body.as_bytes()) {
			Err(Error::MissingField { cmd, field }) => {
				assert_eq!(cmd, "DANMU_MSG");
				assert_eq!(field, "info[2][1]");
			}
			other => panic!("unexpected {other:?}")
		}

		let body = r#"{"cmd":"SEND_GIFT","data":{"uname":"Bob","giftName":"x","price":1,"timestamp":1700000000}}"#;
		assert!(matches!(parse_command(body.as_bytes()), Err(Error::MissingField { field: "data.num", .. })));

		let body = r#"{"cmd":"SEND_GIFT"}"#;
		assert!(matches!(parse_command(body.as_bytes()), Err(Error::MissingField { field: "data", .. })));

		assert!(matches!(parse_command(br#"{"info":[]}"#), Err(Error::MissingField { field: "cmd", .. })));
	}

	#[test]
	fn other_commands_pass_through() {
		match parse_command(br#"{"cmd":"ONLINE_RANK_COUNT","data":{"count":12}}"#).unwrap() {
			LiveEvent::Other { cmd, .. } => assert_eq!(cmd, "ONLINE_RANK_COUNT"),
			other => panic!("unexpected {other:?}")
		}
	}

	#[test]
	fn malformed_json_is_recoverable() {
		let err = parse_command(b"{not json").unwrap_err();
		assert!(!err.is_fatal());
	}
}
