// Copyright 2025 pyke.io
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

//! Framing for the live danmaku websocket.
//!
//! Every websocket message carries one or more packets, each prefixed with a 16-byte big-endian header:
//!
//! | offset | size | field             |
//! |--------|------|-------------------|
//! | 0      | 4    | packet length     |
//! | 4      | 2    | header length     |
//! | 6      | 2    | protocol version  |
//! | 8      | 4    | operation         |
//! | 12     | 4    | sequence (always 1) |
//!
//! Protocol version 2 bodies are zlib streams containing more packets.

use std::io::Read;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::ZlibDecoder;
use serde::Serialize;

use super::Error;

pub const HEADER_LEN: usize = 16;

const HEARTBEAT_BODY: &[u8] = b"[object Object]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ProtocolVersion {
	/// Plain JSON body.
	Json = 0,
	/// Raw binary body, used by heartbeat replies and client packets.
	Int32 = 1,
	Zlib = 2,
	Brotli = 3
}

impl TryFrom<u16> for ProtocolVersion {
	type Error = Error;

	fn try_from(value: u16) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(Self::Json),
			1 => Ok(Self::Int32),
			2 => Ok(Self::Zlib),
			3 => Ok(Self::Brotli),
			x => Err(Error::Decode(format!("unknown protocol version {x}")))
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	Heartbeat,
	/// Body is a big-endian `u32` popularity count.
	HeartbeatReply,
	/// Body is a JSON command (`{"cmd": ...}`).
	Message,
	Auth,
	/// Body is `{"code": 0}` on success.
	AuthReply,
	Unknown(u32)
}

impl From<u32> for Operation {
	fn from(value: u32) -> Self {
		match value {
			2 => Self::Heartbeat,
			3 => Self::HeartbeatReply,
			5 => Self::Message,
			7 => Self::Auth,
			8 => Self::AuthReply,
			x => Self::Unknown(x)
		}
	}
}

impl From<Operation> for u32 {
	fn from(value: Operation) -> Self {
		match value {
			Operation::Heartbeat => 2,
			Operation::HeartbeatReply => 3,
			Operation::Message => 5,
			Operation::Auth => 7,
			Operation::AuthReply => 8,
			Operation::Unknown(x) => x
		}
	}
}

/// Body of the first packet sent on a new connection.
#[derive(Serialize, Debug, Clone)]
pub struct AuthBody<'a> {
	pub uid: u64,
	pub roomid: u64,
	pub protover: u16,
	pub buvid: &'a str,
	pub platform: &'a str,
	#[serde(rename = "type")]
	pub kind: u8,
	pub key: &'a str
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
	pub protover: ProtocolVersion,
	pub operation: Operation,
	pub body: Bytes
}

impl Packet {
	pub fn new(operation: Operation, body: impl Into<Bytes>) -> Self {
		Self {
			protover: ProtocolVersion::Int32,
			operation,
			body: body.into()
		}
	}

	pub fn heartbeat() -> Self {
		Self::new(Operation::Heartbeat, Bytes::from_static(HEARTBEAT_BODY))
	}

	pub fn auth(body: &AuthBody<'_>) -> Result<Self, Error> {
		Ok(Self::new(Operation::Auth, simd_json::to_vec(body)?))
	}

	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(HEADER_LEN + self.body.len());
		buf.put_u32((HEADER_LEN + self.body.len()) as u32);
		buf.put_u16(HEADER_LEN as u16);
		buf.put_u16(self.protover as u16);
		buf.put_u32(self.operation.into());
		buf.put_u32(1);
		buf.put_slice(&self.body);
		buf.freeze()
	}

	/// Splits a websocket message into packets, inflating compressed bodies.
	///
	/// A packet whose body can't be decoded becomes an `Err` in place and the packets around it are still returned.
	/// Broken framing (a truncated header or an impossible length) ends the message, since nothing after it can be
	/// located.
	pub fn decode_all(mut buf: Bytes) -> Vec<Result<Packet, Error>> {
		let mut packets = Vec::new();
		while !buf.is_empty() {
			if buf.len() < HEADER_LEN {
				packets.push(Err(Error::Decode(format!("truncated header: {} bytes", buf.len()))));
				break;
			}

			let mut header = &buf[..HEADER_LEN];
			let packet_len = header.get_u32() as usize;
			let header_len = header.get_u16() as usize;
			let protover = header.get_u16();
			let operation = Operation::from(header.get_u32());
			if header_len < HEADER_LEN || packet_len < header_len || packet_len > buf.len() {
				packets.push(Err(Error::Decode(format!("bad packet length {packet_len} (header {header_len}, buffer {})", buf.len()))));
				break;
			}

			let mut body = buf.split_to(packet_len);
			body.advance(header_len);
			match ProtocolVersion::try_from(protover) {
				Ok(protover @ (ProtocolVersion::Json | ProtocolVersion::Int32)) => packets.push(Ok(Packet { protover, operation, body })),
				Ok(ProtocolVersion::Zlib) => {
					let mut inflated = Vec::new();
					match ZlibDecoder::new(body.as_ref()).read_to_end(&mut inflated) {
						Ok(_) => packets.extend(Self::decode_all(Bytes::from(inflated))),
						Err(e) => packets.push(Err(Error::Decode(format!("zlib: {e}"))))
					}
				}
				Ok(ProtocolVersion::Brotli) => packets.push(Err(Error::Decode("brotli-compressed packets are not supported".to_string()))),
				Err(e) => packets.push(Err(e))
			}
		}
		packets
	}

	pub fn popularity(&self) -> Option<u32> {
		if self.operation != Operation::HeartbeatReply {
			return None;
		}
		self.body.get(..4)?.try_into().ok().map(u32::from_be_bytes)
	}
}
