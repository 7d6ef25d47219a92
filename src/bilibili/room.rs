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

use serde::Deserialize;
use url::Url;

use super::{
	get_http_client,
	util::{ApiResponse, SimdJsonResponseBody},
	wbi::WbiKeys,
	Credential, Error
};

const ROOM_INIT_ENDPOINT: &str = "https://api.live.bilibili.com/room/v1/Room/room_init";
const DANMU_INFO_ENDPOINT: &str = "https://api.live.bilibili.com/xlive/web-room/v1/index/getDanmuInfo";
const FALLBACK_DANMU_HOST: &str = "broadcastlv.chat.bilibili.com";

#[derive(Deserialize, Debug)]
struct RoomInit {
	room_id: u64,
	#[serde(default)]
	short_id: u64,
	#[serde(default)]
	uid: u64,
	#[serde(default)]
	live_status: u8
}

#[derive(Deserialize, Debug)]
struct DanmuInfo {
	token: String,
	#[serde(default)]
	host_list: Vec<DanmuHost>
}

/// One of the danmaku servers a room can be reached through.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DanmuHost {
	pub host: String,
	#[serde(default)]
	pub port: u16,
	#[serde(default)]
	pub wss_port: u16,
	#[serde(default)]
	pub ws_port: u16
}

/// Everything needed to open a danmaku connection to one live room.
#[derive(Clone, Debug)]
pub struct RoomContext {
	pub(crate) room_id: u64,
	pub(crate) short_id: u64,
	pub(crate) anchor_uid: u64,
	pub(crate) live: bool,
	pub(crate) token: String,
	pub(crate) hosts: Vec<DanmuHost>,
	pub(crate) credential: Credential
}

impl RoomContext {
	/// Resolves `room` (a short or real room ID) and fetches the danmaku server token for it.
	///
	/// `wbi_keys` should come from [`get_self_info`](super::user::get_self_info); without them the server info request
	/// goes out unsigned, which Bilibili may reject with code `-352`.
	pub async fn new(room: u64, credential: &Credential, wbi_keys: Option<&WbiKeys>) -> Result<Self, Error> {
		let init: ApiResponse<RoomInit> = credential
			.apply(get_http_client().get(Url::parse_with_params(ROOM_INIT_ENDPOINT, [("id", room.to_string())])?))
			.send()
			.await?
			.simd_json()
			.await?;
		let init = init.into_data()?;

		let params = [("id", init.room_id.to_string()), ("type", "0".to_string())];
		let info_url = match wbi_keys {
			Some(keys) => keys.signed_url(DANMU_INFO_ENDPOINT, params)?,
			None => Url::parse_with_params(DANMU_INFO_ENDPOINT, params)?
		};
		let info: ApiResponse<DanmuInfo> = credential.apply(get_http_client().get(info_url)).send().await?.simd_json().await?;
		let info = info.into_data()?;
		tracing::debug!(room_id = init.room_id, hosts = info.host_list.len(), "fetched danmaku server info");

		Ok(RoomContext {
			room_id: init.room_id,
			short_id: init.short_id,
			anchor_uid: init.uid,
			live: init.live_status == 1,
			token: info.token,
			hosts: info.host_list,
			credential: credential.clone()
		})
	}

	/// The real (long) room ID.
	pub fn room_id(&self) -> u64 {
		self.room_id
	}

	/// The room's short ID, if it has one.
	pub fn short_id(&self) -> Option<u64> {
		if self.short_id == 0 { None } else { Some(self.short_id) }
	}

	pub fn anchor_uid(&self) -> u64 {
		self.anchor_uid
	}

	pub fn is_live(&self) -> bool {
		self.live
	}

	pub fn url(&self) -> Url {
		let mut url = Url::parse("https://live.bilibili.com/").expect("static URL is valid");
		url.set_path(&self.room_id.to_string());
		url
	}

	/// Websocket endpoints to try, in order. The public fallback host always comes last.
	pub fn websocket_urls(&self) -> Vec<String> {
		self.hosts
			.iter()
			.filter(|c| !c.host.is_empty())
			.map(|c| if c.wss_port == 0 { format!("wss://{}/sub", c.host) } else { format!("wss://{}:{}/sub", c.host, c.wss_port) })
			.chain([format!("wss://{FALLBACK_DANMU_HOST}/sub")])
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::{DanmuHost, DanmuInfo, RoomContext};
	use crate::bilibili::{util::ApiResponse, Credential};

	#[test]
	fn websocket_urls_prefer_host_list() {
		let mut body =
			br#"{"code":0,"message":"0","data":{"token":"tok","host_list":[{"host":"zj-cn-live-comet.chat.bilibili.com","port":2243,"wss_port":2245,"ws_port":2244},{"host":"","wss_port":443}]}}"#
				.to_vec();
		let info: DanmuInfo = simd_json::from_slice::<ApiResponse<DanmuInfo>>(&mut body).unwrap().into_data().unwrap();
		let context = RoomContext {
			room_id: 5440,
			short_id: 55,
			anchor_uid: 9617619,
			live: true,
			token: info.token,
			hosts: info.host_list,
			credential: Credential::default()
		};
		assert_eq!(context.websocket_urls(), vec![
			"wss://zj-cn-live-comet.chat.bilibili.com:2245/sub".to_string(),
			"wss://broadcastlv.chat.bilibili.com/sub".to_string()
		]);
		assert_eq!(context.url().as_str(), "https://live.bilibili.com/5440");
		assert_eq!(context.short_id(), Some(55));
	}

	#[test]
	fn empty_host_list_falls_back() {
		let context = RoomContext {
			room_id: 1,
			short_id: 0,
			anchor_uid: 0,
			live: false,
			token: String::new(),
			hosts: vec![DanmuHost { host: "h".into(), port: 0, wss_port: 0, ws_port: 0 }],
			credential: Credential::default()
		};
		assert_eq!(context.websocket_urls(), vec!["wss://h/sub".to_string(), "wss://broadcastlv.chat.bilibili.com/sub".to_string()]);
		assert_eq!(context.short_id(), None);
	}
}
