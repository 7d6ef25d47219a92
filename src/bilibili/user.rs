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

use super::{
	get_http_client,
	util::{ApiResponse, SimdJsonResponseBody},
	wbi::WbiKeys,
	Credential, Error
};

const NAV_ENDPOINT: &str = "https://api.bilibili.com/x/web-interface/nav";

#[derive(Deserialize, Debug, Clone)]
struct WbiImg {
	img_url: String,
	sub_url: String
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct NavData {
	#[serde(default)]
	is_login: bool,
	#[serde(default)]
	mid: u64,
	#[serde(default)]
	uname: String,
	#[serde(rename = "wbi_img")]
	wbi_img: Option<WbiImg>
}

/// The logged-in user's profile, as seen by the `nav` endpoint.
#[derive(Debug, Clone)]
pub struct SelfInfo {
	pub is_login: bool,
	pub mid: u64,
	pub name: String,
	pub wbi_keys: Option<WbiKeys>
}

impl From<NavData> for SelfInfo {
	fn from(value: NavData) -> Self {
		Self {
			is_login: value.is_login,
			mid: value.mid,
			name: value.uname,
			wbi_keys: value.wbi_img.and_then(|c| WbiKeys::from_urls(&c.img_url, &c.sub_url))
		}
	}
}

/// Fetches the profile of the account `credential` belongs to.
///
/// The endpoint answers with code `-101` when not logged in but still includes WBI keys, so this returns successfully
/// with `is_login: false` in that case.
pub async fn get_self_info(credential: &Credential) -> Result<SelfInfo, Error> {
	let response: ApiResponse<NavData> = credential.apply(get_http_client().get(NAV_ENDPOINT)).send().await?.simd_json().await?;
	match response {
		ApiResponse { code: -101, data: Some(data), .. } => Ok(SelfInfo::from(data)),
		response => response.into_data().map(SelfInfo::from)
	}
}

#[cfg(test)]
mod tests {
	use super::{NavData, SelfInfo};
	use crate::bilibili::util::ApiResponse;

	#[test]
	fn parses_nav() {
		let mut body = br#"{"code":0,"message":"0","ttl":1,"data":{"isLogin":true,"mid":12345,"uname":"Alice","wbi_img":{"img_url":"https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png","sub_url":"https://i0.hdslb.com/bfs/wbi/4932caff0ff746eab6f01bf08b70ac45.png"}}}"#.to_vec();
		let response: ApiResponse<NavData> = simd_json::from_slice(&mut body).unwrap();
		let info = SelfInfo::from(response.into_data().unwrap());
		assert!(info.is_login);
		assert_eq!(info.name, "Alice");
		assert_eq!(info.wbi_keys.unwrap().mixin_key(), "ea1db124af3c7062474693fa704f4ff8");
	}
}
