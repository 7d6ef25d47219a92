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

use url::{form_urlencoded, Url};

use super::Error;

const MIXIN_KEY_ENC_TAB: [usize; 64] = [
	46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29, 28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40,
	61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25, 54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52
];

/// Keys for WBI request signing, taken from the `wbi_img` section of the `nav` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WbiKeys {
	img_key: String,
	sub_key: String
}

impl WbiKeys {
	pub fn new(img_key: impl Into<String>, sub_key: impl Into<String>) -> Self {
		Self {
			img_key: img_key.into(),
			sub_key: sub_key.into()
		}
	}

	/// Keys are the file stems of the two image URLs, e.g. `https://i0.hdslb.com/bfs/wbi/7cd0...077c.png`.
	pub(crate) fn from_urls(img_url: &str, sub_url: &str) -> Option<Self> {
		fn stem(url: &str) -> Option<&str> {
			let file = url.rsplit('/').next()?;
			let stem = file.split('.').next()?;
			if stem.is_empty() { None } else { Some(stem) }
		}
		Some(Self::new(stem(img_url)?, stem(sub_url)?))
	}

	pub fn mixin_key(&self) -> String {
		let raw: Vec<char> = format!("{}{}", self.img_key, self.sub_key).chars().collect();
		MIXIN_KEY_ENC_TAB.iter().filter_map(|&i| raw.get(i)).take(32).collect()
	}

	/// Produces the signed query string for `params` at unix time `wts`.
	pub fn sign<'a>(&self, params: impl IntoIterator<Item = (&'a str, String)>, wts: i64) -> String {
		let mut params: Vec<(&str, String)> = params
			.into_iter()
			.map(|(k, v)| (k, v.chars().filter(|c| !"!'()*".contains(*c)).collect()))
			.chain([("wts", wts.to_string())])
			.collect();
		params.sort_by(|a, b| a.0.cmp(b.0));

		let query = params
			.iter()
			.map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
			.collect::<Vec<_>>()
			.join("&");
		let w_rid = format!("{:x}", md5::compute(format!("{query}{}", self.mixin_key())));
		format!("{query}&w_rid={w_rid}")
	}

	pub fn signed_url<'a>(&self, endpoint: &str, params: impl IntoIterator<Item = (&'a str, String)>) -> Result<Url, Error> {
		let mut url = Url::parse(endpoint)?;
		url.set_query(Some(&self.sign(params, chrono::Utc::now().timestamp())));
		Ok(url)
	}
}

fn encode_component(s: &str) -> String {
	form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>().replace('+', "%20")
}

#[cfg(test)]
mod tests {
	use super::WbiKeys;

	fn keys() -> WbiKeys {
		WbiKeys::from_urls("https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png", "https://i0.hdslb.com/bfs/wbi/4932caff0ff746eab6f01bf08b70ac45.png")
			.unwrap()
	}

	#[test]
	fn mixin_key() {
		assert_eq!(keys().mixin_key(), "ea1db124af3c7062474693fa704f4ff8");
	}

	#[test]
	fn signs_sorted_query() {
		let signed = keys().sign([("foo", "114".to_string()), ("bar", "514".to_string()), ("zab", "1919810".to_string())], 1702204169);
		assert_eq!(signed, "bar=514&foo=114&wts=1702204169&zab=1919810&w_rid=8f6f2b5b3d485fe1886cec6a0be8c5d4");
	}

	#[test]
	fn strips_reserved_characters() {
		let signed = keys().sign([("q", "a b!'()*".to_string())], 1);
		assert!(signed.starts_with("q=a%20b&wts=1&w_rid="));
	}
}
