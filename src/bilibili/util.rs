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

use std::future::Future;

use reqwest::Response;
use serde::{de::DeserializeOwned, Deserialize};

use super::Error;

pub trait SimdJsonResponseBody {
	fn simd_json<T: DeserializeOwned>(self) -> impl Future<Output = Result<T, Error>>;
}

impl SimdJsonResponseBody for Response {
	async fn simd_json<T: DeserializeOwned>(self) -> Result<T, Error> {
		let mut full = self.error_for_status()?.bytes().await?.to_vec();
		Ok(simd_json::from_slice(&mut full)?)
	}
}

/// The `{code, message, data}` envelope every Bilibili web API wraps its payload in.
#[derive(Deserialize, Debug)]
pub struct ApiResponse<T> {
	pub code: i64,
	#[serde(default)]
	pub message: String,
	pub data: Option<T>
}

impl<T> ApiResponse<T> {
	pub fn into_data(self) -> Result<T, Error> {
		if self.code != 0 {
			return Err(Error::Api { code: self.code, message: self.message });
		}
		self.data.ok_or(Error::MissingData)
	}
}

#[cfg(test)]
mod tests {
	use serde::Deserialize;

	use super::ApiResponse;
	use crate::bilibili::Error;

	#[derive(Deserialize, Debug)]
	struct Data {
		room_id: u64
	}

	#[test]
	fn envelope_unwraps_data() {
		let mut body = br#"{"code":0,"msg":"ok","message":"ok","data":{"room_id":5440}}"#.to_vec();
		let res: ApiResponse<Data> = simd_json::from_slice(&mut body).unwrap();
		assert_eq!(res.into_data().unwrap().room_id, 5440);
	}

	#[test]
	fn envelope_reports_api_errors() {
		let mut body = br#"{"code":-352,"message":"-352","data":null}"#.to_vec();
		let res: ApiResponse<Data> = simd_json::from_slice(&mut body).unwrap();
		assert!(matches!(res.into_data(), Err(Error::Api { code: -352, .. })));
	}
}
