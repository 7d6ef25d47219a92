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

use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::{pkcs8::DecodePublicKey, rand_core::OsRng, Pkcs1v15Encrypt, RsaPublicKey};
use serde::Deserialize;
use url::Url;

use super::{
	get_http_client,
	util::{ApiResponse, SimdJsonResponseBody},
	Credential, Error
};

const LOGIN_KEY_ENDPOINT: &str = "https://passport.bilibili.com/x/passport-login/web/key";
const LOGIN_ENDPOINT: &str = "https://passport.bilibili.com/x/passport-login/web/login";
const CAPTCHA_ENDPOINT: &str = "https://passport.bilibili.com/x/passport-login/captcha";
const FINGER_SPI_ENDPOINT: &str = "https://api.bilibili.com/x/frontend/finger/spi";

/// A solved Geetest captcha.
///
/// The web login usually demands one. It cannot be solved headlessly, so it has to come from somewhere else (a
/// browser session, or a solving service fed with [`new_captcha`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captcha {
	pub token: String,
	pub challenge: String,
	pub validate: String,
	pub seccode: String
}

/// A fresh Geetest challenge as returned by [`new_captcha`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
	pub token: String,
	pub gt: String,
	pub challenge: String
}

#[derive(Debug)]
pub enum LoginOutcome {
	Success(Credential),
	/// The platform wants interactive verification (SMS, device confirmation) before it will hand out a session.
	Check { url: String, message: String }
}

#[derive(Deserialize, Debug)]
struct LoginKey {
	hash: String,
	key: String
}

#[derive(Deserialize, Debug)]
struct CaptchaResponse {
	token: String,
	geetest: GeetestParams
}

#[derive(Deserialize, Debug)]
struct GeetestParams {
	gt: String,
	challenge: String
}

impl From<CaptchaResponse> for CaptchaChallenge {
	fn from(value: CaptchaResponse) -> Self {
		CaptchaChallenge {
			token: value.token,
			gt: value.geetest.gt,
			challenge: value.geetest.challenge
		}
	}
}

#[derive(Deserialize, Debug)]
struct FingerSpi {
	b_3: String
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct LoginData {
	#[serde(default)]
	status: i64,
	#[serde(default)]
	message: String,
	#[serde(default)]
	url: String,
	#[serde(default)]
	refresh_token: String
}

impl LoginData {
	pub(crate) fn into_outcome<'a>(self, cookies: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<LoginOutcome, Error> {
		if self.status != 0 {
			return Ok(LoginOutcome::Check { url: self.url, message: self.message });
		}
		Credential::from_cookies(cookies, Some(self.refresh_token)).map(LoginOutcome::Success)
	}
}

pub(crate) fn encrypt_password(hash: &str, public_key_pem: &str, password: &str) -> Result<String, Error> {
	let key = RsaPublicKey::from_public_key_pem(public_key_pem.trim())?;
	let encrypted = key.encrypt(&mut OsRng, Pkcs1v15Encrypt, format!("{hash}{password}").as_bytes())?;
	Ok(STANDARD.encode(encrypted))
}

/// Fetches a new Geetest challenge for the web login.
pub async fn new_captcha() -> Result<CaptchaChallenge, Error> {
	let response: ApiResponse<CaptchaResponse> = get_http_client()
		.get(Url::parse_with_params(CAPTCHA_ENDPOINT, [("source", "main_web")])?)
		.send()
		.await?
		.simd_json()
		.await?;
	response.into_data().map(CaptchaChallenge::from)
}

/// Logs in with a username (phone number, email or account name) and password.
///
/// ```no_run
/// use danmaku::bilibili::{login::login_with_password, LoginOutcome};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// match login_with_password("13800000000", "hunter2", None).await? {
/// 	LoginOutcome::Success(credential) => println!("logged in as {}", credential.uid()),
/// 	LoginOutcome::Check { url, .. } => println!("verify at {url}")
/// }
/// # Ok(())
/// # }
/// ```
pub async fn login_with_password(username: &str, password: &str, captcha: Option<&Captcha>) -> Result<LoginOutcome, Error> {
	let key: ApiResponse<LoginKey> = get_http_client().get(LOGIN_KEY_ENDPOINT).send().await?.simd_json().await?;
	let key = key.into_data()?;

	let mut form = vec![
		("username", username.to_owned()),
		("password", encrypt_password(&key.hash, &key.key, password)?),
		("keep", "0".to_owned()),
		("source", "main_web".to_owned()),
		("go_url", "https://www.bilibili.com".to_owned()),
	];
	if let Some(captcha) = captcha {
		form.extend([
			("token", captcha.token.clone()),
			("challenge", captcha.challenge.clone()),
			("validate", captcha.validate.clone()),
			("seccode", captcha.seccode.clone())
		]);
	}

	let response = get_http_client().post(LOGIN_ENDPOINT).form(&form).send().await?.error_for_status()?;
	let cookies: Vec<(String, String)> = response.cookies().map(|c| (c.name().to_owned(), c.value().to_owned())).collect();
	let mut body = response.bytes().await?.to_vec();
	let login: ApiResponse<LoginData> = simd_json::from_slice(&mut body)?;
	login.into_data()?.into_outcome(cookies.iter().map(|(name, value)| (name.as_str(), value.as_str())))
}

/// Requests a fresh `buvid3` fingerprint cookie.
pub async fn fetch_buvid3() -> Result<String, Error> {
	let response: ApiResponse<FingerSpi> = get_http_client().get(FINGER_SPI_ENDPOINT).send().await?.simd_json().await?;
	Ok(response.into_data()?.b_3)
}
