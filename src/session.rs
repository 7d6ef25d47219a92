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

use futures_util::{Stream, StreamExt};
use thiserror::Error;

use crate::{
	bilibili::{
		self,
		login::{fetch_buvid3, login_with_password},
		Credential, DanmakuMessage, GiftMessage, LiveEvent, LoginOutcome
	},
	config::{Config, Fatal}
};

#[derive(Debug, Error)]
pub enum StartupError {
	#[error(transparent)]
	Fatal(#[from] Fatal),
	#[error(transparent)]
	Bilibili(#[from] bilibili::Error)
}

/// Turns a login outcome into a usable credential, filling in `buvid3` from `fallback` if the login didn't set one.
pub fn resolve_login(outcome: LoginOutcome, fallback_buvid3: Option<String>) -> Result<Credential, Fatal> {
	match outcome {
		LoginOutcome::Check { url, message } => {
			tracing::debug!(%message, "login requires verification");
			Err(Fatal::SecondFactorRequired { url })
		}
		LoginOutcome::Success(mut credential) => {
			credential.ensure_buvid3(fallback_buvid3);
			Ok(credential)
		}
	}
}

/// Logs in with the configured account.
pub async fn acquire_credential(config: &Config) -> Result<Credential, StartupError> {
	let outcome = login_with_password(&config.username, &config.password, config.captcha.as_ref()).await?;
	let mut credential = resolve_login(outcome, config.buvid3.clone())?;
	if !credential.has_buvid3() {
		match fetch_buvid3().await {
			Ok(buvid3) => {
				credential.ensure_buvid3(Some(buvid3));
			}
			Err(e) => tracing::warn!("no buvid3 configured and fetching one failed, usernames may be masked: {e}")
		}
	}
	Ok(credential)
}

pub fn on_danmaku(message: &DanmakuMessage) {
	tracing::info!("{message}");
}

pub fn on_gift(gift: &GiftMessage) {
	tracing::info!("{gift}");
}

/// Dispatches events to [`on_danmaku`] and [`on_gift`] until the stream ends or yields a fatal error.
///
/// Returns the number of events handled.
pub async fn listen<S>(mut events: S) -> Result<usize, bilibili::Error>
where
	S: Stream<Item = Result<LiveEvent, bilibili::Error>> + Unpin
{
	let mut handled = 0;
	while let Some(event) = events.next().await {
		match event {
			Ok(LiveEvent::Danmaku(message)) => on_danmaku(&message),
			Ok(LiveEvent::Gift(gift)) => on_gift(&gift),
			Ok(LiveEvent::Authenticated) => tracing::info!("Connected to live room"),
			Ok(LiveEvent::Popularity(popularity)) => tracing::debug!(popularity, "heartbeat"),
			Ok(LiveEvent::Other { cmd, .. }) => {
				tracing::trace!(%cmd, "unhandled command");
				continue;
			}
			Err(e) if !e.is_fatal() => {
				tracing::warn!("skipping event: {e}");
				continue;
			}
			Err(e) => return Err(e)
		}
		handled += 1;
	}
	Ok(handled)
}

#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Utc};
	use futures_util::stream;

	use super::{listen, resolve_login};
	use crate::{
		bilibili::{Credential, DanmakuMessage, Error, LiveEvent, LoginOutcome},
		config::Fatal
	};

	#[test]
	fn second_factor_returns_no_credential() {
		let outcome = LoginOutcome::Check {
			url: "https://passport.bilibili.com/h5-app/passport/risk/verify".to_string(),
			message: String::new()
		};
		let err = resolve_login(outcome, Some("B3".to_string())).unwrap_err();
		assert!(matches!(err, Fatal::SecondFactorRequired { .. }));
		assert!(err.exit_code() < 0);
	}

	#[test]
	fn buvid3_populated_from_config() {
		let credential = resolve_login(LoginOutcome::Success(Credential::new("s", "j")), Some("B3-infoc".to_string())).unwrap();
		assert!(credential.has_buvid3());
		assert_eq!(credential.buvid3.as_deref(), Some("B3-infoc"));

		let mut with_buvid = Credential::new("s", "j");
		with_buvid.buvid3 = Some("FROM-LOGIN".to_string());
		let credential = resolve_login(LoginOutcome::Success(with_buvid), Some("B3-infoc".to_string())).unwrap();
		assert_eq!(credential.buvid3.as_deref(), Some("FROM-LOGIN"));
	}

	fn danmaku() -> Result<LiveEvent, Error> {
		Ok(LiveEvent::Danmaku(DanmakuMessage {
			uid: None,
			user: "Alice".into(),
			message: "hello".into(),
			sent_at: Utc.timestamp_millis_opt(1700000000123).unwrap()
		}))
	}

	#[tokio::test]
	async fn listen_skips_bad_events() {
		let events = stream::iter(vec![
			Ok(LiveEvent::Authenticated),
			danmaku(),
			Err(Error::MissingField { cmd: "SEND_GIFT".into(), field: "data.num" }),
			danmaku(),
		]);
		assert_eq!(listen(events).await.unwrap(), 3);
	}

	#[tokio::test]
	async fn listen_stops_on_disconnect() {
		let events = stream::iter(vec![danmaku(), Err(Error::Closed), danmaku()]);
		assert!(matches!(listen(events).await, Err(Error::Closed)));
	}
}
