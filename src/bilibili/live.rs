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

use std::{
	collections::VecDeque,
	pin::Pin,
	task::{Context, Poll},
	time::Duration
};

use bytes::Bytes;
use futures_util::{stream::SplitStream, Sink, SinkExt, Stream, StreamExt};
use pin_project_lite::pin_project;
use simd_json::base::{ValueAsObject, ValueAsScalar};
use tokio::{net::TcpStream, task::JoinHandle};
use tokio_tungstenite::{
	connect_async,
	tungstenite::{self, Message},
	MaybeTlsStream, WebSocketStream
};

use super::{
	event::{self, LiveEvent},
	packet::{AuthBody, Operation, Packet},
	Error, RoomContext
};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Aborts the heartbeat task once the event stream is dropped.
#[derive(Debug)]
struct HeartbeatGuard(JoinHandle<()>);

impl Drop for HeartbeatGuard {
	fn drop(&mut self) {
		self.0.abort();
	}
}

pin_project! {
	/// A connection to a Bilibili live room's danmaku server.
	///
	/// A background task keeps the connection alive with heartbeats for as long as this value exists; poll the stream
	/// to receive [`LiveEvent`]s. Per-event errors ([`Error::is_fatal`] returns `false`) can be skipped. The stream
	/// yields [`Error::Closed`] once and then ends when the server hangs up; there is no automatic reconnection.
	#[derive(Debug)]
	pub struct LiveDanmaku<S> {
		#[pin]
		incoming: S,
		pending: VecDeque<Result<Packet, Error>>,
		room_id: u64,
		finished: bool,
		_heartbeat: HeartbeatGuard
	}
}

pub type LiveDanmakuStream = LiveDanmaku<SplitStream<Socket>>;

impl LiveDanmakuStream {
	/// Connects to the room described by `context`, trying each danmaku server in turn.
	///
	/// ```no_run
	/// use danmaku::bilibili::{Credential, LiveDanmaku, LiveEvent, RoomContext};
	/// use futures_util::StreamExt;
	///
	/// # #[tokio::main]
	/// # async fn main() -> anyhow::Result<()> {
	/// let credential = Credential::default();
	/// let context = RoomContext::new(55, &credential, None).await?;
	/// let mut stream = LiveDanmaku::connect(&context).await?;
	/// while let Some(event) = stream.next().await {
	/// 	if let Ok(LiveEvent::Danmaku(message)) = event {
	/// 		println!("{message}");
	/// 	}
	/// }
	/// # Ok(())
	/// # }
	/// ```
	pub async fn connect(context: &RoomContext) -> Result<Self, Error> {
		let mut last_error = None;
		for url in context.websocket_urls() {
			match connect_async(url.as_str()).await {
				Ok((socket, _)) => {
					tracing::debug!(%url, room_id = context.room_id, "connected to danmaku server");
					let (outgoing, incoming) = socket.split();
					return LiveDanmaku::handshake(incoming, outgoing, context).await;
				}
				Err(e) => {
					tracing::warn!(%url, "failed to connect to danmaku server: {e}");
					last_error = Some(e);
				}
			}
		}
		Err(last_error.map(Error::from).unwrap_or(Error::Closed))
	}
}

impl<S> LiveDanmaku<S>
where
	S: Stream<Item = Result<Message, tungstenite::Error>>
{
	/// Sends the auth packet over `outgoing`, then hands it off to the heartbeat task.
	pub(crate) async fn handshake<W>(incoming: S, mut outgoing: W, context: &RoomContext) -> Result<Self, Error>
	where
		W: Sink<Message, Error = tungstenite::Error> + Unpin + Send + 'static
	{
		let auth = Packet::auth(&AuthBody {
			uid: context.credential.uid(),
			roomid: context.room_id,
			protover: 2,
			buvid: context.credential.buvid3.as_deref().unwrap_or_default(),
			platform: "web",
			kind: 2,
			key: &context.token
		})?;
		outgoing.send(Message::binary(auth.encode())).await?;

		Ok(Self {
			incoming,
			pending: VecDeque::new(),
			room_id: context.room_id,
			finished: false,
			_heartbeat: HeartbeatGuard(tokio::spawn(heartbeat(outgoing)))
		})
	}

	pub fn room_id(&self) -> u64 {
		self.room_id
	}
}

async fn heartbeat<W>(mut outgoing: W)
where
	W: Sink<Message, Error = tungstenite::Error> + Unpin
{
	let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
	loop {
		interval.tick().await;
		if let Err(e) = outgoing.send(Message::binary(Packet::heartbeat().encode())).await {
			tracing::warn!("failed to send heartbeat: {e}");
			break;
		}
	}
}

/// Reads the `code` from an auth reply. Anything unreadable counts as a rejection (`-1`).
fn auth_code(body: &[u8]) -> i64 {
	let mut body = body.to_vec();
	match simd_json::to_owned_value(&mut body) {
		Ok(value) => value.as_object().and_then(|c| c.get("code")).and_then(|c| c.as_i64()).unwrap_or(-1),
		Err(e) => {
			tracing::debug!("unreadable auth reply: {e}");
			-1
		}
	}
}

impl<S> Stream for LiveDanmaku<S>
where
	S: Stream<Item = Result<Message, tungstenite::Error>>
{
	type Item = Result<LiveEvent, Error>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let mut this = self.project();
		loop {
			if *this.finished {
				return Poll::Ready(None);
			}

			if let Some(packet) = this.pending.pop_front() {
				let packet = match packet {
					Ok(packet) => packet,
					Err(e) => return Poll::Ready(Some(Err(e)))
				};
				match packet.operation {
					Operation::Message => return Poll::Ready(Some(event::parse_command(&packet.body))),
					Operation::HeartbeatReply => {
						if let Some(popularity) = packet.popularity() {
							return Poll::Ready(Some(Ok(LiveEvent::Popularity(popularity))));
						}
					}
					Operation::AuthReply => {
						return Poll::Ready(Some(match auth_code(&packet.body) {
							0 => Ok(LiveEvent::Authenticated),
							code => {
								*this.finished = true;
								Err(Error::AuthRejected { room_id: *this.room_id, code })
							}
						}));
					}
					operation => tracing::trace!(?operation, "ignoring packet")
				}
				continue;
			}

			match futures_util::ready!(this.incoming.as_mut().poll_next(cx)) {
				Some(Ok(Message::Binary(data))) => this.pending.extend(Packet::decode_all(Bytes::from(data))),
				Some(Ok(Message::Close(frame))) => {
					tracing::debug!(?frame, "danmaku server closed the connection");
					*this.finished = true;
					return Poll::Ready(Some(Err(Error::Closed)));
				}
				Some(Ok(_)) => {}
				Some(Err(e)) => {
					*this.finished = true;
					return Poll::Ready(Some(Err(e.into())));
				}
				None => {
					*this.finished = true;
					return Poll::Ready(Some(Err(Error::Closed)));
				}
			}
		}
	}
}
