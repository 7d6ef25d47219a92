use std::{env::args, process};

use danmaku::{
	bilibili::{user, LiveDanmaku, RoomContext},
	session::{self, StartupError},
	Config, Fatal
};
use tracing_subscriber::EnvFilter;

fn exit_fatal(fatal: Fatal) -> ! {
	tracing::error!("{fatal} Exiting...");
	process::exit(fatal.exit_code());
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	dotenv::dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.init();

	tracing::info!("Danmaku Backend starting...");
	let config = match Config::from_env().and_then(|c| c.with_room_id(args().nth(1).as_deref())) {
		Ok(config) => config,
		Err(fatal) => exit_fatal(fatal)
	};

	tracing::info!("Trying to login");
	let credential = match session::acquire_credential(&config).await {
		Ok(credential) => credential,
		Err(StartupError::Fatal(fatal)) => exit_fatal(fatal),
		Err(StartupError::Bilibili(e)) => return Err(e.into())
	};
	let me = user::get_self_info(&credential).await?;
	tracing::info!("Logged in: Welcome {}", me.name);

	let context = RoomContext::new(config.room_id, &credential, me.wbi_keys.as_ref()).await?;
	tracing::info!(room_id = context.room_id(), live = context.is_live(), "Joining {}", context.url());
	let events = LiveDanmaku::connect(&context).await?;
	session::listen(events).await?;
	Ok(())
}
