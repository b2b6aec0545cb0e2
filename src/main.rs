use clap::{Arg, Command};
use std::path::PathBuf;
use std::process::ExitCode;

use tokio_util::sync::CancellationToken;

use dirmirror::logging::{self, *};
use dirmirror::{ConfigOverrides, Mirror, MirrorConfig, MirrorError};

fn cli() -> Command {
	Command::new("dirmirror")
		.version(env!("CARGO_PKG_VERSION"))
		.about("One-way continuous directory mirror")
		.arg(
			Arg::new("src")
				.long("src")
				.value_name("DIR")
				.value_parser(clap::value_parser!(PathBuf))
				.help("Path with canonical files [default: /src]"),
		)
		.arg(
			Arg::new("dest")
				.long("dest")
				.value_name("DIR")
				.value_parser(clap::value_parser!(PathBuf))
				.help("Path to sync data to [default: /dest]"),
		)
		.arg(
			Arg::new("ignore")
				.long("ignore")
				.value_name("FILE")
				.value_parser(clap::value_parser!(PathBuf))
				.help("File with patterns to ignore"),
		)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.value_parser(clap::value_parser!(PathBuf))
				.help("TOML config file"),
		)
		.arg(
			Arg::new("log-level")
				.long("log-level")
				.value_name("LEVEL")
				.help("Default log level when RUST_LOG is unset [default: info]"),
		)
}

fn load_config(matches: &clap::ArgMatches) -> Result<MirrorConfig, MirrorError> {
	let base = match matches.get_one::<PathBuf>("config") {
		Some(path) => MirrorConfig::from_toml_file(path)?,
		None => MirrorConfig::default(),
	};

	let flags = ConfigOverrides {
		source: matches.get_one::<PathBuf>("src").cloned(),
		dest: matches.get_one::<PathBuf>("dest").cloned(),
		ignore_file: matches.get_one::<PathBuf>("ignore").cloned(),
		log_level: matches.get_one::<String>("log-level").cloned(),
	};

	Ok(base.apply(ConfigOverrides::from_env()).apply(flags))
}

/// Cancel `token` on SIGINT or SIGTERM
///
/// Handlers are registered before returning so no signal delivered after
/// this call can terminate the process outright.
fn setup_signal_handlers(token: CancellationToken) {
	use tokio::signal::unix::{signal, SignalKind};

	let mut sigterm = match signal(SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}. Process will not handle SIGTERM gracefully.", e);
			return;
		}
	};
	let mut sigint = match signal(SignalKind::interrupt()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGINT handler: {}. Process will not handle SIGINT gracefully.", e);
			return;
		}
	};

	tokio::spawn(async move {
		tokio::select! {
			_ = sigterm.recv() => debug!("Received SIGTERM, shutting down..."),
			_ = sigint.recv() => debug!("Received SIGINT, shutting down..."),
		}
		token.cancel();
	});
}

async fn run(matches: clap::ArgMatches) -> Result<(), MirrorError> {
	let config = load_config(&matches)?;
	logging::init_tracing(&config.log_level);

	let mirror = Mirror::from_config(&config)?;
	info!("Mirroring {} -> {}", mirror.roots().source().display(), mirror.roots().dest().display());

	let cancel = CancellationToken::new();
	setup_signal_handlers(cancel.clone());

	mirror.run(&cancel).await
}

#[tokio::main]
async fn main() -> ExitCode {
	let matches = cli().get_matches();

	match run(matches).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			// Config errors can happen before the subscriber exists
			logging::init_tracing("info");
			error!("{}", e);
			ExitCode::FAILURE
		}
	}
}


// vim: ts=4
