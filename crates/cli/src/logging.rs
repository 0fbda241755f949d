use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = errors only; facade reports are already printed as the command result
	// 1 (-v) = reports and session lifecycle, transport noise at warn
	// 2+ (-vv) = debug for everything, including wire frames
	let filter = match verbosity {
		0 => "error,autobahn_client::reporter=off",
		1 => "info,ab_runtime=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(verbosity > 1)
		.compact()
		.init();
}
