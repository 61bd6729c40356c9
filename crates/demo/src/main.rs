//! Counter page demo.
//!
//! With `--listen`, serves the counter page to any number of browsers, each
//! on its own WebSocket session. Otherwise streams one session to stdout, one
//! JSON-quoted command per line, and reads action messages such as
//! `{"Act":"increment-count"}` from stdin, one per line.

mod page;
mod stdio;
mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use webs_dom::{DocumentConfig, DocumentHandle, SessionConfig, serve_session};

const DEFAULT_STYLE: &str = "body { font-family: sans-serif; } .count { font-weight: bold; margin: 0 1em; }";

/// Demo command line arguments.
#[derive(Parser, Debug)]
#[command(name = "webs-demo")]
#[command(about = "Stream a live counter page as script commands to browsers or over stdio")]
struct Args {
	/// Serve browsers on this address instead of using stdio
	#[arg(long, value_name = "ADDR")]
	listen: Option<SocketAddr>,

	/// Page title
	#[arg(long, default_value = "test")]
	title: String,

	/// Stylesheet file installed on the page
	#[arg(long, value_name = "FILE")]
	style: Option<PathBuf>,

	/// Clock update interval in milliseconds
	#[arg(long, default_value_t = 1000)]
	tick_ms: u64,

	/// Deadline for writing one command, in milliseconds
	#[arg(long, default_value_t = 1000)]
	timeout_ms: u64,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Stdout may carry the command stream, so logs go to stderr.
	let subscriber = tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
		.finish();
	tracing::subscriber::set_global_default(subscriber)?;

	let style = match &args.style {
		Some(path) => std::fs::read_to_string(path)?,
		None => DEFAULT_STYLE.to_owned(),
	};

	let doc = DocumentHandle::spawn(DocumentConfig::default().style(style));
	let page = page::CounterPage::build(&doc, &args.title).await?;
	info!(title = %args.title, "page built");

	let clock = tokio::spawn(page::run_clock(doc.clone(), page.clock, Duration::from_millis(args.tick_ms)));
	let (actions_tx, actions_rx) = mpsc::channel(64);
	let actions = tokio::spawn(page::run_actions(doc.clone(), page, actions_rx));

	let config = SessionConfig {
		eval_timeout: Duration::from_millis(args.timeout_ms),
	};
	match args.listen {
		Some(addr) => {
			let listener = TcpListener::bind(addr).await?;
			info!(addr = %listener.local_addr()?, "serving browsers");
			ws::serve(listener, doc.clone(), actions_tx, config).await?;
		}
		None => {
			let reader = tokio::spawn(stdio::forward_actions(tokio::io::stdin(), actions_tx));
			let end = serve_session(&doc, &mut stdio::LineSink::new(tokio::io::stdout()), config).await?;
			info!(?end, "session ended");
			reader.abort();
		}
	}

	clock.abort();
	actions.abort();
	doc.shutdown().await;
	Ok(())
}
