//! Browser transport.
//!
//! Every connection carries one HTTP request. A WebSocket upgrade on
//! `/io` becomes a session streaming the document to that browser, with the
//! browser's action messages flowing back; a `GET` anywhere else receives
//! the client page.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};
use webs_dom::client::{INDEX_HTML, SOCKET_PATH};
use webs_dom::{ActionMessage, Command, CommandSink, DocumentHandle, SessionConfig, SinkError, decode_action, serve_session};

const MAX_HEAD_LINES: usize = 64;

type Socket = WebSocketStream<BufReader<TcpStream>>;

/// Accepts browsers on `listener` until accepting fails.
pub async fn serve(listener: TcpListener, doc: DocumentHandle, actions: mpsc::Sender<ActionMessage>, config: SessionConfig) -> io::Result<()> {
	loop {
		let (stream, peer) = listener.accept().await?;
		let doc = doc.clone();
		let actions = actions.clone();
		tokio::spawn(async move {
			if let Err(err) = handle_connection(stream, peer, doc, actions, config).await {
				debug!(%peer, error = %err, "connection failed");
			}
		});
	}
}

async fn handle_connection(
	stream: TcpStream,
	peer: SocketAddr,
	doc: DocumentHandle,
	actions: mpsc::Sender<ActionMessage>,
	config: SessionConfig,
) -> io::Result<()> {
	let mut stream = BufReader::new(stream);
	let head = read_head(&mut stream).await?;
	match head.route() {
		Route::Socket { key } => {
			let accept = derive_accept_key(key.as_bytes());
			let response = format!(
				"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept}\r\n\r\n"
			);
			stream.write_all(response.as_bytes()).await?;
			stream.flush().await?;
			let socket = WebSocketStream::from_raw_socket(stream, Role::Server, None).await;
			run_socket(socket, peer, doc, actions, config).await;
			Ok(())
		}
		Route::Index => respond(&mut stream, "200 OK", &[("Cache-Control", "no-cache"), ("Content-Type", "text/html; charset=utf-8")], INDEX_HTML).await,
		Route::NotAllowed => respond(&mut stream, "405 Method Not Allowed", &[("Allow", "GET")], "").await,
		Route::BadUpgrade => respond(&mut stream, "400 Bad Request", &[], "").await,
	}
}

async fn run_socket(socket: Socket, peer: SocketAddr, doc: DocumentHandle, actions: mpsc::Sender<ActionMessage>, config: SessionConfig) {
	let (write, read) = socket.split();
	let mut sink = SocketSink { write };
	info!(%peer, "browser connected");
	tokio::select! {
		end = serve_session(&doc, &mut sink, config) => match end {
			Ok(end) => debug!(%peer, ?end, "session ended"),
			Err(err) => warn!(%peer, error = %err, "session failed"),
		},
		() = forward_socket_actions(read, actions) => debug!(%peer, "browser went away"),
	}
	let _ = sink.write.close().await;
}

/// Outbound half of one browser socket.
struct SocketSink {
	write: SplitSink<Socket, Message>,
}

#[async_trait]
impl CommandSink for SocketSink {
	async fn eval(&mut self, command: &Command) -> Result<(), SinkError> {
		self.write.send(Message::Text(command.as_str().to_owned())).await.map_err(sink_error)
	}
}

fn sink_error(err: WsError) -> SinkError {
	match err {
		WsError::ConnectionClosed | WsError::AlreadyClosed => SinkError::Closed,
		WsError::Io(err) => SinkError::Io(err),
		other => SinkError::Io(io::Error::other(other)),
	}
}

async fn forward_socket_actions(mut read: SplitStream<Socket>, actions: mpsc::Sender<ActionMessage>) {
	while let Some(message) = read.next().await {
		let data = match message {
			Ok(Message::Text(text)) => text.into_bytes(),
			Ok(Message::Binary(data)) => data,
			Ok(Message::Close(_)) => break,
			Ok(_) => continue,
			Err(err) => {
				debug!(error = %err, "socket read failed");
				break;
			}
		};
		match decode_action(&data) {
			Ok(action) => {
				if actions.send(action).await.is_err() {
					break;
				}
			}
			Err(err) => warn!(error = %err, "ignoring action"),
		}
	}
}

async fn respond(stream: &mut BufReader<TcpStream>, status: &str, headers: &[(&str, &str)], body: &str) -> io::Result<()> {
	let mut out = format!("HTTP/1.1 {status}\r\n");
	for (name, value) in headers {
		out.push_str(&format!("{name}: {value}\r\n"));
	}
	out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()));
	out.push_str(body);
	stream.write_all(out.as_bytes()).await?;
	stream.shutdown().await
}

/// Request line and headers of one HTTP request. Header names are lowercased.
#[derive(Debug)]
struct RequestHead {
	method: String,
	path: String,
	headers: HashMap<String, String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
	Socket { key: String },
	Index,
	NotAllowed,
	BadUpgrade,
}

impl RequestHead {
	fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).map(String::as_str)
	}

	fn route(&self) -> Route {
		let path = self.path.split('?').next().unwrap_or_default();
		if path.strip_prefix('/') == Some(SOCKET_PATH) {
			let upgrade = self.header("upgrade").is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
			return match self.header("sec-websocket-key") {
				Some(key) if upgrade && self.method == "GET" => Route::Socket { key: key.to_owned() },
				_ => Route::BadUpgrade,
			};
		}
		if self.method == "GET" { Route::Index } else { Route::NotAllowed }
	}
}

async fn read_head<R: AsyncBufRead + Unpin>(input: &mut R) -> io::Result<RequestHead> {
	let mut line = String::new();
	input.read_line(&mut line).await?;
	let mut parts = line.split_whitespace();
	let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
		return Err(io::Error::new(io::ErrorKind::InvalidData, "malformed request line"));
	};
	let mut head = RequestHead {
		method: method.to_owned(),
		path: path.to_owned(),
		headers: HashMap::new(),
	};

	for _ in 0..MAX_HEAD_LINES {
		line.clear();
		if input.read_line(&mut line).await? == 0 {
			return Err(io::ErrorKind::UnexpectedEof.into());
		}
		let line = line.trim_end();
		if line.is_empty() {
			return Ok(head);
		}
		if let Some((name, value)) = line.split_once(':') {
			head.headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
		}
	}
	Err(io::Error::new(io::ErrorKind::InvalidData, "request head too long"))
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use pretty_assertions::assert_eq;
	use tokio::io::AsyncReadExt;
	use tokio_tungstenite::MaybeTlsStream;
	use webs_dom::DocumentConfig;

	use super::*;

	async fn head(raw: &str) -> RequestHead {
		read_head(&mut raw.as_bytes()).await.unwrap()
	}

	#[tokio::test(flavor = "current_thread")]
	async fn routes_requests() {
		let upgrade = head("GET /io HTTP/1.1\r\nHost: x\r\nUpgrade: WebSocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: abc==\r\n\r\n").await;
		assert_eq!(upgrade.route(), Route::Socket { key: "abc==".to_owned() });

		assert_eq!(head("GET /io HTTP/1.1\r\nHost: x\r\n\r\n").await.route(), Route::BadUpgrade);
		assert_eq!(head("GET /?v=2 HTTP/1.1\r\n\r\n").await.route(), Route::Index);
		assert_eq!(head("POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await.route(), Route::NotAllowed);

		assert!(read_head(&mut &b"GET / HTTP/1.1\r\nHost: x\r\n"[..]).await.is_err());
		assert!(read_head(&mut &b"\r\n"[..]).await.is_err());
	}

	async fn start() -> (SocketAddr, DocumentHandle, mpsc::Receiver<ActionMessage>) {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let doc = DocumentHandle::spawn(DocumentConfig::default());
		let (tx, rx) = mpsc::channel(8);
		tokio::spawn(serve(listener, doc.clone(), tx, SessionConfig::default()));
		(addr, doc, rx)
	}

	#[tokio::test(flavor = "current_thread")]
	async fn serves_client_page() {
		let (addr, _doc, _actions) = start().await;
		let mut stream = TcpStream::connect(addr).await.unwrap();
		stream.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
		let mut response = String::new();
		stream.read_to_string(&mut response).await.unwrap();

		assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
		assert!(response.contains("Cache-Control: no-cache\r\n"));
		assert!(response.ends_with(INDEX_HTML));
	}

	#[tokio::test(flavor = "current_thread")]
	async fn rejects_other_methods() {
		let (addr, _doc, _actions) = start().await;
		let mut stream = TcpStream::connect(addr).await.unwrap();
		stream.write_all(b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n").await.unwrap();
		let mut response = String::new();
		stream.read_to_string(&mut response).await.unwrap();

		assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
		assert!(response.contains("Allow: GET\r\n"));
	}

	async fn next_text(socket: &mut WebSocketStream<MaybeTlsStream<TcpStream>>) -> String {
		match tokio::time::timeout(Duration::from_secs(1), socket.next()).await.expect("message within 1s") {
			Some(Ok(Message::Text(text))) => text,
			other => panic!("unexpected frame {other:?}"),
		}
	}

	#[tokio::test(flavor = "current_thread")]
	async fn socket_streams_document_and_returns_actions() {
		let (addr, doc, mut actions) = start().await;
		let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/io")).await.unwrap();

		let snapshot = next_text(&mut socket).await;
		assert!(snapshot.starts_with("document.getElementsByTagName"));

		doc.set_title("live").await.unwrap();
		assert_eq!(next_text(&mut socket).await, r#"document.title = "live";"#);

		socket.send(Message::Text(r#"{"Act":"increment-count"}"#.to_owned())).await.unwrap();
		let action = tokio::time::timeout(Duration::from_secs(1), actions.recv()).await.unwrap();
		assert_eq!(action.map(|a| a.act), Some("increment-count".to_owned()));
	}
}
