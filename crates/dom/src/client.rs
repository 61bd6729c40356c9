//! The page a browser loads before it can receive commands.
//!
//! It installs `window.webs.send`, which action handlers built with
//! [`action_handler`](crate::action_handler) call, opens a WebSocket to
//! [`SOCKET_PATH`] relative to the page URL, and evaluates every text message
//! as a script. A dropped socket is reopened after one second, which starts a
//! fresh session and so a fresh snapshot.

/// Path, relative to the page, of the socket carrying commands and actions.
pub const SOCKET_PATH: &str = "io";

/// Client page served to browsers.
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<script>
(function() {
	var ws;

	window.webs = {
		send: function(msg) {
			try {
				ws.send(msg);
			} catch (e) {
				alert(e);
			}
		}
	};

	function connect() {
		ws = new WebSocket(location.toString().replace(/^http/, "ws") + "io");

		ws.onclose = function() {
			ws.close();
			setTimeout(connect, 1000);
		};

		ws.onmessage = function(e) {
			eval(e.data);
		};
	}

	connect();
})();
</script>
</body>
</html>
"#;
