use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;

use super::WorkQueue;
use crate::config::QueueConfig;
use crate::error::{GenError, Result};

/// Largest `stats` body accepted from the server.
const MAX_STATS_BYTES: usize = 1 << 20;

/// Minimal producer-side beanstalkd client.
///
/// Speaks only the commands a producer needs: `use`, `put` and `stats`.
/// Depth is read from the server-wide `current-jobs-ready` counter, which
/// is what every producer feeding the same validator pool shares.
pub struct BeanstalkQueue<S: Read + Write = TcpStream> {
	stream: BufReader<S>,
	used_tube: Option<String>,
	priority: u32,
	ttr_secs: u32,
}

impl BeanstalkQueue<TcpStream> {
	/// Connects to the server described by `config`.
	pub fn connect(config: &QueueConfig) -> Result<Self> {
		let address = format!("{}:{}", config.host, config.port);
		let stream = TcpStream::connect(&address).map_err(|e| GenError::queue_io(format!("connecting to {address}"), e))?;
		stream
			.set_read_timeout(Some(Duration::from_secs(30)))
			.map_err(|e| GenError::queue_io("configuring socket", e))?;
		debug!(%address, "Connected to beanstalkd");
		Ok(Self::with_stream(stream, config.priority, config.ttr_secs))
	}
}

impl<S: Read + Write> BeanstalkQueue<S> {
	/// Wraps an already established connection.
	pub fn with_stream(stream: S, priority: u32, ttr_secs: u32) -> Self {
		Self {
			stream: BufReader::new(stream),
			used_tube: None,
			priority,
			ttr_secs,
		}
	}

	fn send(&mut self, command: &[u8]) -> Result<()> {
		let writer = self.stream.get_mut();
		writer.write_all(command).map_err(|e| GenError::queue_io("sending command", e))?;
		writer.flush().map_err(|e| GenError::queue_io("sending command", e))
	}

	fn read_reply(&mut self) -> Result<String> {
		let mut line = String::new();
		let read = self
			.stream
			.read_line(&mut line)
			.map_err(|e| GenError::queue_io("reading reply", e))?;
		if read == 0 {
			return Err(GenError::Queue("connection closed by server".to_owned()));
		}
		Ok(line.trim_end_matches(['\r', '\n']).to_owned())
	}

	fn use_tube(&mut self, tube: &str) -> Result<()> {
		if self.used_tube.as_deref() == Some(tube) {
			return Ok(());
		}
		self.send(format!("use {tube}\r\n").as_bytes())?;
		let reply = self.read_reply()?;
		if reply != format!("USING {tube}") {
			return Err(GenError::Queue(format!("unexpected reply to use: {reply}")));
		}
		self.used_tube = Some(tube.to_owned());
		Ok(())
	}
}

impl<S: Read + Write> WorkQueue for BeanstalkQueue<S> {
	fn enqueue(&mut self, topic: &str, payload: &str) -> Result<()> {
		self.use_tube(topic)?;
		let mut command = format!("put {} 0 {} {}\r\n", self.priority, self.ttr_secs, payload.len()).into_bytes();
		command.extend_from_slice(payload.as_bytes());
		command.extend_from_slice(b"\r\n");
		self.send(&command)?;

		let reply = self.read_reply()?;
		match reply.split_once(' ') {
			Some(("INSERTED", _)) => Ok(()),
			_ => Err(GenError::Queue(format!("put rejected: {reply}"))),
		}
	}

	fn depth(&mut self) -> Result<u64> {
		self.send(b"stats\r\n")?;
		let reply = self.read_reply()?;
		let size = match reply.split_once(' ') {
			Some(("OK", size)) => size
				.parse::<usize>()
				.map_err(|_| GenError::Queue(format!("malformed stats header: {reply}")))?,
			_ => return Err(GenError::Queue(format!("stats rejected: {reply}"))),
		};
		if size > MAX_STATS_BYTES {
			return Err(GenError::Queue(format!("stats body too large: {size} bytes")));
		}

		// Body is followed by a trailing CRLF
		let mut body = vec![0u8; size + 2];
		self.stream
			.read_exact(&mut body)
			.map_err(|e| GenError::queue_io("reading stats body", e))?;
		body.truncate(size);

		let body = String::from_utf8_lossy(&body);
		parse_stat(&body, "current-jobs-ready")
			.ok_or_else(|| GenError::Queue("stats without current-jobs-ready".to_owned()))
	}
}

/// Extracts an integer field from a beanstalkd YAML stats dictionary.
pub(crate) fn parse_stat(body: &str, key: &str) -> Option<u64> {
	body.lines().find_map(|line| {
		let (name, value) = line.split_once(':')?;
		if name.trim() == key { value.trim().parse().ok() } else { None }
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	/// Replays canned server replies and captures what the client sent.
	struct FakeServer {
		replies: Cursor<Vec<u8>>,
		sent: Vec<u8>,
	}

	impl FakeServer {
		fn new(replies: &str) -> Self {
			Self {
				replies: Cursor::new(replies.as_bytes().to_vec()),
				sent: Vec::new(),
			}
		}
	}

	impl Read for FakeServer {
		fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
			self.replies.read(buf)
		}
	}

	impl Write for FakeServer {
		fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
			self.sent.extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> std::io::Result<()> {
			Ok(())
		}
	}

	fn sent(queue: &BeanstalkQueue<FakeServer>) -> String {
		String::from_utf8(queue.stream.get_ref().sent.clone()).unwrap()
	}

	#[test]
	fn put_selects_tube_once() {
		let server = FakeServer::new("USING default\r\nINSERTED 1\r\nINSERTED 2\r\n");
		let mut queue = BeanstalkQueue::with_stream(server, 1024, 60);
		queue.enqueue("default", "generation/pcfg,abc").unwrap();
		queue.enqueue("default", "generation/pcfg,xyz").unwrap();
		assert_eq!(
			sent(&queue),
			"use default\r\nput 1024 0 60 19\r\ngeneration/pcfg,abc\r\nput 1024 0 60 19\r\ngeneration/pcfg,xyz\r\n"
		);
	}

	#[test]
	fn rejected_put_is_an_error() {
		let server = FakeServer::new("USING default\r\nJOB_TOO_BIG\r\n");
		let mut queue = BeanstalkQueue::with_stream(server, 1024, 60);
		assert!(matches!(queue.enqueue("default", "x"), Err(GenError::Queue(_))));
	}

	#[test]
	fn depth_reads_ready_jobs() {
		let body = "---\ncurrent-jobs-urgent: 0\ncurrent-jobs-ready: 4200\ncurrent-jobs-reserved: 3\n";
		let server = FakeServer::new(&format!("OK {}\r\n{body}\r\n", body.len()));
		let mut queue = BeanstalkQueue::with_stream(server, 1024, 60);
		assert_eq!(queue.depth().unwrap(), 4200);
		assert_eq!(sent(&queue), "stats\r\n");
	}

	#[test]
	fn oversized_stats_body_is_rejected() {
		let mut queue = BeanstalkQueue::with_stream(FakeServer::new("OK 4294967295\r\n"), 1024, 60);
		assert!(matches!(queue.depth(), Err(GenError::Queue(message)) if message.contains("too large")));
	}

	#[test]
	fn closed_connection_is_an_error() {
		let mut queue = BeanstalkQueue::with_stream(FakeServer::new(""), 1024, 60);
		assert!(queue.depth().is_err());
	}

	#[test]
	fn parse_stat_ignores_other_keys() {
		let body = "---\ncurrent-jobs-ready-ish: 9\ncurrent-jobs-ready: 12\n";
		assert_eq!(parse_stat(body, "current-jobs-ready"), Some(12));
		assert_eq!(parse_stat(body, "total-jobs"), None);
	}
}
