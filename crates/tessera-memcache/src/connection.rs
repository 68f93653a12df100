//! A single connection speaking the memcached text protocol.
//!
//! Commands are `\r\n` terminated lines; values travel as a length-prefixed
//! data block followed by `\r\n`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tessera_session::{BackendError, BackendResult};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::trace;

/// Longest key memcached accepts.
pub const MAX_KEY_LEN: usize = 250;

/// Check a key against memcached's rules: 1..=250 bytes, no whitespace or
/// control characters.
pub fn validate_key(key: &str) -> BackendResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(BackendError::Rejected(format!(
            "key length {} outside 1..={}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    if key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(BackendError::Rejected(format!(
            "key '{}' contains whitespace or control characters",
            key.escape_debug()
        )));
    }
    Ok(())
}

/// An open connection to a memcached server.
pub struct Connection {
    stream: BufStream<TcpStream>,
    /// Cleared once the server answers `CLIENT_ERROR`: it may still be
    /// reading the rejected command's data, so the stream is out of step.
    reusable: bool,
}

impl Connection {
    /// Open a TCP connection to `address`.
    pub async fn connect(address: &str, timeout: Duration) -> BackendResult<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| BackendError::Timeout(timeout))?
            .map_err(|e| BackendError::Unavailable(format!("connect to {}: {}", address, e)))?;
        stream.set_nodelay(true)?;

        trace!(address = %address, "Connected to memcached");
        Ok(Self {
            stream: BufStream::new(stream),
            reusable: true,
        })
    }

    /// Whether the connection can serve another command.
    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    /// `get <key>`
    pub async fn get(&mut self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        self.send(format!("get {}\r\n", key).as_bytes(), None).await?;

        let line = self.read_line().await?;
        if line == "END" {
            return Ok(None);
        }

        let Some(header) = line.strip_prefix("VALUE ") else {
            return Err(self.reply_error(&line));
        };

        // VALUE <key> <flags> <bytes> [<cas>]
        let len: usize = header
            .split_whitespace()
            .nth(2)
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| BackendError::Protocol(format!("malformed VALUE line: {}", line)))?;

        let mut block = vec![0u8; len + 2];
        self.stream.read_exact(&mut block).await?;
        if !block.ends_with(b"\r\n") {
            return Err(BackendError::Protocol("data block not terminated by CRLF".into()));
        }
        block.truncate(len);

        let end = self.read_line().await?;
        if end != "END" {
            return Err(BackendError::Protocol(format!("expected END, got: {}", end)));
        }

        Ok(Some(block))
    }

    /// `set <key> 0 <exptime> <bytes>`
    pub async fn set(&mut self, key: &str, value: &[u8], exptime: u64) -> BackendResult<()> {
        let header = format!("set {} 0 {} {}\r\n", key, exptime, value.len());
        self.send(header.as_bytes(), Some(value)).await?;

        let line = self.read_line().await?;
        match line.as_str() {
            "STORED" => Ok(()),
            _ => Err(self.reply_error(&line)),
        }
    }

    /// `delete <key>`; a missing key is not an error.
    pub async fn delete(&mut self, key: &str) -> BackendResult<()> {
        self.send(format!("delete {}\r\n", key).as_bytes(), None).await?;

        let line = self.read_line().await?;
        match line.as_str() {
            "DELETED" | "NOT_FOUND" => Ok(()),
            _ => Err(self.reply_error(&line)),
        }
    }

    /// `version`
    pub async fn version(&mut self) -> BackendResult<String> {
        self.send(b"version\r\n", None).await?;

        let line = self.read_line().await?;
        match line.strip_prefix("VERSION ") {
            Some(version) => Ok(version.to_string()),
            None => Err(self.reply_error(&line)),
        }
    }

    /// `lru_crawler metadump all`
    ///
    /// Returns `None` when the server does not support or refuses the
    /// crawler (older servers, crawler busy or disabled).
    pub async fn metadump(&mut self) -> BackendResult<Option<Vec<String>>> {
        self.send(b"lru_crawler metadump all\r\n", None).await?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut keys = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line == "END" {
                return Ok(Some(keys));
            }
            if line == "ERROR" || line.starts_with("BUSY") || line.starts_with("CLIENT_ERROR") {
                trace!(reply = %line, "Metadump unsupported");
                return Ok(None);
            }
            if let Some(key) = parse_metadump_line(&line, now) {
                keys.push(key);
            }
        }
    }

    fn reply_error(&mut self, line: &str) -> BackendError {
        if line.starts_with("CLIENT_ERROR") {
            self.reusable = false;
        }
        reply_error(line)
    }

    async fn send(&mut self, header: &[u8], data: Option<&[u8]>) -> BackendResult<()> {
        self.stream.write_all(header).await?;
        if let Some(data) = data {
            self.stream.write_all(data).await?;
            self.stream.write_all(b"\r\n").await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> BackendResult<String> {
        let mut line = String::new();
        let n = self.stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(BackendError::Unavailable("connection closed by server".into()));
        }
        if !line.ends_with("\r\n") {
            return Err(BackendError::Protocol("reply line not terminated by CRLF".into()));
        }
        line.truncate(line.len() - 2);
        Ok(line)
    }
}

/// Extract the key from a metadump line, skipping entries already expired.
///
/// Lines look like `key=<url-encoded> exp=<unix ts or -1> la=<ts> ...`.
fn parse_metadump_line(line: &str, now: i64) -> Option<String> {
    let mut key = None;
    let mut exp: i64 = -1;

    for field in line.split_whitespace() {
        if let Some(value) = field.strip_prefix("key=") {
            key = urlencoding::decode(value).ok().map(|k| k.into_owned());
        } else if let Some(value) = field.strip_prefix("exp=") {
            exp = value.parse().unwrap_or(-1);
        }
    }

    if exp != -1 && exp <= now {
        return None;
    }
    key
}

/// Turn an unexpected reply line into an error.
fn reply_error(line: &str) -> BackendError {
    if let Some(msg) = line.strip_prefix("SERVER_ERROR ") {
        BackendError::Rejected(format!("server error: {}", msg))
    } else if let Some(msg) = line.strip_prefix("CLIENT_ERROR ") {
        BackendError::Rejected(format!("client error: {}", msg))
    } else if line == "ERROR" {
        BackendError::Protocol("server did not recognise command".into())
    } else {
        BackendError::Protocol(format!("unexpected reply: {}", line))
    }
}
