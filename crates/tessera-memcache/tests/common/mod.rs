//! In-process fake memcached for integration tests.
//!
//! Implements just enough of the text protocol for the backend: `get`,
//! `set`, `delete`, `version` and `lru_crawler metadump all`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Behaviour switches for the fake server.
#[derive(Debug, Clone, Default)]
pub struct FakeOptions {
    /// Answer `lru_crawler metadump all` (otherwise reply `ERROR`).
    pub metadump: bool,
    /// Delay before every reply.
    pub reply_delay: Option<Duration>,
    /// Answer every `set` with this line (without CRLF) and store nothing.
    pub set_reply: Option<String>,
}

#[derive(Debug, Clone)]
struct Item {
    value: Vec<u8>,
    exptime: u64,
    deadline: Instant,
}

type Items = Arc<Mutex<HashMap<String, Item>>>;

/// A fake memcached listening on localhost.
pub struct FakeMemcached {
    pub addr: SocketAddr,
    items: Items,
    _handle: JoinHandle<()>,
}

impl FakeMemcached {
    /// Start with metadump support and no delay.
    pub async fn start() -> Result<Self> {
        Self::start_with(FakeOptions {
            metadump: true,
            ..FakeOptions::default()
        })
        .await
    }

    pub async fn start_with(options: FakeOptions) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let items: Items = Arc::new(Mutex::new(HashMap::new()));

        let server_items = Arc::clone(&items);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let items = Arc::clone(&server_items);
                let options = options.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, items, options).await;
                });
            }
        });

        Ok(Self {
            addr,
            items,
            _handle: handle,
        })
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Whether a live item is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.items
            .lock()
            .get(key)
            .is_some_and(|item| item.deadline > Instant::now())
    }

    /// The raw exptime field the client sent for `key`.
    pub fn exptime_of(&self, key: &str) -> Option<u64> {
        self.items.lock().get(key).map(|item| item.exptime)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }
}

async fn serve(stream: TcpStream, items: Items, options: FakeOptions) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let parts: Vec<&str> = line.trim_end().split(' ').collect();

        let reply = match parts.as_slice() {
            ["get", key] => {
                let item = items
                    .lock()
                    .get(*key)
                    .filter(|item| item.deadline > Instant::now())
                    .cloned();
                match item {
                    Some(item) => {
                        let mut out =
                            format!("VALUE {} 0 {}\r\n", key, item.value.len()).into_bytes();
                        out.extend_from_slice(&item.value);
                        out.extend_from_slice(b"\r\nEND\r\n");
                        out
                    }
                    None => b"END\r\n".to_vec(),
                }
            }
            ["set", key, _flags, exptime, len] => {
                let len: usize = len.parse()?;
                let exptime: u64 = exptime.parse()?;
                let mut block = vec![0u8; len + 2];
                reader.read_exact(&mut block).await?;
                block.truncate(len);
                if let Some(ref reply) = options.set_reply {
                    format!("{}\r\n", reply).into_bytes()
                } else {
                    let now = Instant::now();
                    let deadline = now
                        .checked_add(Duration::from_secs(exptime))
                        .unwrap_or(now + Duration::from_secs(60 * 60 * 24 * 365));
                    items.lock().insert(
                        key.to_string(),
                        Item {
                            value: block,
                            exptime,
                            deadline,
                        },
                    );
                    b"STORED\r\n".to_vec()
                }
            }
            ["delete", key] => {
                let removed = items.lock().remove(*key);
                match removed {
                    Some(_) => b"DELETED\r\n".to_vec(),
                    None => b"NOT_FOUND\r\n".to_vec(),
                }
            }
            ["version"] => b"VERSION 1.6.0-fake\r\n".to_vec(),
            ["lru_crawler", "metadump", "all"] if options.metadump => {
                let mut out = String::new();
                let snapshot: Vec<(String, usize)> = items
                    .lock()
                    .iter()
                    .map(|(key, item)| (key.clone(), item.value.len()))
                    .collect();
                for (key, size) in snapshot {
                    out.push_str(&format!(
                        "key={} exp=-1 la=0 cas=0 fetch=no cls=1 size={}\r\n",
                        urlencoding::encode(&key),
                        size
                    ));
                }
                out.push_str("END\r\n");
                out.into_bytes()
            }
            _ => b"ERROR\r\n".to_vec(),
        };

        if let Some(delay) = options.reply_delay {
            tokio::time::sleep(delay).await;
        }
        write.write_all(&reply).await?;
    }
}
