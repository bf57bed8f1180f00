//! In-process fake server for connection and pipeline tests.

use crate::config::ConnectionConfig;
use crate::resp::{parse, ParseResult, Reply};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

type Handler = Box<dyn FnMut(&[Vec<u8>]) -> Option<Vec<u8>> + Send>;

/// Loopback server answering each received command through a handler.
///
/// Connections are served one after another on a background thread. A
/// handler returning `None` closes the current connection; an empty reply
/// writes nothing.
pub struct FakeServer {
    port: u16,
    received: Arc<Mutex<Vec<Vec<Vec<u8>>>>>,
    connections: Arc<AtomicUsize>,
}

impl FakeServer {
    /// Serve every connection with the same stateless handler.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&[Vec<u8>]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        Self::spawn(move || {
            let handler = Arc::clone(&handler);
            Box::new(move |args: &[Vec<u8>]| handler(args))
        })
    }

    /// A tiny keyspace speaking enough commands for client tests. With a
    /// password, every connection must `AUTH` before anything else.
    pub fn redis(password: Option<&str>) -> Self {
        let password = password.map(|p| p.as_bytes().to_vec());
        let store = Arc::new(Mutex::new(HashMap::<Vec<u8>, Vec<u8>>::new()));

        Self::spawn(move || {
            let mut session = Session {
                password: password.clone(),
                authed: password.is_none(),
                store: Arc::clone(&store),
            };
            Box::new(move |args: &[Vec<u8>]| Some(session.handle(args)))
        })
    }

    fn spawn<F>(mut factory: F) -> Self
    where
        F: FnMut() -> Handler + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let log = Arc::clone(&received);
        let count = Arc::clone(&connections);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                count.fetch_add(1, Ordering::SeqCst);
                serve(stream, factory(), &log);
            }
        });

        Self {
            port,
            received,
            connections,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Client configuration pointing at this server.
    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::tcp("127.0.0.1", self.port).socket_timeout(Duration::from_secs(2))
    }

    /// Every command received so far, across all connections.
    pub fn received(&self) -> Vec<Vec<Vec<u8>>> {
        self.received.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

fn serve(mut stream: TcpStream, mut handler: Handler, log: &Mutex<Vec<Vec<Vec<u8>>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 16 * 1024];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }

        loop {
            let (args, consumed) = match parse(&buf) {
                ParseResult::Complete(reply, consumed) => (command_args(reply), consumed),
                ParseResult::Incomplete => break,
                ParseResult::Error(_) => return,
            };
            buf.drain(..consumed);
            log.lock().unwrap().push(args.clone());

            match handler(&args) {
                Some(reply) => {
                    if stream.write_all(&reply).is_err() {
                        return;
                    }
                }
                None => return,
            }
        }
    }
}

fn command_args(reply: Reply) -> Vec<Vec<u8>> {
    reply
        .into_array()
        .unwrap_or_default()
        .iter()
        .filter_map(|arg| arg.as_bytes().map(<[u8]>::to_vec))
        .collect()
}

struct Session {
    password: Option<Vec<u8>>,
    authed: bool,
    store: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl Session {
    fn handle(&mut self, args: &[Vec<u8>]) -> Vec<u8> {
        let Some(name) = args.first() else {
            return error("ERR empty command");
        };
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();

        if name == "AUTH" {
            return self.auth(&args[1..]);
        }
        if !self.authed {
            return error("NOAUTH Authentication required.");
        }

        let mut store = self.store.lock().unwrap();
        match (name.as_str(), &args[1..]) {
            ("PING", []) => b"+PONG\r\n".to_vec(),
            ("ECHO", [msg]) => bulk(msg),
            ("SELECT", [db]) => match std::str::from_utf8(db).ok().and_then(|d| d.parse::<u8>().ok()) {
                Some(db) if db < 16 => b"+OK\r\n".to_vec(),
                _ => error("ERR DB index is out of range"),
            },
            ("SET", [key, value]) => {
                store.insert(key.clone(), value.clone());
                b"+OK\r\n".to_vec()
            }
            ("GET", [key]) => match store.get(key) {
                Some(value) => bulk(value),
                None => b"$-1\r\n".to_vec(),
            },
            ("INCR", [key]) => {
                let current = match store.get(key) {
                    Some(value) => std::str::from_utf8(value).ok().and_then(|v| v.parse::<i64>().ok()),
                    None => Some(0),
                };
                match current.and_then(|n| n.checked_add(1)) {
                    Some(n) => {
                        store.insert(key.clone(), n.to_string().into_bytes());
                        integer(n)
                    }
                    None => error("ERR value is not an integer or out of range"),
                }
            }
            ("DEL", keys) if !keys.is_empty() => {
                let removed = keys.iter().filter(|k| store.remove(*k).is_some()).count();
                integer(removed as i64)
            }
            _ => error(&format!(
                "ERR unknown command '{}', with args beginning with: ",
                String::from_utf8_lossy(&args[0])
            )),
        }
    }

    fn auth(&mut self, args: &[Vec<u8>]) -> Vec<u8> {
        let Some(expected) = &self.password else {
            return error("ERR AUTH <password> called without any password configured for the default user.");
        };
        let given = match args {
            [password] | [_, password] => password,
            _ => return error("ERR wrong number of arguments for 'auth' command"),
        };
        if given == expected {
            self.authed = true;
            b"+OK\r\n".to_vec()
        } else {
            error("WRONGPASS invalid username-password pair or user is disabled.")
        }
    }
}

/// Encode a bulk string reply.
pub fn bulk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

pub fn integer(n: i64) -> Vec<u8> {
    format!(":{n}\r\n").into_bytes()
}

pub fn error(text: &str) -> Vec<u8> {
    format!("-{text}\r\n").into_bytes()
}
