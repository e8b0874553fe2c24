//! Minimal HTTP/1.1 camera emulator for integration tests.
//!
//! Implements the finder protocol of `/cgi-bin/mediaFileFind.cgi`
//! (`factory.create`, `findFile`, `findNextFile`, `destroy`) and serves file
//! bodies from `/cgi-bin/RPC_Loadfile<path>`. Results are returned in the
//! order given, so tests can hand out unsorted listings.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One file known to the fake camera.
#[derive(Debug, Clone)]
pub struct CameraFile {
    pub path: String,
    /// `%Y-%m-%d %H:%M:%S`.
    pub start: String,
    pub end: String,
    pub channel: u32,
    /// `Type` field (`dav`, `jpg`).
    pub type_tag: String,
    pub body: Vec<u8>,
    /// Leading download requests answered with 503.
    pub fail_first: u32,
}

impl CameraFile {
    pub fn video(path: &str, start: &str, end: &str, body: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            channel: 1,
            type_tag: "dav".to_string(),
            body: body.to_vec(),
            fail_first: 0,
        }
    }

    pub fn snapshot(path: &str, start: &str) -> Self {
        Self {
            path: path.to_string(),
            start: start.to_string(),
            end: start.to_string(),
            channel: 1,
            type_tag: "jpg".to_string(),
            body: b"JPEG".to_vec(),
            fail_first: 0,
        }
    }

    pub fn failing(mut self, times: u32) -> Self {
        self.fail_first = times;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FinderMode {
    #[default]
    Normal,
    /// `findFile` answers with an error body instead of `OK`.
    RejectFind,
    /// `findNextFile` answers `found=` with garbage.
    GarbledPages,
}

#[derive(Default)]
struct State {
    files: Vec<CameraFile>,
    mode: FinderMode,
    next_object: AtomicUsize,
    /// object id → remaining listing.
    cursors: Mutex<HashMap<String, Vec<CameraFile>>>,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    pages: AtomicUsize,
    downloads: Mutex<HashMap<String, u32>>,
}

/// Handle to a running emulator. The server thread lives until process exit.
pub struct CameraServer {
    host: String,
    state: Arc<State>,
}

impl CameraServer {
    pub fn start(files: Vec<CameraFile>) -> Self {
        Self::start_with_mode(files, FinderMode::Normal)
    }

    pub fn start_with_mode(files: Vec<CameraFile>, mode: FinderMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State {
            files,
            mode,
            next_object: AtomicUsize::new(1000),
            ..State::default()
        });
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            host: format!("127.0.0.1:{}", port),
            state,
        }
    }

    /// `host:port`, as a user would pass on the command line.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn finders_created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    pub fn finders_destroyed(&self) -> usize {
        self.state.destroyed.load(Ordering::SeqCst)
    }

    pub fn pages_served(&self) -> usize {
        self.state.pages.load(Ordering::SeqCst)
    }

    pub fn download_requests(&self, path: &str) -> u32 {
        self.state
            .downloads
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

fn handle(mut stream: TcpStream, state: &State) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let target = request
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/");
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    let (status, body) = if path == "/cgi-bin/mediaFileFind.cgi" {
        let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        finder(state, &params)
    } else if let Some(remote) = path.strip_prefix("/cgi-bin/RPC_Loadfile") {
        download(state, remote)
    } else {
        ("404 Not Found", b"Error\r\n".to_vec())
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
}

fn text(s: String) -> (&'static str, Vec<u8>) {
    ("200 OK", s.into_bytes())
}

fn finder(state: &State, params: &HashMap<String, String>) -> (&'static str, Vec<u8>) {
    let object = params.get("object").cloned().unwrap_or_default();
    match params.get("action").map(String::as_str) {
        Some("factory.create") => {
            state.created.fetch_add(1, Ordering::SeqCst);
            let id = state.next_object.fetch_add(1, Ordering::SeqCst);
            text(format!("result={}\r\n", id))
        }
        Some("findFile") => {
            if state.mode == FinderMode::RejectFind {
                return text("Error\r\nBad Request!\r\n".to_string());
            }
            let channel: u32 = params
                .get("condition.Channel")
                .and_then(|c| c.parse().ok())
                .unwrap_or(1);
            let start = params.get("condition.StartTime").cloned().unwrap_or_default();
            let end = params.get("condition.EndTime").cloned().unwrap_or_default();
            // Same-format timestamps compare correctly as strings.
            let listing: Vec<CameraFile> = state
                .files
                .iter()
                .filter(|f| f.channel == channel && f.end >= start && f.start <= end)
                .cloned()
                .collect();
            state.cursors.lock().unwrap().insert(object, listing);
            text("OK\r\n".to_string())
        }
        Some("findNextFile") => {
            state.pages.fetch_add(1, Ordering::SeqCst);
            if state.mode == FinderMode::GarbledPages {
                return text("found=??\r\n".to_string());
            }
            let count: usize = params
                .get("count")
                .and_then(|c| c.parse().ok())
                .unwrap_or(100);
            let mut cursors = state.cursors.lock().unwrap();
            let Some(remaining) = cursors.get_mut(&object) else {
                return text("Error\r\nInvalid object\r\n".to_string());
            };
            let take = count.min(remaining.len());
            let page: Vec<CameraFile> = remaining.drain(..take).collect();
            let mut out = format!("found={}\r\n", page.len());
            for (i, f) in page.iter().enumerate() {
                out.push_str(&format!(
                    "items[{i}].Channel={}\r\nitems[{i}].EndTime={}\r\nitems[{i}].FilePath={}\r\nitems[{i}].StartTime={}\r\nitems[{i}].Type={}\r\n",
                    f.channel,
                    f.end,
                    f.path,
                    f.start,
                    f.type_tag
                ));
            }
            text(out)
        }
        Some("destroy") => {
            state.destroyed.fetch_add(1, Ordering::SeqCst);
            state.cursors.lock().unwrap().remove(&object);
            text("OK\r\n".to_string())
        }
        _ => ("400 Bad Request", b"Error\r\n".to_vec()),
    }
}

fn download(state: &State, remote: &str) -> (&'static str, Vec<u8>) {
    let Some(file) = state.files.iter().find(|f| f.path == remote) else {
        return ("404 Not Found", b"Error\r\n".to_vec());
    };
    let seen = {
        let mut downloads = state.downloads.lock().unwrap();
        let n = downloads.entry(remote.to_string()).or_insert(0);
        *n += 1;
        *n
    };
    if seen <= file.fail_first {
        return ("503 Service Unavailable", b"busy\r\n".to_vec());
    }
    ("200 OK", file.body.clone())
}
