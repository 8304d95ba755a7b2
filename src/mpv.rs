//! mpv as the playback widget, driven over its JSON IPC socket.
//!
//! One mpv process is launched lazily (`--idle=yes`) on the first load and reused
//! for every later load via `loadfile ... replace`. A reader task turns mpv's event
//! stream into `PlayerEvent`s and routes command replies back to their callers.
//!
//! Each `loadfile` produces exactly one `start-file`, in request order. The load
//! number is queued before the command is sent and adopted by the reader when the
//! matching `start-file` arrives, so events still in flight for the previous file
//! keep the previous number.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::process::{Child as TokioChild, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::watch_url;
use crate::constants::constants;
use crate::player::{LoadOptions, PlayerEvent, Widget, WidgetState};

type Reply = std::result::Result<Value, String>;
type PendingReplies = Arc<StdMutex<HashMap<u64, oneshot::Sender<Reply>>>>;
/// Load numbers whose `start-file` has not been seen yet, oldest first.
type PendingLoads = Arc<StdMutex<VecDeque<u64>>>;

/// Request id reserved for the `pause` property observer.
const PAUSE_OBSERVER_ID: u64 = 1;

const REPLY_TIMEOUT: Duration = Duration::from_secs(3);

/// Tracks what mpv has told us so far, so that property changes outside a
/// loaded file are not reported as playback state.
#[derive(Debug, Default)]
struct EventTracker {
  loaded: bool,
  paused: bool,
  /// Load number stamped on outgoing events.
  load: u64,
  pending: PendingLoads,
}

impl EventTracker {
  fn state(&self) -> WidgetState {
    if self.paused { WidgetState::Paused } else { WidgetState::Playing }
  }

  /// Translate one mpv event message into zero or more player events.
  fn translate(&mut self, msg: &Value) -> Vec<PlayerEvent> {
    let Some(event) = msg.get("event").and_then(Value::as_str) else {
      return Vec::new();
    };
    let load = self.load;
    match event {
      "start-file" => {
        self.loaded = false;
        if let Some(next) = self.pending.lock().ok().and_then(|mut p| p.pop_front()) {
          self.load = next;
        }
        vec![PlayerEvent::StateChange(self.load, WidgetState::Unstarted)]
      }
      "file-loaded" => {
        self.loaded = true;
        let mut events = vec![PlayerEvent::Ready(load)];
        if self.paused {
          events.push(PlayerEvent::StateChange(load, WidgetState::Cued));
        }
        events
      }
      "property-change" if msg.get("name").and_then(Value::as_str) == Some("pause") => {
        let Some(paused) = msg.get("data").and_then(Value::as_bool) else {
          return Vec::new();
        };
        self.paused = paused;
        if self.loaded { vec![PlayerEvent::StateChange(load, self.state())] } else { Vec::new() }
      }
      "seek" if self.loaded => vec![PlayerEvent::StateChange(load, WidgetState::Buffering)],
      "playback-restart" if self.loaded => vec![PlayerEvent::StateChange(load, self.state())],
      "end-file" => {
        self.loaded = false;
        if msg.get("reason").and_then(Value::as_str) == Some("eof") {
          vec![PlayerEvent::StateChange(load, WidgetState::Ended)]
        } else {
          Vec::new()
        }
      }
      _ => Vec::new(),
    }
  }
}

/// Serialize an IPC command line.
fn command_line(args: &Value, request_id: u64) -> String {
  let mut line = json!({ "command": args, "request_id": request_id }).to_string();
  line.push('\n');
  line
}

/// Extract the reply carried by an IPC response line.
fn parse_reply(msg: &Value) -> Option<(u64, Reply)> {
  if msg.get("event").is_some() {
    return None;
  }
  let id = msg.get("request_id").and_then(Value::as_u64)?;
  let reply = match msg.get("error").and_then(Value::as_str) {
    Some("success") => Ok(msg.get("data").cloned().unwrap_or(Value::Null)),
    Some(err) => Err(err.to_string()),
    None => Err("malformed reply".to_string()),
  };
  Some((id, reply))
}

/// mpv command-line arguments for the shared process.
fn launch_args(socket_path: &str, options: &LoadOptions) -> Vec<String> {
  let mut args = vec!["--idle=yes".to_string(), "--no-terminal".to_string(), format!("--input-ipc-server={}", socket_path)];
  if options.audio_only {
    args.push("--no-video".to_string());
  } else {
    args.push(format!("--geometry={}x{}", options.width, options.height));
    args.push("--force-window=yes".to_string());
  }
  if !options.controls {
    args.push("--no-osc".to_string());
    args.push("--no-input-default-bindings".to_string());
  }
  args
}

/// A running mpv process and its IPC connection.
struct MpvSession {
  child: TokioChild,
  writer: OwnedWriteHalf,
  pending: PendingReplies,
  reader: JoinHandle<()>,
  socket_path: PathBuf,
  next_id: u64,
}

impl MpvSession {
  async fn launch(
    options: &LoadOptions,
    events: mpsc::UnboundedSender<PlayerEvent>,
    loads: PendingLoads,
  ) -> Result<Self> {
    let socket_path = std::env::temp_dir().join(format!("muse-mpv-{}.sock", std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let child = Command::new("mpv")
      .args(launch_args(&socket_path_str, options))
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
          anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
        } else {
          anyhow!(e).context("Failed to spawn mpv process")
        }
      })?;

    let stream = connect(&socket_path_str).await?;
    let (read_half, writer) = stream.into_split();
    let pending: PendingReplies = Arc::new(StdMutex::new(HashMap::new()));

    let reader_pending = Arc::clone(&pending);
    let reader = tokio::spawn(async move {
      let mut tracker = EventTracker { pending: loads, ..EventTracker::default() };
      let mut lines = TokioBufReader::new(read_half).lines();
      while let Ok(Some(line)) = lines.next_line().await {
        let Ok(msg) = serde_json::from_str::<Value>(&line) else {
          debug!(line = %line, "mpv: ignoring non-JSON line");
          continue;
        };
        if let Some((id, reply)) = parse_reply(&msg) {
          let waiter = reader_pending.lock().ok().and_then(|mut p| p.remove(&id));
          if let Some(tx) = waiter {
            let _ = tx.send(reply);
          }
          continue;
        }
        for event in tracker.translate(&msg) {
          if events.send(event).is_err() {
            return;
          }
        }
      }
      info!("mpv: IPC stream closed");
    });

    info!(socket = %socket_path_str, "mpv: launched");
    let mut session = Self { child, writer, pending, reader, socket_path, next_id: PAUSE_OBSERVER_ID + 1 };
    session.send(&json!(["observe_property", PAUSE_OBSERVER_ID, "pause"]), PAUSE_OBSERVER_ID).await?;
    Ok(session)
  }

  fn is_alive(&mut self) -> bool {
    matches!(self.child.try_wait(), Ok(None))
  }

  async fn send(&mut self, args: &Value, request_id: u64) -> Result<()> {
    let line = command_line(args, request_id);
    self.writer.write_all(line.as_bytes()).await.context("Failed to write to mpv IPC socket")
  }

  /// Send a command and wait for its reply.
  async fn command(&mut self, args: Value) -> Result<Value> {
    let id = self.next_id;
    self.next_id += 1;
    let (tx, rx) = oneshot::channel();
    self.pending.lock().map_err(|_| anyhow!("mpv reply table poisoned"))?.insert(id, tx);

    if let Err(e) = self.send(&args, id).await {
      if let Ok(mut p) = self.pending.lock() {
        p.remove(&id);
      }
      return Err(e);
    }

    let reply = tokio::time::timeout(REPLY_TIMEOUT, rx)
      .await
      .with_context(|| format!("Timeout waiting for mpv reply to {}", args))?
      .context("mpv IPC reader stopped")?;
    reply.map_err(|err| anyhow!("mpv rejected {}: {}", args, err))
  }

  async fn stop(mut self) -> Result<()> {
    self.reader.abort();
    let _ = self.child.kill().await;
    let _ = self.child.wait().await;
    let _ = std::fs::remove_file(&self.socket_path);
    info!("mpv: stopped");
    Ok(())
  }
}

/// Connect to the IPC socket, retrying while mpv starts up.
async fn connect(socket_path: &str) -> Result<UnixStream> {
  let attempts = constants().mpv_connect_attempts;
  for attempt in 0..attempts {
    match UnixStream::connect(socket_path).await {
      Ok(stream) => return Ok(stream),
      Err(e) => {
        debug!(attempt, err = %e, "mpv: IPC connect failed, retrying");
        tokio::time::sleep(Duration::from_millis(100)).await;
      }
    }
  }
  Err(anyhow!("mpv did not open its IPC socket at {}", socket_path))
}

/// `Widget` backed by a shared mpv process.
pub struct MpvWidget {
  events: mpsc::UnboundedSender<PlayerEvent>,
  session: Option<MpvSession>,
  loads: PendingLoads,
}

impl MpvWidget {
  pub fn new(events: mpsc::UnboundedSender<PlayerEvent>) -> Self {
    Self { events, session: None, loads: PendingLoads::default() }
  }

  fn queue_load(&self, load: u64) {
    if let Ok(mut pending) = self.loads.lock() {
      pending.push_back(load);
    }
  }

  fn unqueue_load(&self, load: u64) {
    if let Ok(mut pending) = self.loads.lock() {
      pending.retain(|&queued| queued != load);
    }
  }

  fn session(&mut self) -> Result<&mut MpvSession> {
    self.session.as_mut().ok_or_else(|| anyhow!("mpv is not running"))
  }

  async fn get_f64(&mut self, property: &str) -> Result<f64> {
    let value = self.session()?.command(json!(["get_property", property])).await?;
    value.as_f64().ok_or_else(|| anyhow!("mpv property {} is not a number: {}", property, value))
  }

  async fn set_pause(&mut self, paused: bool) -> Result<()> {
    self.session()?.command(json!(["set_property", "pause", paused])).await.map(drop)
  }
}

#[async_trait]
impl Widget for MpvWidget {
  async fn load(&mut self, video_id: &str, load: u64, options: &LoadOptions) -> Result<()> {
    if let Some(session) = self.session.as_mut()
      && !session.is_alive()
    {
      warn!("mpv: process exited, relaunching");
      if let Some(dead) = self.session.take() {
        let _ = dead.stop().await;
      }
    }
    if self.session.is_none() {
      if let Ok(mut pending) = self.loads.lock() {
        pending.clear();
      }
      self.session = Some(MpvSession::launch(options, self.events.clone(), Arc::clone(&self.loads)).await?);
    }

    let url = watch_url(video_id);
    self.session()?.command(json!(["set_property", "pause", !options.autoplay])).await?;
    self.queue_load(load);
    if let Err(e) = self.session()?.command(json!(["loadfile", url, "replace"])).await {
      self.unqueue_load(load);
      return Err(e.context(format!("Failed to load {}", url)));
    }
    info!(video_id, load, "mpv: loading");
    Ok(())
  }

  async fn play(&mut self) -> Result<()> {
    self.set_pause(false).await
  }

  async fn pause(&mut self) -> Result<()> {
    self.set_pause(true).await
  }

  async fn seek_to(&mut self, secs: f64) -> Result<()> {
    self.session()?.command(json!(["seek", secs.max(0.0), "absolute"])).await.map(drop)
  }

  async fn set_volume(&mut self, level: u8) -> Result<()> {
    self.session()?.command(json!(["set_property", "volume", level])).await.map(drop)
  }

  async fn current_time(&mut self) -> Result<f64> {
    self.get_f64("time-pos").await
  }

  async fn duration(&mut self) -> Result<f64> {
    self.get_f64("duration").await
  }

  async fn shutdown(&mut self) -> Result<()> {
    match self.session.take() {
      Some(session) => session.stop().await,
      None => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn translate_all(tracker: &mut EventTracker, lines: &[&str]) -> Vec<PlayerEvent> {
    lines.iter().flat_map(|l| tracker.translate(&serde_json::from_str(l).unwrap())).collect()
  }

  #[test]
  fn autoplay_load_sequence() {
    let mut tracker = EventTracker::default();
    let events = translate_all(
      &mut tracker,
      &[
        r#"{"event":"property-change","id":1,"name":"pause","data":false}"#,
        r#"{"event":"start-file","playlist_entry_id":1}"#,
        r#"{"event":"file-loaded"}"#,
        r#"{"event":"playback-restart"}"#,
      ],
    );
    assert_eq!(
      events,
      vec![
        PlayerEvent::StateChange(0, WidgetState::Unstarted),
        PlayerEvent::Ready(0),
        PlayerEvent::StateChange(0, WidgetState::Playing),
      ]
    );
  }

  #[test]
  fn events_keep_their_load_until_the_next_start_file() {
    let mut tracker = EventTracker { loaded: true, load: 1, ..EventTracker::default() };
    tracker.pending.lock().unwrap().push_back(2);
    let events = translate_all(
      &mut tracker,
      &[
        r#"{"event":"end-file","reason":"eof","playlist_entry_id":1}"#,
        r#"{"event":"start-file","playlist_entry_id":2}"#,
        r#"{"event":"file-loaded"}"#,
        r#"{"event":"playback-restart"}"#,
      ],
    );
    assert_eq!(
      events,
      vec![
        PlayerEvent::StateChange(1, WidgetState::Ended),
        PlayerEvent::StateChange(2, WidgetState::Unstarted),
        PlayerEvent::Ready(2),
        PlayerEvent::StateChange(2, WidgetState::Playing),
      ]
    );
    assert!(tracker.pending.lock().unwrap().is_empty());
  }

  #[test]
  fn paused_load_is_cued() {
    let mut tracker = EventTracker::default();
    let events = translate_all(
      &mut tracker,
      &[r#"{"event":"property-change","id":1,"name":"pause","data":true}"#, r#"{"event":"file-loaded"}"#],
    );
    assert_eq!(events, vec![PlayerEvent::Ready(0), PlayerEvent::StateChange(0, WidgetState::Cued)]);
  }

  #[test]
  fn pause_toggles_after_load() {
    let mut tracker = EventTracker { loaded: true, ..EventTracker::default() };
    let events = translate_all(
      &mut tracker,
      &[
        r#"{"event":"property-change","id":1,"name":"pause","data":true}"#,
        r#"{"event":"property-change","id":1,"name":"pause","data":false}"#,
        r#"{"event":"seek"}"#,
      ],
    );
    assert_eq!(
      events,
      vec![
        PlayerEvent::StateChange(0, WidgetState::Paused),
        PlayerEvent::StateChange(0, WidgetState::Playing),
        PlayerEvent::StateChange(0, WidgetState::Buffering),
      ]
    );
  }

  #[test]
  fn end_file_reports_ended_only_on_eof() {
    let mut tracker = EventTracker { loaded: true, ..EventTracker::default() };
    assert!(tracker.translate(&json!({"event": "end-file", "reason": "stop"})).is_empty());
    tracker.loaded = true;
    assert_eq!(
      tracker.translate(&json!({"event": "end-file", "reason": "eof"})),
      vec![PlayerEvent::StateChange(0, WidgetState::Ended)]
    );
    assert!(!tracker.loaded);
  }

  #[test]
  fn other_properties_and_events_are_ignored() {
    let mut tracker = EventTracker { loaded: true, ..EventTracker::default() };
    assert!(tracker.translate(&json!({"event": "property-change", "name": "volume", "data": 40})).is_empty());
    assert!(tracker.translate(&json!({"event": "idle"})).is_empty());
    assert!(tracker.translate(&json!({"data": 1.0, "error": "success", "request_id": 4})).is_empty());
  }

  #[test]
  fn replies_are_routed_by_request_id() {
    let ok = json!({"data": 12.5, "error": "success", "request_id": 7});
    assert_eq!(parse_reply(&ok), Some((7, Ok(json!(12.5)))));
    let err = json!({"error": "property unavailable", "request_id": 8});
    assert_eq!(parse_reply(&err), Some((8, Err("property unavailable".to_string()))));
    assert_eq!(parse_reply(&json!({"event": "seek"})), None);
  }

  #[test]
  fn command_line_is_newline_terminated_json() {
    let line = command_line(&json!(["seek", 30.0, "absolute"]), 3);
    assert!(line.ends_with('\n'));
    let parsed: Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(parsed["command"], json!(["seek", 30.0, "absolute"]));
    assert_eq!(parsed["request_id"], json!(3));
  }

  #[test]
  fn launch_args_follow_options() {
    let audio = launch_args("/tmp/s.sock", &LoadOptions { audio_only: true, controls: false, ..LoadOptions::default() });
    assert!(audio.contains(&"--no-video".to_string()));
    assert!(audio.contains(&"--no-osc".to_string()));
    assert!(audio.contains(&"--input-ipc-server=/tmp/s.sock".to_string()));

    let video = launch_args(
      "/tmp/s.sock",
      &LoadOptions { width: 640, height: 200, audio_only: false, controls: true, autoplay: true },
    );
    assert!(video.contains(&"--geometry=640x200".to_string()));
    assert!(!video.contains(&"--no-video".to_string()));
    assert!(!video.contains(&"--no-osc".to_string()));
  }
}
