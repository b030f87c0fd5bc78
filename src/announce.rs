//! Spoken announcement of student names.
//!
//! Speech runs on a dedicated worker thread fed through a channel so callers
//! never wait for playback. Only one utterance is ever in flight: a new
//! request stops the current one, and requests that pile up while the worker
//! is busy collapse to the most recent.

use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::AnnouncementConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Something that can say a line of text without blocking.
pub trait Speaker: Send + 'static {
    /// Begin speaking `text`.
    fn start(&mut self, text: &str) -> Result<(), String>;
    /// Whether the last utterance is still playing.
    fn is_speaking(&mut self) -> bool;
    /// Cut the current utterance short. Must be harmless when idle.
    fn stop(&mut self);
}

/// Speaks by launching an external TTS program per utterance.
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: None,
        }
    }
}

impl Speaker for CommandSpeaker {
    fn start(&mut self, text: &str) -> Result<(), String> {
        let args: Vec<String> = self.args.iter().map(|a| a.replace("{text}", text)).collect();
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("failed to launch {}: {}", self.program, e))?;
        self.child = Some(child);
        Ok(())
    }

    fn is_speaking(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) => {
                self.child = None;
                false
            }
            None => false,
        }
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Used when announcements are switched off.
pub struct NullSpeaker;

impl Speaker for NullSpeaker {
    fn start(&mut self, _text: &str) -> Result<(), String> {
        Ok(())
    }

    fn is_speaking(&mut self) -> bool {
        false
    }

    fn stop(&mut self) {}
}

enum AnnounceCommand {
    Say(String),
    Shutdown,
}

pub struct Announcer {
    tx: Sender<AnnounceCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    last: Arc<Mutex<Option<String>>>,
}

impl Announcer {
    pub fn new(speaker: impl Speaker) -> Self {
        let (tx, rx) = mpsc::channel::<AnnounceCommand>();
        let last = Arc::new(Mutex::new(None));
        let worker_last = Arc::clone(&last);
        let worker = thread::Builder::new()
            .name("announcer".to_string())
            .spawn(move || run_worker(speaker, rx, worker_last))
            .map_err(|e| log::error!("failed to spawn announcer thread: {}", e))
            .ok();
        Self {
            tx,
            worker: Mutex::new(worker),
            last,
        }
    }

    pub fn from_config(cfg: &AnnouncementConfig) -> Self {
        if cfg.enabled {
            Announcer::new(CommandSpeaker::new(cfg.program.clone(), cfg.args.clone()))
        } else {
            Announcer::new(NullSpeaker)
        }
    }

    /// Queue `text` for speaking and return immediately.
    pub fn announce(&self, text: &str) {
        if self.tx.send(AnnounceCommand::Say(text.to_string())).is_err() {
            log::warn!("announcer worker is gone; dropped announcement");
        }
    }

    /// Text most recently handed to the speaker.
    pub fn last_spoken(&self) -> Option<String> {
        self.last.lock().ok().and_then(|g| g.clone())
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(AnnounceCommand::Shutdown);
        let handle = self.worker.lock().ok().and_then(|mut g| g.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    mut speaker: impl Speaker,
    rx: Receiver<AnnounceCommand>,
    last: Arc<Mutex<Option<String>>>,
) {
    let mut pending: Option<String> = None;
    loop {
        let cmd = match pending.take() {
            Some(text) => AnnounceCommand::Say(text),
            None => match rx.recv() {
                Ok(cmd) => cmd,
                Err(_) => break,
            },
        };
        let AnnounceCommand::Say(mut text) = cmd else {
            break;
        };

        // Coalesce anything queued behind this request.
        let mut shutdown = false;
        while let Ok(next) = rx.try_recv() {
            match next {
                AnnounceCommand::Say(t) => text = t,
                AnnounceCommand::Shutdown => {
                    shutdown = true;
                    break;
                }
            }
        }
        if shutdown {
            break;
        }

        speaker.stop();
        if let Ok(mut g) = last.lock() {
            *g = Some(text.clone());
        }
        if let Err(e) = speaker.start(&text) {
            log::warn!("announcement failed: {}", e);
            continue;
        }

        while speaker.is_speaking() {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(AnnounceCommand::Say(t)) => {
                    pending = Some(t);
                    break;
                }
                Ok(AnnounceCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    speaker.stop();
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }
    speaker.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct Script {
        started: Arc<Mutex<Vec<String>>>,
        stops: Arc<Mutex<usize>>,
    }

    /// Keeps "speaking" until told to stop, so preemption is observable.
    struct HoldingSpeaker {
        script: Script,
        speaking: bool,
    }

    impl Speaker for HoldingSpeaker {
        fn start(&mut self, text: &str) -> Result<(), String> {
            self.script.started.lock().unwrap().push(text.to_string());
            self.speaking = true;
            Ok(())
        }

        fn is_speaking(&mut self) -> bool {
            self.speaking
        }

        fn stop(&mut self) {
            if self.speaking {
                *self.script.stops.lock().unwrap() += 1;
            }
            self.speaking = false;
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn newer_announcement_preempts_current() {
        let script = Script::default();
        let announcer = Announcer::new(HoldingSpeaker {
            script: script.clone(),
            speaking: false,
        });

        announcer.announce("Li Lei");
        wait_until(|| script.started.lock().unwrap().len() == 1);
        announcer.announce("Han Meimei");
        wait_until(|| script.started.lock().unwrap().len() == 2);

        assert_eq!(*script.stops.lock().unwrap(), 1);
        assert_eq!(announcer.last_spoken().as_deref(), Some("Han Meimei"));
        announcer.shutdown();
        assert_eq!(*script.stops.lock().unwrap(), 2);
    }

    #[test]
    fn null_speaker_accepts_everything() {
        let announcer = Announcer::new(NullSpeaker);
        announcer.announce("A");
        announcer.announce("B");
        wait_until(|| announcer.last_spoken().as_deref() == Some("B"));
        announcer.shutdown();
        announcer.shutdown();
    }
}
