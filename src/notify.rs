//! Desktop notification and chime delivery. Failures are logged to stderr
//! and never interrupt the timer.

use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use notify_rust::{Notification, Urgency};

const CHIME_CANDIDATES: &[(&str, &str)] = &[
    ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga"),
    ("paplay", "/usr/share/sounds/freedesktop/stereo/bell.oga"),
    ("aplay", "/usr/share/sounds/alsa/Front_Center.wav"),
];

pub struct Notifier {
    sound_enabled: bool,
}

impl Notifier {
    pub fn new(sound_enabled: bool) -> Self {
        Self { sound_enabled }
    }

    pub fn session_started(&self, label: &str) {
        show(Urgency::Normal, &format!("{label} session started."));
    }

    pub fn session_ended(&self, label: &str) {
        show(Urgency::Critical, &format!("{label} ended."));
        if self.sound_enabled {
            play_chime();
        }
    }
}

fn show(urgency: Urgency, body: &str) {
    let result = Notification::new()
        .summary("Pomodoro Timer")
        .body(body)
        .appname("pomo")
        .icon("alarm-clock")
        .urgency(urgency)
        .show();
    if let Err(err) = result {
        eprintln!("pomo: notification failed: {err}");
    }
}

// Playback runs detached so a slow audio daemon cannot delay the next tick.
fn play_chime() {
    thread::spawn(|| {
        for (player, file) in CHIME_CANDIDATES {
            if Path::new(file).exists() {
                if let Err(err) = Command::new(player)
                    .arg(file)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                {
                    eprintln!("pomo: sound playback failed: {err}");
                }
                break;
            }
        }
    });
}
