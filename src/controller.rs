// src/controller.rs

use std::fmt::Write as FmtWrite;
use std::io::{Write, stdout};
use std::time::Duration;

use crossterm::event::KeyCode;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate},
};

use crate::recorder::CaptureState;
use crate::runtime::SessionRuntime;
use crate::stems::StemDescriptor;

/// Terminal front end: renders the session snapshot at the frame cadence
/// and maps keys onto the runtime API.
pub struct MixerController {
    runtime: SessionRuntime,
    selected: usize,
    status: String,

    // --- REDRAW CACHE ---
    cached_play_secs: u64,
    cached_rec_secs: u64,
    cached_level: u8,
    force_redraw: bool,

    // Reusable buffer for terminal output.
    draw_buffer: String,
}

impl MixerController {
    pub fn new(stems: Vec<StemDescriptor>) -> Self {
        let mut runtime = SessionRuntime::new();
        runtime.load_stems(stems);

        Self {
            runtime,
            selected: 0,
            status: String::from(
                "[SPACE] Play/Pause  [←/→] Skip 10s  [↑/↓] Select  [M]ute [S]olo [-/+] Vol  [X] Delete  [A]rm [R]ecord  [Q]uit",
            ),
            cached_play_secs: u64::MAX,
            cached_rec_secs: u64::MAX,
            cached_level: u8::MAX,
            force_redraw: true,
            draw_buffer: String::with_capacity(4096),
        }
    }

    pub fn should_quit(&self, key: KeyCode) -> bool {
        matches!(key, KeyCode::Char('q') | KeyCode::Char('Q'))
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char(' ') => self.runtime.toggle_play(),
            KeyCode::Right => self.runtime.skip_forward(),
            KeyCode::Left => self.runtime.skip_backward(),
            KeyCode::Up => self.select_previous(),
            KeyCode::Down => self.select_next(),
            KeyCode::Char('m') | KeyCode::Char('M') => self.runtime.toggle_mute(self.selected),
            KeyCode::Char('s') | KeyCode::Char('S') => self.runtime.toggle_solo(self.selected),
            KeyCode::Char('-') => self.runtime.adjust_volume(self.selected, -0.05),
            KeyCode::Char('=') | KeyCode::Char('+') => self.runtime.adjust_volume(self.selected, 0.05),
            KeyCode::Char('x') | KeyCode::Char('X') => self.delete_selected(),
            KeyCode::Char('a') | KeyCode::Char('A') => self.arm_microphone(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.toggle_recording(),
            _ => {}
        }
        self.force_redraw = true;
    }

    fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn select_next(&mut self) {
        let count = self.runtime.track_count();
        if count > 0 {
            self.selected = (self.selected + 1).min(count - 1);
        }
    }

    fn delete_selected(&mut self) {
        self.runtime.remove_track(self.selected);
        let count = self.runtime.track_count();
        if count == 0 {
            self.selected = 0;
        } else {
            self.selected = self.selected.min(count - 1);
        }
    }

    fn arm_microphone(&mut self) {
        let devices = self.runtime.input_devices();
        match self.runtime.arm_recording(None) {
            Ok(()) => {
                self.status = format!("🎙️ Microphone armed ({} devices found)", devices.len());
            }
            Err(e) => self.status = format!("❌ {e:#}"),
        }
    }

    fn toggle_recording(&mut self) {
        if self.runtime.capture_state() == CaptureState::Recording {
            match self.runtime.stop_recording() {
                Ok(()) => self.status = "⏹️ Take added to the session".into(),
                Err(e) => self.status = format!("❌ {e:#}"),
            }
        } else {
            match self.runtime.start_recording() {
                Ok(()) => self.status = "🔴 Recording...".into(),
                Err(e) => self.status = format!("❌ {e:#}"),
            }
        }
    }

    pub fn run_tick(&mut self) -> Result<(), anyhow::Error> {
        self.runtime.tick();

        let transport = self.runtime.transport_snapshot();
        let play_secs = transport.position.as_secs();
        let rec_secs = self.runtime.recording_secs();
        let level_band = (self.runtime.input_level() * 10.0).round() as u8;

        let dirty = play_secs != self.cached_play_secs
            || rec_secs != self.cached_rec_secs
            || level_band != self.cached_level
            || self.force_redraw;
        if !dirty {
            return Ok(());
        }
        self.cached_play_secs = play_secs;
        self.cached_rec_secs = rec_secs;
        self.cached_level = level_band;
        self.force_redraw = false;

        self.draw_buffer.clear();
        let _ = write!(self.draw_buffer, "{}", MoveTo(0, 0));
        self.render_header(&transport);
        self.render_tracks();
        self.render_recorder(level_band);
        let status = self.status.clone();
        self.push_line(&status);
        let _ = write!(self.draw_buffer, "{}", Clear(ClearType::FromCursorDown));

        let mut stdout = stdout();
        execute!(stdout, BeginSynchronizedUpdate)?;
        stdout.write_all(self.draw_buffer.as_bytes())?;
        execute!(stdout, EndSynchronizedUpdate)?;
        stdout.flush()?;
        Ok(())
    }

    fn push_line(&mut self, text: &str) {
        let _ = write!(self.draw_buffer, "{text}\x1b[K\r\n");
    }

    fn render_header(&mut self, transport: &crate::runtime::TransportSnapshot) {
        let state = if transport.playing { "▶" } else { "⏸" };
        let solo = if transport.solo_active { "  [SOLO ACTIVE]" } else { "" };
        let line = format!(
            "🎵 {} / {}  {}{}",
            format_time(transport.position),
            transport
                .duration
                .map(format_time)
                .unwrap_or_else(|| "--:--".into()),
            state,
            solo,
        );
        self.push_line(&line);
        self.push_line("");
    }

    fn render_tracks(&mut self) {
        let snapshots = self.runtime.track_snapshots();
        if snapshots.is_empty() {
            self.push_line("  (no tracks)");
            return;
        }
        for (index, track) in snapshots.iter().enumerate() {
            let marker = if index == self.selected { '>' } else { ' ' };
            let (r, g, b) = hex_rgb(track.color);
            let bar = volume_bar(track.volume);
            let state = if !track.ready {
                " (loading)"
            } else if !track.audible {
                " (silent)"
            } else {
                ""
            };
            let line = format!(
                "{marker} [{}{}] {:<14} vol {:>3}% {}{}",
                if track.muted { "M" } else { "-" },
                if track.soloed { "S" } else { "-" },
                track.name,
                (track.volume * 100.0).round() as i32,
                bar,
                state,
            );
            let _ = write!(self.draw_buffer, "{}", SetForegroundColor(Color::Rgb { r, g, b }));
            let _ = write!(self.draw_buffer, "{line}");
            let _ = write!(self.draw_buffer, "{}\x1b[K\r\n", ResetColor);
        }
    }

    fn render_recorder(&mut self, level_band: u8) {
        self.push_line("");
        let line = match self.runtime.capture_state() {
            CaptureState::Idle => "  mic: idle ([A] to arm)".to_string(),
            CaptureState::AwaitingPermission => "  mic: waiting for permission...".to_string(),
            CaptureState::Armed => format!("  mic: armed  level {}", level_bar(level_band)),
            CaptureState::Recording => {
                let secs = self.runtime.recording_secs();
                format!(
                    "  mic: 🔴 REC {:02}:{:02}  level {}",
                    secs / 60,
                    secs % 60,
                    level_bar(level_band)
                )
            }
        };
        self.push_line(&line);
    }
}

fn format_time(time: Duration) -> String {
    let secs = time.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn volume_bar(volume: f32) -> String {
    let filled = (volume * 10.0).round() as usize;
    let mut bar = String::with_capacity(10);
    for i in 0..10 {
        bar.push(if i < filled { '█' } else { '·' });
    }
    bar
}

fn level_bar(band: u8) -> String {
    let filled = (band as usize).min(10);
    let mut bar = String::with_capacity(12);
    bar.push('[');
    for i in 0..10 {
        bar.push(if i < filled { '#' } else { '-' });
    }
    bar.push(']');
    bar
}

/// Parse a `#RRGGBB` lane color into its channels.
fn hex_rgb(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return (255, 255, 255);
    }
    let parse = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).unwrap_or(255);
    (parse(0..2), parse(2..4), parse(4..6))
}
