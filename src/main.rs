// src/main.rs

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;

use stemdesk::controller::MixerController;
use stemdesk::stems::load_stem_set;

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let sources: Vec<String> = std::env::args().skip(1).collect();
    if sources.is_empty() {
        eprintln!("Usage: stemdesk <stems-dir | stems.json | audio files...>");
        std::process::exit(2);
    }

    let stems = load_stem_set(&sources)?;
    if stems.is_empty() {
        anyhow::bail!("no stems found in the given sources");
    }

    let mut mixer = MixerController::new(stems);

    enable_raw_mode()?;

    // Target 20 FPS (50ms per frame); poll() doubles as the frame timer.
    let target_frame_duration = Duration::from_millis(50);
    mixer.run_tick()?;

    loop {
        if event::poll(target_frame_duration)? {
            if let Event::Key(ev) = event::read()? {
                if ev.kind == KeyEventKind::Press {
                    if ev.code == KeyCode::Char('c')
                        && ev.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        break;
                    }
                    if mixer.should_quit(ev.code) {
                        break;
                    }
                    mixer.handle_key(ev.code);
                    // Immediate tick on input for responsiveness.
                    mixer.run_tick()?;
                    continue;
                }
            }
        }

        mixer.run_tick()?;
    }

    disable_raw_mode()?;
    println!("\n🛑 Exiting mixer.");
    Ok(())
}
