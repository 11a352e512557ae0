// src/engine/mixer.rs

use super::{AudioEngine, Session};

impl<E: AudioEngine> Session<E> {
    /// True while any track is soloed; solo overrides individual mutes.
    pub fn solo_active(&self) -> bool {
        self.tracks.iter().any(|t| t.soloed)
    }

    /// Resolved audibility for one track under the current solo mode.
    pub fn effective_audible(&self, index: usize) -> bool {
        let solo_active = self.solo_active();
        self.tracks
            .get(index)
            .map(|t| if solo_active { t.soloed } else { !t.muted })
            .unwrap_or(false)
    }

    pub fn toggle_mute(&mut self, index: usize) {
        let Some(track) = self.tracks.get_mut(index) else {
            return;
        };
        // Muting a soloed track drops it out of solo mode first.
        if track.soloed {
            track.soloed = false;
        }
        track.muted = !track.muted;
        self.apply_mix_state();
    }

    pub fn toggle_solo(&mut self, index: usize) {
        let Some(track) = self.tracks.get_mut(index) else {
            return;
        };
        track.soloed = !track.soloed;
        if track.soloed {
            track.muted = false;
        }
        self.apply_mix_state();
    }

    /// Store the clamped volume; forward it only while the track is
    /// audible. The stored value survives mute/solo round trips either way.
    pub fn set_volume(&mut self, index: usize, volume: f32) {
        let solo_active = self.solo_active();
        let Some(track) = self.tracks.get_mut(index) else {
            return;
        };
        track.volume = volume.clamp(0.0, 1.0);
        let audible = if solo_active { track.soloed } else { !track.muted };
        if audible {
            if let Some(engine) = track.engine.as_mut() {
                engine.set_volume(track.volume);
            }
        }
    }

    /// Push the resolved mix state into every binding, in registration
    /// order. While playing, all tracks are first realigned to the
    /// reference time so an audibility change does not expose drift that
    /// built up between the independent engines.
    pub fn apply_mix_state(&mut self) {
        if self.transport.playing {
            if let Some(time) = self.reference_time() {
                for track in &mut self.tracks {
                    if let Some(engine) = track.engine.as_mut() {
                        engine.set_time(time);
                    }
                }
            }
        }

        let solo_active = self.solo_active();
        for track in &mut self.tracks {
            let audible = if solo_active { track.soloed } else { !track.muted };
            let Some(engine) = track.engine.as_mut() else {
                continue;
            };
            engine.set_muted(!audible);
            if audible {
                engine.set_volume(track.volume);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use std::time::Duration;

    #[test]
    fn mute_and_solo_are_never_both_set() {
        let mut session = ready_session(&["vocals", "drums", "bass"], &[100, 100, 100]);
        for step in 0..32 {
            let index = step % 3;
            if step % 2 == 0 {
                session.toggle_mute(index);
            } else {
                session.toggle_solo(index);
            }
            for track in session.tracks() {
                assert!(
                    !(track.muted && track.soloed),
                    "track '{}' is both muted and soloed after step {step}",
                    track.name
                );
            }
        }
    }

    #[test]
    fn solo_active_follows_the_last_soloed_track() {
        let mut session = ready_session(&["vocals", "drums"], &[100, 100]);
        assert!(!session.solo_active());

        session.toggle_solo(0);
        assert!(session.solo_active());
        session.toggle_solo(1);
        assert!(session.solo_active());

        session.toggle_solo(0);
        session.toggle_solo(1);
        assert!(!session.solo_active());
    }

    #[test]
    fn soloing_drums_then_muting_them_restores_the_others() {
        let mut session = ready_session(&["vocals", "drums", "bass"], &[100, 100, 100]);

        session.toggle_solo(1);
        assert!(session.solo_active());
        assert!(!session.effective_audible(0));
        assert!(session.effective_audible(1));
        assert!(!session.effective_audible(2));

        session.toggle_mute(1);
        assert!(!session.solo_active());
        assert!(!session.tracks()[1].soloed);
        assert!(session.tracks()[1].muted);
        assert!(session.effective_audible(0));
        assert!(!session.effective_audible(1));
        assert!(session.effective_audible(2));
    }

    #[test]
    fn mute_state_is_pushed_to_every_binding() {
        let mut session = ready_session(&["vocals", "drums"], &[100, 100]);
        session.toggle_solo(0);

        assert!(!engine(&session, 0).muted);
        assert!(engine(&session, 1).muted);

        session.toggle_solo(0);
        assert!(!engine(&session, 0).muted);
        assert!(!engine(&session, 1).muted);
    }

    #[test]
    fn set_volume_clamps_and_stores() {
        let mut session = ready_session(&["vocals"], &[100]);
        session.set_volume(0, 1.7);
        assert_eq!(session.tracks()[0].volume, 1.0);
        session.set_volume(0, -0.4);
        assert_eq!(session.tracks()[0].volume, 0.0);
    }

    #[test]
    fn volume_is_not_sent_while_inaudible_but_survives() {
        let mut session = ready_session(&["vocals", "drums"], &[100, 100]);
        session.toggle_mute(0);
        let sends_before = engine(&session, 0)
            .log
            .iter()
            .filter(|c| matches!(c, Cmd::SetVolume(_)))
            .count();

        session.set_volume(0, 0.3);
        let sends_after = engine(&session, 0)
            .log
            .iter()
            .filter(|c| matches!(c, Cmd::SetVolume(_)))
            .count();
        assert_eq!(sends_before, sends_after, "muted track must not receive volume");
        assert_eq!(session.tracks()[0].volume, 0.3);

        // Unmuting re-applies the stored value.
        session.toggle_mute(0);
        assert_eq!(engine(&session, 0).volume, 0.3);
    }

    #[test]
    fn mix_change_while_playing_realigns_to_the_reference() {
        let mut session = ready_session(&["vocals", "drums", "bass"], &[100, 100, 100]);
        session.toggle_play();

        // Simulate drift: the reference has advanced further than the rest.
        engine_mut(&mut session, 0).time = Duration::from_secs(42);
        engine_mut(&mut session, 1).time = Duration::from_secs(41);
        engine_mut(&mut session, 2).time = Duration::from_secs(40);

        session.toggle_mute(2);
        for index in 0..3 {
            assert_eq!(engine(&session, index).time, Duration::from_secs(42));
        }

        // The seek lands before the mute push on the affected track.
        let log = &engine(&session, 2).log;
        let seek_at = log
            .iter()
            .rposition(|c| matches!(c, Cmd::SetTime(t) if *t == Duration::from_secs(42)))
            .unwrap();
        let mute_at = log
            .iter()
            .rposition(|c| matches!(c, Cmd::SetMuted(true)))
            .unwrap();
        assert!(seek_at < mute_at);
    }

    #[test]
    fn mix_commands_against_unbound_tracks_are_noops() {
        let mut session = ready_session(&["vocals"], &[100]);
        session.append_take(crate::recorder::take::TakeFile::new("/tmp/take.wav".into()));

        // The appended track has no binding yet; state is still recorded.
        session.toggle_mute(1);
        session.set_volume(1, 0.5);
        assert!(session.tracks()[1].muted);
        assert_eq!(session.tracks()[1].volume, 0.5);
        assert!(session.tracks()[1].engine.is_none());

        // The retained state reaches the engine on the next mount pass.
        session.mount(&FakeFactory::with_durations(&[30]));
        assert!(engine(&session, 1).muted);
    }
}
