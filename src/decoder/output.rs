// src/decoder/output.rs

use ringbuf::traits::Producer as RbProducer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Linear gain ramp applied to the first samples pushed after a seek so the
/// discontinuity does not click.
#[derive(Default)]
pub struct SeekFade {
    remaining: usize,
    total: usize,
}

impl SeekFade {
    pub fn start(&mut self, samples: usize) {
        self.remaining = samples;
        self.total = samples.max(1);
    }

    fn gain(&mut self) -> f32 {
        if self.remaining == 0 {
            return 1.0;
        }
        self.remaining -= 1;
        1.0 - self.remaining as f32 / self.total as f32
    }
}

/// Push decoded samples into the ring buffer, blocking while it is full.
/// Returns false once `alive` drops, so the decode thread can exit instead
/// of spinning against a consumer that no longer exists.
pub fn push_faded<P: RbProducer<Item = f32>>(
    producer: &mut P,
    data: &[f32],
    fade: &mut SeekFade,
    alive: &AtomicBool,
) -> bool {
    for &sample in data {
        let s = sample * fade.gain();
        loop {
            match producer.try_push(s) {
                Ok(()) => break,
                Err(_) => {
                    if !alive.load(Ordering::Relaxed) {
                        return false;
                    }
                    std::thread::park_timeout(Duration::from_micros(200));
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::HeapRb;
    use ringbuf::traits::{Consumer, Split};

    #[test]
    fn fade_ramps_up_to_unity() {
        let rb = HeapRb::<f32>::new(16);
        let (mut prod, mut cons) = rb.split();
        let alive = AtomicBool::new(true);

        let mut fade = SeekFade::default();
        fade.start(4);
        assert!(push_faded(&mut prod, &[1.0; 6], &mut fade, &alive));

        let pushed: Vec<f32> = std::iter::from_fn(|| cons.try_pop()).collect();
        assert_eq!(pushed.len(), 6);
        assert!(pushed[0] < pushed[1] && pushed[1] < pushed[2]);
        assert_eq!(pushed[4], 1.0);
        assert_eq!(pushed[5], 1.0);
    }

    #[test]
    fn push_aborts_when_binding_is_gone() {
        let rb = HeapRb::<f32>::new(2);
        let (mut prod, _cons) = rb.split();
        let alive = AtomicBool::new(false);

        // Ring holds 2 samples; the third would block forever if the
        // shutdown flag were ignored.
        let mut fade = SeekFade::default();
        assert!(!push_faded(&mut prod, &[0.1, 0.2, 0.3], &mut fade, &alive));
    }
}
