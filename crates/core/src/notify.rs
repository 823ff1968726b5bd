//! Audible slot notification.

use std::io::Write;
use std::time::Duration;

use rodio::{OutputStreamBuilder, Sink, Source};

/// Side-channel cue raised when a slot is discovered. Implementations are
/// best-effort: a failed cue must never disturb the automaton.
pub trait Alert: Send + Sync {
    fn ring(&self);
}

/// Alternating two-tone cue, three low/high pairs, half a second per tone.
///
/// Playback runs on its own thread so the automaton is never blocked on
/// the audio device. If no output device can be opened the alert degrades
/// to a terminal bell.
pub struct AudioAlert;

const LOW_HZ: f32 = 1000.0;
const HIGH_HZ: f32 = 2000.0;
const TONE_MS: u64 = 500;
const PAIRS: usize = 3;

impl Alert for AudioAlert {
    fn ring(&self) {
        std::thread::spawn(|| {
            let Ok(mut stream) = OutputStreamBuilder::open_default_stream() else {
                terminal_bell();
                return;
            };
            stream.log_on_drop(false);
            let sink = Sink::connect_new(stream.mixer());
            for _ in 0..PAIRS {
                for freq in [LOW_HZ, HIGH_HZ] {
                    let tone = rodio::source::SineWave::new(freq)
                        .take_duration(Duration::from_millis(TONE_MS))
                        .amplify(0.20);
                    sink.append(tone);
                }
            }
            sink.sleep_until_end();
        });
    }
}

fn terminal_bell() {
    print!("\x07");
    let _ = std::io::stdout().flush();
}
