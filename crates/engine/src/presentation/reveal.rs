use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::audio::AudioCue;

pub const DEFAULT_CHARACTER_INTERVAL_SECONDS: f32 = 0.05;
pub const PITCH_JITTER_MIN: f32 = 0.95;
pub const PITCH_JITTER_MAX: f32 = 1.05;

const ESCAPE_MARKER: char = '@';
const COLOR_TAG: char = 'C';
const WAIT_EPSILON_SECONDS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);
    pub const YELLOW: Rgb = Rgb::new(0xFF, 0xFF, 0x00);
    pub const RED: Rgb = Rgb::new(0xFF, 0x00, 0x00);
    pub const SKY_BLUE: Rgb = Rgb::new(0x00, 0xBF, 0xFF);
    pub const GREEN: Rgb = Rgb::new(0x00, 0xFF, 0x00);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatDirective {
    Color(Rgb),
}

impl FormatDirective {
    /// Resolves an inline `@<tag><code>` escape. Unknown tags are not escapes;
    /// unknown codes under a known tag resolve to the neutral attribute.
    pub fn resolve(tag: char, code: char) -> Option<Self> {
        match tag {
            COLOR_TAG => Some(Self::Color(color_for_code(code))),
            _ => None,
        }
    }

    pub fn markup(&self) -> String {
        match self {
            Self::Color(rgb) => format!("<color={}>", rgb.hex()),
        }
    }
}

fn color_for_code(code: char) -> Rgb {
    match code {
        '1' => Rgb::YELLOW,
        '2' => Rgb::RED,
        '3' => Rgb::SKY_BLUE,
        '4' => Rgb::GREEN,
        _ => Rgb::WHITE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealUnit {
    Char(char),
    Directive(FormatDirective),
}

/// The displayed portion of a reveal. Units are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealBuffer {
    units: Vec<RevealUnit>,
}

impl RevealBuffer {
    pub fn units(&self) -> &[RevealUnit] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn plain_text(&self) -> String {
        self.units
            .iter()
            .filter_map(|unit| match unit {
                RevealUnit::Char(ch) => Some(*ch),
                RevealUnit::Directive(_) => None,
            })
            .collect()
    }

    pub fn markup(&self) -> String {
        let mut out = String::new();
        for unit in &self.units {
            match unit {
                RevealUnit::Char(ch) => out.push(*ch),
                RevealUnit::Directive(directive) => out.push_str(&directive.markup()),
            }
        }
        out
    }

    fn push(&mut self, unit: RevealUnit) {
        self.units.push(unit);
    }

    fn clear(&mut self) {
        self.units.clear();
    }
}

#[derive(Debug, Clone)]
pub struct PitchJitter {
    rng: StdRng,
    min: f32,
    max: f32,
}

impl PitchJitter {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            min: PITCH_JITTER_MIN,
            max: PITCH_JITTER_MAX,
        }
    }

    pub fn next_pitch(&mut self) -> f32 {
        self.rng.random_range(self.min..=self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypedRevealOptions {
    pub character_interval_seconds: f32,
    pub skip_silent_characters: bool,
}

impl Default for TypedRevealOptions {
    fn default() -> Self {
        Self {
            character_interval_seconds: DEFAULT_CHARACTER_INTERVAL_SECONDS,
            skip_silent_characters: true,
        }
    }
}

/// Typewriter-style text reveal advanced once per tick.
///
/// One "step" is either a single character or a complete `@Cx` escape; an
/// escape is never partially displayed. Audible characters request one audio
/// cue with a jittered pitch, then the reveal waits for the configured interval.
/// After the last character the reveal still waits one interval before it
/// reports that it stopped running.
#[derive(Debug, Clone)]
pub struct TypedReveal {
    source: Vec<char>,
    cursor: usize,
    buffer: RevealBuffer,
    running: bool,
    wait_remaining: f32,
    options: TypedRevealOptions,
    jitter: PitchJitter,
    cue_in_flight: bool,
}

impl TypedReveal {
    pub fn new(options: TypedRevealOptions, jitter: PitchJitter) -> Self {
        Self {
            source: Vec::new(),
            cursor: 0,
            buffer: RevealBuffer::default(),
            running: false,
            wait_remaining: 0.0,
            options,
            jitter,
            cue_in_flight: false,
        }
    }

    /// Starts revealing `text` from the beginning, discarding any reveal in progress.
    pub fn start(&mut self, text: &str) {
        self.source = text.chars().collect();
        self.cursor = 0;
        self.buffer.clear();
        self.wait_remaining = 0.0;
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn buffer(&self) -> &RevealBuffer {
        &self.buffer
    }

    pub fn options(&self) -> TypedRevealOptions {
        self.options
    }

    /// Advances by one tick. Returns `true` if the displayed buffer changed.
    pub fn advance(&mut self, dt_seconds: f32, audio: &mut dyn AudioCue) -> bool {
        if !self.running {
            return false;
        }

        let interval = self.options.character_interval_seconds;
        if interval <= 0.0 || !interval.is_finite() {
            return self.reveal_all(audio);
        }

        if self.wait_remaining > 0.0 {
            self.wait_remaining -= dt_seconds.max(0.0);
            if self.wait_remaining > WAIT_EPSILON_SECONDS {
                return false;
            }
        }

        let mut changed = false;
        loop {
            if self.cursor >= self.source.len() {
                self.running = false;
                debug!(length = self.source.len(), "typed_reveal_finished");
                return changed;
            }

            let unit = self.take_step();
            self.buffer.push(unit);
            changed = true;
            if let RevealUnit::Char(ch) = unit {
                if self.is_audible(ch) {
                    audio.play_one_shot(self.jitter.next_pitch());
                    self.cue_in_flight = true;
                }
                self.wait_remaining = interval;
                return changed;
            }
        }
    }

    /// Halts the reveal, silences any cue it started and empties the display.
    /// Safe to call at any time, any number of times.
    pub fn stop_and_clear(&mut self, audio: &mut dyn AudioCue) {
        if self.cue_in_flight {
            audio.stop();
            self.cue_in_flight = false;
        }
        self.buffer.clear();
        self.running = false;
        self.wait_remaining = 0.0;
    }

    /// Reveals the rest in one go. Audible characters still cue, all in this tick.
    fn reveal_all(&mut self, audio: &mut dyn AudioCue) -> bool {
        let mut changed = false;
        while self.cursor < self.source.len() {
            let unit = self.take_step();
            if let RevealUnit::Char(ch) = unit {
                if self.is_audible(ch) {
                    audio.play_one_shot(self.jitter.next_pitch());
                    self.cue_in_flight = true;
                }
            }
            self.buffer.push(unit);
            changed = true;
        }
        self.running = false;
        changed
    }

    fn take_step(&mut self) -> RevealUnit {
        let ch = self.source[self.cursor];
        if ch == ESCAPE_MARKER && self.cursor + 2 < self.source.len() {
            let tag = self.source[self.cursor + 1];
            let code = self.source[self.cursor + 2];
            if let Some(directive) = FormatDirective::resolve(tag, code) {
                self.cursor += 3;
                return RevealUnit::Directive(directive);
            }
        }
        self.cursor += 1;
        RevealUnit::Char(ch)
    }

    fn is_audible(&self, ch: char) -> bool {
        !self.options.skip_silent_characters || ch.is_alphanumeric()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::audio::RecordingAudio;

    const DT: f32 = 0.05;

    fn reveal_with_interval(interval: f32) -> TypedReveal {
        TypedReveal::new(
            TypedRevealOptions {
                character_interval_seconds: interval,
                skip_silent_characters: true,
            },
            PitchJitter::seeded(7),
        )
    }

    fn run_to_end(reveal: &mut TypedReveal, audio: &mut RecordingAudio) -> Vec<String> {
        let mut frames = Vec::new();
        for _ in 0..1000 {
            if !reveal.is_running() {
                break;
            }
            if reveal.advance(DT, audio) {
                frames.push(reveal.buffer().markup());
            }
        }
        frames
    }

    #[test]
    fn reveals_one_character_per_interval() {
        let mut reveal = reveal_with_interval(DT);
        let mut audio = RecordingAudio::default();
        reveal.start("Hi!");

        let frames = run_to_end(&mut reveal, &mut audio);

        assert_eq!(frames, vec!["H", "Hi", "Hi!"]);
        assert!(!reveal.is_running());
        assert_eq!(reveal.cursor(), 3);
    }

    #[test]
    fn keeps_running_for_one_interval_after_last_character() {
        let mut reveal = reveal_with_interval(DT);
        let mut audio = RecordingAudio::default();
        reveal.start("A");

        assert!(reveal.advance(DT, &mut audio));
        assert!(reveal.is_running());
        assert!(!reveal.advance(DT, &mut audio));
        assert!(!reveal.is_running());
    }

    #[test]
    fn color_escape_is_spliced_as_single_step() {
        let mut reveal = reveal_with_interval(DT);
        let mut audio = RecordingAudio::default();
        reveal.start("a@C2b");

        let frames = run_to_end(&mut reveal, &mut audio);

        assert_eq!(frames, vec!["a", "a<color=#FF0000>b"]);
        assert_eq!(reveal.buffer().plain_text(), "ab");
    }

    #[test]
    fn unknown_color_code_maps_to_white() {
        let mut reveal = reveal_with_interval(DT);
        let mut audio = RecordingAudio::default();
        reveal.start("@C9x");

        run_to_end(&mut reveal, &mut audio);

        assert_eq!(reveal.buffer().markup(), "<color=#FFFFFF>x");
    }

    #[test]
    fn trailing_or_unknown_escape_is_literal_text() {
        let mut reveal = reveal_with_interval(0.0);
        let mut audio = RecordingAudio::default();
        reveal.start("x@C");
        reveal.advance(DT, &mut audio);
        assert_eq!(reveal.buffer().markup(), "x@C");

        reveal.start("@Z1");
        reveal.advance(DT, &mut audio);
        assert_eq!(reveal.buffer().markup(), "@Z1");
    }

    #[test]
    fn silent_characters_do_not_play_cues() {
        let mut reveal = reveal_with_interval(DT);
        let mut audio = RecordingAudio::default();
        reveal.start("a, b.");

        run_to_end(&mut reveal, &mut audio);

        assert_eq!(audio.one_shots.len(), 2);
    }

    #[test]
    fn every_character_is_audible_when_silence_skipping_is_off() {
        let mut reveal = TypedReveal::new(
            TypedRevealOptions {
                character_interval_seconds: DT,
                skip_silent_characters: false,
            },
            PitchJitter::seeded(1),
        );
        let mut audio = RecordingAudio::default();
        reveal.start("a, b.");

        run_to_end(&mut reveal, &mut audio);

        assert_eq!(audio.one_shots.len(), 5);
    }

    #[test]
    fn cue_pitch_stays_within_jitter_range() {
        let mut reveal = reveal_with_interval(DT);
        let mut audio = RecordingAudio::default();
        reveal.start("abcdefghijklmnopqrstuvwxyz0123456789");

        run_to_end(&mut reveal, &mut audio);

        assert_eq!(audio.one_shots.len(), 36);
        assert!(audio
            .one_shots
            .iter()
            .all(|pitch| (PITCH_JITTER_MIN..=PITCH_JITTER_MAX).contains(pitch)));
    }

    #[test]
    fn same_seed_produces_same_pitches() {
        let mut first = PitchJitter::seeded(42);
        let mut second = PitchJitter::seeded(42);
        for _ in 0..8 {
            assert_eq!(first.next_pitch(), second.next_pitch());
        }
    }

    #[test]
    fn revealed_prefix_never_shrinks_while_running() {
        let mut reveal = reveal_with_interval(0.02);
        let mut audio = RecordingAudio::default();
        reveal.start("@C1Hello @C3world");
        let mut previous_len = 0;
        while reveal.is_running() {
            reveal.advance(DT, &mut audio);
            let len = reveal.buffer().units().len();
            assert!(len >= previous_len);
            previous_len = len;
        }
        assert_eq!(reveal.buffer().plain_text(), "Hello world");
    }

    #[test]
    fn non_positive_interval_reveals_everything_in_one_tick() {
        let mut reveal = reveal_with_interval(0.0);
        let mut audio = RecordingAudio::default();
        reveal.start("do ne!");

        assert!(reveal.advance(DT, &mut audio));
        assert!(!reveal.is_running());
        assert_eq!(reveal.buffer().plain_text(), "do ne!");
        assert_eq!(audio.one_shots.len(), 4);
    }

    #[test]
    fn stop_and_clear_is_idempotent_and_safe_when_idle() {
        let mut audio = RecordingAudio::default();

        let mut idle = reveal_with_interval(DT);
        idle.stop_and_clear(&mut audio);
        idle.stop_and_clear(&mut audio);
        assert!(!idle.is_running());
        assert!(idle.buffer().is_empty());

        let mut busy = reveal_with_interval(DT);
        busy.start("Hello");
        busy.advance(DT, &mut audio);
        busy.stop_and_clear(&mut audio);
        busy.stop_and_clear(&mut audio);
        assert!(!busy.is_running());
        assert!(busy.buffer().is_empty());
        assert_eq!(audio.stop_count, 1);
        assert!(!busy.advance(DT, &mut audio));
    }

    #[test]
    fn restarting_discards_previous_progress() {
        let mut reveal = reveal_with_interval(DT);
        let mut audio = RecordingAudio::default();
        reveal.start("first");
        reveal.advance(DT, &mut audio);
        reveal.advance(DT, &mut audio);

        reveal.start("second");
        assert_eq!(reveal.cursor(), 0);
        assert!(reveal.buffer().is_empty());
        reveal.advance(DT, &mut audio);
        assert_eq!(reveal.buffer().plain_text(), "s");
    }
}
