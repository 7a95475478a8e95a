/// Fire-and-forget sound effect output used for per-character text cues.
pub trait AudioCue {
    fn play_one_shot(&mut self, pitch: f32);
    fn stop(&mut self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioCue for SilentAudio {
    fn play_one_shot(&mut self, _pitch: f32) {}

    fn stop(&mut self) {}
}

/// Audio sink that keeps every request, for headless runs and tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordingAudio {
    pub one_shots: Vec<f32>,
    pub stop_count: usize,
}

impl AudioCue for RecordingAudio {
    fn play_one_shot(&mut self, pitch: f32) {
        self.one_shots.push(pitch);
    }

    fn stop(&mut self) {
        self.stop_count = self.stop_count.saturating_add(1);
    }
}
