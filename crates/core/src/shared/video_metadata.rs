/// Stream-level facts about an opened video, used for progress reporting.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Container-reported frame count; 0 when unknown.
    pub total_frames: usize,
}

impl VideoMetadata {
    /// Number of frames the identification loop will look at for a given stride.
    pub fn sampled_frames(&self, stride: usize) -> usize {
        if stride == 0 {
            return 0;
        }
        self.total_frames.div_ceil(stride)
    }
}
