/// Frame metadata - carries frame number and timing info
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub number: u64,
    pub delta: f32,
}

impl FrameInfo {
    pub fn new(number: u64, delta: f32) -> Self {
        Self { number, delta }
    }
}
