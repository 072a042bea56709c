use ndarray::ArrayView3;

use crate::detection::domain::detection::CropRect;

/// A single decoded image: contiguous RGB bytes in row-major order.
///
/// Used for whole video frames as well as person crops cut out of them.
/// Format conversion happens at I/O boundaries only.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Wraps a decoded `image` buffer as a 3-channel frame.
    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels inside `rect` into a new frame.
    ///
    /// The rectangle is clipped to the frame first, so an out-of-bounds
    /// rectangle yields an empty frame instead of panicking.
    pub fn crop(&self, rect: &CropRect) -> Frame {
        let x1 = rect.x1.min(self.width);
        let y1 = rect.y1.min(self.height);
        let x2 = rect.x2.clamp(x1, self.width);
        let y2 = rect.y2.clamp(y1, self.height);

        let channels = self.channels as usize;
        let row_len = (x2 - x1) as usize * channels;
        let mut data = Vec::with_capacity(row_len * (y2 - y1) as usize);

        for row in y1 as usize..y2 as usize {
            let start = (row * self.width as usize + x1 as usize) * channels;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Frame::new(data, x2 - x1, y2 - y1, self.channels, self.index)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
