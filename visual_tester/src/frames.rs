use anyhow::{Context, Result, bail};
use image::GrayImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// Grayscale frames in analysis order.
pub enum FrameSource {
    Directory(ImageDirectory),
    #[cfg(feature = "opencv")]
    Video(video::VideoFrames),
}

impl FrameSource {
    /// Opens a directory of still images, or a video file when built with `opencv`.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::Directory(ImageDirectory::open(path)?));
        }
        #[cfg(feature = "opencv")]
        {
            Ok(Self::Video(video::VideoFrames::open(path)?))
        }
        #[cfg(not(feature = "opencv"))]
        {
            bail!(
                "{} is not a directory; reading video files needs the `opencv` feature",
                path.display()
            )
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Directory(directory) => directory.dimensions,
            #[cfg(feature = "opencv")]
            Self::Video(video) => video.dimensions,
        }
    }
}

impl Iterator for FrameSource {
    type Item = GrayImage;

    fn next(&mut self) -> Option<GrayImage> {
        match self {
            Self::Directory(directory) => directory.next(),
            #[cfg(feature = "opencv")]
            Self::Video(video) => video.next(),
        }
    }
}

/// Image files of a directory, sorted by file name.
pub struct ImageDirectory {
    paths: std::vec::IntoIter<PathBuf>,
    dimensions: (u32, u32),
}

impl ImageDirectory {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();

        let Some(first) = paths.first() else {
            bail!("no frames found in {}", dir.display());
        };
        let dimensions = image::image_dimensions(first)
            .with_context(|| format!("failed to read {}", first.display()))?;
        info!(frames = paths.len(), ?dimensions, "reading frames from {}", dir.display());

        Ok(Self {
            paths: paths.into_iter(),
            dimensions,
        })
    }
}

impl Iterator for ImageDirectory {
    type Item = GrayImage;

    /// Ends the sequence at the first unreadable frame, since skipping it would
    /// shift every later frame index.
    fn next(&mut self) -> Option<GrayImage> {
        let path = self.paths.next()?;
        match image::open(&path) {
            Ok(frame) => Some(frame.to_luma8()),
            Err(err) => {
                error!(%err, "failed to read frame {}, stopping", path.display());
                None
            }
        }
    }
}

#[cfg(feature = "opencv")]
mod video {
    use anyhow::{Result, bail};
    use image::GrayImage;
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture},
    };
    use std::path::Path;
    use tracing::{error, info};

    pub struct VideoFrames {
        cap: VideoCapture,
        pub dimensions: (u32, u32),
    }

    impl VideoFrames {
        pub fn open(path: &Path) -> Result<Self> {
            let Some(name) = path.to_str() else {
                bail!("video path {} is not valid UTF-8", path.display());
            };
            let cap = VideoCapture::from_file(name, videoio::CAP_ANY)?;
            if !cap.is_opened()? {
                bail!("failed to open video file {}", path.display());
            }
            let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
            let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
            let fps = cap.get(videoio::CAP_PROP_FPS)?;
            info!(width, height, fps, "reading frames from {}", path.display());

            Ok(Self {
                cap,
                dimensions: (width, height),
            })
        }

        fn read_gray(&mut self) -> Result<Option<GrayImage>> {
            let mut frame = Mat::default();
            if !self.cap.read(&mut frame)? || frame.empty() {
                return Ok(None);
            }
            let mut gray = Mat::default();
            imgproc::cvt_color(&frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
            let (width, height) = self.dimensions;
            Ok(GrayImage::from_raw(width, height, gray.data_bytes()?.to_vec()))
        }
    }

    impl Iterator for VideoFrames {
        type Item = GrayImage;

        fn next(&mut self) -> Option<GrayImage> {
            match self.read_gray() {
                Ok(frame) => frame,
                Err(err) => {
                    error!(%err, "failed to decode video frame, stopping");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn directory_frames_are_read_in_name_order() {
        let dir = std::env::temp_dir().join(format!("visual_tester_frames_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        GrayImage::from_pixel(8, 6, Luma([20])).save(dir.join("frame_002.png")).unwrap();
        GrayImage::from_pixel(8, 6, Luma([10])).save(dir.join("frame_001.png")).unwrap();
        fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let source = FrameSource::open(&dir).unwrap();
        assert_eq!(source.dimensions(), (8, 6));
        let values: Vec<u8> = source.map(|frame| frame.get_pixel(0, 0)[0]).collect();
        assert_eq!(values, vec![10, 20]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
