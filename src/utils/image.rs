use crate::config::AssetsConfig;
use crate::error::AppResult;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};

/// Gaussian blur strength applied before pixelation
const BLUR_SIGMA: f32 = 2.6;
/// Obscured images are reduced to this many blocks per side
const PIXELATE_SIZE: u32 = 30;
const COLLAGE_JPEG_QUALITY: u8 = 80;
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// File-system side of prize images: originals live in `image_dir`, obscured
/// copies under the same file name in `hidden_dir`.
#[derive(Clone, Debug)]
pub struct ImageProcessor {
    image_dir: PathBuf,
    hidden_dir: PathBuf,
}

impl ImageProcessor {
    pub fn new(config: &AssetsConfig) -> Self {
        Self {
            image_dir: PathBuf::from(&config.image_dir),
            hidden_dir: PathBuf::from(&config.hidden_dir),
        }
    }

    pub fn original_path(&self, image: &str) -> PathBuf {
        self.image_dir.join(image)
    }

    pub fn hidden_path(&self, image: &str) -> PathBuf {
        self.hidden_dir.join(image)
    }

    /// Writes the blurred and pixelated variant of `image` and returns its path.
    pub async fn obscure(&self, image: &str) -> AppResult<PathBuf> {
        let source = self.original_path(image);
        let target = self.hidden_path(image);
        tokio::fs::create_dir_all(&self.hidden_dir).await?;

        let output = target.clone();
        tokio::task::spawn_blocking(move || -> AppResult<()> {
            let img = image::open(&source)?;
            obscure_image(&img).save(&output)?;
            Ok(())
        })
        .await??;

        log::debug!("Obscured image written to {}", target.display());
        Ok(target)
    }

    /// Tiles the given images into one JPEG. Unreadable images are skipped;
    /// `None` when nothing is left to draw.
    pub async fn collage(&self, images: &[String]) -> AppResult<Option<Vec<u8>>> {
        let paths: Vec<PathBuf> = images.iter().map(|i| self.original_path(i)).collect();

        let encoded = tokio::task::spawn_blocking(move || -> AppResult<Option<Vec<u8>>> {
            let loaded: Vec<DynamicImage> = paths
                .iter()
                .filter_map(|path| match image::open(path) {
                    Ok(img) => Some(img),
                    Err(e) => {
                        log::warn!("Skipping unreadable image {}: {e}", path.display());
                        None
                    }
                })
                .collect();

            let Some(canvas) = compose_grid(&loaded) else {
                return Ok(None);
            };
            let mut buffer = vec![];
            let encoder = JpegEncoder::new_with_quality(&mut buffer, COLLAGE_JPEG_QUALITY);
            DynamicImage::ImageRgb8(canvas).write_with_encoder(encoder)?;
            Ok(Some(buffer))
        })
        .await??;

        Ok(encoded)
    }

    pub async fn store_original(&self, image: &str, bytes: &[u8]) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.image_dir).await?;
        tokio::fs::write(self.original_path(image), bytes).await?;
        Ok(())
    }

    pub async fn read_original(&self, image: &str) -> AppResult<Vec<u8>> {
        Ok(tokio::fs::read(self.original_path(image)).await?)
    }

    /// File names of every image in `image_dir`, sorted. A missing directory is empty.
    pub async fn list_originals(&self) -> AppResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.image_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if has_image_extension(&path)
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Blur, shrink to `PIXELATE_SIZE` blocks, scale back up with nearest neighbour.
pub fn obscure_image(img: &DynamicImage) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    img.blur(BLUR_SIGMA)
        .resize_exact(PIXELATE_SIZE, PIXELATE_SIZE, FilterType::Nearest)
        .resize_exact(width, height, FilterType::Nearest)
}

/// `(columns, rows)` for a collage of `n` images: `columns = floor(sqrt(n))`,
/// `rows = ceil(n / columns)`.
pub fn grid_dimensions(n: usize) -> Option<(u32, u32)> {
    if n == 0 {
        return None;
    }
    let columns = (n as f64).sqrt().floor() as usize;
    let rows = n.div_ceil(columns);
    Some((columns as u32, rows as u32))
}

/// Row-major tiling; every cell takes the first image's dimensions.
pub fn compose_grid(images: &[DynamicImage]) -> Option<RgbImage> {
    let (columns, rows) = grid_dimensions(images.len())?;
    let (cell_w, cell_h) = (images[0].width(), images[0].height());
    let mut canvas = RgbImage::new(columns * cell_w, rows * cell_h);

    for (i, img) in images.iter().enumerate() {
        let (row, col) = (i as u32 / columns, i as u32 % columns);
        let cell = if img.width() == cell_w && img.height() == cell_h {
            img.to_rgb8()
        } else {
            img.resize_exact(cell_w, cell_h, FilterType::Triangle).to_rgb8()
        };
        imageops::replace(
            &mut canvas,
            &cell,
            (col * cell_w) as i64,
            (row * cell_h) as i64,
        );
    }
    Some(canvas)
}
