//! Preview generation: rasterises the first page of an uploaded PDF into the
//! PNG shown next to the feedback.
//!
//! pdfium is not async-aware, so rendering runs under `spawn_blocking`.

use std::io::Cursor;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use pdfium_render::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::stores::UploadFile;

/// Page scale used for the preview; matches a crisp render on high-DPI screens.
const PREVIEW_SCALE: f32 = 4.0;
/// Longest edge of the rendered preview, in pixels.
const MAX_PREVIEW_EDGE: i32 = 4096;

/// Document-to-image conversion. `Ok(None)` means no preview could be produced.
#[async_trait]
pub trait PreviewConverter: Send + Sync {
    async fn convert(&self, document: &UploadFile) -> Result<Option<UploadFile>>;
}

#[derive(Debug, Error)]
enum PreviewError {
    #[error("pdfium library unavailable: {0}")]
    Bind(String),

    #[error("document could not be opened: {0}")]
    Load(String),

    #[error("first page could not be rendered: {0}")]
    Render(String),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Renders with pdfium, bound from `PDFIUM_LIB_DIR` when set, else from the
/// system library path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumConverter {
    library_dir: Option<String>,
}

impl PdfiumConverter {
    pub fn new(library_dir: Option<String>) -> Self {
        Self { library_dir }
    }
}

#[async_trait]
impl PreviewConverter for PdfiumConverter {
    async fn convert(&self, document: &UploadFile) -> Result<Option<UploadFile>> {
        let bytes = document.bytes.clone();
        let library_dir = self.library_dir.clone();

        let rendered = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, PreviewError> {
            let pdfium = bind_pdfium(library_dir.as_deref())?;
            render_first_page(&pdfium, &bytes)
        })
        .await
        .context("Preview render task panicked")?;

        match rendered {
            Ok(png) => {
                debug!("Rendered preview for '{}' ({} bytes)", document.name, png.len());
                Ok(Some(UploadFile::new(
                    preview_file_name(&document.name),
                    "image/png",
                    Bytes::from(png),
                )))
            }
            Err(e) => {
                warn!("Preview generation for '{}' failed: {e}", document.name);
                Ok(None)
            }
        }
    }
}

fn bind_pdfium(library_dir: Option<&str>) -> Result<Pdfium, PreviewError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PreviewError::Bind(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn render_first_page(pdfium: &Pdfium, pdf: &[u8]) -> Result<Vec<u8>, PreviewError> {
    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| PreviewError::Load(format!("{e:?}")))?;

    let page = document
        .pages()
        .get(0)
        .map_err(|e| PreviewError::Render(format!("{e:?}")))?;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(PREVIEW_SCALE)
        .set_maximum_width(MAX_PREVIEW_EDGE)
        .set_maximum_height(MAX_PREVIEW_EDGE);

    let image = page
        .render_with_config(&render_config)
        .map_err(|e| PreviewError::Render(format!("{e:?}")))?
        .as_image();

    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// `resume.pdf` → `resume.png`; names without a `.pdf` suffix get `.png` appended.
fn preview_file_name(document_name: &str) -> String {
    let lower = document_name.to_ascii_lowercase();
    let stem = if lower.ends_with(".pdf") {
        &document_name[..document_name.len() - 4]
    } else {
        document_name
    };
    format!("{stem}.png")
}
