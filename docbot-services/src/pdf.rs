//! Page-by-page text extraction.
//!
//! Pages with a text layer are read with lopdf. Blank pages fall back to an
//! optional [`OcrEngine`]; whatever happens, every page yields exactly one
//! string so page indices stay aligned with the document.

use std::path::Path;
use std::process::Command;

use lopdf::Document;
use uuid::Uuid;

use crate::config::OcrConfig;
use crate::error::{Result, ServiceError};

/// Stable identifier for a document's bytes. Identical uploads map to the
/// same id, which is used as the relay room.
pub fn document_id(bytes: &[u8]) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, bytes)
}

/// Text shown for a page nothing could be read from. `number` is 1-based.
pub fn no_text_placeholder(number: u32) -> String {
    format!("Page {number} has no extractable text.")
}

/// Turns PDF bytes into page texts.
pub trait PdfTextSource: Send + Sync {
    /// One string per page, in page order.
    fn extract(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

/// Reads text from a page image.
pub trait OcrEngine: Send + Sync {
    /// Recognise the text of 1-based page `number` of `pdf`. Fails with
    /// [`ServiceError::Rasterize`] when no page image could be produced.
    fn recognize_page(&self, pdf: &[u8], number: u32) -> Result<String>;
}

/// lopdf text layer with optional OCR for blank pages.
pub struct LopdfTextSource {
    ocr: Option<Box<dyn OcrEngine>>,
}

impl LopdfTextSource {
    /// Text layer only; blank pages get the placeholder.
    pub fn new() -> Self {
        Self { ocr: None }
    }

    /// Text layer first, `ocr` for blank pages.
    pub fn with_ocr(ocr: Box<dyn OcrEngine>) -> Self {
        Self { ocr: Some(ocr) }
    }

    /// OCR on or off as configured.
    pub fn from_config(config: &OcrConfig) -> Self {
        if config.enabled {
            Self::with_ocr(Box::new(TesseractOcr::from_config(config)))
        } else {
            Self::new()
        }
    }

    /// Text for a page without a text layer. A rasterization failure turns
    /// OCR off for the rest of the document.
    fn fallback(&self, bytes: &[u8], number: u32, ocr_usable: &mut bool) -> String {
        let Some(ocr) = self.ocr.as_ref().filter(|_| *ocr_usable) else {
            return no_text_placeholder(number);
        };
        match ocr.recognize_page(bytes, number) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => no_text_placeholder(number),
            Err(ServiceError::Rasterize(e)) => {
                log::warn!("OCR conversion failed; make sure Poppler is installed properly ({e})");
                *ocr_usable = false;
                no_text_placeholder(number)
            }
            Err(e) => {
                log::warn!("OCR failed on page {number}: {e}");
                format!("Error during OCR on Page {number}: {e}")
            }
        }
    }
}

impl Default for LopdfTextSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfTextSource for LopdfTextSource {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let document = Document::load_mem(bytes).map_err(|e| ServiceError::Document(e.to_string()))?;
        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(ServiceError::Document("document has no pages".to_string()));
        }

        let mut texts = Vec::with_capacity(pages.len());
        let mut ocr_usable = true;
        for &number in pages.keys() {
            let text = document.extract_text(&[number]).unwrap_or_else(|e| {
                log::debug!("No text layer on page {number}: {e}");
                String::new()
            });
            if text.trim().is_empty() {
                texts.push(self.fallback(bytes, number, &mut ocr_usable));
            } else {
                texts.push(text);
            }
        }

        log::info!("Extracted {} pages", texts.len());
        Ok(texts)
    }
}

/// Rasterise with `pdftoppm`, then read the image with `tesseract`.
pub struct TesseractOcr {
    pdftoppm: String,
    tesseract: String,
    dpi: u32,
}

impl TesseractOcr {
    /// Programs and resolution from `config`.
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            pdftoppm: config.pdftoppm.clone(),
            tesseract: config.tesseract.clone(),
            dpi: config.dpi,
        }
    }

    fn run(program: &str, command: &mut Command) -> Result<Vec<u8>> {
        let output = command
            .output()
            .map_err(|e| ServiceError::Ocr(format!("{program}: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::Ocr(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    fn rasterize(&self, input: &Path, number: u32, prefix: &Path) -> Result<()> {
        let page = number.to_string();
        Self::run(
            &self.pdftoppm,
            Command::new(&self.pdftoppm)
                .args(["-f", &page, "-l", &page, "-r", &self.dpi.to_string()])
                .args(["-png", "-singlefile"])
                .arg(input)
                .arg(prefix),
        )
        .map_err(|e| match e {
            ServiceError::Ocr(msg) => ServiceError::Rasterize(msg),
            other => other,
        })?;
        Ok(())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_page(&self, pdf: &[u8], number: u32) -> Result<String> {
        let dir = tempfile::tempdir().map_err(|e| ServiceError::Ocr(e.to_string()))?;
        let input = dir.path().join("input.pdf");
        std::fs::write(&input, pdf).map_err(|e| ServiceError::Ocr(e.to_string()))?;

        let prefix = dir.path().join("page");
        self.rasterize(&input, number, &prefix)?;

        let image = prefix.with_extension("png");
        let stdout = Self::run(
            &self.tesseract,
            Command::new(&self.tesseract).arg(&image).arg("stdout"),
        )?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}
