//! Mapping of sanitised options onto the WeasyPrint command line.

use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::Path,
};

use super::options::{DEFAULT_MEDIA_TYPE, RenderOptions};

const DEFAULT_JPEG_QUALITY: u16 = 80;
const DEFAULT_DPI: u16 = 96;
const DEFAULT_TIMEOUT: u16 = 30;

/// Positional output marker: write the PDF to standard output.
pub const STDOUT_MARKER: &str = "-";

/// Ordered renderer arguments: flags, stylesheets, attachments, source, output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentSequence(Vec<OsString>);

impl ArgumentSequence {
    /// Flags for every option that differs from the renderer's own default.
    pub fn from_options(options: Option<&RenderOptions>) -> Self {
        let mut sequence = Self::default();
        let Some(options) = options else {
            return sequence;
        };

        sequence.value("--encoding", options.encoding.as_deref());
        let media_type = options.media_type.as_str();
        if !media_type.is_empty() && media_type != DEFAULT_MEDIA_TYPE {
            sequence.pair("--media-type", media_type);
        }
        sequence.value("--base-url", options.base_url.as_deref());
        sequence.value("--pdf-identifier", options.pdf_identifier.as_deref());
        sequence.value(
            "--pdf-variant",
            options.pdf_variant.map(|variant| variant.as_str()),
        );
        sequence.value("--pdf-version", options.pdf_version.as_deref());

        sequence.flag("--pdf-forms", options.pdf_forms);
        sequence.flag("--uncompressed-pdf", options.uncompressed_pdf);
        sequence.flag("--custom-metadata", options.custom_metadata);
        sequence.flag("--presentational-hints", options.presentational_hints);
        sequence.flag("--srgb", options.srgb);
        sequence.flag("--optimize-images", options.optimize_images);
        sequence.flag("--full-fonts", options.full_fonts);
        sequence.flag("--hinting", options.hinting);

        sequence.number("--jpeg-quality", options.jpeg_quality, DEFAULT_JPEG_QUALITY);
        sequence.number("--dpi", options.dpi, DEFAULT_DPI);
        if let Some(folder) = options.cache_folder.as_deref() {
            sequence.pair("--cache-folder", folder);
        }
        sequence.number("--timeout", options.timeout, DEFAULT_TIMEOUT);

        sequence.flag("--verbose", options.verbose);
        sequence.flag("--debug", options.debug);
        sequence.flag("--quiet", options.quiet);

        sequence
    }

    pub fn with_stylesheets<P: AsRef<Path>>(mut self, stylesheets: &[P]) -> Self {
        for path in stylesheets {
            self.pair("--stylesheet", path.as_ref());
        }
        self
    }

    pub fn with_attachments<P: AsRef<Path>>(mut self, attachments: &[P]) -> Self {
        for path in attachments {
            self.pair("--attachment", path.as_ref());
        }
        self
    }

    /// Append the positional source and the standard-output marker.
    pub fn with_source(mut self, source: impl AsRef<OsStr>) -> Self {
        self.0.push(source.as_ref().to_os_string());
        self.0.push(OsString::from(STDOUT_MARKER));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &OsString> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn flag(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.0.push(OsString::from(name));
        }
    }

    fn pair(&mut self, name: &str, value: impl AsRef<OsStr>) {
        self.0.push(OsString::from(name));
        self.0.push(value.as_ref().to_os_string());
    }

    fn value(&mut self, name: &str, value: Option<&str>) {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            self.pair(name, value);
        }
    }

    fn number(&mut self, name: &str, value: Option<u16>, renderer_default: u16) {
        if let Some(value) = value.filter(|value| *value != 0 && *value != renderer_default) {
            self.pair(name, value.to_string());
        }
    }
}

impl fmt::Display for ArgumentSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, argument) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", argument.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Build the flag portion of a renderer invocation.
pub fn build_arguments(options: Option<&RenderOptions>) -> ArgumentSequence {
    ArgumentSequence::from_options(options)
}
