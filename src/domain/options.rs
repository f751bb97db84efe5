//! Sanitisation of client-supplied renderer options.
//!
//! Clients send an untyped JSON object. Only keys listed in [`OPTION_TABLE`]
//! can ever influence the renderer invocation: each entry pairs a key with the
//! validator that writes the corresponding [`RenderOptions`] field. Unknown
//! keys are dropped, and a value that fails its validator leaves the field at
//! its default instead of failing the request.

use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr};

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Untyped option mapping exactly as received from a client.
pub type RawOptions = Map<String, Value>;

/// Media type the renderer assumes when none is given.
pub const DEFAULT_MEDIA_TYPE: &str = "print";

const JPEG_QUALITY_RANGE: (i64, i64) = (0, 95);
const DPI_RANGE: (i64, i64) = (50, 600);
const TIMEOUT_RANGE: (i64, i64) = (1, 300);

/// PDF variants accepted by `--pdf-variant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdfVariant {
    PdfA1b,
    PdfA2b,
    PdfA3b,
    PdfA4b,
    PdfA2u,
    PdfA3u,
    PdfA4u,
    PdfUa1,
    Debug,
}

impl PdfVariant {
    pub const ALL: [PdfVariant; 9] = [
        PdfVariant::PdfA1b,
        PdfVariant::PdfA2b,
        PdfVariant::PdfA3b,
        PdfVariant::PdfA4b,
        PdfVariant::PdfA2u,
        PdfVariant::PdfA3u,
        PdfVariant::PdfA4u,
        PdfVariant::PdfUa1,
        PdfVariant::Debug,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PdfVariant::PdfA1b => "pdf/a-1b",
            PdfVariant::PdfA2b => "pdf/a-2b",
            PdfVariant::PdfA3b => "pdf/a-3b",
            PdfVariant::PdfA4b => "pdf/a-4b",
            PdfVariant::PdfA2u => "pdf/a-2u",
            PdfVariant::PdfA3u => "pdf/a-3u",
            PdfVariant::PdfA4u => "pdf/a-4u",
            PdfVariant::PdfUa1 => "pdf/ua-1",
            PdfVariant::Debug => "debug",
        }
    }
}

impl fmt::Display for PdfVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PdfVariant {
    type Err = OptionRejection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.as_str() == value)
            .ok_or_else(|| OptionRejection::UnknownVariant {
                input: value.to_string(),
            })
    }
}

/// Why a single option value was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionRejection {
    #[error("expected a {expected} value")]
    WrongType { expected: &'static str },
    #[error("`{input}` is not a base-10 integer")]
    Unparsable { input: String },
    #[error("integer value {value} out of range [{min}, {max}]")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("invalid PDF variant `{input}`")]
    UnknownVariant { input: String },
}

/// Sanitised renderer options.
///
/// Every field is either absent/false or holds a value that passed the
/// validator registered for its key. Instances are produced by
/// [`RenderOptions::validate`] (or [`Default`]) and are not mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub(crate) encoding: Option<String>,
    pub(crate) media_type: String,
    pub(crate) base_url: Option<String>,
    pub(crate) pdf_identifier: Option<String>,
    pub(crate) pdf_variant: Option<PdfVariant>,
    pub(crate) pdf_version: Option<String>,
    pub(crate) pdf_forms: bool,
    pub(crate) uncompressed_pdf: bool,
    pub(crate) custom_metadata: bool,
    pub(crate) presentational_hints: bool,
    pub(crate) srgb: bool,
    pub(crate) optimize_images: bool,
    pub(crate) full_fonts: bool,
    pub(crate) hinting: bool,
    pub(crate) jpeg_quality: Option<u16>,
    pub(crate) dpi: Option<u16>,
    pub(crate) cache_folder: Option<PathBuf>,
    pub(crate) timeout: Option<u16>,
    pub(crate) verbose: bool,
    pub(crate) debug: bool,
    pub(crate) quiet: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            base_url: None,
            pdf_identifier: None,
            pdf_variant: None,
            pdf_version: None,
            pdf_forms: false,
            uncompressed_pdf: false,
            custom_metadata: false,
            presentational_hints: false,
            srgb: false,
            optimize_images: false,
            full_fonts: false,
            hinting: false,
            jpeg_quality: None,
            dpi: None,
            cache_folder: None,
            timeout: None,
            verbose: false,
            debug: false,
            quiet: false,
        }
    }
}

impl RenderOptions {
    /// Overlay the recognised entries of `raw` onto the defaults.
    ///
    /// Never fails: unknown keys and invalid values are logged and skipped.
    pub fn validate(raw: &RawOptions) -> Self {
        let mut options = Self::default();

        for (key, value) in raw {
            let Some(apply) = OPTION_INDEX.get(key.as_str()) else {
                warn!(
                    target = "printgate::options",
                    key = %key,
                    "Ignoring unsafe option"
                );
                continue;
            };

            if let Err(rejection) = apply(&mut options, value) {
                warn!(
                    target = "printgate::options",
                    key = %key,
                    error = %rejection,
                    "Ignoring invalid option value"
                );
            }
        }

        options
    }

    /// Attach the server-side cache folder. Clients cannot set this field.
    pub fn with_cache_folder(mut self, cache_folder: Option<PathBuf>) -> Self {
        self.cache_folder = cache_folder;
        self
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn pdf_variant(&self) -> Option<PdfVariant> {
        self.pdf_variant
    }

    pub fn jpeg_quality(&self) -> Option<u16> {
        self.jpeg_quality
    }

    pub fn dpi(&self) -> Option<u16> {
        self.dpi
    }

    pub fn timeout(&self) -> Option<u16> {
        self.timeout
    }
}

type FieldValidator = fn(&mut RenderOptions, &Value) -> Result<(), OptionRejection>;

/// The allow-list. A key absent from this table never reaches the renderer.
const OPTION_TABLE: &[(&str, FieldValidator)] = &[
    ("encoding", |o, v| {
        o.encoding = text(v)?;
        Ok(())
    }),
    ("media_type", |o, v| {
        o.media_type = string(v)?;
        Ok(())
    }),
    ("base_url", |o, v| {
        o.base_url = text(v)?;
        Ok(())
    }),
    ("pdf_identifier", |o, v| {
        o.pdf_identifier = text(v)?;
        Ok(())
    }),
    ("pdf_variant", |o, v| {
        o.pdf_variant = Some(string(v)?.parse()?);
        Ok(())
    }),
    ("pdf_version", |o, v| {
        o.pdf_version = text(v)?;
        Ok(())
    }),
    ("pdf_forms", |o, v| {
        o.pdf_forms = boolean(v)?;
        Ok(())
    }),
    ("uncompressed_pdf", |o, v| {
        o.uncompressed_pdf = boolean(v)?;
        Ok(())
    }),
    ("custom_metadata", |o, v| {
        o.custom_metadata = boolean(v)?;
        Ok(())
    }),
    ("presentational_hints", |o, v| {
        o.presentational_hints = boolean(v)?;
        Ok(())
    }),
    ("srgb", |o, v| {
        o.srgb = boolean(v)?;
        Ok(())
    }),
    ("optimize_images", |o, v| {
        o.optimize_images = boolean(v)?;
        Ok(())
    }),
    ("full_fonts", |o, v| {
        o.full_fonts = boolean(v)?;
        Ok(())
    }),
    ("hinting", |o, v| {
        o.hinting = boolean(v)?;
        Ok(())
    }),
    ("jpeg_quality", |o, v| {
        o.jpeg_quality = bounded_integer(v, JPEG_QUALITY_RANGE)?;
        Ok(())
    }),
    ("dpi", |o, v| {
        o.dpi = bounded_integer(v, DPI_RANGE)?;
        Ok(())
    }),
    ("timeout", |o, v| {
        o.timeout = bounded_integer(v, TIMEOUT_RANGE)?;
        Ok(())
    }),
    ("verbose", |o, v| {
        o.verbose = boolean(v)?;
        Ok(())
    }),
    ("debug", |o, v| {
        o.debug = boolean(v)?;
        Ok(())
    }),
    ("quiet", |o, v| {
        o.quiet = boolean(v)?;
        Ok(())
    }),
];

static OPTION_INDEX: Lazy<HashMap<&'static str, FieldValidator>> =
    Lazy::new(|| OPTION_TABLE.iter().copied().collect());

/// Keys a client may set, in table order.
pub fn allowed_keys() -> impl Iterator<Item = &'static str> {
    OPTION_TABLE.iter().map(|(key, _)| *key)
}

pub fn is_allowed(key: &str) -> bool {
    OPTION_INDEX.contains_key(key)
}

fn string(value: &Value) -> Result<String, OptionRejection> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or(OptionRejection::WrongType { expected: "string" })
}

/// Like [`string`], but an empty string means "not provided".
fn text(value: &Value) -> Result<Option<String>, OptionRejection> {
    string(value).map(|text| (!text.is_empty()).then_some(text))
}

fn boolean(value: &Value) -> Result<bool, OptionRejection> {
    value
        .as_bool()
        .ok_or(OptionRejection::WrongType { expected: "boolean" })
}

/// Accepts integers, floats (truncated toward zero) and base-10 strings.
/// A value of exactly zero is treated as absent.
fn bounded_integer(value: &Value, (min, max): (i64, i64)) -> Result<Option<u16>, OptionRejection> {
    let parsed = match value {
        Value::Number(number) => match number.as_i64() {
            Some(integer) => integer,
            // `as` saturates, so huge floats and u64 values land out of range.
            None => number.as_f64().map_or(i64::MAX, |float| float.trunc() as i64),
        },
        Value::String(input) => input
            .parse::<i64>()
            .map_err(|_| OptionRejection::Unparsable {
                input: input.clone(),
            })?,
        _ => return Err(OptionRejection::WrongType { expected: "integer" }),
    };

    if !(min..=max).contains(&parsed) {
        return Err(OptionRejection::OutOfRange {
            value: parsed,
            min,
            max,
        });
    }

    if parsed == 0 {
        return Ok(None);
    }

    u16::try_from(parsed)
        .map(Some)
        .map_err(|_| OptionRejection::OutOfRange {
            value: parsed,
            min,
            max,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawOptions {
        match value {
            Value::Object(map) => map,
            other => panic!("expected a JSON object, got {other}"),
        }
    }

    #[test]
    fn defaults_only_set_media_type() {
        let options = RenderOptions::validate(&RawOptions::new());
        assert_eq!(options, RenderOptions::default());
        assert_eq!(options.media_type(), "print");
        assert!(options.encoding.is_none());
        assert!(!options.pdf_forms);
    }

    #[test]
    fn allow_list_has_twenty_entries_and_excludes_cache_folder() {
        assert_eq!(allowed_keys().count(), 20);
        assert_eq!(OPTION_INDEX.len(), 20);
        assert!(!is_allowed("cache_folder"));
        assert!(is_allowed("pdf_variant"));
    }

    #[test]
    fn unknown_keys_do_not_change_the_result() {
        let base = json!({
            "encoding": "utf-8",
            "dpi": 300,
            "pdf_forms": true,
        });
        let mut with_extra = base.clone();
        with_extra["cache_folder"] = json!("/etc");
        with_extra["output"] = json!("/tmp/evil.pdf");
        with_extra["--stylesheet"] = json!("x.css");

        assert_eq!(
            RenderOptions::validate(&raw(base)),
            RenderOptions::validate(&raw(with_extra))
        );
    }

    #[test]
    fn accepts_every_listed_pdf_variant() {
        for variant in PdfVariant::ALL {
            let options = RenderOptions::validate(&raw(json!({ "pdf_variant": variant.as_str() })));
            assert_eq!(options.pdf_variant(), Some(variant));
        }
    }

    #[test]
    fn rejects_unlisted_pdf_variants() {
        for input in [json!("pdf/a-1a"), json!("PDF/A-1B"), json!(""), json!(3)] {
            let options = RenderOptions::validate(&raw(json!({ "pdf_variant": input })));
            assert_eq!(options.pdf_variant(), None);
        }
    }

    #[test]
    fn integer_boundaries_are_inclusive() {
        let options = RenderOptions::validate(&raw(json!({
            "jpeg_quality": 95,
            "dpi": 50,
            "timeout": 300,
        })));
        assert_eq!(options.jpeg_quality(), Some(95));
        assert_eq!(options.dpi(), Some(50));
        assert_eq!(options.timeout(), Some(300));

        let options = RenderOptions::validate(&raw(json!({ "dpi": 600, "timeout": 1 })));
        assert_eq!(options.dpi(), Some(600));
        assert_eq!(options.timeout(), Some(1));
    }

    #[test]
    fn out_of_range_integers_fall_back_to_absent() {
        let options = RenderOptions::validate(&raw(json!({
            "jpeg_quality": 96,
            "dpi": 700,
            "timeout": 0,
        })));
        assert_eq!(options.jpeg_quality(), None);
        assert_eq!(options.dpi(), None);
        assert_eq!(options.timeout(), None);

        let options = RenderOptions::validate(&raw(json!({ "dpi": 49, "jpeg_quality": -1 })));
        assert_eq!(options.dpi(), None);
        assert_eq!(options.jpeg_quality(), None);
    }

    #[test]
    fn integers_parse_from_strings_and_truncate_floats() {
        let options = RenderOptions::validate(&raw(json!({
            "jpeg_quality": "80",
            "dpi": 300.9,
            "timeout": "+45",
        })));
        assert_eq!(options.jpeg_quality(), Some(80));
        assert_eq!(options.dpi(), Some(300));
        assert_eq!(options.timeout(), Some(45));
    }

    #[test]
    fn unparsable_or_mistyped_integers_are_dropped() {
        let options = RenderOptions::validate(&raw(json!({
            "jpeg_quality": "high",
            "dpi": " 300",
            "timeout": true,
        })));
        assert_eq!(options.jpeg_quality(), None);
        assert_eq!(options.dpi(), None);
        assert_eq!(options.timeout(), None);
    }

    #[test]
    fn zero_is_treated_as_not_provided() {
        let options = RenderOptions::validate(&raw(json!({ "jpeg_quality": 0 })));
        assert_eq!(options.jpeg_quality(), None);

        let options = RenderOptions::validate(&raw(json!({ "jpeg_quality": 0.7 })));
        assert_eq!(options.jpeg_quality(), None);
    }

    #[test]
    fn huge_numbers_are_out_of_range() {
        let options = RenderOptions::validate(&raw(json!({
            "dpi": 1e300,
            "timeout": u64::MAX,
        })));
        assert_eq!(options.dpi(), None);
        assert_eq!(options.timeout(), None);
    }

    #[test]
    fn booleans_require_boolean_values() {
        let options = RenderOptions::validate(&raw(json!({
            "pdf_forms": true,
            "srgb": "true",
            "hinting": 1,
            "quiet": true,
        })));
        assert!(options.pdf_forms);
        assert!(!options.srgb);
        assert!(!options.hinting);
        assert!(options.quiet);
    }

    #[test]
    fn strings_require_string_values() {
        let options = RenderOptions::validate(&raw(json!({
            "encoding": "latin-1",
            "base_url": 42,
            "media_type": "screen",
            "pdf_identifier": "",
        })));
        assert_eq!(options.encoding.as_deref(), Some("latin-1"));
        assert_eq!(options.base_url, None);
        assert_eq!(options.media_type(), "screen");
        assert_eq!(options.pdf_identifier, None);
    }

    #[test]
    fn mistyped_media_type_keeps_default() {
        let options = RenderOptions::validate(&raw(json!({ "media_type": false })));
        assert_eq!(options.media_type(), DEFAULT_MEDIA_TYPE);
    }

    #[test]
    fn cache_folder_comes_from_the_server_only() {
        let options = RenderOptions::validate(&raw(json!({ "cache_folder": "/client" })))
            .with_cache_folder(Some(PathBuf::from("/var/cache/printgate")));
        assert_eq!(
            options.cache_folder.as_deref(),
            Some(std::path::Path::new("/var/cache/printgate"))
        );
    }
}
