//! Codec registry and canonicalization.
//!
//! The [`Encoder`] keeps named [`Codec`]s and reduces input to its simplest
//! form with [`Encoder::canonicalize`]: every configured codec is applied in
//! turn until a full pass changes nothing. Input that needed more than one
//! pass (multiple encoding) or more than one codec (mixed encoding) is
//! reported, and rejected in strict mode.
//!
//! Built-in codecs are registered under these names:
//!
//! | Name | Codec |
//! |---|---|
//! | `Html` | [`HtmlCodec`] |
//! | `HtmlAttribute` | [`HtmlAttributeCodec`] |
//! | `Xml` | [`XmlCodec`] |
//! | `Url` | [`UrlCodec`] |
//! | `Base64` | [`Base64Codec`] |
//! | `JavaScript` | [`JavaScriptCodec`] |
//! | `VbScript` | [`VbScriptCodec`] |

mod base64;
mod html;
mod script;
mod url;

use std::fmt;
use std::sync::Arc;

pub use self::base64::Base64Codec;
pub use self::html::{HtmlAttributeCodec, HtmlCodec, XmlCodec};
pub use self::script::{JavaScriptCodec, VbScriptCodec};
pub use self::url::UrlCodec;

use crate::config::EncoderConfig;
use crate::error::{ConfigError, EncodingError};
use crate::logging::{LogEventType, LogLevel, LoggerSink, TracingLogger};
use crate::repository::{NamedObjectRepository, ObjectRepository};

/// A stateless encode/decode pair.
///
/// `decode` performs one level of decoding and must return its input
/// unchanged when there is nothing to decode.
pub trait Codec: Send + Sync {
    /// Encodes `input`.
    fn encode(&self, input: &str) -> String;

    /// Decodes one level of encoding from `input`.
    fn decode(&self, input: &str) -> String;
}

/// Named codec registry with canonicalization.
///
/// # Example
///
/// ```
/// use esapi_core::{Encoder, EncodingError};
///
/// let encoder = Encoder::new();
/// assert_eq!(encoder.canonicalize("%3Cb%3E", true)?, "<b>");
///
/// // URL-encoded HTML entities: two passes and two codecs were needed
/// let err = encoder.canonicalize("%26lt%3Bscript%26gt%3B", true).unwrap_err();
/// assert!(matches!(err, EncodingError::MultipleMixedEncoding { found: 2, mixed: 2 }));
/// # Ok::<(), EncodingError>(())
/// ```
pub struct Encoder {
    codecs: NamedObjectRepository<Arc<dyn Codec>>,
    config: EncoderConfig,
    logger: Arc<dyn LoggerSink>,
}

impl Encoder {
    /// Creates an encoder with the built-in codecs and default settings.
    pub fn new() -> Self {
        Self::with_config(EncoderConfig::default(), Arc::new(TracingLogger))
    }

    /// Creates an encoder with the built-in codecs.
    pub fn with_config(config: EncoderConfig, logger: Arc<dyn LoggerSink>) -> Self {
        let encoder = Self::empty(config, logger);
        let builtins: [(&str, Arc<dyn Codec>); 7] = [
            ("Html", Arc::new(HtmlCodec)),
            ("HtmlAttribute", Arc::new(HtmlAttributeCodec)),
            ("Xml", Arc::new(XmlCodec)),
            ("Url", Arc::new(UrlCodec)),
            ("Base64", Arc::new(Base64Codec)),
            ("JavaScript", Arc::new(JavaScriptCodec)),
            ("VbScript", Arc::new(VbScriptCodec)),
        ];
        for (name, codec) in builtins {
            // fresh registry, names are distinct
            let _ = encoder.codecs.register(name, codec);
        }
        encoder
    }

    /// Creates an encoder with no codecs.
    pub fn empty(config: EncoderConfig, logger: Arc<dyn LoggerSink>) -> Self {
        Self {
            codecs: NamedObjectRepository::new(),
            config,
            logger,
        }
    }

    /// The active settings.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Registers `codec` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyId`] or [`ConfigError::DuplicateId`].
    pub fn add_codec(&self, name: &str, codec: Arc<dyn Codec>) -> Result<(), ConfigError> {
        self.codecs.register(name, codec)
    }

    /// Unregisters and returns the codec named `name`.
    pub fn remove_codec(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.revoke(name)
    }

    /// Returns the codec named `name`.
    pub fn codec(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.lookup(name)
    }

    /// Names of the registered codecs, in registration order.
    pub fn codec_names(&self) -> Vec<String> {
        self.codecs.ids()
    }

    /// Encodes `input` with the codec named `codec_name`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::UnknownCodec`] if no such codec is registered.
    pub fn encode(&self, codec_name: &str, input: &str) -> Result<String, EncodingError> {
        Ok(self.require(codec_name)?.encode(input))
    }

    /// Decodes `input` with the codec named `codec_name`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::UnknownCodec`] if no such codec is registered.
    pub fn decode(&self, codec_name: &str, input: &str) -> Result<String, EncodingError> {
        Ok(self.require(codec_name)?.decode(input))
    }

    /// Canonicalizes with the configured codecs and strictness.
    ///
    /// # Errors
    ///
    /// See [`canonicalize_with`](Self::canonicalize_with).
    pub fn canonicalize_default(&self, input: &str) -> Result<String, EncodingError> {
        self.canonicalize(input, self.config.strict)
    }

    /// Canonicalizes with the configured codecs.
    ///
    /// # Errors
    ///
    /// See [`canonicalize_with`](Self::canonicalize_with).
    pub fn canonicalize(&self, input: &str, strict: bool) -> Result<String, EncodingError> {
        self.canonicalize_with(self.config.canonicalization_codecs.as_slice(), input, strict)
    }

    /// Decodes `input` with `codec_names` until it stops changing.
    ///
    /// Each pass applies every named codec once, in order. Empty or unknown
    /// names are skipped and empty input is returned without running any
    /// codec. Multiple encoding (more than one pass changed the value) and
    /// mixed encoding (the decoding codec switched at least once) are logged
    /// as security warnings, or rejected when `strict` is set.
    ///
    /// # Errors
    ///
    /// In strict mode, returns [`EncodingError::MultipleMixedEncoding`],
    /// [`EncodingError::MultipleEncoding`] or [`EncodingError::MixedEncoding`].
    /// In both modes, returns [`EncodingError::DidNotConverge`] when more than
    /// `max_passes` passes change the value.
    pub fn canonicalize_with<S: AsRef<str>>(
        &self,
        codec_names: &[S],
        input: &str,
        strict: bool,
    ) -> Result<String, EncodingError> {
        if input.is_empty() {
            return Ok(String::new());
        }

        let codecs: Vec<(&str, Arc<dyn Codec>)> = codec_names
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !name.is_empty())
            .filter_map(|name| self.codecs.lookup(name).map(|codec| (name, codec)))
            .collect();

        let mut working = input.to_string();
        let mut last_codec: Option<&str> = None;
        let mut found_count = 0;
        let mut mixed_count = 1;
        let mut clean = false;

        while !clean {
            clean = true;
            for &(name, ref codec) in &codecs {
                let decoded = codec.decode(&working);
                if decoded == working {
                    continue;
                }
                if last_codec.is_some_and(|last| last != name) {
                    mixed_count += 1;
                }
                last_codec = Some(name);
                if clean {
                    found_count += 1;
                }
                clean = false;
                working = decoded;
            }

            if found_count > self.config.max_passes {
                let err = EncodingError::DidNotConverge {
                    passes: found_count,
                };
                self.logger
                    .log(LogLevel::Error, LogEventType::Security, &err.to_string());
                return Err(err);
            }
        }

        let detected = if found_count >= 2 && mixed_count > 1 {
            Some(EncodingError::MultipleMixedEncoding {
                found: found_count,
                mixed: mixed_count,
            })
        } else if found_count >= 2 {
            Some(EncodingError::MultipleEncoding { found: found_count })
        } else if mixed_count > 1 {
            Some(EncodingError::MixedEncoding { mixed: mixed_count })
        } else {
            None
        };

        if let Some(err) = detected {
            if strict {
                self.logger.log(
                    LogLevel::Error,
                    LogEventType::Security,
                    &format!("INTRUSION - {err}"),
                );
                return Err(err);
            }
            self.logger
                .log(LogLevel::Warning, LogEventType::Security, &err.to_string());
        }
        Ok(working)
    }

    fn require(&self, codec_name: &str) -> Result<Arc<dyn Codec>, EncodingError> {
        self.codecs
            .lookup(codec_name)
            .ok_or_else(|| EncodingError::UnknownCodec(codec_name.to_string()))
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("codecs", &self.codecs.ids())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RecordingLogger;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording(config: EncoderConfig) -> (Encoder, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::new());
        (Encoder::with_config(config, logger.clone()), logger)
    }

    struct CountingCodec(AtomicUsize);

    impl Codec for CountingCodec {
        fn encode(&self, input: &str) -> String {
            input.to_string()
        }

        fn decode(&self, input: &str) -> String {
            self.0.fetch_add(1, Ordering::SeqCst);
            input.to_string()
        }
    }

    /// Strips one trailing `!` per decode, so `n` marks need `n` passes.
    struct BangCodec;

    impl Codec for BangCodec {
        fn encode(&self, input: &str) -> String {
            format!("{input}!")
        }

        fn decode(&self, input: &str) -> String {
            input.strip_suffix('!').unwrap_or(input).to_string()
        }
    }

    #[test]
    fn builtins_are_registered() {
        let encoder = Encoder::new();
        assert_eq!(
            encoder.codec_names(),
            vec!["Html", "HtmlAttribute", "Xml", "Url", "Base64", "JavaScript", "VbScript"]
        );
        assert_eq!(encoder.encode("Html", "<").unwrap(), "&lt;");
        assert_eq!(encoder.decode("Url", "%3C").unwrap(), "<");
    }

    #[test]
    fn unknown_codec_is_an_error() {
        let encoder = Encoder::new();
        assert_eq!(
            encoder.encode("Rot13", "x").unwrap_err(),
            EncodingError::UnknownCodec("Rot13".into())
        );
        assert!(encoder.decode("", "x").is_err());
    }

    #[test]
    fn codecs_can_be_replaced() {
        let encoder = Encoder::new();
        assert!(encoder.add_codec("Html", Arc::new(XmlCodec)).is_err());
        assert!(encoder.remove_codec("Html").is_some());
        encoder.add_codec("Html", Arc::new(XmlCodec)).unwrap();
        assert_eq!(encoder.decode("Html", "&copy;").unwrap(), "&copy;");
    }

    #[test]
    fn empty_input_runs_no_codec() {
        let encoder = Encoder::empty(EncoderConfig::default(), Arc::new(TracingLogger));
        let counting = Arc::new(CountingCodec(AtomicUsize::new(0)));
        encoder.add_codec("Count", counting.clone()).unwrap();

        assert_eq!(encoder.canonicalize_with(&["Count"], "", true).unwrap(), "");
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);

        assert_eq!(encoder.canonicalize_with(&["Count"], "x", true).unwrap(), "x");
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn single_encoding_is_accepted() {
        let (encoder, logger) = recording(EncoderConfig::default());
        assert_eq!(encoder.canonicalize("&lt;b&gt;", true).unwrap(), "<b>");
        assert!(logger.is_empty());
    }

    #[test]
    fn unknown_and_empty_names_are_skipped() {
        let encoder = Encoder::new();
        let names = ["", "Nope", "Url"];
        assert_eq!(encoder.canonicalize_with(&names, "%41", true).unwrap(), "A");
    }

    #[test]
    fn mixed_count_tracks_codec_switches() {
        let (encoder, _) = recording(EncoderConfig::default());
        // url -> html -> url: two codecs, but the decoder switched twice
        let err = encoder
            .canonicalize_with(&["Url", "Html"], "%26%2337%3B3C", true)
            .unwrap_err();
        assert_eq!(err, EncodingError::MultipleMixedEncoding { found: 2, mixed: 3 });
        assert_eq!(
            encoder
                .canonicalize_with(&["Url", "Html"], "%26%2337%3B3C", false)
                .unwrap(),
            "<"
        );
    }

    #[test]
    fn mixed_encoding_strict_and_lenient() {
        let (encoder, logger) = recording(EncoderConfig::default());
        let names = ["Url", "Html"];
        let input = "%26lt%3Bscript%26gt%3B";

        let err = encoder.canonicalize_with(&names, input, true).unwrap_err();
        assert_eq!(err, EncodingError::MixedEncoding { mixed: 2 });
        let errors = logger.records_at(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("INTRUSION - "));

        logger.clear();
        let lenient = encoder.canonicalize_with(&names, input, false).unwrap();
        assert_eq!(lenient, "<script>");
        assert_eq!(logger.records_at(LogLevel::Warning).len(), 1);
    }

    #[test]
    fn multiple_encoding_with_one_codec() {
        let encoder = Encoder::new();
        let err = encoder
            .canonicalize_with(&["Url"], "%253Cb%253E", true)
            .unwrap_err();
        assert_eq!(err, EncodingError::MultipleEncoding { found: 2 });
        assert_eq!(
            encoder
                .canonicalize_with(&["Url"], "%253Cb%253E", false)
                .unwrap(),
            "<b>"
        );
    }

    #[test]
    fn multiple_mixed_encoding() {
        let encoder = Encoder::new();
        let err = encoder
            .canonicalize_with(&["Html", "Url"], "%26lt%3Bb%26gt%3B", true)
            .unwrap_err();
        assert_eq!(err, EncodingError::MultipleMixedEncoding { found: 2, mixed: 2 });
    }

    #[test]
    fn pass_limit_applies_in_both_modes() {
        let config = EncoderConfig {
            max_passes: 3,
            ..EncoderConfig::default()
        };
        let encoder = Encoder::empty(config, Arc::new(TracingLogger));
        encoder.add_codec("Bang", Arc::new(BangCodec)).unwrap();

        let err = encoder
            .canonicalize_with(&["Bang"], "x!!!!", false)
            .unwrap_err();
        assert_eq!(err, EncodingError::DidNotConverge { passes: 4 });
        assert!(encoder.canonicalize_with(&["Bang"], "x!!!!", true).is_err());
        assert_eq!(
            encoder.canonicalize_with(&["Bang"], "x!!!", false).unwrap(),
            "x"
        );
    }
}
