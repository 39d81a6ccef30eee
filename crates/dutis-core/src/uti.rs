//! Type identifier normalization.
//!
//! User input arrives as a file extension, a MIME type, a UTI, or a URL
//! scheme. Everything downstream of [`normalize`] works on the canonical
//! [`TypeIdentifier`] only.

use log::debug;
use serde::Serialize;
use std::fmt;

use crate::directory::HandlerDirectory;
use crate::registry::TagClass;
use crate::{Error, Result};

/// Prefix Launch Services uses for identifiers it synthesizes for unknown tags.
pub const DYNAMIC_PREFIX: &str = "dyn.";

/// How a piece of user input should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeKind {
    Extension,
    MimeType,
    Uti,
    UrlScheme,
}

impl TypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Extension => "extension",
            TypeKind::MimeType => "mime",
            TypeKind::Uti => "uti",
            TypeKind::UrlScheme => "scheme",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "extension" | "ext" | "suffix" => Some(TypeKind::Extension),
            "mime" | "mime-type" => Some(TypeKind::MimeType),
            "uti" => Some(TypeKind::Uti),
            "scheme" | "url" | "url-scheme" => Some(TypeKind::UrlScheme),
            _ => None,
        }
    }

    /// Guess the kind of a bare argument.
    ///
    /// `https://` and `mailto:` are schemes, anything with a `/` is a MIME
    /// type, a leading dot or no dot at all is an extension, and the rest is
    /// taken as a UTI.
    pub fn infer(input: &str) -> Self {
        let input = input.trim();
        if input.ends_with("://") || (input.ends_with(':') && !input.contains('/')) {
            TypeKind::UrlScheme
        } else if input.contains('/') {
            TypeKind::MimeType
        } else if input.starts_with('.') || !input.contains('.') {
            TypeKind::Extension
        } else {
            TypeKind::Uti
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical identifier used for every registry lookup.
///
/// Content types carry a UTI. URL schemes are bound through a separate
/// Launch Services table, so they keep their own variant and display in the
/// `scheme://` pseudo-identifier form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeIdentifier {
    ContentType(String),
    UrlScheme(String),
}

impl TypeIdentifier {
    /// The bare UTI or scheme name handed to the registry.
    pub fn as_str(&self) -> &str {
        match self {
            TypeIdentifier::ContentType(uti) => uti,
            TypeIdentifier::UrlScheme(scheme) => scheme,
        }
    }

    pub fn url_scheme(&self) -> Option<&str> {
        match self {
            TypeIdentifier::UrlScheme(scheme) => Some(scheme),
            TypeIdentifier::ContentType(_) => None,
        }
    }

    pub(crate) fn content_type(uti: &str) -> Self {
        TypeIdentifier::ContentType(uti.to_string())
    }

    pub(crate) fn scheme(scheme: &str) -> Self {
        TypeIdentifier::UrlScheme(scheme.to_string())
    }
}

impl fmt::Display for TypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeIdentifier::ContentType(uti) => f.write_str(uti),
            TypeIdentifier::UrlScheme(scheme) => write!(f, "{scheme}://"),
        }
    }
}

impl Serialize for TypeIdentifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Convert user input into a canonical identifier.
pub fn normalize(directory: &HandlerDirectory<'_>, input: &str, kind: TypeKind) -> Result<TypeIdentifier> {
    let unresolved = || Error::UnresolvedType {
        input: input.to_string(),
        kind,
    };

    let identifier = match kind {
        TypeKind::Uti => {
            let uti = input.trim();
            if !is_valid_uti(uti) {
                return Err(unresolved());
            }
            TypeIdentifier::content_type(uti)
        }
        TypeKind::Extension => {
            let trimmed = input.trim();
            let extension = trimmed.strip_prefix('.').unwrap_or(trimmed).to_ascii_lowercase();
            if extension.is_empty() || extension.contains(['/', '.']) || extension.contains(char::is_whitespace) {
                return Err(unresolved());
            }
            let mapped = directory.preferred_identifier(TagClass::FilenameExtension, &extension)?;
            match static_identifier(mapped).or_else(|| builtin_extension_uti(&extension).map(str::to_string)) {
                Some(uti) => TypeIdentifier::ContentType(uti),
                None => return Err(unresolved()),
            }
        }
        TypeKind::MimeType => {
            let mime = input.trim().to_ascii_lowercase();
            let valid = mime
                .split_once('/')
                .is_some_and(|(top, sub)| !top.is_empty() && !sub.is_empty() && !sub.contains('/'));
            if !valid {
                return Err(unresolved());
            }
            let mapped = directory.preferred_identifier(TagClass::MimeType, &mime)?;
            match static_identifier(mapped) {
                Some(uti) => TypeIdentifier::ContentType(uti),
                None => return Err(unresolved()),
            }
        }
        TypeKind::UrlScheme => {
            let trimmed = input.trim();
            let scheme = trimmed
                .strip_suffix("://")
                .or_else(|| trimmed.strip_suffix(':'))
                .unwrap_or(trimmed)
                .to_ascii_lowercase();
            if !is_valid_scheme(&scheme) {
                return Err(unresolved());
            }
            TypeIdentifier::scheme(&scheme)
        }
    };

    debug!("event=normalized input={input} kind={kind} identifier={identifier}");
    Ok(identifier)
}

/// Drop empty and dynamic identifiers; those mean the OS has no real mapping.
fn static_identifier(mapped: Option<String>) -> Option<String> {
    mapped.filter(|uti| !uti.is_empty() && !uti.starts_with(DYNAMIC_PREFIX))
}

/// Reverse-DNS-like, dot-separated ASCII with at least two components.
pub fn is_valid_uti(uti: &str) -> bool {
    if !uti.is_ascii() {
        return false;
    }
    let mut components = 0;
    for component in uti.split('.') {
        if component.is_empty() || !component.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return false;
        }
        components += 1;
    }
    components >= 2
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Well-known extensions, consulted when the OS table has no static mapping.
pub fn builtin_extension_uti(extension: &str) -> Option<&'static str> {
    let uti = match extension {
        "txt" | "text" | "log" => "public.plain-text",
        "md" | "markdown" => "net.daringfireball.markdown",
        "rtf" => "public.rtf",
        "html" | "htm" => "public.html",
        "xml" => "public.xml",
        "json" => "public.json",
        "csv" => "public.comma-separated-values-text",
        "pdf" => "com.adobe.pdf",
        "jpg" | "jpeg" => "public.jpeg",
        "png" => "public.png",
        "gif" => "com.compuserve.gif",
        "bmp" => "com.microsoft.bmp",
        "tif" | "tiff" => "public.tiff",
        "svg" => "public.svg-image",
        "heic" => "public.heic",
        "doc" => "com.microsoft.word.doc",
        "docx" => "org.openxmlformats.wordprocessingml.document",
        "xls" => "com.microsoft.excel.xls",
        "xlsx" => "org.openxmlformats.spreadsheetml.sheet",
        "ppt" => "com.microsoft.powerpoint.ppt",
        "pptx" => "org.openxmlformats.presentationml.presentation",
        "zip" => "public.zip-archive",
        "tar" => "public.tar-archive",
        "gz" | "tgz" => "org.gnu.gnu-zip-archive",
        "7z" => "org.7-zip.7-zip-archive",
        "mp3" => "public.mp3",
        "wav" => "com.microsoft.waveform-audio",
        "aiff" | "aif" => "public.aiff-audio",
        "m4a" => "com.apple.m4a-audio",
        "mp4" => "public.mpeg-4",
        "avi" => "public.avi",
        "mov" => "com.apple.quicktime-movie",
        "py" => "public.python-script",
        "js" => "com.netscape.javascript-source",
        "rb" => "public.ruby-script",
        "sh" => "public.shell-script",
        "c" => "public.c-source",
        "h" => "public.c-header",
        "cpp" | "cc" | "cxx" => "public.c-plus-plus-source",
        "swift" => "public.swift-source",
        _ => return None,
    };
    Some(uti)
}
