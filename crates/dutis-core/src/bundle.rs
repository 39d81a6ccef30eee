//! Application bundle metadata from `Contents/Info.plist`.

use plist::{Dictionary, Value};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A document type an application declares in `CFBundleDocumentTypes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentType {
    pub name: Option<String>,
    pub role: Option<String>,
    pub extensions: Vec<String>,
    pub content_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleInfo {
    pub path: PathBuf,
    pub identifier: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub document_types: Vec<DocumentType>,
    pub url_schemes: Vec<String>,
}

impl BundleInfo {
    /// Read an `.app` bundle's Info.plist.
    pub fn open(path: &Path) -> Result<BundleInfo> {
        let info_path = path.join("Contents").join("Info.plist");
        let bundle_error = |message: String| Error::Bundle {
            path: path.to_path_buf(),
            message,
        };
        if !info_path.is_file() {
            return Err(bundle_error("missing Contents/Info.plist".to_string()));
        }

        let value = Value::from_file(&info_path).map_err(|e| bundle_error(e.to_string()))?;
        let dict = value
            .as_dictionary()
            .ok_or_else(|| bundle_error("Info.plist is not a dictionary".to_string()))?;
        let identifier = get_string(dict, "CFBundleIdentifier")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| bundle_error("no CFBundleIdentifier".to_string()))?;

        let document_types = match dict.get("CFBundleDocumentTypes").and_then(Value::as_array) {
            Some(types) => types
                .iter()
                .filter_map(Value::as_dictionary)
                .map(|t| DocumentType {
                    name: get_string(t, "CFBundleTypeName"),
                    role: get_string(t, "CFBundleTypeRole"),
                    extensions: string_array_from_dict(t, "CFBundleTypeExtensions"),
                    content_types: string_array_from_dict(t, "LSItemContentTypes"),
                })
                .collect(),
            None => Vec::new(),
        };

        let url_schemes = match dict.get("CFBundleURLTypes").and_then(Value::as_array) {
            Some(types) => types
                .iter()
                .filter_map(Value::as_dictionary)
                .flat_map(|t| string_array_from_dict(t, "CFBundleURLSchemes"))
                .collect(),
            None => Vec::new(),
        };

        Ok(BundleInfo {
            path: path.to_path_buf(),
            identifier,
            name: get_string(dict, "CFBundleDisplayName").or_else(|| get_string(dict, "CFBundleName")),
            version: get_string(dict, "CFBundleShortVersionString"),
            document_types,
            url_schemes,
        })
    }

    /// Extensions declared across all document types, sorted and deduplicated.
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .document_types
            .iter()
            .flat_map(|t| t.extensions.iter().map(|e| e.to_ascii_lowercase()))
            .filter(|e| e != "*")
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }
}

/// Turn an `--app` argument into a bundle identifier.
///
/// Paths to `.app` bundles are resolved through their Info.plist; anything
/// else is taken as a bundle identifier already.
pub fn resolve_application(argument: &str) -> Result<String> {
    let trimmed = argument.trim().trim_end_matches('/');
    let looks_like_path = trimmed.ends_with(".app") || trimmed.contains('/');
    if looks_like_path {
        return BundleInfo::open(Path::new(trimmed)).map(|b| b.identifier);
    }
    Ok(trimmed.to_string())
}

fn get_string(dict: &Dictionary, key: &str) -> Option<String> {
    match dict.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn string_array_from_dict(dict: &Dictionary, key: &str) -> Vec<String> {
    match dict.get(key) {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key><string>com.example.Viewer</string>
    <key>CFBundleName</key><string>Viewer</string>
    <key>CFBundleShortVersionString</key><string>2.1</string>
    <key>CFBundleDocumentTypes</key>
    <array>
        <dict>
            <key>CFBundleTypeName</key><string>Web page</string>
            <key>CFBundleTypeRole</key><string>Viewer</string>
            <key>CFBundleTypeExtensions</key><array><string>HTML</string><string>htm</string></array>
            <key>LSItemContentTypes</key><array><string>public.html</string></array>
        </dict>
        <dict>
            <key>CFBundleTypeExtensions</key><array><string>*</string><string>html</string></array>
        </dict>
    </array>
    <key>CFBundleURLTypes</key>
    <array>
        <dict><key>CFBundleURLSchemes</key><array><string>viewer</string></array></dict>
    </array>
</dict>
</plist>"#;

    fn make_bundle(dir: &Path, info: &str) -> PathBuf {
        let bundle = dir.join("Viewer.app");
        fs::create_dir_all(bundle.join("Contents")).unwrap();
        fs::write(bundle.join("Contents/Info.plist"), info).unwrap();
        bundle
    }

    #[test]
    fn test_open_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(dir.path(), INFO_PLIST);

        let info = BundleInfo::open(&bundle).unwrap();
        assert_eq!(info.identifier, "com.example.Viewer");
        assert_eq!(info.name.as_deref(), Some("Viewer"));
        assert_eq!(info.version.as_deref(), Some("2.1"));
        assert_eq!(info.document_types.len(), 2);
        assert_eq!(info.document_types[0].role.as_deref(), Some("Viewer"));
        assert_eq!(info.document_types[0].content_types, vec!["public.html"]);
        assert_eq!(info.extensions(), vec!["htm", "html"]);
        assert_eq!(info.url_schemes, vec!["viewer"]);
    }

    #[test]
    fn test_resolve_application() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(dir.path(), INFO_PLIST);

        assert_eq!(resolve_application(bundle.to_str().unwrap()).unwrap(), "com.example.Viewer");
        assert_eq!(resolve_application("com.apple.Safari").unwrap(), "com.apple.Safari");
        assert!(matches!(
            resolve_application("/nonexistent/Missing.app"),
            Err(Error::Bundle { .. })
        ));
    }

    #[test]
    fn test_bundle_without_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(
            dir.path(),
            r#"<?xml version="1.0" encoding="UTF-8"?><plist version="1.0"><dict><key>CFBundleName</key><string>X</string></dict></plist>"#,
        );
        assert!(matches!(BundleInfo::open(&bundle), Err(Error::Bundle { .. })));
    }
}
