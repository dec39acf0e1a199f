use std::io;
use thiserror::Error;

use crate::pkg::PackageId;

/// Core error type for map building and tracing.
///
/// Everything propagates by rejection to the top-level `build` /
/// `resolve_all` call; nothing below retries.
#[derive(Error, Debug)]
pub enum Error {
    /// Package configuration is missing or invalid, or the dependency
    /// graph references a package it does not contain.
    #[error("invalid configuration for package {package}: {reason}")]
    Config { package: String, reason: String },

    /// A bare specifier not covered by any applicable scope or the
    /// top-level imports.
    #[error("no resolution for \"{specifier}\" imported from {parent}")]
    Resolution { specifier: String, parent: String },

    /// A traced module could not be lexed.
    #[error("analysis error in {url}: {source}")]
    Analysis {
        url: String,
        #[source]
        source: dalkey_lexer::AnalyzeError,
    },

    /// A traced module could not be read.
    #[error("failed to read {url} (\"{specifier}\"{}): {source}", importer_suffix(importer))]
    Read {
        url: String,
        specifier: String,
        importer: Option<String>,
        #[source]
        source: io::Error,
    },

    /// A traced module does not exist.
    #[error("module not found: {url} (\"{specifier}\"{})", importer_suffix(importer))]
    NotFound {
        url: String,
        specifier: String,
        importer: Option<String>,
    },

    /// An import map that does not satisfy the shape invariants.
    #[error("invalid import map: {reason}")]
    Map { reason: String },

    /// An absolute-mode rebase that would climb above the target base.
    #[error("cannot rebase \"{value}\" above {base}")]
    Rebase { value: String, base: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Configuration error for a named package.
    #[must_use]
    pub fn config(package: &PackageId, reason: impl Into<String>) -> Self {
        Self::Config {
            package: package.to_string(),
            reason: reason.into(),
        }
    }

    /// Read failure while tracing, with importer context. A `NotFound`
    /// kind is normalized into its own variant.
    #[must_use]
    pub fn read(
        url: &url::Url,
        specifier: &str,
        importer: Option<&url::Url>,
        source: io::Error,
    ) -> Self {
        let url = url.to_string();
        let specifier = specifier.to_owned();
        let importer = importer.map(url::Url::to_string);
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                url,
                specifier,
                importer,
            }
        } else {
            Self::Read {
                url,
                specifier,
                importer,
                source,
            }
        }
    }
}

fn importer_suffix(importer: &Option<String>) -> String {
    match importer {
        Some(importer) => format!(" imported from {importer}"),
        None => String::new(),
    }
}
