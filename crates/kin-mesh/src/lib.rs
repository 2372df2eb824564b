//! Mesh sub-format dispatcher and codecs for kinconv.
//!
//! Robot model documents reference companion geometry files; this crate
//! selects a codec by file extension and decodes into / re-encodes from
//! the canonical [`MeshData`] payload:
//!
//! - **Collada** (`.dae`) — triangle geometry subset, XML
//! - **STL** (`.stl`) — binary and ASCII
//!
//! The set of supported codecs is a closed enumeration ([`MeshFormat`]);
//! any other extension is an error. Texture bytes referenced by a Collada
//! document are fetched through an optional injected [`AssetHandler`]
//! rather than by touching the filesystem directly.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod collada;
mod error;
mod stl;

pub use collada::{load_collada, save_collada};
pub use error::{MeshError, Result};
pub use stl::{load_stl, save_stl};

use std::path::Path;

use kin_types::MeshData;

/// Side channel for retrieving asset bytes (texture images) by URI.
///
/// Injected by the caller; the codecs never resolve URIs themselves.
pub type AssetHandler = dyn Fn(&str) -> std::io::Result<Vec<u8>>;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// Collada (`.dae`), XML triangle geometry.
    Collada,
    /// STL (`.stl`), binary or ASCII.
    Stl,
}

impl MeshFormat {
    /// Detect the format from a file extension (case-insensitive).
    ///
    /// Returns `None` for unrecognized extensions.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "dae" => Some(Self::Collada),
            "stl" => Some(Self::Stl),
            _ => None,
        }
    }

    /// The canonical file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Collada => "dae",
            Self::Stl => "stl",
        }
    }
}

fn format_for(path: &Path) -> Result<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| MeshError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Read a mesh file, selecting the codec by extension.
///
/// `submesh` selects a single named geometry from a Collada document (STL
/// files carry exactly one solid, so a submesh request on STL is an
/// error). `assets` is the optional side channel for texture bytes.
///
/// # Errors
///
/// [`MeshError::UnknownFormat`] for unrecognized extensions, codec errors
/// otherwise. No partial mesh is ever returned.
pub fn read_mesh<P: AsRef<Path>>(
    path: P,
    submesh: Option<&str>,
    assets: Option<&AssetHandler>,
) -> Result<MeshData> {
    let path = path.as_ref();
    match format_for(path)? {
        MeshFormat::Collada => load_collada(path, submesh, assets),
        MeshFormat::Stl => {
            if let Some(name) = submesh {
                return Err(MeshError::SubmeshNotFound {
                    name: name.to_string(),
                });
            }
            load_stl(path)
        }
    }
}

/// Write a mesh file, selecting the codec by extension.
///
/// Re-encoding is deterministic: the same mesh written twice to the same
/// destination produces identical bytes. STL output is binary.
///
/// # Errors
///
/// [`MeshError::UnknownFormat`] for unrecognized extensions, codec or I/O
/// errors otherwise.
pub fn write_mesh<P: AsRef<Path>>(mesh: &MeshData, path: P) -> Result<()> {
    let path = path.as_ref();
    match format_for(path)? {
        MeshFormat::Collada => save_collada(mesh, path),
        MeshFormat::Stl => save_stl(mesh, path, true),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(MeshFormat::from_path("model.dae"), Some(MeshFormat::Collada));
        assert_eq!(MeshFormat::from_path("model.DAE"), Some(MeshFormat::Collada));
        assert_eq!(MeshFormat::from_path("model.stl"), Some(MeshFormat::Stl));
        assert_eq!(
            MeshFormat::from_path("/path/to/model.STL"),
            Some(MeshFormat::Stl)
        );
        assert_eq!(MeshFormat::from_path("model.obj"), None);
        assert_eq!(MeshFormat::from_path("model"), None);
    }

    #[test]
    fn test_extension() {
        assert_eq!(MeshFormat::Collada.extension(), "dae");
        assert_eq!(MeshFormat::Stl.extension(), "stl");
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let result = read_mesh("model.obj", None, None);
        assert!(matches!(
            result,
            Err(MeshError::UnknownFormat { ref extension }) if extension == "obj"
        ));
    }

    #[test]
    fn test_submesh_on_stl_is_rejected() {
        let result = read_mesh("model.stl", Some("wheel"), None);
        assert!(matches!(result, Err(MeshError::SubmeshNotFound { .. })));
    }

    #[test]
    fn test_write_unknown_extension_is_rejected() {
        let mesh = MeshData::empty();
        let result = write_mesh(&mesh, "out.ply");
        assert!(matches!(result, Err(MeshError::UnknownFormat { .. })));
    }
}
