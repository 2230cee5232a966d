//! Access to the raw bytes behind a (virtual) path for the backends that parse the data themselves.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{
    Error, Result,
    vsi::{Archive, Transport, VirtualPath},
};

/// Transport and decompression of files referenced by a virtual path
pub trait VirtualFileSystem: Send + Sync {
    /// The path references an existing file (remote references are assumed to exist until they are fetched)
    fn exists(&self, path: &str) -> Result<bool>;

    /// The complete (decompressed) content of the file
    fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// Local files, gzip compressed files and (with the `http` feature) files served over http
#[derive(Clone, Debug, Default)]
pub struct StandardFileSystem;

impl StandardFileSystem {
    fn check_supported(vpath: &VirtualPath) -> Result {
        if let Some((archive, _)) = vpath.archives().iter().find(|(archive, _)| *archive != Archive::Gzip) {
            return Err(Error::UnsupportedDriver {
                driver: "native".into(),
                reason: format!("{} archives can only be read using the gdal backend", archive.prefix()),
            });
        }

        match vpath.transport() {
            Some(Transport::S3 | Transport::Gcs) => Err(Error::UnsupportedDriver {
                driver: "native".into(),
                reason: format!("object store urls can only be read using the gdal backend ({})", vpath.base()),
            }),
            _ => Ok(()),
        }
    }

    fn fetch(&self, vpath: &VirtualPath) -> Result<Vec<u8>> {
        if vpath.is_remote() {
            return fetch_url(vpath.base());
        }

        let path = PathBuf::from(vpath.base());
        std::fs::read(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path),
            _ => Error::IOError(err),
        })
    }
}

impl VirtualFileSystem for StandardFileSystem {
    fn exists(&self, path: &str) -> Result<bool> {
        let vpath = VirtualPath::parse(path)?;
        Self::check_supported(&vpath)?;

        if vpath.is_remote() {
            return Ok(true);
        }

        Ok(Path::new(vpath.base()).is_file())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let vpath = VirtualPath::parse(path)?;
        Self::check_supported(&vpath)?;

        let mut data = self.fetch(&vpath)?;
        for _ in vpath.archives().iter().filter(|(archive, _)| *archive == Archive::Gzip) {
            data = gunzip(&data)?;
        }

        Ok(data)
    }
}

pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    flate2::read::MultiGzDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|err| Error::Runtime(format!("Failed to decompress gzip data ({err})")))?;
    Ok(decoded)
}

#[cfg(feature = "http")]
fn fetch_url(url: &str) -> Result<Vec<u8>> {
    log::debug!("Fetch {url}");
    let response = reqwest::blocking::Client::new().get(url).send()?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::FileNotFound(PathBuf::from(url)));
    }

    Ok(response.error_for_status()?.bytes()?.to_vec())
}

#[cfg(not(feature = "http"))]
fn fetch_url(url: &str) -> Result<Vec<u8>> {
    Err(Error::UnsupportedDriver {
        driver: "native".into(),
        reason: format!("fetching '{url}' requires the http feature"),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).expect("compress");
        encoder.finish().expect("compress")
    }

    #[test]
    fn read_local_files() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("cities.geojson");
        std::fs::write(&path, b"{}")?;

        let vfs = StandardFileSystem;
        let path = path.to_string_lossy();
        assert!(vfs.exists(&path)?);
        assert_eq!(vfs.read(&path)?, b"{}");

        let missing = tmp.path().join("missing.geojson");
        assert!(!vfs.exists(&missing.to_string_lossy())?);
        assert!(matches!(vfs.read(&missing.to_string_lossy()), Err(Error::FileNotFound(_))));
        Ok(())
    }

    #[test]
    fn read_gzip_compressed_files() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("cities.geojson.gz");
        std::fs::write(&path, gzip(br#"{"type":"FeatureCollection","features":[]}"#))?;

        let vpath = crate::vsi::compose(&path.to_string_lossy(), &[crate::Stage::unpack(Archive::Gzip)])?;
        let vfs = StandardFileSystem;
        assert!(vfs.exists(&vpath)?);
        assert_eq!(vfs.read(&vpath)?, br#"{"type":"FeatureCollection","features":[]}"#);
        Ok(())
    }

    #[test]
    fn archives_require_gdal() {
        let vfs = StandardFileSystem;
        assert!(matches!(
            vfs.read("/vsizip//data/roads.zip/roads.geojson"),
            Err(Error::UnsupportedDriver { .. })
        ));
        assert!(matches!(vfs.read("/vsis3/bucket/a.geojson"), Err(Error::UnsupportedDriver { .. })));
    }
}
