//! Composition of chained virtual file system prefixes.
//!
//! A virtual path tells the driver layer how to reach a file before it can be read, e.g.
//! `/vsizip//vsicurl/https://example.com/roads.zip/roads.shp` fetches an archive over HTTP,
//! unpacks it and reads `roads.shp` from it. The transport prefix is applied first and therefore
//! sits directly in front of the base URL, archive prefixes wrap it.

use std::fmt;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Any http(s) url
    Http,
    /// Amazon S3 (`s3://bucket/key`)
    S3,
    /// Google cloud storage (`gs://bucket/key`)
    Gcs,
}

impl Transport {
    pub fn prefix(&self) -> &'static str {
        match self {
            Transport::Http => "/vsicurl/",
            Transport::S3 => "/vsis3/",
            Transport::Gcs => "/vsigs/",
        }
    }

    fn for_url(url: &str) -> Option<Transport> {
        let lower = url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Some(Transport::Http)
        } else if lower.starts_with("s3://") {
            Some(Transport::S3)
        } else if lower.starts_with("gs://") {
            Some(Transport::Gcs)
        } else {
            None
        }
    }

    /// The location in the notation expected after the prefix
    fn strip_scheme<'a>(&self, url: &'a str) -> &'a str {
        match self {
            Transport::Http => url,
            Transport::S3 | Transport::Gcs => url.split_once("://").map_or(url, |(_, rest)| rest),
        }
    }

    fn restore_scheme(&self, location: &str) -> String {
        match self {
            Transport::Http => location.to_string(),
            Transport::S3 => format!("s3://{location}"),
            Transport::Gcs => format!("gs://{location}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Archive {
    Zip,
    Tar,
    Gzip,
}

impl Archive {
    pub fn prefix(&self) -> &'static str {
        match self {
            Archive::Zip => "/vsizip/",
            Archive::Tar => "/vsitar/",
            Archive::Gzip => "/vsigzip/",
        }
    }

    /// Extensions that end the archive part of a path, anything after them is a member of the archive
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Archive::Zip => &[".zip", ".shz", ".kmz"],
            Archive::Tar => &[".tar.gz", ".tgz", ".tar"],
            Archive::Gzip => &[],
        }
    }
}

/// One access transformation applied before a file becomes readable
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch(Transport),
    Unpack { archive: Archive, member: Option<String> },
}

impl Stage {
    pub fn fetch(transport: Transport) -> Self {
        Stage::Fetch(transport)
    }

    pub fn unpack(archive: Archive) -> Self {
        Stage::Unpack { archive, member: None }
    }

    /// Unpack a specific file from the archive
    pub fn unpack_member(archive: Archive, member: impl Into<String>) -> Self {
        Stage::Unpack {
            archive,
            member: Some(member.into()),
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Stage::Fetch(transport) => transport.prefix(),
            Stage::Unpack { archive, .. } => archive.prefix(),
        }
    }
}

static PREFIXES: [Stage; 6] = [
    Stage::Fetch(Transport::Http),
    Stage::Fetch(Transport::S3),
    Stage::Fetch(Transport::Gcs),
    Stage::Unpack {
        archive: Archive::Zip,
        member: None,
    },
    Stage::Unpack {
        archive: Archive::Tar,
        member: None,
    },
    Stage::Unpack {
        archive: Archive::Gzip,
        member: None,
    },
];

/// A validated chain of access stages on top of a base location
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualPath {
    base: String,
    transport: Option<Transport>,
    /// Archive stages, outermost first
    archives: Vec<(Archive, Option<String>)>,
}

/// Composes the access stages into a single path string.
/// The stages may be given in any order: the transport is always applied first, archive stages are
/// applied last-to-first (the last archive stage in the list is the one closest to the transport).
pub fn compose(base: &str, stages: &[Stage]) -> Result<String> {
    Ok(VirtualPath::new(base, stages)?.to_string())
}

impl VirtualPath {
    pub fn new(base: &str, stages: &[Stage]) -> Result<Self> {
        if base.is_empty() {
            return Err(Error::InvalidArgument("Empty base location".into()));
        }

        let transports: Vec<Transport> = stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Fetch(transport) => Some(*transport),
                Stage::Unpack { .. } => None,
            })
            .collect();

        if transports.len() > 1 {
            return Err(Error::InvalidStageOrder(format!(
                "only one transport stage can be used, got {}",
                transports.len()
            )));
        }

        let archives: Vec<(Archive, Option<String>)> = stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Unpack { archive, member } => Some((*archive, member.clone())),
                Stage::Fetch(_) => None,
            })
            .collect();

        if archives.iter().any(|(archive, member)| *archive == Archive::Gzip && member.is_some()) {
            return Err(Error::InvalidStageOrder("a gzip stage has no archive members".into()));
        }

        let pre_resolved = base.starts_with("/vsi");
        let url_transport = Transport::for_url(base);
        let transport = transports.first().copied();
        match (transport, url_transport) {
            (Some(transport), Some(url_transport)) if transport != url_transport => {
                return Err(Error::InvalidStageOrder(format!(
                    "transport stage {} can not fetch '{base}'",
                    transport.prefix()
                )));
            }
            (Some(transport), None) => {
                return Err(Error::InvalidStageOrder(format!(
                    "transport stage {} requires a remote url, got '{base}'",
                    transport.prefix()
                )));
            }
            (None, Some(_)) if !archives.is_empty() => {
                return Err(Error::InvalidStageOrder(format!(
                    "archive stage over remote url '{base}' requires a transport stage beneath it"
                )));
            }
            _ => {}
        }

        if pre_resolved && transport.is_some() {
            return Err(Error::InvalidStageOrder(format!(
                "'{base}' is already a virtual path, a transport stage can not be applied to it"
            )));
        }

        Ok(Self {
            base: base.to_string(),
            transport,
            archives,
        })
    }

    /// Splits a composed path string back into its stages
    pub fn parse(path: &str) -> Result<Self> {
        let mut rest = path;
        let mut stages = Vec::new();
        while let Some(stage) = PREFIXES.iter().find(|stage| rest.starts_with(stage.prefix())) {
            rest = &rest[stage.prefix().len()..];
            stages.push(stage.clone());
        }

        let transport = stages.iter().find_map(|stage| match stage {
            Stage::Fetch(transport) => Some(*transport),
            Stage::Unpack { .. } => None,
        });

        if let Some(pos) = stages.iter().position(|s| matches!(s, Stage::Fetch(_)))
            && pos != stages.len() - 1
        {
            return Err(Error::InvalidStageOrder(format!(
                "the transport prefix must be the innermost prefix in '{path}'"
            )));
        }

        let mut archives: Vec<(Archive, Option<String>)> = stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Unpack { archive, .. } => Some((*archive, None)),
                Stage::Fetch(_) => None,
            })
            .collect();

        // The base ends at the first archive boundary, the following segments are the members
        // of the archive stages from the innermost to the outermost
        let mut segments = split_archive_members(rest, &archives).into_iter();
        let location = segments.next().unwrap_or_default();
        for (archive, member) in archives.iter_mut().rev() {
            if *archive == Archive::Gzip {
                continue;
            }

            match segments.next() {
                Some(segment) => *member = Some(segment),
                None => break,
            }
        }

        let base = match transport {
            Some(transport) => transport.restore_scheme(&location),
            None => location,
        };

        let stages: Vec<Stage> = archives
            .into_iter()
            .map(|(archive, member)| Stage::Unpack { archive, member })
            .chain(transport.map(Stage::Fetch))
            .collect();

        VirtualPath::new(&base, &stages)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn transport(&self) -> Option<Transport> {
        self.transport
    }

    /// The archive stages, outermost first
    pub fn archives(&self) -> &[(Archive, Option<String>)] {
        &self.archives
    }

    /// The normalized stages, outermost first
    pub fn stages(&self) -> Vec<Stage> {
        self.archives
            .iter()
            .map(|(archive, member)| Stage::Unpack {
                archive: *archive,
                member: member.clone(),
            })
            .chain(self.transport.map(Stage::Fetch))
            .collect()
    }

    pub fn is_remote(&self) -> bool {
        self.transport.is_some() || Transport::for_url(&self.base).is_some()
    }

    pub fn is_virtual(&self) -> bool {
        self.transport.is_some() || !self.archives.is_empty()
    }

    /// The name of the file that is eventually read: the member of the outermost archive that names one,
    /// or else the last segment of the base location (without url query)
    pub fn file_name(&self) -> &str {
        if let Some(member) = self.archives.iter().find_map(|(_, member)| member.as_deref()) {
            return member.rsplit('/').next().unwrap_or(member);
        }

        let location = self.base.split(['?', '#']).next().unwrap_or(&self.base);
        location.trim_end_matches('/').rsplit(['/', '\\']).next().unwrap_or(location)
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut path = match self.transport {
            Some(transport) => format!("{}{}", transport.prefix(), transport.strip_scheme(&self.base)),
            None => self.base.clone(),
        };

        for (archive, member) in self.archives.iter().rev() {
            path = match member {
                Some(member) => format!("{}{path}/{}", archive.prefix(), member.trim_start_matches('/')),
                None => format!("{}{path}", archive.prefix()),
            };
        }

        f.write_str(&path)
    }
}

fn split_archive_members(path: &str, archives: &[(Archive, Option<String>)]) -> Vec<String> {
    let extensions: Vec<&str> = archives.iter().flat_map(|(archive, _)| archive.extensions()).copied().collect();

    let mut segments = Vec::new();
    let mut rest = path;
    loop {
        let lower = rest.to_ascii_lowercase();
        let boundary = extensions
            .iter()
            .filter_map(|ext| lower.find(&format!("{ext}/")).map(|pos| pos + ext.len()))
            .min();

        match boundary {
            Some(pos) => {
                segments.push(rest[..pos].to_string());
                rest = &rest[pos + 1..];
            }
            None => {
                if !rest.is_empty() || segments.is_empty() {
                    segments.push(rest.to_string());
                }
                break;
            }
        }
    }

    segments
}
