use crate::error::DriverResult;
use chrono::{Datelike, NaiveDate, Timelike, Utc};
use fedfs_kernel::{Node, NodeName, NodeType, TimeType};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Entry {
    File {
        content: Vec<u8>,
        modified: Option<SystemTime>,
    },
    Directory {
        modified: Option<SystemTime>,
    },
}

impl Entry {
    pub(crate) fn modified(&self) -> Option<SystemTime> {
        match self {
            Entry::File { modified, .. } | Entry::Directory { modified } => *modified,
        }
    }

    fn set_modified(&mut self, time: SystemTime) {
        match self {
            Entry::File { modified, .. } | Entry::Directory { modified } => *modified = Some(time),
        }
    }
}

/// The entries of a zip file held in memory, keyed by node name path.
///
/// Directories without an entry of their own are implied by the entries
/// they contain.
#[derive(Debug, Default)]
pub(crate) struct Archive {
    entries: BTreeMap<String, Entry>,
    exists: bool,
    dirty: bool,
}

/// The node name path for a raw zip entry name, or `None` if the name
/// cannot be addressed.
fn entry_name(raw: &str) -> Option<String> {
    let trimmed = raw.strip_suffix('/').unwrap_or(raw);
    NodeName::parse(trimmed)
        .ok()
        .filter(|name| !name.is_root() && name.query().is_none())
        .map(|name| name.path().to_string())
}

fn to_zip_time(time: SystemTime) -> Option<DateTime> {
    let t = chrono::DateTime::<Utc>::from(time).naive_utc();
    let year = u16::try_from(t.year()).ok()?;
    DateTime::from_date_and_time(
        year,
        t.month() as u8,
        t.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
    )
    .ok()
}

fn to_system_time(t: DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(t.year().into(), t.month().into(), t.day().into())?
        .and_hms_opt(t.hour().into(), t.minute().into(), t.second().into())?;
    Some(naive.and_utc().into())
}

impl Archive {
    /// An archive whose file does not exist yet.
    pub(crate) fn missing() -> Self {
        Self::default()
    }

    /// Decode the zip file `bytes`.
    pub(crate) fn read(bytes: Vec<u8>) -> DriverResult<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = BTreeMap::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let Some(name) = entry_name(file.name()) else {
                warn!("Skipping zip entry with unsupported name {:?}", file.name());
                continue;
            };
            let modified: Option<DateTime> = file.last_modified().into();
            let modified = modified.and_then(to_system_time);
            let entry = if file.is_dir() {
                Entry::Directory { modified }
            } else {
                let mut content = Vec::new();
                file.read_to_end(&mut content)?;
                Entry::File { content, modified }
            };
            entries.insert(name, entry);
        }
        Ok(Self {
            entries,
            exists: true,
            dirty: false,
        })
    }

    /// Encode this archive into `sink` and return the number of bytes
    /// written. The archive is assembled in a temporary file first.
    pub(crate) fn write_to(&self, sink: &mut dyn Write) -> DriverResult<u64> {
        let mut zip = ZipWriter::new(tempfile::tempfile()?);
        for (name, entry) in &self.entries {
            let mut options: FileOptions<()> =
                FileOptions::default().compression_method(CompressionMethod::Stored);
            if let Some(time) = entry.modified().and_then(to_zip_time) {
                options = options.last_modified_time(time);
            }
            match entry {
                Entry::Directory { .. } => zip.add_directory(format!("{name}/"), options)?,
                Entry::File { content, .. } => {
                    zip.start_file(name.as_str(), options)?;
                    zip.write_all(content)?;
                }
            }
        }
        let mut file = zip.finish()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(io::copy(&mut file, sink)?)
    }

    pub(crate) fn exists(&self) -> bool {
        self.exists
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark a missing archive as created.
    pub(crate) fn create(&mut self) {
        self.exists = true;
        self.dirty = true;
    }

    pub(crate) fn get(&self, name: &NodeName) -> Option<&Entry> {
        self.entries.get(name.path())
    }

    pub(crate) fn is_directory(&self, name: &NodeName) -> bool {
        if name.is_root() {
            return self.exists;
        }
        match self.get(name) {
            Some(Entry::Directory { .. }) => true,
            Some(Entry::File { .. }) => false,
            None => self.has_members(name.path()),
        }
    }

    fn has_members(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }

    /// Base names of the direct members of the directory `path`.
    fn members(&self, path: &str) -> BTreeSet<String> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        self.entries
            .keys()
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.split('/').next())
            .filter(|member| !member.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn node(&self, name: &NodeName) -> Option<Node> {
        match self.get(name) {
            Some(Entry::File { content, modified }) => {
                let node = Node::new(name.clone(), NodeType::File).with_size(content.len() as u64);
                Some(match modified {
                    Some(time) => node.with_time(TimeType::Write, *time),
                    None => node,
                })
            }
            Some(Entry::Directory { modified }) => {
                let node = Node::new(name.clone(), NodeType::Directory)
                    .with_members(self.members(name.path()));
                Some(match modified {
                    Some(time) => node.with_time(TimeType::Write, *time),
                    None => node,
                })
            }
            None if self.is_directory(name) => Some(
                Node::new(name.clone(), NodeType::Directory)
                    .with_members(self.members(name.path())),
            ),
            None => None,
        }
    }

    pub(crate) fn insert(&mut self, name: &NodeName, entry: Entry) {
        self.entries.insert(name.path().to_string(), entry);
        self.dirty = true;
    }

    /// Add directory entries for the missing ancestors of `name`.
    pub(crate) fn create_parents(&mut self, name: &NodeName) {
        let mut parent = name.parent();
        while let Some(dir) = parent.filter(|dir| !dir.is_root()) {
            if !self.entries.contains_key(dir.path()) {
                self.insert(&dir, Entry::Directory { modified: Some(SystemTime::now()) });
            }
            parent = dir.parent();
        }
    }

    pub(crate) fn set_modified(&mut self, name: &NodeName, time: SystemTime) -> bool {
        match self.entries.get_mut(name.path()) {
            Some(entry) => {
                entry.set_modified(time);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, name: &NodeName) -> Option<Entry> {
        let removed = self.entries.remove(name.path());
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub(crate) fn has_children(&self, name: &NodeName) -> bool {
        if name.is_root() {
            return !self.entries.is_empty();
        }
        self.has_members(name.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn name(s: &str) -> NodeName {
        NodeName::parse(s).unwrap()
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(entry_name("dir/"), Some("dir".to_string()));
        assert_eq!(entry_name("a/b.txt"), Some("a/b.txt".to_string()));
        assert_eq!(entry_name("/abs"), None);
        assert_eq!(entry_name("../up"), None);
        assert_eq!(entry_name(""), None);
    }

    #[test]
    fn test_implied_directories() {
        let mut archive = Archive::missing();
        archive.create();
        archive.insert(
            &name("a/b/c.txt"),
            Entry::File {
                content: b"c".to_vec(),
                modified: None,
            },
        );
        assert!(archive.is_directory(&name("a")));
        assert!(archive.is_directory(&name("a/b")));
        assert!(!archive.is_directory(&name("a/b/c.txt")));
        assert!(!archive.is_directory(&name("ab")));
        let root = archive.node(&NodeName::ROOT).unwrap();
        assert_eq!(root.members().unwrap().iter().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_write_and_read() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let mut archive = Archive::missing();
        archive.create();
        archive.insert(
            &name("dir/file.txt"),
            Entry::File {
                content: b"hello".to_vec(),
                modified: Some(modified),
            },
        );
        archive.create_parents(&name("dir/file.txt"));

        let mut bytes = Vec::new();
        let written = archive.write_to(&mut bytes).unwrap();
        assert_eq!(written, bytes.len() as u64);

        let read = Archive::read(bytes).unwrap();
        assert!(read.exists());
        assert!(!read.is_dirty());
        assert_eq!(
            read.get(&name("dir/file.txt")),
            Some(&Entry::File {
                content: b"hello".to_vec(),
                modified: Some(modified),
            })
        );
        assert!(matches!(read.get(&name("dir")), Some(Entry::Directory { .. })));
    }

    #[test]
    fn test_time_conversion() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(1_234_567_890);
        let zip_time = to_zip_time(time).unwrap();
        assert_eq!(to_system_time(zip_time), Some(time));
        assert!(to_zip_time(SystemTime::UNIX_EPOCH).is_none());
    }
}
