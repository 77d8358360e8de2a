use crate::options::{NodeType, TimeType};
use fedfs_address::NodeName;
use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

/// A snapshot of the metadata of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: NodeName,
    node_type: NodeType,
    size: Option<u64>,
    times: BTreeMap<TimeType, SystemTime>,
    members: Option<BTreeSet<String>>,
    read_only: bool,
}

impl Node {
    pub fn new(name: NodeName, node_type: NodeType) -> Self {
        Self {
            name,
            node_type,
            size: None,
            times: BTreeMap::new(),
            members: None,
            read_only: false,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_time(mut self, time_type: TimeType, value: SystemTime) -> Self {
        self.times.insert(time_type, value);
        self
    }

    /// Set the base names of the members of a directory.
    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = Some(members.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Copy the timestamps and the read-only flag of `template`.
    pub fn inherit(mut self, template: &Node) -> Self {
        self.times = template.times.clone();
        self.read_only = template.read_only;
        self
    }

    pub fn name(&self) -> &NodeName {
        &self.name
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    pub fn is_directory(&self) -> bool {
        self.node_type == NodeType::Directory
    }

    /// The content size in bytes, if known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn time(&self, time_type: TimeType) -> Option<SystemTime> {
        self.times.get(&time_type).copied()
    }

    pub fn times(&self) -> &BTreeMap<TimeType, SystemTime> {
        &self.times
    }

    /// The base names of the members of a directory, `None` for other
    /// types.
    pub fn members(&self) -> Option<&BTreeSet<String>> {
        self.members.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_builder() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let node = Node::new(NodeName::parse("dir").unwrap(), NodeType::Directory)
            .with_members(["b", "a"])
            .with_time(TimeType::Write, t);
        assert!(node.is_directory());
        assert_eq!(
            node.members().unwrap().iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(node.time(TimeType::Write), Some(t));
        assert_eq!(node.time(TimeType::Access), None);
    }

    #[test]
    fn test_inherit() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        let template = Node::new(NodeName::parse("a").unwrap(), NodeType::File)
            .with_time(TimeType::Write, t)
            .with_read_only(true)
            .with_size(7);
        let node = Node::new(NodeName::parse("b").unwrap(), NodeType::File).inherit(&template);
        assert_eq!(node.name().to_string(), "b");
        assert_eq!(node.time(TimeType::Write), Some(t));
        assert!(node.is_read_only());
        assert_eq!(node.size(), None);
    }
}
