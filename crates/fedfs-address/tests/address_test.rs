use fedfs_address::{Error, MountPoint, NodeName, NodePath, Uri, UriModifier};

#[test]
fn normalized_addresses_round_trip() {
    for input in ["", "a", "a/b/c", "a?x", "dir/file.txt"] {
        assert_eq!(NodeName::parse(input).unwrap().to_string(), input);
    }
    for input in [
        "file:/",
        "file:/tmp/",
        "file://server/share/",
        "zip:file:/a.zip!/",
        "zip:file:/a.zip!/b.zip!/",
        "tar.gz:file:/archive.tar.gz!/",
        "tar:zip:file:/a.zip!/b.tar!/",
    ] {
        assert_eq!(MountPoint::parse(input).unwrap().to_string(), input);
    }
}

#[test]
fn canonicalization_is_idempotent() {
    for input in [
        "file:////server/share//dir/",
        "file:///tmp/./x/../y/",
        "zip:file:/a.zip!//b//c/",
        "zip:zip:file:/a.zip!/b.zip!/c",
    ] {
        let once = NodePath::canonicalize(input).unwrap();
        let twice = NodePath::canonicalize(&once.to_string()).unwrap();
        assert_eq!(once, twice, "{input}");
        assert_eq!(NodePath::parse(&once.to_string()).unwrap(), once);
    }
}

#[test]
fn resolving_onto_root_is_identity() {
    for input in ["", "a", "a/b", "a?q"] {
        let member = NodeName::parse(input).unwrap();
        assert_eq!(NodeName::resolve(&NodeName::ROOT, &member), member);
    }
}

#[test]
fn nested_mount_point_exposes_enclosing_archive() {
    let mp = MountPoint::parse("zip:file:/a.zip!/b.zip!/").unwrap();
    let inner = mp.path().unwrap();
    assert_eq!(inner.mount_point().to_string(), "zip:file:/a.zip!/");
    assert_eq!(inner.node_name().to_string(), "b.zip");
    assert_eq!(
        inner.mount_point().parent().unwrap().to_string(),
        "file:/"
    );
}

#[test]
fn archive_root_has_no_enclosing_archive() {
    let path = NodePath::parse("tar.gz:file:/archive.tar.gz!/").unwrap();
    assert!(path.node_name().is_root());
    assert_eq!(
        path.inner_archive().unwrap().to_string(),
        "tar.gz:file:/archive.tar.gz!/"
    );
    assert!(path.enclosing_archive().is_none());
    assert!(path.enclosing_entry_name().is_none());
}

#[test]
fn archive_entry_reports_enclosing_archive() {
    let path = NodePath::parse("zip:file:/archive.zip!/META-INF/MANIFEST.MF").unwrap();

    let inner = path.inner_archive().unwrap();
    let inner_location = inner.path().unwrap().to_hierarchical_uri();
    assert_eq!(inner_location.path(), Some("/archive.zip"));

    let enclosing = path.enclosing_archive().unwrap();
    let enclosing_location = enclosing.path().unwrap().to_hierarchical_uri();
    assert_eq!(enclosing_location.path(), Some("/archive.zip"));

    assert_eq!(
        path.enclosing_entry_name().unwrap().to_string(),
        "META-INF/MANIFEST.MF"
    );
}

#[test]
fn nested_archive_root_is_an_entry_of_its_parent() {
    let path = NodePath::parse("zip:file:/a.zip!/b.zip!/").unwrap();
    assert_eq!(
        path.enclosing_archive().unwrap().to_string(),
        "zip:file:/a.zip!/"
    );
    assert_eq!(path.enclosing_entry_name().unwrap().to_string(), "b.zip");
}

#[test]
fn node_name_rejects_surrounding_separators() {
    for input in ["/foo", "foo/"] {
        let err = NodeName::parse(input).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
        assert_eq!(err.input(), input);
    }
    assert_eq!(NodeName::canonicalize("/foo/").unwrap().to_string(), "foo");
}

#[test]
fn null_modifier_requires_normal_form() {
    let uri = Uri::parse("file:/a/../b").unwrap();
    assert!(NodePath::new(uri.clone(), UriModifier::Null).is_err());
    assert_eq!(
        NodePath::new(uri, UriModifier::Canonicalize).unwrap().to_string(),
        "file:/b"
    );
}

#[test]
fn ordering_matches_equality() {
    let mut names: Vec<NodeName> = ["b", "a/b", "", "a", "a/b"]
        .iter()
        .map(|s| NodeName::parse(s).unwrap())
        .collect();
    names.sort();
    names.dedup();
    let rendered: Vec<String> = names.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, ["", "a", "a/b", "b"]);
}
