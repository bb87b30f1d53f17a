use std::collections::HashSet;
use std::path::{Path, PathBuf};

use repodex_core::identity::doc_id;
use repodex_core::Error;

#[test]
fn same_path_same_identity() {
    let p = Path::new("/var/data/repos/alpha/src/main.rs");
    let a = doc_id(p).expect("id");
    let b = doc_id(p).expect("id");
    assert_eq!(a, b);
}

#[test]
fn existing_path_and_cleaned_variant_agree() {
    let tmp = tempfile::tempdir().expect("tmp");
    let file = tmp.path().join("a.txt");
    std::fs::write(&file, "hello").expect("write");

    let direct = doc_id(&file).expect("id");
    let with_dot = doc_id(&tmp.path().join("./a.txt")).expect("id");
    assert_eq!(direct, with_dot);
}

#[test]
fn deleted_path_keeps_its_identity_shape() {
    // Non-existent absolute paths are normalized lexically.
    let a = doc_id(Path::new("/no/such/dir/../dir/file.rs")).expect("id");
    let b = doc_id(Path::new("/no/such/dir/file.rs")).expect("id");
    assert_eq!(a, b);
}

#[test]
fn relative_missing_path_is_invalid() {
    let err = doc_id(Path::new("definitely/not/here.txt")).expect_err("must fail");
    assert!(matches!(err, Error::InvalidPath { .. }));
}

#[test]
fn identity_is_store_safe() {
    let id = doc_id(Path::new("/var/data/weird name/with spaces.txt")).expect("id");
    let s = id.as_str();
    // 256-bit digest, URL-safe base64, no padding.
    assert_eq!(s.len(), 43);
    assert!(s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}

#[test]
fn distinct_paths_do_not_collide() {
    let mut seen = HashSet::new();
    let mut count = 0usize;
    for a in 0..20 {
        for b in 0..20 {
            for name in ["mod.rs", "lib.rs", "readme.md"] {
                let p = PathBuf::from(format!("/corpus/r{a}/sub{b}/{name}"));
                let id = doc_id(&p).expect("id");
                assert!(seen.insert(id), "collision for {}", p.display());
                count += 1;
            }
        }
    }
    assert_eq!(seen.len(), count);
}
