mod blockfile;
mod datafile;
mod error;
mod index;
mod meta;
mod node;
mod tree;

// Re-export public API
pub use blockfile::{BLOCK_SIZE, BlockFile};
pub use datafile::DataFile;
pub use error::IndexError;
pub use index::Index;
pub use node::{Key, Node, branching_factor};
pub use tree::Btree;

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::*;

    fn write_data_file(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("lines.txt");
        fs::write(&path, contents).unwrap();
        path
    }

    fn build(data_path: &Path, index_path: &Path, key_size: usize) -> (Index, Vec<(Vec<u8>, u64)>) {
        let mut duplicates = Vec::new();
        let index = Index::build(data_path, index_path, key_size, &mut |key, offset| {
            duplicates.push((key.to_vec(), offset));
        })
        .unwrap();
        (index, duplicates)
    }

    #[test]
    fn create_then_find() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = write_data_file(dir.path(), "AAAhello\nBBBworld\nCCCfoo\n");
        let index_path = dir.path().join("lines.idx");

        let (mut index, duplicates) = build(&data_path, &index_path, 3);
        assert!(duplicates.is_empty());

        assert_eq!(
            index.find(b"BBB").unwrap(),
            Some((9, "BBBworld".to_string()))
        );
        assert_eq!(index.find(b"AAA").unwrap(), Some((0, "AAAhello".to_string())));
        assert_eq!(index.find(b"ZZZ").unwrap(), None);
    }

    #[test]
    fn duplicate_lines_are_skipped_during_build() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = write_data_file(dir.path(), "KEYone\nKEYtwo\n");
        let index_path = dir.path().join("lines.idx");

        let (mut index, duplicates) = build(&data_path, &index_path, 3);
        assert_eq!(duplicates, vec![(b"KEY".to_vec(), 0)]);
        assert_eq!(index.find(b"KEY").unwrap(), Some((0, "KEYone".to_string())));
    }

    #[test]
    fn insert_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = write_data_file(dir.path(), "AAAhello\nBBBworld\nCCCfoo\n");
        let index_path = dir.path().join("lines.idx");

        let offset = {
            let (mut index, _) = build(&data_path, &index_path, 3);
            index.insert_record("DDDbar").unwrap()
        };
        assert_eq!(offset, 25);
        assert_eq!(fs::read_to_string(&data_path).unwrap(), "AAAhello\nBBBworld\nCCCfoo\nDDDbar\n");

        let mut reopened = Index::open(&index_path).unwrap();
        assert_eq!(
            reopened.find(b"DDD").unwrap(),
            Some((offset, "DDDbar".to_string()))
        );
    }

    #[test]
    fn insert_rejects_existing_key_without_appending() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = write_data_file(dir.path(), "AAAhello\nBBBworld\n");
        let index_path = dir.path().join("lines.idx");

        let (mut index, _) = build(&data_path, &index_path, 3);
        match index.insert_record("BBBagain") {
            Err(IndexError::DuplicateKey { offset, .. }) => assert_eq!(offset, 9),
            other => panic!("expected DuplicateKey, got {other:?}"),
        }
        // The data file is untouched.
        assert_eq!(
            fs::read_to_string(&data_path).unwrap(),
            "AAAhello\nBBBworld\n"
        );
    }

    #[test]
    fn list_returns_sorted_lines_from_probe() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = write_data_file(dir.path(), "AAAhello\nBBBworld\nCCCfoo\n");
        let index_path = dir.path().join("lines.idx");

        let (mut index, _) = build(&data_path, &index_path, 3);
        index.insert_record("AABx").unwrap();
        index.insert_record("BBAy").unwrap();
        index.insert_record("DDDz").unwrap();

        let mut lines = Vec::new();
        index
            .list(b"BBA", 3, &mut |line| lines.push(line.to_string()))
            .unwrap();
        assert_eq!(lines, vec!["BBAy", "BBBworld", "CCCfoo"]);
    }

    #[test]
    fn short_line_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = write_data_file(dir.path(), "AAAok\nZZ\n");
        let index_path = dir.path().join("lines.idx");

        let result = Index::build(&data_path, &index_path, 3, &mut |_, _| {});
        assert!(matches!(result, Err(IndexError::BadArgument(_))));
    }

    #[test]
    fn ten_thousand_random_keys_survive_a_reopen() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let dir = tempfile::tempdir().unwrap();
        let data_path = write_data_file(dir.path(), "");
        let index_path = dir.path().join("lines.idx");

        let mut keys: Vec<u64> = (0..10_000).collect();
        keys.shuffle(&mut rng);

        let mut expected = HashMap::new();
        {
            let (mut index, _) = build(&data_path, &index_path, 8);
            for n in &keys {
                let record = format!("{n:08}payload-{n}");
                let offset = index.insert_record(&record).unwrap();
                expected.insert(format!("{n:08}"), (offset, record));
            }
        }

        let mut index = Index::open(&index_path).unwrap();
        for (key, (offset, record)) in &expected {
            assert_eq!(
                index.find(key.as_bytes()).unwrap(),
                Some((*offset, record.clone()))
            );
        }

        // A full scan from the minimum key is a sorted permutation of the
        // inserts.
        let mut listed = Vec::new();
        index
            .list(&[0u8; 8], usize::MAX, &mut |line| {
                listed.push(line.to_string())
            })
            .unwrap();
        assert_eq!(listed.len(), expected.len());
        let mut sorted: Vec<String> = expected.values().map(|(_, r)| r.clone()).collect();
        sorted.sort();
        assert_eq!(listed, sorted);
    }
}
