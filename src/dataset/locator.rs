//! Sharded file location scheme
//!
//! Sample images live on a content store sharded by leading characters of the
//! sample id, bounding the number of files per directory. Resolution is a
//! pure function of id and split; whether the file actually exists is the
//! concern of the upstream existence filter, never of the locator.

use std::path::PathBuf;

use super::Split;

/// Maps a sample id and split to a filesystem path.
///
/// Kept behind a trait so the storage backend (local shards, object-store
/// mount) can be swapped without touching dataset logic.
pub trait Locator: Send + Sync {
    /// Resolve the path an image for `id` would occupy in `split`.
    fn locate(&self, id: &str, split: Split) -> PathBuf;
}

/// The competition layout: test images nest three directory levels deep by
/// the first three id characters; train/val images sit in a partition
/// directory keyed on the first character.
///
/// ```text
/// root/test/a/b/c/abc123....jpg
/// root/train_a/abc123....jpg
/// ```
#[derive(Debug, Clone)]
pub struct ShardedLocator {
    root: PathBuf,
}

impl ShardedLocator {
    /// Create a locator rooted at the content-store directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The content-store root
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl Locator for ShardedLocator {
    fn locate(&self, id: &str, split: Split) -> PathBuf {
        let filename = format!("{id}.jpg");
        match split {
            Split::Test => {
                let mut chars = id.chars();
                let c0 = chars.next().unwrap_or('0');
                let c1 = chars.next().unwrap_or('0');
                let c2 = chars.next().unwrap_or('0');
                self.root
                    .join("test")
                    .join(c0.to_string())
                    .join(c1.to_string())
                    .join(c2.to_string())
                    .join(filename)
            }
            Split::Train | Split::Val => {
                let c0 = id.chars().next().unwrap_or('0');
                self.root.join(format!("train_{c0}")).join(filename)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_split_shards_three_levels() {
        let locator = ShardedLocator::new("/data");
        let path = locator.locate("abc123def", Split::Test);
        assert_eq!(path, PathBuf::from("/data/test/a/b/c/abc123def.jpg"));
    }

    #[test]
    fn test_train_split_partitions_on_first_char() {
        let locator = ShardedLocator::new("/data");
        let path = locator.locate("7f00aa", Split::Train);
        assert_eq!(path, PathBuf::from("/data/train_7/7f00aa.jpg"));
    }

    #[test]
    fn test_val_uses_train_partitions() {
        let locator = ShardedLocator::new("/data");
        assert_eq!(
            locator.locate("cafe01", Split::Val),
            locator.locate("cafe01", Split::Train)
        );
    }

    #[test]
    fn test_resolution_is_pure() {
        let locator = ShardedLocator::new("/data");
        let a = locator.locate("deadbeef", Split::Test);
        let b = locator.locate("deadbeef", Split::Test);
        assert_eq!(a, b);
    }
}
