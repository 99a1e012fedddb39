//! Directory synthesis over a flat key namespace.
//!
//! Object stores have no directories, only keys. A listing of prefix `P`
//! shows one level: keys directly under `P` become files, and every key with
//! a further `/` contributes its first segment as a directory.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use stratum_types::{NodeRepr, RemoteFile};

use crate::object_client::{ListEntry, ObjectAttrs};

/// Prefix to list for a locator key. Non-empty keys are treated as
/// directories and get a trailing `/`.
pub fn list_prefix(key: &str) -> String {
    if key.is_empty() || key.ends_with('/') {
        key.to_string()
    } else {
        format!("{key}/")
    }
}

/// Fold a flat, prefix-filtered set of objects the way a delimited listing
/// does: remainders containing `delimiter` collapse into one prefix entry.
pub fn fold_delimited<I>(prefix: &str, objects: I, delimiter: char) -> Vec<ListEntry>
where
    I: IntoIterator<Item = ObjectAttrs>,
{
    let mut seen_prefixes = HashSet::new();
    let mut out = Vec::new();
    for attrs in objects {
        let Some(rest) = attrs.key.strip_prefix(prefix) else {
            continue;
        };
        match rest.find(delimiter) {
            Some(pos) => {
                let common = format!("{prefix}{}", &rest[..pos + delimiter.len_utf8()]);
                if seen_prefixes.insert(common.clone()) {
                    out.push(ListEntry::Prefix(common));
                }
            }
            None => out.push(ListEntry::Object(attrs)),
        }
    }
    out
}

/// Turn listing entries under `prefix` into the immediate children of that
/// directory, sorted by name.
pub fn to_remote_files(bucket: &str, prefix: &str, entries: Vec<ListEntry>) -> Vec<RemoteFile> {
    let mut dirs = HashSet::new();
    let mut files = Vec::new();

    for entry in entries {
        let (key, attrs) = match entry {
            ListEntry::Prefix(key) => (key, None),
            ListEntry::Object(attrs) => (attrs.key.clone(), Some(attrs)),
        };
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match (rest.find('/'), attrs) {
            (None, Some(attrs)) => files.push(RemoteFile {
                name: rest.to_string(),
                is_dir: false,
                size: attrs.size,
                mod_time: attrs.updated,
                locator: NodeRepr::Object {
                    bucket: bucket.to_string(),
                    key: attrs.key,
                    generation: attrs.generation,
                    size: attrs.size,
                },
            }),
            (Some(pos), _) => {
                let segment = &rest[..pos];
                if !segment.is_empty() && dirs.insert(segment.to_string()) {
                    files.push(directory_entry(bucket, prefix, segment));
                }
            }
            // A prefix entry without a trailing delimiter names no directory.
            (None, None) => {}
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name).then(b.is_dir.cmp(&a.is_dir)));
    files
}

fn directory_entry(bucket: &str, prefix: &str, segment: &str) -> RemoteFile {
    RemoteFile {
        name: segment.to_string(),
        is_dir: true,
        size: 0,
        mod_time: DateTime::<Utc>::UNIX_EPOCH,
        locator: NodeRepr::Object {
            bucket: bucket.to_string(),
            key: format!("{prefix}{segment}/"),
            generation: 0,
            size: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(key: &str, size: u64, generation: i64) -> ObjectAttrs {
        ObjectAttrs {
            key: key.to_string(),
            size,
            generation,
            updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn names(files: &[RemoteFile]) -> Vec<(&str, bool)> {
        files.iter().map(|f| (f.name.as_str(), f.is_dir)).collect()
    }

    #[test]
    fn list_prefix_appends_slash() {
        assert_eq!(list_prefix(""), "");
        assert_eq!(list_prefix("photos"), "photos/");
        assert_eq!(list_prefix("photos/"), "photos/");
    }

    #[test]
    fn one_level_of_hierarchy() {
        let objects = vec![
            attrs("a/x", 1, 1),
            attrs("a/y/z", 2, 2),
            attrs("a/y/w", 3, 3),
            attrs("b", 4, 4),
        ];
        let entries = fold_delimited("a/", objects, '/');
        let files = to_remote_files("bkt", "a/", entries);
        assert_eq!(names(&files), vec![("x", false), ("y", true)]);

        let x = &files[0];
        assert_eq!(x.size, 1);
        assert_eq!(
            x.locator,
            NodeRepr::Object {
                bucket: "bkt".into(),
                key: "a/x".into(),
                generation: 1,
                size: 1,
            }
        );

        let y = &files[1];
        assert_eq!(y.size, 0);
        assert_eq!(
            y.locator,
            NodeRepr::Object {
                bucket: "bkt".into(),
                key: "a/y/".into(),
                generation: 0,
                size: 0,
            }
        );
    }

    #[test]
    fn directory_marker_is_skipped() {
        let objects = vec![attrs("a/", 0, 1), attrs("a/f", 5, 2)];
        let files = to_remote_files("bkt", "a/", fold_delimited("a/", objects, '/'));
        assert_eq!(names(&files), vec![("f", false)]);
    }

    #[test]
    fn undelimited_listing_is_synthesized_too() {
        let entries = vec![
            ListEntry::Object(attrs("d/c/1", 1, 1)),
            ListEntry::Object(attrs("d/c/2", 1, 2)),
            ListEntry::Object(attrs("d/a", 1, 3)),
        ];
        let files = to_remote_files("bkt", "d/", entries);
        assert_eq!(names(&files), vec![("a", false), ("c", true)]);
    }

    #[test]
    fn bucket_root_listing() {
        let objects = vec![attrs("top", 1, 1), attrs("dir/inner", 1, 2)];
        let files = to_remote_files("bkt", "", fold_delimited("", objects, '/'));
        assert_eq!(names(&files), vec![("dir", true), ("top", false)]);
    }

    #[test]
    fn fold_dedups_prefixes() {
        let objects = vec![attrs("p/q/1", 1, 1), attrs("p/q/2", 1, 2)];
        let entries = fold_delimited("p/", objects, '/');
        assert_eq!(entries, vec![ListEntry::Prefix("p/q/".into())]);
    }
}
