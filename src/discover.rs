use glob::{glob_with, MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One per-filing CSV found under `root/group/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Basename, recorded as `source_file`.
    pub file_name: String,
    /// Parent directory name, recorded as `source_year`.
    pub group: String,
}

/// List `*.csv` files (any case, non-recursive) directly under `root/group`.
///
/// Returns `None` when the group directory does not exist; sparse year coverage
/// is normal. Files are sorted by name so every run sees the same order.
pub fn group_files(root: &Path, group: &str) -> Option<Vec<SourceFile>> {
    let dir = root.join(group);
    if !dir.is_dir() {
        debug!(group = %group, "no directory at {}, skipping", dir.display());
        return None;
    }

    let pattern = format!("{}/*.csv", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let entries = match glob_with(&pattern, options) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(group = %group, "bad glob pattern {}: {}", pattern, e);
            return Some(Vec::new());
        }
    };

    let mut files: Vec<SourceFile> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(group = %group, "cannot access {}: {}", e.path().display(), e);
                None
            }
        })
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let file_name = path.file_name()?.to_string_lossy().into_owned();
            Some(SourceFile {
                path,
                file_name,
                group: group.to_string(),
            })
        })
        .collect();

    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Some(files)
}

/// All CSV files for `groups`, in group order then file-name order.
pub fn discover_csv_files(root: &Path, groups: &[String]) -> Vec<SourceFile> {
    groups
        .iter()
        .filter_map(|group| group_files(root, group))
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn lists_csvs_in_group_then_name_order() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        for (group, name) in [
            ("2006", "b.csv"),
            ("2006", "a.CSV"),
            ("2005", "z.csv"),
            ("2005", "notes.txt"),
        ] {
            fs::create_dir_all(root.join(group)).unwrap();
            fs::write(root.join(group).join(name), "x\n").unwrap();
        }
        fs::create_dir_all(root.join("2005/nested")).unwrap();
        fs::write(root.join("2005/nested/deep.csv"), "x\n").unwrap();

        let groups = vec!["2005".to_string(), "2006".to_string()];
        let found: Vec<(String, String)> = discover_csv_files(root, &groups)
            .into_iter()
            .map(|f| (f.group, f.file_name))
            .collect();

        assert_eq!(
            found,
            vec![
                ("2005".to_string(), "z.csv".to_string()),
                ("2006".to_string(), "a.CSV".to_string()),
                ("2006".to_string(), "b.csv".to_string()),
            ]
        );
    }

    #[test]
    fn missing_groups_are_skipped() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("Boston")).unwrap();
        fs::write(tmp.path().join("Boston/f.csv"), "x\n").unwrap();

        assert!(group_files(tmp.path(), "Chicago").is_none());
        let groups = vec!["Chicago".to_string(), "Boston".to_string()];
        assert_eq!(discover_csv_files(tmp.path(), &groups).len(), 1);
        assert!(discover_csv_files(tmp.path(), &[]).is_empty());
    }

    #[test]
    fn escapes_glob_characters_in_root() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("runs [v2]");
        fs::create_dir_all(root.join("2010")).unwrap();
        fs::write(root.join("2010/f.csv"), "x\n").unwrap();

        let files = group_files(&root, "2010").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "f.csv");
    }
}
