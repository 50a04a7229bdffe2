use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

pub const GLOB_PREFIX: &str = "glob:";

#[derive(Error, Debug, PartialEq)]
pub enum TargetError {
    #[error("invalid glob pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: &'static str },
}

pub fn expand(target: &str) -> Result<Vec<PathBuf>, TargetError> {
    match target.strip_prefix(GLOB_PREFIX) {
        Some(pattern) => glob(pattern),
        None => Ok(vec![PathBuf::from(target)]),
    }
}

pub fn glob(pattern: &str) -> Result<Vec<PathBuf>, TargetError> {
    let invalid = |reason| TargetError::Pattern { pattern: pattern.to_string(), reason };

    // Split into a literal base directory and the wildcard components after it.
    let mut base = PathBuf::new();
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        let literal = matches!(component, Component::Prefix(_) | Component::RootDir)
            || !text.contains(['*', '?', '[']);
        if parts.is_empty() && literal {
            base.push(component);
        } else {
            validate(&text).map_err(invalid)?;
            parts.push(text.into_owned());
        }
    }

    if parts.is_empty() {
        // No wildcards at all: the pattern names one file.
        return Ok(if base.is_file() { vec![base] } else { Vec::new() });
    }

    let walk_root = if base.as_os_str().is_empty() { PathBuf::from(".") } else { base.clone() };
    let max_depth = if parts.iter().any(|p| p == "**") { usize::MAX } else { parts.len() };

    let mut matches = Vec::new();
    for entry in WalkDir::new(&walk_root)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        // Follows symlinks, unlike the entry's own file type.
        if !entry.path().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&walk_root) else {
            continue;
        };
        let names: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if match_components(&parts, &names) {
            matches.push(base.join(relative));
        }
    }
    matches.sort();
    Ok(matches)
}

fn validate(part: &str) -> Result<(), &'static str> {
    if part.contains("**") && part != "**" {
        return Err("`**` must be a whole path component");
    }
    let mut chars = part.chars();
    while let Some(c) = chars.next() {
        if c == '[' && !chars.by_ref().skip(1).any(|c| c == ']') {
            return Err("unclosed `[`");
        }
    }
    Ok(())
}

fn match_components(pattern: &[String], names: &[String]) -> bool {
    match pattern.split_first() {
        None => names.is_empty(),
        Some((head, rest)) if head == "**" => {
            (0..=names.len()).any(|skip| {
                names[..skip].iter().all(|n| !n.starts_with('.'))
                    && match_components(rest, &names[skip..])
            })
        }
        Some((head, rest)) => match names.split_first() {
            Some((name, names)) => match_name(head, name) && match_components(rest, names),
            None => false,
        },
    }
}

fn match_name(pattern: &str, name: &str) -> bool {
    // Hidden entries only match a pattern that spells out the dot.
    if name.starts_with('.') && !pattern.starts_with('.') {
        return false;
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    match_chars(&pattern, &name)
}

fn match_chars(pattern: &[char], name: &[char]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some('*') => (0..=name.len()).any(|skip| match_chars(&pattern[1..], &name[skip..])),
        Some('?') => !name.is_empty() && match_chars(&pattern[1..], &name[1..]),
        Some('[') => {
            let Some((&c, rest_name)) = name.split_first() else {
                return false;
            };
            match class_matches(&pattern[1..], c) {
                Some((hit, consumed)) => hit && match_chars(&pattern[1 + consumed..], rest_name),
                None => false,
            }
        }
        Some(&p) => name.first() == Some(&p) && match_chars(&pattern[1..], &name[1..]),
    }
}

// Returns the match and the pattern chars used, closing `]` included.
fn class_matches(body: &[char], c: char) -> Option<(bool, usize)> {
    let (negated, start) = match body.first() {
        Some('!') | Some('^') => (true, 1),
        _ => (false, 0),
    };
    let mut hit = false;
    let mut i = start;
    loop {
        let &first = body.get(i)?;
        // A `]` right after the opening bracket is literal.
        if first == ']' && i > start {
            return Some((hit != negated, i + 1));
        }
        if body.get(i + 1) == Some(&'-') && body.get(i + 2).is_some_and(|&e| e != ']') {
            let last = body[i + 2];
            hit |= first <= c && c <= last;
            i += 3;
        } else {
            hit |= first == c;
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn names(root: &Path, found: Vec<PathBuf>) -> Vec<String> {
        found
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_plain_path() {
        assert_eq!(expand("a/b.jpg").unwrap(), vec![PathBuf::from("a/b.jpg")]);
    }

    #[test]
    fn test_star_in_one_directory() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["b.jpg", "a.jpg", "c.png", ".hidden.jpg", "sub/d.jpg"] {
            touch(dir.path(), f);
        }
        let pattern = format!("{}{}/*.jpg", GLOB_PREFIX, dir.path().display());
        let found = expand(&pattern).unwrap();
        assert_eq!(names(dir.path(), found), ["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_recursive() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["top.jpg", "x/one.jpg", "x/y/two.jpg", "x/y/skip.png", ".git/objects/z.jpg"] {
            touch(dir.path(), f);
        }
        let found = glob(&format!("{}/**/*.jpg", dir.path().display())).unwrap();
        assert_eq!(names(dir.path(), found), ["top.jpg", "x/one.jpg", "x/y/two.jpg"]);
    }

    #[test]
    fn test_wildcard_directory() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["day1/pano.jpg", "day2/pano.jpg", "night/pano.jpg"] {
            touch(dir.path(), f);
        }
        let found = glob(&format!("{}/day?/pano.jpg", dir.path().display())).unwrap();
        assert_eq!(names(dir.path(), found), ["day1/pano.jpg", "day2/pano.jpg"]);
    }

    #[test]
    fn test_literal_pattern() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "only.jpg");
        let path = dir.path().join("only.jpg");
        assert_eq!(glob(&path.display().to_string()).unwrap(), vec![path]);
        assert!(glob(&dir.path().join("nope.jpg").display().to_string()).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_match() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "store/pano.jpg");
        fs::create_dir_all(dir.path().join("view")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("store/pano.jpg"),
            dir.path().join("view/pano.jpg"),
        )
        .unwrap();

        let found = glob(&format!("{}/view/*.jpg", dir.path().display())).unwrap();
        assert_eq!(names(dir.path(), found), ["view/pano.jpg"]);
    }

    #[test]
    fn test_match_name() {
        assert!(match_name("IMG_*.jpg", "IMG_0001.jpg"));
        assert!(!match_name("IMG_*.jpg", "IMG_0001.jpeg"));
        assert!(match_name("?.jpg", "a.jpg"));
        assert!(!match_name("?.jpg", "ab.jpg"));
        assert!(match_name("[ab]*", "beach.jpg"));
        assert!(!match_name("[!ab]*", "beach.jpg"));
        assert!(match_name("pano[0-9].jpg", "pano7.jpg"));
        assert!(!match_name("pano[0-9].jpg", "panox.jpg"));
        assert!(match_name("[]]", "]"));
        assert!(!match_name("*", ".profile"));
        assert!(match_name(".*", ".profile"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(glob("shots/[abc.jpg"), Err(TargetError::Pattern { .. })));
        assert!(matches!(glob("shots/a**/x.jpg"), Err(TargetError::Pattern { .. })));
    }
}
