use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// A small generated site: an index, a nested page with its own index and a
/// markdown fragment.
pub fn sample_site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "index.html", r#"<a href="/about.html">About</a>"#);
    write(dir.path(), "about.html", "<h1>About</h1>");
    write(dir.path(), "docs/index.html", "<h1>Docs</h1>");
    write(dir.path(), "docs/intro.md", "# Intro");
    dir
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
