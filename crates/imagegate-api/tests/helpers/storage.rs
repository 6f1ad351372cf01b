//! Local-storage layout helpers (`<root>/<bucket>/<key>`).

use std::path::Path;

pub fn put_object(root: &Path, bucket: &str, key: &str, data: &[u8]) {
    let path = root.join(bucket).join(key);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create bucket directory");
    }
    std::fs::write(path, data).expect("Failed to write test object");
}
