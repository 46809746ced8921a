//! 文件状态 - 元数据快照、缓存身份键与内容哈希

use filetime::FileTime;
use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// 哈希时每次读取的块大小
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// 文件的大小与修改时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    pub size: u64,
    pub mtime_secs: i64,
    pub mtime_nanos: u32,
}

impl FileState {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = FileTime::from_last_modification_time(metadata);
        Self {
            size: metadata.len(),
            mtime_secs: mtime.unix_seconds(),
            mtime_nanos: mtime.nanoseconds(),
        }
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        Ok(Self::from_metadata(&fs::metadata(path)?))
    }

    /// 修改时间（秒，保留小数部分）
    pub fn mtime(&self) -> f64 {
        self.mtime_secs as f64 + self.mtime_nanos as f64 / 1_000_000_000.0
    }

    pub fn identity_key(&self, path: &Path) -> FileIdentityKey {
        FileIdentityKey {
            path: path.to_path_buf(),
            size: self.size,
            mtime_secs: self.mtime_secs,
        }
    }
}

/// 哈希缓存的键：绝对路径 + 大小 + 截断到秒的修改时间
///
/// 只用来判断缓存是否仍然有效，本身不是内容指纹。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentityKey {
    pub path: PathBuf,
    pub size: u64,
    pub mtime_secs: i64,
}

impl fmt::Display for FileIdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path.to_str() {
            Some(path) => write!(f, "{}-{}-{}", path, self.size, self.mtime_secs),
            // 非 UTF-8 路径转义原始字节，避免不同文件共用一个键
            None => write!(
                f,
                "{}-{}-{}",
                self.path.as_os_str().as_encoded_bytes().escape_ascii(),
                self.size,
                self.mtime_secs
            ),
        }
    }
}

/// 分块读取文件并计算 BLAKE3 哈希（十六进制）
pub fn calculate_file_hash(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_hash_matches_in_memory_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");
        // 跨越多个块
        let data: Vec<u8> = (0..(HASH_CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        let hash = calculate_file_hash(&path).unwrap();
        assert_eq!(hash, blake3::hash(&data).to_hex().to_string());
    }

    #[test]
    fn empty_file_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty");
        fs::write(&path, b"").unwrap();

        assert_eq!(
            calculate_file_hash(&path).unwrap(),
            blake3::hash(b"").to_hex().to_string()
        );
    }

    #[test]
    fn identity_key_format() {
        let state = FileState {
            size: 42,
            mtime_secs: 1_700_000_000,
            mtime_nanos: 900_000_000,
        };
        let key = state.identity_key(Path::new("/data/a.txt"));
        assert_eq!(key.to_string(), "/data/a.txt-42-1700000000");
        assert!((state.mtime() - 1_700_000_000.9).abs() < 1e-3);
    }

    #[cfg(unix)]
    #[test]
    fn identity_key_distinguishes_non_utf8_paths() {
        use std::os::unix::ffi::OsStrExt;

        let state = FileState {
            size: 1,
            mtime_secs: 0,
            mtime_nanos: 0,
        };
        let a = state.identity_key(Path::new(std::ffi::OsStr::from_bytes(b"/d/x\xff")));
        let b = state.identity_key(Path::new(std::ffi::OsStr::from_bytes(b"/d/x\xfe")));
        assert_ne!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), "/d/x\\xff-1-0");
    }

    #[test]
    fn state_reads_mtime() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f");
        fs::write(&path, "hello").unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 250_000_000))
            .unwrap();

        let state = FileState::read(&path).unwrap();
        assert_eq!(state.size, 5);
        assert_eq!(state.mtime_secs, 1_600_000_000);
    }
}
