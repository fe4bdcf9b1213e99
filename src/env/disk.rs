//! std::fs backed file service

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;

use super::{Env, FlushMode, RandomAccessFile, WritableFile};

/// Attempts made to find an unused temp file name before giving up.
const MAX_TEMP_NAME_ATTEMPTS: usize = 100;

/// File service backed by the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskEnv;

impl DiskEnv {
    /// Creates a disk environment.
    pub fn new() -> Self {
        Self
    }
}

/// Splits `template` into the fixed prefix and the number of trailing `X`s.
fn split_template(template: &Path) -> io::Result<(PathBuf, String, usize)> {
    let name = template
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid temp file template: {}", template.display()),
            )
        })?;

    let placeholders = name.chars().rev().take_while(|c| *c == 'X').count();
    if placeholders == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Temp file template has no X placeholder: {}", template.display()),
        ));
    }

    let dir = template.parent().map(Path::to_path_buf).unwrap_or_default();
    let prefix = name[..name.len() - placeholders].to_string();
    Ok((dir, prefix, placeholders))
}

impl Env for DiskEnv {
    fn new_temp_writable_file(
        &self,
        template: &Path,
    ) -> io::Result<(PathBuf, Box<dyn WritableFile>)> {
        let (dir, prefix, placeholders) = split_template(template)?;
        let mut rng = rand::thread_rng();

        for _ in 0..MAX_TEMP_NAME_ATTEMPTS {
            let suffix: String = (0..placeholders)
                .map(|_| rng.sample(Alphanumeric) as char)
                .collect();
            let path = dir.join(format!("{}{}", prefix, suffix));

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    tracing::debug!(
                        target: "pbcontainer",
                        path = %path.display(),
                        "created temporary file"
                    );
                    let writable = DiskWritableFile::new(path.clone(), file);
                    return Ok((path, Box::new(writable)));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "Could not find an unused name for temp file template {} after {} attempts",
                template.display(),
                MAX_TEMP_NAME_ATTEMPTS
            ),
        ))
    }

    fn new_random_access_file(&self, path: &Path) -> io::Result<Box<dyn RandomAccessFile>> {
        let file = File::open(path)?;
        Ok(Box::new(DiskRandomAccessFile {
            path: path.to_path_buf(),
            file,
        }))
    }

    fn new_sequential_file(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::BufReader::new(File::open(path)?)))
    }

    fn rename_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::rename(src, dst)
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    #[cfg(unix)]
    fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        File::open(dir)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_dir(&self, _dir: &Path) -> io::Result<()> {
        // Directory handles cannot be fsynced here; rename durability is up to the OS.
        Ok(())
    }
}

/// Buffered append-only file on disk.
struct DiskWritableFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    size: u64,
}

impl DiskWritableFile {
    fn new(path: PathBuf, file: File) -> Self {
        Self {
            path,
            writer: Some(BufWriter::new(file)),
            size: 0,
        }
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        let path = &self.path;
        self.writer.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("File already closed: {}", path.display()),
            )
        })
    }
}

impl WritableFile for DiskWritableFile {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer()?.write_all(data)?;
        self.size += data.len() as u64;
        Ok(())
    }

    fn flush(&mut self, mode: FlushMode) -> io::Result<()> {
        let writer = self.writer()?;
        writer.flush()?;
        if mode == FlushMode::Sync {
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        let writer = self.writer()?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(writer) => writer.into_inner().map(drop).map_err(|e| e.into_error()),
            None => Ok(()),
        }
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn filename(&self) -> &Path {
        &self.path
    }
}

/// Positional reader over a file on disk.
struct DiskRandomAccessFile {
    path: PathBuf,
    file: File,
}

impl DiskRandomAccessFile {
    #[cfg(unix)]
    fn pread(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn pread(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }
}

impl RandomAccessFile for DiskRandomAccessFile {
    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.pread(offset + filled as u64, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn filename(&self) -> &Path {
        &self.path
    }
}
