//! the object writer
//!
//! canonical ingest: stream -> sha-256 -> tempfile -> rename into the
//! fanout. installation is at-most-once; writing an object that is
//! already stored is counted but performs no i/o beyond the probe.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::{symlink, OpenOptionsExt, PermissionsExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::cancel::{check_cancelled, Cancellable};
use crate::config::RepoMode;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::object::{loose_path, ObjectType};
use crate::repo::Repo;
use crate::stream::{content_stream_parse, ContentHeader};
use crate::types::FileKind;

/// maximum retries for temp symlink names before giving up
const MAX_TEMP_ATTEMPTS: u32 = 128;

/// an in-flight tempfile under tmp/
///
/// unlinked on drop unless the install rename adopts it, so no failure
/// path can leave staging debris behind.
struct TempFile {
    dir: PathBuf,
    name: String,
    adopted: bool,
}

impl TempFile {
    fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    fn adopt(mut self) {
        self.adopted = true;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.adopted {
            let _ = fs::remove_file(self.path());
        }
    }
}

/// create a uniquely named 0644 tempfile owned by the current process
fn create_tempfile(repo: &Repo) -> Result<(TempFile, File)> {
    let name = uuid::Uuid::new_v4().to_string();
    let path = repo.tmp_path().join(&name);
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o644)
        .open(&path)
        .with_path(&path)?;
    Ok((
        TempFile {
            dir: repo.tmp_path(),
            name,
            adopted: false,
        },
        file,
    ))
}

/// create a randomly named symlink under tmp/, retrying on name
/// collisions
fn create_temp_symlink(repo: &Repo, target: &str) -> Result<TempFile> {
    for _ in 0..MAX_TEMP_ATTEMPTS {
        let name = uuid::Uuid::new_v4().to_string();
        let path = repo.tmp_path().join(&name);
        match symlink(target, &path) {
            Ok(()) => {
                return Ok(TempFile {
                    dir: repo.tmp_path(),
                    name,
                    adopted: false,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e).with_path(&path),
        }
    }
    Err(Error::Exhausted)
}

/// reader that feeds everything it yields through a sha-256 hasher
struct ChecksumReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> ChecksumReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> Hash {
        Hash::from_bytes(self.hasher.finalize().into())
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// copy a stream with cancellation polled per chunk
fn splice(
    reader: &mut impl Read,
    writer: &mut impl Write,
    cancellable: Option<&Cancellable>,
) -> Result<u64> {
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        check_cancelled(cancellable)?;
        let n = reader.read(&mut buf).with_path("<object input>")?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).with_path("<object tempfile>")?;
        total += n as u64;
    }
    Ok(total)
}

/// staged state awaiting install
struct Staged {
    temp: TempFile,
    /// open handle kept for chmod/fsync on bare regular files
    file: Option<File>,
    /// decoded header when staging a content object
    header: Option<ContentHeader>,
}

/// core write path shared by the metadata and content entry points
fn write_object(
    repo: &Repo,
    objtype: ObjectType,
    expected: Option<&Hash>,
    input: &mut dyn Read,
    declared_length: u64,
    cancellable: Option<&Cancellable>,
) -> Result<Hash> {
    assert!(
        repo.in_transaction(),
        "object writes require an open transaction"
    );
    check_cancelled(cancellable)?;

    // trusted fast path: the caller vouches for the checksum, and the
    // store already holds the object, so the input is never read
    if let Some(expected) = expected {
        if repo.has_loose_object(expected, objtype)? {
            return Ok(*expected);
        }
    }

    let mut input = ChecksumReader::new(input);
    let staged = stage_object(repo, objtype, &mut input, cancellable)?;

    let actual = input.finish();
    if let Some(expected) = expected {
        if actual != *expected {
            return Err(Error::CorruptObject {
                expected: *expected,
                actual,
            });
        }
    }

    let relpath = loose_path(&actual, objtype, repo.mode());
    let mut do_commit = false;
    {
        let _guard = repo.install_lock.lock().unwrap();
        // recheck after hashing: a concurrent writer of the same
        // content may have installed it while we were staging
        if !repo.has_loose_object(&actual, objtype)? {
            if objtype == ObjectType::File && repo.mode() == RepoMode::Bare {
                let header = staged
                    .header
                    .as_ref()
                    .expect("content staging retains its header");
                apply_bare_attributes(&staged.temp, staged.file.as_ref(), header)?;
            }
            install_loose(repo, staged.temp, &relpath)?;
            do_commit = true;
        }
    }

    let mut stats = repo.txn_stats.lock().unwrap();
    if do_commit {
        if objtype.is_meta() {
            stats.metadata_objects_written += 1;
        } else {
            stats.content_objects_written += 1;
            stats.content_bytes_written += declared_length;
        }
    }
    if objtype.is_meta() {
        stats.metadata_objects_total += 1;
    } else {
        stats.content_objects_total += 1;
    }

    Ok(actual)
}

/// materialize the object input into a tempfile (or temp symlink)
fn stage_object(
    repo: &Repo,
    objtype: ObjectType,
    input: &mut ChecksumReader<&mut dyn Read>,
    cancellable: Option<&Cancellable>,
) -> Result<Staged> {
    if objtype != ObjectType::File {
        let (temp, mut file) = create_tempfile(repo)?;
        splice(input, &mut file, cancellable)?;
        return Ok(Staged {
            temp,
            file: Some(file),
            header: None,
        });
    }

    let header = content_stream_parse(input)?;
    match (&header.info.kind, repo.mode()) {
        (FileKind::Regular { .. }, RepoMode::Bare) => {
            // created 0644 and owned by us; the real mode, ownership
            // and xattrs are applied only after the checksum validates
            let (temp, mut file) = create_tempfile(repo)?;
            splice(input, &mut file, cancellable)?;
            Ok(Staged {
                temp,
                file: Some(file),
                header: Some(header),
            })
        }
        (FileKind::Symlink { .. }, RepoMode::Bare) => {
            let target = header
                .info
                .symlink_target()
                .expect("symlink header carries its target")
                .to_string();
            let temp = create_temp_symlink(repo, &target)?;
            Ok(Staged {
                temp,
                file: None,
                header: Some(header),
            })
        }
        (FileKind::Directory | FileKind::Special, RepoMode::Bare) => {
            unreachable!("content_stream_parse only yields regular files and symlinks")
        }
        (_, RepoMode::ArchiveZ2) => {
            // archive objects carry the header on disk; the payload is
            // zlib-raw compressed and present only for regular files
            let (temp, mut file) = create_tempfile(repo)?;
            file.write_all(&header.encode_with_size()?)
                .with_path(temp.path())?;
            if header.info.is_regular() {
                let mut encoder = DeflateEncoder::new(&mut file, Compression::new(9));
                splice(input, &mut encoder, cancellable)?;
                encoder.finish().with_path(temp.path())?;
            }
            Ok(Staged {
                temp,
                file: Some(file),
                header: Some(header),
            })
        }
    }
}

/// apply ownership, xattrs and mode to a staged bare content object,
/// in that order, then fsync
///
/// runs only after checksum validation so a truncated or corrupted
/// stream can never leave a transiently setuid tempfile behind.
/// symlinks skip chmod and fsync; they carry no permission bits.
fn apply_bare_attributes(
    temp: &TempFile,
    file: Option<&File>,
    header: &ContentHeader,
) -> Result<()> {
    let path = temp.path();
    let info = &header.info;

    let current_uid = nix::unistd::getuid().as_raw();
    let current_gid = nix::unistd::getgid().as_raw();
    if info.uid != current_uid || info.gid != current_gid {
        if info.is_symlink() {
            std::os::unix::fs::lchown(&path, Some(info.uid), Some(info.gid)).with_path(&path)?;
        } else {
            nix::unistd::chown(
                &path,
                Some(nix::unistd::Uid::from_raw(info.uid)),
                Some(nix::unistd::Gid::from_raw(info.gid)),
            )
            .map_err(|e| Error::Io {
                path: path.clone(),
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }
    }

    if !info.is_symlink() {
        crate::fs::apply_xattrs(&path, &header.xattrs)?;

        let file = file.expect("bare regular staging keeps its handle");
        file.set_permissions(fs::Permissions::from_mode(info.mode & 0o7777))
            .with_path(&path)?;
        file.sync_all().with_path(&path)?;
    }

    Ok(())
}

/// install a staged tempfile at its final loose path
///
/// the fanout directory may already exist, and the rename may find the
/// name occupied when another writer won the race; both cases are
/// success, and the loser's tempfile is unlinked either way.
fn install_loose(repo: &Repo, temp: TempFile, relpath: &str) -> Result<()> {
    let fanout = repo.objects_path().join(&relpath[..2]);
    match fs::create_dir(&fanout) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e).with_path(&fanout),
    }

    let final_path = repo.objects_path().join(relpath);
    match fs::rename(temp.path(), &final_path) {
        Ok(()) => {
            temp.adopt();
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e).with_path(&final_path),
    }
}

impl Repo {
    /// store a metadata object from its canonical bytes, returning its
    /// checksum; verified against `expected` when given
    pub fn write_metadata(
        &self,
        objtype: ObjectType,
        expected: Option<&Hash>,
        object: &[u8],
        cancellable: Option<&Cancellable>,
    ) -> Result<Hash> {
        assert!(objtype.is_meta(), "content goes through write_content");
        let mut input: &[u8] = object;
        write_object(self, objtype, expected, &mut input, 0, cancellable)
    }

    /// store a metadata object under a checksum the caller vouches
    /// for; a no-op when the store already holds it
    pub fn write_metadata_trusted(
        &self,
        objtype: ObjectType,
        checksum: &Hash,
        object: &[u8],
        cancellable: Option<&Cancellable>,
    ) -> Result<()> {
        self.write_metadata(objtype, Some(checksum), object, cancellable)?;
        Ok(())
    }

    /// store a content object from its stream encoding, returning its
    /// checksum; `length` is the declared payload size used for stats
    pub fn write_content<R: Read>(
        &self,
        expected: Option<&Hash>,
        mut input: R,
        length: u64,
        cancellable: Option<&Cancellable>,
    ) -> Result<Hash> {
        write_object(
            self,
            ObjectType::File,
            expected,
            &mut input,
            length,
            cancellable,
        )
    }

    /// store a content object under a trusted checksum; used when
    /// importing objects whose identity is already known
    pub fn write_content_trusted<R: Read>(
        &self,
        checksum: &Hash,
        input: R,
        length: u64,
        cancellable: Option<&Cancellable>,
    ) -> Result<()> {
        self.write_content(Some(checksum), input, length, cancellable)?;
        Ok(())
    }

    /// dispatch `write_metadata` onto a worker thread
    pub fn write_metadata_async(
        self: &Arc<Self>,
        objtype: ObjectType,
        expected: Option<Hash>,
        object: Vec<u8>,
        cancellable: Option<Arc<Cancellable>>,
    ) -> thread::JoinHandle<Result<Hash>> {
        let repo = Arc::clone(self);
        thread::spawn(move || {
            repo.write_metadata(objtype, expected.as_ref(), &object, cancellable.as_deref())
        })
    }

    /// dispatch `write_content` onto a worker thread
    pub fn write_content_async<R: Read + Send + 'static>(
        self: &Arc<Self>,
        expected: Option<Hash>,
        input: R,
        length: u64,
        cancellable: Option<Arc<Cancellable>>,
    ) -> thread::JoinHandle<Result<Hash>> {
        let repo = Arc::clone(self);
        thread::spawn(move || {
            repo.write_content(expected.as_ref(), input, length, cancellable.as_deref())
        })
    }
}
