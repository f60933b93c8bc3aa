//! FUSE bridge mounting a `duofs` image as a real filesystem.
//!
//! This crate is the thin VFS-callback adapter `spec.md` §1 places out of
//! scope for the core: it registers with the kernel via `fuser`, translates
//! `fuser`'s inode-numbered callbacks into `duofs`'s path-addressed
//! `FileSystem` API (see [`ino`]), and maps [`duofs::Error`] onto the
//! conventional positive errno `fuser`'s reply types expect.

mod ino;

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use clap::Parser;
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
};

use duofs::{Attributes, Config, FileKind, FileSystem as DuoFileSystem};
use ino::{Entry, InoTable, ROOT_INO};

/// How long the kernel is told it may cache attribute and entry replies.
///
/// `duofs` images are single-mount, single-writer (`spec.md` §5), so there
/// is no other actor that could invalidate a cached entry out from under
/// the kernel; a short TTL is used anyway so a second mount of the same
/// image (accidental or not) becomes visible quickly rather than never.
const ATTR_TTL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(
    name = "duofs-fuse",
    about = "Mount a duofs disk image as a FUSE filesystem"
)]
struct Cli {
    /// Path to the `.disk` backing image.
    #[arg(long, default_value = ".disk")]
    image: PathBuf,

    /// Directory to mount the filesystem at.
    mountpoint: PathBuf,

    /// Format a fresh image at `--image` before mounting, overwriting any
    /// existing file there.
    #[arg(long)]
    format: bool,

    /// Stay attached to the terminal instead of daemonizing.
    #[arg(long)]
    foreground: bool,

    /// Allow other users to access the mount (passes through to FUSE).
    #[arg(long)]
    allow_other: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    if !cli.foreground {
        if let Err(code) = fork::daemon(true, true) {
            log::error!("failed to daemonize (fork returned {code})");
            std::process::exit(1);
        }
    }

    let config = Config::new(&cli.image);
    let fs = if cli.format {
        DuoFileSystem::format(&config)?
    } else {
        DuoFileSystem::open_or_format(&config)?
    };

    let mut options = vec![MountOption::FSName("duofs".to_string()), MountOption::RW];
    if cli.allow_other {
        options.push(MountOption::AllowOther);
    }

    log::info!("mounting {:?} at {:?}", cli.image, cli.mountpoint);
    fuser::mount2(DuoFuse::new(fs), &cli.mountpoint, &options)?;
    Ok(())
}

/// Path-addressed state shared by every `fuser` callback.
///
/// Held behind a [`Mutex`] per `spec.md` §9 "Concurrency": `fuser` may
/// dispatch callbacks from more than one worker thread, which the
/// single-callback-at-a-time core itself does not defend against. The core
/// stays lock-free and single-threaded in its own assumptions, exactly as
/// specified; this bridge-layer `Mutex` is what lets it be shared safely
/// across whatever threading model `fuser` chooses to use.
struct State {
    fs: DuoFileSystem,
    inos: InoTable,
}

/// Adapts a [`DuoFileSystem`] to `fuser`'s inode-addressed [`Filesystem`]
/// trait, per `spec.md` §6's operation surface.
struct DuoFuse {
    state: Mutex<State>,
}

impl DuoFuse {
    fn new(fs: DuoFileSystem) -> Self {
        Self {
            state: Mutex::new(State {
                fs,
                inos: InoTable::new(),
            }),
        }
    }

    /// Builds the child path `parent_path/name` and the [`Entry`] that will
    /// be assigned an inode number if the lookup or creation succeeds.
    ///
    /// `name`'s extension is split the same way `duofs::directory::
    /// parse_path` splits it (first `.`), so the inode this bridge assigns
    /// agrees with the `(name, ext)` pair the core actually stored.
    fn child(parent_path: &str, name: &OsStr) -> Option<(String, Entry)> {
        let name = name.to_str()?;
        if parent_path == "/" {
            Some((
                format!("/{name}"),
                Entry::Directory { name: name.to_string() },
            ))
        } else {
            let dir = parent_path.trim_start_matches('/').to_string();
            let (base, ext) = name.split_once('.').unwrap_or((name, ""));
            Some((
                format!("{parent_path}/{name}"),
                Entry::File {
                    dir,
                    name: base.to_string(),
                    ext: ext.to_string(),
                },
            ))
        }
    }

    fn file_attr(ino: u64, req: &Request<'_>, attrs: &Attributes) -> FileAttr {
        let kind = match attrs.kind {
            FileKind::Directory => FileType::Directory,
            FileKind::RegularFile => FileType::RegularFile,
        };
        let blocks = (attrs.size + 511) / 512;
        let epoch = SystemTime::UNIX_EPOCH;
        FileAttr {
            ino,
            size: attrs.size,
            blocks,
            atime: epoch,
            mtime: epoch,
            ctime: epoch,
            crtime: epoch,
            kind,
            perm: (attrs.mode() & 0o7777) as u16,
            nlink: attrs.nlink,
            uid: req.uid(),
            gid: req.gid(),
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }
}

impl Filesystem for DuoFuse {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let mut state = self.state.lock().unwrap();
        let Some(parent_path) = state.inos.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some((path, entry)) = Self::child(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match state.fs.getattr(&path) {
            Ok(attrs) => {
                let ino = state.inos.ino_for(entry);
                reply.entry(&ATTR_TTL, &Self::file_attr(ino, req, &attrs), 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let mut state = self.state.lock().unwrap();
        let Some(path) = state.inos.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match state.fs.getattr(&path) {
            Ok(attrs) => reply.attr(&ATTR_TTL, &Self::file_attr(ino, req, &attrs)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let mut state = self.state.lock().unwrap();
        let Some(parent_path) = state.inos.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some((path, entry)) = Self::child(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        if let Err(e) = state.fs.mkdir(&path) {
            reply.error(e.to_errno());
            return;
        }
        match state.fs.getattr(&path) {
            Ok(attrs) => {
                let ino = state.inos.ino_for(entry);
                reply.entry(&ATTR_TTL, &Self::file_attr(ino, req, &attrs), 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mknod(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let mut state = self.state.lock().unwrap();
        let Some(parent_path) = state.inos.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some((path, entry)) = Self::child(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        if let Err(e) = state.fs.mknod(&path) {
            reply.error(e.to_errno());
            return;
        }
        match state.fs.getattr(&path) {
            Ok(attrs) => {
                let ino = state.inos.ino_for(entry);
                reply.entry(&ATTR_TTL, &Self::file_attr(ino, req, &attrs), 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let mut state = self.state.lock().unwrap();
        let Some(parent_path) = state.inos.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some((path, entry)) = Self::child(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        if let Err(e) = state.fs.mknod(&path) {
            reply.error(e.to_errno());
            return;
        }
        match state.fs.getattr(&path) {
            Ok(attrs) => {
                let ino = state.inos.ino_for(entry);
                reply.created(&ATTR_TTL, &Self::file_attr(ino, req, &attrs), 0, 0, 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    /// No-op success: file deletion is out of scope (`spec.md` §1, §4.4).
    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut state = self.state.lock().unwrap();
        let Some(parent_path) = state.inos.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some((path, _)) = Self::child(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match state.fs.unlink(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    /// No-op success: directory deletion is out of scope (`spec.md` §1, §4.4).
    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut state = self.state.lock().unwrap();
        let Some(parent_path) = state.inos.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some((path, _)) = Self::child(&parent_path, name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match state.fs.rmdir(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    /// `size` truncation is a no-op beyond zero-size creation (`spec.md`
    /// §1, §4.4); every other `setattr` field is ignored and the call
    /// simply reports the file's current attributes.
    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let mut state = self.state.lock().unwrap();
        let Some(path) = state.inos.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if let Some(size) = size {
            if let Err(e) = state.fs.truncate(&path, size) {
                reply.error(e.to_errno());
                return;
            }
        }
        match state.fs.getattr(&path) {
            Ok(attrs) => reply.attr(&ATTR_TTL, &Self::file_attr(ino, req, &attrs)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    /// No-op success: the core has no file-descriptor state to track.
    fn open(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn opendir(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let mut state = self.state.lock().unwrap();
        let Some(path) = state.inos.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match state.fs.read(&path, size as usize, offset as u64) {
            Ok(bytes) => reply.data(&bytes),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let mut state = self.state.lock().unwrap();
        let Some(path) = state.inos.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match state.fs.write(&path, data, offset as u64) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    /// No-op success: the bridge owns no per-handle buffering to flush.
    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let mut state = self.state.lock().unwrap();
        let Some(path) = state.inos.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let names = match state.fs.readdir(&path) {
            Ok(names) => names,
            Err(e) => {
                reply.error(e.to_errno());
                return;
            }
        };

        let is_root = path == "/";
        for (i, name) in names.into_iter().enumerate().skip(offset as usize) {
            let (child_ino, kind) = match name.as_str() {
                "." => (ino, FileType::Directory),
                // a directory's parent is always root; root is its own parent.
                ".." => (ROOT_INO, FileType::Directory),
                _ if is_root => {
                    let e = Entry::Directory { name: name.clone() };
                    (state.inos.ino_for(e), FileType::Directory)
                }
                _ => {
                    let dir = path.trim_start_matches('/').to_string();
                    let (base, ext) = name.split_once('.').unwrap_or((name.as_str(), ""));
                    let e = Entry::File {
                        dir,
                        name: base.to_string(),
                        ext: ext.to_string(),
                    };
                    (state.inos.ino_for(e), FileType::RegularFile)
                }
            };
            // `reply.add` returns true once the kernel's reply buffer is full;
            // the next `readdir` call resumes from this offset.
            if reply.add(child_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn child_of_root_is_a_directory_entry() {
        let (path, entry) = DuoFuse::child("/", OsStr::new("docs")).unwrap();
        assert_eq!(path, "/docs");
        assert_eq!(entry, Entry::Directory { name: "docs".to_string() });
    }

    #[test]
    fn child_of_a_directory_splits_name_and_extension() {
        let (path, entry) = DuoFuse::child("/docs", OsStr::new("readme.txt")).unwrap();
        assert_eq!(path, "/docs/readme.txt");
        assert_eq!(
            entry,
            Entry::File {
                dir: "docs".to_string(),
                name: "readme".to_string(),
                ext: "txt".to_string(),
            }
        );
    }

    #[test]
    fn child_of_a_directory_without_an_extension_has_an_empty_ext() {
        let (_, entry) = DuoFuse::child("/docs", OsStr::new("readme")).unwrap();
        assert_eq!(
            entry,
            Entry::File {
                dir: "docs".to_string(),
                name: "readme".to_string(),
                ext: "".to_string(),
            }
        );
    }
}
