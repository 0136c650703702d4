//! File system model trait.

use dyn_clone::{clone_trait_object, DynClone};

/// A model translating logical file operations into average elapsed times (us) on the underlying device,
/// including the metadata traffic each operation causes.
pub trait FileSystem: DynClone {
    /// Returns human-readable file system description, e.g. `"XFS(0.2)"`.
    fn desc(&self) -> &str;

    /// Returns capacity of the underlying device (bytes).
    fn size(&self) -> f64;

    /// Average time of a read of `bsize` bytes from a `file_size` byte file.
    fn read(&self, bsize: f64, file_size: f64, seq: bool, depth: f64, direct: bool) -> f64;

    /// Average time of a write of `bsize` bytes to a `file_size` byte file.
    ///
    /// Buffered writes are flushed in the background with file system chosen parallelism, `sync` writes wait
    /// for their inode update.
    fn write(&self, bsize: f64, file_size: f64, seq: bool, depth: f64, direct: bool, sync: bool) -> f64;

    /// Opening a file whose parent directory is cached.
    fn open(&self) -> f64;

    /// New file creation.
    fn create(&self, sync: bool) -> f64;

    /// File deletion.
    fn delete(&self, sync: bool) -> f64;

    /// Reading the attributes of an uncached inode.
    fn getattr(&self, depth: f64) -> f64;

    /// Updating the attributes of an inode.
    fn setattr(&self, depth: f64, sync: bool) -> f64;
}

clone_trait_object!(FileSystem);
