//! # Memory-Mapped Cell File
//!
//! `NodeFile` maps a file of equal-sized cells and hands out bounds-checked
//! byte slices per cell. It backs the B-tree engine: cell 0 holds the tree
//! metadata, cells `1..` hold tree nodes.
//!
//! Two backings exist. A file created for writing maps `MmapMut` over a
//! truncated file and may grow; a file opened for reading maps an immutable
//! `Mmap` and rejects mutation. Growth flushes the old mapping, extends the
//! file, and remaps; the `&mut self` receiver guarantees no outstanding
//! cell borrows at that point.

use std::fs::{File, OpenOptions};
use std::path::Path;

use eyre::{bail, ensure, Result, WrapErr};
use memmap2::{Mmap, MmapMut};

enum Backing {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Backing {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Backing::ReadOnly(map) => &map[..],
            Backing::ReadWrite(map) => &map[..],
        }
    }
}

pub struct NodeFile {
    file: File,
    backing: Backing,
    cell_size: usize,
    cell_count: u64,
}

impl std::fmt::Debug for NodeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeFile")
            .field("cell_size", &self.cell_size)
            .field("cell_count", &self.cell_count)
            .field(
                "writable",
                &matches!(self.backing, Backing::ReadWrite(_)),
            )
            .finish()
    }
}

impl NodeFile {
    /// Creates (truncating) a read-write cell file sized for
    /// `initial_cells` cells. New bytes read as zero.
    pub fn create<P: AsRef<Path>>(path: P, cell_size: usize, initial_cells: u64) -> Result<Self> {
        let path = path.as_ref();

        ensure!(cell_size > 0, "cell size must be non-zero");
        ensure!(initial_cells > 0, "initial cell count must be at least 1");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create index file '{}'", path.display()))?;

        let file_size = initial_cells * cell_size as u64;
        file.set_len(file_size)
            .wrap_err_with(|| format!("failed to set file size to {} bytes", file_size))?;

        // SAFETY: MmapMut::map_mut is unsafe because externally modified
        // mappings are undefined behavior. This is safe because:
        // 1. The file was just created with truncate=true, so no other
        //    mapping of its contents exists
        // 2. An index file is owned exclusively by its engine instance
        // 3. The mmap lifetime is tied to NodeFile, preventing use-after-unmap
        // 4. All access goes through cell()/cell_mut() which bounds-check
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            file,
            backing: Backing::ReadWrite(mmap),
            cell_size,
            cell_count: initial_cells,
        })
    }

    /// Opens an existing cell file read-only. The file must be non-empty
    /// and its length an exact multiple of `cell_size`.
    pub fn open_readonly<P: AsRef<Path>>(path: P, cell_size: usize) -> Result<Self> {
        let path = path.as_ref();

        ensure!(cell_size > 0, "cell size must be non-zero");

        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open index file '{}'", path.display()))?;

        let file_size = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
            .len();

        ensure!(
            file_size > 0,
            "cannot open empty index file '{}'",
            path.display()
        );
        ensure!(
            file_size % cell_size as u64 == 0,
            "index file '{}' size {} is not a multiple of cell size {}",
            path.display(),
            file_size,
            cell_size
        );

        // SAFETY: Mmap::map is unsafe because the underlying file could be
        // modified externally. This is safe because:
        // 1. Index files are read-only once built; the caller guarantees no
        //    concurrent writer per the single-owner access model
        // 2. The mapping is immutable, so this process never writes it
        // 3. All access goes through cell() which bounds-checks
        let mmap = unsafe {
            Mmap::map(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            file,
            backing: Backing::ReadOnly(mmap),
            cell_size,
            cell_count: file_size / cell_size as u64,
        })
    }

    pub fn cell(&self, cell_no: u64) -> Result<&[u8]> {
        ensure!(
            cell_no < self.cell_count,
            "cell {} out of bounds (cell_count={})",
            cell_no,
            self.cell_count
        );

        let offset = cell_no as usize * self.cell_size;
        Ok(&self.backing.as_bytes()[offset..offset + self.cell_size])
    }

    pub fn cell_mut(&mut self, cell_no: u64) -> Result<&mut [u8]> {
        ensure!(
            cell_no < self.cell_count,
            "cell {} out of bounds (cell_count={})",
            cell_no,
            self.cell_count
        );

        let offset = cell_no as usize * self.cell_size;
        match &mut self.backing {
            Backing::ReadWrite(map) => Ok(&mut map[offset..offset + self.cell_size]),
            Backing::ReadOnly(_) => bail!("cannot write to a read-only index file"),
        }
    }

    /// Copies one cell into `buf`, which must be exactly one cell long.
    pub fn read_cell(&self, cell_no: u64, buf: &mut [u8]) -> Result<()> {
        ensure!(
            buf.len() == self.cell_size,
            "cell buffer of {} bytes does not match cell size {}",
            buf.len(),
            self.cell_size
        );
        buf.copy_from_slice(self.cell(cell_no)?);
        Ok(())
    }

    /// Overwrites one cell from `buf`, which must be exactly one cell long.
    pub fn write_cell(&mut self, cell_no: u64, buf: &[u8]) -> Result<()> {
        ensure!(
            buf.len() == self.cell_size,
            "cell buffer of {} bytes does not match cell size {}",
            buf.len(),
            self.cell_size
        );
        self.cell_mut(cell_no)?.copy_from_slice(buf);
        Ok(())
    }

    /// Extends the file to hold `new_cell_count` cells. A no-op when the
    /// file is already that large.
    pub fn grow(&mut self, new_cell_count: u64) -> Result<()> {
        if new_cell_count <= self.cell_count {
            return Ok(());
        }

        let map = match &mut self.backing {
            Backing::ReadWrite(map) => map,
            Backing::ReadOnly(_) => bail!("cannot grow a read-only index file"),
        };

        map.flush_async().wrap_err("failed to flush mmap before grow")?;

        let new_size = new_cell_count * self.cell_size as u64;
        self.file
            .set_len(new_size)
            .wrap_err_with(|| format!("failed to extend index file to {} bytes", new_size))?;

        // SAFETY: remapping invalidates the old mapping. This is safe because:
        // 1. grow() takes &mut self, so no cell references exist (borrow checker)
        // 2. The old mapping was flushed above
        // 3. The file was extended to new_size before remapping
        // 4. The old mapping is dropped by the assignment
        self.backing = Backing::ReadWrite(unsafe {
            MmapMut::map_mut(&self.file).wrap_err("failed to remap index file after grow")?
        });

        self.cell_count = new_cell_count;

        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        match &self.backing {
            Backing::ReadWrite(map) => map.flush().wrap_err("failed to sync index file"),
            Backing::ReadOnly(_) => Ok(()),
        }
    }

    pub fn cell_count(&self) -> u64 {
        self.cell_count
    }

    pub fn file_size(&self) -> u64 {
        self.cell_count * self.cell_size as u64
    }
}
