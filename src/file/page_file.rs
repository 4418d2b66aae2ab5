use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::error::{FileError, FileResult};
use super::{PAGE_SIZE, PageNum};

/// Number of reserved pages in front of logical page 0
const RESERVED_PAGES: usize = 1;

/// An open page file together with its cursor.
///
/// On disk the file is a metadata page holding the ASCII decimal page count,
/// followed by `total_num_pages` data pages of `PAGE_SIZE` bytes each.
#[derive(Debug)]
pub struct PageFile {
    file: File,
    path: PathBuf,
    total_num_pages: usize,
    cur_page_pos: usize,
}

impl PageFile {
    /// Create a page file holding a single zero-filled page.
    ///
    /// An existing file at `path` is truncated.
    pub fn create<P: AsRef<Path>>(path: P) -> FileResult<()> {
        let path = path.as_ref();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| FileError::WriteFailed(format!("{}: {}", path.display(), e)))?;

        let mut contents = vec![0u8; (RESERVED_PAGES + 1) * PAGE_SIZE];
        encode_page_count(1, &mut contents[..PAGE_SIZE]);
        file.write_all(&contents)
            .map_err(|e| FileError::WriteFailed(e.to_string()))?;
        file.sync_data()?;

        info!("created page file {}", path.display());
        Ok(())
    }

    /// Open an existing page file, positioning the cursor on page 0
    pub fn open<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        Self::open_with(path.as_ref(), OpenOptions::new().read(true).write(true))
    }

    /// Open without write access, so every write fails
    #[cfg(test)]
    pub(crate) fn open_read_only<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        Self::open_with(path.as_ref(), OpenOptions::new().read(true))
    }

    fn open_with(path: &Path, options: &OpenOptions) -> FileResult<Self> {
        let mut file = options
            .open(path)
            .map_err(|_| FileError::NotFound(path.display().to_string()))?;

        // A valid file always holds at least one data page
        let mut metadata = vec![0u8; PAGE_SIZE];
        let filled = read_up_to(&mut file, &mut metadata)?;
        let total_num_pages = decode_page_count(&metadata[..filled])
            .filter(|&count| count > 0)
            .ok_or_else(|| {
                FileError::ReadFailed(format!(
                    "{}: metadata page does not hold a page count",
                    path.display()
                ))
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            total_num_pages,
            cur_page_pos: 0,
        })
    }

    /// Sync and close the file
    pub fn close(mut self) -> FileResult<()> {
        self.sync()
    }

    /// Delete a page file from disk
    pub fn destroy<P: AsRef<Path>>(path: P) -> FileResult<()> {
        let path = path.as_ref();
        std::fs::remove_file(path).map_err(|_| FileError::NotFound(path.display().to_string()))?;
        info!("destroyed page file {}", path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_num_pages(&self) -> usize {
        self.total_num_pages
    }

    /// Current cursor position.
    ///
    /// Reading or writing page `k` leaves the cursor at `k + 1`.
    pub fn block_pos(&self) -> usize {
        self.cur_page_pos
    }

    /// Read logical page `page_num` into `buffer`
    pub fn read_block(&mut self, page_num: PageNum, buffer: &mut [u8]) -> FileResult<()> {
        check_buffer(buffer.len())?;
        if page_num >= self.total_num_pages {
            return Err(FileError::non_existing(page_num, self.total_num_pages));
        }

        let offset = page_offset(page_num);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|_| FileError::SeekFailed(offset))?;

        // The tail of a truncated file reads as zeros
        let bytes_read = read_up_to(&mut self.file, buffer)?;
        if bytes_read < PAGE_SIZE {
            buffer[bytes_read..].fill(0);
        }

        self.cur_page_pos = page_num + 1;
        Ok(())
    }

    pub fn read_first_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        self.read_block(0, buffer)
    }

    pub fn read_previous_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        self.read_relative(-1, buffer)
    }

    pub fn read_current_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        self.read_relative(0, buffer)
    }

    pub fn read_next_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        self.read_relative(1, buffer)
    }

    pub fn read_last_block(&mut self, buffer: &mut [u8]) -> FileResult<()> {
        let last = self.total_num_pages.checked_sub(1).ok_or(FileError::NonExistingPage {
            page: -1,
            total: self.total_num_pages,
        })?;
        self.read_block(last, buffer)
    }

    fn read_relative(&mut self, delta: i64, buffer: &mut [u8]) -> FileResult<()> {
        let target = self.cur_page_pos as i64 + delta;
        if target < 0 {
            return Err(FileError::NonExistingPage {
                page: target,
                total: self.total_num_pages,
            });
        }
        self.read_block(target as PageNum, buffer)
    }

    /// Write `buffer` to logical page `page_num`
    pub fn write_block(&mut self, page_num: PageNum, buffer: &[u8]) -> FileResult<()> {
        check_buffer(buffer.len())?;
        if page_num >= self.total_num_pages {
            return Err(FileError::WriteFailed(format!(
                "page {} is beyond the end of file ({} pages)",
                page_num, self.total_num_pages
            )));
        }

        let offset = page_offset(page_num);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|_| FileError::SeekFailed(offset))?;
        self.file
            .write_all(buffer)
            .map_err(|e| FileError::WriteFailed(e.to_string()))?;

        self.cur_page_pos = page_num + 1;
        Ok(())
    }

    pub fn write_current_block(&mut self, buffer: &[u8]) -> FileResult<()> {
        self.write_block(self.cur_page_pos, buffer)
    }

    /// Append one zero-filled page and persist the new page count.
    ///
    /// The cursor is left where it was.
    pub fn append_empty_block(&mut self) -> FileResult<()> {
        let offset = page_offset(self.total_num_pages);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|_| FileError::SeekFailed(offset))?;
        self.file
            .write_all(&[0u8; PAGE_SIZE])
            .map_err(|e| FileError::WriteFailed(e.to_string()))?;

        let new_total = self.total_num_pages + 1;
        self.write_page_count(new_total)?;
        self.total_num_pages = new_total;

        debug!(
            "appended page {} to {}",
            new_total - 1,
            self.path.display()
        );
        Ok(())
    }

    /// Grow the file until it holds at least `num_pages` pages
    pub fn ensure_capacity(&mut self, num_pages: usize) -> FileResult<()> {
        while self.total_num_pages < num_pages {
            self.append_empty_block().map_err(|e| match e {
                FileError::WriteFailed(_) => e,
                other => FileError::WriteFailed(other.to_string()),
            })?;
        }
        Ok(())
    }

    /// Flush OS buffers for this file
    pub fn sync(&mut self) -> FileResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    fn write_page_count(&mut self, total: usize) -> FileResult<()> {
        let mut metadata = [0u8; PAGE_SIZE];
        encode_page_count(total, &mut metadata);
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|_| FileError::SeekFailed(0))?;
        self.file
            .write_all(&metadata)
            .map_err(|e| FileError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}

fn page_offset(page_num: PageNum) -> u64 {
    ((page_num + RESERVED_PAGES) * PAGE_SIZE) as u64
}

fn check_buffer(len: usize) -> FileResult<()> {
    if len != PAGE_SIZE {
        return Err(FileError::InvalidPageSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

/// Fill `buffer` from the current position, stopping early at end of file
fn read_up_to(file: &mut File, buffer: &mut [u8]) -> FileResult<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FileError::ReadFailed(e.to_string())),
        }
    }
    Ok(filled)
}

fn encode_page_count(total: usize, metadata: &mut [u8]) {
    let digits = total.to_string();
    metadata.fill(0);
    metadata[..digits.len()].copy_from_slice(digits.as_bytes());
}

/// Parse the leading decimal number of the metadata page
fn decode_page_count(metadata: &[u8]) -> Option<usize> {
    let start = metadata.iter().position(|b| !b.is_ascii_whitespace())?;
    let digits = metadata[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    std::str::from_utf8(&metadata[start..start + digits])
        .ok()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_file() -> (TempDir, PathBuf) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test.bin");
        PageFile::create(&path).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_create_open_close() {
        let (_temp_dir, path) = setup_test_file();

        let file = PageFile::open(&path).unwrap();
        assert_eq!(file.path(), path.as_path());
        assert_eq!(file.total_num_pages(), 1);
        assert_eq!(file.block_pos(), 0);
        file.close().unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, (2 * PAGE_SIZE) as u64);
    }

    #[test]
    fn test_destroy() {
        let (_temp_dir, path) = setup_test_file();

        PageFile::destroy(&path).unwrap();
        assert!(!path.exists());
        assert!(matches!(PageFile::open(&path), Err(FileError::NotFound(_))));
        assert!(matches!(PageFile::destroy(&path), Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_open_nonexistent_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = PageFile::open(temp_dir.path().join("missing.bin"));
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_open_garbage_metadata() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("garbage.bin");
        std::fs::write(&path, b"not a number").unwrap();

        assert!(matches!(PageFile::open(&path), Err(FileError::ReadFailed(_))));
    }

    #[test]
    fn test_open_zero_page_count() {
        let (_temp_dir, path) = setup_test_file();

        let mut raw = std::fs::read(&path).unwrap();
        raw[0] = b'0';
        std::fs::write(&path, &raw).unwrap();

        assert!(matches!(PageFile::open(&path), Err(FileError::ReadFailed(_))));
    }

    #[test]
    fn test_metadata_page_is_ascii_count() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();
        file.ensure_capacity(12).unwrap();
        file.close().unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..3], b"12\0");
        assert_eq!(raw.len(), 13 * PAGE_SIZE);
    }

    #[test]
    fn test_fresh_page_is_zeroed() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();

        let mut buffer = vec![0xFFu8; PAGE_SIZE];
        file.read_first_block(&mut buffer).unwrap();
        assert!(buffer.iter().all(|&b| b == 0));
        assert_eq!(file.block_pos(), 1);
    }

    #[test]
    fn test_read_write_block() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();
        file.ensure_capacity(4).unwrap();

        let write_buffer: Vec<u8> = (0..PAGE_SIZE).map(|i| b'0' + (i % 10) as u8).collect();
        file.write_block(2, &write_buffer).unwrap();
        assert_eq!(file.block_pos(), 3);

        let mut read_buffer = vec![0u8; PAGE_SIZE];
        file.read_block(2, &mut read_buffer).unwrap();
        assert_eq!(read_buffer, write_buffer);

        // Neighbours untouched
        file.read_block(1, &mut read_buffer).unwrap();
        assert!(read_buffer.iter().all(|&b| b == 0));
        file.read_block(3, &mut read_buffer).unwrap();
        assert!(read_buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_survives_reopen() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();
        file.ensure_capacity(5).unwrap();

        let mut buffer = vec![b'a'; PAGE_SIZE];
        buffer[PAGE_SIZE / 2..].fill(b'b');
        file.write_block(3, &buffer).unwrap();
        file.close().unwrap();

        let mut file = PageFile::open(&path).unwrap();
        assert_eq!(file.total_num_pages(), 5);
        let mut read_buffer = vec![0u8; PAGE_SIZE];
        file.read_block(3, &mut read_buffer).unwrap();
        assert_eq!(read_buffer, buffer);
    }

    #[test]
    fn test_read_beyond_end() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();

        let mut buffer = vec![0u8; PAGE_SIZE];
        let result = file.read_block(1, &mut buffer);
        assert!(matches!(
            result,
            Err(FileError::NonExistingPage { page: 1, total: 1 })
        ));
        assert_eq!(file.block_pos(), 0);
    }

    #[test]
    fn test_write_beyond_end() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();

        let buffer = vec![1u8; PAGE_SIZE];
        assert!(matches!(
            file.write_block(1, &buffer),
            Err(FileError::WriteFailed(_))
        ));
        assert_eq!(file.total_num_pages(), 1);
    }

    #[test]
    fn test_invalid_buffer_size() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();

        let mut small_buffer = vec![0u8; PAGE_SIZE - 1];
        let result = file.read_block(0, &mut small_buffer);
        assert!(matches!(result, Err(FileError::InvalidPageSize { .. })));

        let large_buffer = vec![0u8; PAGE_SIZE + 1];
        let result = file.write_block(0, &large_buffer);
        assert!(matches!(result, Err(FileError::InvalidPageSize { .. })));
    }

    #[test]
    fn test_append_empty_block() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();

        let dirty = vec![7u8; PAGE_SIZE];
        file.write_block(0, &dirty).unwrap();

        for expected in 2..=4 {
            file.append_empty_block().unwrap();
            assert_eq!(file.total_num_pages(), expected);

            let mut buffer = vec![0xAAu8; PAGE_SIZE];
            file.read_last_block(&mut buffer).unwrap();
            assert!(buffer.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_append_keeps_cursor() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();

        let mut buffer = vec![0u8; PAGE_SIZE];
        file.read_first_block(&mut buffer).unwrap();
        file.ensure_capacity(5).unwrap();
        assert_eq!(file.total_num_pages(), 5);
        assert_eq!(file.block_pos(), 1);
    }

    #[test]
    fn test_ensure_capacity() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();

        file.ensure_capacity(4).unwrap();
        assert_eq!(file.total_num_pages(), 4);

        // Already large enough
        file.ensure_capacity(2).unwrap();
        assert_eq!(file.total_num_pages(), 4);
        file.ensure_capacity(4).unwrap();
        assert_eq!(file.total_num_pages(), 4);

        file.ensure_capacity(10).unwrap();
        assert_eq!(file.total_num_pages(), 10);
    }

    #[test]
    fn test_cursor_wrappers() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();
        file.ensure_capacity(4).unwrap();

        for page in 0..4 {
            let buffer = vec![page as u8 + 1; PAGE_SIZE];
            file.write_block(page, &buffer).unwrap();
        }

        let mut buffer = vec![0u8; PAGE_SIZE];

        // Fresh cursor at 0: next reads page 1
        let mut file = {
            file.close().unwrap();
            PageFile::open(&path).unwrap()
        };
        file.read_next_block(&mut buffer).unwrap();
        assert_eq!(buffer[0], 2);
        assert_eq!(file.block_pos(), 2);

        // Current reads page at the cursor, i.e. the one after the last read
        file.read_current_block(&mut buffer).unwrap();
        assert_eq!(buffer[0], 3);
        assert_eq!(file.block_pos(), 3);

        // Previous reads cursor - 1, which is the page just read
        file.read_previous_block(&mut buffer).unwrap();
        assert_eq!(buffer[0], 3);

        file.read_last_block(&mut buffer).unwrap();
        assert_eq!(buffer[0], 4);
        assert_eq!(file.block_pos(), 4);

        // Cursor past the end
        assert!(matches!(
            file.read_current_block(&mut buffer),
            Err(FileError::NonExistingPage { page: 4, .. })
        ));
    }

    #[test]
    fn test_read_previous_at_start() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();

        let mut buffer = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            file.read_previous_block(&mut buffer),
            Err(FileError::NonExistingPage { page: -1, .. })
        ));
    }

    #[test]
    fn test_write_current_block() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();
        file.ensure_capacity(2).unwrap();

        let mut buffer = vec![0u8; PAGE_SIZE];
        file.read_first_block(&mut buffer).unwrap();

        let payload = vec![9u8; PAGE_SIZE];
        file.write_current_block(&payload).unwrap();
        assert_eq!(file.block_pos(), 2);

        file.read_block(1, &mut buffer).unwrap();
        assert_eq!(buffer, payload);
    }

    #[test]
    fn test_create_truncates_existing() {
        let (_temp_dir, path) = setup_test_file();
        let mut file = PageFile::open(&path).unwrap();
        file.ensure_capacity(8).unwrap();
        file.close().unwrap();

        PageFile::create(&path).unwrap();
        let file = PageFile::open(&path).unwrap();
        assert_eq!(file.total_num_pages(), 1);
    }

    #[test]
    fn test_decode_page_count() {
        assert_eq!(decode_page_count(b"1\0\0"), Some(1));
        assert_eq!(decode_page_count(b"  42\0"), Some(42));
        assert_eq!(decode_page_count(b"\0\0"), None);
        assert_eq!(decode_page_count(b""), None);
        assert_eq!(decode_page_count(b"x1"), None);
    }
}
