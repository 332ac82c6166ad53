use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;

use crate::errors::SequenceError;
use crate::sequence::{Sequence, UNKNOWN};

const NOT_A_BASE: u8 = 0;

/// Builds the 128-entry remap table for DNA input.
///
/// Ambiguity codes collapse onto a canonical base; `N` and `-` stand for unknown;
/// anything else is rejected by the reader.
fn make_code_map() -> [u8; 128] {
    let mut map = [NOT_A_BASE; 128];
    map[b'A' as usize] = b'A';
    map[b'C' as usize] = b'C';
    map[b'G' as usize] = b'G';
    map[b'T' as usize] = b'T';
    map[b'N' as usize] = UNKNOWN;
    map[b'R' as usize] = b'G';
    map[b'Y' as usize] = b'C';
    map[b'M' as usize] = b'A';
    map[b'K' as usize] = b'T';
    map[b'S' as usize] = b'G';
    map[b'W' as usize] = b'T';
    map[b'H' as usize] = b'C';
    map[b'B' as usize] = b'T';
    map[b'V' as usize] = b'A';
    map[b'D' as usize] = b'T';
    map[b'-' as usize] = UNKNOWN;
    map
}

/// Streams a FASTA file as blocks of a requested number of sequences.
///
/// Unlike an iterator over single records, the reader hands out whole blocks and remembers
/// the byte offset where the next unread record starts, so a clustering pass can
/// [restart](FastaBlockReader::restart) from the beginning of the file and re-stream it. The
/// largest sequence length seen so far is tracked to size histogram cells.
///
/// Sequences made exclusively of unknown bases are dropped; an out-of-alphabet symbol is a
/// fatal error naming the offending record.
pub struct FastaBlockReader {
    path: PathBuf,
    reader: BufReader<File>,
    /// byte offset of the first unread line
    position: u64,
    block_size: usize,
    max_len: usize,
    is_done: bool,
    code_map: [u8; 128],
}

impl FastaBlockReader {
    /// Opens a FASTA file for block streaming.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> Result<Self, SequenceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(FastaBlockReader {
            path,
            reader: BufReader::new(file),
            position: 0,
            block_size,
            max_len: 0,
            is_done: false,
            code_map: make_code_map(),
        })
    }

    /// True until the last record of the file has been handed out.
    pub fn is_reading(&self) -> bool {
        !self.is_done
    }

    /// The byte offset of the first unread record.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The longest sequence seen by this reader so far.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Changes the number of sequences returned by subsequent [read_block](Self::read_block) calls.
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size.max(1);
    }

    /// Pre-seeds the maximum observed length, e.g. from an earlier scan of the same file.
    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = self.max_len.max(max_len);
    }

    /// Rewinds to the beginning of the file; the next block is the first block again.
    pub fn restart(&mut self) -> Result<(), SequenceError> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.position = 0;
        self.is_done = false;
        Ok(())
    }

    /// Re-opens the same file from a given byte offset, e.g. to scan the remainder
    /// of a database past an already-processed block.
    pub fn open_at(
        path: impl AsRef<Path>,
        block_size: usize,
        position: u64,
        max_len: usize,
    ) -> Result<Self, SequenceError> {
        let mut reader = Self::open(path, block_size)?;
        reader.reader.seek(SeekFrom::Start(position))?;
        reader.position = position;
        reader.max_len = max_len;
        Ok(reader)
    }

    /// Reads the next block of up to `block_size` sequences.
    ///
    /// The block may be shorter than requested at the end of the file; after the last
    /// record has been returned, [is_reading](Self::is_reading) turns false.
    pub fn read_block(&mut self) -> Result<Vec<Sequence>, SequenceError> {
        let mut block: Vec<Sequence> = Vec::with_capacity(self.block_size);
        let mut header: Option<String> = None;
        let mut body: Vec<u8> = Vec::new();
        let mut line = String::new();

        loop {
            let line_start = self.position;
            line.clear();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                self.is_done = true;
                self.finish_record(&mut block, header.take(), std::mem::take(&mut body));
                break;
            }
            self.position += n as u64;
            let trimmed = line.trim_end_matches(['\n', '\r']);

            if trimmed.starts_with('>') {
                self.finish_record(&mut block, header.take(), std::mem::take(&mut body));
                if block.len() == self.block_size {
                    // The record this header opens does not fit the block any more;
                    // rewind so the next call starts right at it.
                    self.reader.seek(SeekFrom::Start(line_start))?;
                    self.position = line_start;
                    return Ok(block);
                }
                header = Some(trimmed[1..].trim().to_owned());
            } else if header.is_some() {
                self.decode_line(trimmed, header.as_deref().unwrap_or(""), &mut body)?;
            }
        }

        Ok(block)
    }

    /// Uppercases, remaps ambiguity codes and appends one body line.
    fn decode_line(
        &self,
        line: &str,
        header: &str,
        body: &mut Vec<u8>,
    ) -> Result<(), SequenceError> {
        body.reserve(line.len());
        for &b in line.as_bytes() {
            let upper = b.to_ascii_uppercase();
            let mapped = if (upper as usize) < 128 {
                self.code_map[upper as usize]
            } else {
                NOT_A_BASE
            };
            if mapped == NOT_A_BASE {
                return Err(SequenceError::InvalidSymbol {
                    symbol: b as char,
                    header: header.to_owned(),
                });
            }
            body.push(mapped);
        }
        Ok(())
    }

    /// Closes the record under construction, dropping all-unknown bodies.
    fn finish_record(&mut self, block: &mut Vec<Sequence>, header: Option<String>, body: Vec<u8>) {
        let Some(header) = header else { return };
        if body.len() > self.max_len {
            self.max_len = body.len();
        }
        if body.iter().all(|&c| c == UNKNOWN) {
            debug!("Dropping a sequence with no valid bases: {}", header);
            return;
        }
        block.push(Sequence::from_attrs(header, body));
    }

    /// The path this reader streams from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Counts the records of a FASTA file by scanning for `>` at line starts.
pub fn count_sequences(path: impl AsRef<Path>) -> Result<usize, SequenceError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let mut count = 0;
    for line in reader.lines() {
        if line?.starts_with('>') {
            count += 1;
        }
    }
    Ok(count)
}
