use std::io::Write;

use nucleid_seq::sequence::{count_sequences, FastaBlockReader, Sequence};
use nucleid_seq::SequenceError;

fn write_fasta(records: &[(&str, &str)]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.fa");
    let mut file = std::fs::File::create(&path).unwrap();
    for (header, body) in records {
        writeln!(file, ">{}", header).unwrap();
        writeln!(file, "{}", body).unwrap();
    }
    (dir, path)
}

#[test]
fn test_valid_segments() {
    let seq = Sequence::from_str("s", "NNACGTNNGGNN");
    assert_eq!(seq.valid_segments(), vec![(2, 5), (8, 9)]);
    assert_eq!(seq.effective_len(), 6);
}

#[test]
fn test_read_single_block() {
    let (_dir, path) = write_fasta(&[("seq-1 first", "ACGT"), ("seq-2", "GGGG")]);
    let mut reader = FastaBlockReader::open(&path, 10).unwrap();
    let block = reader.read_block().unwrap();
    assert_eq!(block.len(), 2);
    assert_eq!(block[0].description(), "seq-1 first");
    assert_eq!(block[0].to_string(), "ACGT");
    assert_eq!(block[1].to_string(), "GGGG");
    assert!(!reader.is_reading());
    assert_eq!(reader.max_len(), 4);
}

#[test]
fn test_block_boundary_does_not_split_records() {
    let (_dir, path) = write_fasta(&[("a", "ACGTAC"), ("b", "TTTT"), ("c", "GGCC")]);
    let mut reader = FastaBlockReader::open(&path, 2).unwrap();
    let first = reader.read_block().unwrap();
    assert_eq!(first.len(), 2);
    assert!(reader.is_reading());
    let second = reader.read_block().unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].description(), "c");
    assert_eq!(second[0].to_string(), "GGCC");
    assert!(!reader.is_reading());
}

#[test]
fn test_restart_reproduces_blocks() {
    let (_dir, path) = write_fasta(&[("a", "ACGT"), ("b", "TTTT"), ("c", "GGCC")]);
    let mut reader = FastaBlockReader::open(&path, 2).unwrap();
    let first = reader.read_block().unwrap();
    let _ = reader.read_block().unwrap();
    reader.restart().unwrap();
    let again = reader.read_block().unwrap();
    assert_eq!(first, again);
}

#[test]
fn test_ambiguity_codes_are_remapped() {
    let (_dir, path) = write_fasta(&[("amb", "acgtRYMKSWHBVDn-")]);
    let mut reader = FastaBlockReader::open(&path, 10).unwrap();
    let block = reader.read_block().unwrap();
    assert_eq!(block[0].to_string(), "ACGTGCATGTCTATNN");
}

#[test]
fn test_invalid_symbol_is_fatal() {
    let (_dir, path) = write_fasta(&[("bad", "ACGTE")]);
    let mut reader = FastaBlockReader::open(&path, 10).unwrap();
    match reader.read_block() {
        Err(SequenceError::InvalidSymbol { symbol, header }) => {
            assert_eq!(symbol, 'E');
            assert_eq!(header, "bad");
        }
        other => panic!("expected InvalidSymbol, got {:?}", other.map(|b| b.len())),
    }
}

#[test]
fn test_all_unknown_sequences_are_dropped() {
    let (_dir, path) = write_fasta(&[("junk", "NNNN"), ("good", "ACGT")]);
    let mut reader = FastaBlockReader::open(&path, 10).unwrap();
    let block = reader.read_block().unwrap();
    assert_eq!(block.len(), 1);
    assert_eq!(block[0].description(), "good");
}

#[test]
fn test_crlf_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crlf.fa");
    std::fs::write(&path, ">w\r\nACGT\r\nACGT\r\n").unwrap();
    let mut reader = FastaBlockReader::open(&path, 10).unwrap();
    let block = reader.read_block().unwrap();
    assert_eq!(block[0].to_string(), "ACGTACGT");
}

#[test]
fn test_count_sequences() {
    let (_dir, path) = write_fasta(&[("a", "ACGT"), ("b", "TTTT"), ("c", "GGCC")]);
    assert_eq!(count_sequences(&path).unwrap(), 3);
}
