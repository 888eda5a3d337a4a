//! Pure functions over nucleotide strings.
//!
//! Everything here works on uppercase ASCII bytes as produced by
//! [`clean_sequence`]; callers holding a `&str` pass `as_bytes()`.

use crate::{
    error::{ConstructError, Result},
    iupac_code::IupacCode,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const START_CODON: &[u8] = b"ATG";
pub const STOP_CODONS: [&[u8]; 3] = [b"TAA", b"TAG", b"TGA"];

/// Strips whitespace and uppercases.
pub fn clean_sequence(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Fails on the first byte that is not an IUPAC nucleotide code.
pub fn check_nucleotides(record_id: &str, seq: &[u8]) -> Result<()> {
    match seq.iter().position(|c| !IupacCode::is_valid_letter(*c)) {
        Some(index) => Err(ConstructError::InvalidNucleotide {
            record_id: record_id.to_string(),
            position: index + 1,
            letter: seq[index] as char,
        }),
        None => Ok(()),
    }
}

/// Distinct invalid characters, sorted.
pub fn invalid_characters(seq: &[u8]) -> Vec<char> {
    seq.iter()
        .filter(|c| !IupacCode::is_valid_letter(**c))
        .map(|c| *c as char)
        .sorted()
        .dedup()
        .collect()
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|c| IupacCode::letter_complement(*c))
        .collect()
}

pub fn reverse_complement_str(seq: &str) -> String {
    String::from_utf8_lossy(&reverse_complement(seq.as_bytes())).to_string()
}

#[inline(always)]
pub fn is_stop_codon(codon: &[u8]) -> bool {
    STOP_CODONS.contains(&codon)
}

pub fn has_start_codon(seq: &[u8]) -> bool {
    seq.starts_with(START_CODON)
}

pub fn has_stop_codon(seq: &[u8]) -> bool {
    seq.len() >= 3 && is_stop_codon(&seq[seq.len() - 3..])
}

pub fn is_in_frame(seq: &[u8]) -> bool {
    seq.len() % 3 == 0
}

/// Complete codons in frame 0; a trailing partial codon is dropped.
pub fn codons(seq: &[u8]) -> impl Iterator<Item = &[u8]> {
    seq.chunks_exact(3)
}

/// 0-based offsets of in-frame stop codons ahead of the terminal codon.
///
/// Out-of-frame sequences yield nothing; the frame defect is reported on its own.
pub fn internal_stop_codons(seq: &[u8]) -> Vec<usize> {
    if !is_in_frame(seq) || seq.len() < 3 {
        return vec![];
    }
    let body = if has_stop_codon(seq) {
        &seq[..seq.len() - 3]
    } else {
        seq
    };
    codons(body)
        .enumerate()
        .filter(|(_, codon)| is_stop_codon(codon))
        .map(|(i, _)| i * 3)
        .collect()
}

/// GC percentage, rounded to one decimal.
pub fn gc_content(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let gc = seq
        .iter()
        .map(|c| c.to_ascii_uppercase())
        .filter(|&c| c == b'G' || c == b'C')
        .count() as f64;
    (gc / seq.len() as f64 * 1000.0).round() / 10.0
}

pub fn find_subsequence(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() || start >= haystack.len() || needle.len() > haystack.len() - start {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + start)
}

pub fn find_all_subsequences(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut ret = vec![];
    let mut start = 0;
    while let Some(pos) = find_subsequence(haystack, needle, start) {
        ret.push(pos);
        start = pos + 1;
    }
    ret
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceStats {
    pub is_valid: bool,
    pub length: usize,
    pub gc_content: Option<f64>,
    pub invalid_characters: Vec<char>,
    pub has_start_codon: bool,
    pub has_stop_codon: bool,
}

impl SequenceStats {
    pub fn from_text(raw: &str) -> Self {
        let clean = clean_sequence(raw);
        let seq = clean.as_bytes();
        let invalid = invalid_characters(seq);
        let is_valid = invalid.is_empty();
        Self {
            is_valid,
            length: seq.len(),
            gc_content: (is_valid && !seq.is_empty()).then(|| gc_content(seq)),
            invalid_characters: invalid,
            has_start_codon: has_start_codon(seq),
            has_stop_codon: has_stop_codon(seq),
        }
    }
}
