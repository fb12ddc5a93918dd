// SAM output module
//
// Turns finished per-read results into SAM text:
// - header (@SQ per contig, optional @RG, @PG)
// - one unmapped record, or one record per reported hit
// - per-read buffering with an in-order flush after the join barrier

use crate::core::alignment::cigar::clip_lengths;
use crate::core::alignment::types::{hit_flags, AuxRecord, Hit, PairContext, ReadAlignment};
use crate::core::io::fastq_reader::SequenceRecord;
use crate::core::utils::reverse_complement;
use crate::index::reference::ReferenceIndex;
use crate::pipelines::linear::finalization::{cigar_field, generate_xa_tag, sam_flags};
use crate::pipelines::linear::mem_opt::MemOpt;
use std::io::{self, Write};

/// Counters for one flushed chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub reads: usize,
    pub records: usize,
    pub unmapped: usize,
}

/// Writes the header: contigs, read group and program line.
pub fn write_header<W: Write>(
    writer: &mut W,
    index: &ReferenceIndex,
    opt: &MemOpt,
    command_line: &str,
) -> io::Result<()> {
    for contig in &index.contigs {
        writeln!(writer, "@SQ\tSN:{}\tLN:{}", contig.name, contig.length)?;
    }
    if let Some(rg) = &opt.read_group {
        writeln!(writer, "{rg}")?;
    }
    writeln!(
        writer,
        "@PG\tID:{}\tPN:{}\tVN:{}\tCL:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        command_line
    )
}

fn pair_flags(pair: Option<&PairContext>) -> u16 {
    let Some(pair) = pair else {
        return 0;
    };
    let mut flag = sam_flags::PAIRED;
    flag |= if pair.is_first {
        sam_flags::FIRST_IN_PAIR
    } else {
        sam_flags::SECOND_IN_PAIR
    };
    if !pair.mate_mapped() {
        flag |= sam_flags::MATE_UNMAPPED;
    }
    if pair.mate_reverse() {
        flag |= sam_flags::MATE_REVERSE;
    }
    flag
}

fn push_tail(out: &mut String, record: &SequenceRecord, opt: &MemOpt) {
    if let Some(id) = &opt.read_group_id {
        out.push_str(&format!("\tRG:Z:{id}"));
    }
    if opt.append_comment {
        if let Some(comment) = &record.comment {
            out.push('\t');
            out.push_str(comment);
        }
    }
    out.push('\n');
}

/// Unmapped record. When the mate is placed, RNEXT/PNEXT point at it.
fn format_unmapped(
    out: &mut String,
    record: &SequenceRecord,
    result: &ReadAlignment,
    index: &ReferenceIndex,
    opt: &MemOpt,
) {
    let flag = sam_flags::UNMAPPED | pair_flags(result.pair.as_ref());
    let (rnext, pnext) = match result.pair.as_ref().and_then(|p| p.mate) {
        Some(mate) => (index.contig(mate.ref_id).name.as_str(), mate.pos + 1),
        None => ("*", 0),
    };
    let seq = String::from_utf8_lossy(&record.seq);
    let qual = record
        .qual
        .as_deref()
        .map(String::from_utf8_lossy)
        .unwrap_or_else(|| "*".into());

    out.push_str(&format!(
        "{}\t{}\t*\t0\t0\t*\t{}\t{}\t0\t{}\t{}",
        record.name, flag, rnext, pnext, seq, qual
    ));
    push_tail(out, record, opt);
}

/// SEQ and QUAL as aligned to the forward reference, trimmed of hard clips.
fn oriented_seq_qual(
    record: &SequenceRecord,
    hit: &Hit,
    aux: &AuxRecord,
    hard_clip: bool,
) -> (Vec<u8>, Option<Vec<u8>>) {
    let (mut seq, mut qual) = if hit.is_reverse {
        let qual = record.qual.as_ref().map(|q| q.iter().rev().copied().collect());
        (reverse_complement(&record.seq), qual)
    } else {
        (record.seq.clone(), record.qual.clone())
    };

    if hard_clip && !aux.cigar.is_empty() {
        let (lead, trail) = clip_lengths(&aux.cigar);
        let end = seq.len().saturating_sub(trail).max(lead);
        seq = seq[lead.min(seq.len())..end.min(seq.len())].to_vec();
        if let Some(q) = qual.as_mut() {
            let end = q.len().saturating_sub(trail).max(lead);
            *q = q[lead.min(q.len())..end.min(q.len())].to_vec();
        }
    }
    (seq, qual)
}

/// Footprints with more ambiguous reference bases than this are typed `N`.
const MAX_TYPED_AMBIGUOUS: u32 = 10;

/// XT:A hit type: `U` unique, `R` repeat, `M` mate rescue, `N` ambiguous
/// reference.
fn hit_type(hit: &Hit, aux: &AuxRecord) -> char {
    if aux.ambiguous_bases > MAX_TYPED_AMBIGUOUS {
        'N'
    } else if hit.has_flag(hit_flags::MATE_RESCUE) {
        'M'
    } else if hit.has_flag(hit_flags::TANDEM_REPEAT) || hit.has_flag(hit_flags::RANDOM_PICK) {
        'R'
    } else {
        'U'
    }
}

fn format_hit(
    out: &mut String,
    record: &SequenceRecord,
    result: &ReadAlignment,
    which: usize,
    reported: usize,
    index: &ReferenceIndex,
    opt: &MemOpt,
) {
    let hit = &result.hits[which];
    let aux = &result.aux[which];
    let pair = result.pair.as_ref();

    let mut flag = pair_flags(pair);
    if pair.map(|p| p.proper_pair).unwrap_or(false) {
        flag |= sam_flags::PROPER_PAIR;
    }
    if hit.is_reverse {
        flag |= sam_flags::REVERSE;
    }
    if which > 0 || hit.has_flag(hit_flags::SECONDARY) {
        flag |= sam_flags::SECONDARY;
    }

    let contig = index.contig(aux.ref_id);
    let mapq = if pair.is_some() { aux.paired_mapq } else { aux.mapq };
    let (rnext, pnext) = match aux.mate {
        Some(mate) if mate.ref_id == aux.ref_id => ("=", mate.pos + 1),
        Some(mate) => (index.contig(mate.ref_id).name.as_str(), mate.pos + 1),
        None => ("*", 0),
    };

    let (seq, qual) = oriented_seq_qual(record, hit, aux, opt.hard_clip);
    let qual = qual
        .map(|q| String::from_utf8_lossy(&q).into_owned())
        .unwrap_or_else(|| "*".to_string());

    out.push_str(&format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        record.name,
        flag,
        contig.name,
        aux.local_pos + 1,
        mapq,
        cigar_field(aux, opt.hard_clip),
        rnext,
        pnext,
        aux.tlen,
        String::from_utf8_lossy(&seq),
        qual
    ));

    out.push_str(&format!(
        "\tAS:i:{}\tXS:i:{}\tXE:i:{}\tXT:A:{}\tNM:i:{}",
        hit.score,
        hit.sub_score,
        hit.seed_support,
        hit_type(hit, aux),
        aux.edit_distance
    ));
    if !aux.md.is_empty() {
        out.push_str(&format!("\tMD:Z:{}", aux.md));
    }
    if aux.ambiguous_bases > 0 {
        out.push_str(&format!("\tXN:i:{}", aux.ambiguous_bases));
    }
    if let Some(pair) = pair {
        out.push_str(&format!("\tSM:i:{}\tAM:i:{}", aux.mapq, aux.mapq.min(pair.mate_mapq)));
    }
    if which == 0 {
        let limit = opt.xa_limit(contig.is_alt);
        if let Some(xa) = generate_xa_tag(index, &result.hits, &result.aux, reported, limit) {
            out.push_str(&format!("\tXA:Z:{xa}"));
        }
    }
    push_tail(out, record, opt);
}

/// Formats every record of one read into `out`. Returns the record count.
pub fn format_read(
    out: &mut String,
    record: &SequenceRecord,
    result: &ReadAlignment,
    index: &ReferenceIndex,
    opt: &MemOpt,
) -> usize {
    if !result.is_mapped() {
        format_unmapped(out, record, result, index, opt);
        return 1;
    }
    let reported = result.hits.len().min(1 + opt.max_secondary);
    for which in 0..reported {
        format_hit(out, record, result, which, reported, index, opt);
    }
    reported
}

/// Buffers each read's records, then flushes them in chunk order.
pub fn write_chunk<W: Write>(
    writer: &mut W,
    records: &[SequenceRecord],
    results: &[ReadAlignment],
    index: &ReferenceIndex,
    opt: &MemOpt,
) -> io::Result<EmitStats> {
    let mut stats = EmitStats::default();
    let buffers: Vec<String> = records
        .iter()
        .zip(results)
        .map(|(record, result)| {
            let mut buf = String::new();
            stats.records += format_read(&mut buf, record, result, index, opt);
            stats.reads += 1;
            if !result.is_mapped() {
                stats.unmapped += 1;
            }
            buf
        })
        .collect();

    for buf in &buffers {
        writer.write_all(buf.as_bytes())?;
    }
    Ok(stats)
}
