//! Read path of the bulletin board: parse the transcript into a typed
//! container and enforce its structural assertions.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::debug;

use crate::ballot::{BallotId, ComPair, PlaintextSvr, Side};
use crate::crypto::fixed_width;

use super::error::SbbError;
use super::records::{
    self, ConsistencyOpeningRecord, ConsistencyProofRecord, MixnetListRecord,
    OriginalOrderRecord, OutcomeRecord, ReceiptRecord, TValueGridRecord, TValuePair,
};

const LOG_TARGET: &str = "sbb::reader";

/// One consistency-proof opening in typed form.
#[derive(Debug, Clone)]
pub struct ConsistencyOpening {
    pub side: Side,
    /// Current (unmixed) component and its key.
    pub value: u64,
    pub key: crate::crypto::CommitKey,
    /// Matching component and key of the initial representation.
    pub value_init: u64,
    pub key_init: crate::crypto::CommitKey,
    /// Matching component and key of the final (posted) representation.
    pub value_fin: u64,
    pub key_fin: crate::crypto::CommitKey,
}

/// Everything a verifier can learn from the transcript, typed and indexed
/// the way verification walks it.
#[derive(Debug, Default)]
pub struct SbbContents {
    /// Ballot id → posted receipt hash.
    pub ballot_receipts: HashMap<BallotId, String>,
    /// Pre-mix commitments, `[row][vote]` in cast order.
    pub svr_commitments: Vec<Vec<ComPair>>,
    /// Post-mix commitments, `[round][vote][row]`.
    pub vote_lists: Vec<Vec<Vec<ComPair>>>,
    /// Posted t-values, `[round][row][vote]`.
    pub t_values: Vec<Vec<Vec<TValuePair>>>,
    /// Consistency openings, round → `[vote][row]`.
    pub consistency_proof: BTreeMap<usize, Vec<Vec<ConsistencyOpening>>>,
    /// Opened outcome lists, round → `[vote][row]` (still shuffled).
    pub election_outcomes: BTreeMap<usize, Vec<Vec<PlaintextSvr>>>,
}

impl SbbContents {
    /// The posted receipt hash for a ballot id.
    pub fn receipt(&self, bid: &BallotId) -> Option<&str> {
        self.ballot_receipts.get(bid).map(String::as_str)
    }
}

/// Parse a transcript file. Sections not yet posted simply stay empty, so
/// the read path works mid-election as well as on the final transcript.
pub fn parse_file(
    path: &Path,
    num_voters: usize,
    rounds: usize,
) -> Result<SbbContents, SbbError> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text, num_voters, rounds)
}

pub fn parse_str(text: &str, num_voters: usize, rounds: usize) -> Result<SbbContents, SbbError> {
    let mut contents = SbbContents::default();
    let mut lines = text.lines().enumerate();

    while let Some((index, heading)) = lines.next() {
        let line_no = index + 1;
        match heading {
            records::BALLOT_RECEIPTS => {
                let body = section_body(&mut lines, records::BALLOT_RECEIPTS)?;
                parse_receipts(&mut contents, &body, num_voters)?;
            }
            records::ORIGINAL_ORDER_COMMITMENTS => {
                let body = section_body(&mut lines, records::ORIGINAL_ORDER_COMMITMENTS)?;
                let record: OriginalOrderRecord =
                    single_record(&body, records::ORIGINAL_ORDER_COMMITMENTS)?;
                parse_original_order(&mut contents, &record, num_voters)?;
            }
            records::MIXNET_VOTE_COMMITMENT_LIST => {
                let body = section_body(&mut lines, records::MIXNET_VOTE_COMMITMENT_LIST)?;
                parse_mixnet_lists(&mut contents, &body, num_voters, rounds)?;
            }
            records::TVALUE_COMMITMENT_LIST => {
                let body = section_body(&mut lines, records::TVALUE_COMMITMENT_LIST)?;
                let record: TValueGridRecord =
                    single_record(&body, records::TVALUE_COMMITMENT_LIST)?;
                parse_t_values(&mut contents, record, rounds)?;
            }
            records::CONSISTENCY_PROOF => {
                let body = section_body(&mut lines, records::CONSISTENCY_PROOF)?;
                let record: ConsistencyProofRecord =
                    single_record(&body, records::CONSISTENCY_PROOF)?;
                parse_consistency_proof(&mut contents, &record, num_voters, rounds)?;
            }
            records::ELECTION_OUTCOME => {
                let body = section_body(&mut lines, records::ELECTION_OUTCOME)?;
                parse_outcomes(&mut contents, &body, num_voters, rounds)?;
            }
            _ => {
                return Err(SbbError::UnexpectedHeading {
                    line: line_no,
                    heading: heading.to_owned(),
                })
            }
        }
    }

    debug!(
        target = LOG_TARGET,
        receipts = contents.ballot_receipts.len(),
        vote_lists = contents.vote_lists.len(),
        outcomes = contents.election_outcomes.len(),
        "parsed bulletin board"
    );
    Ok(contents)
}

/// Collect the `(line_no, text)` records of a section up to its terminator.
fn section_body<'a, I>(
    lines: &mut I,
    section: &'static str,
) -> Result<Vec<(usize, &'a str)>, SbbError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut body = Vec::new();
    for (index, line) in lines.by_ref() {
        if line == records::END_SECTION {
            return Ok(body);
        }
        body.push((index + 1, line));
    }
    Err(SbbError::UnterminatedSection { section })
}

fn single_record<T: serde::de::DeserializeOwned>(
    body: &[(usize, &str)],
    section: &'static str,
) -> Result<T, SbbError> {
    if body.len() != 1 {
        return Err(SbbError::RecordCount {
            section,
            expected: 1,
            actual: body.len(),
        });
    }
    let (line, text) = body[0];
    serde_json::from_str(text).map_err(|source| SbbError::Json { line, source })
}

fn parse_receipts(
    contents: &mut SbbContents,
    body: &[(usize, &str)],
    num_voters: usize,
) -> Result<(), SbbError> {
    for &(line, text) in body {
        let record: ReceiptRecord =
            serde_json::from_str(text).map_err(|source| SbbError::Json { line, source })?;
        let bid = fixed_width(&record.bid)
            .map(BallotId)
            .ok_or(SbbError::IntegerWidth {
                context: "ballot id",
                width: crate::ballot::BALLOT_ID_LEN,
            })?;
        contents.ballot_receipts.insert(bid, record.receipt);
    }
    if contents.ballot_receipts.len() != num_voters {
        return Err(SbbError::ReceiptCount {
            expected: num_voters,
            actual: contents.ballot_receipts.len(),
        });
    }
    Ok(())
}

fn parse_original_order(
    contents: &mut SbbContents,
    record: &OriginalOrderRecord,
    num_voters: usize,
) -> Result<(), SbbError> {
    let mut rows = Vec::with_capacity(record.len());
    for (row, row_record) in record.iter().enumerate() {
        if row_record.len() != num_voters {
            return Err(SbbError::VoteCount {
                list: row,
                expected: num_voters,
                actual: row_record.len(),
            });
        }
        let pairs = row_record
            .iter()
            .map(|pair| pair.to_com_pair())
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(pairs);
    }
    contents.svr_commitments = rows;
    Ok(())
}

fn parse_mixnet_lists(
    contents: &mut SbbContents,
    body: &[(usize, &str)],
    num_voters: usize,
    rounds: usize,
) -> Result<(), SbbError> {
    for &(line, text) in body {
        let record: MixnetListRecord =
            serde_json::from_str(text).map_err(|source| SbbError::Json { line, source })?;
        let list = contents.vote_lists.len();
        if record.len() != num_voters {
            return Err(SbbError::VoteCount {
                list,
                expected: num_voters,
                actual: record.len(),
            });
        }
        let rows = record.first().map_or(0, Vec::len);
        let mut votes = Vec::with_capacity(record.len());
        for (vote, vote_record) in record.iter().enumerate() {
            if vote_record.len() != rows {
                return Err(SbbError::RowCount {
                    list,
                    vote,
                    expected: rows,
                    actual: vote_record.len(),
                });
            }
            let pairs = vote_record
                .iter()
                .map(|pair| pair.to_com_pair())
                .collect::<Result<Vec<_>, _>>()?;
            votes.push(pairs);
        }
        contents.vote_lists.push(votes);
    }
    if contents.vote_lists.len() != rounds {
        return Err(SbbError::ListCount {
            expected: rounds,
            actual: contents.vote_lists.len(),
        });
    }
    Ok(())
}

fn parse_t_values(
    contents: &mut SbbContents,
    record: TValueGridRecord,
    rounds: usize,
) -> Result<(), SbbError> {
    if record.len() != rounds {
        return Err(SbbError::ListCount {
            expected: rounds,
            actual: record.len(),
        });
    }
    contents.t_values = record;
    Ok(())
}

fn parse_consistency_proof(
    contents: &mut SbbContents,
    record: &ConsistencyProofRecord,
    num_voters: usize,
    rounds: usize,
) -> Result<(), SbbError> {
    if record.len() != rounds / 2 {
        return Err(SbbError::ListCount {
            expected: rounds / 2,
            actual: record.len(),
        });
    }
    for (key, proof) in record {
        let round: usize = key.parse().map_err(|_| SbbError::BadRoundKey {
            key: key.clone(),
        })?;
        if proof.len() != num_voters {
            return Err(SbbError::VoteCount {
                list: round,
                expected: num_voters,
                actual: proof.len(),
            });
        }
        let mut votes = Vec::with_capacity(proof.len());
        for (vote, openings) in proof.iter().enumerate() {
            let mut typed = Vec::with_capacity(openings.len());
            for (row, opening) in openings.iter().enumerate() {
                typed.push(typed_opening(opening, round, vote, row)?);
            }
            votes.push(typed);
        }
        contents.consistency_proof.insert(round, votes);
    }
    Ok(())
}

fn typed_opening(
    record: &ConsistencyOpeningRecord,
    round: usize,
    vote: usize,
    row: usize,
) -> Result<ConsistencyOpening, SbbError> {
    let malformed = SbbError::MalformedOpening { round, vote, row };
    let (side, value, value_init, value_fin) = match (record.u, record.v) {
        (Some(u), None) => match (record.u_init, record.u_fin, record.v_init, record.v_fin) {
            (Some(init), Some(fin), None, None) => (Side::U, u, init, fin),
            _ => return Err(malformed),
        },
        (None, Some(v)) => match (record.v_init, record.v_fin, record.u_init, record.u_fin) {
            (Some(init), Some(fin), None, None) => (Side::V, v, init, fin),
            _ => return Err(malformed),
        },
        _ => return Err(malformed),
    };
    let (Some(k), Some(k_init), Some(k_fin)) = (&record.k, &record.k_init, &record.k_fin) else {
        return Err(malformed);
    };
    Ok(ConsistencyOpening {
        side,
        value,
        key: records::decode_commit_key(k)?,
        value_init,
        key_init: records::decode_commit_key(k_init)?,
        value_fin,
        key_fin: records::decode_commit_key(k_fin)?,
    })
}

fn parse_outcomes(
    contents: &mut SbbContents,
    body: &[(usize, &str)],
    num_voters: usize,
    rounds: usize,
) -> Result<(), SbbError> {
    for &(line, text) in body {
        let record: OutcomeRecord =
            serde_json::from_str(text).map_err(|source| SbbError::Json { line, source })?;
        if record.svrs.len() != num_voters {
            return Err(SbbError::VoteCount {
                list: record.list_idx,
                expected: num_voters,
                actual: record.svrs.len(),
            });
        }
        let mut votes = Vec::with_capacity(record.svrs.len());
        for svrs in &record.svrs {
            let vote = svrs
                .iter()
                .map(|svr| svr.to_plaintext())
                .collect::<Result<Vec<_>, _>>()?;
            votes.push(vote);
        }
        contents.election_outcomes.insert(record.list_idx, votes);
    }
    if contents.election_outcomes.len() != rounds / 2 {
        return Err(SbbError::OutcomeCount {
            expected: rounds / 2,
            actual: contents.election_outcomes.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_heading_is_rejected() {
        let err = parse_str("mystery_section\nend_section\n", 0, 2).unwrap_err();
        assert!(matches!(err, SbbError::UnexpectedHeading { line: 1, .. }));
    }

    #[test]
    fn missing_terminator_is_rejected() {
        let err = parse_str("ballot_receipts\n", 0, 2).unwrap_err();
        assert!(matches!(err, SbbError::UnterminatedSection { .. }));
    }

    #[test]
    fn empty_transcript_parses() {
        let contents = parse_str("", 0, 2).unwrap();
        assert!(contents.ballot_receipts.is_empty());
        assert!(contents.vote_lists.is_empty());
    }

    #[test]
    fn receipt_count_is_enforced() {
        let text = "ballot_receipts\n{\"bid\":7,\"receipt\":\"aa\"}\nend_section\n";
        let err = parse_str(text, 2, 2).unwrap_err();
        assert!(matches!(
            err,
            SbbError::ReceiptCount {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn malformed_json_reports_line() {
        let text = "ballot_receipts\nnot json\nend_section\n";
        let err = parse_str(text, 1, 2).unwrap_err();
        assert!(matches!(err, SbbError::Json { line: 2, .. }));
    }
}
