//! The Secure Bulletin Board: an append-only, sectioned, line-oriented
//! transcript.
//!
//! Producers (tablets via the driver, then the proof server) append records
//! through the typed methods below; every write is flushed so a concurrent
//! reader observes progress. Each section is opened by its heading line and
//! closed by `end_section`, and the writer enforces the protocol's section
//! order. Verification consumes the same file through [`SbbContents`].

pub mod error;
pub mod reader;
pub mod records;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::ballot::{BallotId, ComPair};

pub use error::SbbError;
pub use reader::{ConsistencyOpening, SbbContents};
pub use records::{
    ComPairRecord, ConsistencyOpeningRecord, ConsistencyProofRecord, MixnetListRecord,
    OpenedSvrRecord, OutcomeRecord, ReceiptRecord, TValueGridRecord, TValuePair,
};

const LOG_TARGET: &str = "sbb";

/// Default transcript file name.
pub const DEFAULT_SBB_PATH: &str = "sbb.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Collecting,
    BallotsPosted,
    MixnetOpen,
    MixnetClosed,
    TValuesPosted,
    ConsistencyPosted,
    OutcomeOpen,
    OutcomePosted,
    Closed,
}

/// Write handle over the transcript. Owns the file for the duration of the
/// election; [`Sbb::close`] ends the transcript.
pub struct Sbb {
    writer: BufWriter<File>,
    path: PathBuf,
    num_voters: usize,
    rounds: usize,
    stage: Stage,
    receipts: Vec<ReceiptRecord>,
    commitment_rows: Vec<Vec<ComPairRecord>>,
    mixnet_lists_posted: usize,
    outcomes_posted: usize,
}

impl Sbb {
    /// Create the transcript file, truncating any previous election's.
    pub fn create(
        path: impl AsRef<Path>,
        num_voters: usize,
        rounds: usize,
        rows: usize,
    ) -> Result<Self, SbbError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        info!(target = LOG_TARGET, path = %path.display(), num_voters, rounds, rows, "bulletin board opened");
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            num_voters,
            rounds,
            stage: Stage::Collecting,
            receipts: Vec::with_capacity(num_voters),
            commitment_rows: vec![Vec::with_capacity(num_voters); rows],
            mixnet_lists_posted: 0,
            outcomes_posted: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer one ballot receipt; receipts are posted in bulk by
    /// [`Sbb::post_ballots_and_commitments`].
    pub fn add_ballot_receipt(&mut self, bid: &BallotId, receipt: &str) -> Result<(), SbbError> {
        self.expect_stage(Stage::Collecting, "receipts accepted only before posting")?;
        self.receipts.push(ReceiptRecord {
            bid: bid.as_bytes().to_vec(),
            receipt: receipt.to_owned(),
        });
        Ok(())
    }

    /// Buffer one per-row ballot commitment, preserving row grouping and
    /// in-row cast order.
    pub fn add_ballot_svr_commitment(
        &mut self,
        row: usize,
        pair: &ComPair,
    ) -> Result<(), SbbError> {
        self.expect_stage(Stage::Collecting, "commitments accepted only before posting")?;
        let rows = self.commitment_rows.len();
        let slot = self
            .commitment_rows
            .get_mut(row)
            .ok_or(SbbError::RowOutOfRange { row, rows })?;
        slot.push(ComPairRecord::from(pair));
        Ok(())
    }

    /// Post the `ballot_receipts` and `original_order_commitments`
    /// sections.
    pub fn post_ballots_and_commitments(&mut self) -> Result<(), SbbError> {
        self.expect_stage(Stage::Collecting, "ballots already posted")?;

        self.write_line(records::BALLOT_RECEIPTS)?;
        let receipts = std::mem::take(&mut self.receipts);
        for receipt in &receipts {
            self.write_record(receipt)?;
        }
        self.write_line(records::END_SECTION)?;

        self.write_line(records::ORIGINAL_ORDER_COMMITMENTS)?;
        let commitments = std::mem::take(&mut self.commitment_rows);
        self.write_record(&commitments)?;
        self.write_line(records::END_SECTION)?;

        info!(
            target = LOG_TARGET,
            receipts = receipts.len(),
            "posted ballot receipts and original-order commitments"
        );
        self.stage = Stage::BallotsPosted;
        Ok(())
    }

    /// Open the `mixnet_vote_commitment_list` section.
    pub fn begin_mixnet_lists(&mut self) -> Result<(), SbbError> {
        self.expect_stage(Stage::BallotsPosted, "ballots must be posted before mixing")?;
        self.write_line(records::MIXNET_VOTE_COMMITMENT_LIST)?;
        self.stage = Stage::MixnetOpen;
        Ok(())
    }

    /// Post one mix round's commitment list (`[vote][row]`).
    pub fn post_mixnet_list(&mut self, list: &MixnetListRecord) -> Result<(), SbbError> {
        self.expect_stage(Stage::MixnetOpen, "mixnet section is not open")?;
        self.write_record(list)?;
        self.mixnet_lists_posted += 1;
        debug!(
            target = LOG_TARGET,
            round = self.mixnet_lists_posted - 1,
            votes = list.len(),
            "posted mix-round commitment list"
        );
        Ok(())
    }

    /// Close the mixnet section after all 2m lists.
    pub fn end_mixnet_lists(&mut self) -> Result<(), SbbError> {
        self.expect_stage(Stage::MixnetOpen, "mixnet section is not open")?;
        if self.mixnet_lists_posted != self.rounds {
            return Err(SbbError::ListCount {
                expected: self.rounds,
                actual: self.mixnet_lists_posted,
            });
        }
        self.write_line(records::END_SECTION)?;
        self.stage = Stage::MixnetClosed;
        Ok(())
    }

    /// Post the complete t-value grid, one record. Must land before the
    /// challenge is drawn.
    pub fn post_t_values(&mut self, grid: &TValueGridRecord) -> Result<(), SbbError> {
        self.expect_stage(Stage::MixnetClosed, "t-values follow the mixnet lists")?;
        self.write_line(records::TVALUE_COMMITMENT_LIST)?;
        self.write_record(grid)?;
        self.write_line(records::END_SECTION)?;
        info!(target = LOG_TARGET, rounds = grid.len(), "posted t-value commitments");
        self.stage = Stage::TValuesPosted;
        Ok(())
    }

    /// Post the consistency proof for the m challenged rounds, one record.
    pub fn post_consistency_proof(&mut self, proof: &ConsistencyProofRecord) -> Result<(), SbbError> {
        self.expect_stage(Stage::TValuesPosted, "consistency proof follows t-values")?;
        self.write_line(records::CONSISTENCY_PROOF)?;
        self.write_record(proof)?;
        self.write_line(records::END_SECTION)?;
        info!(target = LOG_TARGET, rounds = proof.len(), "posted consistency proof");
        self.stage = Stage::ConsistencyPosted;
        Ok(())
    }

    /// Open the `election_outcome` section.
    pub fn begin_election_outcome(&mut self) -> Result<(), SbbError> {
        self.expect_stage(
            Stage::ConsistencyPosted,
            "outcome follows the consistency proof",
        )?;
        self.write_line(records::ELECTION_OUTCOME)?;
        self.stage = Stage::OutcomeOpen;
        Ok(())
    }

    /// Post one opened outcome list (`[vote][row]`, still shuffled).
    pub fn post_election_outcome(&mut self, outcome: &OutcomeRecord) -> Result<(), SbbError> {
        self.expect_stage(Stage::OutcomeOpen, "outcome section is not open")?;
        self.write_record(outcome)?;
        self.outcomes_posted += 1;
        debug!(
            target = LOG_TARGET,
            list_idx = outcome.list_idx,
            "posted opened outcome list"
        );
        Ok(())
    }

    /// Close the outcome section after all m opened lists.
    pub fn end_election_outcome(&mut self) -> Result<(), SbbError> {
        self.expect_stage(Stage::OutcomeOpen, "outcome section is not open")?;
        if self.outcomes_posted != self.rounds / 2 {
            return Err(SbbError::OutcomeCount {
                expected: self.rounds / 2,
                actual: self.outcomes_posted,
            });
        }
        self.write_line(records::END_SECTION)?;
        self.stage = Stage::OutcomePosted;
        Ok(())
    }

    /// Parse the transcript as a verifier would see it right now.
    pub fn contents(&mut self) -> Result<SbbContents, SbbError> {
        self.writer.flush()?;
        reader::parse_file(&self.path, self.num_voters, self.rounds)
    }

    /// Flush and end the transcript. Further writes fail.
    pub fn close(&mut self) -> Result<(), SbbError> {
        if self.stage == Stage::Closed {
            return Err(SbbError::Closed);
        }
        self.writer.flush()?;
        self.stage = Stage::Closed;
        info!(target = LOG_TARGET, path = %self.path.display(), "bulletin board closed");
        Ok(())
    }

    fn expect_stage(&self, stage: Stage, message: &'static str) -> Result<(), SbbError> {
        if self.stage == Stage::Closed {
            return Err(SbbError::Closed);
        }
        if self.stage != stage {
            return Err(SbbError::SectionOrder(message));
        }
        Ok(())
    }

    fn write_record<T: serde::Serialize>(&mut self, record: &T) -> Result<(), SbbError> {
        let line = serde_json::to_string(record).map_err(SbbError::Encode)?;
        self.write_line(&line)
    }

    fn write_line(&mut self, line: &str) -> Result<(), SbbError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        // Concurrent readers poll the file mid-election.
        self.writer.flush()?;
        Ok(())
    }
}
