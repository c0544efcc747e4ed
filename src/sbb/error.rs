use thiserror::Error;

/// Structural failures of the bulletin-board transcript, on either the
/// write or the read path.
#[derive(Debug, Error)]
pub enum SbbError {
    #[error("bulletin board I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("record serialization failed: {0}")]
    Encode(serde_json::Error),
    #[error("unexpected heading at line {line}: {heading:?}")]
    UnexpectedHeading { line: usize, heading: String },
    #[error("section {section} is missing its terminator")]
    UnterminatedSection { section: &'static str },
    #[error("section {section} holds {actual} records, expected {expected}")]
    RecordCount {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("expected {expected} ballot receipts, found {actual}")]
    ReceiptCount { expected: usize, actual: usize },
    #[error("expected {expected} mix-round commitment lists, found {actual}")]
    ListCount { expected: usize, actual: usize },
    #[error("list {list} holds {actual} votes, expected {expected}")]
    VoteCount {
        list: usize,
        expected: usize,
        actual: usize,
    },
    #[error("vote {vote} of list {list} opens {actual} rows, expected {expected}")]
    RowCount {
        list: usize,
        vote: usize,
        expected: usize,
        actual: usize,
    },
    #[error("expected {expected} opened outcome lists, found {actual}")]
    OutcomeCount { expected: usize, actual: usize },
    #[error("{context} integer does not fit in {width} bytes")]
    IntegerWidth {
        context: &'static str,
        width: usize,
    },
    #[error("consistency proof key {key:?} is not a round index")]
    BadRoundKey { key: String },
    #[error("malformed commitment opening for round {round}, vote {vote}, row {row}")]
    MalformedOpening {
        round: usize,
        vote: usize,
        row: usize,
    },
    #[error("row {row} out of range for a {rows}-row board")]
    RowOutOfRange { row: usize, rows: usize },
    #[error("bulletin board operation out of order: {0}")]
    SectionOrder(&'static str),
    #[error("bulletin board is closed")]
    Closed,
}
