//! Runs and tapes.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;

/// A run stored on a tape.
///
/// A real run is a non-empty, non-decreasing sequence of records. A dummy run is
/// a zero-length placeholder used to pad a tape up to its ideal run count: it is
/// consumed by merge steps like any other run but never contributes records to
/// the merge output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run<T> {
    Real(Vec<T>),
    Dummy,
}

impl<T> Run<T> {
    /// Returns the number of records held by the run. Dummy runs hold none.
    pub fn len(&self) -> usize {
        match self {
            Run::Real(records) => records.len(),
            Run::Dummy => 0,
        }
    }

    /// Checks if the run holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if the run is a dummy placeholder.
    pub fn is_dummy(&self) -> bool {
        matches!(self, Run::Dummy)
    }

    /// Consumes the run returning its records. Dummy runs yield nothing.
    pub fn into_records(self) -> Vec<T> {
        match self {
            Run::Real(records) => records,
            Run::Dummy => Vec::new(),
        }
    }
}

/// Tape access error.
#[derive(Debug, PartialEq, Eq)]
pub enum TapeError {
    /// A run was requested from a tape that holds none.
    EmptyTape(usize),
    /// No empty tape exists although the merge schedule requires one.
    NoEmptyTape,
}

impl Error for TapeError {}

impl fmt::Display for TapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapeError::EmptyTape(index) => write!(f, "tape {} is empty", index),
            TapeError::NoEmptyTape => write!(f, "no empty tape found"),
        }
    }
}

/// A fixed collection of tapes, each holding an ordered queue of runs.
///
/// Tapes model sequential storage: runs are appended at the tail and consumed
/// from the head, nothing is ever read or written in the middle. Tapes are
/// addressed by index so their identity stays stable across merge phases.
pub struct TapeSet<T> {
    tapes: Vec<VecDeque<Run<T>>>,
}

impl<T> TapeSet<T> {
    /// Creates a set of `num_tapes` empty tapes.
    pub fn new(num_tapes: usize) -> Self {
        TapeSet {
            tapes: (0..num_tapes).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Returns the number of tapes in the set.
    pub fn num_tapes(&self) -> usize {
        self.tapes.len()
    }

    /// Appends a run at the tail of a tape.
    pub fn append_run(&mut self, index: usize, run: Run<T>) {
        self.tapes[index].push_back(run);
    }

    /// Removes and returns the head run of a tape.
    pub fn pop_front_run(&mut self, index: usize) -> Result<Run<T>, TapeError> {
        self.tapes[index].pop_front().ok_or(TapeError::EmptyTape(index))
    }

    /// Returns the index of the first tape holding no runs.
    /// The cascade schedule keeps exactly one tape empty between sub-phases,
    /// so failing to find one is a fatal invariant violation.
    pub fn index_of_empty_tape(&self) -> Result<usize, TapeError> {
        self.tapes
            .iter()
            .position(|tape| tape.is_empty())
            .ok_or(TapeError::NoEmptyTape)
    }

    /// Returns the number of runs currently held by a tape.
    pub fn run_count(&self, index: usize) -> usize {
        self.tapes[index].len()
    }

    /// Returns the length of the head run of a tape, 0 if the tape is empty.
    pub fn front_run_len(&self, index: usize) -> usize {
        self.tapes[index].front().map_or(0, Run::len)
    }

    /// Returns the total number of records held across all tapes.
    pub fn total_record_count(&self) -> usize {
        self.tapes.iter().flatten().map(Run::len).sum()
    }

    /// Returns the length of the shortest run in the set, 0 if the set holds
    /// no runs at all or any dummy padding remains.
    pub fn smallest_run_length(&self) -> usize {
        self.tapes.iter().flatten().map(Run::len).min().unwrap_or(0)
    }

    /// Iterates over the runs of a tape from head to tail without consuming them.
    pub fn runs_on(&self, index: usize) -> impl Iterator<Item = &Run<T>> {
        self.tapes[index].iter()
    }
}

#[cfg(test)]
mod test {
    use super::{Run, TapeError, TapeSet};

    #[test]
    fn test_run_lengths() {
        let real: Run<i32> = Run::Real(vec![1, 2, 3]);
        let dummy: Run<i32> = Run::Dummy;

        assert_eq!(real.len(), 3);
        assert!(!real.is_dummy());
        assert_eq!(real.into_records(), vec![1, 2, 3]);

        assert_eq!(dummy.len(), 0);
        assert!(dummy.is_empty());
        assert!(dummy.is_dummy());
        assert_eq!(dummy.into_records(), Vec::<i32>::new());
    }

    #[test]
    fn test_tape_fifo_order() {
        let mut tapes = TapeSet::new(3);
        tapes.append_run(0, Run::Real(vec![1, 2]));
        tapes.append_run(0, Run::Real(vec![3]));

        assert_eq!(tapes.run_count(0), 2);
        assert_eq!(tapes.front_run_len(0), 2);
        assert_eq!(tapes.pop_front_run(0), Ok(Run::Real(vec![1, 2])));
        assert_eq!(tapes.pop_front_run(0), Ok(Run::Real(vec![3])));
        assert_eq!(tapes.pop_front_run(0), Err(TapeError::EmptyTape(0)));
    }

    #[test]
    fn test_index_of_empty_tape() {
        let mut tapes = TapeSet::new(3);
        tapes.append_run(0, Run::Real(vec![1]));
        tapes.append_run(2, Run::Dummy);

        assert_eq!(tapes.index_of_empty_tape(), Ok(1));

        tapes.append_run(1, Run::Dummy);
        assert_eq!(tapes.index_of_empty_tape(), Err(TapeError::NoEmptyTape));
    }

    #[test]
    fn test_record_and_run_statistics() {
        let mut tapes = TapeSet::new(4);
        assert_eq!(tapes.total_record_count(), 0);
        assert_eq!(tapes.smallest_run_length(), 0);

        tapes.append_run(0, Run::Real(vec![1, 2, 3]));
        tapes.append_run(1, Run::Real(vec![4, 5]));
        assert_eq!(tapes.total_record_count(), 5);
        assert_eq!(tapes.smallest_run_length(), 2);

        tapes.append_run(2, Run::Dummy);
        assert_eq!(tapes.total_record_count(), 5);
        assert_eq!(tapes.smallest_run_length(), 0);
    }
}
